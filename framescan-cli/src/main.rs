//! framescan: run the live scan loop against an image file.
//!
//! ```text
//! framescan --image code.png               Scan until Ctrl-C
//! framescan --image code.png --once        Exit after the first result
//! framescan --image code.png --config <p>  Use custom config TOML
//! framescan --gen-config                   Dump default config and exit
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use framescan_core::{
    DecodeFailure, DecodeWorker, Detection, FacingMode, IntervalClock, Scanner,
};
use framescan_cli::config::CliConfig;
use framescan_cli::decoder::QrDecoder;
use framescan_cli::source::{frame_source, load_frame};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Facing {
    Environment,
    User,
}

impl From<Facing> for FacingMode {
    fn from(f: Facing) -> Self {
        match f {
            Facing::Environment => FacingMode::Environment,
            Facing::User => FacingMode::User,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "framescan", about = "Scan an image for QR codes with the live frame loop")]
struct Cli {
    /// Image file to use as the frame source.
    #[arg(short, long, required_unless_present = "gen_config")]
    image: Option<PathBuf>,

    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "framescan.toml")]
    config: PathBuf,

    /// Camera facing (overrides config); `user` mirrors the render space.
    #[arg(long, value_enum)]
    facing: Option<Facing>,

    /// Stop after this many seconds.
    #[arg(long)]
    duration_secs: Option<u64>,

    /// Stop after the first detection.
    #[arg(long)]
    once: bool,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

enum Report {
    Found(Detection),
    Missed(DecodeFailure),
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&CliConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = CliConfig::load(&cli.config);
    if let Some(facing) = cli.facing {
        config.display.facing = facing.into();
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("framescan v{}", env!("CARGO_PKG_VERSION"));

    // ── 1. Frame source ─────────────────────────────────────────

    let image = cli.image.ok_or("--image is required")?;
    let frame = load_frame(&image)?;
    info!(
        "{}: {}x{} frame, {} layout, anchor {}",
        image.display(),
        frame.width,
        frame.height,
        config.display.mode,
        config.display.anchor
    );
    let source = frame_source(frame, &config.display);

    // ── 2. Scanner ──────────────────────────────────────────────

    let (report_tx, mut reports) = mpsc::unbounded_channel();
    let failure_tx = report_tx.clone();

    let scanner = Scanner::builder(source, DecodeWorker::spawn(QrDecoder)?)
        .config(config.scanner.clone())
        .clock(IntervalClock::new(config.clock.rate)?)
        .on_decode_success(move |d: &Detection| {
            let _ = report_tx.send(Report::Found(d.clone()));
        })
        .on_decode_failure(move |f: &DecodeFailure| {
            let _ = failure_tx.send(Report::Missed(f.clone()));
        })
        .build()?;
    let (handle, task) = scanner.spawn();
    let mut overlay = handle.subscribe_overlay();

    handle.start(config.display.facing).await?;
    if let Some(area) = overlay.borrow_and_update().scan_area_render {
        info!(
            "scan area on screen: {:.1},{:.1} {:.1}x{:.1}",
            area.x, area.y, area.width, area.height
        );
    }

    // ── 3. Report loop ──────────────────────────────────────────

    let deadline = tokio::time::sleep(
        cli.duration_secs
            .map(Duration::from_secs)
            .unwrap_or(Duration::MAX / 4),
    );
    tokio::pin!(deadline);
    let mut found = 0u64;

    loop {
        tokio::select! {
            Some(report) = reports.recv() => match report {
                Report::Found(d) => {
                    found += 1;
                    println!("{}\t{}", d.format, d.raw_value);
                    info!(
                        "source area {:.0},{:.0} {:.0}x{:.0}; render area {:?}",
                        d.source_area.x,
                        d.source_area.y,
                        d.source_area.width,
                        d.source_area.height,
                        d.render_area
                    );
                    if cli.once {
                        break;
                    }
                }
                Report::Missed(f) if f.is_error() => warn!("{f}"),
                Report::Missed(_) => {}
            },
            _ = &mut deadline => {
                info!("duration elapsed");
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    // ── 4. Shutdown ─────────────────────────────────────────────

    info!("shutting down after {found} detection(s)");
    if let Err(e) = handle.destroy().await {
        error!("destroy failed: {e}");
    }
    drop(handle);
    let _ = task.await;

    Ok(())
}
