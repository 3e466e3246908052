//! The lifecycle controller.
//!
//! A [`Scanner`] owns everything one scanning session needs: the frame
//! source, the scheduler, the decode channel, the frame clock, and the
//! visibility subscription. It runs as a single task that multiplexes
//! four event sources:
//!
//! ```text
//!   ScannerHandle ──commands──┐
//!   VisibilityHub ──changes───┤
//!   DecodeChannel ──outcome───┼──► Scanner::run ──► FrameScheduler
//!   FrameClock ─────signals───┘         │
//!                                       ├──► watch<SessionState>
//!                                       └──► watch<Overlay>
//! ```
//!
//! All session state is mutated on that one task, so nothing is shared
//! behind locks. Dropping every [`ScannerHandle`] destroys the session.

use std::fmt;
use std::future;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::clock::{FrameClock, IntervalClock};
use crate::config::ScanConfig;
use crate::decode::{DecodeChannel, DecodeOutcome, DecodeWorker};
use crate::error::ScanError;
use crate::events::{
    DecodeFailure, Detection, FailureCallback, FrameCallback, Overlay, ScanEvents, SuccessCallback,
};
use crate::frame::{FacingMode, PixelBuffer, SourceControl};
use crate::geometry::Rect;
use crate::scheduler::{FrameScheduler, ScanAreaFn};
use crate::session::SessionState;
use crate::visibility::{Visibility, VisibilityHub, VisibilitySubscription};

const COMMAND_QUEUE: usize = 16;

// ── Commands ─────────────────────────────────────────────────────

type Reply = oneshot::Sender<Result<(), ScanError>>;

#[derive(Debug)]
enum Command {
    Start { facing: FacingMode, reply: Reply },
    Pause { reply: Reply },
    Stop { reply: Reply },
    Destroy { reply: Reply },
}

enum LoopEvent {
    Command(Option<Command>),
    Visibility(Visibility),
    Decoded(DecodeOutcome),
    Frame(Instant),
}

// ── ScannerBuilder ───────────────────────────────────────────────

/// Collects the collaborators and options of a [`Scanner`].
pub struct ScannerBuilder {
    source: Box<dyn SourceControl>,
    worker: DecodeWorker,
    config: ScanConfig,
    calc_scan_area: Option<ScanAreaFn>,
    clock: Option<Box<dyn FrameClock>>,
    visibility: Option<VisibilityHub>,
    on_success: Option<SuccessCallback>,
    on_failure: Option<FailureCallback>,
    on_frame: Option<FrameCallback>,
}

impl ScannerBuilder {
    pub fn new(source: impl SourceControl + 'static, worker: DecodeWorker) -> Self {
        Self {
            source: Box::new(source),
            worker,
            config: ScanConfig::default(),
            calc_scan_area: None,
            clock: None,
            visibility: None,
            on_success: None,
            on_failure: None,
            on_frame: None,
        }
    }

    pub fn config(mut self, config: ScanConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the default centered-square scan area.
    pub fn scan_area_fn<F>(mut self, calc: F) -> Self
    where
        F: Fn(&crate::geometry::RenderLayout) -> Rect + Send + Sync + 'static,
    {
        self.calc_scan_area = Some(Box::new(calc));
        self
    }

    /// Frame-timing signal. Defaults to a 60 Hz [`IntervalClock`].
    pub fn clock(mut self, clock: impl FrameClock + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    /// Pause while the surface is hidden and resume when it shows again.
    pub fn visibility(mut self, hub: &VisibilityHub) -> Self {
        self.visibility = Some(hub.clone());
        self
    }

    pub fn on_decode_success(mut self, f: impl FnMut(&Detection) + Send + 'static) -> Self {
        self.on_success = Some(Box::new(f));
        self
    }

    pub fn on_decode_failure(mut self, f: impl FnMut(&DecodeFailure) + Send + 'static) -> Self {
        self.on_failure = Some(Box::new(f));
        self
    }

    /// Receives every cropped frame when `debug` is enabled.
    pub fn on_frame(mut self, f: impl FnMut(&PixelBuffer) + Send + 'static) -> Self {
        self.on_frame = Some(Box::new(f));
        self
    }

    pub fn build(self) -> Result<Scanner, ScanError> {
        self.config.validate()?;
        let Some(on_success) = self.on_success else {
            return Err(ScanError::Configuration(
                "a decode success callback is required".into(),
            ));
        };
        if self.worker.is_terminated() {
            return Err(ScanError::Configuration(
                "decode worker already terminated".into(),
            ));
        }
        if self.on_frame.is_some() && !self.config.debug {
            debug!("frame hook registered but debug is off; it will not fire");
        }

        let mut events = ScanEvents::new(on_success);
        events.on_failure = self.on_failure;
        events.on_frame = self.on_frame;

        let scheduler = FrameScheduler::new(&self.config, self.calc_scan_area, events);
        let channel = DecodeChannel::new(self.worker, self.config.decode_timeout());
        let clock = self
            .clock
            .unwrap_or_else(|| -> Box<dyn FrameClock> { Box::new(IntervalClock::default()) });
        let visibility = self.visibility.map(|hub| {
            let subscription = hub.subscribe();
            (hub, subscription)
        });

        let (command_tx, commands) = mpsc::channel(COMMAND_QUEUE);
        let (state_tx, _) = watch::channel(SessionState::default());

        Ok(Scanner {
            actor: ScannerActor {
                source: self.source,
                scheduler,
                channel,
                clock,
                session: SessionState::default(),
                state_tx,
                visibility,
                commands,
            },
            command_tx,
        })
    }
}

// ── Scanner ──────────────────────────────────────────────────────

/// One scanning session. Drive it with [`spawn`](Self::spawn) or
/// [`run`](Self::run) and control it through a [`ScannerHandle`].
pub struct Scanner {
    actor: ScannerActor,
    command_tx: mpsc::Sender<Command>,
}

impl fmt::Debug for Scanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scanner")
            .field("session", &self.actor.session)
            .field("scheduler", &self.actor.scheduler)
            .field("decode_pending", &self.actor.channel.pending_id())
            .finish_non_exhaustive()
    }
}

impl Scanner {
    pub fn builder(source: impl SourceControl + 'static, worker: DecodeWorker) -> ScannerBuilder {
        ScannerBuilder::new(source, worker)
    }

    /// A handle for controlling this scanner once it runs.
    pub fn handle(&self) -> ScannerHandle {
        ScannerHandle {
            commands: self.command_tx.clone(),
            state: self.actor.state_tx.subscribe(),
            overlay: self.actor.scheduler.subscribe_overlay(),
        }
    }

    /// Run on the current Tokio runtime.
    pub fn spawn(self) -> (ScannerHandle, JoinHandle<()>) {
        let handle = self.handle();
        (handle, tokio::spawn(self.run()))
    }

    /// Process events until the session is destroyed or every handle is
    /// dropped.
    pub async fn run(self) {
        let Scanner { actor, command_tx } = self;
        drop(command_tx);
        actor.run().await;
    }
}

/// The state owned by the scanner task.
struct ScannerActor {
    source: Box<dyn SourceControl>,
    scheduler: FrameScheduler,
    channel: DecodeChannel,
    clock: Box<dyn FrameClock>,
    session: SessionState,
    state_tx: watch::Sender<SessionState>,
    visibility: Option<(VisibilityHub, VisibilitySubscription)>,
    commands: mpsc::Receiver<Command>,
}

impl ScannerActor {
    async fn run(mut self) {
        info!("scanner running");

        loop {
            let event = tokio::select! {
                biased;
                command = self.commands.recv() => LoopEvent::Command(command),
                visibility = next_visibility(&mut self.visibility) => LoopEvent::Visibility(visibility),
                Some(outcome) = self.channel.outcome(), if self.channel.is_pending() => {
                    LoopEvent::Decoded(outcome)
                }
                now = self.clock.next_frame(), if self.session.phase.is_active() => {
                    LoopEvent::Frame(now)
                }
            };

            match event {
                LoopEvent::Command(Some(command)) => self.execute(command).await,
                LoopEvent::Command(None) => {
                    debug!("all scanner handles dropped");
                    self.destroy();
                }
                LoopEvent::Visibility(visibility) => self.on_visibility(visibility).await,
                LoopEvent::Decoded(outcome) => {
                    self.scheduler
                        .complete(Instant::now(), outcome, self.source.as_ref());
                }
                LoopEvent::Frame(now) => {
                    self.scheduler.tick(
                        now,
                        &self.session.phase,
                        self.source.as_mut(),
                        &mut self.channel,
                    );
                }
            }

            if self.session.phase.is_destroyed() {
                break;
            }
        }

        info!("scanner finished");
    }

    async fn execute(&mut self, command: Command) {
        let (result, reply) = match command {
            Command::Start { facing, reply } => {
                self.session.resume_on_visible = false;
                (self.start(facing).await, reply)
            }
            Command::Pause { reply } => (self.pause(), reply),
            Command::Stop { reply } => (self.stop(), reply),
            Command::Destroy { reply } => {
                self.destroy();
                (Ok(()), reply)
            }
        };
        // The caller may have given up waiting.
        let _ = reply.send(result);
    }

    // ── Lifecycle ────────────────────────────────────────────────

    async fn start(&mut self, facing: FacingMode) -> Result<(), ScanError> {
        if self.session.phase.is_destroyed() {
            debug!("start ignored: scanner destroyed");
            return Ok(());
        }

        if !self.source.request_access().await {
            warn!("frame source access denied");
            return Err(ScanError::AccessDenied);
        }

        if self.session.phase.is_active() && self.source.is_bound() && !self.source.is_paused() {
            return Ok(());
        }

        if !self.source.is_bound() {
            self.source.bind(facing).await?;
        }
        self.source.play().await?;
        self.source.set_mirrored(facing.mirrors());

        if !self.session.phase.is_active() {
            self.session.phase.activate()?;
        }
        self.session.facing = facing;
        self.scheduler.reset();
        self.scheduler.refresh_scan_area(self.source.as_ref());
        self.publish();

        info!(?facing, "scanning started");
        Ok(())
    }

    fn pause(&mut self) -> Result<(), ScanError> {
        if !self.session.phase.is_active() {
            debug!(phase = %self.session.phase, "pause ignored");
            return Ok(());
        }

        let poster = self.snapshot();
        self.source.set_poster(poster);
        self.source.release();
        self.session.phase.pause()?;
        self.publish();

        info!("scanning paused");
        Ok(())
    }

    fn snapshot(&mut self) -> Option<PixelBuffer> {
        if !self.source.ready_state().has_current_data() {
            return None;
        }
        let full = Rect::from_size(self.source.frame_size()).to_pixel_rect(self.source.frame_size())?;
        match self.source.read_pixels(full) {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!("could not snapshot frame for pause: {e}");
                None
            }
        }
    }

    fn stop(&mut self) -> Result<(), ScanError> {
        if self.session.phase.is_destroyed() {
            return Ok(());
        }

        self.source.release();
        self.source.set_poster(None);
        self.session.phase.stop()?;
        self.session.resume_on_visible = false;
        self.scheduler.clear_overlay();
        self.publish();

        info!("scanning stopped");
        Ok(())
    }

    fn destroy(&mut self) {
        if self.session.phase.is_destroyed() {
            return;
        }

        // Cannot fail before Destroyed.
        let _ = self.stop();
        if let Some((hub, mut subscription)) = self.visibility.take() {
            hub.unsubscribe(&subscription);
            subscription.close();
        }
        self.channel.shutdown();
        self.session.phase.destroy();
        self.publish();

        info!("scanner destroyed");
    }

    async fn on_visibility(&mut self, visibility: Visibility) {
        match visibility {
            Visibility::Hidden if self.session.phase.is_active() => {
                self.session.resume_on_visible = true;
                if let Err(e) = self.pause() {
                    warn!("auto-pause failed: {e}");
                }
            }
            Visibility::Visible if self.session.resume_on_visible => {
                self.session.resume_on_visible = false;
                let facing = self.session.facing;
                if let Err(e) = self.start(facing).await {
                    warn!("auto-resume failed: {e}");
                    self.publish();
                }
            }
            _ => {}
        }
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.session);
    }
}

async fn next_visibility(
    visibility: &mut Option<(VisibilityHub, VisibilitySubscription)>,
) -> Visibility {
    if let Some((_, subscription)) = visibility.as_mut() {
        if let Some(change) = subscription.changed().await {
            return change;
        }
    }
    future::pending().await
}

// ── ScannerHandle ────────────────────────────────────────────────

/// Cloneable control surface of a running [`Scanner`].
#[derive(Debug, Clone)]
pub struct ScannerHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<SessionState>,
    overlay: watch::Receiver<Overlay>,
}

impl ScannerHandle {
    /// Bind the source for `facing` and begin sampling.
    ///
    /// A no-op if already scanning or destroyed.
    pub async fn start(&self, facing: FacingMode) -> Result<(), ScanError> {
        self.request(|reply| Command::Start { facing, reply }).await
    }

    /// Snapshot a still, release the source, and stop sampling.
    pub async fn pause(&self) -> Result<(), ScanError> {
        self.request(|reply| Command::Pause { reply }).await
    }

    /// Release the source and return to idle.
    pub async fn stop(&self) -> Result<(), ScanError> {
        self.request(|reply| Command::Stop { reply }).await
    }

    /// Release everything for good. Idempotent.
    pub async fn destroy(&self) -> Result<(), ScanError> {
        self.request(|reply| Command::Destroy { reply }).await
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    pub fn subscribe_overlay(&self) -> watch::Receiver<Overlay> {
        self.overlay.clone()
    }

    async fn request(&self, command: impl FnOnce(Reply) -> Command) -> Result<(), ScanError> {
        let (reply, response) = oneshot::channel();
        let sent: Result<(), ScanError> = async {
            self.commands.send(command(reply)).await?;
            response.await?
        }
        .await;
        match sent {
            // Once destroyed the task is gone; further commands are no-ops.
            Err(ScanError::ChannelClosed) if self.state().phase.is_destroyed() => Ok(()),
            other => other,
        }
    }
}
