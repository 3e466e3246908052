//! The frame-sampling scheduler.
//!
//! Every frame-timing signal is offered to [`FrameScheduler::tick`], which
//! decides whether to crop and dispatch or to skip:
//!
//! ```text
//!   signal ─► inactive? ─► throttled? ─► busy? ─► not ready? ─► accept
//!                │             │           │          │           │
//!                ▼             ▼           ▼          ▼           ▼
//!              skip          skip        skip       skip     scan area
//!                                                             crop
//!                                                             submit ─► busy
//! ```
//!
//! When the decode channel resolves, [`FrameScheduler::complete`] maps the
//! result out of crop space, reports it, and clears the busy flag so the
//! next signal can be accepted. Frames arriving while busy are dropped,
//! never queued.

use std::fmt;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::config::ScanConfig;
use crate::decode::{DecodeChannel, DecodeOutcome, DecodedSymbol, RequestId};
use crate::events::{DecodeFailure, Detection, Overlay, ScanEvents};
use crate::frame::FrameSource;
use crate::geometry::{
    Rect, RenderLayout, bounding_rect, crop_point_to_source, default_scan_area, source_to_render,
};
use crate::session::SessionPhase;

/// Computes the scan area, in source pixels, from the current layout.
pub type ScanAreaFn = Box<dyn Fn(&RenderLayout) -> Rect + Send + Sync + 'static>;

/// What a single tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// The session is not active.
    Inactive,
    /// Less than one scan interval since the last accepted tick.
    Throttled,
    /// A decode is still in flight.
    Busy,
    /// The source has no current frame, has ended, or is paused.
    NotReady,
    /// A cropped frame went to the decoder.
    Dispatched(RequestId),
    /// The tick was accepted but nothing could be dispatched.
    Failed(DecodeFailure),
}

// ── FrameScheduler ───────────────────────────────────────────────

pub struct FrameScheduler {
    interval: Duration,
    recompute_on_throttle: bool,
    debug: bool,
    calc_scan_area: ScanAreaFn,
    /// Area of the frame most recently dispatched.
    scan_area: Option<Rect>,
    last_tick: Option<Instant>,
    processing: bool,
    events: ScanEvents,
    overlay: watch::Sender<Overlay>,
}

impl fmt::Debug for FrameScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameScheduler")
            .field("interval", &self.interval)
            .field("recompute_on_throttle", &self.recompute_on_throttle)
            .field("debug", &self.debug)
            .field("scan_area", &self.scan_area)
            .field("last_tick", &self.last_tick)
            .field("processing", &self.processing)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

impl FrameScheduler {
    /// `calc_scan_area` defaults to [`default_scan_area`] of the frame size.
    pub fn new(config: &ScanConfig, calc_scan_area: Option<ScanAreaFn>, events: ScanEvents) -> Self {
        let (overlay, _) = watch::channel(Overlay::default());
        Self {
            interval: config.scan_interval(),
            recompute_on_throttle: config.recompute_on_throttle,
            debug: config.debug,
            calc_scan_area: calc_scan_area.unwrap_or_else(|| -> ScanAreaFn {
                Box::new(|layout: &RenderLayout| default_scan_area(layout.source))
            }),
            scan_area: None,
            last_tick: None,
            processing: false,
            events,
            overlay,
        }
    }

    pub fn scan_area(&self) -> Option<Rect> {
        self.scan_area
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn subscribe_overlay(&self) -> watch::Receiver<Overlay> {
        self.overlay.subscribe()
    }

    /// Forget the rate-limit timestamp so the next ready frame is taken
    /// immediately.
    pub fn reset(&mut self) {
        self.last_tick = None;
    }

    /// Offer one frame-timing signal.
    ///
    /// The rate limit is measured from the last accepted tick or decode
    /// completion. A throttled tick leaves that reference point alone, so a
    /// clock faster than the scan rate still gets a frame through once per
    /// interval.
    pub fn tick<S>(
        &mut self,
        now: Instant,
        phase: &SessionPhase,
        source: &mut S,
        channel: &mut DecodeChannel,
    ) -> TickOutcome
    where
        S: FrameSource + ?Sized,
    {
        if !phase.is_active() {
            return TickOutcome::Inactive;
        }

        if let Some(last) = self.last_tick {
            if now.saturating_duration_since(last) < self.interval {
                if self.recompute_on_throttle {
                    self.refresh_scan_area(&*source);
                }
                trace!("tick throttled");
                return TickOutcome::Throttled;
            }
        }

        if self.processing {
            trace!("tick skipped: decode in flight");
            return TickOutcome::Busy;
        }

        if !source.ready_state().has_current_data()
            || source.is_ended()
            || source.is_paused()
            || !source.frame_size().is_valid()
        {
            trace!(ready = ?source.ready_state(), "tick skipped: source not ready");
            return TickOutcome::NotReady;
        }

        self.last_tick = Some(now);
        self.sample(source, channel)
    }

    fn sample<S>(&mut self, source: &mut S, channel: &mut DecodeChannel) -> TickOutcome
    where
        S: FrameSource + ?Sized,
    {
        let layout = source.render_layout();
        let requested = (self.calc_scan_area)(&layout);
        let Some(pixels) = requested.to_pixel_rect(layout.source) else {
            return self.fail(DecodeFailure::Capture(format!(
                "scan area {requested:?} lies outside the {}x{} frame",
                layout.source.width, layout.source.height
            )));
        };

        let area = Rect::from(pixels);
        self.scan_area = Some(area);
        self.publish_scan_area(area, &layout);

        let crop = match source.read_pixels(pixels) {
            Ok(crop) => crop,
            Err(e) => return self.fail(DecodeFailure::Capture(e.to_string())),
        };

        if self.debug {
            self.events.frame(&crop);
        }

        match channel.submit(crop) {
            Ok(id) => {
                self.processing = true;
                debug!(%id, ?area, "frame dispatched");
                TickOutcome::Dispatched(id)
            }
            Err(e) => self.fail(DecodeFailure::Transport(e.to_string())),
        }
    }

    fn fail(&mut self, failure: DecodeFailure) -> TickOutcome {
        warn!(%failure, "frame not dispatched");
        self.events.failure(&failure);
        TickOutcome::Failed(failure)
    }

    /// Apply a resolved decode and re-arm for the next tick.
    ///
    /// Returns the detection delivered to the success callback, if any.
    pub fn complete<S>(&mut self, now: Instant, outcome: DecodeOutcome, source: &S) -> Option<Detection>
    where
        S: FrameSource + ?Sized,
    {
        self.processing = false;
        self.last_tick = Some(now);

        let failure = match outcome {
            DecodeOutcome::Found(symbol) => {
                let detection = self.locate(symbol, &source.render_layout());
                debug!(value = %detection.raw_value, area = ?detection.source_area, "symbol found");
                self.overlay.send_modify(|overlay| {
                    overlay.detected = Some(detection.source_area);
                    overlay.detected_render = detection.render_area;
                });
                self.events.success(&detection);
                return Some(detection);
            }
            DecodeOutcome::Absent => DecodeFailure::NoSymbol,
            DecodeOutcome::Timeout(after) => DecodeFailure::Timeout(after),
            DecodeOutcome::TransportFailure(reason) => DecodeFailure::Transport(reason),
        };

        if failure.is_error() {
            warn!(%failure, "decode failed");
        } else {
            trace!("no symbol in frame");
        }
        self.overlay.send_modify(Overlay::clear_detection);
        self.events.failure(&failure);
        None
    }

    fn locate(&self, symbol: DecodedSymbol, layout: &RenderLayout) -> Detection {
        let origin = self.scan_area.unwrap_or_default();
        let corner_points = symbol
            .corner_points
            .map(|p| crop_point_to_source(p, &origin));
        let source_area = bounding_rect(&corner_points).unwrap_or_default();
        let render_area = layout
            .is_valid()
            .then(|| source_to_render(source_area, layout));

        Detection {
            raw_value: symbol.raw_value,
            format: symbol.format,
            corner_points,
            source_area,
            render_area,
        }
    }

    /// Recompute the scan area for the current layout and publish it
    /// without sampling.
    pub fn refresh_scan_area<S>(&mut self, source: &S) -> Option<Rect>
    where
        S: FrameSource + ?Sized,
    {
        let layout = source.render_layout();
        if !layout.source.is_valid() {
            return None;
        }
        let area = Rect::from((self.calc_scan_area)(&layout).to_pixel_rect(layout.source)?);
        self.publish_scan_area(area, &layout);
        Some(area)
    }

    fn publish_scan_area(&self, area: Rect, layout: &RenderLayout) {
        let render = layout.is_valid().then(|| source_to_render(area, layout));
        self.overlay.send_if_modified(|overlay| {
            let changed = overlay.scan_area != Some(area) || overlay.scan_area_render != render;
            overlay.scan_area = Some(area);
            overlay.scan_area_render = render;
            changed
        });
    }

    /// Drop every overlay rectangle.
    pub fn clear_overlay(&self) {
        self.overlay.send_replace(Overlay::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{DecodeWorker, DecoderFault, WorkerEndpoint, DEFAULT_DECODE_TIMEOUT};
    use crate::frame::{FacingMode, MemoryFrameSource, PixelBuffer, ReadyState, SourceControl};
    use crate::geometry::{Point, Size};
    use std::sync::{Arc, Mutex};

    #[derive(Default, Clone)]
    struct Seen {
        detections: Arc<Mutex<Vec<Detection>>>,
        failures: Arc<Mutex<Vec<DecodeFailure>>>,
        frames: Arc<Mutex<Vec<(u32, u32)>>>,
    }

    fn events(seen: &Seen) -> ScanEvents {
        let detections = seen.detections.clone();
        let failures = seen.failures.clone();
        let frames = seen.frames.clone();
        let mut events = ScanEvents::new(Box::new(move |d: &Detection| {
            detections.lock().unwrap().push(d.clone());
        }));
        events.on_failure = Some(Box::new(move |f: &DecodeFailure| {
            failures.lock().unwrap().push(f.clone());
        }));
        events.on_frame = Some(Box::new(move |b: &PixelBuffer| {
            frames.lock().unwrap().push((b.width, b.height));
        }));
        events
    }

    fn square_corners(
        _: &PixelBuffer,
    ) -> Result<Option<DecodedSymbol>, DecoderFault> {
        Ok(Some(DecodedSymbol {
            raw_value: "hello".into(),
            format: "qr_code".into(),
            corner_points: [
                Point::new(4.0, 4.0),
                Point::new(20.0, 4.0),
                Point::new(20.0, 20.0),
                Point::new(4.0, 20.0),
            ],
        }))
    }

    async fn live_source() -> MemoryFrameSource {
        let mut source = MemoryFrameSource::new(PixelBuffer::solid(64, 48, [200, 200, 200, 255]));
        source.bind(FacingMode::Environment).await.unwrap();
        source.play().await.unwrap();
        source
    }

    fn active() -> SessionPhase {
        let mut phase = SessionPhase::Idle;
        phase.activate().unwrap();
        phase
    }

    fn channel() -> (DecodeChannel, WorkerEndpoint) {
        let (worker, endpoint) = DecodeWorker::endpoint();
        (DecodeChannel::new(worker, DEFAULT_DECODE_TIMEOUT), endpoint)
    }

    #[tokio::test]
    async fn inactive_session_skips() {
        let seen = Seen::default();
        let mut scheduler = FrameScheduler::new(&ScanConfig::default(), None, events(&seen));
        let mut source = live_source().await;
        let (mut channel, _endpoint) = channel();

        for phase in [SessionPhase::Idle, SessionPhase::Paused, SessionPhase::Destroyed] {
            let outcome = scheduler.tick(Instant::now(), &phase, &mut source, &mut channel);
            assert_eq!(outcome, TickOutcome::Inactive);
        }
        assert!(!channel.is_pending());
    }

    #[tokio::test]
    async fn rate_limit_boundary() {
        let seen = Seen::default();
        let mut scheduler = FrameScheduler::new(&ScanConfig::default(), None, events(&seen));
        let mut source = live_source().await;
        let (mut channel, endpoint) = channel();
        tokio::spawn(endpoint.serve(square_corners));
        let phase = active();

        let t0 = Instant::now();
        assert!(matches!(
            scheduler.tick(t0, &phase, &mut source, &mut channel),
            TickOutcome::Dispatched(_)
        ));
        let outcome = channel.outcome().await.unwrap();
        scheduler.complete(t0, outcome, &source);

        assert_eq!(
            scheduler.tick(t0 + Duration::from_micros(41_600), &phase, &mut source, &mut channel),
            TickOutcome::Throttled
        );
        // The throttled tick did not move the window forward.
        assert!(matches!(
            scheduler.tick(t0 + Duration::from_micros(41_670), &phase, &mut source, &mut channel),
            TickOutcome::Dispatched(_)
        ));
    }

    #[tokio::test]
    async fn fast_clock_still_samples_at_scan_rate() {
        let seen = Seen::default();
        let mut scheduler = FrameScheduler::new(&ScanConfig::default(), None, events(&seen));
        let mut source = live_source().await;
        let (mut channel, endpoint) = channel();
        tokio::spawn(endpoint.serve(square_corners));
        let phase = active();

        let t0 = Instant::now();
        let mut accepted = 0;
        for i in 0..60u64 {
            let now = t0 + Duration::from_micros(i * 16_667);
            if let TickOutcome::Dispatched(_) = scheduler.tick(now, &phase, &mut source, &mut channel)
            {
                accepted += 1;
                let outcome = channel.outcome().await.unwrap();
                scheduler.complete(now, outcome, &source);
            }
        }
        assert_eq!(accepted, 20);
    }

    #[tokio::test]
    async fn busy_while_decode_in_flight() {
        let seen = Seen::default();
        let mut scheduler = FrameScheduler::new(&ScanConfig::default(), None, events(&seen));
        let mut source = live_source().await;
        let (mut channel, _endpoint) = channel();
        let phase = active();

        let t0 = Instant::now();
        let TickOutcome::Dispatched(id) = scheduler.tick(t0, &phase, &mut source, &mut channel)
        else {
            panic!("first tick should dispatch");
        };
        assert!(scheduler.is_processing());
        assert_eq!(
            scheduler.tick(t0 + Duration::from_secs(1), &phase, &mut source, &mut channel),
            TickOutcome::Busy
        );
        assert_eq!(channel.pending_id(), Some(id));
        assert!(seen.failures.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unready_source_does_not_advance_timestamp() {
        let seen = Seen::default();
        let mut scheduler = FrameScheduler::new(&ScanConfig::default(), None, events(&seen));
        let mut source = live_source().await;
        let (mut channel, _endpoint) = channel();
        let phase = active();
        let t0 = Instant::now();

        source.set_ready_state(ReadyState::HaveMetadata);
        assert_eq!(scheduler.tick(t0, &phase, &mut source, &mut channel), TickOutcome::NotReady);

        source.set_ready_state(ReadyState::HaveCurrentData);
        source.set_ended(true);
        assert_eq!(scheduler.tick(t0, &phase, &mut source, &mut channel), TickOutcome::NotReady);

        // Neither skip counted as an accepted tick.
        source.set_ended(false);
        assert!(matches!(
            scheduler.tick(t0 + Duration::from_millis(1), &phase, &mut source, &mut channel),
            TickOutcome::Dispatched(_)
        ));
    }

    #[tokio::test]
    async fn found_symbol_is_mapped_to_source_space() {
        let seen = Seen::default();
        let config = ScanConfig {
            debug: true,
            ..Default::default()
        };
        let mut scheduler = FrameScheduler::new(&config, None, events(&seen));
        let overlay = scheduler.subscribe_overlay();
        let mut source = live_source().await;
        let (mut channel, endpoint) = channel();
        tokio::spawn(endpoint.serve(square_corners));
        let phase = active();

        scheduler.tick(Instant::now(), &phase, &mut source, &mut channel);
        assert_eq!(scheduler.scan_area(), Some(Rect::new(16.0, 8.0, 32.0, 32.0)));
        assert_eq!(*seen.frames.lock().unwrap(), vec![(32, 32)]);

        let outcome = channel.outcome().await.unwrap();
        let detection = scheduler.complete(Instant::now(), outcome, &source).unwrap();
        assert!(!scheduler.is_processing());

        assert_eq!(detection.raw_value, "hello");
        assert_eq!(detection.source_area, Rect::new(20.0, 12.0, 16.0, 16.0));
        assert_eq!(detection.corner_points[0], Point::new(20.0, 12.0));
        // Display box equals the frame, so render space is source space.
        assert_eq!(detection.render_area, Some(Rect::new(20.0, 12.0, 16.0, 16.0)));

        let overlay = overlay.borrow().clone();
        assert_eq!(overlay.scan_area, Some(Rect::new(16.0, 8.0, 32.0, 32.0)));
        assert_eq!(overlay.detected, Some(Rect::new(20.0, 12.0, 16.0, 16.0)));
        assert_eq!(seen.detections.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn absent_and_timeout_are_distinguishable() {
        let seen = Seen::default();
        let mut scheduler = FrameScheduler::new(&ScanConfig::default(), None, events(&seen));
        let source = live_source().await;

        scheduler.complete(Instant::now(), DecodeOutcome::Absent, &source);
        scheduler.complete(
            Instant::now(),
            DecodeOutcome::Timeout(Duration::from_secs(1)),
            &source,
        );

        let failures = seen.failures.lock().unwrap();
        assert_eq!(failures.len(), 2);
        assert!(!failures[0].is_error());
        assert_eq!(failures[1], DecodeFailure::Timeout(Duration::from_secs(1)));
        assert!(seen.detections.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn scan_area_outside_frame_fails_tick() {
        let seen = Seen::default();
        let calc: ScanAreaFn = Box::new(|_: &RenderLayout| Rect::new(500.0, 500.0, 10.0, 10.0));
        let mut scheduler = FrameScheduler::new(&ScanConfig::default(), Some(calc), events(&seen));
        let mut source = live_source().await;
        let (mut channel, _endpoint) = channel();

        let outcome = scheduler.tick(Instant::now(), &active(), &mut source, &mut channel);
        assert!(matches!(outcome, TickOutcome::Failed(DecodeFailure::Capture(_))));
        assert!(!scheduler.is_processing());
        assert_eq!(seen.failures.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn custom_scan_area_is_clamped() {
        let seen = Seen::default();
        let calc: ScanAreaFn = Box::new(|layout: &RenderLayout| {
            Rect::new(layout.source.width - 10.0, -4.0, 20.0, 20.0)
        });
        let mut scheduler = FrameScheduler::new(&ScanConfig::default(), Some(calc), events(&seen));
        let mut source = live_source().await;
        let (mut channel, _endpoint) = channel();

        scheduler.tick(Instant::now(), &active(), &mut source, &mut channel);
        assert_eq!(scheduler.scan_area(), Some(Rect::new(54.0, 0.0, 10.0, 16.0)));
    }

    #[tokio::test]
    async fn throttled_tick_can_refresh_overlay() {
        let seen = Seen::default();
        let config = ScanConfig {
            recompute_on_throttle: true,
            ..Default::default()
        };
        let mut scheduler = FrameScheduler::new(&config, None, events(&seen));
        let mut overlay = scheduler.subscribe_overlay();
        let mut source = live_source().await;
        let (mut channel, _endpoint) = channel();
        let phase = active();
        let t0 = Instant::now();

        scheduler.tick(t0, &phase, &mut source, &mut channel);
        let _ = overlay.borrow_and_update();

        source.set_display(Size::new(32.0, 24.0));
        assert_eq!(
            scheduler.tick(t0 + Duration::from_millis(1), &phase, &mut source, &mut channel),
            TickOutcome::Throttled
        );
        assert!(overlay.has_changed().unwrap());
        assert_eq!(
            overlay.borrow().scan_area_render,
            Some(Rect::new(8.0, 4.0, 16.0, 16.0))
        );
    }
}
