//! Session lifecycle: attach, detach, fatal-error re-attach
//!
//! A session owns exactly one controller, its timer and its pipeline binding.
//! `attach` always tears the previous binding down first, so two controllers
//! never run for the same session. Every attach gets a new generation number;
//! ticks, pipeline events and clock results that belong to an older attach
//! are dropped.

use reqwest::Url;
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;
use wsd_common::config::ControllerConfig;
use wsd_common::events::SyncEvent;

use crate::clock::{SyncOutcome, SyncSnapshot};
use crate::controller::{LatencyController, TickOutcome};
use crate::diagnostics::{ConnectionStatus, Diagnostics, SYNC_UNAVAILABLE};
use crate::error::Result;
use crate::pipeline::{
    EventSink, MediaPipeline, PipelineEvent, PipelineFactory, PipelineNotice, PlayError,
};
use crate::scheduler::{Scheduler, TimerId};

/// Returned by a successful attach; identifies the clock fetch to issue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachTicket {
    pub generation: u64,
}

/// One listener's connection to one stream
pub struct Session<F: PipelineFactory, S: Scheduler> {
    id: Uuid,
    factory: F,
    scheduler: S,
    sink: EventSink,
    controller: LatencyController<F::Pipeline>,
    stream_source: Option<Url>,
    timer: Option<TimerId>,
    generation: u64,
    snapshot: SyncSnapshot,
    diagnostics: Diagnostics,
    event_tx: broadcast::Sender<SyncEvent>,
}

impl<F: PipelineFactory, S: Scheduler> Session<F, S> {
    pub fn new(
        factory: F,
        scheduler: S,
        sink: EventSink,
        tuning: ControllerConfig,
        initial: SyncSnapshot,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            id: Uuid::new_v4(),
            factory,
            scheduler,
            sink,
            controller: LatencyController::new(tuning),
            stream_source: None,
            timer: None,
            generation: 0,
            snapshot: initial,
            diagnostics: Diagnostics::new(initial.target_latency_seconds),
            event_tx,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_attached(&self) -> bool {
        self.stream_source.is_some()
    }

    pub fn stream_source(&self) -> Option<&Url> {
        self.stream_source.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Timer of the running controller, if any
    pub fn active_timer(&self) -> Option<TimerId> {
        self.timer
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        self.snapshot
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn controller(&self) -> &LatencyController<F::Pipeline> {
        &self.controller
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Subscribe to session events
    pub fn subscribe_events(&self) -> broadcast::Receiver<SyncEvent> {
        self.event_tx.subscribe()
    }

    fn broadcast_event(&self, event: SyncEvent) {
        debug!("Session {} event {}", self.id, event.event_type());
        // No receivers is fine
        let _ = self.event_tx.send(event);
    }

    /// Bind to `source`, replacing whatever was attached before
    ///
    /// The controller starts with the current snapshot's target; the caller
    /// issues the reference clock fetch for the returned ticket. A refused
    /// `play()` leaves the controller running with a "tap to play" status.
    pub fn attach(&mut self, source: Url) -> Result<AttachTicket> {
        self.attach_with(source, false)
    }

    fn attach_with(&mut self, source: Url, reconnecting: bool) -> Result<AttachTicket> {
        self.detach();

        self.generation += 1;
        let generation = self.generation;
        self.diagnostics.status = ConnectionStatus::Connecting;

        let events = self.sink.for_generation(generation);
        let pipeline = match self.factory.open(&source, events) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                warn!("Failed to open pipeline for {}: {}", source, e);
                self.diagnostics.reset();
                return Err(e);
            }
        };

        if let Err(e) = self
            .controller
            .start(pipeline, self.snapshot.target_latency_seconds)
        {
            self.diagnostics.reset();
            return Err(e);
        }
        self.timer = Some(self.scheduler.arm(self.controller.tuning().tick_period()));
        self.stream_source = Some(source.clone());
        self.diagnostics.target_latency_seconds = self.snapshot.target_latency_seconds;

        info!("Session {} attached to {} (generation {})", self.id, source, generation);
        self.broadcast_event(SyncEvent::Attached {
            session_id: self.id,
            source: source.to_string(),
            timestamp: wsd_common::time::now(),
        });

        self.start_playback(reconnecting);

        Ok(AttachTicket { generation })
    }

    /// Try to start playback, tolerating host refusal
    ///
    /// After a fatal-error re-attach the status stays "Reconnecting" until the
    /// new pipeline proves itself (manifest ready or a measured tick).
    fn start_playback(&mut self, reconnecting: bool) {
        let Some(pipeline) = self.controller.pipeline_mut() else {
            return;
        };

        match pipeline.play() {
            Ok(()) if reconnecting => self.diagnostics.status = ConnectionStatus::Reconnecting,
            Ok(()) => self.diagnostics.status = ConnectionStatus::Playing,
            Err(e) => {
                match &e {
                    PlayError::AutoplayBlocked => info!("{}; waiting for user gesture", e),
                    PlayError::Rejected(_) => warn!("{}; waiting for user gesture", e),
                }
                self.diagnostics.status = ConnectionStatus::TapToPlay;
                self.broadcast_event(SyncEvent::AutoplayBlocked {
                    session_id: self.id,
                    timestamp: wsd_common::time::now(),
                });
            }
        }
    }

    fn mark_recovered(&mut self) {
        if self.diagnostics.status == ConnectionStatus::Reconnecting {
            info!("Session {} recovered", self.id);
            self.diagnostics.status = ConnectionStatus::Playing;
        }
    }

    /// User gesture after "tap to play"
    pub fn resume_playback(&mut self) {
        if self.is_attached() {
            self.start_playback(false);
        }
    }

    /// Cancel the tick, release the pipeline, reset to "not connected"
    ///
    /// Safe to call when already detached. Returns whether anything was torn down.
    pub fn detach(&mut self) -> bool {
        if let Some(timer) = self.timer.take() {
            self.scheduler.cancel(timer);
        }

        let released = match self.controller.stop() {
            Some(mut pipeline) => {
                pipeline.release();
                true
            }
            None => false,
        };

        let was_attached = self.stream_source.take().is_some();
        self.diagnostics.reset();

        if was_attached || released {
            info!("Session {} detached", self.id);
            self.broadcast_event(SyncEvent::Detached {
                session_id: self.id,
                timestamp: wsd_common::time::now(),
            });
        }
        was_attached || released
    }

    /// Run one controller tick if `timer` is the current one
    pub fn on_timer(&mut self, timer: TimerId) -> TickOutcome {
        if self.timer != Some(timer) {
            debug!("Dropping tick from stale timer {}", timer.as_u64());
            return TickOutcome::Inactive;
        }

        let outcome = self.controller.tick(Instant::now());
        match outcome {
            TickOutcome::Corrected { sample, decision } => {
                self.diagnostics.measured_latency_seconds = sample.measured_latency_seconds;
                self.diagnostics.rate_multiplier = decision.rate_multiplier;
                self.mark_recovered();
            }
            TickOutcome::NoCorrection { .. } => {
                self.diagnostics.measured_latency_seconds = None;
                self.diagnostics.rate_multiplier = 1.0;
            }
            TickOutcome::Inactive => return outcome,
        }

        if let Some(decision) = outcome.decision() {
            self.broadcast_event(SyncEvent::Tick {
                session_id: self.id,
                measured_latency_seconds: self.diagnostics.measured_latency_seconds,
                rate_multiplier: decision.rate_multiplier,
                seek_adjustment_seconds: decision.seek_adjustment_seconds,
                timestamp: wsd_common::time::now(),
            });
        }
        outcome
    }

    /// React to a pipeline event
    ///
    /// A fatal error re-attaches the same source immediately and returns the
    /// new ticket. Events from an older attach are ignored.
    pub fn handle_pipeline_event(&mut self, notice: PipelineNotice) -> Option<AttachTicket> {
        if notice.generation != self.generation || !self.is_attached() {
            debug!(
                "Ignoring {:?} from generation {} (current {})",
                notice.event, notice.generation, self.generation
            );
            return None;
        }

        match notice.event {
            PipelineEvent::ManifestReady => {
                debug!("Manifest ready");
                self.mark_recovered();
                None
            }
            PipelineEvent::BufferLevelChanged { seconds } => {
                debug!("Buffer level {:.2}s", seconds);
                None
            }
            PipelineEvent::Error {
                fatal: false,
                details,
            } => {
                warn!("Non-fatal pipeline error: {}", details);
                None
            }
            PipelineEvent::Error {
                fatal: true,
                details,
            } => {
                let source = self.stream_source.clone()?;
                // Unconditional retry, no backoff or cap
                self.diagnostics.fatal_reattaches += 1;
                warn!(
                    "Fatal pipeline error ({}); re-attaching {} (attempt {})",
                    details, source, self.diagnostics.fatal_reattaches
                );
                self.broadcast_event(SyncEvent::FatalErrorReattach {
                    session_id: self.id,
                    source: source.to_string(),
                    details,
                    attempt: self.diagnostics.fatal_reattaches,
                    timestamp: wsd_common::time::now(),
                });

                match self.attach_with(source, true) {
                    Ok(ticket) => Some(ticket),
                    Err(e) => {
                        warn!("Re-attach failed: {}", e);
                        None
                    }
                }
            }
        }
    }

    /// Fold a reference clock result into the session
    ///
    /// Results for an older attach are dropped.
    pub fn apply_sync(&mut self, ticket: AttachTicket, outcome: SyncOutcome) {
        if ticket.generation != self.generation {
            debug!("Dropping clock result for generation {}", ticket.generation);
            return;
        }

        match outcome {
            SyncOutcome::Refreshed(snapshot) => {
                self.snapshot = snapshot;
                if let Err(e) = self.controller.set_target(snapshot.target_latency_seconds) {
                    warn!("Controller refused target: {}", e);
                }
                self.diagnostics.sync_status = None;
                self.diagnostics.clock_offset_ms = Some(snapshot.clock_offset_ms);
                self.diagnostics.target_latency_seconds = snapshot.target_latency_seconds;
                info!(
                    "Clock offset {} ms, target latency {}s",
                    snapshot.clock_offset_ms, snapshot.target_latency_seconds
                );
                self.broadcast_event(SyncEvent::SnapshotRefreshed {
                    session_id: self.id,
                    clock_offset_ms: snapshot.clock_offset_ms,
                    target_latency_seconds: snapshot.target_latency_seconds,
                    timestamp: wsd_common::time::now(),
                });
            }
            SyncOutcome::Unavailable { reason, .. } => {
                self.diagnostics.sync_status = Some(SYNC_UNAVAILABLE);
                warn!("{}", reason);
                self.broadcast_event(SyncEvent::SyncUnavailable {
                    session_id: self.id,
                    reason: reason.to_string(),
                    timestamp: wsd_common::time::now(),
                });
            }
        }
    }
}

impl<F: PipelineFactory, S: Scheduler> Drop for Session<F, S> {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::pipeline::{event_channel, PipelineEvents};
    use crate::scheduler::ManualScheduler;
    use std::time::Duration;

    struct NullPipeline;

    impl MediaPipeline for NullPipeline {
        fn current_latency_seconds(&self) -> Option<f64> {
            None
        }
        fn current_position_seconds(&self) -> f64 {
            0.0
        }
        fn set_position_seconds(&mut self, _position: f64) {}
        fn set_playback_rate(&mut self, _rate: f64) {}
        fn play(&mut self) -> std::result::Result<(), PlayError> {
            Ok(())
        }
    }

    struct NullFactory {
        fail: bool,
    }

    impl PipelineFactory for NullFactory {
        type Pipeline = NullPipeline;

        fn open(&mut self, _source: &Url, _events: PipelineEvents) -> Result<NullPipeline> {
            if self.fail {
                Err(SyncError::Pipeline("no media support".to_string()))
            } else {
                Ok(NullPipeline)
            }
        }
    }

    fn session(fail: bool) -> Session<NullFactory, ManualScheduler> {
        let (sink, _rx) = event_channel();
        Session::new(
            NullFactory { fail },
            ManualScheduler::new(),
            sink,
            ControllerConfig::default(),
            SyncSnapshot::initial(2.0).unwrap(),
        )
    }

    fn url() -> Url {
        Url::parse("http://10.0.0.2:3333/app/stream/playlist.m3u8").unwrap()
    }

    #[test]
    fn test_factory_failure_leaves_session_detached() {
        let mut session = session(true);
        assert!(session.attach(url()).is_err());
        assert!(!session.is_attached());
        assert_eq!(session.active_timer(), None);
        assert_eq!(session.scheduler().armed_count(), 0);
        assert_eq!(session.diagnostics().status, ConnectionStatus::NotConnected);
    }

    #[test]
    fn test_stale_clock_result_is_dropped() {
        let mut session = session(false);
        let first = session.attach(url()).unwrap();
        let _second = session.attach(url()).unwrap();

        session.apply_sync(
            first,
            SyncOutcome::Refreshed(SyncSnapshot {
                clock_offset_ms: 5,
                target_latency_seconds: 9.0,
            }),
        );
        assert_eq!(session.snapshot().target_latency_seconds, 2.0);
        assert_eq!(session.diagnostics().clock_offset_ms, None);
    }

    #[test]
    fn test_unavailable_sets_status_and_keeps_target() {
        let mut session = session(false);
        let ticket = session.attach(url()).unwrap();

        session.apply_sync(
            ticket,
            SyncOutcome::Unavailable {
                retained: session.snapshot(),
                reason: SyncError::Unavailable("timed out".to_string()),
            },
        );
        assert_eq!(session.diagnostics().sync_status, Some(SYNC_UNAVAILABLE));
        assert_eq!(session.controller().target_latency_seconds(), 2.0);
        // Still attached and ticking
        assert!(session.is_attached());
        let fired = session.scheduler_mut().advance(Duration::from_millis(1200));
        assert_eq!(fired.len(), 1);
    }

    #[test]
    fn test_refresh_updates_controller_target() {
        let mut session = session(false);
        let ticket = session.attach(url()).unwrap();

        session.apply_sync(
            ticket,
            SyncOutcome::Refreshed(SyncSnapshot {
                clock_offset_ms: -500,
                target_latency_seconds: 3.0,
            }),
        );
        assert_eq!(session.controller().target_latency_seconds(), 3.0);
        assert_eq!(session.diagnostics().clock_offset_ms, Some(-500));
        assert_eq!(session.diagnostics().sync_status, None);
    }

    #[test]
    fn test_detach_publishes_once() {
        let mut session = session(false);
        let mut events = session.subscribe_events();
        session.attach(url()).unwrap();
        assert!(session.detach());
        assert!(!session.detach());

        let mut detached = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, SyncEvent::Detached { .. }) {
                detached += 1;
            }
        }
        assert_eq!(detached, 1);
    }
}
