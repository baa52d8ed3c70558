//! Async host loop for one session
//!
//! Everything runs on a single task: timer ticks, pipeline events and the
//! outstanding clock fetch are multiplexed with `tokio::select!`, so a tick
//! always runs to completion before anything else touches the session.

use reqwest::Url;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use crate::clock::{ClockOffsetEstimator, ReferenceClock, SyncOutcome, WallClock};
use crate::error::Result;
use crate::pipeline::{PipelineFactory, PipelineNotice};
use crate::scheduler::{TimerId, TokioScheduler};
use crate::session::{AttachTicket, Session};

type FetchFuture = Pin<Box<dyn Future<Output = SyncOutcome> + Send>>;

struct PendingFetch {
    ticket: AttachTicket,
    future: FetchFuture,
}

/// Drives a [`Session`] from tokio timers and pipeline events
pub struct SessionRunner<F: PipelineFactory, R, W> {
    session: Session<F, TokioScheduler>,
    ticks: mpsc::UnboundedReceiver<TimerId>,
    pipeline_events: mpsc::UnboundedReceiver<PipelineNotice>,
    estimator: Arc<ClockOffsetEstimator<R, W>>,
}

impl<F, R, W> SessionRunner<F, R, W>
where
    F: PipelineFactory,
    R: ReferenceClock + 'static,
    W: WallClock + 'static,
{
    pub fn new(
        session: Session<F, TokioScheduler>,
        ticks: mpsc::UnboundedReceiver<TimerId>,
        pipeline_events: mpsc::UnboundedReceiver<PipelineNotice>,
        estimator: ClockOffsetEstimator<R, W>,
    ) -> Self {
        Self {
            session,
            ticks,
            pipeline_events,
            estimator: Arc::new(estimator),
        }
    }

    pub fn session(&self) -> &Session<F, TokioScheduler> {
        &self.session
    }

    fn fetch_for(&self, ticket: AttachTicket) -> PendingFetch {
        let estimator = Arc::clone(&self.estimator);
        let prior = self.session.snapshot();
        PendingFetch {
            ticket,
            future: Box::pin(async move { estimator.fetch_sync_snapshot(prior).await }),
        }
    }

    /// Attach `source` and run until `shutdown` resolves, then detach
    ///
    /// `shutdown` is the navigation-away signal: no tick runs after it fires.
    /// Returns the session so callers can inspect its final diagnostics.
    pub async fn run(
        mut self,
        source: Url,
        shutdown: impl Future<Output = ()>,
    ) -> Result<Session<F, TokioScheduler>> {
        let ticket = self.session.attach(source)?;
        let mut pending = Some(self.fetch_for(ticket));
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("Shutdown requested; detaching session {}", self.session.id());
                    self.session.detach();
                    break;
                }

                outcome = wait_for_fetch(&mut pending), if pending.is_some() => {
                    if let Some(done) = pending.take() {
                        self.session.apply_sync(done.ticket, outcome);
                    }
                }

                Some(notice) = self.pipeline_events.recv() => {
                    if let Some(ticket) = self.session.handle_pipeline_event(notice) {
                        // Replaces any fetch still outstanding for the old attach
                        pending = Some(self.fetch_for(ticket));
                    }
                }

                Some(timer) = self.ticks.recv() => {
                    self.session.on_timer(timer);
                }
            }
        }

        Ok(self.session)
    }
}

async fn wait_for_fetch(pending: &mut Option<PendingFetch>) -> SyncOutcome {
    match pending {
        Some(fetch) => fetch.future.as_mut().await,
        None => std::future::pending().await,
    }
}
