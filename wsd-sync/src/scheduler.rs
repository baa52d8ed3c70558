//! Periodic timers for the controller tick
//!
//! The session arms one repeating timer per attach and cancels it on detach.
//! Timers report by id; the session ignores any id that is not its current
//! timer, so a tick that was already queued when `cancel` ran never executes.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::debug;

/// Shortest period either scheduler will arm; zero is raised to this
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Identifies one armed timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Source of repeating timers
pub trait Scheduler {
    /// Arm a timer that fires every `period`, first after one period
    fn arm(&mut self, period: Duration) -> TimerId;

    /// Disarm a timer; unknown or already-cancelled ids are ignored
    fn cancel(&mut self, id: TimerId);
}

#[derive(Debug, Clone, Copy)]
struct ManualTimer {
    period: Duration,
    next_due: Duration,
}

/// Deterministic scheduler driven by explicit time advancement
///
/// Used by tests and by hosts that already own an event loop.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    now: Duration,
    next_id: u64,
    timers: BTreeMap<TimerId, ManualTimer>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time elapsed since the scheduler was created
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn is_armed(&self, id: TimerId) -> bool {
        self.timers.contains_key(&id)
    }

    pub fn armed_count(&self) -> usize {
        self.timers.len()
    }

    /// Move time forward and return every firing, in time order
    ///
    /// Simultaneous firings are ordered by timer id.
    pub fn advance(&mut self, by: Duration) -> Vec<TimerId> {
        let until = self.now + by;
        let mut fired = Vec::new();

        loop {
            let due = self
                .timers
                .iter()
                .filter(|(_, timer)| timer.next_due <= until)
                .min_by_key(|(id, timer)| (timer.next_due, **id))
                .map(|(id, timer)| (*id, timer.next_due));

            let Some((id, due_at)) = due else { break };
            self.now = due_at;
            if let Some(timer) = self.timers.get_mut(&id) {
                timer.next_due += timer.period;
            }
            fired.push(id);
        }

        self.now = until;
        fired
    }
}

impl Scheduler for ManualScheduler {
    fn arm(&mut self, period: Duration) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        // A zero period would fire forever within one advance
        let period = period.max(MIN_PERIOD);
        self.timers.insert(
            id,
            ManualTimer {
                period,
                next_due: self.now + period,
            },
        );
        id
    }

    fn cancel(&mut self, id: TimerId) {
        self.timers.remove(&id);
    }
}

/// Scheduler backed by tokio interval tasks
///
/// Each firing is delivered as a `TimerId` on the receiver returned by
/// [`TokioScheduler::new`]. Must be used inside a tokio runtime.
pub struct TokioScheduler {
    tx: mpsc::UnboundedSender<TimerId>,
    next_id: u64,
    tasks: HashMap<TimerId, JoinHandle<()>>,
}

impl TokioScheduler {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerId>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                next_id: 0,
                tasks: HashMap::new(),
            },
            rx,
        )
    }

    pub fn armed_count(&self) -> usize {
        self.tasks.len()
    }
}

impl Scheduler for TokioScheduler {
    fn arm(&mut self, period: Duration) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        let tx = self.tx.clone();
        // tokio intervals panic on a zero period
        let period = period.max(MIN_PERIOD);

        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if tx.send(id).is_err() {
                    break;
                }
            }
        });

        debug!("Armed timer {} ({}ms)", id.0, period.as_millis());
        self.tasks.insert(id, handle);
        id
    }

    fn cancel(&mut self, id: TimerId) {
        if let Some(handle) = self.tasks.remove(&id) {
            handle.abort();
            debug!("Cancelled timer {}", id.0);
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, handle) in self.tasks.drain() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_timer_fires_each_period() {
        let mut scheduler = ManualScheduler::new();
        let id = scheduler.arm(Duration::from_millis(1200));

        assert!(scheduler.advance(Duration::from_millis(1199)).is_empty());
        assert_eq!(scheduler.advance(Duration::from_millis(1)), vec![id]);
        assert_eq!(scheduler.advance(Duration::from_millis(3600)), vec![id, id, id]);
        assert_eq!(scheduler.now(), Duration::from_millis(4800));
    }

    #[test]
    fn test_manual_cancelled_timer_never_fires() {
        let mut scheduler = ManualScheduler::new();
        let a = scheduler.arm(Duration::from_millis(100));
        let b = scheduler.arm(Duration::from_millis(100));
        scheduler.cancel(a);
        scheduler.cancel(a);

        let fired = scheduler.advance(Duration::from_millis(250));
        assert_eq!(fired, vec![b, b]);
        assert!(!scheduler.is_armed(a));
        assert_eq!(scheduler.armed_count(), 1);
    }

    #[test]
    fn test_manual_interleaves_by_due_time() {
        let mut scheduler = ManualScheduler::new();
        let slow = scheduler.arm(Duration::from_millis(300));
        let fast = scheduler.arm(Duration::from_millis(200));

        let fired = scheduler.advance(Duration::from_millis(600));
        // 200 fast, 300 slow, 400 fast, 600 slow + fast (tie -> lower id)
        assert_eq!(fired, vec![fast, slow, fast, slow, fast]);
    }

    #[tokio::test]
    async fn test_tokio_timer_delivers_ids() {
        let (mut scheduler, mut rx) = TokioScheduler::new();
        let id = scheduler.arm(Duration::from_millis(10));

        let first = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timer fired")
            .expect("channel open");
        assert_eq!(first, id);

        scheduler.cancel(id);
        assert_eq!(scheduler.armed_count(), 0);
    }

    #[tokio::test]
    async fn test_tokio_cancel_stops_delivery() {
        let (mut scheduler, mut rx) = TokioScheduler::new();
        let id = scheduler.arm(Duration::from_millis(10));
        scheduler.cancel(id);

        // Drain anything queued before the abort, then expect silence
        tokio::time::sleep(Duration::from_millis(50)).await;
        while rx.try_recv().is_ok() {}
        let next = tokio::time::timeout(Duration::from_millis(60), rx.recv()).await;
        assert!(next.is_err(), "no firing after cancel");
    }

    #[test]
    fn test_manual_zero_period_is_raised() {
        let mut scheduler = ManualScheduler::new();
        let id = scheduler.arm(Duration::ZERO);

        assert_eq!(scheduler.advance(Duration::from_millis(3)), vec![id, id, id]);
    }

    #[tokio::test]
    async fn test_tokio_zero_period_still_fires() {
        let (mut scheduler, mut rx) = TokioScheduler::new();
        let id = scheduler.arm(Duration::ZERO);

        for _ in 0..3 {
            let fired = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .expect("timer fired")
                .expect("channel open");
            assert_eq!(fired, id);
        }
        scheduler.cancel(id);
    }
}
