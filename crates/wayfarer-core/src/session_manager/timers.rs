//! Session timer service
//!
//! One task owns every heartbeat and "thinking" timer. Deadlines live in a
//! min-heap; cancelled timers are dropped from the active table and their
//! heap entries are skipped when they surface. Callbacks run on their own
//! tasks so a slow write never delays other timers.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// What a timer is for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TimerKey {
    /// Session keep-alive
    Heartbeat {
        /// Session id
        session_id: String,
    },
    /// Per-request progress notice
    Thinking {
        /// Session id
        session_id: String,
        /// Request id
        request_id: String,
    },
}

impl TimerKey {
    /// Session the timer belongs to
    #[must_use]
    pub fn session_id(&self) -> &str {
        match self {
            Self::Heartbeat { session_id } | Self::Thinking { session_id, .. } => session_id,
        }
    }
}

/// Work run on every tick
pub type TimerCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

enum Command {
    Schedule {
        id: u64,
        key: TimerKey,
        first: Instant,
        period: Duration,
        callback: TimerCallback,
    },
    Cancel(u64),
    Active(oneshot::Sender<Vec<TimerKey>>),
}

struct ActiveTimer {
    key: TimerKey,
    period: Duration,
    callback: TimerCallback,
}

/// Handle to the timer task
#[derive(Clone)]
pub struct TimerService {
    tx: mpsc::UnboundedSender<Command>,
    next_id: Arc<AtomicU64>,
}

impl TimerService {
    /// Spawn the timer task; it stops when `shutdown` is cancelled
    #[must_use]
    pub fn spawn(shutdown: CancellationToken) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(rx, shutdown));
        Self {
            tx,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Schedule a fixed-rate timer; dropping the handle cancels it
    pub fn schedule(
        &self,
        key: TimerKey,
        initial_delay: Duration,
        period: Duration,
        callback: TimerCallback,
    ) -> TimerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let command = Command::Schedule {
            id,
            key: key.clone(),
            first: Instant::now() + initial_delay,
            period,
            callback,
        };
        if self.tx.send(command).is_err() {
            debug!(?key, "Timer service stopped, timer not scheduled");
        }

        TimerHandle {
            id,
            key,
            tx: self.tx.clone(),
        }
    }

    /// Keys of all live timers
    pub async fn active(&self) -> Vec<TimerKey> {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Command::Active(reply)).is_err() {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }
}

/// Cancels its timer when dropped
pub struct TimerHandle {
    id: u64,
    key: TimerKey,
    tx: mpsc::UnboundedSender<Command>,
}

impl TimerHandle {
    /// Key of the timer
    #[must_use]
    pub fn key(&self) -> &TimerKey {
        &self.key
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle")
            .field("id", &self.id)
            .field("key", &self.key)
            .finish()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        // Service already gone means nothing left to cancel
        let _ = self.tx.send(Command::Cancel(self.id));
    }
}

async fn run(mut rx: mpsc::UnboundedReceiver<Command>, shutdown: CancellationToken) {
    let mut heap: BinaryHeap<Reverse<(Instant, u64)>> = BinaryHeap::new();
    let mut active: HashMap<u64, ActiveTimer> = HashMap::new();

    loop {
        let next = heap.peek().map(|Reverse((deadline, _))| *deadline);
        let sleep = tokio::time::sleep_until(next.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600)));

        tokio::select! {
            _ = shutdown.cancelled() => break,
            command = rx.recv() => match command {
                Some(Command::Schedule { id, key, first, period, callback }) => {
                    trace!(id, ?key, "Timer scheduled");
                    heap.push(Reverse((first, id)));
                    active.insert(id, ActiveTimer { key, period, callback });
                }
                Some(Command::Cancel(id)) => {
                    if let Some(timer) = active.remove(&id) {
                        trace!(id, key = ?timer.key, "Timer cancelled");
                    }
                }
                Some(Command::Active(reply)) => {
                    let _ = reply.send(active.values().map(|t| t.key.clone()).collect());
                }
                None => break,
            },
            _ = sleep, if next.is_some() => {
                fire_due(&mut heap, &active);
            }
        }
    }

    debug!(remaining = active.len(), "Timer service stopped");
}

fn fire_due(heap: &mut BinaryHeap<Reverse<(Instant, u64)>>, active: &HashMap<u64, ActiveTimer>) {
    let now = Instant::now();

    while let Some(Reverse((deadline, id))) = heap.peek().copied() {
        if deadline > now {
            break;
        }
        heap.pop();

        // Cancelled timers leave stale heap entries behind
        let Some(timer) = active.get(&id) else {
            continue;
        };

        tokio::spawn((timer.callback)());

        let mut next = deadline + timer.period;
        if next <= now {
            next = now + timer.period;
        }
        heap.push(Reverse((next, id)));
    }
}

#[cfg(test)]
mod tests;
