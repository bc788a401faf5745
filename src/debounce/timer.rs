//! One-shot timer services used by the debounce scheduler.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::trace;

use super::clock::{Clock, ManualClock};
use crate::error::Result;

/// Identifies one scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

impl TimerHandle {
    /// Build a handle for a custom [`TimerService`]. Ids must be unique per
    /// service.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Callback run when a timer fires. It receives the handle it was scheduled
/// under so the owner can tell a live timer from a superseded one.
pub type TimerCallback = Box<dyn FnOnce(TimerHandle) + Send + 'static>;

/// A service that runs a callback once after a delay.
pub trait TimerService: Send + Sync {
    /// Schedule `callback` to run after `delay`.
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerHandle;

    /// Cancel a scheduled timer. Unknown or already fired handles are ignored.
    fn cancel(&self, handle: TimerHandle);
}

/// Timer service backed by tokio tasks.
///
/// Each timer is a spawned task sleeping for its delay; cancelling aborts the
/// task. Callbacks run on the runtime's worker threads.
pub struct TokioTimer {
    runtime: Handle,
    next_id: AtomicU64,
    tasks: Arc<Mutex<HashMap<TimerHandle, AbortHandle>>>,
}

impl TokioTimer {
    /// Create a timer service spawning onto the given runtime.
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            next_id: AtomicU64::new(1),
            tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Create a timer service on the runtime of the current context.
    ///
    /// Fails when called outside a tokio runtime.
    pub fn try_current() -> Result<Self> {
        Ok(Self::new(Handle::try_current()?))
    }

    /// Number of timers scheduled but not yet fired or cancelled.
    pub fn outstanding(&self) -> usize {
        self.tasks.lock().len()
    }
}

impl TimerService for TokioTimer {
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let handle = TimerHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        let tasks = Arc::clone(&self.tasks);

        // Held across spawn so the task cannot fire before it is registered.
        let mut registry = self.tasks.lock();
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if tasks.lock().remove(&handle).is_none() {
                return;
            }
            callback(handle);
        });
        registry.insert(handle, task.abort_handle());

        trace!(timer = handle.0, delay_ms = delay.as_millis() as u64, "Timer scheduled");
        handle
    }

    fn cancel(&self, handle: TimerHandle) {
        if let Some(task) = self.tasks.lock().remove(&handle) {
            task.abort();
            trace!(timer = handle.0, "Timer cancelled");
        }
    }
}

/// Virtual-time timer service driven by a [`ManualClock`].
///
/// Nothing fires on its own: [`ManualTimer::advance`] moves the clock forward
/// and runs due callbacks in deadline order, which makes scheduling behaviour
/// fully deterministic.
pub struct ManualTimer {
    clock: ManualClock,
    next_id: AtomicU64,
    queue: Mutex<BTreeMap<(u64, TimerHandle), TimerCallback>>,
}

impl ManualTimer {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            next_id: AtomicU64::new(1),
            queue: Mutex::new(BTreeMap::new()),
        }
    }

    /// The clock this timer advances.
    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    /// Number of timers waiting to fire.
    pub fn outstanding(&self) -> usize {
        self.queue.lock().len()
    }

    /// Deadline of the earliest waiting timer.
    pub fn next_deadline(&self) -> Option<u64> {
        self.queue.lock().keys().next().map(|(deadline, _)| *deadline)
    }

    /// Advance the clock by `millis`, firing every timer that falls due.
    ///
    /// Returns the number of callbacks run.
    pub fn advance(&self, millis: u64) -> usize {
        let target = self.clock.now_millis().saturating_add(millis);
        self.run_until(target)
    }

    /// Run timers due at or before `target`, moving the clock to each deadline
    /// in turn and finally to `target`.
    ///
    /// Callbacks may schedule new timers; those fire too if they fall due.
    pub fn run_until(&self, target: u64) -> usize {
        let mut fired = 0;
        loop {
            let next = {
                let mut queue = self.queue.lock();
                let due = queue
                    .keys()
                    .next()
                    .is_some_and(|&(deadline, _)| deadline <= target);
                if due {
                    queue.pop_first()
                } else {
                    None
                }
            };
            let Some(((deadline, handle), callback)) = next else {
                break;
            };

            if deadline > self.clock.now_millis() {
                self.clock.set(deadline);
            }
            callback(handle);
            fired += 1;
        }

        if self.clock.now_millis() < target {
            self.clock.set(target);
        }
        fired
    }
}

impl TimerService for ManualTimer {
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let handle = TimerHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        let deadline = self
            .clock
            .now_millis()
            .saturating_add(delay.as_millis() as u64);
        self.queue.lock().insert((deadline, handle), callback);
        handle
    }

    fn cancel(&self, handle: TimerHandle) {
        self.queue.lock().retain(|&(_, queued), _| queued != handle);
    }
}
