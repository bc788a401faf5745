//! The debounce state machine.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, trace};

use super::clock::{Clock, MonotonicClock};
use super::options::{DebounceOptions, Policy};
use super::timer::{TimerHandle, TimerService, TokioTimer};
use crate::error::{Result, TempoError};

type Target<A, R> = Box<dyn FnMut(A) -> R + Send>;

/// A debounced wrapper around a target callable.
///
/// Calls are coalesced so that a burst of calls spaced closer than the wait
/// results in at most a leading and a trailing invocation, with an optional
/// ceiling (`max_wait`) forcing an invocation under continuous pressure.
///
/// `A` is the argument passed to the target (use a tuple or struct for more
/// than one value; captured state stands in for a receiver). Calls that do not
/// invoke the target return the result of the most recent invocation, or
/// `None` if there has been none.
///
/// Clones share the same state and timer. Invocations run in the order their
/// edges were detected, also when the wrapper is shared across threads.
///
/// The target must not cause an immediate invocation of its own wrapper (for
/// example a leading call, or any call once `max_wait` has elapsed with a zero
/// wait): the nested invocation waits for the outer one to finish and
/// deadlocks. Reading state (`is_pending`, `last_result`) from inside the
/// target is fine.
pub struct Debounced<A, R> {
    inner: Arc<Inner<A, R>>,
}

struct Inner<A, R> {
    invoker: Mutex<Invoker<A, R>>,
    turn_changed: Condvar,
    policy: Policy,
    clock: Arc<dyn Clock>,
    timers: Arc<dyn TimerService>,
    state: Mutex<State<A, R>>,
}

struct State<A, R> {
    /// Arguments of the latest call not yet consumed by an invocation
    pending: Option<A>,
    last_call: Option<u64>,
    last_invoke: u64,
    /// The single outstanding timer, if any
    timer: Option<TimerHandle>,
    last_result: Option<R>,
    /// Ticket handed to the next detected invocation
    next_ticket: u64,
}

/// The target plus the ticket whose turn it is to run it.
struct Invoker<A, R> {
    target: Target<A, R>,
    turn: u64,
}

/// Passes the turn on when an invocation ends, including by panic.
struct Turn<'a, A, R> {
    invoker: MutexGuard<'a, Invoker<A, R>>,
    turn_changed: &'a Condvar,
}

impl<A, R> Drop for Turn<'_, A, R> {
    fn drop(&mut self) {
        self.invoker.turn += 1;
        self.turn_changed.notify_all();
    }
}

/// What to do once the state lock is released.
enum Step<A, R> {
    /// Invoke with these args once the ticket's turn comes up
    Invoke(A, u64),
    Done(Option<R>),
}

/// Signed difference `now - then`.
fn elapsed(now: u64, then: u64) -> i128 {
    i128::from(now) - i128::from(then)
}

impl<A, R> Inner<A, R>
where
    A: Send + 'static,
    R: Clone + Send + 'static,
{
    fn should_invoke(&self, state: &State<A, R>, now: u64) -> bool {
        let Some(last_call) = state.last_call else {
            return true;
        };
        let since_call = elapsed(now, last_call);

        since_call < 0
            || since_call >= i128::from(self.policy.wait)
            || self
                .policy
                .max_wait
                .is_some_and(|max| elapsed(now, state.last_invoke) >= i128::from(max))
    }

    fn remaining_wait(&self, state: &State<A, R>, now: u64) -> u64 {
        let since_call = state.last_call.map_or(0, |last| elapsed(now, last));
        let wait_left = i128::from(self.policy.wait) - since_call;

        let remaining = match self.policy.max_wait {
            Some(max) => wait_left.min(i128::from(max) - elapsed(now, state.last_invoke)),
            None => wait_left,
        };
        u64::try_from(remaining.max(0)).unwrap_or(u64::MAX)
    }

    fn invoke_step(state: &mut State<A, R>, args: A) -> Step<A, R> {
        let ticket = state.next_ticket;
        state.next_ticket += 1;
        Step::Invoke(args, ticket)
    }

    fn start_timer(self: &Arc<Self>, state: &mut State<A, R>, delay_ms: u64) {
        let inner = Arc::clone(self);
        let handle = self.timers.schedule(
            Duration::from_millis(delay_ms),
            Box::new(move |handle| inner.timer_expired(handle)),
        );
        state.timer = Some(handle);
    }

    fn clear_timer(&self, state: &mut State<A, R>) {
        if let Some(handle) = state.timer.take() {
            self.timers.cancel(handle);
        }
    }

    fn call(self: &Arc<Self>, args: A) -> Option<R> {
        let step = {
            let mut state = self.state.lock();
            let now = self.clock.now_millis();
            let is_invoking = self.should_invoke(&state, now);
            state.last_call = Some(now);

            if is_invoking && state.timer.is_none() {
                trace!(now, leading = self.policy.leading, "Leading edge");
                state.last_invoke = now;
                self.start_timer(&mut state, self.policy.wait);
                if self.policy.leading {
                    state.pending = None;
                    Self::invoke_step(&mut state, args)
                } else {
                    state.pending = Some(args);
                    Step::Done(state.last_result.clone())
                }
            } else if is_invoking && self.policy.max_wait.is_some() {
                debug!(
                    now,
                    last_invoke = state.last_invoke,
                    "Max wait reached while timer pending, forcing invocation"
                );
                self.clear_timer(&mut state);
                self.start_timer(&mut state, self.policy.wait);
                state.last_invoke = now;
                state.pending = None;
                Self::invoke_step(&mut state, args)
            } else {
                if state.timer.is_none() {
                    self.start_timer(&mut state, self.policy.wait);
                }
                state.pending = Some(args);
                Step::Done(state.last_result.clone())
            }
        };
        self.finish(step)
    }

    fn timer_expired(self: &Arc<Self>, handle: TimerHandle) {
        let step = {
            let mut state = self.state.lock();
            if state.timer != Some(handle) {
                trace!(timer = handle.id(), "Ignoring superseded timer");
                return;
            }

            let now = self.clock.now_millis();
            if !self.should_invoke(&state, now) {
                let delay = self.remaining_wait(&state, now);
                trace!(now, delay_ms = delay, "Restarting timer");
                self.start_timer(&mut state, delay);
                return;
            }
            self.trailing_edge(&mut state, now)
        };
        self.finish(step);
    }

    fn trailing_edge(&self, state: &mut State<A, R>, now: u64) -> Step<A, R> {
        state.timer = None;
        match state.pending.take() {
            Some(args) if self.policy.trailing => {
                trace!(now, "Trailing edge invocation");
                state.last_invoke = now;
                Self::invoke_step(state, args)
            }
            _ => Step::Done(state.last_result.clone()),
        }
    }

    /// Run the target, if the step calls for it, with the state lock released.
    ///
    /// Waits for the step's ticket so invocations run, and record their
    /// results, in detection order.
    fn finish(&self, step: Step<A, R>) -> Option<R> {
        match step {
            Step::Invoke(args, ticket) => {
                let mut invoker = self.invoker.lock();
                while invoker.turn != ticket {
                    self.turn_changed.wait(&mut invoker);
                }
                let mut turn = Turn {
                    invoker,
                    turn_changed: &self.turn_changed,
                };
                let result = (turn.invoker.target)(args);
                self.state.lock().last_result = Some(result.clone());
                Some(result)
            }
            Step::Done(result) => result,
        }
    }

    fn cancel(&self) {
        let mut state = self.state.lock();
        if state.timer.is_some() {
            debug!("Cancelling pending debounced invocation");
        }
        self.clear_timer(&mut state);
        state.last_invoke = 0;
        state.pending = None;
        state.last_call = None;
    }

    fn flush(&self) -> Option<R> {
        let step = {
            let mut state = self.state.lock();
            if state.timer.is_none() {
                return state.last_result.clone();
            }
            debug!("Flushing pending debounced invocation");
            self.clear_timer(&mut state);
            let now = self.clock.now_millis();
            self.trailing_edge(&mut state, now)
        };
        self.finish(step)
    }
}

impl<A, R> Debounced<A, R>
where
    A: Send + 'static,
    R: Clone + Send + 'static,
{
    /// Wrap `target` using the tokio timer service of the current runtime and
    /// a monotonic clock.
    ///
    /// Fails with [`TempoError::NoRuntime`] outside a tokio runtime.
    pub fn new<F>(target: F, wait: Duration, options: DebounceOptions) -> Result<Self>
    where
        F: FnMut(A) -> R + Send + 'static,
    {
        Self::builder()
            .target(target)
            .wait(wait)
            .options(options)
            .build()
    }

    pub fn builder() -> DebouncedBuilder<A, R> {
        DebouncedBuilder::new()
    }

    /// Request an invocation of the target with `args`.
    ///
    /// Returns the target's result when this call invokes it, otherwise the
    /// result of the most recent invocation.
    pub fn call(&self, args: A) -> Option<R> {
        self.inner.call(args)
    }

    /// Drop any pending invocation and reset burst tracking.
    ///
    /// The last result is kept. Calling this repeatedly is harmless.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// Run a pending trailing invocation now instead of waiting for its timer.
    ///
    /// Returns the last result unchanged when nothing is pending.
    pub fn flush(&self) -> Option<R> {
        self.inner.flush()
    }

    /// Whether a timer is outstanding.
    pub fn is_pending(&self) -> bool {
        self.inner.state.lock().timer.is_some()
    }

    /// Result of the most recent invocation.
    pub fn last_result(&self) -> Option<R> {
        self.inner.state.lock().last_result.clone()
    }

    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.inner.policy.wait)
    }

    /// The effective ceiling, after flooring at the wait.
    pub fn max_wait(&self) -> Option<Duration> {
        self.inner.policy.max_wait.map(Duration::from_millis)
    }
}

impl<A, R> Clone for Debounced<A, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A, R> fmt::Debug for Debounced<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Debounced")
            .field("policy", &self.inner.policy)
            .field("has_pending_args", &state.pending.is_some())
            .field("last_call", &state.last_call)
            .field("last_invoke", &state.last_invoke)
            .field("timer", &state.timer)
            .finish()
    }
}

/// Builder for [`Debounced`].
pub struct DebouncedBuilder<A, R> {
    target: Option<Target<A, R>>,
    wait: Duration,
    options: DebounceOptions,
    clock: Option<Arc<dyn Clock>>,
    timers: Option<Arc<dyn TimerService>>,
}

impl<A, R> DebouncedBuilder<A, R>
where
    A: Send + 'static,
    R: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            target: None,
            wait: Duration::ZERO,
            options: DebounceOptions::default(),
            clock: None,
            timers: None,
        }
    }

    /// The callable to debounce. Required.
    pub fn target<F>(mut self, target: F) -> Self
    where
        F: FnMut(A) -> R + Send + 'static,
    {
        self.target = Some(Box::new(target));
        self
    }

    pub fn wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    pub fn options(mut self, options: DebounceOptions) -> Self {
        self.options = options;
        self
    }

    /// Time source. Defaults to [`MonotonicClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Timer service. Defaults to [`TokioTimer`] on the current runtime.
    pub fn timers(mut self, timers: Arc<dyn TimerService>) -> Self {
        self.timers = Some(timers);
        self
    }

    pub fn build(self) -> Result<Debounced<A, R>> {
        let target = self.target.ok_or_else(|| {
            TempoError::InvalidArgument("a debounce target callable is required".to_string())
        })?;
        let timers: Arc<dyn TimerService> = match self.timers {
            Some(timers) => timers,
            None => Arc::new(TokioTimer::try_current()?),
        };
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(MonotonicClock::new()));
        let policy = Policy::new(self.wait, self.options);

        debug!(
            wait_ms = policy.wait,
            max_wait_ms = ?policy.max_wait,
            leading = policy.leading,
            trailing = policy.trailing,
            "Creating debounced wrapper"
        );

        Ok(Debounced {
            inner: Arc::new(Inner {
                invoker: Mutex::new(Invoker { target, turn: 0 }),
                turn_changed: Condvar::new(),
                policy,
                clock,
                timers,
                state: Mutex::new(State {
                    pending: None,
                    last_call: None,
                    last_invoke: 0,
                    timer: None,
                    last_result: None,
                    next_ticket: 0,
                }),
            }),
        })
    }
}

impl<A, R> Default for DebouncedBuilder<A, R>
where
    A: Send + 'static,
    R: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
