//! Debounce scheduling: coalescing bursts of calls into bounded invocations.

mod clock;
mod debouncer;
mod options;
mod timer;

pub use clock::{Clock, ManualClock, MonotonicClock, WallClock};
pub use debouncer::{Debounced, DebouncedBuilder};
pub use options::{coerce_millis, DebounceOptions};
pub use timer::{ManualTimer, TimerCallback, TimerHandle, TimerService, TokioTimer};
