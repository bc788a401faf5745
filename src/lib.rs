//! Tempo - debounce scheduling and small data utilities
//!
//! The core of this crate is [`debounce::Debounced`], a stateful wrapper that
//! coalesces bursts of calls to a target into a bounded number of actual
//! invocations, governed by leading/trailing edge options and an optional
//! maximum wait. Time and timers are injected through the
//! [`debounce::Clock`] and [`debounce::TimerService`] traits, with tokio-backed
//! defaults and a virtual-time pair for deterministic tests.
//!
//! Alongside it live [`collections`] (map/each/reduce over sequences and
//! string-keyed mappings) and [`merge`] (in-place deep merge of JSON values).

pub mod collections;
pub mod config;
pub mod debounce;
pub mod error;
pub mod merge;
