//! Retry wrapper for fallible async operations.
//!
//! A [`RetryExecutor`] runs an attempt closure, and when it fails with an
//! error that [`Retryable::should_retry`] classifies as transient, waits for
//! the next delay of its [`RetrySchedule`] and tries again. Fatal errors and
//! the error of the last permitted attempt are handed back unchanged.

mod executor;
mod schedule;

pub use executor::{Retryable, RetryExecutor};
pub use schedule::RetrySchedule;
