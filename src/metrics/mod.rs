//! Client metrics
//!
//! Atomic counters for connection and call activity, mirrored to the
//! `metrics` facade.

mod counters;

pub use counters::*;
