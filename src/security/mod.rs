//! Side-channel checks

pub mod constant_time;

pub use constant_time::{measure_classes, verify_constant_time, TimingConfig, TimingReport};
