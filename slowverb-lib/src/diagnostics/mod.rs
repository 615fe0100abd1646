//! Timing helpers, compiled with the `bench` feature.

pub mod bench;
