//! Binary-support library so `tests/e2e.rs` can exercise the wiring
//! without spawning the compiled binary.

pub mod app;
pub mod config;
pub mod logging;
