#![forbid(unsafe_code)]

//! Test fixtures for `sigslot`.
//!
//! # Role
//! Shared helpers for the end-to-end and concurrency suites in this crate's
//! `tests/` directory:
//!
//! - [`CallLog`] and [`HitCounter`]: thread-safe recorders producing slot
//!   callbacks.
//! - [`StormConfig`] and [`run_storm`]: a barrier-synchronised, seeded
//!   multi-thread driver.
//! - [`init_test_logging`]: a `tracing-subscriber` setup honouring `RUST_LOG`.

pub mod logging;
pub mod recorder;
pub mod storm;

pub use logging::init_test_logging;
pub use recorder::{CallLog, HitCounter};
pub use storm::{Lcg, StormConfig, StormWorker, run_storm, storm_seed};
