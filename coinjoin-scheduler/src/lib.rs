//! `coinjoin-scheduler` drives the four-phase round loop over a shared
//! `RoundState` (spec.md \S4.1).
//!
//! This is the only writer of `RoundState`'s scheduler-only fields; it
//! holds the round behind an `Arc` so the node's request handlers can
//! keep reading/mutating entries through the same instance while a
//! phase is in progress.
//!
//! # Modules
//!
//! - `scheduler`: `PhaseScheduler` and its `run` loop.

pub mod scheduler;

pub use scheduler::PhaseScheduler;
