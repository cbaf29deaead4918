//! `coinjoin-core` is the in-memory state machine library for a
//! Chaumian CoinJoin mixing round.
//!
//! This crate encapsulates everything the phase scheduler needs to
//! drive a round: the phase tag and round state, the concurrent
//! registry input-providers and output-claimers register into, the
//! round-parameter calculators, and the coin-join transaction builder.
//!
//! # Modules
//!
//! - `config`: the read-only parameter bundle the rest of the crate is
//!   driven by.
//! - `phase`: the four-phase cyclic tag.
//! - `entry`: A-entry / B-entry data and their registration state.
//! - `registry`: the per-round concurrent entry sets.
//! - `round`: `RoundState`, owned exclusively by the scheduler.
//! - `denomination`, `fee`, `anonymity`: the three round-parameter
//!   calculators.
//! - `builder`: coin-join transaction assembly and shuffling.
//! - `error`: the crate's flat error enum.
//! - `broadcast`: the phase-change push channel.

pub mod anonymity;
pub mod broadcast;
pub mod builder;
pub mod config;
pub mod denomination;
pub mod entry;
pub mod error;
pub mod fee;
pub mod phase;
pub mod registry;
pub mod round;

pub use broadcast::{PhaseBroadcaster, PhaseEvent};
pub use config::Config;
pub use entry::{AEntry, AEntryState, BEntry};
pub use error::CoreError;
pub use phase::Phase;
pub use registry::RoundRegistry;
pub use round::RoundState;
