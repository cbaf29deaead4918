//! Library surface for the coinjoin coordinator binary, split out of
//! `main.rs` so the HTTP registration router (spec.md \S1's "external
//! request handlers") can be driven directly from integration tests
//! without spawning the binary.

pub mod config;
pub mod http;
