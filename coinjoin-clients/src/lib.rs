//! `coinjoin-clients` implements the core crate's external-collaborator
//! port traits over real network protocols: JSON-RPC to a Bitcoin node
//! for fee estimation, and HTTP to a ticker provider for exchange
//! rates (spec.md \S4.3/\S4.4).

pub mod error;
pub mod exchange_rate;
pub mod fee_estimator;

pub use error::ClientError;
pub use exchange_rate::HttpExchangeRateProvider;
pub use fee_estimator::BitcoindFeeEstimator;
