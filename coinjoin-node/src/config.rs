//! Node-level configuration: the coordinator's numeric parameters
//! (spec.md \S6) plus the connection settings only the binary needs
//! (SPEC_FULL.md \S6) — loaded via `confy`, the way `rusty-node` loads
//! `NodeConfig`.

use coinjoin_core::config::DenominationAlgorithm;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub input_registration_phase_timeout_seconds: u64,
    pub connection_confirmation_phase_timeout_seconds: u64,
    pub output_registration_phase_timeout_seconds: u64,
    pub signing_phase_timeout_seconds: u64,

    pub minimum_anonymity_set: u32,
    pub maximum_anonymity_set: u32,
    pub average_time_to_spend_in_input_registration_seconds: u64,

    pub denomination_algorithm: DenominationAlgorithm,
    pub denomination_btc: u64,
    pub denomination_usd: f64,
    pub fallback_sat_per_byte: u64,

    /// `host:port` the HTTP registration surface binds to.
    pub coordinator_http_bind: String,
    /// bitcoind JSON-RPC endpoint used for `estimatesmartfee`.
    pub bitcoin_rpc_url: String,
    pub bitcoin_rpc_user: String,
    pub bitcoin_rpc_password: String,
    /// Ticker endpoint used for `FixedUsd` denomination.
    pub exchange_rate_url: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let core = coinjoin_core::Config::default();
        NodeConfig {
            input_registration_phase_timeout_seconds: core.input_registration_phase_timeout_seconds,
            connection_confirmation_phase_timeout_seconds: core.connection_confirmation_phase_timeout_seconds,
            output_registration_phase_timeout_seconds: core.output_registration_phase_timeout_seconds,
            signing_phase_timeout_seconds: core.signing_phase_timeout_seconds,
            minimum_anonymity_set: core.minimum_anonymity_set,
            maximum_anonymity_set: core.maximum_anonymity_set,
            average_time_to_spend_in_input_registration_seconds: core
                .average_time_to_spend_in_input_registration_seconds,
            denomination_algorithm: core.denomination_algorithm,
            denomination_btc: core.denomination_btc,
            denomination_usd: core.denomination_usd,
            fallback_sat_per_byte: core.fallback_sat_per_byte,
            coordinator_http_bind: "127.0.0.1:7777".to_string(),
            bitcoin_rpc_url: "http://127.0.0.1:8332".to_string(),
            bitcoin_rpc_user: "bitcoin".to_string(),
            bitcoin_rpc_password: "changeme".to_string(),
            exchange_rate_url: "https://blockchain.info/ticker".to_string(),
        }
    }
}

impl NodeConfig {
    pub fn to_core_config(&self) -> coinjoin_core::Config {
        coinjoin_core::Config {
            input_registration_phase_timeout_seconds: self.input_registration_phase_timeout_seconds,
            connection_confirmation_phase_timeout_seconds: self.connection_confirmation_phase_timeout_seconds,
            output_registration_phase_timeout_seconds: self.output_registration_phase_timeout_seconds,
            signing_phase_timeout_seconds: self.signing_phase_timeout_seconds,
            minimum_anonymity_set: self.minimum_anonymity_set,
            maximum_anonymity_set: self.maximum_anonymity_set,
            average_time_to_spend_in_input_registration_seconds: self
                .average_time_to_spend_in_input_registration_seconds,
            denomination_algorithm: self.denomination_algorithm,
            denomination_btc: self.denomination_btc,
            denomination_usd: self.denomination_usd,
            fallback_sat_per_byte: self.fallback_sat_per_byte,
        }
    }
}
