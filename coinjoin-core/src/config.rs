//! Read-only coordinator parameters (spec.md \S6).

use serde::{Deserialize, Serialize};

/// Which algorithm the denomination calculator (\S4.3) should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenominationAlgorithm {
    /// The constant `denomination_btc` from this `Config`.
    FixedBtc,
    /// `denomination_usd` converted to BTC via the exchange-rate
    /// provider.
    FixedUsd,
}

/// Read-only parameter bundle. Every coordinator component is driven
/// by a shared handle to one of these; nothing in this crate mutates
/// it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
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
}

impl Default for Config {
    fn default() -> Self {
        Config {
            input_registration_phase_timeout_seconds: 60,
            connection_confirmation_phase_timeout_seconds: 60,
            output_registration_phase_timeout_seconds: 60,
            signing_phase_timeout_seconds: 60,
            minimum_anonymity_set: 5,
            maximum_anonymity_set: 30,
            average_time_to_spend_in_input_registration_seconds: 120,
            denomination_algorithm: DenominationAlgorithm::FixedBtc,
            denomination_btc: 1_000_000,
            denomination_usd: 5_000.0,
            fallback_sat_per_byte: 2,
        }
    }
}

impl Config {
    /// Validates the invariants spec.md assumes of a well-formed
    /// config (`min <= max`). Called once at bootstrap; the core never
    /// re-checks it.
    pub fn validate(&self) -> Result<(), String> {
        if self.minimum_anonymity_set > self.maximum_anonymity_set {
            return Err(format!(
                "minimum_anonymity_set ({}) must be <= maximum_anonymity_set ({})",
                self.minimum_anonymity_set, self.maximum_anonymity_set
            ));
        }
        Ok(())
    }
}
