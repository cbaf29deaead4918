//! Anonymity-set calculator (spec.md \S4.5).

use std::time::Duration;

use crate::config::Config;

/// Seed value for the very first round's `input_registration_duration`,
/// chosen so the first round's adaptive step always lands on
/// `minimum_anonymity_set` (spec.md \S4.5).
pub fn seed_input_registration_duration(config: &Config) -> Duration {
    Duration::from_secs(config.average_time_to_spend_in_input_registration_seconds + 1)
}

/// Adapts the target anonymity set based on how long the previous
/// (non-fallback) `InputRegistration` phase took relative to the
/// configured average.
pub fn calculate_anonymity_target(
    config: &Config,
    previous_target: u32,
    previous_input_registration_duration: Duration,
) -> u32 {
    let average = Duration::from_secs(config.average_time_to_spend_in_input_registration_seconds);
    if previous_input_registration_duration > average {
        previous_target
            .saturating_sub(1)
            .max(config.minimum_anonymity_set)
    } else {
        previous_target
            .saturating_add(1)
            .min(config.maximum_anonymity_set)
    }
}
