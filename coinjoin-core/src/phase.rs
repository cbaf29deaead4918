//! The four-phase cyclic tag (spec.md \S3).

use serde::{Deserialize, Serialize};

/// A round's current sub-interval. Cyclic: `Signing` is followed by a
/// fresh `InputRegistration`, never by itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    InputRegistration,
    ConnectionConfirmation,
    OutputRegistration,
    Signing,
}

impl Phase {
    /// The phase that follows this one in the cycle.
    pub fn next(self) -> Phase {
        match self {
            Phase::InputRegistration => Phase::ConnectionConfirmation,
            Phase::ConnectionConfirmation => Phase::OutputRegistration,
            Phase::OutputRegistration => Phase::Signing,
            Phase::Signing => Phase::InputRegistration,
        }
    }

    /// Name used in broadcast events (spec.md \S6, `new_phase`).
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::InputRegistration => "InputRegistration",
            Phase::ConnectionConfirmation => "ConnectionConfirmation",
            Phase::OutputRegistration => "OutputRegistration",
            Phase::Signing => "Signing",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_returns_to_input_registration() {
        let p = Phase::InputRegistration;
        assert_eq!(p.next().next().next().next(), p);
    }
}
