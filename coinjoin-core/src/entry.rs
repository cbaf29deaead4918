//! A-entry and B-entry data (spec.md \S3).

use std::collections::HashMap;

use coinjoin_types::{Amount, ClaimedInput, ParticipantId, Script};
use serde::{Deserialize, Serialize};

/// Registration state of an A-entry, advanced by \S4.2's
/// `confirm_connection` and `submit_signature`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AEntryState {
    Registered,
    ConnectionConfirmed,
    Signed,
}

/// An input-provider: one or more claimed UTXOs plus the change output
/// it will receive back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AEntry {
    pub id: ParticipantId,
    pub inputs: Vec<ClaimedInput>,
    pub change_output: Script,
    pub change_amount: Amount,
    pub state: AEntryState,
    /// Witness bytes by input index, populated during `Signing`.
    pub signatures: HashMap<usize, Vec<u8>>,
}

impl AEntry {
    /// `true` once every claimed input has a recorded witness.
    pub fn is_fully_signed(&self) -> bool {
        !self.inputs.is_empty() && (0..self.inputs.len()).all(|i| self.signatures.contains_key(&i))
    }
}

/// An output-claimer: a single denomination-sized output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BEntry {
    pub output: Script,
}

#[cfg(test)]
mod tests {
    use super::*;
    use coinjoin_types::OutPoint;

    fn sample_entry() -> AEntry {
        AEntry {
            id: ParticipantId::new(),
            inputs: vec![ClaimedInput {
                outpoint: OutPoint { txid: [0; 32], vout: 0 },
                amount: Amount::from_sat(100_000),
            }],
            change_output: vec![1, 2, 3],
            change_amount: Amount::from_sat(1_000),
            state: AEntryState::Registered,
            signatures: HashMap::new(),
        }
    }

    #[test]
    fn fully_signed_requires_every_claimed_input() {
        let mut entry = sample_entry();
        assert!(!entry.is_fully_signed());
        entry.signatures.insert(0, vec![0xAB]);
        assert!(entry.is_fully_signed());
    }
}
