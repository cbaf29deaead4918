//! Wire-level data shared by every coordinator crate: opaque UTXO
//! references, transaction pieces, and the participant identifier.
//!
//! Scripts, witnesses and transaction ids are treated as opaque byte
//! strings here — no key material, no signature verification. That is
//! the caller's (or a downstream Bitcoin library's) job.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A reference to a specific transaction output: `(txid, vout)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: [u8; 32],
    pub vout: u32,
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", hex::encode(self.txid), self.vout)
    }
}

/// A UTXO claimed by an input-provider at registration time: the
/// outpoint plus the amount the participant asserts it carries. The
/// registry does not verify this against the chain — that is the
/// external request handler's job (spec.md \S4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimedInput {
    pub outpoint: OutPoint,
    pub amount: Amount,
}

/// A Bitcoin amount in satoshis. Wraps `u64` with checked arithmetic so
/// round-parameter math never silently wraps or panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Amount(pub u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn from_sat(sat: u64) -> Self {
        Amount(sat)
    }

    pub fn as_sat(self) -> u64 {
        self.0
    }

    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    pub fn checked_sub(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_sub(rhs.0).map(Amount)
    }

    pub fn checked_mul(self, rhs: u64) -> Option<Amount> {
        self.0.checked_mul(rhs).map(Amount)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} sat", self.0)
    }
}

/// Opaque locking script bytes (a `scriptPubKey` or similar).
pub type Script = Vec<u8>;

/// One input of the assembled coin-join transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub previous_output: OutPoint,
    /// Witness stack; empty until `submit_signature` fills it in.
    pub witness: Vec<Vec<u8>>,
}

impl TxInput {
    pub fn new(previous_output: OutPoint) -> Self {
        TxInput {
            previous_output,
            witness: Vec::new(),
        }
    }

    pub fn is_signed(&self) -> bool {
        !self.witness.is_empty()
    }
}

/// One output of the assembled coin-join transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub value: Amount,
    pub script_pubkey: Script,
}

/// The assembled joint transaction (spec.md \S3, `coinjoin` field).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CoinJoinTransaction {
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

impl CoinJoinTransaction {
    /// `fully_signed` from spec.md \S4.7: every input carries a
    /// non-empty witness, vacuously true when there are no inputs.
    pub fn fully_signed(&self) -> bool {
        self.inputs.iter().all(TxInput::is_signed)
    }
}

/// Opaque 128-bit identifier for an A-entry, generated by the
/// coordinator at registration time and surfaced to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticipantId(pub Uuid);

impl ParticipantId {
    pub fn new() -> Self {
        ParticipantId(Uuid::new_v4())
    }
}

impl Default for ParticipantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One currency quote from the exchange-rate provider (spec.md \S6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub code: String,
    pub rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_checked_sub_underflow_is_none() {
        assert_eq!(Amount::from_sat(5).checked_sub(Amount::from_sat(10)), None);
    }

    #[test]
    fn fully_signed_requires_every_input_witnessed() {
        let mut tx = CoinJoinTransaction {
            inputs: vec![
                TxInput::new(OutPoint { txid: [0; 32], vout: 0 }),
                TxInput::new(OutPoint { txid: [1; 32], vout: 1 }),
            ],
            outputs: vec![],
        };
        assert!(!tx.fully_signed());
        tx.inputs[0].witness.push(vec![1, 2, 3]);
        assert!(!tx.fully_signed());
        tx.inputs[1].witness.push(vec![4, 5, 6]);
        assert!(tx.fully_signed());
    }

    #[test]
    fn empty_transaction_is_vacuously_fully_signed() {
        assert!(CoinJoinTransaction::default().fully_signed());
    }

    #[test]
    fn participant_ids_are_unique() {
        assert_ne!(ParticipantId::new(), ParticipantId::new());
    }
}
