//! `RoundState`: the scalar fields and entry sets owned exclusively by
//! the scheduler, mutated by registration requests only while the
//! matching phase is accepting (spec.md \S3).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use coinjoin_types::{Amount, ClaimedInput, CoinJoinTransaction, ParticipantId, Script};
use rand::RngCore;

use crate::builder::{build_coin_join, CoinJoinPlan};
use crate::entry::{AEntry, AEntryState, BEntry};
use crate::error::{CoreError, Result};
use crate::phase::Phase;
use crate::registry::RoundRegistry;

/// Round-parameters computed once at the top of `InputRegistration`
/// (spec.md \S4.3-\S4.5). Grouped because they are always set and read
/// together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundParams {
    pub denomination: Amount,
    pub fee_per_input: Amount,
    pub fee_per_output: Amount,
    pub anonymity_target: u32,
}

/// Owned exclusively by the scheduler; replaced wholesale at the start
/// of every `InputRegistration`. Scalar fields are atomics so external
/// request handlers can read `phase`/`accepting` without contending
/// with the scheduler's writes; the entry sets are the concurrent
/// containers in `RoundRegistry`.
pub struct RoundState {
    round_id: AtomicU64,
    phase: RwLock<Phase>,
    accepting: AtomicBool,
    fallback: AtomicBool,
    anonymity_target: AtomicU32,
    params: RwLock<RoundParams>,
    input_registration_duration: RwLock<Duration>,
    registry: RwLock<RoundRegistry>,
    coinjoin: RwLock<Option<CoinJoinTransaction>>,
    input_owners: RwLock<HashMap<ParticipantId, Vec<usize>>>,
}

impl RoundState {
    /// Creates the very first round. `round_id` starts at 1 — the
    /// scheduler increments on every entry into `InputRegistration`, so
    /// a freshly constructed coordinator has not yet "entered" a round.
    pub fn new() -> Self {
        RoundState {
            round_id: AtomicU64::new(0),
            phase: RwLock::new(Phase::InputRegistration),
            accepting: AtomicBool::new(false),
            fallback: AtomicBool::new(false),
            anonymity_target: AtomicU32::new(0),
            params: RwLock::new(RoundParams {
                denomination: Amount::ZERO,
                fee_per_input: Amount::ZERO,
                fee_per_output: Amount::ZERO,
                anonymity_target: 0,
            }),
            input_registration_duration: RwLock::new(Duration::ZERO),
            registry: RwLock::new(RoundRegistry::new()),
            coinjoin: RwLock::new(None),
            input_owners: RwLock::new(HashMap::new()),
        }
    }

    // -- scheduler-only mutators -------------------------------------------------

    /// Increments `round_id`, replaces the entry sets, clears the
    /// coin-join, and stores the freshly computed round parameters.
    /// Called by the scheduler at the top of `InputRegistration`
    /// (spec.md \S4.1 step 1). Takes `&self`, not `&mut self`: the
    /// scheduler holds `RoundState` behind an `Arc` shared with request
    /// handlers, so every mutation goes through interior mutability.
    pub fn begin_round(&self, params: RoundParams, fallback: bool) -> u64 {
        self.round_id.fetch_add(1, Ordering::SeqCst);
        *self.registry.write().unwrap() = RoundRegistry::new();
        *self.coinjoin.write().unwrap() = None;
        self.input_owners.write().unwrap().clear();
        *self.params.write().unwrap() = params;
        self.anonymity_target.store(params.anonymity_target, Ordering::SeqCst);
        self.fallback.store(fallback, Ordering::SeqCst);
        *self.phase.write().unwrap() = Phase::InputRegistration;
        self.round_id.load(Ordering::SeqCst)
    }

    /// Atomically sets `accepting = false`, advances `phase`. The
    /// phase-cancel signal that aborts the current wait is the
    /// scheduler's responsibility (it owns the `CancellationToken`,
    /// not `RoundState`).
    pub fn set_phase(&self, phase: Phase) {
        self.accepting.store(false, Ordering::SeqCst);
        *self.phase.write().unwrap() = phase;
    }

    pub fn set_accepting(&self, accepting: bool) {
        self.accepting.store(accepting, Ordering::SeqCst);
    }

    pub fn set_fallback(&self, fallback: bool) {
        self.fallback.store(fallback, Ordering::SeqCst);
    }

    pub fn set_input_registration_duration(&self, duration: Duration) {
        *self.input_registration_duration.write().unwrap() = duration;
    }

    /// Builds and stores the coin-join for this round (spec.md \S4.1
    /// step 4, entering `Signing`).
    pub fn build_and_store_coin_join(&self, rng: &mut impl RngCore) {
        let params = *self.params.read().unwrap();
        let CoinJoinPlan { tx, input_owners } = {
            let registry = self.registry.read().unwrap();
            build_coin_join(&registry, params.denomination, rng)
        };
        *self.coinjoin.write().unwrap() = Some(tx);
        *self.input_owners.write().unwrap() = input_owners;
    }

    pub fn clear_coin_join(&self) {
        *self.coinjoin.write().unwrap() = None;
        self.input_owners.write().unwrap().clear();
    }

    // -- read-only accessors ------------------------------------------------------

    pub fn round_id(&self) -> u64 {
        self.round_id.load(Ordering::SeqCst)
    }

    pub fn phase(&self) -> Phase {
        *self.phase.read().unwrap()
    }

    pub fn accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    pub fn fallback(&self) -> bool {
        self.fallback.load(Ordering::SeqCst)
    }

    pub fn params(&self) -> RoundParams {
        *self.params.read().unwrap()
    }

    pub fn anonymity_target(&self) -> u32 {
        self.anonymity_target.load(Ordering::SeqCst)
    }

    pub fn input_registration_duration(&self) -> Duration {
        *self.input_registration_duration.read().unwrap()
    }

    pub fn coin_join(&self) -> Option<CoinJoinTransaction> {
        self.coinjoin.read().unwrap().clone()
    }

    pub fn a_len(&self) -> usize {
        self.registry.read().unwrap().a_len()
    }

    pub fn b_len(&self) -> usize {
        self.registry.read().unwrap().b_len()
    }

    pub fn all_a_confirmed(&self) -> bool {
        self.registry.read().unwrap().all_a_confirmed()
    }

    pub fn all_a_signed(&self) -> bool {
        self.registry.read().unwrap().all_a_signed()
    }

    /// `fully_signed` from spec.md \S4.7.
    pub fn fully_signed(&self) -> bool {
        matches!(&*self.coinjoin.read().unwrap(), Some(tx) if tx.fully_signed())
    }

    // -- request-handler operations (spec.md \S4.2 / \S6) -------------------------

    /// Registers an A-entry. Fails `WrongPhase` outside
    /// `InputRegistration`, `Validation` if the claimed amounts don't
    /// cover denomination + fees.
    pub fn register_a(&self, inputs: Vec<ClaimedInput>, change_output: Script) -> Result<ParticipantId> {
        if self.phase() != Phase::InputRegistration || !self.accepting() {
            return Err(CoreError::WrongPhase("register_a requires an accepting InputRegistration phase"));
        }
        if inputs.is_empty() {
            return Err(CoreError::Validation("an A-entry needs at least one input".into()));
        }

        let params = self.params();
        let claimed_sum = inputs
            .iter()
            .try_fold(Amount::ZERO, |acc, i| acc.checked_add(i.amount))
            .ok_or_else(|| CoreError::Validation("claimed input sum overflows".into()))?;

        let fee_total = params
            .fee_per_input
            .checked_mul(inputs.len() as u64)
            .and_then(|f| f.checked_add(params.fee_per_output))
            .ok_or_else(|| CoreError::Validation("fee total overflows".into()))?;

        let change_amount = claimed_sum
            .checked_sub(params.denomination)
            .and_then(|a| a.checked_sub(fee_total))
            .ok_or_else(|| CoreError::Validation("claimed inputs do not cover denomination plus fees".into()))?;

        let entry = AEntry {
            id: ParticipantId::new(),
            inputs,
            change_output,
            change_amount,
            state: AEntryState::Registered,
            signatures: HashMap::new(),
        };
        let id = entry.id;
        self.registry.read().unwrap().insert_a(entry);
        Ok(id)
    }

    /// Marks an A-entry as `ConnectionConfirmed`. Only valid during
    /// `ConnectionConfirmation`.
    pub fn confirm_connection(&self, id: ParticipantId) -> Result<()> {
        if self.phase() != Phase::ConnectionConfirmation {
            return Err(CoreError::WrongPhase("confirm_connection requires ConnectionConfirmation"));
        }
        if self.registry.read().unwrap().confirm_a(&id) {
            Ok(())
        } else {
            Err(CoreError::UnknownId)
        }
    }

    /// Registers a B-entry. Only valid during an accepting
    /// `OutputRegistration`, and only while `|b_entries| < |a_entries|`
    /// (spec.md \S3 invariant).
    pub fn register_b(&self, output: Script) -> Result<()> {
        if self.phase() != Phase::OutputRegistration || !self.accepting() {
            return Err(CoreError::WrongPhase("register_b requires an accepting OutputRegistration phase"));
        }
        let registry = self.registry.read().unwrap();
        let cap = registry.a_len();
        if !registry.insert_b_capped(BEntry { output }, cap) {
            return Err(CoreError::Validation("output registration is full for this round, or this output is already registered".into()));
        }
        Ok(())
    }

    /// Records a witness for one of an A-entry's claimed inputs and
    /// applies it to the stored coin-join at the corresponding shuffled
    /// position. Only valid during `Signing`.
    pub fn submit_signature(&self, id: ParticipantId, input_index: usize, witness: Vec<u8>) -> Result<()> {
        if self.phase() != Phase::Signing {
            return Err(CoreError::WrongPhase("submit_signature requires Signing"));
        }

        let global_index = {
            let owners = self.input_owners.read().unwrap();
            let slots = owners.get(&id).ok_or(CoreError::UnknownId)?;
            *slots
                .get(input_index)
                .ok_or_else(|| CoreError::Validation("input index out of range for this entry".into()))?
        };

        {
            let mut coinjoin = self.coinjoin.write().unwrap();
            let tx = coinjoin.as_mut().ok_or_else(|| CoreError::Validation("no coin-join built for this round".into()))?;
            let input = tx
                .inputs
                .get_mut(global_index)
                .ok_or_else(|| CoreError::Validation("shuffled input position out of range".into()))?;
            input.witness = vec![witness.clone()];
        }

        let updated = self.registry.read().unwrap().update_a(&id, |entry| {
            entry.signatures.insert(input_index, witness);
            if entry.is_fully_signed() {
                entry.state = AEntryState::Signed;
            }
        });
        if !updated {
            return Err(CoreError::UnknownId);
        }
        Ok(())
    }

    pub fn find_a(&self, id: ParticipantId) -> Result<AEntry> {
        self.registry.read().unwrap().get_a(&id).ok_or(CoreError::UnknownId)
    }
}

impl Default for RoundState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coinjoin_types::OutPoint;
    use rand::rngs::OsRng;

    fn params() -> RoundParams {
        RoundParams {
            denomination: Amount::from_sat(100_000),
            fee_per_input: Amount::from_sat(100),
            fee_per_output: Amount::from_sat(50),
            anonymity_target: 2,
        }
    }

    fn round_with_params() -> RoundState {
        let round = RoundState::new();
        round.begin_round(params(), false);
        round.set_accepting(true);
        round
    }

    #[test]
    fn register_a_rejected_outside_input_registration() {
        let round = RoundState::new();
        let err = round
            .register_a(
                vec![ClaimedInput { outpoint: OutPoint { txid: [0; 32], vout: 0 }, amount: Amount::from_sat(200_000) }],
                vec![],
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::WrongPhase(_)));
    }

    #[test]
    fn register_a_computes_change_amount() {
        let round = round_with_params();
        let id = round
            .register_a(
                vec![ClaimedInput { outpoint: OutPoint { txid: [0; 32], vout: 0 }, amount: Amount::from_sat(200_000) }],
                vec![9],
            )
            .unwrap();
        let entry = round.find_a(id).unwrap();
        // 200_000 - 100_000 (denom) - 100 (1 input fee) - 50 (output fee) = 99_850
        assert_eq!(entry.change_amount, Amount::from_sat(99_850));
    }

    #[test]
    fn register_a_rejects_insufficient_funds() {
        let round = round_with_params();
        let err = round
            .register_a(
                vec![ClaimedInput { outpoint: OutPoint { txid: [0; 32], vout: 0 }, amount: Amount::from_sat(1_000) }],
                vec![],
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn register_b_respects_a_len_cap() {
        let round = round_with_params();
        let id = round
            .register_a(
                vec![ClaimedInput { outpoint: OutPoint { txid: [0; 32], vout: 0 }, amount: Amount::from_sat(200_000) }],
                vec![],
            )
            .unwrap();
        round.set_phase(Phase::ConnectionConfirmation);
        round.confirm_connection(id).unwrap();
        round.set_phase(Phase::OutputRegistration);
        round.set_accepting(true);

        round.register_b(vec![1]).unwrap();
        let err = round.register_b(vec![2]).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn submit_signature_round_trips_through_the_shuffle() {
        let round = round_with_params();
        let id = round
            .register_a(
                vec![ClaimedInput { outpoint: OutPoint { txid: [0; 32], vout: 0 }, amount: Amount::from_sat(200_000) }],
                vec![],
            )
            .unwrap();
        round.set_phase(Phase::ConnectionConfirmation);
        round.confirm_connection(id).unwrap();
        round.set_phase(Phase::OutputRegistration);
        round.set_phase(Phase::Signing);
        round.build_and_store_coin_join(&mut OsRng);

        round.submit_signature(id, 0, vec![0xDE, 0xAD]).unwrap();
        assert!(round.fully_signed());
        assert!(round.find_a(id).unwrap().is_fully_signed());
    }

    #[test]
    fn confirm_connection_unknown_id_is_rejected() {
        let round = round_with_params();
        round.set_phase(Phase::ConnectionConfirmation);
        let err = round.confirm_connection(ParticipantId::new()).unwrap_err();
        assert!(matches!(err, CoreError::UnknownId));
    }
}
