//! The per-round concurrent entry sets (spec.md \S4.2).
//!
//! Both sets are insertion-ordered maps behind a `Mutex` with bounded
//! critical sections — the same lock-around-a-map shape the node uses
//! for its mempool and masternode list, swapping `HashMap` for
//! `IndexMap` because insertion order is load-bearing here (the
//! coin-join builder walks A-entries in registration order before
//! shuffling).

use std::sync::Mutex;

use coinjoin_types::{ParticipantId, Script};
use indexmap::IndexMap;

use crate::entry::{AEntry, AEntryState, BEntry};

/// Owns the A-entry and B-entry sets for one round. Replaced wholesale
/// at the top of every `InputRegistration`.
#[derive(Default)]
pub struct RoundRegistry {
    a_entries: Mutex<IndexMap<ParticipantId, AEntry>>,
    b_entries: Mutex<IndexMap<Script, BEntry>>,
}

impl RoundRegistry {
    pub fn new() -> Self {
        RoundRegistry::default()
    }

    /// Inserts a freshly-generated A-entry. The id is coordinator-minted
    /// so collisions are not expected; returns `false` if one already
    /// exists under this id rather than silently overwriting it.
    pub fn insert_a(&self, entry: AEntry) -> bool {
        let mut entries = self.a_entries.lock().unwrap();
        if entries.contains_key(&entry.id) {
            return false;
        }
        entries.insert(entry.id, entry);
        true
    }

    pub fn get_a(&self, id: &ParticipantId) -> Option<AEntry> {
        self.a_entries.lock().unwrap().get(id).cloned()
    }

    /// Applies `f` to the A-entry under `id` while holding the lock.
    /// Returns `false` if no entry exists under `id`.
    pub fn update_a(&self, id: &ParticipantId, f: impl FnOnce(&mut AEntry)) -> bool {
        let mut entries = self.a_entries.lock().unwrap();
        match entries.get_mut(id) {
            Some(entry) => {
                f(entry);
                true
            }
            None => false,
        }
    }

    pub fn confirm_a(&self, id: &ParticipantId) -> bool {
        self.update_a(id, |entry| entry.state = AEntryState::ConnectionConfirmed)
    }

    /// Inserts a B-entry, deduplicating by output script bytes (spec.md
    /// \S9, Open Question (a): intentional set semantics — a colliding
    /// registration is silently dropped, not an error, since the
    /// requester cannot observe the collision anyway).
    pub fn insert_b(&self, entry: BEntry) -> bool {
        let mut entries = self.b_entries.lock().unwrap();
        if entries.contains_key(&entry.output) {
            return false;
        }
        entries.insert(entry.output.clone(), entry);
        true
    }

    /// Inserts a B-entry only if doing so keeps `|b_entries| <= cap`,
    /// checking the current length and inserting under the same lock
    /// acquisition so two concurrent callers can't both observe room
    /// for one more and overshoot the cap (spec.md \S3 invariant
    /// `|b_entries| <= |a_entries|`). Returns `false` if the cap would
    /// be exceeded or the output is already registered.
    pub fn insert_b_capped(&self, entry: BEntry, cap: usize) -> bool {
        let mut entries = self.b_entries.lock().unwrap();
        if entries.len() >= cap || entries.contains_key(&entry.output) {
            return false;
        }
        entries.insert(entry.output.clone(), entry);
        true
    }

    pub fn a_len(&self) -> usize {
        self.a_entries.lock().unwrap().len()
    }

    pub fn b_len(&self) -> usize {
        self.b_entries.lock().unwrap().len()
    }

    /// Snapshot of every A-entry in insertion order.
    pub fn all_a(&self) -> Vec<AEntry> {
        self.a_entries.lock().unwrap().values().cloned().collect()
    }

    /// Snapshot of every B-entry in insertion order.
    pub fn all_b(&self) -> Vec<BEntry> {
        self.b_entries.lock().unwrap().values().cloned().collect()
    }

    /// `true` iff every A-entry has reached `ConnectionConfirmed` (or
    /// later). Entering `OutputRegistration` requires this
    /// (spec.md \S3 invariants).
    pub fn all_a_confirmed(&self) -> bool {
        self.a_entries
            .lock()
            .unwrap()
            .values()
            .all(|e| !matches!(e.state, AEntryState::Registered))
    }

    /// `true` iff every A-entry's claimed inputs all carry a witness
    /// (spec.md \S4.7, applied per-entry).
    pub fn all_a_signed(&self) -> bool {
        self.a_entries.lock().unwrap().values().all(AEntry::is_fully_signed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coinjoin_types::{Amount, ClaimedInput, OutPoint};
    use std::collections::HashMap;

    fn entry(id: ParticipantId) -> AEntry {
        AEntry {
            id,
            inputs: vec![ClaimedInput {
                outpoint: OutPoint { txid: [0; 32], vout: 0 },
                amount: Amount::from_sat(100_000),
            }],
            change_output: vec![],
            change_amount: Amount::ZERO,
            state: AEntryState::Registered,
            signatures: HashMap::new(),
        }
    }

    #[test]
    fn round_trip_register_then_find() {
        let registry = RoundRegistry::new();
        let id = ParticipantId::new();
        assert!(registry.insert_a(entry(id)));
        assert_eq!(registry.get_a(&id).unwrap().id, id);
    }

    #[test]
    fn b_entries_dedupe_by_output_bytes() {
        let registry = RoundRegistry::new();
        assert!(registry.insert_b(BEntry { output: vec![1, 2, 3] }));
        assert!(!registry.insert_b(BEntry { output: vec![1, 2, 3] }));
        assert_eq!(registry.b_len(), 1);
    }

    #[test]
    fn insert_b_capped_rejects_once_the_cap_is_reached() {
        let registry = RoundRegistry::new();
        assert!(registry.insert_b_capped(BEntry { output: vec![1] }, 2));
        assert!(registry.insert_b_capped(BEntry { output: vec![2] }, 2));
        assert!(!registry.insert_b_capped(BEntry { output: vec![3] }, 2));
        assert_eq!(registry.b_len(), 2);
    }

    #[test]
    fn all_a_confirmed_false_until_every_entry_confirms() {
        let registry = RoundRegistry::new();
        let (id1, id2) = (ParticipantId::new(), ParticipantId::new());
        registry.insert_a(entry(id1));
        registry.insert_a(entry(id2));
        assert!(!registry.all_a_confirmed());
        registry.confirm_a(&id1);
        assert!(!registry.all_a_confirmed());
        registry.confirm_a(&id2);
        assert!(registry.all_a_confirmed());
    }

    #[test]
    fn insertion_order_is_preserved() {
        let registry = RoundRegistry::new();
        let ids: Vec<_> = (0..5).map(|_| ParticipantId::new()).collect();
        for id in &ids {
            registry.insert_a(entry(*id));
        }
        let collected: Vec<_> = registry.all_a().into_iter().map(|e| e.id).collect();
        assert_eq!(collected, ids);
    }
}
