//! Coin-join transaction assembly and shuffling (spec.md \S4.6).

use std::collections::HashMap;

use coinjoin_types::{Amount, CoinJoinTransaction, ParticipantId, TxInput, TxOutput};
use rand::seq::SliceRandom;
use rand::RngCore;

use crate::registry::RoundRegistry;

/// The assembled transaction plus, for each A-entry, where its claimed
/// inputs landed after the shuffle: `input_owners[id][local_index]` is
/// the position in `tx.inputs` that the entry's `local_index`'th
/// claimed input was placed at. `submit_signature` (spec.md \S4.2)
/// needs this to apply a per-entry-indexed witness to the shuffled
/// transaction.
pub struct CoinJoinPlan {
    pub tx: CoinJoinTransaction,
    pub input_owners: HashMap<ParticipantId, Vec<usize>>,
}

/// Builds the joint transaction for the current round and shuffles its
/// inputs and outputs independently with a Fisher-Yates permutation
/// seeded from `rng`.
///
/// Callers outside tests should pass `rand::rngs::OsRng` — a
/// cryptographically strong source, per \S4.6, so the A/B correlation
/// the shuffle is meant to hide can't be reconstructed from a
/// predictable seed.
pub fn build_coin_join(registry: &RoundRegistry, denomination: Amount, rng: &mut impl RngCore) -> CoinJoinPlan {
    let mut tagged_inputs: Vec<(ParticipantId, usize, TxInput)> = Vec::new();
    for a in registry.all_a() {
        for (local_index, claimed) in a.inputs.iter().enumerate() {
            tagged_inputs.push((a.id, local_index, TxInput::new(claimed.outpoint)));
        }
    }
    tagged_inputs.shuffle(rng);

    let mut input_owners: HashMap<ParticipantId, Vec<usize>> = HashMap::new();
    let mut inputs = Vec::with_capacity(tagged_inputs.len());
    for (global_index, (id, local_index, input)) in tagged_inputs.into_iter().enumerate() {
        let slots = input_owners.entry(id).or_default();
        if slots.len() <= local_index {
            slots.resize(local_index + 1, usize::MAX);
        }
        slots[local_index] = global_index;
        inputs.push(input);
    }

    let mut outputs: Vec<TxOutput> = registry
        .all_b()
        .into_iter()
        .map(|b| TxOutput { value: denomination, script_pubkey: b.output })
        .collect();
    for a in registry.all_a() {
        outputs.push(TxOutput { value: a.change_amount, script_pubkey: a.change_output.clone() });
    }
    outputs.shuffle(rng);

    CoinJoinPlan { tx: CoinJoinTransaction { inputs, outputs }, input_owners }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{AEntry, AEntryState, BEntry};
    use coinjoin_types::{ClaimedInput, OutPoint};
    use rand::rngs::OsRng;
    use std::collections::HashMap as Map;

    fn a_entry(num_inputs: usize) -> AEntry {
        AEntry {
            id: ParticipantId::new(),
            inputs: (0..num_inputs)
                .map(|i| ClaimedInput {
                    outpoint: OutPoint { txid: [i as u8; 32], vout: i as u32 },
                    amount: Amount::from_sat(100_000),
                })
                .collect(),
            change_output: vec![0xAA],
            change_amount: Amount::from_sat(1_000),
            state: AEntryState::ConnectionConfirmed,
            signatures: Map::new(),
        }
    }

    #[test]
    fn output_and_input_counts_match_spec_formula() {
        let registry = RoundRegistry::new();
        registry.insert_a(a_entry(2));
        registry.insert_a(a_entry(1));
        registry.insert_b(BEntry { output: vec![1] });
        registry.insert_b(BEntry { output: vec![2] });
        registry.insert_b(BEntry { output: vec![3] });

        let plan = build_coin_join(&registry, Amount::from_sat(50_000), &mut OsRng);

        // 2 A-entries -> 2 change outputs, plus 3 B-entries -> 5 outputs total.
        assert_eq!(plan.tx.outputs.len(), 2 + 3);
        // 2 + 1 claimed inputs across both A-entries.
        assert_eq!(plan.tx.inputs.len(), 3);
    }

    #[test]
    fn shuffle_preserves_the_multiset_of_outpoints() {
        let registry = RoundRegistry::new();
        registry.insert_a(a_entry(3));
        let before: Vec<OutPoint> = registry.all_a()[0].inputs.iter().map(|c| c.outpoint).collect();

        let plan = build_coin_join(&registry, Amount::from_sat(10_000), &mut OsRng);
        let mut after: Vec<OutPoint> = plan.tx.inputs.iter().map(|i| i.previous_output).collect();

        let mut before_sorted = before;
        before_sorted.sort_by_key(|o| o.vout);
        after.sort_by_key(|o| o.vout);
        assert_eq!(before_sorted, after);
    }

    #[test]
    fn zero_b_entries_still_builds_change_only_transaction() {
        let registry = RoundRegistry::new();
        registry.insert_a(a_entry(1));
        let plan = build_coin_join(&registry, Amount::from_sat(10_000), &mut OsRng);
        assert_eq!(plan.tx.outputs.len(), 1);
        assert_eq!(plan.tx.inputs.len(), 1);
    }

    #[test]
    fn input_owners_track_each_entrys_local_index_to_its_shuffled_position() {
        let registry = RoundRegistry::new();
        registry.insert_a(a_entry(3));
        let id = registry.all_a()[0].id;

        let plan = build_coin_join(&registry, Amount::from_sat(10_000), &mut OsRng);
        let slots = &plan.input_owners[&id];
        assert_eq!(slots.len(), 3);

        let mut seen: Vec<usize> = slots.clone();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2]);
        for (local_index, &global_index) in slots.iter().enumerate() {
            let expected_outpoint = OutPoint { txid: [local_index as u8; 32], vout: local_index as u32 };
            assert_eq!(plan.tx.inputs[global_index].previous_output, expected_outpoint);
        }
    }
}
