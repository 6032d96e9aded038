use std::{
    collections::{BTreeMap, HashMap},
    sync::Mutex,
};

use bls::{Signature, SignatureBytes};
use itertools::Itertools as _;
use ssz::BitList;
use thiserror::Error;
use types::{
    phase0::{
        containers::{Attestation, AttestationData},
        primitives::{Epoch, Gwei, Slot},
    },
    preset::MaxValidatorsPerCommittee,
};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum PoolError {
    #[error("attestation overlaps a previous contribution for the same data")]
    OverlappingAggregationBits,
    #[error("attestation signature bytes are not a valid signature")]
    SignatureInvalid,
}

struct Aggregate {
    aggregation_bits: BitList<MaxValidatorsPerCommittee>,
    signature: SignatureBytes,
    slot: Slot,
    attesting_balance: Gwei,
}

/// Aggregates attestations by their data.
///
/// Disjoint contributions for the same data merge by ORing the aggregation
/// bits and aggregating the BLS signatures. Overlapping contributions are
/// rejected; dropping them keeps every merged signature verifiable against
/// the union of the contributors' keys.
#[derive(Default)]
pub struct AttestationPool {
    aggregates: Mutex<BTreeMap<Epoch, HashMap<AttestationData, Aggregate>>>,
}

impl AttestationPool {
    /// `slot` is the slot the attestation was made in (derived from its
    /// crosslink by the caller, which has a state at hand); `attesting_balance`
    /// is the total effective balance behind the new bits.
    pub fn insert(
        &self,
        attestation: &Attestation,
        slot: Slot,
        attesting_balance: Gwei,
    ) -> Result<(), PoolError> {
        let mut aggregates = self.aggregates.lock().expect("attestation pool is poisoned");

        let by_data = aggregates.entry(attestation.data.target.epoch).or_default();

        match by_data.get_mut(&attestation.data) {
            Some(aggregate) => {
                if aggregate
                    .aggregation_bits
                    .any_in_common(&attestation.aggregation_bits)
                {
                    return Err(PoolError::OverlappingAggregationBits);
                }

                let existing = Signature::try_from(aggregate.signature)
                    .map_err(|_| PoolError::SignatureInvalid)?;
                let new = Signature::try_from(attestation.signature)
                    .map_err(|_| PoolError::SignatureInvalid)?;

                let combined = bls::aggregate_signatures([&existing, &new])
                    .map_err(|_| PoolError::SignatureInvalid)?;

                aggregate.aggregation_bits |= &attestation.aggregation_bits;
                aggregate.signature = combined.to_bytes();
                aggregate.attesting_balance =
                    aggregate.attesting_balance.saturating_add(attesting_balance);
            }
            None => {
                by_data.insert(
                    attestation.data,
                    Aggregate {
                        aggregation_bits: attestation.aggregation_bits.clone(),
                        signature: attestation.signature,
                        slot,
                        attesting_balance,
                    },
                );
            }
        }

        Ok(())
    }

    /// Up to `max` aggregated attestations old enough to be included in a
    /// block following `min_inclusion_slot`, heaviest first.
    #[must_use]
    pub fn peek_aggregated_attestations(
        &self,
        max: usize,
        min_inclusion_slot: Slot,
    ) -> Vec<Attestation> {
        let aggregates = self.aggregates.lock().expect("attestation pool is poisoned");

        aggregates
            .values()
            .flatten()
            .filter(|(_, aggregate)| aggregate.slot <= min_inclusion_slot)
            .sorted_by_key(|(_, aggregate)| core::cmp::Reverse(aggregate.attesting_balance))
            .take(max)
            .map(|(data, aggregate)| Attestation {
                aggregation_bits: aggregate.aggregation_bits.clone(),
                data: *data,
                custody_bits: BitList::with_length(aggregate.aggregation_bits.len()),
                signature: aggregate.signature,
            })
            .collect()
    }

    /// Drops attestations targeting epochs before `epoch`.
    pub fn prune_below_epoch(&self, epoch: Epoch) {
        let mut aggregates = self.aggregates.lock().expect("attestation pool is poisoned");
        *aggregates = aggregates.split_off(&epoch);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.aggregates
            .lock()
            .expect("attestation pool is poisoned")
            .values()
            .map(HashMap::len)
            .sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use bls::{PublicKey, SecretKey};
    use ssz::SszHash as _;
    use types::phase0::primitives::H256;

    use super::*;

    fn secret_keys() -> [SecretKey; 3] {
        [0, 1, 2].map(interop::secret_key)
    }

    fn attestation_with_bit(position: usize, secret_key: &SecretKey) -> Attestation {
        let data = AttestationData::default();

        let mut aggregation_bits = BitList::with_length(3);
        aggregation_bits.set(position, true);

        Attestation {
            aggregation_bits,
            data,
            custody_bits: BitList::with_length(3),
            signature: secret_key.sign(data.hash_tree_root()).to_bytes(),
        }
    }

    #[test]
    fn disjoint_inserts_merge_into_one_verifiable_aggregate() {
        let pool = AttestationPool::default();
        let keys = secret_keys();

        for (position, secret_key) in keys.iter().enumerate() {
            pool.insert(&attestation_with_bit(position, secret_key), 0, 32)
                .expect("contributions are disjoint");
        }

        let aggregated = pool.peek_aggregated_attestations(16, 0);

        assert_eq!(aggregated.len(), 1);

        let attestation = &aggregated[0];

        assert_eq!(attestation.aggregation_bits.iter_ones().collect::<Vec<_>>(), [0, 1, 2]);

        let public_keys = keys
            .iter()
            .map(SecretKey::to_public_key)
            .collect::<Vec<PublicKey>>();

        Signature::try_from(attestation.signature)
            .expect("aggregate signature is a valid point")
            .fast_aggregate_verify(attestation.data.hash_tree_root(), &public_keys)
            .expect("aggregate verifies against the union of the contributors");
    }

    #[test]
    fn overlapping_inserts_are_rejected() {
        let pool = AttestationPool::default();
        let keys = secret_keys();

        pool.insert(&attestation_with_bit(0, &keys[0]), 0, 32)
            .expect("first contribution is accepted");

        assert_eq!(
            pool.insert(&attestation_with_bit(0, &keys[0]), 0, 32),
            Err(PoolError::OverlappingAggregationBits),
        );
    }

    #[test]
    fn peeking_respects_the_inclusion_slot_and_balance_order() {
        let pool = AttestationPool::default();
        let keys = secret_keys();

        let mut early = attestation_with_bit(0, &keys[0]);
        early.data.beacon_block_root = H256::repeat_byte(1);

        let mut late = attestation_with_bit(1, &keys[1]);
        late.data.beacon_block_root = H256::repeat_byte(2);

        pool.insert(&early, 1, 32).expect("insert succeeds");
        pool.insert(&late, 5, 64).expect("insert succeeds");

        assert!(pool.peek_aggregated_attestations(16, 0).is_empty());
        assert_eq!(pool.peek_aggregated_attestations(16, 1).len(), 1);

        let all = pool.peek_aggregated_attestations(16, 5);

        assert_eq!(all.len(), 2);
        assert_eq!(all[0].data.beacon_block_root, H256::repeat_byte(2));
    }

    #[test]
    fn pruning_drops_old_target_epochs() {
        let pool = AttestationPool::default();
        let keys = secret_keys();

        pool.insert(&attestation_with_bit(0, &keys[0]), 0, 32)
            .expect("insert succeeds");

        pool.prune_below_epoch(1);

        assert!(pool.is_empty());
    }
}
