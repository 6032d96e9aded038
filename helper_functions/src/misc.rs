use core::num::NonZeroU64;

use anyhow::Result;
use arithmetic::U64Ext as _;
use ssz::SszHash as _;
use types::{
    phase0::{
        containers::SigningData,
        primitives::{Domain, DomainType, Epoch, Gwei, Slot, ValidatorIndex, Version, H256},
    },
    preset::{
        ACTIVATION_EXIT_DELAY, MAX_EFFECTIVE_BALANCE, SlotsPerEpoch,
    },
};

use crate::error::Error;

#[must_use]
pub fn compute_epoch_at_slot(slot: Slot) -> Epoch {
    slot.div_typenum::<SlotsPerEpoch>()
}

#[must_use]
pub const fn compute_start_slot_at_epoch(epoch: Epoch) -> Slot {
    epoch.saturating_mul(<SlotsPerEpoch as typenum::Unsigned>::U64)
}

#[must_use]
pub fn is_epoch_start(slot: Slot) -> bool {
    slot == compute_start_slot_at_epoch(compute_epoch_at_slot(slot))
}

#[must_use]
pub const fn slots_in_epoch(epoch: Epoch) -> core::ops::Range<Slot> {
    compute_start_slot_at_epoch(epoch)..compute_start_slot_at_epoch(epoch + 1)
}

#[must_use]
pub const fn compute_activation_exit_epoch(epoch: Epoch) -> Epoch {
    epoch + 1 + ACTIVATION_EXIT_DELAY
}

#[must_use]
pub fn compute_shuffled_index(index: u64, index_count: NonZeroU64, seed: H256) -> u64 {
    shuffling::shuffle_single(index, index_count, seed)
}

/// Returns the members of committee `index` out of `count` over the shuffled
/// `indices`.
pub fn compute_committee(
    indices: &[ValidatorIndex],
    seed: H256,
    index: u64,
    count: NonZeroU64,
) -> Result<Vec<ValidatorIndex>> {
    let length = indices.len() as u128;

    // The products can exceed 64 bits with a full registry.
    let start = usize::try_from(length * u128::from(index) / u128::from(count.get()))?;
    let end = usize::try_from(length * (u128::from(index) + 1) / u128::from(count.get()))?;

    let total = NonZeroU64::new(indices.len() as u64).ok_or(Error::NoActiveValidators)?;

    (start..end)
        .map(|position| {
            let shuffled = compute_shuffled_index(position as u64, total, seed);
            let shuffled = usize::try_from(shuffled)
                .expect("shuffled index is less than the number of indices");
            Ok(indices[shuffled])
        })
        .collect()
}

/// Selects a proposer from `indices`, biased by effective balance.
pub fn compute_proposer_index(
    effective_balance: impl Fn(ValidatorIndex) -> Gwei,
    indices: &[ValidatorIndex],
    seed: H256,
) -> Result<ValidatorIndex> {
    let total = NonZeroU64::new(indices.len() as u64).ok_or(Error::NoActiveValidators)?;

    let max_random_byte = u64::from(u8::MAX);

    (0..u64::MAX / H256::len_bytes() as u64)
        .flat_map(|quotient| {
            hashing::hash_256_64(seed, quotient)
                .to_fixed_bytes()
                .into_iter()
                .map(u64::from)
        })
        .zip(0..)
        .find_map(|(random_byte, attempt)| {
            let shuffled_index = compute_shuffled_index(attempt % total, total, seed);
            let shuffled_index = usize::try_from(shuffled_index)
                .expect("shuffled index is less than the number of indices");

            let candidate_index = indices[shuffled_index];

            (effective_balance(candidate_index) * max_random_byte
                >= MAX_EFFECTIVE_BALANCE * random_byte)
                .then_some(candidate_index)
        })
        .ok_or(Error::FailedToSelectProposer)
        .map_err(Into::into)
}

/// Withdrawal credentials committing to a BLS withdrawal key.
#[must_use]
pub fn bls_withdrawal_credentials(pubkey: bls::PublicKeyBytes) -> H256 {
    let mut credentials = hashing::hash_bytes(pubkey.as_ref());
    credentials.as_bytes_mut()[0] = types::phase0::consts::BLS_WITHDRAWAL_PREFIX;
    credentials
}

#[must_use]
pub fn compute_domain(domain_type: DomainType, fork_version: Version) -> Domain {
    let mut domain = Domain::zero();
    domain.as_bytes_mut()[..size_of::<DomainType>()]
        .copy_from_slice(&domain_type.to_le_bytes());
    domain.as_bytes_mut()[size_of::<DomainType>()..size_of::<DomainType>() + Version::len_bytes()]
        .copy_from_slice(fork_version.as_bytes());
    domain
}

#[must_use]
pub fn compute_signing_root(object_root: H256, domain: Domain) -> H256 {
    SigningData {
        object_root,
        domain,
    }
    .hash_tree_root()
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(0, 0)]
    #[test_case(1, 0)]
    #[test_case(31, 0)]
    #[test_case(32, 1)]
    #[test_case(63, 1)]
    #[test_case(64, 2)]
    fn epoch_of_slot(slot: Slot, epoch: Epoch) {
        assert_eq!(compute_epoch_at_slot(slot), epoch);
    }

    #[test_case(0, 0)]
    #[test_case(1, 32)]
    #[test_case(2, 64)]
    fn start_slot_of_epoch(epoch: Epoch, slot: Slot) {
        assert_eq!(compute_start_slot_at_epoch(epoch), slot);
    }

    #[test]
    fn committees_partition_the_index_set() {
        let indices = (0..10).collect::<Vec<_>>();
        let seed = hashing::hash_64(1);
        let count = NonZeroU64::new(3).expect("count is nonzero");

        let mut members = (0..count.get())
            .flat_map(|index| {
                compute_committee(&indices, seed, index, count)
                    .expect("committee parameters are valid")
            })
            .collect::<Vec<_>>();

        members.sort_unstable();

        assert_eq!(members, indices);
    }

    #[test]
    fn domain_starts_with_type_and_fork_version() {
        let domain = compute_domain(2, Version::from_slice(&[1, 2, 3, 4]));

        assert_eq!(&domain.as_bytes()[..8], [2, 0, 0, 0, 1, 2, 3, 4]);
        assert_eq!(&domain.as_bytes()[8..], [0; 24]);
    }
}
