use core::num::NonZeroU64;

use anyhow::{ensure, Result};
use arithmetic::U64Ext as _;
use bls::PublicKeyBytes;
use itertools::Itertools as _;
use ssz::{BitList, SszHash as _};
use typenum::Unsigned as _;
use types::{
    config::Config,
    nonstandard::AttestationEpoch,
    phase0::{
        beacon_state::BeaconState,
        consts::GENESIS_EPOCH,
        containers::{Attestation, AttestationData, IndexedAttestation},
        primitives::{
            CommitteeIndex, Domain, DomainType, Epoch, Gwei, ShardNumber, Slot, ValidatorIndex,
            H256,
        },
    },
    preset::{
        EpochsPerHistoricalVector, MaxValidatorsPerCommittee, ShardCount, SlotsPerEpoch,
        SlotsPerHistoricalRoot, EFFECTIVE_BALANCE_INCREMENT, MIN_SEED_LOOKAHEAD,
        TARGET_COMMITTEE_SIZE,
    },
};

use crate::{error::Error, misc, predicates};

#[must_use]
pub fn get_current_epoch(state: &BeaconState) -> Epoch {
    misc::compute_epoch_at_slot(state.slot)
}

/// The previous epoch, saturated at genesis.
#[must_use]
pub fn get_previous_epoch(state: &BeaconState) -> Epoch {
    let current_epoch = get_current_epoch(state);

    if current_epoch == GENESIS_EPOCH {
        GENESIS_EPOCH
    } else {
        current_epoch - 1
    }
}

pub fn attestation_epoch(state: &BeaconState, epoch: Epoch) -> Result<AttestationEpoch> {
    if epoch == get_current_epoch(state) {
        Ok(AttestationEpoch::Current)
    } else if epoch == get_previous_epoch(state) {
        Ok(AttestationEpoch::Previous)
    } else {
        Err(Error::EpochNotInAttestationRange { epoch }.into())
    }
}

pub fn get_block_root(state: &BeaconState, epoch: Epoch) -> Result<H256> {
    get_block_root_at_slot(state, misc::compute_start_slot_at_epoch(epoch))
}

pub fn get_block_root_at_slot(state: &BeaconState, slot: Slot) -> Result<H256> {
    ensure!(
        slot < state.slot && state.slot <= slot + SlotsPerHistoricalRoot::U64,
        Error::SlotOutOfRange {
            slot,
            state_slot: state.slot,
        },
    );

    Ok(*state.block_roots.mod_index(slot))
}

#[must_use]
pub fn get_randao_mix(state: &BeaconState, epoch: Epoch) -> H256 {
    *state.randao_mixes.mod_index(epoch)
}

#[must_use]
pub fn get_active_index_root(state: &BeaconState, epoch: Epoch) -> H256 {
    *state.active_index_roots.mod_index(epoch)
}

/// The shuffling seed for `epoch`.
///
/// The RANDAO mix is taken from the epoch just outside the lookahead window
/// so that committee assignments cannot be influenced at the last moment.
#[must_use]
pub fn get_seed(state: &BeaconState, epoch: Epoch) -> H256 {
    let mix = get_randao_mix(
        state,
        epoch + EpochsPerHistoricalVector::U64 - MIN_SEED_LOOKAHEAD - 1,
    );
    let active_index_root = get_active_index_root(state, epoch);

    let mut bytes = [0; 96];
    bytes[..32].copy_from_slice(mix.as_bytes());
    bytes[32..64].copy_from_slice(active_index_root.as_bytes());
    bytes[64..72].copy_from_slice(&epoch.to_le_bytes());

    hashing::hash_bytes(&bytes)
}

#[must_use]
pub fn get_active_validator_indices(state: &BeaconState, epoch: Epoch) -> Vec<ValidatorIndex> {
    state
        .validators
        .iter()
        .zip(0..)
        .filter(|(validator, _)| predicates::is_active_validator(validator, epoch))
        .map(|(_, index)| index)
        .collect()
}

#[must_use]
pub fn get_validator_churn_limit(config: &Config, state: &BeaconState) -> u64 {
    let active = get_active_validator_indices(state, get_current_epoch(state)).len() as u64;

    config
        .min_per_epoch_churn_limit
        .max(active / config.churn_limit_quotient)
}

/// Sums effective balances, saturating and floored at one increment
/// to keep downstream divisions well defined.
#[must_use]
pub fn get_total_balance<'indices>(
    state: &BeaconState,
    indices: impl IntoIterator<Item = &'indices ValidatorIndex>,
) -> Gwei {
    indices
        .into_iter()
        .filter_map(|index| state.validators.get(*index).ok())
        .fold(0_u64, |total, validator| {
            total.saturating_add(validator.effective_balance)
        })
        .max(EFFECTIVE_BALANCE_INCREMENT)
}

#[must_use]
pub fn get_total_active_balance(state: &BeaconState) -> Gwei {
    let indices = get_active_validator_indices(state, get_current_epoch(state));
    get_total_balance(state, &indices)
}

/// The number of crosslink committees formed in `epoch`.
#[must_use]
pub fn get_committee_count(state: &BeaconState, epoch: Epoch) -> NonZeroU64 {
    let active = get_active_validator_indices(state, epoch).len() as u64;

    let committees_per_slot = (ShardCount::U64 / SlotsPerEpoch::U64)
        .min(active / SlotsPerEpoch::U64 / TARGET_COMMITTEE_SIZE)
        .max(1);

    NonZeroU64::new(committees_per_slot * SlotsPerEpoch::U64)
        .expect("the count is at least SlotsPerEpoch")
}

/// How far the shard cursor advances over `epoch`.
#[must_use]
pub fn get_shard_delta(state: &BeaconState, epoch: Epoch) -> u64 {
    get_committee_count(state, epoch)
        .get()
        .min(ShardCount::U64 - ShardCount::U64 / SlotsPerEpoch::U64)
}

/// The first shard crosslinked in `epoch`.
///
/// Walks the shard cursor backwards from the next epoch, so `epoch` may be at
/// most one epoch ahead of the state.
pub fn get_start_shard(state: &BeaconState, epoch: Epoch) -> Result<ShardNumber> {
    let current_epoch = get_current_epoch(state);

    ensure!(
        epoch <= current_epoch + 1,
        Error::EpochOutOfRange {
            epoch,
            state_slot: state.slot,
        },
    );

    let mut check_epoch = current_epoch + 1;
    let mut shard =
        (state.start_shard + get_shard_delta(state, current_epoch)) % ShardCount::U64;

    while check_epoch > epoch {
        check_epoch -= 1;
        shard = (shard + ShardCount::U64 - get_shard_delta(state, check_epoch)) % ShardCount::U64;
    }

    Ok(shard)
}

pub fn get_crosslink_committee(
    state: &BeaconState,
    epoch: Epoch,
    shard: ShardNumber,
) -> Result<Vec<ValidatorIndex>> {
    ensure!(shard < ShardCount::U64, Error::ShardOutOfRange { shard });

    let indices = get_active_validator_indices(state, epoch);
    let seed = get_seed(state, epoch);
    let index = (shard + ShardCount::U64 - get_start_shard(state, epoch)?) % ShardCount::U64;
    let count = get_committee_count(state, epoch);

    misc::compute_committee(&indices, seed, index, count)
}

/// The shard crosslinked by committee `index` of `slot`.
pub fn crosslink_shard(
    state: &BeaconState,
    slot: Slot,
    index: CommitteeIndex,
) -> Result<ShardNumber> {
    let epoch = misc::compute_epoch_at_slot(slot);
    let committees_per_slot = get_committee_count(state, epoch).get() / SlotsPerEpoch::U64;

    ensure!(
        index < committees_per_slot,
        Error::CommitteeIndexOutOfBounds { slot, index },
    );

    Ok((get_start_shard(state, epoch)?
        + committees_per_slot * slot.mod_typenum::<SlotsPerEpoch>()
        + index)
        % ShardCount::U64)
}

/// The committee attesting in `slot` under committee `index`,
/// addressed the way validator duties are.
pub fn get_beacon_committee(
    state: &BeaconState,
    slot: Slot,
    index: CommitteeIndex,
) -> Result<Vec<ValidatorIndex>> {
    let epoch = misc::compute_epoch_at_slot(slot);
    let shard = crosslink_shard(state, slot, index)?;

    get_crosslink_committee(state, epoch, shard)
}

/// Recovers the slot an attestation was made in from its target and shard.
pub fn get_attestation_data_slot(state: &BeaconState, data: &AttestationData) -> Result<Slot> {
    let committee_count = get_committee_count(state, data.target.epoch).get();
    let start_shard = get_start_shard(state, data.target.epoch)?;
    let offset = (data.crosslink.shard + ShardCount::U64 - start_shard) % ShardCount::U64;

    Ok(misc::compute_start_slot_at_epoch(data.target.epoch)
        + offset / (committee_count / SlotsPerEpoch::U64))
}

pub fn get_beacon_proposer_index(state: &BeaconState) -> Result<ValidatorIndex> {
    beacon_proposer_index_at_slot(state, state.slot)
}

/// The proposer for any slot of the current epoch.
pub fn beacon_proposer_index_at_slot(state: &BeaconState, slot: Slot) -> Result<ValidatorIndex> {
    let epoch = misc::compute_epoch_at_slot(slot);

    ensure!(
        epoch == get_current_epoch(state),
        Error::EpochOutOfRange {
            epoch,
            state_slot: state.slot,
        },
    );

    let indices = get_active_validator_indices(state, epoch);
    let seed = hashing::hash_256_64(get_seed(state, epoch), slot);

    misc::compute_proposer_index(
        |index| {
            state
                .validators
                .get(index)
                .map(|validator| validator.effective_balance)
                .expect("active validator indices are valid")
        },
        &indices,
        seed,
    )
}

/// The validators voting in an attestation, in increasing index order.
pub fn get_attesting_indices(
    state: &BeaconState,
    data: &AttestationData,
    aggregation_bits: &BitList<MaxValidatorsPerCommittee>,
) -> Result<Vec<ValidatorIndex>> {
    let committee = get_crosslink_committee(state, data.target.epoch, data.crosslink.shard)?;

    ensure!(
        aggregation_bits.len() == committee.len(),
        Error::BitsCommitteeMismatch {
            bits: aggregation_bits.len(),
            committee: committee.len(),
        },
    );

    Ok(committee
        .into_iter()
        .enumerate()
        .filter(|(position, _)| aggregation_bits.get(*position))
        .map(|(_, index)| index)
        .sorted_unstable()
        .collect())
}

pub fn get_indexed_attestation(
    state: &BeaconState,
    attestation: &Attestation,
) -> Result<IndexedAttestation> {
    let attesting_indices =
        get_attesting_indices(state, &attestation.data, &attestation.aggregation_bits)?;

    Ok(IndexedAttestation {
        attesting_indices: attesting_indices.try_into()?,
        data: attestation.data,
        signature: attestation.signature,
    })
}

/// The signature domain for `domain_type`, using the fork active in
/// `message_epoch` (or the current epoch).
#[must_use]
pub fn get_domain(
    state: &BeaconState,
    domain_type: DomainType,
    message_epoch: Option<Epoch>,
) -> Domain {
    let epoch = message_epoch.unwrap_or_else(|| get_current_epoch(state));

    let fork_version = if epoch < state.fork.epoch {
        state.fork.previous_version
    } else {
        state.fork.current_version
    };

    misc::compute_domain(domain_type, fork_version)
}

pub fn public_key(state: &BeaconState, index: ValidatorIndex) -> Result<PublicKeyBytes> {
    Ok(state
        .validators
        .get(index)
        .map_err(|_| Error::ValidatorNotFound { index })?
        .pubkey)
}

/// Finds a validator by public key.
///
/// A linear scan; deposits are rare enough that an index keyed by public key
/// has not been worth maintaining.
#[must_use]
pub fn index_of_public_key(state: &BeaconState, pubkey: PublicKeyBytes) -> Option<ValidatorIndex> {
    state
        .validators
        .iter()
        .zip(0..)
        .find(|(validator, _)| validator.pubkey == pubkey)
        .map(|(_, index)| index)
}

/// The root committed to by `state` for its own latest block.
#[must_use]
pub fn latest_block_root(state: &BeaconState) -> H256 {
    let mut header = state.latest_block_header;

    if header.state_root.is_zero() {
        header.state_root = state.hash_tree_root();
    }

    header.hash_tree_root()
}
