//! Values derived from pending attestations during epoch processing.

use std::collections::{BTreeSet, HashMap};

use anyhow::Result;
use arithmetic::U64Ext as _;
use helper_functions::accessors;
use ssz::SszHash as _;
use types::{
    nonstandard::AttestationEpoch,
    phase0::{
        beacon_state::BeaconState,
        containers::{Crosslink, PendingAttestation},
        primitives::{Epoch, Gwei, ShardNumber, ValidatorIndex},
    },
    preset::{
        ShardCount, BASE_REWARDS_PER_EPOCH, BASE_REWARD_FACTOR, INACTIVITY_PENALTY_QUOTIENT,
        MIN_ATTESTATION_INCLUSION_DELAY, MIN_EPOCHS_TO_INACTIVITY_PENALTY,
        PROPOSER_REWARD_QUOTIENT,
    },
};

pub fn absolute_epoch(state: &BeaconState, attestation_epoch: AttestationEpoch) -> Epoch {
    match attestation_epoch {
        AttestationEpoch::Previous => accessors::get_previous_epoch(state),
        AttestationEpoch::Current => accessors::get_current_epoch(state),
    }
}

#[must_use]
pub fn matching_source_attestations(
    state: &BeaconState,
    attestation_epoch: AttestationEpoch,
) -> &[PendingAttestation] {
    match attestation_epoch {
        AttestationEpoch::Previous => state.previous_epoch_attestations.as_slice(),
        AttestationEpoch::Current => state.current_epoch_attestations.as_slice(),
    }
}

pub fn matching_target_attestations<'state>(
    state: &'state BeaconState,
    attestation_epoch: AttestationEpoch,
) -> Result<Vec<&'state PendingAttestation>> {
    let target_root = accessors::get_block_root(state, absolute_epoch(state, attestation_epoch))?;

    Ok(matching_source_attestations(state, attestation_epoch)
        .iter()
        .filter(|attestation| attestation.data.target.root == target_root)
        .collect())
}

pub fn matching_head_attestations<'state>(
    state: &'state BeaconState,
    attestation_epoch: AttestationEpoch,
) -> Result<Vec<&'state PendingAttestation>> {
    matching_source_attestations(state, attestation_epoch)
        .iter()
        .map(|attestation| {
            let slot = accessors::get_attestation_data_slot(state, &attestation.data)?;
            let head_root = accessors::get_block_root_at_slot(state, slot)?;

            Ok((attestation.data.beacon_block_root == head_root).then_some(attestation))
        })
        .filter_map(Result::transpose)
        .collect()
}

/// Validators that voted in any of `attestations` and are not slashed.
pub fn unslashed_attesting_indices<'any>(
    state: &BeaconState,
    attestations: impl IntoIterator<Item = &'any PendingAttestation>,
) -> Result<BTreeSet<ValidatorIndex>> {
    let mut indices = BTreeSet::new();

    for attestation in attestations {
        indices.extend(accessors::get_attesting_indices(
            state,
            &attestation.data,
            &attestation.aggregation_bits,
        )?);
    }

    indices.retain(|index| {
        state
            .validators
            .get(*index)
            .map(|validator| !validator.slashed)
            .unwrap_or_default()
    });

    Ok(indices)
}

pub fn attesting_balance<'any>(
    state: &BeaconState,
    attestations: impl IntoIterator<Item = &'any PendingAttestation>,
) -> Result<Gwei> {
    let indices = unslashed_attesting_indices(state, attestations)?;
    Ok(accessors::get_total_balance(state, &indices))
}

/// The crosslink with the most attesting balance for `shard`, ties broken by
/// the lexicographically greater data root, together with its supporters.
pub fn winning_crosslink_and_attesting_indices(
    state: &BeaconState,
    attestation_epoch: AttestationEpoch,
    shard: ShardNumber,
) -> Result<(Crosslink, BTreeSet<ValidatorIndex>)> {
    let current_crosslink_root = state.current_crosslinks.mod_index(shard).hash_tree_root();

    let shard_attestations = matching_source_attestations(state, attestation_epoch)
        .iter()
        .filter(|attestation| attestation.data.crosslink.shard == shard)
        .collect::<Vec<_>>();

    let candidate_crosslinks = shard_attestations
        .iter()
        .map(|attestation| attestation.data.crosslink)
        .filter(|crosslink| {
            current_crosslink_root == crosslink.parent_root
                || current_crosslink_root == crosslink.hash_tree_root()
        })
        .collect::<BTreeSet<_>>();

    let mut winning_crosslink = Crosslink::default();
    let mut winning_balance = 0;

    for candidate in candidate_crosslinks {
        let supporters = shard_attestations
            .iter()
            .copied()
            .filter(|attestation| attestation.data.crosslink == candidate);

        let balance = attesting_balance(state, supporters)?;

        if (balance, candidate.data_root) > (winning_balance, winning_crosslink.data_root) {
            winning_crosslink = candidate;
            winning_balance = balance;
        }
    }

    let winning_attestations = shard_attestations
        .iter()
        .copied()
        .filter(|attestation| attestation.data.crosslink == winning_crosslink);

    let attesting_indices = unslashed_attesting_indices(state, winning_attestations)?;

    Ok((winning_crosslink, attesting_indices))
}

#[must_use]
pub fn get_base_reward(state: &BeaconState, index: ValidatorIndex, total_balance: Gwei) -> Gwei {
    let effective_balance = state
        .validators
        .get(index)
        .map(|validator| validator.effective_balance)
        .unwrap_or_default();

    effective_balance * BASE_REWARD_FACTOR / total_balance.sqrt() / BASE_REWARDS_PER_EPOCH
}

pub struct EpochDeltas {
    pub rewards: Vec<Gwei>,
    pub penalties: Vec<Gwei>,
}

impl EpochDeltas {
    fn new(validator_count: usize) -> Self {
        Self {
            rewards: vec![0; validator_count],
            penalties: vec![0; validator_count],
        }
    }

    fn reward(&mut self, index: ValidatorIndex, amount: Gwei) {
        let index = usize::try_from(index).expect("validator indices fit in usize");
        self.rewards[index] = self.rewards[index].saturating_add(amount);
    }

    fn penalize(&mut self, index: ValidatorIndex, amount: Gwei) {
        let index = usize::try_from(index).expect("validator indices fit in usize");
        self.penalties[index] = self.penalties[index].saturating_add(amount);
    }
}

pub fn attestation_deltas(state: &BeaconState) -> Result<EpochDeltas> {
    let mut deltas = EpochDeltas::new(state.validators.len());

    let previous_epoch = accessors::get_previous_epoch(state);
    let total_balance = accessors::get_total_active_balance(state);

    let eligible = state
        .validators
        .iter()
        .zip(0..)
        .filter(|(validator, _)| {
            helper_functions::predicates::is_active_validator(validator, previous_epoch)
                || (validator.slashed && previous_epoch + 1 < validator.withdrawable_epoch)
        })
        .map(|(_, index)| index)
        .collect::<Vec<ValidatorIndex>>();

    let source_attestations = matching_source_attestations(state, AttestationEpoch::Previous);
    let target_attestations = matching_target_attestations(state, AttestationEpoch::Previous)?;
    let head_attestations = matching_head_attestations(state, AttestationEpoch::Previous)?;

    let source_indices = unslashed_attesting_indices(state, source_attestations)?;
    let target_indices = unslashed_attesting_indices(state, target_attestations.iter().copied())?;
    let head_indices = unslashed_attesting_indices(state, head_attestations.iter().copied())?;

    // > Micro-incentives for matching FFG source, FFG target, and head
    for attesting_indices in [&source_indices, &target_indices, &head_indices] {
        let attesting_balance = accessors::get_total_balance(state, attesting_indices);

        for index in &eligible {
            let base_reward = get_base_reward(state, *index, total_balance);

            if attesting_indices.contains(index) {
                deltas.reward(*index, base_reward * attesting_balance / total_balance);
            } else {
                deltas.penalize(*index, base_reward);
            }
        }
    }

    // > Proposer and inclusion delay micro-rewards
    let mut earliest_inclusion: HashMap<ValidatorIndex, &PendingAttestation> = HashMap::new();

    for attestation in source_attestations {
        for index in accessors::get_attesting_indices(
            state,
            &attestation.data,
            &attestation.aggregation_bits,
        )? {
            earliest_inclusion
                .entry(index)
                .and_modify(|earliest| {
                    if attestation.inclusion_delay < earliest.inclusion_delay {
                        *earliest = attestation;
                    }
                })
                .or_insert(attestation);
        }
    }

    for index in &source_indices {
        let attestation = earliest_inclusion[index];
        let base_reward = get_base_reward(state, *index, total_balance);
        let proposer_reward = base_reward / PROPOSER_REWARD_QUOTIENT;

        deltas.reward(attestation.proposer_index, proposer_reward);

        let max_attester_reward = base_reward - proposer_reward;

        deltas.reward(
            *index,
            max_attester_reward * MIN_ATTESTATION_INCLUSION_DELAY / attestation.inclusion_delay,
        );
    }

    // > Inactivity penalty
    let finality_delay = previous_epoch - state.finalized_checkpoint.epoch;

    if finality_delay > MIN_EPOCHS_TO_INACTIVITY_PENALTY {
        for index in &eligible {
            let base_reward = get_base_reward(state, *index, total_balance);

            deltas.penalize(*index, BASE_REWARDS_PER_EPOCH * base_reward);

            if !target_indices.contains(index) {
                let effective_balance = state
                    .validators
                    .get(*index)
                    .map(|validator| validator.effective_balance)
                    .unwrap_or_default();

                deltas.penalize(
                    *index,
                    effective_balance * finality_delay / INACTIVITY_PENALTY_QUOTIENT,
                );
            }
        }
    }

    Ok(deltas)
}

pub fn crosslink_deltas(state: &BeaconState) -> Result<EpochDeltas> {
    let mut deltas = EpochDeltas::new(state.validators.len());

    let previous_epoch = accessors::get_previous_epoch(state);
    let total_balance = accessors::get_total_active_balance(state);
    let committee_count = accessors::get_committee_count(state, previous_epoch).get();
    let start_shard = accessors::get_start_shard(state, previous_epoch)?;

    for offset in 0..committee_count {
        let shard = (start_shard + offset).mod_typenum::<ShardCount>();
        let committee = accessors::get_crosslink_committee(state, previous_epoch, shard)?;

        let (_, attesting_indices) =
            winning_crosslink_and_attesting_indices(state, AttestationEpoch::Previous, shard)?;

        let attesting_balance = accessors::get_total_balance(state, &attesting_indices);
        let committee_balance = accessors::get_total_balance(state, &committee);

        for index in committee {
            let base_reward = get_base_reward(state, index, total_balance);

            if attesting_indices.contains(&index) {
                deltas.reward(index, base_reward * attesting_balance / committee_balance);
            } else {
                deltas.penalize(index, base_reward);
            }
        }
    }

    Ok(deltas)
}
