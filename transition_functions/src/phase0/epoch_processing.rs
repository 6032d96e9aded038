use anyhow::Result;
use arithmetic::U64Ext as _;
use helper_functions::{accessors, misc, mutators, predicates};
use itertools::Itertools as _;
use ssz::{ContiguousList, MerkleTree, SszHash};
use typenum::Unsigned as _;
use types::{
    config::Config,
    nonstandard::AttestationEpoch,
    phase0::{
        beacon_state::BeaconState,
        consts::{FAR_FUTURE_EPOCH, GENESIS_EPOCH},
        containers::{Checkpoint, CompactCommittee, HistoricalBatch},
        primitives::{Epoch, Gwei, ValidatorIndex, H256},
    },
    preset::{
        EpochsPerSlashingsVector, ShardCount, SlotsPerEth1VotingPeriod, SlotsPerHistoricalRoot,
        ValidatorRegistryLimit, ACTIVATION_EXIT_DELAY, EFFECTIVE_BALANCE_INCREMENT,
        MAX_EFFECTIVE_BALANCE,
    },
};

use crate::phase0::epoch_intermediates::{
    self, attestation_deltas, attesting_balance, crosslink_deltas,
    matching_target_attestations, winning_crosslink_and_attesting_indices,
};

pub fn process_epoch(config: &Config, state: &mut BeaconState) -> Result<()> {
    process_justification_and_finalization(state)?;
    process_crosslinks(state)?;
    process_rewards_and_penalties(state)?;
    process_registry_updates(config, state)?;
    process_slashings(state);
    process_final_updates(state)?;

    Ok(())
}

fn process_justification_and_finalization(state: &mut BeaconState) -> Result<()> {
    // > Initial FFG checkpoint values have a `0x00` stub for `root`.
    // > Skip FFG updates in the first two epochs to avoid
    // > corner cases that might result in modifying this stub.
    if accessors::get_current_epoch(state) <= GENESIS_EPOCH + 1 {
        return Ok(());
    }

    let previous_epoch = accessors::get_previous_epoch(state);
    let current_epoch = accessors::get_current_epoch(state);

    let total_active_balance = accessors::get_total_active_balance(state);

    let previous_target_balance = attesting_balance(
        state,
        matching_target_attestations(state, AttestationEpoch::Previous)?,
    )?;

    let current_target_balance = attesting_balance(
        state,
        matching_target_attestations(state, AttestationEpoch::Current)?,
    )?;

    let old_previous_justified_checkpoint = state.previous_justified_checkpoint;
    let old_current_justified_checkpoint = state.current_justified_checkpoint;

    // > Process justifications
    state.previous_justified_checkpoint = state.current_justified_checkpoint;
    state.justification_bits.shift_up_by_1();

    if previous_target_balance * 3 >= total_active_balance * 2 {
        state.current_justified_checkpoint = Checkpoint {
            epoch: previous_epoch,
            root: accessors::get_block_root(state, previous_epoch)?,
        };

        state.justification_bits.set(1, true);
    }

    if current_target_balance * 3 >= total_active_balance * 2 {
        state.current_justified_checkpoint = Checkpoint {
            epoch: current_epoch,
            root: accessors::get_block_root(state, current_epoch)?,
        };

        state.justification_bits.set(0, true);
    }

    // > Process finalizations
    let bits = &state.justification_bits;
    let all_set = |range: core::ops::Range<usize>| range.clone().all(|index| bits.get(index));

    // > The 2nd/3rd/4th most recent epochs are justified, the 2nd using the 4th as source
    if all_set(1..4) && old_previous_justified_checkpoint.epoch + 3 == current_epoch {
        state.finalized_checkpoint = old_previous_justified_checkpoint;
    }

    // > The 2nd/3rd most recent epochs are justified, the 2nd using the 3rd as source
    if all_set(1..3) && old_previous_justified_checkpoint.epoch + 2 == current_epoch {
        state.finalized_checkpoint = old_previous_justified_checkpoint;
    }

    // > The 1st/2nd/3rd most recent epochs are justified, the 1st using the 3rd as source
    if all_set(0..3) && old_current_justified_checkpoint.epoch + 2 == current_epoch {
        state.finalized_checkpoint = old_current_justified_checkpoint;
    }

    // > The 1st/2nd most recent epochs are justified, the 1st using the 2nd as source
    if all_set(0..2) && old_current_justified_checkpoint.epoch + 1 == current_epoch {
        state.finalized_checkpoint = old_current_justified_checkpoint;
    }

    Ok(())
}

fn process_crosslinks(state: &mut BeaconState) -> Result<()> {
    state.previous_crosslinks = state.current_crosslinks.clone();

    for attestation_epoch in [AttestationEpoch::Previous, AttestationEpoch::Current] {
        let epoch = epoch_intermediates::absolute_epoch(state, attestation_epoch);
        let committee_count = accessors::get_committee_count(state, epoch).get();
        let start_shard = accessors::get_start_shard(state, epoch)?;

        for offset in 0..committee_count {
            let shard = (start_shard + offset).mod_typenum::<ShardCount>();
            let committee = accessors::get_crosslink_committee(state, epoch, shard)?;

            let (winning_crosslink, attesting_indices) =
                winning_crosslink_and_attesting_indices(state, attestation_epoch, shard)?;

            let attesting = accessors::get_total_balance(state, &attesting_indices);
            let committee_balance = accessors::get_total_balance(state, &committee);

            if 3 * attesting >= 2 * committee_balance {
                *state.current_crosslinks.mod_index_mut(shard) = winning_crosslink;
            }
        }
    }

    Ok(())
}

fn process_rewards_and_penalties(state: &mut BeaconState) -> Result<()> {
    // > No rewards are applied at the end of the genesis epoch
    // > because rewards are for work done in the previous epoch
    if accessors::get_current_epoch(state) == GENESIS_EPOCH {
        return Ok(());
    }

    let attestation = attestation_deltas(state)?;
    let crosslink = crosslink_deltas(state)?;

    for (index, balance) in state.balances.iter_mut().enumerate() {
        mutators::increase_balance(
            balance,
            attestation.rewards[index].saturating_add(crosslink.rewards[index]),
        );
        mutators::decrease_balance(
            balance,
            attestation.penalties[index].saturating_add(crosslink.penalties[index]),
        );
    }

    Ok(())
}

fn process_registry_updates(config: &Config, state: &mut BeaconState) -> Result<()> {
    let current_epoch = accessors::get_current_epoch(state);
    let activation_exit_epoch = misc::compute_activation_exit_epoch(current_epoch);

    // > Process activation eligibility and ejections
    let mut newly_eligible = vec![];
    let mut ejections = vec![];
    let mut activation_queue = vec![];

    for (validator, index) in state.validators.iter().zip(0_u64..) {
        if predicates::is_eligible_for_activation_queue(validator) {
            newly_eligible.push(index);
        }

        if predicates::is_active_validator(validator, current_epoch)
            && validator.effective_balance <= config.ejection_balance
        {
            ejections.push(index);
        }

        if validator.activation_eligibility_epoch != FAR_FUTURE_EPOCH
            && validator.activation_epoch >= activation_exit_epoch
        {
            activation_queue.push((validator.activation_eligibility_epoch, index));
        }
    }

    for index in newly_eligible {
        state.validators.get_mut(index)?.activation_eligibility_epoch = current_epoch;
    }

    for index in ejections {
        mutators::initiate_validator_exit(config, state, index)?;
    }

    // > Queue validators eligible for activation and not yet dequeued for activation
    // > Dequeued validators for activation up to churn limit
    let churn_limit = usize::try_from(accessors::get_validator_churn_limit(config, state))?;

    for (_, index) in activation_queue.into_iter().sorted_unstable().take(churn_limit) {
        let validator = state.validators.get_mut(index)?;

        if validator.activation_epoch == FAR_FUTURE_EPOCH {
            validator.activation_epoch = activation_exit_epoch;
        }
    }

    Ok(())
}

fn process_slashings(state: &mut BeaconState) {
    let epoch = accessors::get_current_epoch(state);
    let total_balance = accessors::get_total_active_balance(state);

    let total_slashings = state
        .slashings
        .iter()
        .fold(0_u64, |total, slashed| total.saturating_add(*slashed));

    let penalties = state
        .validators
        .iter()
        .zip(0_u64..)
        .filter(|(validator, _)| {
            validator.slashed
                && epoch + EpochsPerSlashingsVector::U64 / 2 == validator.withdrawable_epoch
        })
        .map(|(validator, index)| {
            // > Factored out from penalty numerator to avoid uint64 overflow
            let increment = EFFECTIVE_BALANCE_INCREMENT;
            let penalty_numerator = validator.effective_balance / increment
                * total_slashings.saturating_mul(3).min(total_balance);
            let penalty = penalty_numerator / total_balance * increment;

            (index, penalty)
        })
        .collect::<Vec<_>>();

    for (index, penalty) in penalties {
        if let Ok(balance) = mutators::balance(state, index) {
            mutators::decrease_balance(balance, penalty);
        }
    }
}

fn process_final_updates(state: &mut BeaconState) -> Result<()> {
    let current_epoch = accessors::get_current_epoch(state);
    let next_epoch = current_epoch + 1;

    // > Reset eth1 data votes
    if (state.slot + 1) % SlotsPerEth1VotingPeriod::U64 == 0 {
        state.eth1_data_votes = ContiguousList::default();
    }

    // > Update effective balances with hysteresis
    let half_increment = EFFECTIVE_BALANCE_INCREMENT / 2;
    let balances = state.balances.iter().copied().collect::<Vec<_>>();

    for (validator, balance) in state.validators.iter_mut().zip(balances) {
        if balance < validator.effective_balance
            || validator.effective_balance + 3 * half_increment < balance
        {
            validator.effective_balance = balance
                .prev_multiple_of(EFFECTIVE_BALANCE_INCREMENT.try_into()?)
                .min(MAX_EFFECTIVE_BALANCE);
        }
    }

    // > Update start shard
    state.start_shard =
        (state.start_shard + accessors::get_shard_delta(state, current_epoch))
            .mod_typenum::<ShardCount>();

    // > Set active index root
    let index_root_epoch = next_epoch + ACTIVATION_EXIT_DELAY;
    let active_indices: ContiguousList<ValidatorIndex, ValidatorRegistryLimit> =
        accessors::get_active_validator_indices(state, index_root_epoch).try_into()?;

    *state.active_index_roots.mod_index_mut(index_root_epoch) = active_indices.hash_tree_root();

    // > Set committees root
    let compact_root = compute_compact_committees_root(state, next_epoch)?;
    *state.compact_committees_roots.mod_index_mut(next_epoch) = compact_root;

    // > Reset slashings
    *state.slashings.mod_index_mut(next_epoch) = 0;

    // > Set randao mix
    *state.randao_mixes.mod_index_mut(next_epoch) =
        accessors::get_randao_mix(state, current_epoch);

    // > Set historical root accumulator
    if (state.slot + 1) % SlotsPerHistoricalRoot::U64 == 0 {
        let historical_batch = HistoricalBatch {
            block_roots: state.block_roots.clone(),
            state_roots: state.state_roots.clone(),
        };

        state.historical_roots.push(historical_batch.hash_tree_root())?;
    }

    // > Rotate current/previous epoch attestations
    state.previous_epoch_attestations =
        core::mem::take(&mut state.current_epoch_attestations);

    Ok(())
}

/// The root of the committee assignment for `epoch` in compact form.
pub fn compute_compact_committees_root(state: &BeaconState, epoch: Epoch) -> Result<H256> {
    let mut committees = vec![CompactCommittee::default(); ShardCount::USIZE];

    let start_shard = accessors::get_start_shard(state, epoch)?;
    let committee_count = accessors::get_committee_count(state, epoch).get();

    for committee_number in 0..committee_count {
        let shard = (start_shard + committee_number).mod_typenum::<ShardCount>();

        for index in accessors::get_crosslink_committee(state, epoch, shard)? {
            let validator = state.validators.get(index)?;

            let compact_balance: Gwei =
                validator.effective_balance / EFFECTIVE_BALANCE_INCREMENT;
            let compact_validator =
                (index << 16) + (u64::from(validator.slashed) << 15) + compact_balance;

            let committee = &mut committees[usize::try_from(shard)?];

            committee.pubkeys.push(validator.pubkey)?;
            committee.compact_validators.push(compact_validator)?;
        }
    }

    Ok(MerkleTree::merkleize_chunks(
        10,
        committees
            .iter()
            .map(SszHash::hash_tree_root)
            .collect::<Vec<_>>(),
    ))
}
