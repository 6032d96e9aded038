use core::cmp::Ordering;

use anyhow::Result;
use typenum::Unsigned as _;
use types::{
    config::Config,
    phase0::{
        beacon_state::BeaconState,
        consts::FAR_FUTURE_EPOCH,
        primitives::{Gwei, ValidatorIndex},
    },
    preset::{
        EpochsPerSlashingsVector, MIN_SLASHING_PENALTY_QUOTIENT, PROPOSER_REWARD_QUOTIENT,
        WHISTLEBLOWER_REWARD_QUOTIENT,
    },
};

use crate::{
    accessors::{get_beacon_proposer_index, get_current_epoch, get_validator_churn_limit},
    error::Error,
    misc::compute_activation_exit_epoch,
};

pub fn balance<'state>(
    state: &'state mut BeaconState,
    validator_index: ValidatorIndex,
) -> Result<&'state mut Gwei> {
    state
        .balances
        .get_mut(validator_index)
        .map_err(Into::into)
}

#[inline]
pub fn increase_balance(balance: &mut Gwei, delta: Gwei) {
    *balance = balance.saturating_add(delta);
}

#[inline]
pub fn decrease_balance(balance: &mut Gwei, delta: Gwei) {
    *balance = balance.saturating_sub(delta);
}

pub fn initiate_validator_exit(
    config: &Config,
    state: &mut BeaconState,
    validator_index: ValidatorIndex,
) -> Result<()> {
    // > Return if validator already initiated exit
    if state.validators.get(validator_index)?.exit_epoch != FAR_FUTURE_EPOCH {
        return Ok(());
    }

    // > Compute exit queue epoch
    let mut exit_queue_epoch = compute_activation_exit_epoch(get_current_epoch(state));
    let mut exit_queue_churn = 0;

    for validator in &state.validators {
        let exit_epoch = validator.exit_epoch;

        if exit_epoch == FAR_FUTURE_EPOCH {
            continue;
        }

        match exit_epoch.cmp(&exit_queue_epoch) {
            Ordering::Less => {}
            Ordering::Equal => exit_queue_churn += 1,
            Ordering::Greater => {
                exit_queue_epoch = exit_epoch;
                exit_queue_churn = 1;
            }
        }
    }

    if exit_queue_churn >= get_validator_churn_limit(config, state) {
        exit_queue_epoch += 1;
    }

    // > Set validator exit epoch and withdrawable epoch
    let withdrawable_epoch = exit_queue_epoch
        .checked_add(config.min_validator_withdrawability_delay)
        .ok_or(Error::EpochOverflow)?;

    let validator = state.validators.get_mut(validator_index)?;

    validator.exit_epoch = exit_queue_epoch;
    validator.withdrawable_epoch = withdrawable_epoch;

    Ok(())
}

/// Slashes a validator: exit, penalty, and rewards for the whistleblower and
/// the proposer that included the report.
pub fn slash_validator(
    config: &Config,
    state: &mut BeaconState,
    slashed_index: ValidatorIndex,
    whistleblower_index: Option<ValidatorIndex>,
) -> Result<()> {
    let epoch = get_current_epoch(state);

    initiate_validator_exit(config, state, slashed_index)?;

    let validator = state.validators.get_mut(slashed_index)?;

    validator.slashed = true;
    validator.withdrawable_epoch = validator
        .withdrawable_epoch
        .max(epoch + EpochsPerSlashingsVector::U64);

    let effective_balance = validator.effective_balance;

    let slashings_bucket = state.slashings.mod_index(epoch).saturating_add(effective_balance);
    *state.slashings.mod_index_mut(epoch) = slashings_bucket;

    decrease_balance(
        balance(state, slashed_index)?,
        effective_balance / MIN_SLASHING_PENALTY_QUOTIENT,
    );

    let proposer_index = get_beacon_proposer_index(state)?;
    let whistleblower_index = whistleblower_index.unwrap_or(proposer_index);
    let whistleblower_reward = effective_balance / WHISTLEBLOWER_REWARD_QUOTIENT;
    let proposer_reward = whistleblower_reward / PROPOSER_REWARD_QUOTIENT;

    increase_balance(balance(state, proposer_index)?, proposer_reward);
    increase_balance(
        balance(state, whistleblower_index)?,
        whistleblower_reward - proposer_reward,
    );

    Ok(())
}
