use anyhow::{ensure, Result};
use helper_functions::misc;
use ssz::{Hc, SszHash as _};
use types::{
    config::Config,
    phase0::{beacon_state::BeaconState, primitives::Slot},
};

use crate::{error::Error, phase0::epoch_processing};

/// Advances `state` through empty slots up to `target`, running epoch
/// processing at epoch boundaries.
pub fn process_slots(config: &Config, state: &mut Hc<BeaconState>, target: Slot) -> Result<()> {
    ensure!(
        state.slot <= target,
        Error::SlotNotLater {
            current: state.slot,
            target,
        },
    );

    while state.slot < target {
        process_slot(state);

        if misc::is_epoch_start(state.slot + 1) {
            epoch_processing::process_epoch(config, state)?;
        }

        state.slot += 1;
    }

    Ok(())
}

pub fn process_slot(state: &mut Hc<BeaconState>) {
    let slot = state.slot;

    // > Cache state root
    let previous_state_root = state.hash_tree_root();
    *state.state_roots.mod_index_mut(slot) = previous_state_root;

    // > Cache latest block header state root
    if state.latest_block_header.state_root.is_zero() {
        state.latest_block_header.state_root = previous_state_root;
    }

    // > Cache block root
    let previous_block_root = state.latest_block_header.hash_tree_root();
    *state.block_roots.mod_index_mut(slot) = previous_block_root;
}
