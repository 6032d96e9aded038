use anyhow::Result;
use helper_functions::{accessors, misc};
use ssz::SszHash as _;
use types::{
    phase0::{
        beacon_state::BeaconState,
        containers::{AttestationData, Checkpoint, Crosslink},
        primitives::{CommitteeIndex, Slot, H256},
    },
    preset::MAX_EPOCHS_PER_CROSSLINK,
};

/// The vote an attester casts in `slot`: the current head, the justified
/// source, the epoch-boundary target, and a phase-0 placeholder crosslink.
///
/// `state` must be advanced to `slot`.
pub fn build_attestation_data(
    state: &BeaconState,
    head_root: H256,
    slot: Slot,
    committee_index: CommitteeIndex,
) -> Result<AttestationData> {
    let epoch = misc::compute_epoch_at_slot(slot);
    let start_slot = misc::compute_start_slot_at_epoch(epoch);

    let target_root = if start_slot == state.slot {
        head_root
    } else {
        accessors::get_block_root(state, epoch)?
    };

    let shard = accessors::crosslink_shard(state, slot, committee_index)?;
    let parent_crosslink = state.current_crosslinks.mod_index(shard);

    Ok(AttestationData {
        beacon_block_root: head_root,
        source: state.current_justified_checkpoint,
        target: Checkpoint {
            epoch,
            root: target_root,
        },
        crosslink: Crosslink {
            shard,
            parent_root: parent_crosslink.hash_tree_root(),
            start_epoch: parent_crosslink.end_epoch,
            end_epoch: epoch.min(parent_crosslink.end_epoch + MAX_EPOCHS_PER_CROSSLINK),
            data_root: H256::zero(),
        },
    })
}
