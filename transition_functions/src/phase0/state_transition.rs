use anyhow::{ensure, Result};
use helper_functions::{
    accessors, signing,
    verifier::{NullVerifier, SignatureKind, SingleVerifier, Verifier},
};
use ssz::{Hc, SszHash as _};
use types::{
    config::Config,
    phase0::{beacon_state::BeaconState, containers::BeaconBlock},
};

use crate::{
    error::Error,
    phase0::{block_processing, slot_processing},
};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StateRootPolicy {
    Verify,
    /// For blocks whose state root was verified before being persisted.
    Trust,
}

/// Applies `block` to `state`.
///
/// The caller owns the working copy: on error the state is in an unspecified
/// intermediate form and must be discarded.
pub fn state_transition(
    config: &Config,
    state: &mut Hc<BeaconState>,
    block: &BeaconBlock,
    state_root_policy: StateRootPolicy,
    mut verifier: impl Verifier,
) -> Result<()> {
    // > Process slots (including those with no blocks) since block
    //
    // The equality test rejects blocks attempting to rewind the state early;
    // they would otherwise fail the state root check.
    if state.slot != block.slot {
        slot_processing::process_slots(config, state, block.slot)?;
    }

    // > Verify signature
    verifier.verify_singular(
        signing::block_signing_root(state, block),
        block.signature,
        accessors::public_key(state, accessors::get_beacon_proposer_index(state)?)?,
        SignatureKind::Block,
    )?;

    // > Process block
    block_processing::custom_process_block(config, state, block, &mut verifier)?;

    // > Verify state root
    if state_root_policy == StateRootPolicy::Verify {
        let computed = state.hash_tree_root();
        let in_block = block.state_root;

        ensure!(
            computed == in_block,
            Error::StateRootMismatch { computed, in_block },
        );
    }

    Ok(())
}

pub fn untrusted_state_transition(
    config: &Config,
    state: &mut Hc<BeaconState>,
    block: &BeaconBlock,
) -> Result<()> {
    state_transition(config, state, block, StateRootPolicy::Verify, SingleVerifier)
}

/// Replays a block that was fully verified before.
pub fn trusted_state_transition(
    config: &Config,
    state: &mut Hc<BeaconState>,
    block: &BeaconBlock,
) -> Result<()> {
    state_transition(config, state, block, StateRootPolicy::Trust, NullVerifier)
}
