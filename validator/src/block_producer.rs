use anyhow::Result;
use bls::SignatureBytes;
use helper_functions::verifier::NullVerifier;
use log::warn;
use operation_pools::OperationPools;
use ssz::{Hc, SszHash as _};
use transition_functions::phase0 as stf;
use typenum::Unsigned as _;
use types::{
    config::Config,
    phase0::{
        beacon_state::BeaconState,
        containers::{BeaconBlock, BeaconBlockBody},
        primitives::{Slot, H256},
    },
    preset::{
        MaxAttestations, MaxAttesterSlashings, MaxProposerSlashings, MaxTransfers,
        MaxVoluntaryExits, MIN_ATTESTATION_INCLUSION_DELAY,
    },
};

/// Fills a block body from the pending-operation pools, under the per-type
/// caps the state transition enforces.
///
/// The eth1 vote repeats the state's current value; the deposit-contract
/// follower that would supply fresher votes is an external collaborator, and
/// repeating the current value is always valid. That also means blocks
/// produced here carry no deposits.
pub fn produce_block_body(
    state: &BeaconState,
    pools: &OperationPools,
    slot: Slot,
    randao_reveal: SignatureBytes,
    graffiti: H256,
) -> Result<BeaconBlockBody> {
    let attestations = pools.attestations.peek_aggregated_attestations(
        MaxAttestations::USIZE,
        slot.saturating_sub(MIN_ATTESTATION_INCLUSION_DELAY),
    );

    Ok(BeaconBlockBody {
        randao_reveal,
        eth1_data: state.eth1_data,
        graffiti,
        proposer_slashings: pools
            .proposer_slashings
            .peek(MaxProposerSlashings::USIZE)
            .try_into()?,
        attester_slashings: pools
            .attester_slashings
            .peek(MaxAttesterSlashings::USIZE)
            .try_into()?,
        attestations: attestations.try_into()?,
        deposits: Default::default(),
        voluntary_exits: pools
            .voluntary_exits
            .peek(MaxVoluntaryExits::USIZE)
            .try_into()?,
        transfers: pools.transfers.peek(MaxTransfers::USIZE).try_into()?,
    })
}

/// Builds an unsigned block at `slot` on top of `head_state`, running a trial
/// state transition to fill in the state root.
///
/// `head_state` must already be advanced to `slot`. If the pooled operations
/// turn out to be inapplicable on this fork, the body is rebuilt empty rather
/// than forfeiting the proposal.
pub fn produce_block_without_signature(
    config: &Config,
    head_state: &Hc<BeaconState>,
    head_root: H256,
    pools: &OperationPools,
    slot: Slot,
    randao_reveal: SignatureBytes,
    graffiti: H256,
) -> Result<BeaconBlock> {
    let full_body = produce_block_body(head_state, pools, slot, randao_reveal, graffiti)?;

    match trial_transition(config, head_state, head_root, slot, full_body.clone()) {
        Ok(block) => Ok(block),
        Err(error) => {
            warn!("pooled operations are not applicable, proposing an empty body: {error:#}");

            let empty_body = BeaconBlockBody {
                randao_reveal,
                eth1_data: head_state.eth1_data,
                graffiti,
                ..BeaconBlockBody::default()
            };

            trial_transition(config, head_state, head_root, slot, empty_body)
        }
    }
}

fn trial_transition(
    config: &Config,
    head_state: &Hc<BeaconState>,
    head_root: H256,
    slot: Slot,
    body: BeaconBlockBody,
) -> Result<BeaconBlock> {
    let mut block = BeaconBlock {
        slot,
        parent_root: head_root,
        state_root: H256::zero(),
        body,
        signature: SignatureBytes::zero(),
    };

    let mut state = head_state.clone();

    // Signatures cannot be checked yet: the block is not signed and the
    // RANDAO reveal was produced by the local signer moments ago.
    stf::state_transition(
        config,
        &mut state,
        &block,
        stf::StateRootPolicy::Trust,
        NullVerifier,
    )?;

    block.state_root = state.hash_tree_root();

    Ok(block)
}
