//! End-to-end exercises of the state transition, from a quick-start genesis.

use std::{collections::HashMap, num::NonZeroU64};

use anyhow::Result;
use bls::{PublicKeyBytes, SecretKey, SignatureBytes};
use helper_functions::{accessors, signing};
use ssz::{BitList, Hc, SszHash as _};
use transition_functions::phase0 as stf;
use types::{
    config::Config,
    phase0::{
        beacon_state::BeaconState,
        containers::{
            Attestation, BeaconBlock, BeaconBlockBody, BeaconBlockHeader, Deposit,
            ProposerSlashing,
        },
        primitives::{Slot, H256},
    },
    preset::{
        MAX_EFFECTIVE_BALANCE, MIN_ATTESTATION_INCLUSION_DELAY, MIN_SLASHING_PENALTY_QUOTIENT,
        WHISTLEBLOWER_REWARD_QUOTIENT,
    },
};

const VALIDATOR_COUNT: u64 = 16;

struct Context {
    config: Config,
    genesis_state: Hc<BeaconState>,
    deposit_tree: genesis::DepositTree,
    secret_keys: HashMap<PublicKeyBytes, SecretKey>,
}

fn context() -> Context {
    let config = Config::interop();

    let (genesis_state, deposit_tree) = interop::quick_start_beacon_state(
        &config,
        0,
        NonZeroU64::new(VALIDATOR_COUNT).expect("validator count is nonzero"),
    )
    .expect("quick-start genesis can be constructed");

    let secret_keys = (0..VALIDATOR_COUNT + 1)
        .map(interop::secret_key)
        .map(|secret_key| (secret_key.to_public_key().to_bytes(), secret_key))
        .collect();

    Context {
        config,
        genesis_state,
        deposit_tree,
        secret_keys,
    }
}

impl Context {
    fn secret_key_of(&self, state: &BeaconState, validator_index: u64) -> &SecretKey {
        let pubkey = accessors::public_key(state, validator_index)
            .expect("the validator exists");

        &self.secret_keys[&pubkey]
    }

    /// Builds a valid signed block at `slot` on top of `state_before`,
    /// returning it along with the post-state.
    fn propose(
        &self,
        state_before: &Hc<BeaconState>,
        slot: Slot,
        fill_body: impl FnOnce(&mut BeaconBlockBody),
    ) -> Result<(BeaconBlock, Hc<BeaconState>)> {
        let mut state = state_before.clone();
        stf::process_slots(&self.config, &mut state, slot)?;

        let proposer_index = accessors::get_beacon_proposer_index(&state)?;
        let proposer_key = self.secret_key_of(&state, proposer_index);

        let epoch = accessors::get_current_epoch(&state);

        let mut body = BeaconBlockBody {
            randao_reveal: proposer_key
                .sign(signing::randao_signing_root(&state, epoch))
                .to_bytes(),
            eth1_data: state.eth1_data,
            ..BeaconBlockBody::default()
        };

        fill_body(&mut body);

        let mut block = BeaconBlock {
            slot,
            parent_root: state.latest_block_header.hash_tree_root(),
            state_root: H256::zero(),
            body,
            signature: SignatureBytes::zero(),
        };

        // Trial run to fill in the state root.
        let mut trial_state = state.clone();
        stf::custom_process_block(
            &self.config,
            &mut trial_state,
            &block,
            helper_functions::verifier::NullVerifier,
        )?;
        block.state_root = trial_state.hash_tree_root();

        block.signature = proposer_key
            .sign(signing::block_signing_root(&state, &block))
            .to_bytes();

        // The real transition verifies every signature and the state root.
        let mut post_state = state_before.clone();
        stf::untrusted_state_transition(&self.config, &mut post_state, &block)?;

        Ok((block, post_state))
    }

    /// A fully signed attestation by committee 0 of `slot`,
    /// built against `state` (already advanced past `slot`).
    fn attest(&self, state: &BeaconState, slot: Slot, head_root: H256) -> Result<Attestation> {
        let epoch = helper_functions::misc::compute_epoch_at_slot(slot);
        let shard = accessors::crosslink_shard(state, slot, 0)?;
        let committee = accessors::get_beacon_committee(state, slot, 0)?;
        let parent_crosslink = state.current_crosslinks.mod_index(shard);

        let target_root = if helper_functions::misc::compute_start_slot_at_epoch(epoch) == slot {
            head_root
        } else {
            accessors::get_block_root(state, epoch)?
        };

        let data = types::phase0::containers::AttestationData {
            beacon_block_root: head_root,
            source: state.current_justified_checkpoint,
            target: types::phase0::containers::Checkpoint {
                epoch,
                root: target_root,
            },
            crosslink: types::phase0::containers::Crosslink {
                shard,
                parent_root: parent_crosslink.hash_tree_root(),
                start_epoch: parent_crosslink.end_epoch,
                end_epoch: epoch
                    .min(parent_crosslink.end_epoch + types::preset::MAX_EPOCHS_PER_CROSSLINK),
                data_root: H256::zero(),
            },
        };

        let signing_root = signing::attestation_data_signing_root(state, &data);

        let signatures = committee
            .iter()
            .map(|member| self.secret_key_of(state, *member).sign(signing_root))
            .collect::<Vec<_>>();

        let aggregate = bls::aggregate_signatures(&signatures)
            .expect("the committee is not empty");

        let mut aggregation_bits = BitList::with_length(committee.len());

        for position in 0..committee.len() {
            aggregation_bits.set(position, true);
        }

        Ok(Attestation {
            aggregation_bits,
            data,
            custody_bits: BitList::with_length(committee.len()),
            signature: aggregate.to_bytes(),
        })
    }
}

#[test]
fn empty_slots_cache_roots_without_touching_justification() {
    let context = context();

    let mut state = context.genesis_state.clone();
    let genesis_root = state.hash_tree_root();

    stf::process_slots(&context.config, &mut state, 32).expect("empty slots can be processed");

    assert_eq!(state.slot, 32);
    assert_eq!(*state.state_roots.mod_index(0), genesis_root);

    // Every cached block root commits to the header as of that slot; with no
    // blocks they all equal the genesis header root.
    let genesis_header_root = accessors::latest_block_root(&context.genesis_state);

    for slot in 0..32 {
        assert_eq!(*state.block_roots.mod_index(slot), genesis_header_root);
    }

    assert_eq!(state.current_justified_checkpoint.epoch, 0);
    assert_eq!(state.finalized_checkpoint.epoch, 0);
}

#[test]
fn a_block_commits_to_the_state_it_produces() {
    let context = context();

    let (block, post_state) = context
        .propose(&context.genesis_state, 1, |_| {})
        .expect("an empty block is valid");

    assert_eq!(post_state.slot, 1);
    assert_eq!(block.state_root, post_state.hash_tree_root());

    // The new header commits back to the block.
    assert_eq!(post_state.latest_block_header.body_root, block.body.hash_tree_root());
    assert_eq!(post_state.latest_block_header.state_root, H256::zero());
}

#[test]
fn rewinding_blocks_are_rejected() {
    let context = context();

    let (_, post_state) = context
        .propose(&context.genesis_state, 2, |_| {})
        .expect("an empty block is valid");

    let stale_block = BeaconBlock {
        slot: 1,
        ..BeaconBlock::default()
    };

    let mut state = post_state;

    stf::untrusted_state_transition(&context.config, &mut state, &stale_block)
        .expect_err("blocks cannot rewind the state");
}

#[test]
fn attestations_are_included_with_their_inclusion_delay() {
    let context = context();

    let (block_1, state_1) = context
        .propose(&context.genesis_state, 1, |_| {})
        .expect("an empty block is valid");

    let mut lookahead = state_1.clone();
    stf::process_slots(&context.config, &mut lookahead, 2).expect("one empty slot");

    let attestation = context
        .attest(&lookahead, 1, block_1.signing_root())
        .expect("committee 0 of slot 1 can attest");

    let (_, state_2) = context
        .propose(&state_1, 1 + MIN_ATTESTATION_INCLUSION_DELAY, |body| {
            body.attestations = [attestation.clone()]
                .try_into()
                .expect("one attestation is within the cap");
        })
        .expect("a block carrying the attestation is valid");

    assert_eq!(state_2.current_epoch_attestations.len(), 1);

    let pending = state_2
        .current_epoch_attestations
        .get(0)
        .expect("the attestation was recorded");

    assert_eq!(pending.inclusion_delay, MIN_ATTESTATION_INCLUSION_DELAY);
    assert_eq!(pending.data, attestation.data);
}

#[test]
fn double_proposals_are_slashed_and_rewarded() {
    let context = context();

    let state_for_signing = {
        let mut state = context.genesis_state.clone();
        stf::process_slots(&context.config, &mut state, 1).expect("one empty slot");
        state
    };

    // Two headers at the same slot differing only in state root. The
    // offender must not be the proposer of the block carrying the report,
    // or the balance assertions below would overlap.
    let block_proposer = accessors::get_beacon_proposer_index(&state_for_signing)
        .expect("the state has a proposer");
    let offender = (block_proposer + 1) % VALIDATOR_COUNT;

    let offender_key = context.secret_key_of(&state_for_signing, offender);

    let mut header_1 = BeaconBlockHeader {
        slot: 1,
        parent_root: H256::repeat_byte(1),
        state_root: H256::repeat_byte(2),
        body_root: H256::repeat_byte(3),
        signature: SignatureBytes::zero(),
    };
    let mut header_2 = BeaconBlockHeader {
        state_root: H256::repeat_byte(9),
        ..header_1
    };

    for header in [&mut header_1, &mut header_2] {
        header.signature = offender_key
            .sign(signing::header_signing_root(&state_for_signing, header))
            .to_bytes();
    }

    let slashing = ProposerSlashing {
        proposer_index: offender,
        header_1,
        header_2,
    };

    let (_, post_state) = context
        .propose(&context.genesis_state, 1, |body| {
            body.proposer_slashings = [slashing].try_into().expect("within the cap");
        })
        .expect("a block carrying the slashing is valid");

    let slashed = post_state
        .validators
        .get(offender)
        .expect("the offender exists");

    assert!(slashed.slashed);

    let penalty = MAX_EFFECTIVE_BALANCE / MIN_SLASHING_PENALTY_QUOTIENT;
    let offender_balance = *post_state.balances.get(offender).expect("balances exist");

    assert_eq!(offender_balance, MAX_EFFECTIVE_BALANCE - penalty);

    // The proposer of the including block is also the whistleblower here,
    // so it collects the whole bounty.
    let reward = MAX_EFFECTIVE_BALANCE / WHISTLEBLOWER_REWARD_QUOTIENT;
    let balance = *post_state
        .balances
        .get(block_proposer)
        .expect("balances exist");

    assert_eq!(balance, MAX_EFFECTIVE_BALANCE + reward);
}

#[test]
fn deposits_require_a_valid_branch_and_append_a_validator() {
    let context = context();

    // A brand new validator deposits after genesis.
    let new_key = interop::secret_key(VALIDATOR_COUNT);
    let deposit_data = interop::quick_start_deposit_data(&context.config, &new_key);

    let mut tree = context.deposit_tree.clone();
    tree.push(deposit_data.hash_tree_root());

    let mut base_state = context.genesis_state.clone();
    base_state.eth1_data.deposit_root = tree.root();
    base_state.eth1_data.deposit_count = tree.count();

    let proof = tree.proof(VALIDATOR_COUNT).expect("the deposit exists");

    let (_, post_state) = context
        .propose(&base_state, 1, |body| {
            body.deposits = [Deposit {
                proof: proof.clone(),
                data: deposit_data,
            }]
            .try_into()
            .expect("within the cap");
        })
        .expect("a block carrying the deposit is valid");

    assert_eq!(post_state.validators.len() as u64, VALIDATOR_COUNT + 1);
    assert_eq!(post_state.eth1_deposit_index, VALIDATOR_COUNT + 1);
    assert_eq!(
        *post_state
            .balances
            .get(VALIDATOR_COUNT)
            .expect("the new balance exists"),
        MAX_EFFECTIVE_BALANCE,
    );

    // A corrupted branch is refused.
    let mut bad_proof = proof;
    *bad_proof.mod_index_mut(0) = H256::repeat_byte(0xee);

    context
        .propose(&base_state, 1, |body| {
            body.deposits = [Deposit {
                proof: bad_proof.clone(),
                data: deposit_data,
            }]
            .try_into()
            .expect("within the cap");
        })
        .expect_err("a corrupted deposit branch is rejected");
}

#[test]
fn chained_blocks_keep_finality_monotonic() {
    let context = context();

    let mut state = context.genesis_state.clone();
    let mut finalized = 0;

    for slot in 1..=8 {
        let (_, post_state) = context
            .propose(&state, slot, |_| {})
            .expect("empty blocks are valid");

        assert!(post_state.finalized_checkpoint.epoch >= finalized);

        finalized = post_state.finalized_checkpoint.epoch;
        state = post_state;
    }
}
