use std::{collections::HashMap, sync::Arc};

use anyhow::Result;
use helper_functions::{accessors, misc, predicates};
use log::debug;
use ssz::Hc;
use types::{
    config::Config,
    phase0::{
        beacon_state::BeaconState,
        containers::{Attestation, BeaconBlock, Checkpoint},
        primitives::{Epoch, Gwei, Slot, ValidatorIndex, H256},
    },
};

use crate::{error::Error, proto_array::ProtoArray};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct LatestMessage {
    pub epoch: Epoch,
    pub root: H256,
}

/// The canonical in-memory chain: blocks, their post-states, and the
/// proto-array fork choice over them.
///
/// The store is single-writer; the control layer serializes all mutations
/// through one thread and publishes read-only snapshots.
pub struct Store {
    config: Arc<Config>,
    tick_slot: Slot,
    justified_checkpoint: Checkpoint,
    finalized_checkpoint: Checkpoint,
    proto_array: ProtoArray,
    blocks: HashMap<H256, Arc<BeaconBlock>>,
    states: HashMap<H256, Arc<Hc<BeaconState>>>,
    latest_messages: HashMap<ValidatorIndex, LatestMessage>,
    justified_balances: Vec<Gwei>,
}

impl Store {
    /// Anchors a store at a trusted state, normally genesis.
    #[must_use]
    pub fn new(config: Arc<Config>, anchor_block: Arc<BeaconBlock>, anchor_state: Arc<Hc<BeaconState>>) -> Self {
        let anchor_root = anchor_block.signing_root();
        let anchor_epoch = accessors::get_current_epoch(&anchor_state);

        let checkpoint = Checkpoint {
            epoch: anchor_epoch,
            root: anchor_root,
        };

        let mut proto_array = ProtoArray::default();
        proto_array.insert_anchor(anchor_root, anchor_block.slot, anchor_epoch, anchor_epoch);

        let justified_balances = balances_in(&anchor_state, anchor_epoch);

        Self {
            config,
            tick_slot: anchor_block.slot,
            justified_checkpoint: checkpoint,
            finalized_checkpoint: checkpoint,
            proto_array,
            blocks: HashMap::from([(anchor_root, anchor_block)]),
            states: HashMap::from([(anchor_root, anchor_state)]),
            latest_messages: HashMap::new(),
            justified_balances,
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn tick_slot(&self) -> Slot {
        self.tick_slot
    }

    #[must_use]
    pub const fn justified_checkpoint(&self) -> Checkpoint {
        self.justified_checkpoint
    }

    #[must_use]
    pub const fn finalized_checkpoint(&self) -> Checkpoint {
        self.finalized_checkpoint
    }

    #[must_use]
    pub fn contains_block(&self, root: H256) -> bool {
        self.blocks.contains_key(&root)
    }

    #[must_use]
    pub fn block(&self, root: H256) -> Option<Arc<BeaconBlock>> {
        self.blocks.get(&root).cloned()
    }

    #[must_use]
    pub fn state(&self, root: H256) -> Option<Arc<Hc<BeaconState>>> {
        self.states.get(&root).cloned()
    }

    pub fn on_tick(&mut self, slot: Slot) {
        self.tick_slot = self.tick_slot.max(slot);
    }

    /// Registers a block and its post-state, propagating the weight of the
    /// attestations it carries.
    ///
    /// The caller must have validated the block with the state transition
    /// function; the store only performs fork-choice-level checks.
    pub fn on_block(
        &mut self,
        block: Arc<BeaconBlock>,
        state: Arc<Hc<BeaconState>>,
    ) -> Result<H256, Error> {
        let root = block.signing_root();
        let finalized_slot = misc::compute_start_slot_at_epoch(self.finalized_checkpoint.epoch);

        // Blocks at or below the finalized slot can never become canonical.
        if block.slot <= finalized_slot && root != self.finalized_checkpoint.root {
            return Err(Error::BelowFinalized {
                root,
                slot: block.slot,
            });
        }

        if !self.proto_array.contains(block.parent_root) {
            return Err(Error::UnknownParent {
                root,
                parent_root: block.parent_root,
            });
        }

        // The branch must pass through the finalized checkpoint.
        if self
            .proto_array
            .ancestor_at_slot(block.parent_root, finalized_slot)
            != Some(self.finalized_checkpoint.root)
        {
            return Err(Error::BelowFinalized {
                root,
                slot: block.slot,
            });
        }

        self.proto_array.insert_block(
            root,
            block.parent_root,
            block.slot,
            state.current_justified_checkpoint.epoch,
            state.finalized_checkpoint.epoch,
        )?;

        self.blocks.insert(root, block.clone());
        self.states.insert(root, state.clone());

        self.update_checkpoints(&state);

        // > Propagate attester weights for attestations inside the block
        for attestation in &block.body.attestations {
            let indices = accessors::get_attesting_indices(
                &state,
                &attestation.data,
                &attestation.aggregation_bits,
            )
            .unwrap_or_default();

            for validator_index in indices {
                self.register_vote(
                    validator_index,
                    attestation.data.target.epoch,
                    attestation.data.beacon_block_root,
                );
            }
        }

        Ok(root)
    }

    /// Updates latest messages from a gossiped attestation after checking it
    /// is viable in its target's state.
    pub fn on_attestation(&mut self, attestation: &Attestation) -> Result<()> {
        let data = attestation.data;
        let target = data.target;
        let tick_epoch = misc::compute_epoch_at_slot(self.tick_slot);

        if target.epoch + 1 < tick_epoch || target.epoch > tick_epoch {
            return Err(Error::AttestationFromWrongEpoch {
                epoch: target.epoch,
                tick_slot: self.tick_slot,
            }
            .into());
        }

        if !self.contains_block(data.beacon_block_root) {
            return Err(Error::UnknownAttestationBlock {
                root: data.beacon_block_root,
            }
            .into());
        }

        let target_state = self
            .states
            .get(&target.root)
            .ok_or(Error::UnknownAttestationBlock { root: target.root })?
            .clone();

        // Committee assignments are made in the target's state. If the target
        // block is from an earlier epoch, advance a copy through empty slots.
        let target_start_slot = misc::compute_start_slot_at_epoch(target.epoch);

        let attestation_state = if target_state.slot < target_start_slot {
            let mut advanced = (*target_state).clone();

            transition_functions::phase0::process_slots(
                &self.config,
                &mut advanced,
                target_start_slot,
            )?;

            Arc::new(advanced)
        } else {
            target_state
        };

        let attestation_slot =
            accessors::get_attestation_data_slot(&attestation_state, &data)?;

        if attestation_slot > self.tick_slot {
            return Err(Error::AttestationFromFuture {
                attestation_slot,
                tick_slot: self.tick_slot,
            }
            .into());
        }

        let indices = accessors::get_attesting_indices(
            &attestation_state,
            &data,
            &attestation.aggregation_bits,
        )?;

        for validator_index in indices {
            self.register_vote(validator_index, target.epoch, data.beacon_block_root);
        }

        Ok(())
    }

    #[must_use]
    pub fn get_head(&self) -> H256 {
        self.proto_array.head(
            self.justified_checkpoint.root,
            self.justified_checkpoint.epoch,
            self.finalized_checkpoint.epoch,
        )
    }

    #[must_use]
    pub fn get_ancestor(&self, root: H256, slot: Slot) -> Option<H256> {
        self.proto_array.ancestor_at_slot(root, slot)
    }

    #[must_use]
    pub fn latest_message(&self, validator_index: ValidatorIndex) -> Option<LatestMessage> {
        self.latest_messages.get(&validator_index).copied()
    }

    /// Records the latest vote of `validator_index`.
    /// Replacement happens only at a strictly greater target epoch.
    pub fn register_vote(&mut self, validator_index: ValidatorIndex, epoch: Epoch, root: H256) {
        if !self.proto_array.contains(root) {
            return;
        }

        let balance = self.validator_balance(validator_index);
        let new_message = LatestMessage { epoch, root };

        match self.latest_messages.get(&validator_index).copied() {
            Some(previous) => {
                if epoch > previous.epoch {
                    self.proto_array.remove_weight(previous.root, balance);
                    self.proto_array.add_weight(root, balance);
                    self.latest_messages.insert(validator_index, new_message);
                }
            }
            None => {
                self.proto_array.add_weight(root, balance);
                self.latest_messages.insert(validator_index, new_message);
            }
        }
    }

    fn validator_balance(&self, validator_index: ValidatorIndex) -> Gwei {
        usize::try_from(validator_index)
            .ok()
            .and_then(|index| self.justified_balances.get(index).copied())
            .unwrap_or_default()
    }

    fn update_checkpoints(&mut self, state: &BeaconState) {
        if state.current_justified_checkpoint.epoch > self.justified_checkpoint.epoch {
            self.justified_checkpoint = state.current_justified_checkpoint;

            debug!(
                "justified checkpoint advanced to epoch {} ({:?})",
                self.justified_checkpoint.epoch, self.justified_checkpoint.root,
            );

            self.refresh_justified_balances();
        }

        if state.finalized_checkpoint.epoch > self.finalized_checkpoint.epoch {
            self.finalized_checkpoint = state.finalized_checkpoint;

            debug!(
                "finalized checkpoint advanced to epoch {} ({:?})",
                self.finalized_checkpoint.epoch, self.finalized_checkpoint.root,
            );

            self.prune_finalized();
        }
    }

    /// Weights are derived from the balances in the justified state, so they
    /// are all recomputed when the justified checkpoint moves.
    fn refresh_justified_balances(&mut self) {
        let Some(justified_state) = self.states.get(&self.justified_checkpoint.root) else {
            return;
        };

        self.justified_balances = balances_in(justified_state, self.justified_checkpoint.epoch);

        self.proto_array.zero_weights();

        let messages = self
            .latest_messages
            .iter()
            .map(|(validator_index, message)| (*validator_index, *message))
            .collect::<Vec<_>>();

        for (validator_index, message) in messages {
            let balance = self.validator_balance(validator_index);
            self.proto_array.add_weight(message.root, balance);
        }
    }

    fn prune_finalized(&mut self) {
        let finalized_root = self.finalized_checkpoint.root;
        let removed = self.proto_array.prune_to_descendants_of(finalized_root);

        for root in &removed {
            self.blocks.remove(root);
            self.states.remove(root);
        }

        self.latest_messages
            .retain(|_, message| self.proto_array.contains(message.root));

        if !removed.is_empty() {
            debug!("pruned {} blocks below finality", removed.len());
        }
    }
}

fn balances_in(state: &BeaconState, epoch: Epoch) -> Vec<Gwei> {
    state
        .validators
        .iter()
        .map(|validator| {
            if predicates::is_active_validator(validator, epoch) {
                validator.effective_balance
            } else {
                0
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use ssz::SszHash as _;
    use types::{
        phase0::{consts::FAR_FUTURE_EPOCH, containers::Validator},
        preset::MAX_EFFECTIVE_BALANCE,
    };

    use super::*;

    fn anchor_state(validator_count: u64) -> Arc<Hc<BeaconState>> {
        let validators = (0..validator_count)
            .map(|_| Validator {
                effective_balance: MAX_EFFECTIVE_BALANCE,
                exit_epoch: FAR_FUTURE_EPOCH,
                withdrawable_epoch: FAR_FUTURE_EPOCH,
                ..Validator::default()
            })
            .collect::<Vec<_>>();

        let state = BeaconState {
            validators: validators.try_into().expect("registry bound is enormous"),
            ..BeaconState::default()
        };

        Arc::new(Hc::from(state))
    }

    fn block(slot: Slot, parent_root: H256, tag: u8) -> Arc<BeaconBlock> {
        Arc::new(BeaconBlock {
            slot,
            parent_root,
            state_root: H256::repeat_byte(tag),
            ..BeaconBlock::default()
        })
    }

    fn store_with_anchor() -> (Store, H256, Arc<Hc<BeaconState>>) {
        let state = anchor_state(3);

        let anchor = Arc::new(BeaconBlock {
            state_root: state.hash_tree_root(),
            ..BeaconBlock::default()
        });

        let root = anchor.signing_root();
        let store = Store::new(Arc::new(Config::interop()), anchor, state.clone());

        (store, root, state)
    }

    #[test]
    fn votes_move_the_head_between_branches() {
        let (mut store, anchor_root, state) = store_with_anchor();

        // Chain A of length 3 and chain B of length 4 branch at slot 1.
        let shared = block(1, anchor_root, 0x10);
        let shared_root = store
            .on_block(shared.clone(), state.clone())
            .expect("the anchor is known");

        let a_2 = block(2, shared_root, 0xa2);
        let a_2_root = store.on_block(a_2, state.clone()).expect("parent is known");
        let a_3 = block(3, a_2_root, 0xa3);
        let a_tip = store.on_block(a_3, state.clone()).expect("parent is known");

        let b_2 = block(2, shared_root, 0xb2);
        let b_2_root = store.on_block(b_2, state.clone()).expect("parent is known");
        let b_3 = block(3, b_2_root, 0xb3);
        let b_3_root = store.on_block(b_3, state.clone()).expect("parent is known");
        let b_4 = block(4, b_3_root, 0xb4);
        let b_tip = store.on_block(b_4, state.clone()).expect("parent is known");

        // Two thirds of the validators vote for B.
        store.register_vote(0, 1, b_tip);
        store.register_vote(1, 1, b_tip);
        store.register_vote(2, 1, a_tip);

        assert_eq!(store.get_head(), b_tip);

        // Flipping the votes at a later target epoch reverts the head to A.
        store.register_vote(0, 2, a_tip);
        store.register_vote(1, 2, a_tip);

        assert_eq!(store.get_head(), a_tip);

        // A vote at the same target epoch does not replace the latest one.
        store.register_vote(0, 2, b_tip);

        assert_eq!(store.get_head(), a_tip);
    }

    #[test]
    fn ancestors_are_answered_by_slot() {
        let (mut store, anchor_root, state) = store_with_anchor();

        let first = block(1, anchor_root, 1);
        let first_root = store
            .on_block(first, state.clone())
            .expect("the anchor is known");

        let second = block(5, first_root, 2);
        let second_root = store.on_block(second, state).expect("parent is known");

        assert_eq!(store.get_ancestor(second_root, 1), Some(first_root));
        assert_eq!(store.get_ancestor(second_root, 0), Some(anchor_root));
    }

    #[test]
    fn blocks_with_unknown_parents_are_refused() {
        let (mut store, _, state) = store_with_anchor();

        let orphan = block(1, H256::repeat_byte(0xff), 1);

        assert!(matches!(
            store.on_block(orphan, state),
            Err(Error::UnknownParent { .. }),
        ));
    }
}
