use std::{
    collections::HashMap,
    sync::{mpsc::Receiver, Arc},
};

use anyhow::Result;
use arc_swap::ArcSwap;
use fork_choice_store::Store;
use helper_functions::misc;
use log::{debug, info, warn};
use operation_pools::OperationPools;
use ssz::Hc;
use transition_functions::phase0 as stf;
use types::phase0::{
    beacon_state::BeaconState,
    containers::{Attestation, BeaconBlock},
    primitives::{Slot, H256},
};

use crate::{
    controller::Snapshot,
    events::{Observation, Subscriptions},
    messages::{BlockOutcome, MutatorMessage},
    storage::Storage,
};

/// The single writer over the `(store, storage)` pair.
///
/// All mutations are serialized through its message queue; each block accept
/// completes, including fork-choice weight propagation, before the next
/// message is processed. Reads go through the published snapshot and never
/// wait for the writer.
pub struct Mutator {
    store: Store,
    storage: Storage,
    snapshot: Arc<ArcSwap<Snapshot>>,
    subscriptions: Arc<Subscriptions>,
    pools: Arc<OperationPools>,
    receiver: Receiver<MutatorMessage>,
    /// Blocks whose parents have not arrived, keyed by the missing parent.
    waiting_for_parent: HashMap<H256, Vec<Arc<BeaconBlock>>>,
    /// Advanced head states are cached per tick so repeated observations of
    /// the same slot do not rerun empty-slot transitions.
    advanced_head: Option<(H256, Slot, Arc<Hc<BeaconState>>)>,
    last_emitted: (u64, Slot),
}

impl Mutator {
    pub(crate) fn new(
        store: Store,
        storage: Storage,
        snapshot: Arc<ArcSwap<Snapshot>>,
        subscriptions: Arc<Subscriptions>,
        pools: Arc<OperationPools>,
        receiver: Receiver<MutatorMessage>,
    ) -> Self {
        Self {
            store,
            storage,
            snapshot,
            subscriptions,
            pools,
            receiver,
            waiting_for_parent: HashMap::new(),
            advanced_head: None,
            last_emitted: (0, 0),
        }
    }

    /// Runs until a `Stop` message or a fatal storage error.
    pub(crate) fn run(mut self) {
        while let Ok(message) = self.receiver.recv() {
            let result = match message {
                MutatorMessage::Block { block, reply } => {
                    let outcome = self.handle_block(block);

                    if let (Some(reply), Ok(outcome)) = (reply, &outcome) {
                        // A closed reply channel only means the submitter
                        // stopped waiting.
                        let _ = reply.send(outcome.clone());
                    }

                    outcome.map(|_| ())
                }
                MutatorMessage::Attestation { attestation } => {
                    self.handle_attestation(&attestation)
                }
                MutatorMessage::Tick { slot } => self.handle_tick(slot),
                MutatorMessage::Stop => break,
            };

            // Storage failures are fatal for the writer; anything else was
            // already turned into an outcome or a log line.
            if let Err(error) = result.and_then(|()| self.storage.commit()) {
                warn!("store writer shutting down: {error:#}");
                break;
            }
        }

        // Orderly shutdown: drain nothing further, flush, release.
        if let Err(error) = self.storage.flush() {
            warn!("final flush failed: {error:#}");
        }

        self.subscriptions.close();
    }

    fn handle_block(&mut self, block: Arc<BeaconBlock>) -> Result<BlockOutcome> {
        let root = block.signing_root();

        if self.store.contains_block(root) {
            return Ok(BlockOutcome::Duplicate { root });
        }

        let Some(parent_state) = self.store.state(block.parent_root) else {
            let finalized_slot =
                misc::compute_start_slot_at_epoch(self.store.finalized_checkpoint().epoch);

            if block.slot <= finalized_slot {
                return Ok(BlockOutcome::Rejected {
                    reason: format!("block at slot {} is below finality", block.slot),
                });
            }

            debug!("delaying block {root:?} until parent {:?} arrives", block.parent_root);

            let parent_root = block.parent_root;

            self.waiting_for_parent
                .entry(parent_root)
                .or_default()
                .push(block);

            return Ok(BlockOutcome::DelayedUntilParent { parent_root });
        };

        let mut state = (*parent_state).clone();

        if let Err(error) =
            stf::untrusted_state_transition(self.store.config(), &mut state, &block)
        {
            warn!("block {root:?} rejected by state transition: {error:#}");

            return Ok(BlockOutcome::Rejected {
                reason: format!("{error:#}"),
            });
        }

        let state = Arc::new(state);

        let finalized_epoch_before = self.store.finalized_checkpoint().epoch;

        if let Err(error) = self.store.on_block(block.clone(), state.clone()) {
            return Ok(BlockOutcome::Rejected {
                reason: error.to_string(),
            });
        }

        self.storage.store_block(root, &block)?;
        self.storage.store_state(root, &state)?;

        self.storage.set_pointers(
            self.store.finalized_checkpoint().root,
            self.store.justified_checkpoint().root,
            self.store.get_head(),
        );

        let finalized = self.store.finalized_checkpoint();

        if finalized.epoch > finalized_epoch_before {
            info!("finalized epoch {}", finalized.epoch);

            self.pools.prune_below_epoch(finalized.epoch);

            self.storage
                .prune_below(misc::compute_start_slot_at_epoch(finalized.epoch), finalized.root)?;
        }

        self.publish_snapshot();
        self.emit_observation()?;

        // Release descendants that were waiting for this block.
        if let Some(children) = self.waiting_for_parent.remove(&root) {
            for child in children {
                let child_root = child.signing_root();

                match self.handle_block(child)? {
                    BlockOutcome::Accepted { .. } => {}
                    outcome => debug!("buffered block {child_root:?}: {outcome:?}"),
                }
            }
        }

        Ok(BlockOutcome::Accepted { root })
    }

    fn handle_attestation(&mut self, attestation: &Attestation) -> Result<()> {
        if let Err(error) = self.store.on_attestation(attestation) {
            debug!("attestation ignored: {error:#}");
            return Ok(());
        }

        self.publish_snapshot();

        Ok(())
    }

    fn handle_tick(&mut self, slot: Slot) -> Result<()> {
        self.store.on_tick(slot);
        self.publish_snapshot();
        self.emit_observation()
    }

    fn publish_snapshot(&self) {
        let head_root = self.store.get_head();

        let (head_block, head_state) =
            match (self.store.block(head_root), self.store.state(head_root)) {
                (Some(block), Some(state)) => (block, state),
                _ => return,
            };

        self.snapshot.store(Arc::new(Snapshot {
            head_root,
            head_block,
            head_state,
            justified_checkpoint: self.store.justified_checkpoint(),
            finalized_checkpoint: self.store.finalized_checkpoint(),
            tick_slot: self.store.tick_slot(),
        }));
    }

    fn emit_observation(&mut self) -> Result<()> {
        let head_root = self.store.get_head();
        let tick_slot = self.store.tick_slot();
        let finalized_epoch = self.store.finalized_checkpoint().epoch;

        let (Some(head_block), Some(head_state)) =
            (self.store.block(head_root), self.store.state(head_root))
        else {
            return Ok(());
        };

        // Emissions are monotonic in (finalized_epoch, slot).
        if (finalized_epoch, tick_slot) < self.last_emitted {
            return Ok(());
        }

        let latest_slot_state = self.state_at_tick(head_root, head_state, tick_slot)?;

        let observation = Observation {
            head_root,
            head_block,
            latest_slot_state,
            slot: tick_slot,
            finalized_epoch,
            pending_operations: self.pools.clone(),
        };

        self.last_emitted = (finalized_epoch, tick_slot);
        self.subscriptions.publish(&observation);

        Ok(())
    }

    fn state_at_tick(
        &mut self,
        head_root: H256,
        head_state: Arc<Hc<BeaconState>>,
        tick_slot: Slot,
    ) -> Result<Arc<Hc<BeaconState>>> {
        if head_state.slot >= tick_slot {
            return Ok(head_state);
        }

        if let Some((root, slot, state)) = &self.advanced_head {
            if *root == head_root && *slot == tick_slot {
                return Ok(state.clone());
            }
        }

        let mut advanced = (*head_state).clone();
        stf::process_slots(self.store.config(), &mut advanced, tick_slot)?;

        let advanced = Arc::new(advanced);
        self.advanced_head = Some((head_root, tick_slot, advanced.clone()));

        Ok(advanced)
    }
}
