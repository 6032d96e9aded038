use std::{
    sync::{
        mpsc::{channel, Receiver, Sender},
        Arc, Mutex,
    },
    thread::{Builder, JoinHandle},
};

use anyhow::Result;
use arc_swap::ArcSwap;
use fork_choice_store::Store;
use operation_pools::OperationPools;
use ssz::{Hc, SszHash as _};
use types::{
    config::Config,
    phase0::{
        beacon_state::BeaconState,
        containers::{Attestation, BeaconBlock, Checkpoint},
        primitives::{Slot, H256},
    },
};

use crate::{
    events::{OverflowPolicy, Subscriber, Subscriptions},
    messages::{BlockOutcome, MutatorMessage},
    mutator::Mutator,
    storage::Storage,
};

/// An immutable view of the canonical chain, refreshed by the writer after
/// every mutation.
#[derive(Clone)]
pub struct Snapshot {
    pub head_root: H256,
    pub head_block: Arc<BeaconBlock>,
    pub head_state: Arc<Hc<BeaconState>>,
    pub justified_checkpoint: Checkpoint,
    pub finalized_checkpoint: Checkpoint,
    pub tick_slot: Slot,
}

/// The public handle over the single-writer fork choice.
///
/// `on_*` methods enqueue work for the writer thread and return immediately;
/// queries read the latest published snapshot.
pub struct Controller {
    sender: Sender<MutatorMessage>,
    snapshot: Arc<ArcSwap<Snapshot>>,
    subscriptions: Arc<Subscriptions>,
    pools: Arc<OperationPools>,
    genesis_time: u64,
    join_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Controller {
    pub fn new(
        config: Arc<Config>,
        genesis_state: Arc<Hc<BeaconState>>,
        mut storage: Storage,
    ) -> Result<Arc<Self>> {
        let genesis_block = Arc::new(genesis_block_for(&genesis_state));
        let genesis_root = genesis_block.signing_root();
        let genesis_time = genesis_state.genesis_time;

        storage.store_block(genesis_root, &genesis_block)?;
        storage.store_state(genesis_root, &genesis_state)?;
        storage.set_pointers(genesis_root, genesis_root, genesis_root);
        storage.flush()?;

        let store = Store::new(config, genesis_block.clone(), genesis_state.clone());

        let snapshot = Arc::new(ArcSwap::from_pointee(Snapshot {
            head_root: genesis_root,
            head_block: genesis_block,
            head_state: genesis_state,
            justified_checkpoint: store.justified_checkpoint(),
            finalized_checkpoint: store.finalized_checkpoint(),
            tick_slot: store.tick_slot(),
        }));

        let subscriptions = Arc::new(Subscriptions::default());
        let pools = Arc::new(OperationPools::default());
        let (sender, receiver) = channel();

        let mutator = Mutator::new(
            store,
            storage,
            snapshot.clone(),
            subscriptions.clone(),
            pools.clone(),
            receiver,
        );

        let join_handle = Builder::new()
            .name("store-mutator".to_owned())
            .spawn(|| mutator.run())?;

        Ok(Arc::new(Self {
            sender,
            snapshot,
            subscriptions,
            pools,
            genesis_time,
            join_handle: Mutex::new(Some(join_handle)),
        }))
    }

    pub fn on_block(&self, block: Arc<BeaconBlock>) {
        self.send(MutatorMessage::Block { block, reply: None });
    }

    /// Like [`Controller::on_block`] but returns a channel carrying the
    /// outcome, for callers that track peer behavior.
    pub fn on_block_with_outcome(&self, block: Arc<BeaconBlock>) -> Receiver<BlockOutcome> {
        let (reply, outcome) = channel();

        self.send(MutatorMessage::Block {
            block,
            reply: Some(reply),
        });

        outcome
    }

    pub fn on_attestation(&self, attestation: Arc<Attestation>) {
        self.send(MutatorMessage::Attestation { attestation });
    }

    pub fn on_tick(&self, slot: Slot) {
        self.send(MutatorMessage::Tick { slot });
    }

    #[must_use]
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.load_full()
    }

    #[must_use]
    pub fn subscribe(&self, policy: OverflowPolicy) -> Subscriber {
        self.subscriptions.subscribe(policy)
    }

    #[must_use]
    pub fn pools(&self) -> Arc<OperationPools> {
        self.pools.clone()
    }

    #[must_use]
    pub const fn genesis_time(&self) -> u64 {
        self.genesis_time
    }

    /// Stops the writer, draining its queue first.
    pub fn stop(&self) {
        let _ = self.sender.send(MutatorMessage::Stop);

        if let Some(join_handle) = self
            .join_handle
            .lock()
            .expect("controller join handle is poisoned")
            .take()
        {
            let _ = join_handle.join();
        }
    }

    fn send(&self, message: MutatorMessage) {
        // A closed channel means the writer hit a fatal storage error;
        // messages sent during shutdown are dropped deliberately.
        let _ = self.sender.send(message);
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The block whose root anchors the chain: slot and body are empty, the state
/// root commits to the genesis state. Its signing root equals the hash of the
/// genesis state's `latest_block_header` once that header's state root is
/// filled in.
fn genesis_block_for(state: &Hc<BeaconState>) -> BeaconBlock {
    BeaconBlock {
        slot: state.slot,
        parent_root: H256::zero(),
        state_root: state.hash_tree_root(),
        ..BeaconBlock::default()
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU64;

    use database::Database;
    use helper_functions::accessors;

    use super::*;

    fn genesis_setup() -> (Arc<Config>, Arc<Hc<BeaconState>>) {
        let config = Arc::new(Config::interop());
        let (state, _) = interop::quick_start_beacon_state(
            &config,
            0,
            NonZeroU64::new(16).expect("validator count is nonzero"),
        )
        .expect("quick-start genesis can be constructed");

        (config, Arc::new(state))
    }

    #[test]
    fn genesis_block_root_matches_the_state_header() {
        let (_, state) = genesis_setup();

        assert_eq!(
            genesis_block_for(&state).signing_root(),
            accessors::latest_block_root(&state),
        );
    }

    #[test]
    fn controller_publishes_the_genesis_snapshot() {
        let (config, state) = genesis_setup();
        let genesis_root = accessors::latest_block_root(&state);

        let storage = Storage::new(Arc::new(Database::in_memory()));
        let controller =
            Controller::new(config, state, storage).expect("controller can be started");

        let snapshot = controller.snapshot();

        assert_eq!(snapshot.head_root, genesis_root);
        assert_eq!(snapshot.finalized_checkpoint.epoch, 0);

        controller.stop();
    }

    #[test]
    fn ticks_advance_the_snapshot_slot() {
        let (config, state) = genesis_setup();

        let storage = Storage::new(Arc::new(Database::in_memory()));
        let controller =
            Controller::new(config, state, storage).expect("controller can be started");

        let subscriber = controller.subscribe(OverflowPolicy::Coalesce);

        controller.on_tick(3);

        let observation = subscriber.recv().expect("an observation is published");

        assert_eq!(observation.slot, 3);
        assert_eq!(observation.latest_slot_state.slot, 3);

        controller.stop();
    }
}
