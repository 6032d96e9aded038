use std::sync::{mpsc::Sender, Arc};

use types::phase0::{
    containers::{Attestation, BeaconBlock},
    primitives::{Slot, H256},
};

/// The result of submitting a block to the writer.
#[derive(Clone, Debug)]
pub enum BlockOutcome {
    /// Accepted and applied; the root identifies it from now on.
    Accepted { root: H256 },
    /// The parent is not known yet; the block is buffered.
    DelayedUntilParent { parent_root: H256 },
    /// Already known.
    Duplicate { root: H256 },
    /// Rejected by the state transition or fork choice.
    Rejected { reason: String },
}

pub enum MutatorMessage {
    Block {
        block: Arc<BeaconBlock>,
        reply: Option<Sender<BlockOutcome>>,
    },
    Attestation {
        attestation: Arc<Attestation>,
    },
    Tick {
        slot: Slot,
    },
    Stop,
}
