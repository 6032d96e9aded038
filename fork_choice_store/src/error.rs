use thiserror::Error;
use types::phase0::primitives::{Epoch, Slot, H256};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum Error {
    #[error("block {root:?} arrived before its parent {parent_root:?}")]
    UnknownParent { root: H256, parent_root: H256 },
    #[error("block {root:?} at slot {slot} conflicts with the finalized checkpoint")]
    BelowFinalized { root: H256, slot: Slot },
    #[error("attestation votes for unknown block {root:?}")]
    UnknownAttestationBlock { root: H256 },
    #[error("attestation target epoch {epoch} is not attestable at slot {tick_slot}")]
    AttestationFromWrongEpoch { epoch: Epoch, tick_slot: Slot },
    #[error("attestation is for a future slot (attestation: {attestation_slot}, tick: {tick_slot})")]
    AttestationFromFuture {
        attestation_slot: Slot,
        tick_slot: Slot,
    },
}
