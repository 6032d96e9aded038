use thiserror::Error;
use types::phase0::primitives::{Epoch, ShardNumber, Slot, ValidatorIndex};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum Error {
    #[error("attestation targets an epoch that is neither previous nor current: {epoch}")]
    EpochNotInAttestationRange { epoch: Epoch },
    #[error("committee index {index} is out of bounds for slot {slot}")]
    CommitteeIndexOutOfBounds { slot: Slot, index: u64 },
    #[error("epoch overflowed")]
    EpochOverflow,
    #[error("epoch {epoch} is not addressable from slot {state_slot}")]
    EpochOutOfRange { epoch: Epoch, state_slot: Slot },
    #[error("failed to select a proposer")]
    FailedToSelectProposer,
    #[error("attesting indices are not sorted and unique")]
    IndicesNotSortedAndUnique,
    #[error("bitfield has {bits} bits but the committee has {committee} members")]
    BitsCommitteeMismatch { bits: usize, committee: usize },
    #[error("no active validators")]
    NoActiveValidators,
    #[error("shard {shard} is out of range")]
    ShardOutOfRange { shard: ShardNumber },
    #[error("slot {slot} is not in the recent history window of slot {state_slot}")]
    SlotOutOfRange { slot: Slot, state_slot: Slot },
    #[error("validator {index} does not exist")]
    ValidatorNotFound { index: ValidatorIndex },
}
