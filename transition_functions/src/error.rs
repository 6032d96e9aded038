use thiserror::Error;
use types::phase0::{
    containers::{BeaconBlockHeader, Checkpoint},
    primitives::{Epoch, Gwei, ShardNumber, Slot, ValidatorIndex, H256},
};

#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum Error {
    #[error("attestation data is not slashable")]
    AttestationDataNotSlashable,
    #[error(
        "attestation made in slot {attestation_slot} is outside \
         the inclusion range for state at slot {state_slot}"
    )]
    AttestationOutsideInclusionRange {
        state_slot: Slot,
        attestation_slot: Slot,
    },
    #[error(
        "attestation source does not match justified checkpoint \
         (in_state: {in_state:?}, in_block: {in_block:?})"
    )]
    AttestationSourceMismatch {
        in_state: Checkpoint,
        in_block: Checkpoint,
    },
    #[error("crosslink data root must be zero in this phase")]
    CrosslinkDataRootNotZero,
    #[error("crosslink end epoch is incorrect (computed: {computed}, in_block: {in_block})")]
    CrosslinkEndEpochMismatch { computed: Epoch, in_block: Epoch },
    #[error("crosslink parent root is incorrect (computed: {computed:?}, in_block: {in_block:?})")]
    CrosslinkParentMismatch { computed: H256, in_block: H256 },
    #[error("crosslink start epoch is incorrect (computed: {computed}, in_block: {in_block})")]
    CrosslinkStartEpochMismatch { computed: Epoch, in_block: Epoch },
    #[error("custody bits must be empty in this phase")]
    CustodyBitsSet,
    #[error("deposit count is incorrect (computed: {computed}, in_block: {in_block})")]
    DepositCountMismatch { computed: u64, in_block: u64 },
    #[error("deposit proof does not connect to the deposit root in the state")]
    DepositProofInvalid,
    #[error("no attesters slashed")]
    NoAttestersSlashed,
    #[error("block parent root ({in_block:?}) does not match latest block header ({computed:?})")]
    ParentRootMismatch { computed: H256, in_block: H256 },
    #[error("proposer (validator {index}) is slashed")]
    ProposerSlashed { index: ValidatorIndex },
    #[error("proposer (validator {index}) is not slashable")]
    ProposerNotSlashable { index: ValidatorIndex },
    #[error("block headers in proposer slashing are identical: {header:?}")]
    ProposerSlashingHeadersIdentical { header: BeaconBlockHeader },
    #[error("slots in proposer slashing do not match ({slot_1} != {slot_2})")]
    ProposerSlashingSlotMismatch { slot_1: Slot, slot_2: Slot },
    #[error("block slot ({block_slot}) does not match state slot ({state_slot})")]
    SlotMismatch { state_slot: Slot, block_slot: Slot },
    #[error("target slot ({target}) is not later than current slot ({current})")]
    SlotNotLater { current: Slot, target: Slot },
    #[error("shard {shard} is out of bounds")]
    ShardOutOfBounds { shard: ShardNumber },
    #[error("state root in block ({in_block:?}) does not match state ({computed:?})")]
    StateRootMismatch { computed: H256, in_block: H256 },
    #[error("transfer would leave a dust balance on validator {index}")]
    TransferCreatesDustBalance { index: ValidatorIndex },
    #[error("sender {sender} cannot cover the transfer amount and fee (balance: {balance})")]
    TransferInsufficientBalance { sender: ValidatorIndex, balance: Gwei },
    #[error("sender {sender} is neither withdrawable nor leaving a full deposit behind")]
    TransferSenderNotWithdrawable { sender: ValidatorIndex },
    #[error("transfer slot ({transfer_slot}) does not match state slot ({state_slot})")]
    TransferSlotMismatch {
        state_slot: Slot,
        transfer_slot: Slot,
    },
    #[error("transfer public key does not match the sender's withdrawal credentials")]
    TransferWithdrawalCredentialsMismatch,
    #[error("transfers within a block must be unique")]
    TransfersNotUnique,
    #[error("validator {index} exited in epoch {exit_epoch}")]
    ValidatorAlreadyExited {
        index: ValidatorIndex,
        exit_epoch: Epoch,
    },
    #[error(
        "validator {index} has not been active long enough \
         (activation_epoch: {activation_epoch}, current_epoch: {current_epoch})"
    )]
    ValidatorHasNotBeenActiveLongEnough {
        index: ValidatorIndex,
        activation_epoch: Epoch,
        current_epoch: Epoch,
    },
    #[error("validator {index} is not active in epoch {current_epoch}")]
    ValidatorNotActive {
        index: ValidatorIndex,
        current_epoch: Epoch,
    },
    #[error("voluntary exit is not yet valid (epoch: {epoch}, current_epoch: {current_epoch})")]
    VoluntaryExitNotYetValid { epoch: Epoch, current_epoch: Epoch },
}
