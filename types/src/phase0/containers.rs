use bls::{PublicKeyBytes, SignatureBytes};
use ssz::{BitList, ContiguousList, ContiguousVector, Ssz};

use crate::{
    phase0::primitives::{
        DepositIndex, Domain, Epoch, Gwei, ShardNumber, Slot, ValidatorIndex, Version, H256,
    },
    preset::{
        DepositProofLength, MaxAttestations, MaxAttesterSlashings, MaxDeposits,
        MaxProposerSlashings, MaxTransfers, MaxValidatorsPerCommittee, MaxVoluntaryExits,
        SlotsPerHistoricalRoot,
    },
};

// Compressed keys and signatures are stored as plain bytes and only
// decompressed when verifying. Malformed points must be representable:
// operations carrying them have to be hashable to be rejected.

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Ssz)]
pub struct Fork {
    pub previous_version: Version,
    pub current_version: Version,
    pub epoch: Epoch,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug, Ssz)]
pub struct Checkpoint {
    pub epoch: Epoch,
    pub root: H256,
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug, Ssz)]
pub struct Crosslink {
    pub shard: ShardNumber,
    pub parent_root: H256,
    pub start_epoch: Epoch,
    pub end_epoch: Epoch,
    pub data_root: H256,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug, Ssz)]
pub struct Eth1Data {
    pub deposit_root: H256,
    pub deposit_count: DepositIndex,
    pub block_hash: H256,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug, Ssz)]
pub struct AttestationData {
    pub beacon_block_root: H256,
    pub source: Checkpoint,
    pub target: Checkpoint,
    pub crosslink: Crosslink,
}

#[derive(Clone, PartialEq, Eq, Default, Debug, Ssz)]
pub struct Attestation {
    pub aggregation_bits: BitList<MaxValidatorsPerCommittee>,
    pub data: AttestationData,
    pub custody_bits: BitList<MaxValidatorsPerCommittee>,
    pub signature: SignatureBytes,
}

#[derive(Clone, PartialEq, Eq, Default, Debug, Ssz)]
pub struct IndexedAttestation {
    pub attesting_indices: ContiguousList<ValidatorIndex, MaxValidatorsPerCommittee>,
    pub data: AttestationData,
    pub signature: SignatureBytes,
}

#[derive(Clone, PartialEq, Eq, Default, Debug, Ssz)]
pub struct PendingAttestation {
    pub aggregation_bits: BitList<MaxValidatorsPerCommittee>,
    pub data: AttestationData,
    pub inclusion_delay: u64,
    pub proposer_index: ValidatorIndex,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Ssz)]
pub struct Validator {
    pub pubkey: PublicKeyBytes,
    pub withdrawal_credentials: H256,
    pub effective_balance: Gwei,
    pub slashed: bool,
    pub activation_eligibility_epoch: Epoch,
    pub activation_epoch: Epoch,
    pub exit_epoch: Epoch,
    pub withdrawable_epoch: Epoch,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Ssz)]
pub struct DepositData {
    pub pubkey: PublicKeyBytes,
    pub withdrawal_credentials: H256,
    pub amount: Gwei,
    pub signature: SignatureBytes,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Ssz)]
pub struct DepositMessage {
    pub pubkey: PublicKeyBytes,
    pub withdrawal_credentials: H256,
    pub amount: Gwei,
}

#[derive(Clone, PartialEq, Eq, Default, Debug, Ssz)]
pub struct Deposit {
    pub proof: ContiguousVector<H256, DepositProofLength>,
    pub data: DepositData,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Ssz)]
pub struct BeaconBlockHeader {
    pub slot: Slot,
    pub parent_root: H256,
    pub state_root: H256,
    pub body_root: H256,
    pub signature: SignatureBytes,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Ssz)]
pub struct ProposerSlashing {
    pub proposer_index: ValidatorIndex,
    pub header_1: BeaconBlockHeader,
    pub header_2: BeaconBlockHeader,
}

#[derive(Clone, PartialEq, Eq, Debug, Ssz)]
pub struct AttesterSlashing {
    pub attestation_1: IndexedAttestation,
    pub attestation_2: IndexedAttestation,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Ssz)]
pub struct VoluntaryExit {
    pub epoch: Epoch,
    pub validator_index: ValidatorIndex,
    pub signature: SignatureBytes,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Ssz)]
pub struct Transfer {
    pub sender: ValidatorIndex,
    pub recipient: ValidatorIndex,
    pub amount: Gwei,
    pub fee: Gwei,
    pub slot: Slot,
    pub pubkey: PublicKeyBytes,
    pub signature: SignatureBytes,
}

#[derive(Clone, PartialEq, Eq, Default, Debug, Ssz)]
pub struct BeaconBlockBody {
    pub randao_reveal: SignatureBytes,
    pub eth1_data: Eth1Data,
    pub graffiti: H256,
    pub proposer_slashings: ContiguousList<ProposerSlashing, MaxProposerSlashings>,
    pub attester_slashings: ContiguousList<AttesterSlashing, MaxAttesterSlashings>,
    pub attestations: ContiguousList<Attestation, MaxAttestations>,
    pub deposits: ContiguousList<Deposit, MaxDeposits>,
    pub voluntary_exits: ContiguousList<VoluntaryExit, MaxVoluntaryExits>,
    pub transfers: ContiguousList<Transfer, MaxTransfers>,
}

#[derive(Clone, PartialEq, Eq, Default, Debug, Ssz)]
pub struct BeaconBlock {
    pub slot: Slot,
    pub parent_root: H256,
    pub state_root: H256,
    pub body: BeaconBlockBody,
    pub signature: SignatureBytes,
}

#[derive(Clone, PartialEq, Eq, Default, Debug, Ssz)]
pub struct CompactCommittee {
    pub pubkeys: ContiguousList<PublicKeyBytes, MaxValidatorsPerCommittee>,
    pub compact_validators: ContiguousList<u64, MaxValidatorsPerCommittee>,
}

#[derive(Clone, PartialEq, Eq, Default, Debug, Ssz)]
pub struct HistoricalBatch {
    pub block_roots: ContiguousVector<H256, SlotsPerHistoricalRoot>,
    pub state_roots: ContiguousVector<H256, SlotsPerHistoricalRoot>,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Ssz)]
pub struct SigningData {
    pub object_root: H256,
    pub domain: Domain,
}

#[cfg(test)]
mod tests {
    use ssz::{Size, SszSize as _, BYTES_PER_LENGTH_OFFSET as OFFSET};
    use test_case::test_case;

    use super::*;

    const UINT: usize = 8;
    const HASH: usize = 32;
    const PUBLIC_KEY: usize = 48;
    const SIGNATURE: usize = 96;
    const VERSION: usize = 4;

    const CHECKPOINT: usize = UINT + HASH;
    const CROSSLINK: usize = UINT + HASH + UINT + UINT + HASH;
    const ATTESTATION_DATA: usize = HASH + CHECKPOINT + CHECKPOINT + CROSSLINK;
    const BEACON_BLOCK_HEADER: usize = UINT + HASH + HASH + HASH + SIGNATURE;
    const DEPOSIT: usize = 33 * HASH + PUBLIC_KEY + HASH + UINT + SIGNATURE;
    const TRANSFER: usize = UINT * 5 + PUBLIC_KEY + SIGNATURE;

    #[test_case(Fork::SIZE, Size::Fixed { size: VERSION * 2 + UINT })]
    #[test_case(Checkpoint::SIZE, Size::Fixed { size: CHECKPOINT })]
    #[test_case(Crosslink::SIZE, Size::Fixed { size: CROSSLINK })]
    #[test_case(AttestationData::SIZE, Size::Fixed { size: ATTESTATION_DATA })]
    #[test_case(Eth1Data::SIZE, Size::Fixed { size: HASH + UINT + HASH })]
    #[test_case(Validator::SIZE, Size::Fixed { size: PUBLIC_KEY + HASH + UINT + 1 + UINT * 4 })]
    #[test_case(BeaconBlockHeader::SIZE, Size::Fixed { size: BEACON_BLOCK_HEADER })]
    #[test_case(ProposerSlashing::SIZE, Size::Fixed { size: UINT + BEACON_BLOCK_HEADER * 2 })]
    #[test_case(Deposit::SIZE, Size::Fixed { size: DEPOSIT })]
    #[test_case(VoluntaryExit::SIZE, Size::Fixed { size: UINT + UINT + SIGNATURE })]
    #[test_case(Transfer::SIZE, Size::Fixed { size: TRANSFER })]
    #[test_case(SigningData::SIZE, Size::Fixed { size: HASH + HASH })]
    fn fixed_container_sizes(actual: Size, expected: Size) {
        assert_eq!(actual, expected);
    }

    #[test]
    fn attestation_is_variable_sized() {
        // Two bit lists contribute one offset and one delimiter byte each.
        assert_eq!(
            Attestation::SIZE,
            Size::Variable {
                minimum_size: OFFSET + ATTESTATION_DATA + OFFSET + SIGNATURE + 2,
            },
        );
    }
}
