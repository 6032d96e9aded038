use ssz::{BitVector, ContiguousList, ContiguousVector, Ssz};

use crate::{
    phase0::{
        containers::{
            BeaconBlockHeader, Checkpoint, Crosslink, Eth1Data, Fork, PendingAttestation,
            Validator,
        },
        primitives::{DepositIndex, Gwei, ShardNumber, Slot, UnixSeconds, H256},
    },
    preset::{
        EpochsPerHistoricalVector, EpochsPerSlashingsVector, HistoricalRootsLimit,
        JustificationBitsLength, MaxAttestationsPerEpoch, ShardCount, SlotsPerEth1VotingPeriod,
        SlotsPerHistoricalRoot, ValidatorRegistryLimit,
    },
};

/// The full consensus state.
///
/// The field order is normative: the hash tree root and the wire encoding are
/// both derived from it.
#[derive(Clone, PartialEq, Eq, Default, Debug, Ssz)]
pub struct BeaconState {
    pub genesis_time: UnixSeconds,
    pub slot: Slot,
    pub fork: Fork,
    pub latest_block_header: BeaconBlockHeader,
    pub block_roots: ContiguousVector<H256, SlotsPerHistoricalRoot>,
    pub state_roots: ContiguousVector<H256, SlotsPerHistoricalRoot>,
    pub historical_roots: ContiguousList<H256, HistoricalRootsLimit>,
    pub eth1_data: Eth1Data,
    pub eth1_data_votes: ContiguousList<Eth1Data, SlotsPerEth1VotingPeriod>,
    pub eth1_deposit_index: DepositIndex,
    pub validators: ContiguousList<Validator, ValidatorRegistryLimit>,
    pub balances: ContiguousList<Gwei, ValidatorRegistryLimit>,
    pub randao_mixes: ContiguousVector<H256, EpochsPerHistoricalVector>,
    pub start_shard: ShardNumber,
    pub previous_epoch_attestations: ContiguousList<PendingAttestation, MaxAttestationsPerEpoch>,
    pub current_epoch_attestations: ContiguousList<PendingAttestation, MaxAttestationsPerEpoch>,
    pub previous_crosslinks: ContiguousVector<Crosslink, ShardCount>,
    pub current_crosslinks: ContiguousVector<Crosslink, ShardCount>,
    pub justification_bits: BitVector<JustificationBitsLength>,
    pub previous_justified_checkpoint: Checkpoint,
    pub current_justified_checkpoint: Checkpoint,
    pub finalized_checkpoint: Checkpoint,
    pub slashings: ContiguousVector<Gwei, EpochsPerSlashingsVector>,
    pub active_index_roots: ContiguousVector<H256, EpochsPerHistoricalVector>,
    pub compact_committees_roots: ContiguousVector<H256, EpochsPerHistoricalVector>,
}

#[cfg(test)]
mod tests {
    use ssz::{SszHash as _, SszRead as _, SszWrite as _};

    use super::*;

    #[test]
    fn default_state_round_trips_through_ssz() {
        let state = BeaconState::default();
        let bytes = state.to_ssz().expect("offsets fit");
        let decoded = BeaconState::from_ssz(&bytes).expect("encoding is valid");

        assert_eq!(decoded, state);
        assert_eq!(decoded.hash_tree_root(), state.hash_tree_root());
    }

    #[test]
    fn root_changes_when_a_field_changes() {
        let state = BeaconState::default();
        let root = state.hash_tree_root();

        let mut changed = state.clone();
        changed.slot = 1;

        assert_ne!(changed.hash_tree_root(), root);
    }
}
