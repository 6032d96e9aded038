//! The compiled-in preset.
//!
//! Structural constants are `typenum` aliases so that SSZ bounds are fixed at
//! compile time. Consensus variations outside these constants are out of
//! scope, so there is exactly one preset.

use typenum::{
    U1, U1024, U1099511627776, U128, U16, U16777216, U32, U33, U4, U4096, U65536, U8192,
};

use crate::phase0::primitives::Gwei;

pub type ShardCount = U1024;
pub type SlotsPerEpoch = U32;
pub type SlotsPerEth1VotingPeriod = U1024;
pub type SlotsPerHistoricalRoot = U8192;
pub type EpochsPerHistoricalVector = U65536;
pub type EpochsPerSlashingsVector = U8192;
pub type HistoricalRootsLimit = U16777216;
pub type ValidatorRegistryLimit = U1099511627776;
pub type MaxValidatorsPerCommittee = U4096;
pub type JustificationBitsLength = U4;

/// Length of a deposit Merkle branch, including the level that mixes in the
/// deposit count.
pub type DepositProofLength = U33;

pub type MaxProposerSlashings = U16;
pub type MaxAttesterSlashings = U1;
pub type MaxAttestations = U128;
pub type MaxDeposits = U16;
pub type MaxVoluntaryExits = U16;
pub type MaxTransfers = U16;

/// `MaxAttestations · SlotsPerEpoch`, the bound on pending attestations
/// accumulated over one epoch.
pub type MaxAttestationsPerEpoch = U4096;

pub const SHUFFLE_ROUND_COUNT: u8 = 90;
pub const TARGET_COMMITTEE_SIZE: u64 = 128;

pub const MIN_ATTESTATION_INCLUSION_DELAY: u64 = 1;
pub const MIN_SEED_LOOKAHEAD: u64 = 1;
pub const ACTIVATION_EXIT_DELAY: u64 = 4;
pub const MAX_EPOCHS_PER_CROSSLINK: u64 = 64;
pub const MIN_EPOCHS_TO_INACTIVITY_PENALTY: u64 = 4;

pub const MAX_EFFECTIVE_BALANCE: Gwei = 32_000_000_000;
pub const EFFECTIVE_BALANCE_INCREMENT: Gwei = 1_000_000_000;
pub const MIN_DEPOSIT_AMOUNT: Gwei = 1_000_000_000;

pub const BASE_REWARD_FACTOR: u64 = 64;
pub const BASE_REWARDS_PER_EPOCH: u64 = 4;
pub const PROPOSER_REWARD_QUOTIENT: u64 = 8;
pub const WHISTLEBLOWER_REWARD_QUOTIENT: u64 = 512;
pub const MIN_SLASHING_PENALTY_QUOTIENT: u64 = 32;
pub const INACTIVITY_PENALTY_QUOTIENT: u64 = 1 << 25;

pub const DEPOSIT_CONTRACT_TREE_DEPTH: usize = 32;

#[cfg(test)]
mod tests {
    use typenum::Unsigned as _;

    use super::*;

    #[test]
    fn pending_attestation_bound_covers_a_full_epoch() {
        assert_eq!(
            MaxAttestationsPerEpoch::U64,
            MaxAttestations::U64 * SlotsPerEpoch::U64,
        );
    }

    #[test]
    fn deposit_proof_includes_the_length_level() {
        assert_eq!(DepositProofLength::USIZE, DEPOSIT_CONTRACT_TREE_DEPTH + 1);
    }
}
