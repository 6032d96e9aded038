//! Incremental construction of a trusted genesis state.

pub use crate::deposit_tree::DepositTree;

mod deposit_tree;

use anyhow::Result;
use helper_functions::accessors;
use ssz::{ContiguousList, ContiguousVector, Hc, SszHash as _};
use types::{
    config::Config,
    phase0::{
        beacon_state::BeaconState,
        consts::{GENESIS_EPOCH, SECONDS_PER_DAY},
        containers::{BeaconBlockBody, BeaconBlockHeader, DepositData, Fork},
        primitives::{DepositIndex, UnixSeconds, ValidatorIndex, H256},
    },
    preset::{
        ValidatorRegistryLimit, EFFECTIVE_BALANCE_INCREMENT, MAX_EFFECTIVE_BALANCE,
    },
};

/// Builds a genesis state one deposit at a time.
///
/// Deposit proofs are not checked: the builder is the one constructing the
/// deposit tree, so its own proofs are correct by construction.
pub struct Incremental {
    state: Hc<BeaconState>,
    deposit_tree: DepositTree,
}

impl Incremental {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let version = config.genesis_fork_version;

        let state = BeaconState {
            fork: Fork {
                previous_version: version,
                current_version: version,
                epoch: GENESIS_EPOCH,
            },
            latest_block_header: BeaconBlockHeader {
                body_root: BeaconBlockBody::default().hash_tree_root(),
                ..BeaconBlockHeader::default()
            },
            ..BeaconState::default()
        };

        Self {
            state: state.into(),
            deposit_tree: DepositTree::default(),
        }
    }

    pub fn set_eth1_timestamp(&mut self, eth1_timestamp: UnixSeconds) {
        self.state.genesis_time =
            eth1_timestamp - eth1_timestamp % SECONDS_PER_DAY + 2 * SECONDS_PER_DAY;
    }

    pub fn add_deposit_data(&mut self, data: DepositData, index: DepositIndex) -> Result<()> {
        self.deposit_tree.push(data.hash_tree_root());

        self.state.eth1_data.deposit_count = index + 1;
        self.state.eth1_data.deposit_root = self.deposit_tree.root();
        self.state.eth1_deposit_index = index + 1;

        transition_functions::phase0::process_deposit_data(&mut self.state, data)?;

        Ok(())
    }

    pub fn finish(mut self, eth1_block_hash: H256) -> Result<(Hc<BeaconState>, DepositTree)> {
        self.state.eth1_data.block_hash = eth1_block_hash;
        self.state.randao_mixes = ContiguousVector::repeat(eth1_block_hash);

        // > Process activations
        let balances = self.state.balances.iter().copied().collect::<Vec<_>>();

        for (validator, balance) in self.state.validators.iter_mut().zip(balances) {
            validator.effective_balance = balance
                .saturating_sub(balance % EFFECTIVE_BALANCE_INCREMENT)
                .min(MAX_EFFECTIVE_BALANCE);

            if validator.effective_balance == MAX_EFFECTIVE_BALANCE {
                validator.activation_eligibility_epoch = GENESIS_EPOCH;
                validator.activation_epoch = GENESIS_EPOCH;
            }
        }

        // > Populate active_index_roots and compact_committees_roots
        let active_indices: ContiguousList<ValidatorIndex, ValidatorRegistryLimit> =
            accessors::get_active_validator_indices(&self.state, GENESIS_EPOCH).try_into()?;

        let active_index_root = active_indices.hash_tree_root();

        let committee_root = transition_functions::phase0::compute_compact_committees_root(
            &self.state,
            GENESIS_EPOCH,
        )?;

        self.state.active_index_roots = ContiguousVector::repeat(active_index_root);
        self.state.compact_committees_roots = ContiguousVector::repeat(committee_root);

        Ok((self.state, self.deposit_tree))
    }
}

#[cfg(test)]
mod tests {
    use bls::PublicKeyBytes;
    use types::preset::MAX_EFFECTIVE_BALANCE;

    use super::*;

    fn deposit_data(byte: u8) -> DepositData {
        DepositData {
            pubkey: PublicKeyBytes([byte; 48]),
            withdrawal_credentials: H256::repeat_byte(byte),
            amount: MAX_EFFECTIVE_BALANCE,
            ..DepositData::default()
        }
    }

    #[test]
    fn construction_is_deterministic() {
        let config = Config::interop();

        let build = || {
            let mut incremental = Incremental::new(&config);

            incremental.set_eth1_timestamp(1 << 40);

            // The signatures are invalid, so no validators are created,
            // but the deposit tree and eth1 data must still be filled in.
            for (index, byte) in (0..4).zip(1..) {
                incremental
                    .add_deposit_data(deposit_data(byte), index)
                    .expect("deposit data can be added");
            }

            incremental
                .finish(H256::repeat_byte(0x42))
                .expect("genesis construction succeeds")
        };

        let (state_1, tree_1) = build();
        let (state_2, _) = build();

        assert_eq!(state_1.hash_tree_root(), state_2.hash_tree_root());
        assert_eq!(state_1.eth1_data.deposit_count, 4);
        assert_eq!(state_1.eth1_data.deposit_root, tree_1.root());
        assert_eq!(state_1.eth1_deposit_index, 4);
    }

    #[test]
    fn changing_a_deposit_changes_the_state_root() {
        let config = Config::interop();

        let build = |first_byte| {
            let mut incremental = Incremental::new(&config);
            incremental.set_eth1_timestamp(1 << 40);
            incremental
                .add_deposit_data(deposit_data(first_byte), 0)
                .expect("deposit data can be added");
            incremental
                .finish(H256::repeat_byte(0x42))
                .expect("genesis construction succeeds")
        };

        let (state_1, _) = build(1);
        let (state_2, _) = build(2);

        assert_ne!(state_1.hash_tree_root(), state_2.hash_tree_root());
    }
}
