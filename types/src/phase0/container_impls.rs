use bls::SignatureBytes;
use ssz::{MerkleTree, SszHash as _};

use crate::phase0::{
    containers::{
        BeaconBlock, BeaconBlockHeader, DepositData, DepositMessage, Transfer, VoluntaryExit,
    },
    primitives::H256,
};

// Signing roots are the hash tree root of the container with the trailing
// signature field zeroed. Computing them from the field roots avoids cloning
// the container.

fn zeroed_signature_root() -> H256 {
    SignatureBytes::zero().hash_tree_root()
}

impl BeaconBlock {
    #[must_use]
    pub fn signing_root(&self) -> H256 {
        MerkleTree::merkleize_chunks(
            3,
            [
                self.slot.hash_tree_root(),
                self.parent_root,
                self.state_root,
                self.body.hash_tree_root(),
                zeroed_signature_root(),
            ],
        )
    }

    /// The header whose hash tree root equals this block's.
    #[must_use]
    pub fn to_header(&self) -> BeaconBlockHeader {
        BeaconBlockHeader {
            slot: self.slot,
            parent_root: self.parent_root,
            state_root: self.state_root,
            body_root: self.body.hash_tree_root(),
            signature: self.signature,
        }
    }
}

impl BeaconBlockHeader {
    #[must_use]
    pub fn signing_root(&self) -> H256 {
        MerkleTree::merkleize_chunks(
            3,
            [
                self.slot.hash_tree_root(),
                self.parent_root,
                self.state_root,
                self.body_root,
                zeroed_signature_root(),
            ],
        )
    }
}

impl VoluntaryExit {
    #[must_use]
    pub fn signing_root(&self) -> H256 {
        MerkleTree::merkleize_chunks(
            2,
            [
                self.epoch.hash_tree_root(),
                self.validator_index.hash_tree_root(),
                zeroed_signature_root(),
            ],
        )
    }
}

impl Transfer {
    #[must_use]
    pub fn signing_root(&self) -> H256 {
        MerkleTree::merkleize_chunks(
            3,
            [
                self.sender.hash_tree_root(),
                self.recipient.hash_tree_root(),
                self.amount.hash_tree_root(),
                self.fee.hash_tree_root(),
                self.slot.hash_tree_root(),
                self.pubkey.hash_tree_root(),
                zeroed_signature_root(),
            ],
        )
    }
}

impl DepositData {
    #[must_use]
    pub fn signing_root(&self) -> H256 {
        MerkleTree::merkleize_chunks(
            2,
            [
                self.pubkey.hash_tree_root(),
                self.withdrawal_credentials,
                self.amount.hash_tree_root(),
                zeroed_signature_root(),
            ],
        )
    }
}

impl From<DepositData> for DepositMessage {
    fn from(data: DepositData) -> Self {
        let DepositData {
            pubkey,
            withdrawal_credentials,
            amount,
            signature: _,
        } = data;

        Self {
            pubkey,
            withdrawal_credentials,
            amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signing_root_equals_root_with_signature_zeroed() {
        let mut header = BeaconBlockHeader {
            slot: 4,
            parent_root: H256::repeat_byte(1),
            state_root: H256::repeat_byte(2),
            body_root: H256::repeat_byte(3),
            signature: SignatureBytes([7; 96]),
        };

        let signing_root = header.signing_root();

        header.signature = SignatureBytes::zero();

        assert_eq!(signing_root, header.hash_tree_root());
    }

    #[test]
    fn block_header_preserves_the_block_root() {
        let block = BeaconBlock {
            slot: 9,
            parent_root: H256::repeat_byte(5),
            ..BeaconBlock::default()
        };

        assert_eq!(block.to_header().hash_tree_root(), block.hash_tree_root());
        assert_eq!(block.to_header().signing_root(), block.signing_root());
    }
}
