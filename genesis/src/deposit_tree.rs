use anyhow::{ensure, Result};
use hashing::ZERO_HASHES;
use ssz::{mix_in_length, ContiguousVector, MerkleTree};
use typenum::Unsigned as _;
use types::{
    phase0::primitives::{DepositIndex, H256},
    preset::{DepositProofLength, DEPOSIT_CONTRACT_TREE_DEPTH},
};

/// A Merkle tree over deposit data roots.
///
/// Proof construction recomputes subtree roots from the leaves. That is
/// quadratic in the worst case but the tree only grows at genesis and in
/// tests, where it stays small. The deposit contract crawler that would feed
/// it continuously is an external collaborator.
#[derive(Clone, Default, Debug)]
pub struct DepositTree {
    leaves: Vec<H256>,
}

impl DepositTree {
    pub fn push(&mut self, leaf: H256) {
        self.leaves.push(leaf);
    }

    #[must_use]
    pub fn count(&self) -> u64 {
        self.leaves.len() as u64
    }

    /// The root the deposit contract would report: the tree root with the
    /// deposit count mixed in.
    #[must_use]
    pub fn root(&self) -> H256 {
        mix_in_length(
            MerkleTree::merkleize_chunks(DEPOSIT_CONTRACT_TREE_DEPTH, self.leaves.iter().copied()),
            self.leaves.len(),
        )
    }

    /// The branch proving the leaf at `index`, including the level that mixes
    /// in the deposit count.
    pub fn proof(&self, index: DepositIndex) -> Result<ContiguousVector<H256, DepositProofLength>> {
        ensure!(index < self.count(), "no deposit at index {index}");

        let mut branch = Vec::with_capacity(DepositProofLength::USIZE);

        for height in 0..DEPOSIT_CONTRACT_TREE_DEPTH {
            let sibling_position = (index >> height) ^ 1;
            branch.push(self.subtree_root(height, sibling_position));
        }

        let mut length_chunk = H256::zero();
        length_chunk.as_bytes_mut()[..size_of::<u64>()]
            .copy_from_slice(&self.count().to_le_bytes());
        branch.push(length_chunk);

        branch.try_into().map_err(Into::into)
    }

    fn subtree_root(&self, height: usize, position: u64) -> H256 {
        let width = 1_u64 << height;
        let start = usize::try_from(position * width).unwrap_or(usize::MAX);

        if start >= self.leaves.len() {
            return ZERO_HASHES[height];
        }

        let end = self.leaves.len().min(start + width as usize);

        MerkleTree::merkleize_chunks(height, self.leaves[start..end].iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use helper_functions::predicates;
    use typenum::Unsigned as _;

    use super::*;

    #[test]
    fn proofs_verify_against_the_mixed_in_root() {
        let mut tree = DepositTree::default();

        for byte in 1..=5 {
            tree.push(H256::repeat_byte(byte));
        }

        for index in 0..5 {
            let proof = tree.proof(index).expect("deposit exists");

            assert!(predicates::is_valid_merkle_branch(
                H256::repeat_byte(index as u8 + 1),
                proof.iter().copied(),
                DepositProofLength::USIZE,
                index,
                tree.root(),
            ));
        }
    }

    #[test]
    fn proofs_for_missing_deposits_are_refused() {
        let tree = DepositTree::default();

        assert!(tree.proof(0).is_err());
    }

    #[test]
    fn root_changes_as_deposits_accumulate() {
        let mut tree = DepositTree::default();
        let empty_root = tree.root();

        tree.push(H256::repeat_byte(1));

        assert_ne!(tree.root(), empty_root);
    }
}
