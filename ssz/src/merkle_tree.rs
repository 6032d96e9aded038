// Chunks are pushed left to right. The tree keeps one sibling hash per level, so a root over any
// number of chunks can be computed in constant space. Padding up to the depth of the type's limit
// uses the precomputed zero-subtree table.

use ethereum_types::H256;
use hashing::ZERO_HASHES;
use typenum::Unsigned as _;

use crate::{
    consts::BYTES_PER_CHUNK,
    porcelain::{SszHash, SszWrite},
};

pub const MAX_MERKLE_DEPTH: usize = 41;

pub struct MerkleTree {
    sibling_hashes: [H256; MAX_MERKLE_DEPTH],
}

impl Default for MerkleTree {
    fn default() -> Self {
        Self {
            sibling_hashes: [H256::zero(); MAX_MERKLE_DEPTH],
        }
    }
}

impl MerkleTree {
    pub fn merkleize_bytes(depth: usize, bytes: impl AsRef<[u8]>) -> H256 {
        let chunks = bytes.as_ref().chunks(BYTES_PER_CHUNK).map(|partial_chunk| {
            let mut chunk = H256::zero();
            chunk.as_bytes_mut()[..partial_chunk.len()].copy_from_slice(partial_chunk);
            chunk
        });

        Self::merkleize_chunks(depth, chunks)
    }

    pub fn merkleize_packed<T: SszWrite + SszHash>(depth: usize, values: &[T]) -> H256 {
        let size = T::SIZE.fixed_part();

        let chunks = values.chunks(T::PackingFactor::USIZE).map(|pack| {
            let mut chunk = H256::zero();

            chunk
                .as_bytes_mut()
                .chunks_exact_mut(size)
                .zip(pack)
                .for_each(|(destination, element)| element.write_fixed(destination));

            chunk
        });

        Self::merkleize_chunks(depth, chunks)
    }

    pub fn merkleize_chunks(
        depth: usize,
        chunks: impl IntoIterator<
            IntoIter = impl DoubleEndedIterator<Item = H256> + ExactSizeIterator<Item = H256>,
        >,
    ) -> H256 {
        assert!(depth < MAX_MERKLE_DEPTH);

        let mut chunks = chunks.into_iter();

        match chunks.next_back() {
            Some(last_chunk) => {
                let last_index = chunks.len();

                let mut merkle_tree = Self::default();

                for (index, chunk) in chunks.enumerate() {
                    merkle_tree.push(index, chunk);
                }

                merkle_tree.push_and_compute_root(last_index, last_chunk, depth)
            }
            None => ZERO_HASHES[depth],
        }
    }

    pub fn push(&mut self, index: usize, chunk: H256) {
        let sibling_to_update = index.trailing_ones() as usize;

        let mut hash = chunk;

        for height in 0..sibling_to_update {
            hash = hashing::hash_256_256(self.sibling_hashes[height], hash);
        }

        if sibling_to_update < MAX_MERKLE_DEPTH {
            self.sibling_hashes[sibling_to_update] = hash;
        }
    }

    pub fn push_and_compute_root(&mut self, index: usize, chunk: H256, depth: usize) -> H256 {
        assert!(depth == 0 || index < 1 << depth);

        let updated_sibling = index.trailing_ones() as usize;

        let mut hash = chunk;

        for height in 0..updated_sibling {
            hash = hashing::hash_256_256(self.sibling_hashes[height], hash);
        }

        if updated_sibling < MAX_MERKLE_DEPTH {
            self.sibling_hashes[updated_sibling] = hash;
        }

        for height in updated_sibling..depth {
            // The first iteration always takes the else branch:
            // the bit of `index` at `updated_sibling` is 0 by construction.
            if (index >> height) & 1 == 1 {
                hash = hashing::hash_256_256(self.sibling_hashes[height], hash);
            } else {
                hash = hashing::hash_256_256(hash, ZERO_HASHES[height]);
            }
        }

        hash
    }
}

#[must_use]
pub fn mix_in_length(root: H256, length: usize) -> H256 {
    let mut length_chunk = H256::zero();
    length_chunk.as_bytes_mut()[..size_of::<u64>()]
        .copy_from_slice(&(length as u64).to_le_bytes());
    hashing::hash_256_256(root, length_chunk)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(byte: u8) -> H256 {
        H256::repeat_byte(byte)
    }

    #[test]
    fn empty_input_produces_the_zero_subtree_root() {
        assert_eq!(MerkleTree::merkleize_chunks(0, []), ZERO_HASHES[0]);
        assert_eq!(MerkleTree::merkleize_chunks(3, []), ZERO_HASHES[3]);
    }

    #[test]
    fn single_chunk_is_padded_with_zero_subtrees() {
        let root = MerkleTree::merkleize_chunks(2, [chunk(1)]);

        let expected = hashing::hash_256_256(
            hashing::hash_256_256(chunk(1), ZERO_HASHES[0]),
            ZERO_HASHES[1],
        );

        assert_eq!(root, expected);
    }

    #[test]
    fn four_chunks_fill_a_depth_2_tree() {
        let root = MerkleTree::merkleize_chunks(2, [chunk(1), chunk(2), chunk(3), chunk(4)]);

        let expected = hashing::hash_256_256(
            hashing::hash_256_256(chunk(1), chunk(2)),
            hashing::hash_256_256(chunk(3), chunk(4)),
        );

        assert_eq!(root, expected);
    }

    #[test]
    fn three_chunks_pad_the_last_subtree() {
        let root = MerkleTree::merkleize_chunks(2, [chunk(1), chunk(2), chunk(3)]);

        let expected = hashing::hash_256_256(
            hashing::hash_256_256(chunk(1), chunk(2)),
            hashing::hash_256_256(chunk(3), ZERO_HASHES[0]),
        );

        assert_eq!(root, expected);
    }

    #[test]
    fn merkleize_bytes_packs_partial_chunks_with_zeros() {
        let root = MerkleTree::merkleize_bytes(0, [0xab]);

        let mut expected = H256::zero();
        expected.as_bytes_mut()[0] = 0xab;

        assert_eq!(root, expected);
    }

    #[test]
    fn mix_in_length_hashes_the_length_as_a_little_endian_chunk() {
        let root = chunk(9);

        let mut length_chunk = H256::zero();
        length_chunk.as_bytes_mut()[0] = 5;

        assert_eq!(
            mix_in_length(root, 5),
            hashing::hash_256_256(root, length_chunk),
        );
    }
}
