//! SHA-256 helpers for consensus objects.
//!
//! Merkleization hashes fixed-width inputs almost exclusively, so the helpers
//! take their inputs in the handful of shapes the rest of the workspace needs
//! instead of exposing a streaming interface.

use std::sync::LazyLock;

use ethereum_types::H256;
use sha2::{Digest as _, Sha256};

/// Roots of zero-filled subtrees by height.
///
/// `ZERO_HASHES[0]` is the all-zero chunk. The table is deep enough for the
/// validator registry, whose Merkle tree is the deepest in the state.
pub static ZERO_HASHES: LazyLock<[H256; 41]> = LazyLock::new(|| {
    let mut hashes = [H256::zero(); 41];

    for height in 1..hashes.len() {
        hashes[height] = hash_256_256(hashes[height - 1], hashes[height - 1]);
    }

    hashes
});

#[inline]
#[must_use]
pub fn hash_bytes(bytes: &[u8]) -> H256 {
    H256(Sha256::digest(bytes).into())
}

#[inline]
#[must_use]
pub fn hash_256_256(left: H256, right: H256) -> H256 {
    let mut hasher = Sha256::new();
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    H256(hasher.finalize().into())
}

#[inline]
#[must_use]
pub fn hash_64(value: u64) -> H256 {
    hash_bytes(&value.to_le_bytes())
}

#[inline]
#[must_use]
pub fn hash_256_8(hash: H256, byte: u8) -> H256 {
    let mut hasher = Sha256::new();
    hasher.update(hash.as_bytes());
    hasher.update([byte]);
    H256(hasher.finalize().into())
}

#[inline]
#[must_use]
pub fn hash_256_8_32(hash: H256, byte: u8, word: u32) -> H256 {
    let mut hasher = Sha256::new();
    hasher.update(hash.as_bytes());
    hasher.update([byte]);
    hasher.update(word.to_le_bytes());
    H256(hasher.finalize().into())
}

#[inline]
#[must_use]
pub fn hash_256_64(hash: H256, value: u64) -> H256 {
    let mut hasher = Sha256::new();
    hasher.update(hash.as_bytes());
    hasher.update(value.to_le_bytes());
    H256(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;
    use itertools::Itertools as _;

    use super::*;

    #[test]
    fn hash_bytes_matches_sha_256_test_vector() {
        assert_eq!(
            hash_bytes(b""),
            H256(hex!(
                "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
            )),
        );
    }

    #[test]
    fn first_zero_subtree_roots_match_known_values() {
        assert_eq!(ZERO_HASHES[0], H256::zero());
        assert_eq!(
            ZERO_HASHES[1],
            H256(hex!(
                "f5a5fd42d16a20302798ef6ed309979b43003d2320d9f0e8ea9831a92759fb4b"
            )),
        );
        assert_eq!(
            ZERO_HASHES[2],
            H256(hex!(
                "db56114e00fdd4c1f85c892bf35ac9a89289aaecb1ebd0a96cde606a748b5d71"
            )),
        );
    }

    #[test]
    fn higher_zero_hashes_are_calculated_from_lower_ones() {
        for (lower, higher) in ZERO_HASHES.into_iter().tuple_windows() {
            assert_eq!(hash_256_256(lower, lower), higher);
        }
    }

    #[test]
    fn fixed_width_helpers_agree_with_hash_bytes() {
        let hash = hash_bytes(b"lantern");

        let mut bytes = [0; 40];
        bytes[..32].copy_from_slice(hash.as_bytes());
        bytes[32..].copy_from_slice(&7_u64.to_le_bytes());

        assert_eq!(hash_256_64(hash, 7), hash_bytes(&bytes));
        assert_eq!(hash_64(7), hash_bytes(&7_u64.to_le_bytes()));
    }
}
