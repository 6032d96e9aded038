//! The swap-or-not shuffle.
//!
//! See the following for an explanation of the algorithm:
//! - <https://github.com/protolambda/eth2-docs/tree/de65f38857f1e27ffb6f25107d61e795cf1a5ad7#shuffling>
//!
//! Committees are small slices of the shuffled sequence, so only the
//! single-index form is implemented. Shuffling a whole slice at once can be
//! much faster but is not needed at this scale.

use core::num::NonZeroU64;

use types::{phase0::primitives::H256, preset::SHUFFLE_ROUND_COUNT};

const BITS_PER_HASH: u64 = H256::len_bytes() as u64 * 8;

/// Computes the position `index` is moved to when shuffling `0..index_count`.
#[must_use]
pub fn shuffle_single(mut index: u64, index_count: NonZeroU64, seed: H256) -> u64 {
    assert!(index < index_count.get());

    for round in 0..SHUFFLE_ROUND_COUNT {
        let pivot = compute_pivot(seed, round, index_count);
        let flip = (pivot + index_count.get() - index) % index_count;
        let position = index.max(flip);
        let source = compute_source(seed, round, position / BITS_PER_HASH);
        let byte = source.as_bytes()[(position % BITS_PER_HASH) as usize / 8];
        let bit = byte >> (position % 8) & 1;

        if bit == 1 {
            index = flip;
        }
    }

    index
}

fn compute_pivot(seed: H256, round: u8, index_count: NonZeroU64) -> u64 {
    let digest = hashing::hash_256_8(seed, round);
    let word = digest.as_bytes()[..size_of::<u64>()]
        .try_into()
        .map(u64::from_le_bytes)
        .expect("slice has the same size as u64");
    word % index_count
}

fn compute_source(seed: H256, round: u8, position_window: u64) -> H256 {
    // Truncated to 32 bits, matching the reference shuffle.
    #[allow(clippy::cast_possible_truncation)]
    let window = position_window as u32;

    hashing::hash_256_8_32(seed, round, window)
}

#[cfg(test)]
mod tests {
    use itertools::Itertools as _;
    use test_case::test_case;

    use super::*;

    #[test_case(1)]
    #[test_case(2)]
    #[test_case(33)]
    #[test_case(1000)]
    fn shuffle_is_a_permutation(count: u64) {
        let index_count = NonZeroU64::new(count).expect("count is nonzero");
        let seed = hashing::hash_64(42);

        let shuffled = (0..count)
            .map(|index| shuffle_single(index, index_count, seed))
            .sorted()
            .collect::<Vec<_>>();

        assert_eq!(shuffled, (0..count).collect::<Vec<_>>());
    }

    #[test]
    fn different_seeds_produce_different_permutations() {
        let index_count = NonZeroU64::new(100).expect("count is nonzero");

        let permutation = |seed_input| {
            let seed = hashing::hash_64(seed_input);
            (0..100)
                .map(|index| shuffle_single(index, index_count, seed))
                .collect::<Vec<_>>()
        };

        assert_ne!(permutation(1), permutation(2));
    }
}
