use core::{
    fmt::{Debug, Formatter, Result as FmtResult},
    marker::PhantomData,
};

use arithmetic::UsizeExt as _;
use ethereum_types::H256;
use typenum::Unsigned;

use crate::{
    consts::{BITS_PER_BYTE, BYTES_PER_CHUNK},
    error::ReadError,
    merkle_tree::MerkleTree,
    porcelain::{SszHash, SszRead, SszSize, SszWrite},
    size::Size,
};

/// A fixed-length sequence of bits, least significant bit first.
///
/// Unused bits in the last byte are kept zero.
pub struct BitVector<N> {
    bytes: Box<[u8]>,
    phantom: PhantomData<N>,
}

impl<N: Unsigned> Default for BitVector<N> {
    fn default() -> Self {
        Self {
            bytes: vec![0; byte_count::<N>()].into_boxed_slice(),
            phantom: PhantomData,
        }
    }
}

impl<N> Clone for BitVector<N> {
    fn clone(&self) -> Self {
        Self {
            bytes: self.bytes.clone(),
            phantom: PhantomData,
        }
    }
}

impl<N> PartialEq for BitVector<N> {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl<N> Eq for BitVector<N> {}

impl<N> Debug for BitVector<N> {
    fn fmt(&self, formatter: &mut Formatter) -> FmtResult {
        formatter.write_str("0b")?;

        for index in (0..self.bytes.len() * BITS_PER_BYTE).rev() {
            let bit = self.bytes[index / BITS_PER_BYTE] >> (index % BITS_PER_BYTE) & 1;
            write!(formatter, "{bit}")?;
        }

        Ok(())
    }
}

impl<N: Unsigned> BitVector<N> {
    #[must_use]
    pub fn get(&self, index: usize) -> bool {
        assert!(index < N::USIZE);

        self.bytes[index / BITS_PER_BYTE] >> (index % BITS_PER_BYTE) & 1 == 1
    }

    pub fn set(&mut self, index: usize, value: bool) {
        assert!(index < N::USIZE);

        let mask = 1 << (index % BITS_PER_BYTE);

        if value {
            self.bytes[index / BITS_PER_BYTE] |= mask;
        } else {
            self.bytes[index / BITS_PER_BYTE] &= !mask;
        }
    }

    /// Moves every bit one position up, discarding the highest and zeroing bit 0.
    pub fn shift_up_by_1(&mut self) {
        let mut carry = 0;

        for byte in &mut self.bytes {
            let next_carry = *byte >> 7;
            *byte = (*byte << 1) | carry;
            carry = next_carry;
        }

        self.clear_excess_bits();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        N::USIZE
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        N::USIZE == 0
    }

    fn clear_excess_bits(&mut self) {
        let excess_bits = byte_count::<N>() * BITS_PER_BYTE - N::USIZE;

        if excess_bits > 0 {
            if let Some(last) = self.bytes.last_mut() {
                *last &= u8::MAX >> excess_bits;
            }
        }
    }
}

impl<N: Unsigned> SszSize for BitVector<N> {
    const SIZE: Size = Size::Fixed {
        size: N::USIZE.div_ceil(BITS_PER_BYTE),
    };
}

impl<N: Unsigned> SszRead for BitVector<N> {
    fn from_ssz_unchecked(bytes: &[u8]) -> Result<Self, ReadError> {
        let mut vector = Self {
            bytes: bytes.to_vec().into_boxed_slice(),
            phantom: PhantomData,
        };

        let last_byte = vector.bytes.last().copied();

        vector.clear_excess_bits();

        if vector.bytes.last().copied() != last_byte {
            return Err(ReadError::BitVectorPaddingNotZero);
        }

        Ok(vector)
    }
}

impl<N: Unsigned> SszWrite for BitVector<N> {
    fn write_fixed(&self, bytes: &mut [u8]) {
        bytes.copy_from_slice(&self.bytes);
    }
}

impl<N: Unsigned> SszHash for BitVector<N> {
    type PackingFactor = typenum::U1;

    fn hash_tree_root(&self) -> H256 {
        let chunk_count = byte_count::<N>().div_ceil(BYTES_PER_CHUNK);
        let depth = usize::from(chunk_count.ilog2_ceil());

        MerkleTree::merkleize_bytes(depth, &self.bytes)
    }
}

fn byte_count<N: Unsigned>() -> usize {
    N::USIZE.div_ceil(BITS_PER_BYTE)
}

#[cfg(test)]
mod tests {
    use typenum::U4;

    use super::*;

    #[test]
    fn set_and_get_round_trip() {
        let mut bits = BitVector::<U4>::default();

        bits.set(0, true);
        bits.set(2, true);

        assert!(bits.get(0));
        assert!(!bits.get(1));
        assert!(bits.get(2));
        assert!(!bits.get(3));
    }

    #[test]
    fn shift_up_discards_the_highest_bit() {
        let mut bits = BitVector::<U4>::default();

        bits.set(0, true);
        bits.set(3, true);

        bits.shift_up_by_1();

        assert!(!bits.get(0));
        assert!(bits.get(1));
        assert!(!bits.get(2));
        assert!(!bits.get(3));
    }

    #[test]
    fn decoding_rejects_set_padding_bits() {
        assert_eq!(
            BitVector::<U4>::from_ssz([0b0001_0000]),
            Err(ReadError::BitVectorPaddingNotZero),
        );
    }

    #[test]
    fn encoding_round_trips() {
        let mut bits = BitVector::<U4>::default();
        bits.set(1, true);

        let bytes = bits.to_ssz().expect("bit vector is fixed size");

        assert_eq!(bytes, [0b10]);
        assert_eq!(
            BitVector::<U4>::from_ssz(&bytes).expect("encoding is valid"),
            bits,
        );
    }
}
