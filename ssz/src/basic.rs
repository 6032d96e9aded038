use byteorder::ByteOrder as _;
use ethereum_types::H256;
use typenum::{U32, U4, U8};

use crate::{
    consts::Endianness,
    error::ReadError,
    porcelain::{SszHash, SszRead, SszSize, SszWrite},
    size::Size,
};

impl SszSize for bool {
    const SIZE: Size = Size::Fixed {
        size: size_of::<Self>(),
    };
}

impl SszRead for bool {
    #[inline]
    fn from_ssz_unchecked(bytes: &[u8]) -> Result<Self, ReadError> {
        match bytes[0] {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(ReadError::BooleanInvalid { value }),
        }
    }
}

impl SszWrite for bool {
    #[inline]
    fn write_fixed(&self, bytes: &mut [u8]) {
        bytes[0] = (*self).into();
    }
}

impl SszHash for bool {
    type PackingFactor = U32;

    #[inline]
    fn hash_tree_root(&self) -> H256 {
        let mut hash = H256::zero();
        hash.as_bytes_mut()[0] = (*self).into();
        hash
    }
}

impl SszSize for u8 {
    const SIZE: Size = Size::Fixed {
        size: size_of::<Self>(),
    };
}

impl SszRead for u8 {
    #[inline]
    fn from_ssz_unchecked(bytes: &[u8]) -> Result<Self, ReadError> {
        Ok(bytes[0])
    }
}

impl SszWrite for u8 {
    #[inline]
    fn write_fixed(&self, bytes: &mut [u8]) {
        bytes[0] = *self;
    }
}

impl SszHash for u8 {
    type PackingFactor = U32;

    #[inline]
    fn hash_tree_root(&self) -> H256 {
        let mut hash = H256::zero();
        hash.as_bytes_mut()[0] = *self;
        hash
    }
}

impl SszSize for u32 {
    const SIZE: Size = Size::Fixed {
        size: size_of::<Self>(),
    };
}

impl SszRead for u32 {
    #[inline]
    fn from_ssz_unchecked(bytes: &[u8]) -> Result<Self, ReadError> {
        Ok(Endianness::read_u32(bytes))
    }
}

impl SszWrite for u32 {
    #[inline]
    fn write_fixed(&self, bytes: &mut [u8]) {
        Endianness::write_u32(bytes, *self);
    }
}

impl SszHash for u32 {
    type PackingFactor = U8;

    #[inline]
    fn hash_tree_root(&self) -> H256 {
        let mut hash = H256::zero();
        self.write_fixed(&mut hash.as_bytes_mut()[..size_of::<Self>()]);
        hash
    }
}

impl SszSize for u64 {
    const SIZE: Size = Size::Fixed {
        size: size_of::<Self>(),
    };
}

impl SszRead for u64 {
    #[inline]
    fn from_ssz_unchecked(bytes: &[u8]) -> Result<Self, ReadError> {
        Ok(Endianness::read_u64(bytes))
    }
}

impl SszWrite for u64 {
    #[inline]
    fn write_fixed(&self, bytes: &mut [u8]) {
        Endianness::write_u64(bytes, *self);
    }
}

impl SszHash for u64 {
    type PackingFactor = U4;

    // Note that this is not the same as `H256::from_low_u64_le`.
    #[inline]
    fn hash_tree_root(&self) -> H256 {
        let mut hash = H256::zero();
        self.write_fixed(&mut hash.as_bytes_mut()[..size_of::<Self>()]);
        hash
    }
}

#[cfg(test)]
mod tests {
    use crate::porcelain::{SszRead as _, SszWrite as _};

    use super::*;

    #[test]
    fn u64_is_little_endian() {
        let bytes = 0x0102_0304_0506_0708_u64.to_ssz().expect("u64 is fixed size");
        assert_eq!(bytes, [8, 7, 6, 5, 4, 3, 2, 1]);
        assert_eq!(u64::from_ssz(bytes).expect("bytes have correct length"), 0x0102_0304_0506_0708);
    }

    #[test]
    fn bool_rejects_bytes_other_than_0_and_1() {
        assert_eq!(bool::from_ssz([2]), Err(ReadError::BooleanInvalid { value: 2 }));
    }

    #[test]
    fn fixed_size_values_reject_wrong_lengths() {
        assert_eq!(
            u64::from_ssz([0; 7]),
            Err(ReadError::FixedSizeMismatch {
                expected: 8,
                actual: 7,
            }),
        );
    }
}
