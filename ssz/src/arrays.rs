use ethereum_types::{H256, H32};
use typenum::U1;

use crate::{
    error::ReadError,
    porcelain::{SszHash, SszRead, SszSize, SszWrite},
    size::Size,
};

impl SszSize for H256 {
    const SIZE: Size = Size::Fixed {
        size: Self::len_bytes(),
    };
}

impl SszRead for H256 {
    #[inline]
    fn from_ssz_unchecked(bytes: &[u8]) -> Result<Self, ReadError> {
        Ok(Self::from_slice(bytes))
    }
}

impl SszWrite for H256 {
    #[inline]
    fn write_fixed(&self, bytes: &mut [u8]) {
        bytes.copy_from_slice(self.as_bytes());
    }
}

impl SszHash for H256 {
    type PackingFactor = U1;

    #[inline]
    fn hash_tree_root(&self) -> H256 {
        *self
    }
}

impl SszSize for H32 {
    const SIZE: Size = Size::Fixed {
        size: Self::len_bytes(),
    };
}

impl SszRead for H32 {
    #[inline]
    fn from_ssz_unchecked(bytes: &[u8]) -> Result<Self, ReadError> {
        Ok(Self::from_slice(bytes))
    }
}

impl SszWrite for H32 {
    #[inline]
    fn write_fixed(&self, bytes: &mut [u8]) {
        bytes.copy_from_slice(self.as_bytes());
    }
}

impl SszHash for H32 {
    type PackingFactor = U1;

    #[inline]
    fn hash_tree_root(&self) -> H256 {
        let mut hash = H256::zero();
        hash.as_bytes_mut()[..Self::len_bytes()].copy_from_slice(self.as_bytes());
        hash
    }
}
