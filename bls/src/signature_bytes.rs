use core::fmt::{Debug, Formatter, Result as FmtResult};

use ethereum_types::H256;
use ssz::{MerkleTree, ReadError, Size, SszHash, SszRead, SszSize, SszWrite, U1};

/// A compressed signature that has not been checked to be a valid curve point.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SignatureBytes(pub [u8; Self::SIZE_IN_BYTES]);

impl SignatureBytes {
    pub const SIZE_IN_BYTES: usize = 96;

    /// The all-zero placeholder used when computing signing roots.
    #[must_use]
    pub const fn zero() -> Self {
        Self([0; Self::SIZE_IN_BYTES])
    }
}

impl Default for SignatureBytes {
    fn default() -> Self {
        Self::zero()
    }
}

impl AsRef<[u8]> for SignatureBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; Self::SIZE_IN_BYTES]> for SignatureBytes {
    fn from(bytes: [u8; Self::SIZE_IN_BYTES]) -> Self {
        Self(bytes)
    }
}

impl Debug for SignatureBytes {
    fn fmt(&self, formatter: &mut Formatter) -> FmtResult {
        write!(formatter, "0x")?;

        for byte in self.0 {
            write!(formatter, "{byte:02x}")?;
        }

        Ok(())
    }
}

impl SszSize for SignatureBytes {
    const SIZE: Size = Size::Fixed {
        size: Self::SIZE_IN_BYTES,
    };
}

impl SszRead for SignatureBytes {
    fn from_ssz_unchecked(bytes: &[u8]) -> Result<Self, ReadError> {
        let mut signature = Self::zero();
        signature.0.copy_from_slice(bytes);
        Ok(signature)
    }
}

impl SszWrite for SignatureBytes {
    fn write_fixed(&self, bytes: &mut [u8]) {
        bytes.copy_from_slice(&self.0);
    }
}

impl SszHash for SignatureBytes {
    type PackingFactor = U1;

    fn hash_tree_root(&self) -> H256 {
        MerkleTree::merkleize_bytes(2, self.0)
    }
}
