use core::fmt::{Debug, Formatter, Result as FmtResult};

use ethereum_types::H256;
use ssz::{MerkleTree, ReadError, Size, SszHash, SszRead, SszSize, SszWrite, U1};

/// A compressed public key that has not been checked to be a valid curve point.
///
/// Container types store compressed keys and only decompress them when
/// verifying signatures.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PublicKeyBytes(pub [u8; Self::SIZE_IN_BYTES]);

impl PublicKeyBytes {
    pub const SIZE_IN_BYTES: usize = 48;
}

impl Default for PublicKeyBytes {
    fn default() -> Self {
        Self([0; Self::SIZE_IN_BYTES])
    }
}

impl AsRef<[u8]> for PublicKeyBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; Self::SIZE_IN_BYTES]> for PublicKeyBytes {
    fn from(bytes: [u8; Self::SIZE_IN_BYTES]) -> Self {
        Self(bytes)
    }
}

impl Debug for PublicKeyBytes {
    fn fmt(&self, formatter: &mut Formatter) -> FmtResult {
        write!(formatter, "0x")?;

        for byte in self.0 {
            write!(formatter, "{byte:02x}")?;
        }

        Ok(())
    }
}

impl SszSize for PublicKeyBytes {
    const SIZE: Size = Size::Fixed {
        size: Self::SIZE_IN_BYTES,
    };
}

impl SszRead for PublicKeyBytes {
    fn from_ssz_unchecked(bytes: &[u8]) -> Result<Self, ReadError> {
        let mut key = Self::default();
        key.0.copy_from_slice(bytes);
        Ok(key)
    }
}

impl SszWrite for PublicKeyBytes {
    fn write_fixed(&self, bytes: &mut [u8]) {
        bytes.copy_from_slice(&self.0);
    }
}

impl SszHash for PublicKeyBytes {
    type PackingFactor = U1;

    fn hash_tree_root(&self) -> H256 {
        MerkleTree::merkleize_bytes(1, self.0)
    }
}
