use ethereum_types::H256;
use typenum::{NonZero, Unsigned};

use crate::{
    error::{ReadError, WriteError},
    size::Size,
};

pub trait SszSize {
    const SIZE: Size;
}

pub trait SszRead: SszSize + Sized {
    /// Attempts to deserialize `bytes` into `Self` without checking the length of `bytes`.
    ///
    /// This should only be called as an optimization inside [`SszRead`] impls for fixed-size
    /// types. For variable-size types [`SszRead::from_ssz`] is equivalent and should be used
    /// instead.
    fn from_ssz_unchecked(bytes: &[u8]) -> Result<Self, ReadError>;

    /// Attempts to deserialize `bytes` into `Self` with full validation.
    fn from_ssz(bytes: impl AsRef<[u8]>) -> Result<Self, ReadError> {
        let bytes = bytes.as_ref();

        if let Size::Fixed { size: expected } = Self::SIZE {
            let actual = bytes.len();

            if actual != expected {
                return Err(ReadError::FixedSizeMismatch { expected, actual });
            }
        }

        Self::from_ssz_unchecked(bytes)
    }
}

pub trait SszWrite: SszSize {
    fn write_fixed(&self, _bytes: &mut [u8]) {
        panic!("SszWrite::write_fixed must be implemented for fixed-size types");
    }

    fn write_variable(&self, _bytes: &mut Vec<u8>) -> Result<(), WriteError> {
        panic!("SszWrite::write_variable must be implemented for variable-size types");
    }

    fn to_ssz(&self) -> Result<Vec<u8>, WriteError> {
        match Self::SIZE {
            Size::Fixed { size } => {
                let mut bytes = vec![0; size];
                self.write_fixed(bytes.as_mut_slice());
                Ok(bytes)
            }
            Size::Variable { minimum_size } => {
                let mut bytes = Vec::with_capacity(minimum_size);
                self.write_variable(&mut bytes)?;
                Ok(bytes)
            }
        }
    }
}

pub trait SszHash {
    /// How many values of the type are packed into one Merkle chunk.
    type PackingFactor: Unsigned + NonZero;

    fn hash_tree_root(&self) -> H256;
}

impl<T: SszSize> SszSize for &T {
    const SIZE: Size = T::SIZE;
}

impl<T: SszWrite> SszWrite for &T {
    fn write_fixed(&self, bytes: &mut [u8]) {
        T::write_fixed(self, bytes);
    }

    fn write_variable(&self, bytes: &mut Vec<u8>) -> Result<(), WriteError> {
        T::write_variable(self, bytes)
    }
}

impl<T: SszHash> SszHash for &T {
    type PackingFactor = T::PackingFactor;

    fn hash_tree_root(&self) -> H256 {
        T::hash_tree_root(self)
    }
}
