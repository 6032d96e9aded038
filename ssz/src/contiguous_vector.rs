use core::{
    fmt::{Debug, Formatter, Result as FmtResult},
    marker::PhantomData,
    slice::Iter,
};
use std::sync::OnceLock;

use arithmetic::UsizeExt as _;
use ethereum_types::H256;
use typenum::Unsigned;

use crate::{
    error::{IndexError, ReadError},
    merkle_tree::MerkleTree,
    porcelain::{SszHash, SszRead, SszSize, SszWrite},
    size::Size,
};

/// A fixed-length homogeneous collection.
///
/// Only vectors of fixed-size elements occur in the block and state schemas,
/// so the codec impls assume the element type is fixed-size.
///
/// The hash tree root is cached. Every method handing out a mutable reference
/// invalidates the cache.
pub struct ContiguousVector<T, N> {
    elements: Box<[T]>,
    root: OnceLock<H256>,
    phantom: PhantomData<N>,
}

impl<T: Clone + Default, N: Unsigned> Default for ContiguousVector<T, N> {
    fn default() -> Self {
        Self::repeat(T::default())
    }
}

impl<T: Clone, N> Clone for ContiguousVector<T, N> {
    fn clone(&self) -> Self {
        Self {
            elements: self.elements.clone(),
            root: self.root.clone(),
            phantom: PhantomData,
        }
    }
}

impl<T: PartialEq, N> PartialEq for ContiguousVector<T, N> {
    fn eq(&self, other: &Self) -> bool {
        self.elements == other.elements
    }
}

impl<T: Eq, N> Eq for ContiguousVector<T, N> {}

impl<T: Debug, N> Debug for ContiguousVector<T, N> {
    fn fmt(&self, formatter: &mut Formatter) -> FmtResult {
        formatter.debug_list().entries(self.elements.iter()).finish()
    }
}

impl<T, N: Unsigned> TryFrom<Vec<T>> for ContiguousVector<T, N> {
    type Error = ReadError;

    fn try_from(elements: Vec<T>) -> Result<Self, Self::Error> {
        let expected = N::USIZE;
        let actual = elements.len();

        if actual != expected {
            return Err(ReadError::VectorSizeMismatch { expected, actual });
        }

        Ok(Self::new_unchecked(elements.into_boxed_slice()))
    }
}

impl<'vector, T, N> IntoIterator for &'vector ContiguousVector<T, N> {
    type Item = &'vector T;
    type IntoIter = Iter<'vector, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl<T, N> ContiguousVector<T, N> {
    #[must_use]
    pub fn repeat(element: T) -> Self
    where
        T: Clone,
        N: Unsigned,
    {
        Self::new_unchecked(vec![element; N::USIZE].into_boxed_slice())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, index: u64) -> Result<&T, IndexError> {
        let length = self.len();

        usize::try_from(index)
            .ok()
            .and_then(|index| self.elements.get(index))
            .ok_or(IndexError::OutOfBounds { length, index })
    }

    #[must_use]
    pub fn mod_index(&self, index: u64) -> &T {
        let index = usize::try_from(index % self.len() as u64)
            .expect("index is reduced modulo the length");
        &self.elements[index]
    }

    pub fn mod_index_mut(&mut self, index: u64) -> &mut T {
        let index = usize::try_from(index % self.len() as u64)
            .expect("index is reduced modulo the length");
        self.root.take();
        &mut self.elements[index]
    }

    pub fn iter(&self) -> Iter<T> {
        self.elements.iter()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.elements
    }

    fn new_unchecked(elements: Box<[T]>) -> Self {
        Self {
            elements,
            root: OnceLock::new(),
            phantom: PhantomData,
        }
    }
}

impl<T: SszSize, N: Unsigned> SszSize for ContiguousVector<T, N> {
    const SIZE: Size = Size::Fixed {
        size: N::USIZE * T::SIZE.fixed_part(),
    };
}

impl<T: SszRead, N: Unsigned> SszRead for ContiguousVector<T, N> {
    fn from_ssz_unchecked(bytes: &[u8]) -> Result<Self, ReadError> {
        let size = T::SIZE.fixed_part();

        let elements = bytes
            .chunks(size)
            .map(T::from_ssz_unchecked)
            .collect::<Result<Vec<_>, _>>()?;

        elements.try_into()
    }
}

impl<T: SszWrite, N: Unsigned> SszWrite for ContiguousVector<T, N> {
    fn write_fixed(&self, bytes: &mut [u8]) {
        let size = T::SIZE.fixed_part();

        for (element, subslice) in self.elements.iter().zip(bytes.chunks_exact_mut(size)) {
            element.write_fixed(subslice);
        }
    }
}

impl<T: SszWrite + SszHash, N: Unsigned> SszHash for ContiguousVector<T, N> {
    type PackingFactor = typenum::U1;

    fn hash_tree_root(&self) -> H256 {
        *self.root.get_or_init(|| {
            let chunk_count = N::USIZE.div_ceil(T::PackingFactor::USIZE);
            let depth = usize::from(chunk_count.ilog2_ceil());

            if T::PackingFactor::USIZE == 1 {
                MerkleTree::merkleize_chunks(
                    depth,
                    self.elements.iter().map(SszHash::hash_tree_root),
                )
            } else {
                MerkleTree::merkleize_packed(depth, &self.elements)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use typenum::{U2, U4};

    use super::*;

    #[test]
    fn round_trip_preserves_elements() {
        let vector = ContiguousVector::<u64, U4>::try_from(vec![1, 2, 3, 4])
            .expect("length matches");
        let bytes = vector.to_ssz().expect("vector is fixed size");

        assert_eq!(bytes.len(), 32);
        assert_eq!(
            ContiguousVector::<u64, U4>::from_ssz(&bytes).expect("encoding is valid"),
            vector,
        );
    }

    #[test]
    fn wrong_element_count_is_rejected() {
        assert_eq!(
            ContiguousVector::<u64, U4>::try_from(vec![1, 2, 3]),
            Err(ReadError::VectorSizeMismatch {
                expected: 4,
                actual: 3,
            }),
        );
    }

    #[test]
    fn cached_root_is_invalidated_by_mutation() {
        let mut vector = ContiguousVector::<H256, U2>::default();
        let zero_root = vector.hash_tree_root();

        *vector.mod_index_mut(1) = H256::repeat_byte(1);

        assert_ne!(vector.hash_tree_root(), zero_root);
        assert_eq!(
            vector.hash_tree_root(),
            hashing::hash_256_256(H256::zero(), H256::repeat_byte(1)),
        );
    }

    #[test]
    fn packed_elements_share_chunks() {
        let vector = ContiguousVector::<u64, U4>::try_from(vec![1, 2, 3, 4])
            .expect("length matches");

        let mut chunk = H256::zero();
        for (destination, value) in chunk.as_bytes_mut().chunks_exact_mut(8).zip(1_u64..) {
            destination.copy_from_slice(&value.to_le_bytes());
        }

        assert_eq!(vector.hash_tree_root(), chunk);
    }
}
