use core::{
    fmt::{Debug, Formatter, Result as FmtResult},
    marker::PhantomData,
    slice::{Iter, IterMut},
};
use std::sync::OnceLock;

use arithmetic::UsizeExt as _;
use ethereum_types::H256;
use typenum::Unsigned;

use crate::{
    error::{IndexError, PushError, ReadError},
    merkle_tree::{mix_in_length, MerkleTree},
    porcelain::{SszHash, SszRead, SszSize, SszWrite},
    shared,
    size::Size,
};

/// A homogeneous collection with a maximum length.
///
/// The hash tree root is cached. Every method handing out a mutable reference
/// invalidates the cache.
pub struct ContiguousList<T, N> {
    elements: Vec<T>,
    root: OnceLock<H256>,
    phantom: PhantomData<N>,
}

impl<T, N> Default for ContiguousList<T, N> {
    fn default() -> Self {
        Self::new_unchecked(vec![])
    }
}

impl<T: Clone, N> Clone for ContiguousList<T, N> {
    fn clone(&self) -> Self {
        Self {
            elements: self.elements.clone(),
            root: self.root.clone(),
            phantom: PhantomData,
        }
    }
}

impl<T: PartialEq, N> PartialEq for ContiguousList<T, N> {
    fn eq(&self, other: &Self) -> bool {
        self.elements == other.elements
    }
}

impl<T: Eq, N> Eq for ContiguousList<T, N> {}

impl<T: Debug, N> Debug for ContiguousList<T, N> {
    fn fmt(&self, formatter: &mut Formatter) -> FmtResult {
        formatter.debug_list().entries(self.elements.iter()).finish()
    }
}

impl<T, N: Unsigned> TryFrom<Vec<T>> for ContiguousList<T, N> {
    type Error = ReadError;

    fn try_from(elements: Vec<T>) -> Result<Self, Self::Error> {
        let maximum = N::USIZE;
        let actual = elements.len();

        if actual > maximum {
            return Err(ReadError::ListTooLong { maximum, actual });
        }

        Ok(Self::new_unchecked(elements))
    }
}

impl<T, N: Unsigned, const SIZE: usize> TryFrom<[T; SIZE]> for ContiguousList<T, N> {
    type Error = ReadError;

    fn try_from(elements: [T; SIZE]) -> Result<Self, Self::Error> {
        Vec::from(elements).try_into()
    }
}

impl<'list, T, N> IntoIterator for &'list ContiguousList<T, N> {
    type Item = &'list T;
    type IntoIter = Iter<'list, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl<T, N> IntoIterator for ContiguousList<T, N> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.into_iter()
    }
}

impl<T, N: Unsigned> ContiguousList<T, N> {
    pub fn try_from_iter(elements: impl IntoIterator<Item = T>) -> Result<Self, ReadError> {
        elements.into_iter().collect::<Vec<_>>().try_into()
    }

    pub fn push(&mut self, element: T) -> Result<(), PushError> {
        if self.elements.len() >= N::USIZE {
            return Err(PushError::ListFull);
        }

        self.root.take();
        self.elements.push(element);

        Ok(())
    }
}

impl<T, N> ContiguousList<T, N> {
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[must_use]
    pub fn len_u64(&self) -> u64 {
        self.elements
            .len()
            .try_into()
            .expect("list lengths fit in u64")
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

    pub fn get_mut(&mut self, index: u64) -> Result<&mut T, IndexError> {
        let length = self.len();

        self.root.take();

        usize::try_from(index)
            .ok()
            .and_then(|index| self.elements.get_mut(index))
            .ok_or(IndexError::OutOfBounds { length, index })
    }

    pub fn iter(&self) -> Iter<T> {
        self.elements.iter()
    }

    pub fn iter_mut(&mut self) -> IterMut<T> {
        self.root.take();
        self.elements.iter_mut()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.elements
    }

    fn new_unchecked(elements: Vec<T>) -> Self {
        Self {
            elements,
            root: OnceLock::new(),
            phantom: PhantomData,
        }
    }
}

impl<T, N> SszSize for ContiguousList<T, N> {
    const SIZE: Size = Size::Variable { minimum_size: 0 };
}

impl<T: SszRead, N: Unsigned> SszRead for ContiguousList<T, N> {
    fn from_ssz_unchecked(bytes: &[u8]) -> Result<Self, ReadError> {
        let elements = shared::read_list(bytes)?.collect::<Result<Vec<T>, _>>()?;
        elements.try_into()
    }
}

impl<T: SszWrite, N> SszWrite for ContiguousList<T, N> {
    fn write_variable(&self, bytes: &mut Vec<u8>) -> Result<(), crate::error::WriteError> {
        shared::write_list(bytes, self.elements.iter())
    }
}

impl<T: SszWrite + SszHash, N: Unsigned> SszHash for ContiguousList<T, N> {
    type PackingFactor = typenum::U1;

    fn hash_tree_root(&self) -> H256 {
        *self.root.get_or_init(|| {
            let chunk_count = N::USIZE.div_ceil(T::PackingFactor::USIZE);
            let depth = usize::from(chunk_count.ilog2_ceil());

            let root = if T::PackingFactor::USIZE == 1 {
                MerkleTree::merkleize_chunks(
                    depth,
                    self.elements.iter().map(SszHash::hash_tree_root),
                )
            } else {
                MerkleTree::merkleize_packed(depth, &self.elements)
            };

            mix_in_length(root, self.len())
        })
    }
}

#[cfg(test)]
mod tests {
    use hashing::ZERO_HASHES;
    use typenum::{U3, U4};

    use super::*;

    #[test]
    fn round_trip_preserves_fixed_size_elements() {
        let list = ContiguousList::<u64, U4>::try_from([5, 6]).expect("within bound");
        let bytes = list.to_ssz().expect("offsets fit");

        assert_eq!(bytes.len(), 16);
        assert_eq!(
            ContiguousList::<u64, U4>::from_ssz(&bytes).expect("encoding is valid"),
            list,
        );
    }

    #[test]
    fn decoding_rejects_lists_over_the_bound() {
        let bytes = ContiguousList::<u64, U4>::try_from([1, 2, 3, 4])
            .expect("within bound")
            .to_ssz()
            .expect("offsets fit");

        assert_eq!(
            ContiguousList::<u64, U3>::from_ssz(&bytes),
            Err(ReadError::ListTooLong {
                maximum: 3,
                actual: 4,
            }),
        );
    }

    #[test]
    fn push_stops_at_the_bound() {
        let mut list = ContiguousList::<u64, U3>::default();

        for value in 0..3 {
            list.push(value).expect("list has room");
        }

        assert_eq!(list.push(3), Err(PushError::ListFull));
    }

    #[test]
    fn empty_list_root_mixes_in_a_zero_length() {
        let list = ContiguousList::<H256, U4>::default();

        assert_eq!(list.hash_tree_root(), mix_in_length(ZERO_HASHES[2], 0));
    }

    #[test]
    fn root_reflects_mutation_through_get_mut() {
        let mut list = ContiguousList::<u64, U4>::try_from([1, 2]).expect("within bound");
        let before = list.hash_tree_root();

        *list.get_mut(0).expect("index 0 exists") = 9;

        assert_ne!(list.hash_tree_root(), before);
    }
}
