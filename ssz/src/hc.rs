use core::{
    fmt::{Debug, Formatter, Result as FmtResult},
    ops::{Deref, DerefMut},
};
use std::sync::OnceLock;

use ethereum_types::H256;

use crate::porcelain::SszHash;

/// Memoizes the hash tree root of the wrapped value.
///
/// Any mutable access invalidates the cached root. This is the coarse end of
/// the incremental hashing scheme; the collection types cache their own roots,
/// so recomputing the root of a large container after a mutation only rehashes
/// the fields that were actually touched.
pub struct Hc<T> {
    value: T,
    root: OnceLock<H256>,
}

impl<T> From<T> for Hc<T> {
    fn from(value: T) -> Self {
        Self {
            value,
            root: OnceLock::new(),
        }
    }
}

impl<T: Clone> Clone for Hc<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            root: self.root.clone(),
        }
    }
}

impl<T: PartialEq> PartialEq for Hc<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T: Eq> Eq for Hc<T> {}

impl<T: Debug> Debug for Hc<T> {
    fn fmt(&self, formatter: &mut Formatter) -> FmtResult {
        self.value.fmt(formatter)
    }
}

impl<T: Default> Default for Hc<T> {
    fn default() -> Self {
        T::default().into()
    }
}

impl<T> Deref for Hc<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for Hc<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.root.take();
        &mut self.value
    }
}

impl<T> Hc<T> {
    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T: SszHash> SszHash for Hc<T> {
    type PackingFactor = T::PackingFactor;

    fn hash_tree_root(&self) -> H256 {
        *self.root.get_or_init(|| self.value.hash_tree_root())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutable_access_invalidates_the_cached_root() {
        let mut value = Hc::from(1_u64);
        let before = value.hash_tree_root();

        *value = 2;

        assert_ne!(value.hash_tree_root(), before);
        assert_eq!(value.hash_tree_root(), 2_u64.hash_tree_root());
    }
}
