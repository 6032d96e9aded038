use std::{collections::BTreeMap, sync::Mutex};

use ssz::SszHash as _;
use types::phase0::{
    containers::{AttesterSlashing, ProposerSlashing, Transfer, VoluntaryExit},
    primitives::{ValidatorIndex, H256},
};

/// An operation that can be pooled, keyed by a canonical id.
pub trait PoolOperation: Clone {
    type Id: Ord + Copy;

    fn id(&self) -> Self::Id;
}

impl PoolOperation for ProposerSlashing {
    type Id = ValidatorIndex;

    fn id(&self) -> Self::Id {
        self.proposer_index
    }
}

impl PoolOperation for AttesterSlashing {
    type Id = H256;

    fn id(&self) -> Self::Id {
        self.hash_tree_root()
    }
}

impl PoolOperation for VoluntaryExit {
    type Id = ValidatorIndex;

    fn id(&self) -> Self::Id {
        self.validator_index
    }
}

impl PoolOperation for Transfer {
    type Id = H256;

    fn id(&self) -> Self::Id {
        self.hash_tree_root()
    }
}

const DEFAULT_CAPACITY: usize = 1024;

/// A bounded set of operations. Duplicates and overflow are dropped silently;
/// peers rebroadcast operations that matter.
pub struct BoundedPool<T: PoolOperation> {
    capacity: usize,
    entries: Mutex<BTreeMap<T::Id, T>>,
}

impl<T: PoolOperation> Default for BoundedPool<T> {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl<T: PoolOperation> BoundedPool<T> {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn insert(&self, operation: T) {
        let mut entries = self.entries.lock().expect("operation pool is poisoned");

        if entries.len() >= self.capacity {
            return;
        }

        entries.entry(operation.id()).or_insert(operation);
    }

    #[must_use]
    pub fn peek(&self, max: usize) -> Vec<T> {
        self.entries
            .lock()
            .expect("operation pool is poisoned")
            .values()
            .take(max)
            .cloned()
            .collect()
    }

    pub fn remove(&self, id: T::Id) {
        self.entries
            .lock()
            .expect("operation pool is poisoned")
            .remove(&id);
    }

    /// Keeps only operations satisfying `predicate`.
    pub fn retain(&self, mut predicate: impl FnMut(&T) -> bool) {
        self.entries
            .lock()
            .expect("operation pool is poisoned")
            .retain(|_, operation| predicate(operation));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().expect("operation pool is poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exit(validator_index: ValidatorIndex) -> VoluntaryExit {
        VoluntaryExit {
            validator_index,
            ..VoluntaryExit::default()
        }
    }

    #[test]
    fn duplicates_are_dropped() {
        let pool = BoundedPool::<VoluntaryExit>::default();

        pool.insert(exit(3));
        pool.insert(VoluntaryExit {
            epoch: 9,
            ..exit(3)
        });

        assert_eq!(pool.len(), 1);
        assert_eq!(pool.peek(16)[0].epoch, 0);
    }

    #[test]
    fn capacity_is_enforced() {
        let pool = BoundedPool::with_capacity(2);

        for index in 0..5 {
            pool.insert(exit(index));
        }

        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn retain_sweeps_stale_operations() {
        let pool = BoundedPool::<VoluntaryExit>::default();

        for index in 0..4 {
            pool.insert(exit(index));
        }

        pool.retain(|exit| exit.validator_index % 2 == 0);

        assert_eq!(
            pool.peek(16)
                .into_iter()
                .map(|exit| exit.validator_index)
                .collect::<Vec<_>>(),
            [0, 2],
        );
    }
}
