use std::{collections::HashSet, sync::Arc};

use anyhow::Result;
use database::{Database, WriteBuffer};
use ssz::{Hc, SszRead as _, SszWrite as _};
use typenum::Unsigned as _;
use types::{
    phase0::{
        beacon_state::BeaconState,
        containers::BeaconBlock,
        primitives::{Slot, H256},
    },
    preset::SlotsPerHistoricalRoot,
};

const BLOCK_PREFIX: &[u8] = b"block:";
const STATE_PREFIX: &[u8] = b"state:";
const FINALIZED_PTR_KEY: &[u8] = b"finalized_ptr";
const JUSTIFIED_PTR_KEY: &[u8] = b"justified_ptr";
const HEAD_PTR_KEY: &[u8] = b"head_ptr";

const FLUSH_THRESHOLD_BYTES: usize = 1 << 22;

/// Content-addressed persistence for blocks and post-states, layered over the
/// key-value store through a write buffer.
pub struct Storage {
    database: Arc<Database>,
    buffer: WriteBuffer,
}

impl Storage {
    #[must_use]
    pub fn new(database: Arc<Database>) -> Self {
        let buffer = WriteBuffer::new(database.clone(), FLUSH_THRESHOLD_BYTES);

        Self { database, buffer }
    }

    pub fn store_block(&mut self, root: H256, block: &BeaconBlock) -> Result<()> {
        self.buffer.push(block_key(root), block.to_ssz()?);
        Ok(())
    }

    pub fn store_state(&mut self, root: H256, state: &BeaconState) -> Result<()> {
        self.buffer.push(state_key(root), state.to_ssz()?);
        Ok(())
    }

    pub fn set_pointers(
        &mut self,
        finalized_root: H256,
        justified_root: H256,
        head_root: H256,
    ) {
        self.buffer
            .push(FINALIZED_PTR_KEY, finalized_root.as_bytes());
        self.buffer
            .push(JUSTIFIED_PTR_KEY, justified_root.as_bytes());
        self.buffer.push(HEAD_PTR_KEY, head_root.as_bytes());
    }

    /// Flushes the buffer if it has grown large enough. Idempotent; called on
    /// every writer step.
    pub fn commit(&mut self) -> Result<()> {
        self.buffer.commit()
    }

    pub fn flush(&mut self) -> Result<()> {
        self.buffer.flush()
    }

    pub fn load_block(&self, root: H256) -> Result<Option<BeaconBlock>> {
        self.database
            .get(block_key(root))?
            .map(|bytes| BeaconBlock::from_ssz(bytes).map_err(Into::into))
            .transpose()
    }

    pub fn load_state(&self, root: H256) -> Result<Option<Hc<BeaconState>>> {
        self.database
            .get(state_key(root))?
            .map(|bytes| {
                BeaconState::from_ssz(bytes)
                    .map(Hc::from)
                    .map_err(Into::into)
            })
            .transpose()
    }

    /// Deletes blocks and states below `finalized_slot`.
    ///
    /// `keep_root` and its ancestors within the recent-history window survive
    /// even if the slot predicate matches; losing them would break replay
    /// from the retained anchor.
    pub fn prune_below(&mut self, finalized_slot: Slot, keep_root: H256) -> Result<()> {
        self.flush()?;

        let horizon = finalized_slot.saturating_sub(SlotsPerHistoricalRoot::U64);

        let mut blocks_by_root = std::collections::HashMap::new();

        for (key, value) in self.database.iterate_prefix(BLOCK_PREFIX)? {
            let root = H256::from_slice(&key[BLOCK_PREFIX.len()..]);
            let block = BeaconBlock::from_ssz(value)?;
            blocks_by_root.insert(root, block);
        }

        let mut protected = HashSet::from([keep_root]);
        let mut cursor = keep_root;

        while let Some(block) = blocks_by_root.get(&cursor) {
            if block.slot < horizon {
                break;
            }

            cursor = block.parent_root;
            protected.insert(cursor);
        }

        for (root, block) in blocks_by_root {
            if block.slot < finalized_slot && !protected.contains(&root) {
                self.database.delete(block_key(root))?;
                self.database.delete(state_key(root))?;
            }
        }

        Ok(())
    }
}

fn block_key(root: H256) -> Vec<u8> {
    let mut key = BLOCK_PREFIX.to_vec();
    key.extend_from_slice(root.as_bytes());
    key
}

fn state_key(root: H256) -> Vec<u8> {
    let mut key = STATE_PREFIX.to_vec();
    key.extend_from_slice(root.as_bytes());
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_at(slot: Slot, parent_root: H256) -> BeaconBlock {
        BeaconBlock {
            slot,
            parent_root,
            ..BeaconBlock::default()
        }
    }

    #[test]
    fn blocks_and_states_round_trip() {
        let mut storage = Storage::new(Arc::new(Database::in_memory()));

        let block = block_at(3, H256::repeat_byte(1));
        let root = block.signing_root();

        storage.store_block(root, &block).expect("block can be encoded");
        storage.flush().expect("flush succeeds");

        assert_eq!(
            storage.load_block(root).expect("block can be decoded"),
            Some(block),
        );
        assert_eq!(storage.load_block(H256::zero()).expect("lookup succeeds"), None);
    }

    #[test]
    fn pruning_respects_the_protected_chain() {
        let mut storage = Storage::new(Arc::new(Database::in_memory()));

        let ancestor = block_at(1, H256::zero());
        let ancestor_root = ancestor.signing_root();

        let keep = block_at(5, ancestor_root);
        let keep_root = keep.signing_root();

        let stray = block_at(2, H256::repeat_byte(9));
        let stray_root = stray.signing_root();

        for (root, block) in [
            (ancestor_root, &ancestor),
            (keep_root, &keep),
            (stray_root, &stray),
        ] {
            storage.store_block(root, block).expect("block can be encoded");
        }

        storage.prune_below(8, keep_root).expect("pruning succeeds");

        assert_eq!(
            storage.load_block(keep_root).expect("lookup succeeds"),
            Some(keep),
        );
        assert_eq!(
            storage
                .load_block(ancestor_root)
                .expect("lookup succeeds")
                .map(|block| block.slot),
            Some(1),
        );
        assert_eq!(storage.load_block(stray_root).expect("lookup succeeds"), None);
    }
}
