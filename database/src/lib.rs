//! An ordered key-value store.
//!
//! The consensus core only needs a small interface; a persistent on-disk
//! engine is an external collaborator that can be slotted in behind the same
//! surface. The in-memory backend uses a persistent map so that read
//! snapshots are cheap.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use im::OrdMap;
use log::debug;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("database is poisoned")]
pub struct PoisonedError;

type Map = OrdMap<Vec<u8>, Vec<u8>>;

pub struct Database {
    map: Mutex<Map>,
}

impl Database {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            map: Mutex::new(OrdMap::new()),
        }
    }

    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<Option<Vec<u8>>> {
        Ok(self.snapshot()?.get(key.as_ref()).cloned())
    }

    pub fn contains_key(&self, key: impl AsRef<[u8]>) -> Result<bool> {
        Ok(self.snapshot()?.contains_key(key.as_ref()))
    }

    pub fn put(&self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Result<()> {
        self.map
            .lock()
            .map_err(|_| PoisonedError)?
            .insert(key.into(), value.into());

        Ok(())
    }

    pub fn put_batch(
        &self,
        entries: impl IntoIterator<Item = (Vec<u8>, Vec<u8>)>,
    ) -> Result<()> {
        let mut map = self.map.lock().map_err(|_| PoisonedError)?;

        for (key, value) in entries {
            map.insert(key, value);
        }

        Ok(())
    }

    pub fn delete(&self, key: impl AsRef<[u8]>) -> Result<()> {
        self.map
            .lock()
            .map_err(|_| PoisonedError)?
            .remove(key.as_ref());

        Ok(())
    }

    /// All entries whose keys start with `prefix`, in key order.
    pub fn iterate_prefix(&self, prefix: impl AsRef<[u8]>) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let prefix = prefix.as_ref();

        Ok(self
            .snapshot()?
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }

    fn snapshot(&self) -> Result<Map, PoisonedError> {
        Ok(self.map.lock().map_err(|_| PoisonedError)?.clone())
    }
}

/// Batches writes and flushes them once their size crosses a threshold.
///
/// `commit` is idempotent and safe to call on every writer step; only the
/// calls that find a non-empty buffer at or over the threshold do work.
pub struct WriteBuffer {
    database: Arc<Database>,
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    buffered_bytes: usize,
    flush_threshold_bytes: usize,
}

impl WriteBuffer {
    #[must_use]
    pub fn new(database: Arc<Database>, flush_threshold_bytes: usize) -> Self {
        Self {
            database,
            entries: vec![],
            buffered_bytes: 0,
            flush_threshold_bytes,
        }
    }

    pub fn push(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        let key = key.into();
        let value = value.into();

        self.buffered_bytes += key.len() + value.len();
        self.entries.push((key, value));
    }

    /// Flushes if the buffer has grown past the threshold.
    pub fn commit(&mut self) -> Result<()> {
        if self.buffered_bytes >= self.flush_threshold_bytes && !self.entries.is_empty() {
            self.flush()?;
        }

        Ok(())
    }

    /// Flushes unconditionally.
    pub fn flush(&mut self) -> Result<()> {
        if self.entries.is_empty() {
            return Ok(());
        }

        debug!(
            "flushing {} buffered entries ({} bytes)",
            self.entries.len(),
            self.buffered_bytes,
        );

        self.database.put_batch(self.entries.drain(..))?;
        self.buffered_bytes = 0;

        Ok(())
    }

    #[must_use]
    pub fn buffered_bytes(&self) -> usize {
        self.buffered_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_iteration_is_ordered_and_bounded() {
        let database = Database::in_memory();

        database.put(*b"block:2", *b"b").expect("put succeeds");
        database.put(*b"block:1", *b"a").expect("put succeeds");
        database.put(*b"state:1", *b"s").expect("put succeeds");

        let entries = database
            .iterate_prefix(*b"block:")
            .expect("iteration succeeds");

        assert_eq!(
            entries,
            [
                (b"block:1".to_vec(), b"a".to_vec()),
                (b"block:2".to_vec(), b"b".to_vec()),
            ],
        );
    }

    #[test]
    fn write_buffer_flushes_at_the_threshold() {
        let database = Arc::new(Database::in_memory());
        let mut buffer = WriteBuffer::new(database.clone(), 16);

        buffer.push(*b"key:1", *b"tiny");
        buffer.commit().expect("commit succeeds");

        assert_eq!(database.get(*b"key:1").expect("get succeeds"), None);

        buffer.push(*b"key:2", *b"big enough now");
        buffer.commit().expect("commit succeeds");

        assert_eq!(
            database.get(*b"key:1").expect("get succeeds"),
            Some(b"tiny".to_vec()),
        );

        // A second commit with an empty buffer is a no-op.
        buffer.commit().expect("commit succeeds");
        assert_eq!(buffer.buffered_bytes(), 0);
    }

    #[test]
    fn deleted_keys_disappear() {
        let database = Database::in_memory();

        database.put(*b"key", *b"value").expect("put succeeds");
        database.delete(*b"key").expect("delete succeeds");

        assert!(!database.contains_key(*b"key").expect("lookup succeeds"));
    }
}
