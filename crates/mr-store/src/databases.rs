use sha2::{Digest, Sha256};

use crate::{Store, StoreError};

/// Numbered keyspaces with one current index. Stores are created the
/// first time an index is used; every index is checked against `capacity`.
#[derive(Debug, Clone)]
pub struct Databases {
    stores: Vec<Store>,
    capacity: usize,
    current: usize,
}

impl Databases {
    /// A set of `capacity` databases, at least one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            stores: vec![Store::new()],
            capacity: capacity.max(1),
            current: 0,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// The current keyspace.
    pub fn current(&mut self) -> &mut Store {
        let index = self.current;
        self.materialize(index)
    }

    /// Validates a user-supplied database index.
    pub fn checked_index(&self, raw: i64) -> Result<usize, StoreError> {
        usize::try_from(raw)
            .ok()
            .filter(|index| *index < self.capacity)
            .ok_or(StoreError::DbIndexOutOfRange)
    }

    pub fn get_mut(&mut self, index: usize) -> Result<&mut Store, StoreError> {
        if index >= self.capacity {
            return Err(StoreError::DbIndexOutOfRange);
        }
        Ok(self.materialize(index))
    }

    pub fn select(&mut self, index: usize) -> Result<(), StoreError> {
        if index >= self.capacity {
            return Err(StoreError::DbIndexOutOfRange);
        }
        self.current = index;
        Ok(())
    }

    /// Exchanges the contents of two databases.
    pub fn swap(&mut self, first: usize, second: usize) -> Result<(), StoreError> {
        if first >= self.capacity || second >= self.capacity {
            return Err(StoreError::DbIndexOutOfRange);
        }
        self.materialize(first.max(second));
        self.stores.swap(first, second);
        Ok(())
    }

    pub fn flush_current(&mut self) {
        self.current().flushdb();
    }

    /// Clears every database and selects index 0.
    pub fn flush_all(&mut self) {
        for store in &mut self.stores {
            store.flushdb();
        }
        self.current = 0;
    }

    /// Moves `key` from the current database into `target`. Returns false
    /// when the key is absent here or already present there.
    pub fn move_key(&mut self, key: &[u8], target: usize, now_ms: u64) -> Result<bool, StoreError> {
        if target >= self.capacity {
            return Err(StoreError::DbIndexOutOfRange);
        }
        if target == self.current {
            return Err(StoreError::SameObject);
        }
        if !self.current().exists(key, now_ms) || self.materialize(target).exists(key, now_ms) {
            return Ok(false);
        }
        let Some(entry) = self.current().take_entry(key, now_ms) else {
            return Ok(false);
        };
        self.materialize(target).put_entry(key.to_vec(), entry);
        Ok(true)
    }

    /// SHA-256 over every database's canonical contents, hex encoded.
    #[must_use]
    pub fn state_digest(&self) -> String {
        let mut hasher = Sha256::new();
        for (index, store) in self.stores.iter().enumerate() {
            if store.is_empty() {
                continue;
            }
            hasher.update((index as u64).to_le_bytes());
            store.feed_digest(&mut hasher);
        }
        hex::encode(hasher.finalize())
    }

    fn materialize(&mut self, index: usize) -> &mut Store {
        if self.stores.len() <= index {
            self.stores.resize_with(index + 1, Store::new);
        }
        &mut self.stores[index]
    }
}

impl Default for Databases {
    fn default() -> Self {
        Self::new(16)
    }
}
