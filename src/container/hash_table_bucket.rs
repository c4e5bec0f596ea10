use crate::common::config::BucketId;
use crate::common::exception::Result;
use log::trace;

/// Result of writing a pair into a bucket.
#[derive(Debug, PartialEq, Eq)]
pub enum UpsertOutcome<K, V> {
    /// The key was new and the pair now occupies a free slot.
    Inserted,
    /// The key was already present and its value was replaced.
    Updated,
    /// The key was new but the bucket is full; the pair is handed back.
    Full(K, V),
}

/// A fixed-capacity container of key/value pairs that knows its own local depth.
///
/// Storage grows with the pairs actually held, doubling up to `max_size`, so an
/// empty bucket of a large-capacity table costs no entry storage.
#[derive(Debug)]
pub struct HashTableBucket<K, V> {
    bucket_id: BucketId,
    local_depth: u32,
    max_size: usize,
    entries: Vec<(K, V)>,
}

impl<K: Eq, V> HashTableBucket<K, V> {
    /// Creates an empty bucket that may hold up to `max_size` pairs.
    pub fn new(bucket_id: BucketId, local_depth: u32, max_size: usize) -> Self {
        Self {
            bucket_id,
            local_depth,
            max_size,
            entries: Vec::new(),
        }
    }

    /// Reserves room for `additional` more pairs without exceeding `max_size`.
    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        let room = self.max_size.saturating_sub(self.entries.len());
        self.entries.try_reserve_exact(additional.min(room))?;
        Ok(())
    }

    /// Inserts the pair, overwriting the value in place if the key exists.
    ///
    /// # Returns
    /// `ResourceExhausted` if the entry storage cannot grow; the bucket is
    /// unchanged in that case.
    pub fn upsert(&mut self, key: K, value: V) -> Result<UpsertOutcome<K, V>> {
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
            return Ok(UpsertOutcome::Updated);
        }

        if self.is_full() {
            trace!("Bucket {} is full ({} pairs)", self.bucket_id, self.max_size);
            return Ok(UpsertOutcome::Full(key, value));
        }

        if self.entries.len() == self.entries.capacity() {
            self.reserve(self.entries.len().max(1))?;
        }
        self.entries.push((key, value));
        Ok(UpsertOutcome::Inserted)
    }

    pub fn lookup(&self, key: &K) -> Option<&V> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn remove(&mut self, key: &K) -> bool {
        if let Some(pos) = self.entries.iter().position(|(k, _)| k == key) {
            self.entries.swap_remove(pos);
            true
        } else {
            false
        }
    }

    /// Moves every pair whose key satisfies `should_move` into `sibling`.
    ///
    /// Room for the moved pairs must already be reserved in `sibling`.
    ///
    /// # Returns
    /// The number of pairs moved.
    pub fn migrate_entries<F>(&mut self, sibling: &mut Self, should_move: F) -> usize
    where
        F: Fn(&K) -> bool,
    {
        let mut moved = 0;
        let mut i = 0;
        while i < self.entries.len() {
            if should_move(&self.entries[i].0) {
                let pair = self.entries.swap_remove(i);
                sibling.entries.push(pair);
                moved += 1;
            } else {
                i += 1;
            }
        }
        moved
    }
}

impl<K, V> HashTableBucket<K, V> {
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.max_size
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get_size(&self) -> usize {
        self.entries.len()
    }

    pub fn get_bucket_id(&self) -> BucketId {
        self.bucket_id
    }

    pub fn get_local_depth(&self) -> u32 {
        self.local_depth
    }

    pub fn set_local_depth(&mut self, depth: u32) {
        self.local_depth = depth;
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn entries(&self) -> &[(K, V)] {
        &self.entries
    }
}
