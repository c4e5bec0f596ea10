use crate::common::config::{BucketId, ExtendibleHashTableConfig, FrameId, PageId, HASH_BITS};
use crate::common::exception::{HashTableError, Result};
use crate::container::hash_function::{HashFunction, KeyHasher};
use crate::container::hash_table::HashTable;
use crate::container::hash_table_bucket::{HashTableBucket, UpsertOutcome};
use crate::container::hash_table_directory::{depth_mask, HashTableDirectory};
use log::{debug, info, trace, warn};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::fmt::Debug;

/// The buffer pool's page table: maps a buffered page to the frame holding it.
pub type PageTable = ExtendibleHashTable<PageId, FrameId>;

/// Directory and buckets, guarded together by the table latch.
///
/// Buckets live in an arena indexed by their id. A split keeps the overflowing
/// bucket in place and appends its sibling, so ids are never reused and every
/// arena entry is named by at least one directory slot.
struct TableState<K, V> {
    directory: HashTableDirectory,
    buckets: Vec<HashTableBucket<K, V>>,
    pair_count: usize,
}

/// An in-memory hash table that grows one bucket split at a time.
///
/// The directory is indexed by the low `global_depth` bits of a key's hash.
/// When a bucket overflows it splits on the next hash bit, doubling the
/// directory first if the bucket already uses every directory bit. Pairs are
/// never merged back, so depths and the bucket count only grow.
///
/// Every operation holds a single latch for its whole duration, so a split is
/// never observable half done.
pub struct ExtendibleHashTable<K, V, H = HashFunction<K>> {
    bucket_size: usize,
    max_depth: u32,
    hash_fn: H,
    latch: Mutex<TableState<K, V>>,
}

impl<K, V> ExtendibleHashTable<K, V, HashFunction<K>>
where
    K: Eq + 'static,
    HashFunction<K>: KeyHasher<K>,
{
    /// Creates a table with the default hash function and max depth.
    ///
    /// # Parameters
    /// - `bucket_size`: The number of pairs each bucket holds; must be at least 1.
    pub fn new(bucket_size: usize) -> Result<Self> {
        Self::with_config(ExtendibleHashTableConfig::default().with_bucket_size(bucket_size))
    }

    pub fn with_config(config: ExtendibleHashTableConfig) -> Result<Self> {
        Self::with_hasher(config, HashFunction::new())
    }
}

impl<K, V, H> ExtendibleHashTable<K, V, H>
where
    K: Eq,
    H: KeyHasher<K>,
{
    /// Creates a table that addresses its directory with `hash_fn`.
    ///
    /// # Returns
    /// `InvalidConfiguration` if `config` does not validate.
    pub fn with_hasher(config: ExtendibleHashTableConfig, hash_fn: H) -> Result<Self> {
        config.validate()?;
        let bucket = HashTableBucket::new(0, 0, config.bucket_size);
        info!(
            "Initializing ExtendibleHashTable with bucket size {} and max depth {}",
            config.bucket_size, config.max_depth
        );
        Ok(Self {
            bucket_size: config.bucket_size,
            max_depth: config.max_depth,
            hash_fn,
            latch: Mutex::new(TableState {
                directory: HashTableDirectory::new(config.max_depth, 0),
                buckets: vec![bucket],
                pair_count: 0,
            }),
        })
    }

    pub fn hash_key(&self, key: &K) -> u64 {
        self.hash_fn.hash_key(key)
    }

    /// Looks up the value stored for `key`.
    pub fn find(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        let hash = self.hash_key(key);
        let state = self.latch.lock();
        let bucket_id = state
            .directory
            .get_bucket_id(state.directory.hash_to_bucket_index(hash));
        let value = state.buckets[bucket_id].lookup(key).cloned();
        trace!("Find in bucket {}: hit = {}", bucket_id, value.is_some());
        value
    }

    pub fn contains(&self, key: &K) -> bool {
        let hash = self.hash_key(key);
        let state = self.latch.lock();
        let bucket_id = state
            .directory
            .get_bucket_id(state.directory.hash_to_bucket_index(hash));
        state.buckets[bucket_id].lookup(key).is_some()
    }

    /// Inserts the pair, overwriting the value if the key is already present.
    ///
    /// A full bucket is split, repeatedly if the incoming key still collides,
    /// until the pair fits.
    ///
    /// # Returns
    /// `DepthExhausted` if fitting the pair would grow the directory past its
    /// max depth, or `ResourceExhausted` if the split cannot allocate. In both
    /// cases the table is left exactly as it was.
    pub fn insert(&self, key: K, value: V) -> Result<()> {
        let hash = self.hash_key(&key);
        let mut state = self.latch.lock();
        let bucket_id = state
            .directory
            .get_bucket_id(state.directory.hash_to_bucket_index(hash));

        let (key, value) = match state.buckets[bucket_id].upsert(key, value)? {
            UpsertOutcome::Inserted => {
                state.pair_count += 1;
                trace!("Inserted into bucket {}", bucket_id);
                return Ok(());
            }
            UpsertOutcome::Updated => {
                trace!("Overwrote value in bucket {}", bucket_id);
                return Ok(());
            }
            UpsertOutcome::Full(key, value) => (key, value),
        };

        let local_depth = state.buckets[bucket_id].get_local_depth();
        let hashes: Vec<u64> = state.buckets[bucket_id]
            .keys()
            .map(|k| self.hash_key(k))
            .collect();
        let target_depth = self.required_local_depth(&hashes, local_depth, hash);
        if target_depth > self.max_depth {
            warn!(
                "Rejecting insert: bucket {} cannot split past max depth {}",
                bucket_id, self.max_depth
            );
            return Err(HashTableError::DepthExhausted {
                bucket_id,
                max_depth: self.max_depth,
            });
        }

        // Allocate everything the cascade needs before touching the structure.
        // Sibling `level` receives the colliding pairs carrying bit
        // `local_depth + level`, plus the incoming pair if it settles there.
        let levels = (target_depth - local_depth) as usize;
        let next_id = state.buckets.len();
        let pair_home = (0..levels)
            .rev()
            .find(|&level| hash & (1u64 << (local_depth + level as u32)) != 0);
        let mut siblings = Vec::new();
        siblings.try_reserve_exact(levels)?;
        for level in 0..levels {
            let split_depth = local_depth + level as u32;
            let split_bit = 1u64 << split_depth;
            let moving = hashes
                .iter()
                .filter(|&&h| (h ^ hash) & depth_mask(split_depth) == 0 && h & split_bit != 0)
                .count();
            let mut sibling =
                HashTableBucket::new(next_id + level, split_depth + 1, self.bucket_size);
            sibling.reserve(moving + usize::from(pair_home == Some(level)))?;
            siblings.push(sibling);
        }
        state.buckets.try_reserve_exact(levels)?;
        let directory_depth = target_depth.max(state.directory.get_global_depth());
        state.directory.reserve_for_depth(directory_depth)?;

        for sibling in siblings {
            let target_id = state
                .directory
                .get_bucket_id(state.directory.hash_to_bucket_index(hash));
            self.split_bucket(&mut state, target_id, sibling)?;
        }

        let target_id = state
            .directory
            .get_bucket_id(state.directory.hash_to_bucket_index(hash));
        match state.buckets[target_id].upsert(key, value)? {
            UpsertOutcome::Inserted => {
                state.pair_count += 1;
                trace!("Inserted into bucket {} after split", target_id);
                Ok(())
            }
            UpsertOutcome::Updated => Ok(()),
            UpsertOutcome::Full(_, _) => Err(HashTableError::IntegrityViolation(format!(
                "bucket {} still full after splitting to depth {}",
                target_id, target_depth
            ))),
        }
    }

    /// Removes `key` and its value.
    ///
    /// # Returns
    /// Whether a pair was removed. Buckets are never merged and the directory
    /// never shrinks.
    pub fn remove(&self, key: &K) -> bool {
        let hash = self.hash_key(key);
        let mut state = self.latch.lock();
        let bucket_id = state
            .directory
            .get_bucket_id(state.directory.hash_to_bucket_index(hash));
        let removed = state.buckets[bucket_id].remove(key);
        if removed {
            state.pair_count -= 1;
        }
        trace!("Remove from bucket {}: removed = {}", bucket_id, removed);
        removed
    }

    /// Returns the local depth the overflowing bucket must reach before the
    /// pair hashing to `hash` fits.
    ///
    /// Every pair in the bucket, whose hashes are `hashes`, already shares its
    /// low `local_depth` bits with `hash`; the answer is the first depth at
    /// which fewer than `bucket_size` of them still do. Returns a value above
    /// `max_depth` if no depth within the cap separates them.
    fn required_local_depth(&self, hashes: &[u64], local_depth: u32, hash: u64) -> u32 {
        let cap = self.max_depth.min(HASH_BITS);
        let mut depth = local_depth + 1;
        while depth <= cap {
            let mask = depth_mask(depth);
            let colliding = hashes.iter().filter(|&&h| (h ^ hash) & mask == 0).count();
            if colliding < self.bucket_size {
                return depth;
            }
            depth += 1;
        }
        depth
    }

    /// Splits `bucket_id` on its next hash bit, moving pairs with that bit set
    /// into `sibling`.
    fn split_bucket(
        &self,
        state: &mut TableState<K, V>,
        bucket_id: BucketId,
        mut sibling: HashTableBucket<K, V>,
    ) -> Result<()> {
        let old_depth = state.buckets[bucket_id].get_local_depth();
        if old_depth == state.directory.get_global_depth() {
            state.directory.incr_global_depth()?;
        }

        let sibling_id = sibling.get_bucket_id();
        debug_assert_eq!(sibling_id, state.buckets.len());
        debug_assert_eq!(sibling.get_local_depth(), old_depth + 1);

        let split_bit = 1u64 << old_depth;
        let bucket = &mut state.buckets[bucket_id];
        bucket.set_local_depth(old_depth + 1);
        let moved = bucket.migrate_entries(&mut sibling, |k| self.hash_key(k) & split_bit != 0);
        state.buckets.push(sibling);
        let remapped = state.directory.remap_split(bucket_id, sibling_id, old_depth);

        debug!(
            "Split bucket {} at depth {}: moved {} pairs and {} slots to bucket {}",
            bucket_id, old_depth, moved, remapped, sibling_id
        );
        Ok(())
    }

    /// Number of low hash bits the directory is indexed by.
    pub fn get_global_depth(&self) -> u32 {
        self.latch.lock().directory.get_global_depth()
    }

    /// Returns the local depth of a live bucket.
    ///
    /// # Returns
    /// `InvalidBucketId` if no live bucket has that id.
    pub fn get_local_depth(&self, bucket_id: BucketId) -> Result<u32> {
        self.latch
            .lock()
            .buckets
            .get(bucket_id)
            .map(|bucket| bucket.get_local_depth())
            .ok_or(HashTableError::InvalidBucketId(bucket_id))
    }

    pub fn get_num_buckets(&self) -> usize {
        self.latch.lock().buckets.len()
    }

    /// Total number of stored pairs.
    pub fn size(&self) -> usize {
        self.latch.lock().pair_count
    }

    pub fn len(&self) -> usize {
        self.size()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn bucket_size(&self) -> usize {
        self.bucket_size
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Distinct bucket ids named by the directory, in ascending order.
    pub fn bucket_ids(&self) -> Vec<BucketId> {
        let state = self.latch.lock();
        let ids: BTreeSet<BucketId> = (0..state.directory.size())
            .map(|idx| state.directory.get_bucket_id(idx))
            .collect();
        ids.into_iter().collect()
    }

    /// Checks every structural invariant of the table.
    ///
    /// # Returns
    /// `IntegrityViolation` describing the first broken invariant.
    pub fn verify_integrity(&self) -> Result<()> {
        let state = self.latch.lock();
        state
            .directory
            .verify_integrity(|id| state.buckets.get(id).map(|b| b.get_local_depth()))?;

        let live = state.directory.bucket_slot_counts().len();
        if live != state.buckets.len() {
            return Err(HashTableError::IntegrityViolation(format!(
                "directory names {} buckets but {} exist",
                live,
                state.buckets.len()
            )));
        }

        let mut total = 0;
        for bucket in &state.buckets {
            if bucket.get_size() > self.bucket_size {
                return Err(HashTableError::IntegrityViolation(format!(
                    "bucket {} holds {} pairs, capacity is {}",
                    bucket.get_bucket_id(),
                    bucket.get_size(),
                    self.bucket_size
                )));
            }
            for key in bucket.keys() {
                let slot = state.directory.hash_to_bucket_index(self.hash_key(key));
                if state.directory.get_bucket_id(slot) != bucket.get_bucket_id() {
                    return Err(HashTableError::IntegrityViolation(format!(
                        "bucket {} holds a key that addresses slot {} of bucket {}",
                        bucket.get_bucket_id(),
                        slot,
                        state.directory.get_bucket_id(slot)
                    )));
                }
            }
            total += bucket.get_size();
        }

        if total != state.pair_count {
            return Err(HashTableError::IntegrityViolation(format!(
                "buckets hold {} pairs but the table counts {}",
                total, state.pair_count
            )));
        }
        Ok(())
    }
}

impl<K, V, H> ExtendibleHashTable<K, V, H>
where
    K: Eq + Debug,
    V: Debug,
    H: KeyHasher<K>,
{
    /// Dumps the directory and bucket contents at debug level.
    pub fn print_ht(&self) {
        let state = self.latch.lock();
        debug!(
            "ExtendibleHashTable: global depth {}, {} buckets, {} pairs",
            state.directory.get_global_depth(),
            state.buckets.len(),
            state.pair_count
        );
        for idx in 0..state.directory.size() {
            let bucket = &state.buckets[state.directory.get_bucket_id(idx)];
            debug!(
                "  slot {:#b} -> bucket {} (local depth {})",
                idx,
                bucket.get_bucket_id(),
                bucket.get_local_depth()
            );
        }
        for bucket in &state.buckets {
            debug!(
                "  bucket {}: {:?}",
                bucket.get_bucket_id(),
                bucket.entries()
            );
        }
    }
}

impl<K, V, H> HashTable<K, V> for ExtendibleHashTable<K, V, H>
where
    K: Eq,
    V: Clone,
    H: KeyHasher<K>,
{
    fn find(&self, key: &K) -> Option<V> {
        ExtendibleHashTable::find(self, key)
    }

    fn remove(&self, key: &K) -> bool {
        ExtendibleHashTable::remove(self, key)
    }

    fn insert(&self, key: K, value: V) -> Result<()> {
        ExtendibleHashTable::insert(self, key, value)
    }
}
