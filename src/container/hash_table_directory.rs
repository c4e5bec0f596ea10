use crate::common::config::{BucketId, HASH_BITS};
use crate::common::exception::{HashTableError, Result};
use log::debug;
use std::collections::HashMap;

/// Returns a mask with the low `depth` bits set.
pub fn depth_mask(depth: u32) -> u64 {
    if depth >= HASH_BITS {
        u64::MAX
    } else {
        (1u64 << depth) - 1
    }
}

/// The slot array of an extendible hash table.
///
/// Slot `i` names the bucket owning every hash whose low `global_depth` bits
/// equal `i`. A bucket with local depth `l` is named by `2^(global_depth - l)`
/// slots, all agreeing on their low `l` bits.
#[derive(Debug, Clone)]
pub struct HashTableDirectory {
    max_depth: u32,
    global_depth: u32,
    bucket_ids: Vec<BucketId>,
}

impl HashTableDirectory {
    /// Creates a depth-0 directory whose single slot names `bucket_id`.
    pub fn new(max_depth: u32, bucket_id: BucketId) -> Self {
        debug!(
            "New HashTableDirectory with max depth {} and initial bucket {}",
            max_depth, bucket_id
        );
        Self {
            max_depth,
            global_depth: 0,
            bucket_ids: vec![bucket_id],
        }
    }

    /// Returns the directory slot that the hash maps to.
    pub fn hash_to_bucket_index(&self, hash: u64) -> usize {
        (hash & self.get_global_depth_mask()) as usize
    }

    /// Returns a mask of global depth 1's and the rest 0's.
    pub fn get_global_depth_mask(&self) -> u64 {
        depth_mask(self.global_depth)
    }

    pub fn get_global_depth(&self) -> u32 {
        self.global_depth
    }

    pub fn size(&self) -> usize {
        self.bucket_ids.len()
    }

    pub fn get_bucket_id(&self, bucket_idx: usize) -> BucketId {
        self.bucket_ids[bucket_idx]
    }

    /// Reserves room for the directory to grow to `depth` without allocating.
    pub fn reserve_for_depth(&mut self, depth: u32) -> Result<()> {
        if depth <= self.global_depth {
            return Ok(());
        }
        let target = 1usize.checked_shl(depth).unwrap_or(usize::MAX);
        self.bucket_ids
            .try_reserve_exact(target.saturating_sub(self.bucket_ids.len()))?;
        Ok(())
    }

    /// Doubles the directory, pointing slot `i + 2^old_depth` at the same
    /// bucket as slot `i`.
    pub fn incr_global_depth(&mut self) -> Result<()> {
        assert!(
            self.global_depth < self.max_depth,
            "Cannot increase global depth past max_depth: {}",
            self.max_depth
        );

        let old_size = self.size();
        self.bucket_ids.try_reserve_exact(old_size)?;
        self.bucket_ids.extend_from_within(..old_size);
        self.global_depth += 1;

        debug!(
            "Global depth increased to {}. New size of the directory: {}",
            self.global_depth,
            self.size()
        );
        Ok(())
    }

    /// Repoints every slot naming `bucket_id` whose bit `split_bit` is set at
    /// `sibling_id`.
    ///
    /// # Returns
    /// The number of slots repointed.
    pub fn remap_split(&mut self, bucket_id: BucketId, sibling_id: BucketId, split_bit: u32) -> usize {
        let mut remapped = 0;
        for (idx, slot) in self.bucket_ids.iter_mut().enumerate() {
            if *slot == bucket_id && idx.checked_shr(split_bit).unwrap_or(0) & 1 == 1 {
                *slot = sibling_id;
                remapped += 1;
            }
        }
        remapped
    }

    /// Counts how many slots name each bucket.
    pub fn bucket_slot_counts(&self) -> HashMap<BucketId, usize> {
        let mut counts = HashMap::new();
        for &bucket_id in &self.bucket_ids {
            *counts.entry(bucket_id).or_insert(0) += 1;
        }
        counts
    }

    /// Checks the depth and pointer-count invariants of the directory.
    ///
    /// `local_depth_of` resolves a bucket id to its local depth, or `None` if
    /// the id names no live bucket.
    pub fn verify_integrity<F>(&self, local_depth_of: F) -> Result<()>
    where
        F: Fn(BucketId) -> Option<u32>,
    {
        let size = self.size();
        debug!("Verifying integrity of directory with size: {}", size);

        if self.global_depth > self.max_depth {
            return Err(violation(format!(
                "global depth {} exceeds max depth {}",
                self.global_depth, self.max_depth
            )));
        }
        if Some(size) != 1usize.checked_shl(self.global_depth) {
            return Err(violation(format!(
                "directory size {} does not match global depth {}",
                size, self.global_depth
            )));
        }

        // First slot seen for each bucket; the rest must agree on the low local-depth bits.
        let mut first_slot: HashMap<BucketId, usize> = HashMap::new();
        for (idx, &bucket_id) in self.bucket_ids.iter().enumerate() {
            let local_depth =
                local_depth_of(bucket_id).ok_or(HashTableError::InvalidBucketId(bucket_id))?;
            if local_depth > self.global_depth {
                return Err(violation(format!(
                    "local depth {} of bucket {} exceeds global depth {} at slot {}",
                    local_depth, bucket_id, self.global_depth, idx
                )));
            }
            let first = *first_slot.entry(bucket_id).or_insert(idx);
            let mask = depth_mask(local_depth) as usize;
            if first & mask != idx & mask {
                return Err(violation(format!(
                    "slots {} and {} name bucket {} but differ in the low {} bits",
                    first, idx, bucket_id, local_depth
                )));
            }
        }

        for (bucket_id, count) in self.bucket_slot_counts() {
            let local_depth =
                local_depth_of(bucket_id).ok_or(HashTableError::InvalidBucketId(bucket_id))?;
            let expected = 1usize << (self.global_depth - local_depth);
            if count != expected {
                return Err(violation(format!(
                    "bucket {} with local depth {} is named by {} slots, expected {}",
                    bucket_id, local_depth, count, expected
                )));
            }
        }

        Ok(())
    }
}

fn violation(message: String) -> HashTableError {
    HashTableError::IntegrityViolation(message)
}
