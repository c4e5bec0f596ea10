use crate::common::exception::{HashTableError, Result};

pub type PageId = u64; // page id type
pub type FrameId = u64; // frame id type
pub type BucketId = usize; // bucket id type

pub const BUCKET_SIZE: usize = 50; // size of extendible hash bucket

/// Default cap on the global depth of an extendible hash directory.
pub const HTABLE_DIRECTORY_MAX_DEPTH: u32 = 32;

/// Width of the key hash; no directory can address more bits than this.
pub const HASH_BITS: u32 = u64::BITS;

/// Construction parameters for an extendible hash table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExtendibleHashTableConfig {
    /// Maximum number of pairs a single bucket may hold.
    pub bucket_size: usize,
    /// Largest global depth the directory may grow to.
    pub max_depth: u32,
}

impl Default for ExtendibleHashTableConfig {
    fn default() -> Self {
        Self {
            bucket_size: BUCKET_SIZE,
            max_depth: HTABLE_DIRECTORY_MAX_DEPTH,
        }
    }
}

impl ExtendibleHashTableConfig {
    pub fn with_bucket_size(mut self, bucket_size: usize) -> Self {
        self.bucket_size = bucket_size;
        self
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Rejects configurations the table cannot be built with.
    ///
    /// # Returns
    /// `InvalidConfiguration` if the bucket size is zero or the max depth
    /// exceeds the hash width.
    pub fn validate(&self) -> Result<()> {
        if self.bucket_size < 1 {
            return Err(HashTableError::InvalidConfiguration(format!(
                "bucket size must be at least 1, got {}",
                self.bucket_size
            )));
        }
        if self.max_depth > HASH_BITS {
            return Err(HashTableError::InvalidConfiguration(format!(
                "max depth {} exceeds hash width of {} bits",
                self.max_depth, HASH_BITS
            )));
        }
        Ok(())
    }
}
