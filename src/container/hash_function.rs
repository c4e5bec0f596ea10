use std::any::Any;
use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use xxhash_rust::xxh3;

/// Maps a key to the unsigned hash whose low-order bits address the directory.
pub trait KeyHasher<K>: Send + Sync {
    fn hash_key(&self, key: &K) -> u64;
}

/// Represents a hash function for a given key type.
///
/// Uses xxh3 with no random seed, so a key hashes to the same value in every run.
pub struct HashFunction<K> {
    _marker: PhantomData<fn(&K)>,
}

impl<K> HashFunction<K> {
    /// Creates a new `HashFunction`.
    ///
    /// # Returns
    /// A new `HashFunction` instance.
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<K> Default for HashFunction<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Clone for HashFunction<K> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<K> Debug for HashFunction<K> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("HashFunction(xxh3)")
    }
}

impl<K> HashFunction<K>
where
    K: Any + Hash + 'static,
{
    /// Returns the hash value of the given key.
    ///
    /// # Parameters
    /// - `key`: The key to be hashed.
    ///
    /// # Returns
    /// The hashed value.
    pub fn get_hash(&self, key: &K) -> u64 {
        let mut hasher = xxh3::Xxh3::new();
        let any = key as &dyn Any;

        if let Some(v) = any.downcast_ref::<u64>() {
            hasher.write_u64(*v);
        } else if let Some(v) = any.downcast_ref::<i64>() {
            hasher.write_i64(*v);
        } else if let Some(v) = any.downcast_ref::<u32>() {
            hasher.write_u32(*v);
        } else if let Some(v) = any.downcast_ref::<i32>() {
            hasher.write_i32(*v);
        } else if let Some(v) = any.downcast_ref::<String>() {
            hasher.write(v.as_bytes());
        } else if let Some(v) = any.downcast_ref::<&str>() {
            hasher.write(v.as_bytes());
        } else {
            // Fallback for types that implement `Hash`
            key.hash(&mut hasher);
        }

        hasher.finish()
    }
}

impl<K> KeyHasher<K> for HashFunction<K>
where
    K: Any + Hash + 'static,
{
    fn hash_key(&self, key: &K) -> u64 {
        self.get_hash(key)
    }
}

/// Uses an integer key as its own hash.
///
/// Suited to keys that are already well distributed in their low bits, and to
/// tests that need to place keys in specific directory slots.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityHasher;

impl<K> KeyHasher<K> for IdentityHasher
where
    K: Copy + Into<u64>,
{
    fn hash_key(&self, key: &K) -> u64 {
        (*key).into()
    }
}
