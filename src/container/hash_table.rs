use crate::common::exception::Result;

/// The lookup contract a buffer pool holds its page table to.
///
/// A missing key is not an error: `find` yields `None` and `remove` yields `false`.
pub trait HashTable<K, V> {
    fn find(&self, key: &K) -> Option<V>;
    fn remove(&self, key: &K) -> bool;
    fn insert(&self, key: K, value: V) -> Result<()>;
}
