pub mod common;
pub mod container;

pub use common::config::ExtendibleHashTableConfig;
pub use common::exception::{HashTableError, Result};
pub use container::extendible_hash_table::{ExtendibleHashTable, PageTable};
pub use container::hash_function::{HashFunction, IdentityHasher, KeyHasher};
pub use container::hash_table::HashTable;
