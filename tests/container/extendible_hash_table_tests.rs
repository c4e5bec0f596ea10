use std::collections::HashMap;

use ehtable::common::config::ExtendibleHashTableConfig;
use ehtable::common::exception::HashTableError;
use ehtable::container::extendible_hash_table::{ExtendibleHashTable, PageTable};
use ehtable::container::hash_function::IdentityHasher;
use ehtable::container::hash_table::HashTable;
use rand::Rng;

use crate::common::logger::init_test_logger;
use crate::{assert_err, assert_ok};

fn identity_table(bucket_size: usize) -> ExtendibleHashTable<u64, String, IdentityHasher> {
    let config = ExtendibleHashTableConfig::default().with_bucket_size(bucket_size);
    assert_ok!(ExtendibleHashTable::with_hasher(config, IdentityHasher))
}

/// Checks that each bucket is named by exactly 2^(global - local) slots.
fn assert_depth_invariant<V>(table: &ExtendibleHashTable<u64, V, IdentityHasher>) {
    let global = table.get_global_depth();
    for id in table.bucket_ids() {
        let local = assert_ok!(table.get_local_depth(id));
        assert!(local <= global, "bucket {} depth {} > {}", id, local, global);
    }
    assert_ok!(table.verify_integrity());
}

#[test]
fn test_sample() {
    init_test_logger();
    let table = identity_table(2);

    // insert several key/value pairs
    for i in 1..=9u64 {
        assert_ok!(table.insert(i, format!("{}", (b'a' + (i - 1) as u8) as char)));
    }

    assert_eq!(table.get_local_depth(0), Ok(2));
    assert_eq!(table.get_local_depth(1), Ok(3));
    assert_eq!(table.get_local_depth(2), Ok(2));
    assert_eq!(table.get_local_depth(3), Ok(2));
    assert_eq!(table.get_global_depth(), 3);
    assert_eq!(table.get_num_buckets(), 5);
    assert_eq!(table.size(), 9);

    // find test
    assert_eq!(table.find(&9), Some("i".to_string()));
    assert_eq!(table.find(&8), Some("h".to_string()));
    assert_eq!(table.find(&2), Some("b".to_string()));
    assert_eq!(table.find(&10), None);

    // delete test
    assert!(table.remove(&8));
    assert!(table.remove(&4));
    assert!(table.remove(&1));
    assert!(!table.remove(&20));
    assert_eq!(table.size(), 6);
    assert_depth_invariant(&table);
}

#[test]
fn test_overwrite_keeps_count() {
    let table = identity_table(2);
    assert_ok!(table.insert(5, "v1".to_string()));
    assert_ok!(table.insert(5, "v2".to_string()));

    assert_eq!(table.find(&5), Some("v2".to_string()));
    assert_eq!(table.size(), 1);
}

#[test]
fn test_remove_then_find() {
    let table = identity_table(3);
    for k in 0..20u64 {
        assert_ok!(table.insert(k, k.to_string()));
    }

    let before = table.size();
    assert!(table.remove(&7));
    assert_eq!(table.size(), before - 1);
    assert_eq!(table.find(&7), None);
    assert!(!table.remove(&7));
    assert_eq!(table.size(), before - 1);
}

#[test]
fn test_concrete_split() {
    let table = identity_table(2);
    assert_ok!(table.insert(0b00, "a".to_string()));
    assert_ok!(table.insert(0b01, "b".to_string()));
    assert_eq!(table.get_global_depth(), 0);
    assert_eq!(table.get_num_buckets(), 1);

    assert_ok!(table.insert(0b10, "c".to_string()));

    assert_eq!(table.get_global_depth(), 1);
    assert_eq!(table.get_num_buckets(), 2);
    assert_eq!(table.bucket_ids(), vec![0, 1]);
    assert_eq!(table.get_local_depth(0), Ok(1));
    assert_eq!(table.get_local_depth(1), Ok(1));
    assert_depth_invariant(&table);
}

#[test]
fn test_no_shrink_on_delete() {
    let table = identity_table(2);
    let mut rng = rand::rng();
    let keys: Vec<u64> = (0..500).map(|_| rng.random_range(0..1_000_000)).collect();
    for &k in &keys {
        assert_ok!(table.insert(k, k.to_string()));
    }

    let mut depth = table.get_global_depth();
    let mut buckets = table.get_num_buckets();
    for &k in &keys {
        table.remove(&k);
        assert!(table.get_global_depth() >= depth);
        assert!(table.get_num_buckets() >= buckets);
        depth = table.get_global_depth();
        buckets = table.get_num_buckets();
    }

    assert!(table.is_empty());
    assert_depth_invariant(&table);
}

#[test]
fn test_random_workload_matches_model() {
    init_test_logger();
    let table = assert_ok!(PageTable::new(4));
    let mut model: HashMap<u64, u64> = HashMap::new();
    let mut rng = rand::rng();

    for _ in 0..5_000 {
        let key = rng.random_range(0..2_000u64);
        match rng.random_range(0..3) {
            0 | 1 => {
                let value = rng.random::<u64>();
                assert_ok!(table.insert(key, value));
                model.insert(key, value);
            }
            _ => {
                assert_eq!(table.remove(&key), model.remove(&key).is_some());
            }
        }
    }

    assert_eq!(table.size(), model.len());
    for (key, value) in &model {
        assert_eq!(table.find(key), Some(*value));
    }
    assert_ok!(table.verify_integrity());
}

#[test]
fn test_round_trip_many_keys() {
    let table = assert_ok!(ExtendibleHashTable::<String, String>::new(8));
    for i in 0..10_000 {
        assert_ok!(table.insert(format!("key{}", i), format!("value{}", i)));
    }

    assert_eq!(table.len(), 10_000);
    for i in 0..10_000 {
        assert_eq!(table.find(&format!("key{}", i)), Some(format!("value{}", i)));
    }
    for i in 10_000..10_100 {
        assert!(!table.contains(&format!("key{}", i)));
    }
    assert_ok!(table.verify_integrity());
}

#[test]
fn test_invalid_configuration() {
    assert_err!(PageTable::new(0));
    assert_err!(PageTable::with_config(
        ExtendibleHashTableConfig::default().with_max_depth(65)
    ));
}

#[test]
fn test_invalid_bucket_id() {
    let table = identity_table(1);
    assert_ok!(table.insert(0, "zero".to_string()));
    assert_ok!(table.insert(1, "one".to_string()));

    assert_eq!(table.get_num_buckets(), 2);
    assert_eq!(
        table.get_local_depth(2),
        Err(HashTableError::InvalidBucketId(2))
    );
}

#[test]
fn test_num_buckets_matches_directory() {
    let table = identity_table(3);
    let mut rng = rand::rng();
    for _ in 0..1_000 {
        let k = rng.random_range(0..u32::MAX as u64);
        assert_ok!(table.insert(k, String::new()));
        if k % 5 == 0 {
            table.remove(&k);
        }
    }
    assert_eq!(table.bucket_ids().len(), table.get_num_buckets());
    assert_depth_invariant(&table);
}

#[test]
fn test_page_table_through_trait() {
    fn load_page(page_table: &dyn HashTable<u64, u64>, page_id: u64, frame_id: u64) {
        assert_ok!(page_table.insert(page_id, frame_id));
    }

    let table = assert_ok!(PageTable::new(ehtable::common::config::BUCKET_SIZE));
    for page_id in 0..200u64 {
        load_page(&table, page_id, page_id % 16);
    }

    assert_eq!(table.find(&42), Some(42 % 16));
    assert!(table.remove(&42));
    assert_eq!(table.find(&42), None);
    table.print_ht();
}
