//! Storage Module Tests
//!
//! Validates bucket ownership and journal durability.
//!
//! ## Test Scopes
//! - **Partitioner**: Ensures every hash has exactly one owner and buckets spread across shards.
//! - **Journal**: Verifies append/replay ordering, torn-tail recovery and rewrites.

#[cfg(test)]
mod tests {
    use crate::storage::journal::Journal;
    use crate::storage::partitioner::ShardPartitioner;
    use serde::{Deserialize, Serialize};
    use std::io::Write;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct TestRecord {
        id: u32,
        name: String,
    }

    fn record(id: u32) -> TestRecord {
        TestRecord {
            id,
            name: format!("record-{}", id),
        }
    }

    // ============================================================
    // PARTITIONER TESTS
    // ============================================================

    #[test]
    fn test_every_hash_has_exactly_one_owner() {
        let shards: Vec<ShardPartitioner> = (0..3).map(|i| ShardPartitioner::new(i, 3)).collect();

        for hash in [0u64, 1, 2, 3, 17, u64::MAX, 0x1234_5678_9abc_def0] {
            let owners = shards.iter().filter(|p| p.owns(hash)).count();
            assert_eq!(owners, 1, "hash {} should have one owner", hash);
        }
    }

    #[test]
    fn test_partition_distribution() {
        let partitioner = ShardPartitioner::new(0, 4);
        let mut counts = [0usize; 4];

        for i in 0..10_000u64 {
            let hash = xxhash_rust::xxh3::xxh3_64(format!("window_{}", i).as_bytes());
            counts[partitioner.owner_of(hash)] += 1;
        }

        // Each shard should get roughly a quarter of the buckets.
        for count in counts {
            assert!(count > 2_000, "uneven distribution: {:?}", counts);
        }
    }

    #[test]
    fn test_owned_filters_foreign_hashes() {
        let partitioner = ShardPartitioner::new(1, 2);
        let owned = partitioner.owned(&[1, 2, 3, 4, 5]);
        assert_eq!(owned, vec![1, 3, 5]);
    }

    #[test]
    fn test_single_shard_owns_everything() {
        let partitioner = ShardPartitioner::new(0, 0);
        assert_eq!(partitioner.count(), 1);
        assert!(partitioner.owns(42));
    }

    // ============================================================
    // JOURNAL TESTS
    // ============================================================

    #[test]
    fn test_journal_replays_in_append_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.journal");

        {
            let (journal, existing) = Journal::<TestRecord>::open(&path).unwrap();
            assert!(existing.is_empty());
            for id in 1..=5 {
                journal.append(&record(id)).unwrap();
            }
        }

        let (_journal, replayed) = Journal::<TestRecord>::open(&path).unwrap();
        let ids: Vec<u32> = replayed.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_journal_ignores_torn_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("torn.journal");

        {
            let (journal, _) = Journal::<TestRecord>::open(&path).unwrap();
            journal.append(&record(1)).unwrap();
            journal.append(&record(2)).unwrap();
        }

        // Simulate a crash halfway through writing a third record.
        {
            let mut file = std::fs::OpenOptions::new()
                .append(true)
                .open(&path)
                .unwrap();
            file.write_all(&100u32.to_le_bytes()).unwrap();
            file.write_all(&[1, 2, 3]).unwrap();
        }

        let replayed = Journal::<TestRecord>::replay(&path).unwrap();
        assert_eq!(replayed, vec![record(1), record(2)]);
    }

    #[test]
    fn test_journal_rewrite_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rewrite.journal");

        let (journal, _) = Journal::<TestRecord>::open(&path).unwrap();
        for id in 1..=10 {
            journal.append(&record(id)).unwrap();
        }
        journal.rewrite(&[record(7)]).unwrap();
        journal.append(&record(8)).unwrap();

        let replayed = Journal::<TestRecord>::replay(&path).unwrap();
        assert_eq!(replayed, vec![record(7), record(8)]);
    }

    #[test]
    fn test_missing_journal_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let replayed = Journal::<TestRecord>::replay(&dir.path().join("absent.journal")).unwrap();
        assert!(replayed.is_empty());
    }
}
