//! Queue Module Tests
//!
//! ## Test Scopes
//! - **Types**: Action names, ids and payload serialization.
//! - **State Machine**: Validation, claim order, leases and terminal statuses.
//! - **Durability**: Journal replay.
//! - **End to End**: Items executed by the worker pool against an in-process cluster.

#[cfg(test)]
mod tests {
    use crate::cluster::LocalCluster;
    use crate::config::{ClusterConfig, CorpusConfig};
    use crate::document::types::DocumentId;
    use crate::error::ClusterError;
    use crate::queue::queue::Queue;
    use crate::queue::types::*;
    use crate::storage::journal::Journal;
    use std::net::SocketAddr;
    use std::path::PathBuf;
    use std::time::Duration;

    const PAYLOAD: &[u8] = b"title=Payload&text=PayloadWithsometextlongerthanwindowsize";
    const WAIT: Duration = Duration::from_secs(20);

    fn test_config(data_dir: Option<PathBuf>) -> ClusterConfig {
        let ephemeral = SocketAddr::from(([127, 0, 0, 1], 0));
        ClusterConfig {
            shards: vec![ephemeral, ephemeral],
            poll_interval: Duration::from_millis(10),
            data_dir,
            corpus: CorpusConfig {
                doctypes: 3,
                documents_per_doctype: 4,
                words_per_document: 20,
            },
            ..ClusterConfig::default()
        }
    }

    fn queue() -> Queue {
        Queue::in_memory(Duration::from_secs(30))
    }

    async fn add_item(queue: &Queue, docid: u32) -> QueueItem {
        queue
            .new_item(
                Action::AddDocument,
                None,
                Some(DocumentId::new(1, docid)),
                "",
                "",
                PAYLOAD,
            )
            .await
            .unwrap()
    }

    // ============================================================
    // TYPE TESTS
    // ============================================================

    #[test]
    fn test_action_names_parse() {
        assert_eq!("Add Document".parse::<Action>().unwrap(), Action::AddDocument);
        assert_eq!("DeleteDocument".parse::<Action>().unwrap(), Action::DeleteDocument);
        assert_eq!(
            "associate document".parse::<Action>().unwrap(),
            Action::AssociateDocument
        );
        assert_eq!("Test Corpus".parse::<Action>().unwrap(), Action::TestCorpus);

        match "test".parse::<Action>() {
            Err(ClusterError::Validation(message)) => assert!(message.contains("test")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_item_ids_are_24_hex_chars() {
        let id = QueueItemId::new();
        assert_eq!(id.0.len(), 24);
        assert!(QueueItemId::parse(&id.0).is_ok());
        assert_ne!(id, QueueItemId::new());

        assert!(QueueItemId::parse("not-an-id").is_err());
        assert!(QueueItemId::parse("ABCDEF0123456789abcdef01").is_err());
    }

    #[tokio::test]
    async fn test_payload_is_captured() {
        let queue = queue();
        let item = queue
            .new_item(
                Action::DeleteDocument,
                None,
                Some(DocumentId::new(1, 1)),
                "",
                "",
                &b"I am the payload"[..],
            )
            .await
            .unwrap();

        let stored = queue.get(&item.id).unwrap();
        assert_eq!(stored.payload_text(), "I am the payload");

        // JSON carries the payload as base64 and reads it back.
        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["payload"], "SSBhbSB0aGUgcGF5bG9hZA==");
        let decoded: QueueItem = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, stored);
    }

    // ============================================================
    // STATE MACHINE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_new_item_validation() {
        let queue = queue();

        let missing_target = queue
            .new_item(Action::AddDocument, None, None, "", "", &b""[..])
            .await;
        assert!(matches!(missing_target, Err(ClusterError::Validation(_))));

        let bad_range = queue
            .new_item(Action::AssociateDocument, None, None, "1", "x-2", &b""[..])
            .await;
        assert!(matches!(bad_range, Err(ClusterError::Validation(_))));

        assert!(queue.is_empty(), "rejected items are never stored");

        let corpus = queue
            .new_item(Action::TestCorpus, None, None, "", "", &b""[..])
            .await
            .unwrap();
        assert_eq!(corpus.status, QueueStatus::Queued);
    }

    #[tokio::test]
    async fn test_claims_are_fifo_and_exclusive() {
        let queue = queue();
        let first = add_item(&queue, 1).await;
        let second = add_item(&queue, 2).await;

        let claimed = queue.claim_next().unwrap().unwrap();
        assert_eq!(claimed.id, first.id);
        assert_eq!(claimed.status, QueueStatus::InProgress);
        assert!(claimed.lease_expires.is_some());

        // Already claimed: a second claim loses.
        assert!(queue.try_claim(&first.id).unwrap().is_none());
        assert_eq!(queue.claim_next().unwrap().unwrap().id, second.id);
        assert!(queue.claim_next().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_lease_can_be_reclaimed() {
        let queue = Queue::in_memory(Duration::from_millis(1));
        let item = add_item(&queue, 1).await;

        queue.try_claim(&item.id).unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(queue.claimable(), vec![item.id.clone()]);
        assert!(queue.try_claim(&item.id).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_terminal_status_is_final() {
        // ARRANGE
        let queue = queue();
        let item = add_item(&queue, 1).await;
        queue.try_claim(&item.id).unwrap().unwrap();

        // ACT
        let done = queue
            .complete(&item.id, Ok(Some("/document/1/1/".into())))
            .unwrap();

        // ASSERT
        assert_eq!(done.status, QueueStatus::Completed);
        assert_eq!(done.location.as_deref(), Some("/document/1/1/"));
        assert!(done.completed_at.is_some());

        assert!(matches!(
            queue.complete(&item.id, Err(ClusterError::Validation("late".into()))),
            Err(ClusterError::InvalidTransition { .. })
        ));
        assert!(queue.renew_lease(&item.id).is_err());
        assert!(queue.try_claim(&item.id).unwrap().is_none());
        assert_eq!(queue.get(&item.id).unwrap().status, QueueStatus::Completed);
    }

    #[tokio::test]
    async fn test_failed_items_keep_their_error() {
        let queue = queue();
        let item = add_item(&queue, 1).await;
        queue.try_claim(&item.id).unwrap().unwrap();

        let failed = queue
            .complete(
                &item.id,
                Err(ClusterError::ShardTransport {
                    shard: 1,
                    message: "connection refused".into(),
                }),
            )
            .unwrap();

        assert_eq!(failed.status, QueueStatus::Failed);
        assert!(failed.error.unwrap().contains("connection refused"));
        assert!(queue.claimable().is_empty(), "failed items are not retried");
    }

    #[tokio::test]
    async fn test_stats_cover_every_status() {
        let queue = queue();
        assert_eq!(queue.stats(), QueueStats::empty());
        assert_eq!(queue.stats().0.len(), 4);

        for docid in 1..=5 {
            add_item(&queue, docid).await;
        }
        let claimed = queue.claim_next().unwrap().unwrap();
        queue.complete(&claimed.id, Ok(None)).unwrap();
        queue.claim_next().unwrap().unwrap();

        let stats = queue.stats();
        assert_eq!(stats.total(), 5);
        assert_eq!(stats.get(QueueStatus::Queued), 3);
        assert_eq!(stats.get(QueueStatus::InProgress), 1);
        assert_eq!(stats.get(QueueStatus::Completed), 1);
        assert_eq!(stats.get(QueueStatus::Failed), 0);
    }

    #[tokio::test]
    async fn test_list_filters_and_pages() {
        let queue = queue();
        for docid in 1..=6 {
            add_item(&queue, docid).await;
        }
        let claimed = queue.claim_next().unwrap().unwrap();
        queue.complete(&claimed.id, Ok(None)).unwrap();

        let page = queue.list(&QueueFilter {
            start: 1,
            limit: 2,
            status: None,
        });
        assert_eq!(page.total_rows, 6);
        let sequences: Vec<u64> = page.items.iter().map(|i| i.sequence).collect();
        assert_eq!(sequences, vec![2, 3]);

        let queued = queue.list(&QueueFilter {
            status: Some(QueueStatus::Queued),
            ..QueueFilter::default()
        });
        assert_eq!(queued.total_rows, 5);
    }

    #[tokio::test]
    async fn test_terminal_items_leave_the_pending_index() {
        let queue = queue();
        let items = [
            add_item(&queue, 1).await,
            add_item(&queue, 2).await,
            add_item(&queue, 3).await,
        ];
        assert_eq!(queue.pending_count(), 3);

        let claimed = queue.claim_next().unwrap().unwrap();
        assert_eq!(queue.pending_count(), 3, "in progress items stay pending");
        queue.complete(&claimed.id, Ok(None)).unwrap();

        let claimed = queue.claim_next().unwrap().unwrap();
        queue
            .complete(&claimed.id, Err(ClusterError::Validation("bad".into())))
            .unwrap();

        assert_eq!(queue.pending_count(), 1);
        assert_eq!(queue.claimable(), vec![items[2].id.clone()]);
        assert_eq!(queue.len(), 3, "terminal items stay readable");
    }

    // /dev/full accepts the open and fails every write.
    #[cfg(target_os = "linux")]
    fn failing_journal() -> Journal<QueueItem> {
        Journal::open("/dev/full").unwrap().0
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_unjournaled_transitions_leave_memory_unchanged() {
        // ARRANGE: one item in progress, one queued, then the journal breaks
        let mut queue = queue();
        let running = add_item(&queue, 1).await;
        let waiting = add_item(&queue, 2).await;
        let claimed = queue.try_claim(&running.id).unwrap().unwrap();
        queue.attach_journal(failing_journal());

        // ACT + ASSERT: every transition errors and memory keeps the old state
        assert!(matches!(
            queue.complete(&running.id, Ok(None)),
            Err(ClusterError::Io(_))
        ));
        assert!(queue.renew_lease(&running.id).is_err());
        assert!(queue.try_claim(&waiting.id).is_err());

        let still_running = queue.get(&running.id).unwrap();
        assert_eq!(still_running.status, QueueStatus::InProgress);
        assert_eq!(still_running.lease_expires, claimed.lease_expires);
        assert!(still_running.completed_at.is_none());
        assert_eq!(queue.get(&waiting.id).unwrap().status, QueueStatus::Queued);
        assert_eq!(queue.pending_count(), 2);
    }

    // ============================================================
    // DURABILITY TESTS
    // ============================================================

    #[tokio::test]
    async fn test_queue_recovers_from_journal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.journal");
        let lease = Duration::from_secs(30);

        let (done_id, waiting_id) = {
            let queue = Queue::open(Some(&path), lease).unwrap();
            let done = add_item(&queue, 1).await;
            let waiting = add_item(&queue, 2).await;
            queue.try_claim(&done.id).unwrap().unwrap();
            queue.complete(&done.id, Ok(Some("/document/1/1/".into()))).unwrap();
            (done.id, waiting.id)
        };

        let queue = Queue::open(Some(&path), lease).unwrap();
        assert_eq!(queue.len(), 2);
        let done = queue.get(&done_id).unwrap();
        assert_eq!(done.status, QueueStatus::Completed);
        assert_eq!(done.location.as_deref(), Some("/document/1/1/"));
        assert_eq!(queue.get(&waiting_id).unwrap().status, QueueStatus::Queued);
        assert_eq!(queue.claimable(), vec![waiting_id.clone()]);
        assert_eq!(queue.pending_count(), 1);

        // Sequence numbers continue after the recovered items.
        let next = add_item(&queue, 3).await;
        assert_eq!(next.sequence, 3);
    }

    // ============================================================
    // END TO END TESTS
    // ============================================================

    #[tokio::test]
    async fn test_add_then_delete_twenty_documents() {
        let cluster = LocalCluster::start(test_config(None)).await.unwrap();
        let queue = cluster.queue.clone();

        let mut adds = Vec::new();
        for docid in 1..=20 {
            adds.push(add_item(&queue, docid).await);
        }
        let stats = queue.wait_idle(WAIT).await.unwrap();
        assert_eq!(stats.get(QueueStatus::Completed), 20);
        assert_eq!(cluster.context.documents.count(), 20);

        let first = queue.get(&adds[0].id).unwrap();
        assert_eq!(first.location.as_deref(), Some("/document/1/1/"));

        for docid in 1..=20 {
            queue
                .new_item(
                    Action::DeleteDocument,
                    None,
                    Some(DocumentId::new(1, docid)),
                    "",
                    "",
                    &b""[..],
                )
                .await
                .unwrap();
        }
        let stats = queue.wait_idle(WAIT).await.unwrap();
        assert_eq!(stats.get(QueueStatus::Completed), 40);
        assert_eq!(stats.total(), 40);
        assert_eq!(cluster.context.documents.count(), 0);
        for shard in &cluster.shards {
            assert_eq!(shard.row_count().await, 0);
        }

        cluster.shutdown().await;
    }

    #[tokio::test]
    async fn test_delete_of_absent_document_completes() {
        let cluster = LocalCluster::start(test_config(None)).await.unwrap();

        let item = cluster
            .queue
            .new_item(
                Action::DeleteDocument,
                None,
                Some(DocumentId::new(7, 7)),
                "",
                "",
                &b""[..],
            )
            .await
            .unwrap();
        let done = cluster.queue.wait_for(&item.id, WAIT).await.unwrap();
        assert_eq!(done.status, QueueStatus::Completed);

        cluster.shutdown().await;
    }

    #[tokio::test]
    async fn test_corpus_then_association() {
        let cluster = LocalCluster::start(test_config(None)).await.unwrap();
        let queue = cluster.queue.clone();

        let corpus = queue
            .new_item(Action::TestCorpus, None, None, "", "", &b""[..])
            .await
            .unwrap();
        let corpus = queue.wait_for(&corpus.id, WAIT).await.unwrap();
        assert_eq!(corpus.status, QueueStatus::Completed, "{:?}", corpus.error);
        assert_eq!(cluster.context.documents.count(), 12);

        let associate = queue
            .new_item(Action::AssociateDocument, None, None, "1", "2-10", &b""[..])
            .await
            .unwrap();
        let associate = queue.wait_for(&associate.id, WAIT).await.unwrap();
        assert_eq!(associate.status, QueueStatus::Completed, "{:?}", associate.error);

        cluster.shutdown().await;
    }

    #[tokio::test]
    async fn test_bad_payload_fails_only_its_item() {
        let cluster = LocalCluster::start(test_config(None)).await.unwrap();
        let queue = cluster.queue.clone();

        let bad = queue
            .new_item(
                Action::AddDocument,
                None,
                Some(DocumentId::new(1, 1)),
                "",
                "",
                &b"title=a&title=b"[..],
            )
            .await
            .unwrap();
        let good = add_item(&queue, 2).await;

        let bad = queue.wait_for(&bad.id, WAIT).await.unwrap();
        let good = queue.wait_for(&good.id, WAIT).await.unwrap();
        assert_eq!(bad.status, QueueStatus::Failed);
        assert!(bad.error.is_some());
        assert_eq!(good.status, QueueStatus::Completed);

        cluster.shutdown().await;
    }

    #[tokio::test]
    async fn test_cluster_restart_restores_state() {
        let dir = tempfile::tempdir().unwrap();

        {
            let cluster = LocalCluster::start(test_config(Some(dir.path().to_path_buf())))
                .await
                .unwrap();
            add_item(&cluster.queue, 1).await;
            cluster.queue.wait_idle(WAIT).await.unwrap();
            cluster.shutdown().await;
        }

        let cluster = LocalCluster::start(test_config(Some(dir.path().to_path_buf())))
            .await
            .unwrap();
        assert_eq!(cluster.queue.stats().get(QueueStatus::Completed), 1);
        assert_eq!(cluster.context.documents.count(), 1);

        let mut rows = 0;
        for shard in &cluster.shards {
            rows += shard.row_count().await;
        }
        assert_eq!(rows, 24);

        cluster.shutdown().await;
    }
}
