//! Tests for the group aggregator
//!
//! Most timing tests run on tokio's paused clock, so every sleep advances virtual
//! time deterministically. Tests that block a worker or race tasks use the real clock.

#[cfg(test)]
mod tests {
    use crate::{
        aggregator::{Continuation, GroupAggregator},
        Delivery, GroupKey, GroupedItem, Item, ItemKind,
    };
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::{mpsc, oneshot};
    use tokio::time::{sleep, Instant};

    type Received = (u64, Delivery, Instant);

    /// Helper function to create a grouped photo item
    fn grouped(source_id: i64, group_id: &str, sequence: u64) -> GroupedItem {
        Item::new(source_id, sequence, ItemKind::Photo)
            .with_group(group_id)
            .into_grouped()
            .unwrap()
    }

    /// Continuation that reports its item's sequence number, delivery and firing time
    fn recording(tx: &mpsc::UnboundedSender<Received>, sequence: u64) -> Continuation {
        let tx = tx.clone();
        Box::new(move |delivery| {
            let _ = tx.send((sequence, delivery, Instant::now()));
        })
    }

    fn sequences(delivery: &Delivery) -> Vec<u64> {
        delivery
            .batch()
            .unwrap()
            .iter()
            .map(|item| item.sequence)
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_lower_sequence_triggers_sorted_batch() {
        let aggregator = GroupAggregator::new(Duration::from_millis(1000));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let start = Instant::now();

        aggregator.observe(grouped(1, "g", 2), recording(&tx, 2));
        sleep(Duration::from_millis(200)).await;
        aggregator.observe(grouped(1, "g", 1), recording(&tx, 1));

        // t = 1199: window restarted at t = 200, nothing may fire yet
        sleep(Duration::from_millis(999)).await;
        assert!(rx.try_recv().is_err());

        sleep(Duration::from_millis(100)).await;
        let (sequence, delivery, fired_at) = rx.try_recv().unwrap();
        assert_eq!(sequence, 1);
        assert_eq!(delivery.item.sequence, 1);
        assert_eq!(sequences(&delivery), vec![1, 2]);

        let elapsed = fired_at.duration_since(start);
        assert!(elapsed >= Duration::from_millis(1200));
        assert!(elapsed < Duration::from_millis(1210));

        // the seq=2 continuation never fires
        sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_groups_arriving_together_finalize_independently() {
        let aggregator = GroupAggregator::new(Duration::from_millis(500));
        let (tx, mut rx) = mpsc::unbounded_channel();

        aggregator.observe(grouped(1, "g1", 10), recording(&tx, 10));
        aggregator.observe(grouped(1, "g2", 20), recording(&tx, 20));
        assert_eq!(aggregator.pending_groups(), 2);

        sleep(Duration::from_millis(510)).await;

        let mut deliveries = vec![rx.try_recv().unwrap(), rx.try_recv().unwrap()];
        deliveries.sort_by_key(|(sequence, _, _)| *sequence);
        assert!(rx.try_recv().is_err());

        assert_eq!(deliveries[0].0, 10);
        assert_eq!(sequences(&deliveries[0].1), vec![10]);
        assert_eq!(deliveries[0].1.item.group_id.as_deref(), Some("g1"));

        assert_eq!(deliveries[1].0, 20);
        assert_eq!(sequences(&deliveries[1].1), vec![20]);
        assert_eq!(deliveries[1].1.item.group_id.as_deref(), Some("g2"));

        assert_eq!(aggregator.pending_groups(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_group_id_in_different_sources_is_isolated() {
        let aggregator = GroupAggregator::new(Duration::from_millis(300));
        let (tx, mut rx) = mpsc::unbounded_channel();

        aggregator.observe(grouped(1, "album", 1), recording(&tx, 1));
        aggregator.observe(grouped(2, "album", 2), recording(&tx, 2));
        aggregator.observe(grouped(1, "album", 3), recording(&tx, 3));

        sleep(Duration::from_millis(310)).await;

        let mut deliveries = vec![rx.try_recv().unwrap(), rx.try_recv().unwrap()];
        deliveries.sort_by_key(|(sequence, _, _)| *sequence);
        assert!(rx.try_recv().is_err());

        assert_eq!(deliveries[0].0, 2);
        assert_eq!(sequences(&deliveries[0].1), vec![2]);
        assert_eq!(deliveries[1].0, 3);
        assert_eq!(sequences(&deliveries[1].1), vec![1, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_supersedes_deliver_once_to_last_item() {
        let aggregator = GroupAggregator::new(Duration::from_millis(300));
        let (tx, mut rx) = mpsc::unbounded_channel();

        for sequence in [4, 2, 5, 1, 3] {
            aggregator.observe(grouped(7, "burst", sequence), recording(&tx, sequence));
            sleep(Duration::from_millis(100)).await;
        }
        assert!(rx.try_recv().is_err());

        sleep(Duration::from_millis(250)).await;
        let (sequence, delivery, _) = rx.try_recv().unwrap();
        assert_eq!(sequence, 3);
        assert_eq!(sequences(&delivery), vec![1, 2, 3, 4, 5]);

        sleep(Duration::from_secs(2)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_continuation_is_dropped_uncalled() {
        let aggregator = GroupAggregator::new(Duration::from_millis(200));
        let (first_tx, first_rx) = oneshot::channel::<Delivery>();
        let (last_tx, last_rx) = oneshot::channel::<Delivery>();

        aggregator.observe(
            grouped(1, "g", 1),
            Box::new(move |delivery| {
                let _ = first_tx.send(delivery);
            }),
        );
        aggregator.observe(
            grouped(1, "g", 2),
            Box::new(move |delivery| {
                let _ = last_tx.send(delivery);
            }),
        );

        // the absorbed item's sender is gone before the batch is even ready
        assert!(first_rx.await.is_err());

        let delivery = last_rx.await.unwrap();
        assert_eq!(sequences(&delivery), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finalized_group_is_evicted_and_restarts_fresh() {
        let aggregator = GroupAggregator::new(Duration::from_millis(100));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let key = GroupKey {
            source_id: 3,
            group_id: "g".to_string(),
        };

        aggregator.observe(grouped(3, "g", 1), recording(&tx, 1));
        aggregator.observe(grouped(3, "g", 2), recording(&tx, 2));
        assert_eq!(aggregator.pending_items(&key), 2);

        sleep(Duration::from_millis(150)).await;
        let (_, delivery, _) = rx.try_recv().unwrap();
        assert_eq!(sequences(&delivery), vec![1, 2]);
        assert_eq!(aggregator.pending_items(&key), 0);
        assert_eq!(aggregator.pending_groups(), 0);

        aggregator.observe(grouped(3, "g", 3), recording(&tx, 3));
        assert_eq!(aggregator.pending_items(&key), 1);

        sleep(Duration::from_millis(150)).await;
        let (sequence, delivery, _) = rx.try_recv().unwrap();
        assert_eq!(sequence, 3);
        assert_eq!(sequences(&delivery), vec![3]);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_timeout_finalizes_on_next_tick() {
        let aggregator = GroupAggregator::new(Duration::ZERO);
        let (tx, mut rx) = mpsc::unbounded_channel();

        aggregator.observe(grouped(1, "g", 1), recording(&tx, 1));
        sleep(Duration::from_millis(1)).await;

        let (sequence, delivery, _) = rx.try_recv().unwrap();
        assert_eq!(sequence, 1);
        assert_eq!(sequences(&delivery), vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clones_share_one_registry() {
        let aggregator = GroupAggregator::new(Duration::from_millis(100));
        let handle = aggregator.clone();
        let (tx, mut rx) = mpsc::unbounded_channel();

        aggregator.observe(grouped(1, "g", 1), recording(&tx, 1));
        handle.observe(grouped(1, "g", 2), recording(&tx, 2));
        assert_eq!(aggregator.pending_groups(), 1);

        sleep(Duration::from_millis(150)).await;
        let (sequence, delivery, _) = rx.try_recv().unwrap();
        assert_eq!(sequence, 2);
        assert_eq!(sequences(&delivery), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_quiet_period_counts_from_arrival_when_worker_is_busy() {
        let aggregator = GroupAggregator::new(Duration::from_millis(300));
        let (tx, rx) = oneshot::channel::<Delivery>();
        let start = std::time::Instant::now();

        aggregator.observe(
            grouped(1, "g", 1),
            Box::new(move |delivery| {
                let _ = tx.send(delivery);
            }),
        );

        // hold the only worker before the timer task gets its first poll
        std::thread::sleep(Duration::from_millis(250));

        let delivery = rx.await.unwrap();
        let elapsed = start.elapsed();
        assert_eq!(sequences(&delivery), vec![1]);
        assert!(elapsed >= Duration::from_millis(300));
        assert!(elapsed < Duration::from_millis(450));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_observers_of_one_group_deliver_once() {
        let aggregator = GroupAggregator::new(Duration::from_millis(200));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let barrier = Arc::new(tokio::sync::Barrier::new(16));

        let mut tasks = Vec::new();
        for sequence in 1..=16u64 {
            let aggregator = aggregator.clone();
            let tx = tx.clone();
            let barrier = barrier.clone();
            tasks.push(tokio::spawn(async move {
                barrier.wait().await;
                aggregator.observe(grouped(9, "race", sequence), recording(&tx, sequence));
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        drop(tx);

        let (_, delivery, _) = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sequences(&delivery), (1..=16).collect::<Vec<u64>>());

        // every other continuation was dropped, so the channel closes without a second delivery
        let next = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap();
        assert!(next.is_none());
        assert_eq!(aggregator.pending_groups(), 0);
    }

    #[test]
    fn test_without_runtime_group_finalizes_immediately() {
        let aggregator = GroupAggregator::new(Duration::from_secs(60));
        let (tx, rx) = std::sync::mpsc::channel();

        aggregator.observe(
            grouped(1, "g", 1),
            Box::new(move |delivery| {
                let _ = tx.send(delivery);
            }),
        );

        let delivery = rx.try_recv().unwrap();
        assert_eq!(sequences(&delivery), vec![1]);
        assert_eq!(aggregator.pending_groups(), 0);
    }
}
