use std::sync::Once;

use linkqueue_core::{move_item, ItemOutcome, ItemStatus, Queue, QueueError, QueueItem};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

fn queue_of(urls: &[&str]) -> Queue {
    Queue::with_items(
        urls.iter()
            .map(|url| QueueItem::new(*url, false, None))
            .collect(),
    )
}

fn current_url(queue: &Queue) -> &str {
    &queue.current_item().expect("current item").url
}

#[test]
fn begin_skips_completed_items_and_rejects_when_running() {
    init_logging();
    let mut queue = queue_of(&["a", "b", "c"]);
    let first = queue.items()[0].id;
    queue.begin(None).unwrap();
    queue.mark_processing();
    queue.apply_outcome(
        first,
        ItemOutcome::Completed {
            profiles_found: 3,
            source_name: None,
        },
    );
    queue.halt();

    assert_eq!(queue.begin(None), Ok(1));
    assert_eq!(queue.begin(None), Err(QueueError::AlreadyRunning));
}

#[test]
fn begin_without_pending_items_fails() {
    init_logging();
    let mut done = QueueItem::new("a", false, None);
    done.status = ItemStatus::Completed;
    let mut queue = Queue::with_items(vec![done]);

    assert_eq!(queue.begin(None), Err(QueueError::NoPendingItems));
    assert!(!queue.is_running());

    let mut empty = Queue::new();
    assert_eq!(empty.begin(Some(Vec::new())), Err(QueueError::NoPendingItems));
}

#[test]
fn delete_before_pointer_keeps_same_logical_item() {
    init_logging();
    let mut queue = queue_of(&["a", "b", "c", "d"]);
    queue.jump(2).unwrap();

    queue.delete(0).unwrap();
    assert_eq!(queue.current_index(), 1);
    assert_eq!(current_url(&queue), "c");

    queue.delete(2).unwrap();
    assert_eq!(current_url(&queue), "c");
}

#[test]
fn delete_of_current_moves_to_next_item_at_same_index() {
    init_logging();
    let mut queue = queue_of(&["a", "b", "c"]);
    queue.jump(1).unwrap();

    let removed = queue.delete(1).unwrap();
    assert_eq!(removed.url, "b");
    assert_eq!(queue.current_index(), 1);
    assert_eq!(current_url(&queue), "c");
}

#[test]
fn jump_resets_only_target_status() {
    init_logging();
    let mut queue = queue_of(&["a", "b"]);
    let ids: Vec<_> = queue.items().iter().map(|i| i.id).collect();
    queue.begin(None).unwrap();
    queue.mark_processing();
    queue.apply_outcome(
        ids[0],
        ItemOutcome::Completed {
            profiles_found: 1,
            source_name: None,
        },
    );
    queue.advance();
    queue.mark_processing();
    queue.apply_outcome(ids[1], ItemOutcome::Failed { error: "boom".into() });

    queue.jump(0).unwrap();
    assert_eq!(queue.current_index(), 0);
    assert_eq!(queue.items()[0].status, ItemStatus::Pending);
    assert_eq!(queue.items()[1].status, ItemStatus::Failed);
}

#[test]
fn out_of_range_index_is_rejected() {
    init_logging();
    let mut queue = queue_of(&["a"]);
    assert_eq!(queue.jump(3), Err(QueueError::InvalidIndex { index: 3, len: 1 }));
    assert_eq!(
        queue.delete(1).unwrap_err(),
        QueueError::InvalidIndex { index: 1, len: 1 }
    );
    assert_eq!(queue.len(), 1);
}

#[test]
fn moving_processing_item_to_front_moves_pointer() {
    init_logging();
    let mut queue = queue_of(&["a", "b", "c"]);
    queue.begin(None).unwrap();
    queue.jump(2).unwrap();
    queue.mark_processing();

    let (items, index) = move_item(queue.items(), 2, 0, queue.current_index()).unwrap();
    queue.reorder(items, Some(index)).unwrap();

    assert_eq!(queue.current_index(), 0);
    assert_eq!(current_url(&queue), "c");
    assert_eq!(queue.items()[0].status, ItemStatus::Processing);
}

#[test]
fn moving_other_items_keeps_pointer_on_same_item() {
    init_logging();
    let mut queue = queue_of(&["a", "b", "c", "d"]);
    queue.jump(1).unwrap();

    // Earlier item moved behind the current one.
    let (items, index) = move_item(queue.items(), 0, 3, queue.current_index()).unwrap();
    queue.reorder(items, Some(index)).unwrap();
    assert_eq!(current_url(&queue), "b");

    // Later item moved in front of the current one.
    let (items, index) = move_item(queue.items(), 3, 0, queue.current_index()).unwrap();
    queue.reorder(items, Some(index)).unwrap();
    assert_eq!(current_url(&queue), "b");

    // Unrelated move after the pointer.
    let (items, index) = move_item(queue.items(), 2, 3, queue.current_index()).unwrap();
    queue.reorder(items, Some(index)).unwrap();
    assert_eq!(current_url(&queue), "b");
}

#[test]
fn reorder_rejects_pointer_outside_new_list() {
    init_logging();
    let mut queue = queue_of(&["a", "b"]);
    let items = queue.items().to_vec();
    assert_eq!(
        queue.reorder(items, Some(2)),
        Err(QueueError::InvalidIndex { index: 2, len: 2 })
    );
}

#[test]
fn reorder_keeps_item_ids() {
    init_logging();
    let mut queue = queue_of(&["a", "b"]);
    let mut items = queue.items().to_vec();
    items.reverse();
    let expected: Vec<_> = items.iter().map(|i| i.id).collect();
    queue.reorder(items, None).unwrap();

    let ids: Vec<_> = queue.items().iter().map(|i| i.id).collect();
    assert_eq!(ids, expected);
}

#[test]
fn halt_returns_processing_item_to_pending() {
    init_logging();
    let mut queue = queue_of(&["a"]);
    queue.begin(None).unwrap();
    queue.mark_processing();
    queue.halt();

    assert!(!queue.is_running());
    assert_eq!(queue.items()[0].status, ItemStatus::Pending);
    assert_eq!(queue.break_end_time(), None);
}

#[test]
fn outcome_for_deleted_item_is_ignored() {
    init_logging();
    let mut queue = queue_of(&["a", "b"]);
    queue.begin(None).unwrap();
    let processing = queue.mark_processing().unwrap();
    queue.delete(0).unwrap();

    assert!(!queue.apply_outcome(processing.id, ItemOutcome::Failed { error: "x".into() }));
    assert_eq!(queue.items()[0].status, ItemStatus::Pending);
}

#[test]
fn snapshot_survives_json_round_trip() {
    init_logging();
    let mut queue = queue_of(&["a", "b"]);
    queue.begin(None).unwrap();
    queue.mark_processing();

    let json = serde_json::to_string(&queue).unwrap();
    assert!(json.contains("\"currentIndex\":0"));
    assert!(json.contains("\"status\":\"processing\""));
    let restored: Queue = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, queue);
}
