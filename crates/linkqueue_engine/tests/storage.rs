use std::sync::Arc;

use chrono::{TimeZone, Utc};
use linkqueue_core::{ExtractedRecord, Queue, QueueItem, Settings, SECOND_DEGREE};
use linkqueue_engine::{
    FileStore, KeyValueStore, RecordSaver, Storage, StoreError, QUEUE_KEY, TOTAL_KEY,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn record(url: &str, source: &str) -> ExtractedRecord {
    ExtractedRecord {
        kind: SECOND_DEGREE.to_string(),
        source: source.to_string(),
        name: format!("name of {url}"),
        url: url.to_string(),
        extra_info: String::new(),
        timestamp: Utc.with_ymd_and_hms(2024, 2, 2, 10, 0, 0).unwrap(),
    }
}

#[tokio::test]
async fn file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    {
        let storage = Storage::new(Arc::new(FileStore::open(&path).await.unwrap()));
        let mut queue = Queue::new();
        queue
            .reorder(
                vec![QueueItem::new("https://www.linkedin.com/in/a/", true, None)],
                Some(0),
            )
            .unwrap();
        storage.save_queue(&queue).await.unwrap();
        storage
            .save_settings(&Settings {
                show_notifications: false,
                queue_expanded: true,
            })
            .await
            .unwrap();
    }

    let reopened = Storage::new(Arc::new(FileStore::open(&path).await.unwrap()));
    let queue = reopened.load_queue().await.unwrap().unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue.items()[0].id, 1);
    assert!(!reopened.load_settings().await.show_notifications);
}

#[tokio::test]
async fn missing_file_starts_empty_and_remove_is_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("state.json");
    let store = FileStore::open(&path).await.unwrap();

    assert_eq!(store.get(QUEUE_KEY).await.unwrap(), None);
    store
        .set(vec![(TOTAL_KEY.to_string(), json!(4))])
        .await
        .unwrap();
    store.remove(&[TOTAL_KEY]).await.unwrap();

    let reopened = FileStore::open(&path).await.unwrap();
    assert_eq!(reopened.get(TOTAL_KEY).await.unwrap(), None);
}

#[tokio::test]
async fn non_object_state_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, "[1, 2]").unwrap();

    let err = FileStore::open(&path).await.err().unwrap();
    assert!(matches!(err, StoreError::Malformed(_)));
}

#[tokio::test]
async fn corrupt_value_names_its_key() {
    let store = Arc::new(linkqueue_engine::MemoryStore::new());
    store
        .set(vec![(QUEUE_KEY.to_string(), json!("not a queue"))])
        .await
        .unwrap();
    let storage = Storage::new(store);

    let err = storage.load_queue().await.unwrap_err();
    assert!(err.to_string().contains(QUEUE_KEY));
}

#[tokio::test]
async fn total_counts_only_new_keys() {
    let saver = RecordSaver::new(Storage::in_memory());

    let first = saver
        .save(vec![record("a", "X"), record("a", "X")])
        .await
        .unwrap();
    assert_eq!((first.saved, first.updated, first.duplicates), (1, 1, 0));

    saver
        .save(vec![record("a", "X"), record("b", "X"), record("", "X")])
        .await
        .unwrap();
    assert_eq!(saver.total().await.unwrap(), 2);
    assert_eq!(saver.all().await.unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_saves_lose_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path().join("state.json")).await.unwrap();
    let saver = Arc::new(RecordSaver::new(Storage::new(Arc::new(store))));

    let mut tasks = Vec::new();
    for worker in 0..8 {
        let saver = saver.clone();
        tasks.push(tokio::spawn(async move {
            for n in 0..5 {
                saver
                    .save(vec![record(&format!("u{worker}-{n}"), "X")])
                    .await
                    .unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(saver.all().await.unwrap().len(), 40);
    assert_eq!(saver.total().await.unwrap(), 40);
}
