/// Record store tests
///
/// Concurrency, atomicity and validation properties of the flat-file store.
/// Run with: cargo test --test record_store_tests

use std::collections::HashSet;
use std::fs;
use std::sync::Arc;

use gostwear_backend::store::{Record, RecordId, RecordStore, StoreError};
use serde_json::{Value, json};
use tempfile::TempDir;

fn record(value: Value) -> Record {
    Record::try_from(value).expect("test record should be valid")
}

fn ann() -> Record {
    record(json!({
        "id": 1_700_000_000_000u64,
        "name": "Ann",
        "email": "a@x.com",
        "password": "p"
    }))
}

#[tokio::test]
async fn test_load_all_on_never_written_collection_is_empty() {
    let dir = TempDir::new().unwrap();
    let store = RecordStore::open(dir.path().join("data"));

    let records = store.load_all("users").await.unwrap();

    assert!(records.is_empty());
    assert!(!store.exists("users").await.unwrap());
    assert!(!dir.path().join("data").exists(), "reads must not create files");
}

#[tokio::test]
async fn test_append_then_load_all() {
    let dir = TempDir::new().unwrap();
    let store = RecordStore::open(dir.path());

    store.append("users", ann()).await.unwrap();

    let users = store.load_all("users").await.unwrap();
    assert_eq!(users, vec![ann()]);
    assert_eq!(users[0].get_str("email"), Some("a@x.com"));
    assert!(store.exists("users").await.unwrap());
}

#[tokio::test]
async fn test_duplicate_append_fails_and_leaves_file_unchanged() {
    let dir = TempDir::new().unwrap();
    let store = RecordStore::open(dir.path());
    store.append("users", ann()).await.unwrap();
    let path = store.collection_file("users").unwrap().path().to_path_buf();
    let before = fs::read(&path).unwrap();

    let duplicate = record(json!({
        "id": 1_700_000_000_000u64,
        "name": "Bob",
        "email": "b@x.com",
        "password": "q"
    }));
    let err = store.append("users", duplicate).await.unwrap_err();

    match err {
        StoreError::DuplicateKey { collection, id } => {
            assert_eq!(collection, "users");
            assert_eq!(id, RecordId::from(1_700_000_000_000u64));
        }
        other => panic!("expected DuplicateKey, got {other:?}"),
    }
    assert_eq!(fs::read(&path).unwrap(), before);
    assert_eq!(store.load_all("users").await.unwrap(), vec![ann()]);
}

#[tokio::test]
async fn test_find_by_key() {
    let dir = TempDir::new().unwrap();
    let store = RecordStore::open(dir.path());
    store
        .replace_all(
            "products",
            vec![
                record(json!({"id": "hoodie-black", "price": 59})),
                record(json!({"id": 42, "price": 19})),
            ],
        )
        .await
        .unwrap();

    let hoodie = store
        .find_by_key("products", &RecordId::from("hoodie-black"))
        .await
        .unwrap()
        .expect("hoodie should exist");
    assert_eq!(hoodie.get("price"), Some(&json!(59)));

    assert!(
        store
            .find_by_key("products", &RecordId::from(42u64))
            .await
            .unwrap()
            .is_some()
    );
    assert!(
        store
            .find_by_key("products", &RecordId::from("42"))
            .await
            .unwrap()
            .is_none(),
        "text and numeric ids are distinct keys"
    );
    assert!(
        store
            .find_by_key("products", &RecordId::from("missing"))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_replace_all_round_trip_keeps_order() {
    let dir = TempDir::new().unwrap();
    let store = RecordStore::open(dir.path());
    let records = vec![
        record(json!({"id": "c", "name": "third-alphabetically"})),
        record(json!({"id": "a", "tags": ["x", "y"]})),
        record(json!({"id": 7, "nested": {"k": true}})),
    ];

    store.replace_all("products", records.clone()).await.unwrap();

    assert_eq!(store.load_all("products").await.unwrap(), records);
}

#[tokio::test]
async fn test_replace_all_rejects_duplicate_ids() {
    let dir = TempDir::new().unwrap();
    let store = RecordStore::open(dir.path());
    let original = vec![record(json!({"id": 1}))];
    store.replace_all("products", original.clone()).await.unwrap();

    let err = store
        .replace_all(
            "products",
            vec![record(json!({"id": 2})), record(json!({"id": 2}))],
        )
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::DuplicateKey { .. }));
    assert_eq!(store.load_all("products").await.unwrap(), original);
}

#[tokio::test]
async fn test_replace_all_with_empty_creates_file() {
    let dir = TempDir::new().unwrap();
    let store = RecordStore::open(dir.path());

    store.replace_all("products", Vec::new()).await.unwrap();

    assert!(store.exists("products").await.unwrap());
    assert!(store.load_all("products").await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_appends_lose_nothing() {
    let dir = TempDir::new().unwrap();
    let store = RecordStore::open(dir.path());

    let mut handles = vec![];
    let num_tasks = 64u64;

    for task_id in 0..num_tasks {
        let store = store.clone();
        let handle = tokio::spawn(async move {
            store
                .append("users", record(json!({"id": task_id, "name": format!("user-{task_id}")})))
                .await
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let users = store.load_all("users").await.unwrap();
    assert_eq!(users.len(), num_tasks as usize);
    let ids: HashSet<u64> = users.iter().filter_map(|user| user.id().as_u64()).collect();
    assert_eq!(ids, (0..num_tasks).collect::<HashSet<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_unique_field_appends_admit_one() {
    let dir = TempDir::new().unwrap();
    let store = RecordStore::open(dir.path());

    let mut handles = vec![];
    for task_id in 0..16u64 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .append_unique_by(
                    "users",
                    record(json!({"id": task_id, "email": "same@x.com"})),
                    "email",
                )
                .await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => succeeded += 1,
            Err(StoreError::DuplicateField { field, .. }) => assert_eq!(field, "email"),
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(succeeded, 1);
    assert_eq!(store.load_all("users").await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_never_observe_partial_writes() {
    let dir = TempDir::new().unwrap();
    let store = RecordStore::open(dir.path());
    store.replace_all("products", Vec::new()).await.unwrap();

    let writer = {
        let store = store.clone();
        tokio::spawn(async move {
            for round in 0..40u64 {
                let batch = (0..=round)
                    .map(|id| record(json!({"id": id, "blob": "x".repeat(512)})))
                    .collect();
                store.replace_all("products", batch).await.unwrap();
            }
        })
    };

    let store = Arc::new(store);
    let mut readers = vec![];
    for _ in 0..4 {
        let store = Arc::clone(&store);
        readers.push(tokio::spawn(async move {
            for _ in 0..100 {
                let records = store
                    .load_all("products")
                    .await
                    .expect("every observed state must be a complete array");
                let ids: Vec<u64> = records.iter().filter_map(|r| r.id().as_u64()).collect();
                assert_eq!(ids, (0..records.len() as u64).collect::<Vec<_>>());
            }
        }));
    }

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }
}

#[tokio::test]
async fn test_interrupted_write_leaves_original_intact() {
    let dir = TempDir::new().unwrap();
    let store = RecordStore::open(dir.path());
    store.append("users", ann()).await.unwrap();
    let file = store.collection_file("users").unwrap();
    let before = fs::read(file.path()).unwrap();

    // Crash after the temp file is written but before the rename: the temp
    // file is never cleaned up and the rename never happens.
    let staged = file
        .stage(&[ann(), record(json!({"id": 2, "name": "Lost"}))])
        .unwrap();
    let stray = staged.temp_path().to_path_buf();
    std::mem::forget(staged);
    assert!(stray.exists());

    assert_eq!(fs::read(file.path()).unwrap(), before);
    assert_eq!(store.load_all("users").await.unwrap(), vec![ann()]);

    // The stray temp file does not disturb later writes.
    store
        .append("users", record(json!({"id": 3, "name": "Next"})))
        .await
        .unwrap();
    assert_eq!(store.load_all("users").await.unwrap().len(), 2);

    fs::remove_file(stray).unwrap();
}

#[tokio::test]
async fn test_corrupt_file_is_reported_and_not_repaired() {
    let dir = TempDir::new().unwrap();
    let store = RecordStore::open(dir.path());
    let path = store.collection_file("users").unwrap().path().to_path_buf();
    fs::write(&path, "[{\"id\": 1}, {\"id\":").unwrap();

    let err = store.load_all("users").await.unwrap_err();
    assert!(matches!(err, StoreError::Corrupt { .. }));

    let err = store
        .append("users", record(json!({"id": 2})))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Corrupt { .. }));
    assert_eq!(fs::read_to_string(&path).unwrap(), "[{\"id\": 1}, {\"id\":");
}

#[tokio::test]
async fn test_remove() {
    let dir = TempDir::new().unwrap();
    let store = RecordStore::open(dir.path());
    store
        .replace_all(
            "users",
            vec![record(json!({"id": 1})), record(json!({"id": 2})), record(json!({"id": 3}))],
        )
        .await
        .unwrap();

    let removed = store.remove("users", &RecordId::from(2u64)).await.unwrap();
    assert_eq!(removed, Some(record(json!({"id": 2}))));

    let missing = store.remove("users", &RecordId::from(2u64)).await.unwrap();
    assert!(missing.is_none());

    let ids: Vec<u64> = store
        .load_all("users")
        .await
        .unwrap()
        .iter()
        .filter_map(|r| r.id().as_u64())
        .collect();
    assert_eq!(ids, vec![1, 3]);
}

#[tokio::test]
async fn test_update_failure_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let store = RecordStore::open(dir.path());

    let err = store
        .update("users", |records| {
            records.push(record(json!({"id": 1})));
            Err::<(), _>(StoreError::InvalidRecord {
                reason: "rejected by caller".to_string(),
            })
        })
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::InvalidRecord { .. }));
    assert!(!store.exists("users").await.unwrap());
}

#[tokio::test]
async fn test_invalid_collection_name() {
    let dir = TempDir::new().unwrap();
    let store = RecordStore::open(dir.path());

    let err = store.load_all("../escape").await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidCollection { .. }));
}

#[tokio::test]
async fn test_io_failure_is_reported() {
    let dir = TempDir::new().unwrap();
    let not_a_dir = dir.path().join("data");
    fs::write(&not_a_dir, "plain file").unwrap();
    let store = RecordStore::open(&not_a_dir);

    let err = store.append("users", ann()).await.unwrap_err();
    assert!(matches!(err, StoreError::Io { .. }), "got {err:?}");

    let err = store.load_all("users").await.unwrap_err();
    match err {
        StoreError::Io { collection, .. } => assert_eq!(collection, "users"),
        other => panic!("expected an I/O error, got {other:?}"),
    }

    assert_eq!(fs::read_to_string(&not_a_dir).unwrap(), "plain file");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancelled_writer_releases_lock() {
    let dir = TempDir::new().unwrap();
    let store = RecordStore::open(dir.path());

    let mut handles = vec![];
    for task_id in 0..50u64 {
        let store = store.clone();
        let handle = tokio::spawn(async move {
            store.append("users", record(json!({"id": task_id}))).await
        });
        if task_id % 2 == 1 {
            handle.abort();
        }
        handles.push((task_id, handle));
    }

    let mut kept = HashSet::new();
    for (task_id, handle) in handles {
        match handle.await {
            Ok(result) => {
                result.unwrap();
                kept.insert(task_id);
            }
            Err(err) => assert!(err.is_cancelled(), "task {task_id} panicked: {err}"),
        }
    }

    let last = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        store.append("users", record(json!({"id": 1000}))),
    )
    .await
    .expect("lock should be free after cancelled writers");
    last.unwrap();
    kept.insert(1000);

    let users = store.load_all("users").await.unwrap();
    let ids: HashSet<u64> = users.iter().filter_map(|user| user.id().as_u64()).collect();
    assert_eq!(ids.len(), users.len());
    assert!(kept.is_subset(&ids));
    assert!(ids.iter().all(|id| *id < 50 || *id == 1000));
}
