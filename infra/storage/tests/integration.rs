use crm_storage::*;
use tempfile::TempDir;

async fn open(temp: &TempDir) -> Storage {
    Storage::builder().root(temp.path()).connect().await.unwrap()
}

#[tokio::test]
async fn test_path_traversal_blocked() {
    let temp = TempDir::new().unwrap();
    let storage = open(&temp).await;

    assert!(storage.resolve("../etc/passwd").is_err());
    assert!(storage.resolve("foo/../../bar").is_err());
}

#[tokio::test]
async fn test_write_read_roundtrip() {
    let temp = TempDir::new().unwrap();
    let storage = open(&temp).await;

    storage.write("foo/bar.json", b"{}").await.unwrap();
    assert!(storage.exists("foo/bar.json").unwrap());
    assert_eq!(storage.read("foo/bar.json").await.unwrap(), b"{}");
}

#[tokio::test]
async fn test_overwrite_replaces_content() {
    let temp = TempDir::new().unwrap();
    let storage = open(&temp).await;

    storage.write("record.json", b"first").await.unwrap();
    storage.write("record.json", b"second").await.unwrap();
    assert_eq!(storage.read("record.json").await.unwrap(), b"second");
}

#[tokio::test]
async fn test_collections_are_isolated() {
    let temp = TempDir::new().unwrap();
    let storage = open(&temp).await;

    let contacts = storage.collection("contacts").unwrap();
    let deals = storage.collection("deals").unwrap();

    contacts.write("x.json", b"contact").await.unwrap();
    deals.write("x.json", b"deal").await.unwrap();

    assert_ne!(contacts.resolve("x.json").unwrap(), deals.resolve("x.json").unwrap());
    assert_eq!(contacts.read("x.json").await.unwrap(), b"contact");
    assert_eq!(deals.read("x.json").await.unwrap(), b"deal");
}

#[tokio::test]
async fn test_collection_keys_are_sorted_stems() {
    let temp = TempDir::new().unwrap();
    let storage = open(&temp).await;
    let contacts = storage.collection("Contacts").unwrap();
    assert_eq!(contacts.name(), "contacts");
    assert!(contacts.keys("json").await.unwrap().is_empty());

    contacts.write("b.json", b"{}").await.unwrap();
    contacts.write("a.json", b"{}").await.unwrap();
    contacts.write("notes.txt", b"-").await.unwrap();

    assert_eq!(contacts.keys("json").await.unwrap(), vec!["a".to_owned(), "b".to_owned()]);
}

#[tokio::test]
async fn test_invalid_collection_names() {
    let temp = TempDir::new().unwrap();
    let storage = open(&temp).await;

    assert!(matches!(storage.collection(""), Err(StorageError::InvalidCollection { .. })));
    assert!(matches!(storage.collection("../up"), Err(StorageError::InvalidCollection { .. })));
}

#[tokio::test]
async fn test_delete_and_exists() {
    let temp = TempDir::new().unwrap();
    let storage = open(&temp).await;

    storage.write("tmp/file.txt", b"x").await.unwrap();
    storage.delete("tmp/file.txt").await.unwrap();
    assert!(!storage.exists("tmp/file.txt").unwrap());

    let err = storage.delete("tmp/file.txt").await.unwrap_err();
    assert!(matches!(err, StorageError::FileNotFound { .. }));
}

#[tokio::test]
async fn test_read_missing_returns_file_not_found() {
    let temp = TempDir::new().unwrap();
    let storage = open(&temp).await;

    let err = storage.read("missing.json").await.expect_err("expected error");
    assert!(matches!(err, StorageError::FileNotFound { .. }), "unexpected error: {err:?}");
}

#[tokio::test]
async fn test_connect_without_create_requires_root() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("absent");

    let err = Storage::builder().root(&missing).create(false).connect().await.unwrap_err();
    assert!(matches!(err, StorageError::Io { .. }));
}
