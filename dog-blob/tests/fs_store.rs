use dog_blob::{
    bytes_stream, BlobConfig, BlobError, ByteRange, ContentId, ContentStore, FilesystemStore, Resource,
};
use futures_util::StreamExt;

async fn read_all(resource: Resource, range: Option<ByteRange>) -> Vec<u8> {
    let mut opened = resource.open(range).await.unwrap();
    let mut out = Vec::new();
    while let Some(chunk) = opened.stream.next().await {
        out.extend_from_slice(&chunk.unwrap());
    }
    out
}

#[tokio::test]
async fn put_get_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = FilesystemStore::new(dir.path().join("content"));

    let put = store.put(None, bytes_stream("hello")).await.unwrap();
    assert_eq!(put.size_bytes, 5);
    assert!(dir.path().join("content").join(put.id.as_str()).is_file());

    let resource = store.get(&put.id).await.unwrap().expect("stored");
    assert_eq!(resource.size_bytes, 5);
    assert!(resource.accepts_ranges);
    assert!(resource.etag.is_some());
    assert_eq!(read_all(resource, None).await, b"hello");
}

#[tokio::test]
async fn rewrite_reuses_the_same_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = FilesystemStore::new(dir.path());

    let first = store.put(None, bytes_stream("first version")).await.unwrap();
    let second = store.put(Some(&first.id), bytes_stream("v2")).await.unwrap();
    assert_eq!(first.id, second.id);

    let resource = store.get(&first.id).await.unwrap().unwrap();
    assert_eq!(read_all(resource, None).await, b"v2");

    // Only the payload file remains, no temp leftovers
    let entries = std::fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(entries, 1);
}

#[tokio::test]
async fn ranged_read_seeks_into_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = FilesystemStore::new(dir.path());
    let put = store.put(None, bytes_stream("0123456789")).await.unwrap();

    let resource = store.get(&put.id).await.unwrap().unwrap();
    assert_eq!(read_all(resource, Some(ByteRange::new(3, Some(5)))).await, b"345");

    let resource = store.get(&put.id).await.unwrap().unwrap();
    assert_eq!(read_all(resource, Some(ByteRange::from_start(8))).await, b"89");
}

#[tokio::test]
async fn missing_payload_is_absent() {
    let dir = tempfile::tempdir().unwrap();
    let store = FilesystemStore::new(dir.path());
    assert!(store.get(&ContentId::from("nope")).await.unwrap().is_none());
}

#[tokio::test]
async fn delete_retires_the_id() {
    let dir = tempfile::tempdir().unwrap();
    let store = FilesystemStore::new(dir.path());
    let put = store.put(None, bytes_stream("bye")).await.unwrap();

    store.delete(&put.id).await.unwrap();
    assert!(store.get(&put.id).await.unwrap().is_none());

    let err = store.put(Some(&put.id), bytes_stream("again")).await.unwrap_err();
    assert!(matches!(err, BlobError::Retired { .. }));
}

#[tokio::test]
async fn retirement_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let id = {
        let store = FilesystemStore::new(dir.path());
        let put = store.put(None, bytes_stream("bye")).await.unwrap();
        store.delete(&put.id).await.unwrap();
        put.id
    };

    let reopened = FilesystemStore::new(dir.path());
    assert!(reopened.get(&id).await.unwrap().is_none());
    let err = reopened.put(Some(&id), bytes_stream("again")).await.unwrap_err();
    assert!(matches!(err, BlobError::Retired { .. }));
    assert!(!dir.path().join(id.as_str()).exists());

    // Fresh ids are unaffected
    let fresh = reopened.put(None, bytes_stream("new")).await.unwrap();
    assert_ne!(fresh.id, id);
}

#[tokio::test]
async fn deleting_an_unknown_id_still_retires_it() {
    let dir = tempfile::tempdir().unwrap();
    let id = ContentId::from("never-written");
    FilesystemStore::new(dir.path().join("content")).delete(&id).await.unwrap();

    let err = FilesystemStore::new(dir.path().join("content"))
        .put(Some(&id), bytes_stream("x"))
        .await
        .unwrap_err();
    assert!(matches!(err, BlobError::Retired { .. }));
}

#[tokio::test]
async fn traversal_ids_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = FilesystemStore::new(dir.path());
    let err = store.put(Some(&ContentId::from("../escape")), bytes_stream("x")).await.unwrap_err();
    assert!(matches!(err, BlobError::Invalid { .. }));
}

#[tokio::test]
async fn oversized_write_leaves_nothing_behind() {
    let dir = tempfile::tempdir().unwrap();
    let store = FilesystemStore::with_config(dir.path(), BlobConfig::new().with_max_blob_bytes(4));

    let err = store.put(None, bytes_stream("too large")).await.unwrap_err();
    assert!(matches!(err, BlobError::Invalid { .. }));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
