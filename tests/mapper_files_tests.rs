/// File field and blob lifecycle tests
///
/// Run with: cargo test --test mapper_files_tests

mod common;

use common::{Fixture, Item, Product};
use docmapper::{FieldMap, OdmError, StoreError, Uploads, WriteOptions};
use serde_json::{Value, json};
use std::io::{self, Cursor, Read};

struct FailingReader;

impl Read for FailingReader {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer went away"))
    }
}

fn bytes(content: &str) -> Cursor<Vec<u8>> {
    Cursor::new(content.as_bytes().to_vec())
}

fn fields(value: Value) -> FieldMap {
    value.as_object().cloned().unwrap()
}

async fn item_with_photo(fixture: &Fixture) -> (Item, String) {
    let mapper = fixture.registry.mapper::<Item>("items").unwrap();
    let mut item = Item::named("chair");
    let key = mapper
        .create_with(&mut item, WriteOptions::new().upload("photo", bytes("jpeg")))
        .await
        .unwrap();
    (item, key)
}

#[tokio::test]
async fn test_create_uploads_stream_and_sets_link() {
    let fixture = Fixture::new();
    let (item, key) = item_with_photo(&fixture).await;

    let link = item.photo.clone().unwrap();
    assert!(link.starts_with(&format!("memory://media/o/items%2F{}%2Fphoto", key)));
    assert_eq!(
        fixture.blobs().content(&format!("items/{}/photo", key)).await,
        Some(b"jpeg".to_vec())
    );

    let stored = fixture.documents().raw("items", &key).await.unwrap();
    assert_eq!(stored.get("photo"), Some(&json!(link)));
}

#[tokio::test]
async fn test_stream_for_non_null_field_is_rejected_before_store_calls() {
    let fixture = Fixture::new();
    let mapper = fixture.registry.mapper::<Item>("items").unwrap();

    let mut item = Item::named("chair");
    item.photo = Some("memory://elsewhere".to_string());
    assert!(matches!(
        mapper
            .create_with(&mut item, WriteOptions::new().upload("photo", bytes("jpeg")))
            .await,
        Err(OdmError::Format(m)) if m == "File field photo must be null in entity"
    ));
    assert_eq!(fixture.blobs().call_count(), 0);
    assert_eq!(fixture.documents().call_count(), 0);
}

#[tokio::test]
async fn test_streams_must_target_present_file_fields() {
    let fixture = Fixture::new();
    let mapper = fixture.registry.mapper::<Item>("items").unwrap();

    let mut item = Item::named("chair");
    assert!(matches!(
        mapper
            .create_with(&mut item, WriteOptions::new().upload("avatar", bytes("x")))
            .await,
        Err(OdmError::Format(m)) if m == "File field avatar does not exist in type Item"
    ));
    assert!(matches!(
        mapper
            .create_with(&mut item, WriteOptions::new().upload("name", bytes("x")))
            .await,
        Err(OdmError::Format(_))
    ));

    let mut uploads = Uploads::new();
    uploads.insert("photo", None);
    assert!(matches!(
        mapper
            .create_with(&mut item, WriteOptions::new().uploads(uploads))
            .await,
        Err(OdmError::Format(m)) if m == "Stream for file field photo cannot be null"
    ));
    assert_eq!(fixture.documents().call_count(), 0);
}

#[tokio::test]
async fn test_unreadable_stream_fails_with_io() {
    let fixture = Fixture::new();
    let mapper = fixture.registry.mapper::<Item>("items").unwrap();

    let mut item = Item::named("chair");
    assert!(matches!(
        mapper
            .create_with(&mut item, WriteOptions::new().upload("photo", FailingReader))
            .await,
        Err(OdmError::Io(_))
    ));
    assert_eq!(fixture.documents().document_count("items").await, 0);
    assert_eq!(fixture.blobs().blob_count().await, 0);
}

#[tokio::test]
async fn test_blob_failure_aborts_create() {
    let fixture = Fixture::new();
    let mapper = fixture.registry.mapper::<Item>("items").unwrap();

    fixture
        .blobs()
        .fail_next(StoreError::Interrupted("upload cancelled".to_string()));
    let mut item = Item::named("chair");
    assert!(matches!(
        mapper
            .create_with(&mut item, WriteOptions::new().upload("photo", bytes("jpeg")))
            .await,
        Err(OdmError::Interrupted(_))
    ));
    assert_eq!(fixture.documents().document_count("items").await, 0);
}

#[tokio::test]
async fn test_field_map_null_clears_blob() {
    let fixture = Fixture::new();
    let (_, key) = item_with_photo(&fixture).await;
    let mapper = fixture.registry.mapper::<Item>("items").unwrap();
    let path = format!("items/{}/photo", key);

    mapper
        .update_fields(fields(json!({"id": key.clone(), "photo": null})))
        .await
        .unwrap();
    assert_eq!(fixture.blobs().content(&path).await, None);

    let item = mapper.retrieve_required(&key).await.unwrap();
    assert_eq!(item.photo, None);
    assert_eq!(item.name, "chair");
}

#[tokio::test]
async fn test_field_map_null_on_plain_string_file_field() {
    let fixture = Fixture::new();
    let mapper = fixture.registry.mapper::<Product>("products").unwrap();

    let mut product = Product::new("p1", "chair", 10);
    mapper
        .create_with(&mut product, WriteOptions::new().upload("manual", bytes("pdf")))
        .await
        .unwrap();
    assert!(product.manual.starts_with("memory://"));

    mapper
        .update_fields(fields(json!({"code": "p1", "manual": null})))
        .await
        .unwrap();
    assert_eq!(fixture.blobs().blob_count().await, 0);

    let stored = mapper.retrieve_required("p1").await.unwrap();
    assert_eq!(stored.manual, "");
    assert_eq!(stored.price, 10);
}

#[tokio::test]
async fn test_field_map_streams() {
    let fixture = Fixture::new();
    let mapper = fixture.registry.mapper::<Item>("items").unwrap();
    let mut item = Item::named("chair");
    let key = mapper.create(&mut item).await.unwrap();

    assert!(matches!(
        mapper
            .update_fields_with(
                fields(json!({"id": key.clone(), "photo": null})),
                WriteOptions::new().upload("photo", bytes("png")),
            )
            .await,
        Err(OdmError::Format(m)) if m == "File field photo cannot be in map"
    ));

    mapper
        .update_fields_with(
            fields(json!({"id": key.clone(), "name": "armchair"})),
            WriteOptions::new().upload("photo", bytes("png")),
        )
        .await
        .unwrap();

    let updated = mapper.retrieve_required(&key).await.unwrap();
    assert_eq!(updated.name, "armchair");
    assert!(updated.photo.unwrap().contains("generation="));
    assert_eq!(
        fixture.blobs().content(&format!("items/{}/photo", key)).await,
        Some(b"png".to_vec())
    );
}

#[tokio::test]
async fn test_entity_update_replaces_and_clears_blobs() {
    let fixture = Fixture::new();
    let (mut item, key) = item_with_photo(&fixture).await;
    let mapper = fixture.registry.mapper::<Item>("items").unwrap();
    let path = format!("items/{}/photo", key);
    let first_link = item.photo.clone().unwrap();

    item.photo = None;
    mapper
        .update_with(&mut item, WriteOptions::new().upload("photo", bytes("v2")))
        .await
        .unwrap();
    let second_link = item.photo.clone().unwrap();
    assert_ne!(first_link, second_link);
    assert_eq!(fixture.blobs().content(&path).await, Some(b"v2".to_vec()));

    item.photo = None;
    mapper.update(&mut item).await.unwrap();
    assert_eq!(fixture.blobs().content(&path).await, None);
    assert_eq!(mapper.retrieve_required(&key).await.unwrap().photo, None);
}

#[tokio::test]
async fn test_delete_removes_blobs() {
    let fixture = Fixture::new();
    let (_, key) = item_with_photo(&fixture).await;
    let mapper = fixture.registry.mapper::<Item>("items").unwrap();

    mapper.delete(&key).await.unwrap();
    assert!(!mapper.exists(&key).await.unwrap());
    assert_eq!(fixture.blobs().blob_count().await, 0);
}

#[tokio::test]
async fn test_delete_survives_blob_cleanup_failure() {
    let fixture = Fixture::new();
    let (_, key) = item_with_photo(&fixture).await;
    let mapper = fixture.registry.mapper::<Item>("items").unwrap();

    fixture
        .blobs()
        .fail_next(StoreError::Execution("bucket unavailable".to_string()));
    mapper.delete(&key).await.unwrap();
    assert!(!mapper.exists(&key).await.unwrap());
    assert_eq!(fixture.blobs().blob_count().await, 1);
}

#[tokio::test]
async fn test_delete_all_removes_documents_and_blobs() {
    let fixture = Fixture::new();
    let mapper = fixture.registry.mapper::<Product>("products").unwrap();

    let mut with_files = Product::new("p1", "chair", 10);
    mapper
        .create_with(
            &mut with_files,
            WriteOptions::new()
                .upload("manual", bytes("pdf"))
                .upload("cover", bytes("jpg")),
        )
        .await
        .unwrap();
    let mut without_files = Product::new("p2", "desk", 30);
    mapper.create(&mut without_files).await.unwrap();
    assert_eq!(fixture.blobs().blob_count().await, 2);

    let everything = mapper.select().unwrap();
    assert_eq!(mapper.delete_all(&everything).await.unwrap(), 2);
    assert_eq!(fixture.documents().document_count("products").await, 0);
    assert_eq!(fixture.blobs().blob_count().await, 0);
}

#[tokio::test]
async fn test_direct_file_operations() {
    let fixture = Fixture::new();
    let mapper = fixture.registry.mapper::<Product>("products").unwrap();
    let mut product = Product::new("p1", "chair", 10);
    mapper.create(&mut product).await.unwrap();

    assert_eq!(mapper.file_url("p1", "manual").await.unwrap(), None);
    assert!(matches!(
        mapper.file_url_required("p1", "manual").await,
        Err(OdmError::Existence(_))
    ));
    assert!(matches!(
        mapper.replace_file("p1", "manual", bytes("v0")).await,
        Err(OdmError::Existence(m)) if m == "Path products/p1/manual does not exist"
    ));

    let uploaded = mapper.upload_file("p1", "manual", bytes("v1")).await.unwrap();
    assert!(matches!(
        mapper.upload_file("p1", "manual", bytes("v1")).await,
        Err(OdmError::Existence(m)) if m == "Path products/p1/manual already exists"
    ));

    let replaced = mapper.replace_file("p1", "manual", bytes("v2")).await.unwrap();
    assert_ne!(uploaded, replaced);
    assert_eq!(mapper.file_url_required("p1", "manual").await.unwrap(), replaced);
    assert_eq!(
        fixture.blobs().content("products/p1/manual").await,
        Some(b"v2".to_vec())
    );

    // The document field is left untouched.
    assert_eq!(mapper.retrieve_required("p1").await.unwrap().manual, "");

    assert!(mapper.delete_file("p1", "manual").await.unwrap());
    assert!(!mapper.delete_file("p1", "manual").await.unwrap());
    assert!(matches!(
        mapper.delete_file_required("p1", "manual").await,
        Err(OdmError::Existence(_))
    ));
}

#[tokio::test]
async fn test_direct_file_operations_validate_names() {
    let fixture = Fixture::new();
    let mapper = fixture.registry.mapper::<Product>("products").unwrap();

    assert!(matches!(
        mapper.upload_file("p1", "price", bytes("x")).await,
        Err(OdmError::Format(m)) if m == "File field price does not exist in type Product"
    ));
    assert!(matches!(
        mapper.file_url("a/b", "manual").await,
        Err(OdmError::Format(_))
    ));
    assert!(matches!(
        mapper.upload_file("p1", "cover", FailingReader).await,
        Err(OdmError::Io(_))
    ));
    assert_eq!(fixture.blobs().call_count(), 0);
}

#[tokio::test]
async fn test_failed_create_rolls_back_uploads_and_can_be_retried() {
    let fixture = Fixture::new();
    let mapper = fixture.registry.mapper::<Item>("items").unwrap();

    fixture
        .documents()
        .fail_next(StoreError::Execution("write rejected".to_string()));
    let mut item = Item::named("chair");
    assert!(matches!(
        mapper
            .create_with(&mut item, WriteOptions::new().upload("photo", bytes("jpeg")))
            .await,
        Err(OdmError::Execution(_))
    ));
    assert_eq!(item.id, None);
    assert_eq!(item.photo, None);
    assert_eq!(fixture.blobs().blob_count().await, 0);
    assert_eq!(fixture.documents().document_count("items").await, 0);

    let key = mapper
        .create_with(&mut item, WriteOptions::new().upload("photo", bytes("jpeg")))
        .await
        .unwrap();
    assert_eq!(item.id.as_deref(), Some(key.as_str()));
    assert_eq!(
        fixture.blobs().content(&format!("items/{}/photo", key)).await,
        Some(b"jpeg".to_vec())
    );
}

#[tokio::test]
async fn test_failed_upload_removes_blobs_already_created() {
    let fixture = Fixture::new();
    let mapper = fixture.registry.mapper::<Product>("products").unwrap();

    // Streams are stored in field name order: cover, then manual.
    fixture
        .blobs()
        .fail_path("products/p1/manual", StoreError::Interrupted("upload cancelled".to_string()));
    let mut product = Product::new("p1", "chair", 10);
    assert!(matches!(
        mapper
            .create_with(
                &mut product,
                WriteOptions::new()
                    .upload("manual", bytes("pdf"))
                    .upload("cover", bytes("jpg")),
            )
            .await,
        Err(OdmError::Interrupted(_))
    ));
    assert_eq!(product.cover, "");
    assert_eq!(product.manual, "");
    assert_eq!(fixture.blobs().blob_count().await, 0);
    assert!(!mapper.exists("p1").await.unwrap());
}

#[tokio::test]
async fn test_delete_all_keeps_cleaning_after_a_failed_blob_delete() {
    let fixture = Fixture::new();
    let mapper = fixture.registry.mapper::<Product>("products").unwrap();

    for (code, name) in [("p1", "chair"), ("p2", "desk")] {
        let mut product = Product::new(code, name, 10);
        mapper
            .create_with(
                &mut product,
                WriteOptions::new()
                    .upload("manual", bytes("pdf"))
                    .upload("cover", bytes("jpg")),
            )
            .await
            .unwrap();
    }
    assert_eq!(fixture.blobs().blob_count().await, 4);

    fixture
        .blobs()
        .fail_path("products/p1/cover", StoreError::Execution("bucket unavailable".to_string()));
    let everything = mapper.select().unwrap();
    assert_eq!(mapper.delete_all(&everything).await.unwrap(), 2);
    assert_eq!(fixture.documents().document_count("products").await, 0);
    assert_eq!(fixture.blobs().blob_count().await, 1);
    assert_eq!(
        fixture.blobs().content("products/p1/cover").await,
        Some(b"jpg".to_vec())
    );
}
