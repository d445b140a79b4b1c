/// Mapper create, retrieve, update and delete tests
///
/// Run with: cargo test --test mapper_crud_tests

mod common;

use common::{Fixture, Item, Product};
use docmapper::{
    FieldMap, MemoryConnector, OdmError, ReadOptions, Registry, StoreConfig, StoreError,
    ValueType, View, ViewMethod, WriteOptions,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

/// Stores names lowercased and exposes an uppercase label.
struct Summary;

impl View<Item> for Summary {
    fn methods() -> Vec<ViewMethod<Item>> {
        vec![
            ViewMethod::forward_getter("get_id", ValueType::String),
            ViewMethod::forward_setter("set_id", ValueType::String),
            ViewMethod::forward_getter("get_name", ValueType::String),
            ViewMethod::setter("set_name", ValueType::String, |item, value| {
                item.name = value.as_str().unwrap_or_default().to_lowercase();
                Ok(())
            }),
            ViewMethod::getter("get_label", ValueType::String, |item| {
                Ok(Value::String(item.name.to_uppercase()))
            }),
        ]
    }
}

/// Persists product names in upper case.
struct Shouting;

impl View<Product> for Shouting {
    fn methods() -> Vec<ViewMethod<Product>> {
        vec![
            ViewMethod::forward_getter("get_code", ValueType::String),
            ViewMethod::forward_setter("set_code", ValueType::String),
            ViewMethod::forward_setter("set_name", ValueType::String),
            ViewMethod::getter("get_name", ValueType::String, |product| {
                Ok(Value::String(product.name.to_uppercase()))
            }),
        ]
    }
}

struct Broken;

impl View<Item> for Broken {
    fn methods() -> Vec<ViewMethod<Item>> {
        vec![ViewMethod::forward_getter("get_weight", ValueType::Float)]
    }
}

fn fields(value: Value) -> FieldMap {
    value.as_object().cloned().unwrap()
}

#[tokio::test]
async fn test_create_and_retrieve_autokey_entity() {
    let fixture = Fixture::new();
    let mapper = fixture.registry.mapper::<Item>("items").unwrap();

    let mut item = Item::named("chair");
    let key = mapper.create(&mut item).await.unwrap();
    assert_eq!(item.id.as_deref(), Some(key.as_str()));
    assert_eq!(item.photo, None);

    let stored = fixture.documents().raw("items", &key).await.unwrap();
    assert_eq!(stored.get("name"), Some(&json!("chair")));

    let found = mapper.retrieve(&key).await.unwrap().unwrap();
    assert_eq!(found, item);
    assert!(mapper.exists(&key).await.unwrap());

    assert_eq!(mapper.retrieve("missing").await.unwrap(), None);
    assert!(matches!(
        mapper.retrieve_required("missing").await,
        Err(OdmError::Existence(_))
    ));
}

#[tokio::test]
async fn test_preset_autokey_is_rejected_before_any_store_call() {
    let fixture = Fixture::new();
    let mapper = fixture.registry.mapper::<Item>("items").unwrap();

    let mut item = Item::named("chair");
    item.id = Some("mine".to_string());
    let err = assert_err!(mapper.create(&mut item).await);
    assert_eq!(err, OdmError::Format("Key must be null in entity".to_string()));
    assert_eq!(fixture.documents().call_count(), 0);
}

#[tokio::test]
async fn test_explicit_key_must_be_new() {
    let fixture = Fixture::new();
    let mapper = fixture.registry.mapper::<Product>("products").unwrap();

    let mut original = Product::new("p1", "chair", 10);
    assert_eq!(assert_ok!(mapper.create(&mut original).await), "p1");

    let mut duplicate = Product::new("p1", "desk", 99);
    assert!(matches!(
        mapper.create(&mut duplicate).await,
        Err(OdmError::Existence(m)) if m == "Key p1 already exists"
    ));

    let stored = fixture.documents().raw("products", "p1").await.unwrap();
    assert_eq!(stored.get("name"), Some(&json!("chair")));
    assert_eq!(stored.get("price"), Some(&json!(10)));
}

#[tokio::test]
async fn test_key_validation() {
    let fixture = Fixture::new();
    let mapper = fixture.registry.mapper::<Product>("products").unwrap();

    for key in ["", "   ", "a/b", ".", "..", "__id__"] {
        assert!(
            matches!(mapper.retrieve(key).await, Err(OdmError::Format(_))),
            "key {:?}",
            key
        );
    }

    let mut blank = Product::new("  ", "chair", 1);
    assert!(matches!(mapper.create(&mut blank).await, Err(OdmError::Format(_))));

    assert!(matches!(
        fixture.registry.mapper::<Product>("a/b"),
        Err(OdmError::Format(_))
    ));
    assert_eq!(fixture.registry.mapper::<Product>("  products ").unwrap().path(), "products");
}

#[tokio::test]
async fn test_update_entity() {
    let fixture = Fixture::new();
    let mapper = fixture.registry.mapper::<Product>("products").unwrap();

    let mut product = Product::new("p1", "chair", 10);
    mapper.create(&mut product).await.unwrap();

    product.price = 12;
    product.tags = vec!["sale".to_string()];
    mapper.update(&mut product).await.unwrap();
    assert_eq!(mapper.retrieve_required("p1").await.unwrap(), product);

    let mut missing = Product::new("p2", "desk", 30);
    assert!(matches!(
        mapper.update(&mut missing).await,
        Err(OdmError::Existence(m)) if m == "Key p2 does not exist"
    ));
    assert!(!mapper.exists("p2").await.unwrap());
}

#[tokio::test]
async fn test_update_fields() {
    let fixture = Fixture::new();
    let mapper = fixture.registry.mapper::<Product>("products").unwrap();
    let mut product = Product::new("p1", "chair", 10);
    mapper.create(&mut product).await.unwrap();

    mapper
        .update_fields(fields(json!({"code": "p1", "price": 15})))
        .await
        .unwrap();
    let updated = mapper.retrieve_required("p1").await.unwrap();
    assert_eq!(updated.price, 15);
    assert_eq!(updated.name, "chair");

    assert!(matches!(
        mapper.update_fields(fields(json!({"price": 20}))).await,
        Err(OdmError::Format(m)) if m == "Field code must be in map"
    ));
    assert!(matches!(
        mapper.update_fields(fields(json!({"code": "p1", "colour": "red"}))).await,
        Err(OdmError::Format(m)) if m.contains("colour")
    ));
    assert!(matches!(
        mapper.update_fields(fields(json!({"code": "p1", "manual": "x"}))).await,
        Err(OdmError::Format(m)) if m == "File field manual can only be null in map"
    ));
    assert!(matches!(
        mapper.update_fields(fields(json!({"code": "p9", "price": 1}))).await,
        Err(OdmError::Existence(_))
    ));
    assert_eq!(mapper.retrieve_required("p1").await.unwrap().price, 15);
}

#[tokio::test]
async fn test_update_fields_through_view() {
    let fixture = Fixture::new();
    let mapper = fixture.registry.mapper::<Product>("products").unwrap();
    let mut product = Product::new("p1", "chair", 10);
    mapper.create(&mut product).await.unwrap();

    mapper
        .update_fields_with(
            fields(json!({"code": "p1", "name": "lamp"})),
            WriteOptions::new().view::<Shouting>(),
        )
        .await
        .unwrap();

    let stored = fixture.documents().raw("products", "p1").await.unwrap();
    assert_eq!(stored.get("name"), Some(&json!("LAMP")));
    assert_eq!(stored.get("price"), Some(&json!(10)));
}

#[tokio::test]
async fn test_create_and_retrieve_through_view() {
    let fixture = Fixture::new();
    let mapper = fixture.registry.mapper::<Item>("items").unwrap();

    let mut item = Item::named("Chair");
    let key = mapper
        .create_with(&mut item, WriteOptions::new().view::<Summary>())
        .await
        .unwrap();

    let stored = fixture.documents().raw("items", &key).await.unwrap();
    assert_eq!(
        Value::Object(stored),
        json!({"id": key.clone(), "label": "CHAIR", "name": "Chair"})
    );

    let plain = mapper.retrieve_required(&key).await.unwrap();
    assert_eq!(plain.name, "Chair");

    let viewed = mapper
        .retrieve_with(&key, ReadOptions::new().view::<Summary>())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(viewed.name, "chair");
    assert_eq!(viewed.id.as_deref(), Some(key.as_str()));

    let selection = mapper.select().unwrap();
    let all = mapper
        .retrieve_all_with(&selection, ReadOptions::new().view::<Summary>())
        .await
        .unwrap();
    assert_eq!(all, vec![viewed]);
}

#[tokio::test]
async fn test_broken_view_fails_before_store_calls() {
    let fixture = Fixture::new();
    let mapper = fixture.registry.mapper::<Item>("items").unwrap();

    let mut item = Item::named("chair");
    assert!(matches!(
        mapper
            .create_with(&mut item, WriteOptions::new().view::<Broken>())
            .await,
        Err(OdmError::Adapter(_))
    ));
    assert_eq!(item.id, None);
    assert_eq!(fixture.documents().call_count(), 0);
}

#[tokio::test]
async fn test_create_many_and_update_many() {
    let fixture = Fixture::new();
    let items = fixture.registry.mapper::<Item>("items").unwrap();

    let mut batch = vec![Item::named("a"), Item::named("b")];
    let keys = items.create_many(&mut batch).await.unwrap();
    assert_eq!(keys.len(), 2);
    assert_ne!(keys[0], keys[1]);
    assert_eq!(batch[1].id.as_deref(), Some(keys[1].as_str()));
    assert_eq!(fixture.documents().document_count("items").await, 2);

    let mut preset = vec![Item::named("c"), batch[0].clone()];
    assert!(matches!(
        items.create_many(&mut preset).await,
        Err(OdmError::Format(m)) if m == "All keys must be null in entities"
    ));

    let products = fixture.registry.mapper::<Product>("products").unwrap();
    let mut first = vec![Product::new("p1", "chair", 10), Product::new("p2", "desk", 30)];
    products.create_many(&mut first).await.unwrap();

    let mut overlapping = vec![Product::new("p3", "lamp", 15), Product::new("p2", "desk", 31)];
    assert!(matches!(
        products.create_many(&mut overlapping).await,
        Err(OdmError::Existence(m)) if m == "Some keys already exist"
    ));
    assert!(!products.exists("p3").await.unwrap());

    first[0].price = 11;
    first[1].price = 33;
    products.update_many(&first).await.unwrap();
    assert_eq!(products.retrieve_required("p2").await.unwrap().price, 33);

    let unknown = vec![first[0].clone(), Product::new("p9", "ghost", 0)];
    assert!(matches!(
        products.update_many(&unknown).await,
        Err(OdmError::Existence(m)) if m == "Some keys do not exist"
    ));

    assert!(products.create_many(&mut []).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete() {
    let fixture = Fixture::new();
    let mapper = fixture.registry.mapper::<Product>("products").unwrap();
    let mut products = vec![Product::new("p1", "chair", 10), Product::new("p2", "desk", 30)];
    mapper.create_many(&mut products).await.unwrap();

    mapper.delete("p1").await.unwrap();
    assert!(!mapper.exists("p1").await.unwrap());
    mapper.delete("p1").await.unwrap();

    assert!(matches!(
        mapper.delete_required("p1").await,
        Err(OdmError::Existence(_))
    ));
    mapper.delete_required("p2").await.unwrap();
    assert_eq!(fixture.documents().document_count("products").await, 0);
}

#[tokio::test]
async fn test_delete_all_returns_count() {
    let fixture = Fixture::new();
    let mapper = fixture.registry.mapper::<Product>("products").unwrap();
    let mut products = vec![
        Product::new("p1", "chair", 10),
        Product::new("p2", "desk", 30),
        Product::new("p3", "lamp", 15),
    ];
    mapper.create_many(&mut products).await.unwrap();

    let cheap = mapper.select().unwrap().where_less_than("price", 20).unwrap();
    assert_eq!(mapper.delete_all(&cheap).await.unwrap(), 2);
    assert_eq!(mapper.delete_all(&cheap).await.unwrap(), 0);
    assert_eq!(fixture.documents().document_count("products").await, 1);
}

#[tokio::test]
async fn test_mapper_binds_lazily_to_default_instance() {
    let registry = Arc::new(Registry::new());
    let mapper = registry.mapper::<Item>("items").unwrap();
    assert!(!mapper.is_bound().unwrap());

    assert!(matches!(mapper.retrieve("k").await, Err(OdmError::Connection(_))));
    assert!(!mapper.is_bound().unwrap());

    let instance = registry
        .stores()
        .create(StoreConfig::new("media"), Arc::new(MemoryConnector::new()))
        .unwrap();
    assert!(matches!(mapper.retrieve("k").await, Err(OdmError::Connection(_))));
    assert!(mapper.is_bound().unwrap());

    instance.connect().unwrap();
    assert_eq!(mapper.retrieve("k").await.unwrap(), None);

    instance.disconnect().unwrap();
    assert!(matches!(mapper.retrieve("k").await, Err(OdmError::Connection(_))));
}

#[tokio::test]
async fn test_bind_named_instance() {
    let fixture = Fixture::new();
    let other = Arc::new(MemoryConnector::new());
    fixture
        .registry
        .stores()
        .create(StoreConfig::new("archive").name("cold"), other.clone())
        .unwrap()
        .connect()
        .unwrap();

    let mapper = fixture.registry.mapper::<Item>("items").unwrap();
    assert!(matches!(mapper.bind_named("missing"), Err(OdmError::Connection(_))));
    mapper.bind_named("cold").unwrap();

    let mut item = Item::named("chair");
    let key = mapper.create(&mut item).await.unwrap();
    assert!(other.documents().raw("items", &key).await.is_some());
    assert_eq!(fixture.documents().document_count("items").await, 0);
}

#[tokio::test]
async fn test_store_failures_keep_their_kind() {
    let fixture = Fixture::new();
    let mapper = fixture.registry.mapper::<Item>("items").unwrap();

    fixture
        .documents()
        .fail_next(StoreError::Execution("backend unavailable".to_string()));
    assert_eq!(
        mapper.retrieve("k").await,
        Err(OdmError::Execution("backend unavailable".to_string()))
    );

    fixture
        .documents()
        .fail_next(StoreError::Interrupted("wait cancelled".to_string()));
    let mut item = Item::named("chair");
    let err = mapper.create(&mut item).await.unwrap_err();
    assert!(matches!(err, OdmError::Interrupted(_)));
    assert!(err.is_store_failure());

    assert_eq!(fixture.documents().document_count("items").await, 0);
    assert_ok!(mapper.retrieve("k").await);
}

#[tokio::test]
async fn test_failed_create_leaves_entity_retryable() {
    let fixture = Fixture::new();
    let mapper = fixture.registry.mapper::<Item>("items").unwrap();

    fixture
        .documents()
        .fail_next(StoreError::Execution("write rejected".to_string()));
    let mut item = Item::named("chair");
    assert_eq!(
        mapper.create(&mut item).await,
        Err(OdmError::Execution("write rejected".to_string()))
    );
    assert_eq!(item.id, None);

    let key = assert_ok!(mapper.create(&mut item).await);
    assert_eq!(item.id.as_deref(), Some(key.as_str()));
    assert_eq!(mapper.retrieve_required(&key).await.unwrap().name, "chair");
}

#[tokio::test]
async fn test_failed_create_many_resets_generated_keys() {
    let fixture = Fixture::new();
    let mapper = fixture.registry.mapper::<Item>("items").unwrap();

    fixture
        .documents()
        .fail_next(StoreError::Interrupted("commit cancelled".to_string()));
    let mut batch = vec![Item::named("a"), Item::named("b")];
    assert_err!(mapper.create_many(&mut batch).await);
    assert!(batch.iter().all(|item| item.id.is_none()));

    let keys = assert_ok!(mapper.create_many(&mut batch).await);
    assert_eq!(keys.len(), 2);
    assert_eq!(fixture.documents().document_count("items").await, 2);
}

#[tokio::test]
async fn test_create_many_rejects_keys_repeated_in_batch() {
    let fixture = Fixture::new();
    let mapper = fixture.registry.mapper::<Product>("products").unwrap();

    let mut twins = vec![Product::new("p1", "chair", 10), Product::new("p1", "desk", 30)];
    assert!(matches!(
        mapper.create_many(&mut twins).await,
        Err(OdmError::Existence(m)) if m == "Key p1 appears more than once in entities"
    ));
    assert!(!mapper.exists("p1").await.unwrap());
    assert_eq!(fixture.documents().call_count(), 1);
}
