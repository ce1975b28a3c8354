//! Integration tests: several replicas kept coherent over one bus.

use livecache::{
    Catalog, ChannelEvent, ChannelHandler, ChannelMode, ConfigDocument, ConfigManager,
    ConfigStatus, Document, EventKind, ItemId, ListenerConfig, LiveCatalog, LiveConfig,
    LiveStoreConfig, MemoryBackend, MemoryBus, MemoryColdStore, Version,
};
use serde_json::{json, Map};
use std::sync::Arc;
use std::time::Duration;

type Products = LiveCatalog<Document, MemoryColdStore<Document>>;
type Limits = LiveConfig<ConfigDocument, MemoryColdStore<ConfigDocument>>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

async fn connected(bus: &MemoryBus) -> Arc<ChannelHandler<MemoryBackend>> {
    let handler = Arc::new(bus.handler(ChannelMode::Dual));
    handler.connect().await.unwrap();
    handler
}

async fn products(bus: &MemoryBus, cold: &Arc<MemoryColdStore<Document>>) -> Products {
    let store = Products::new(LiveStoreConfig::named("products"), Catalog::new())
        .unwrap()
        .with_cold_store(Arc::clone(cold))
        .with_transport(connected(bus).await);
    store.init().await.unwrap();
    store
}

async fn limits(bus: &MemoryBus, cold: &Arc<MemoryColdStore<ConfigDocument>>) -> Limits {
    let store = Limits::new(LiveStoreConfig::named("limits"), ConfigManager::new())
        .unwrap()
        .with_cold_store(Arc::clone(cold))
        .with_transport(connected(bus).await);
    store.init().await.unwrap();
    store
}

/// Poll `check` until it holds or a second has passed.
async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

// --- Catalog replicas ---

#[tokio::test]
async fn test_catalog_replicas_converge() {
    init_tracing();
    let bus = MemoryBus::new();
    let cold = Arc::new(MemoryColdStore::with_records(vec![
        Document::new(1).with_field("name", json!("bolt")),
        Document::new(2).with_field("name", json!("nut")),
    ]));

    let writer = products(&bus, &cold).await;
    let reader = products(&bus, &cold).await;
    assert_eq!(bus.subscriber_count("CATALOG:products"), 2);

    writer
        .create_new(&Document::new(3).with_field("name", json!("washer")))
        .await
        .unwrap();
    let mut price = Map::new();
    price.insert("price".into(), json!(4));
    writer.update_one(ItemId(1), &price).await.unwrap();
    writer.remove(ItemId(2)).await.unwrap();

    for store in [&writer, &reader] {
        assert_eq!(store.drain().await.unwrap(), 3);
        let ids: Vec<i64> = store.fetch_all().iter().map(|d| d.id.0).collect();
        assert_eq!(ids, vec![1, 3]);
        let bolt = store.find_by_id(ItemId(1)).unwrap().unwrap();
        assert_eq!(bolt.get("price"), Some(&json!(4)));
        assert_eq!(bolt.get("name"), Some(&json!("bolt")));
    }
}

#[tokio::test]
async fn test_seeded_catalog_remove() {
    let bus = MemoryBus::new();
    let cold = Arc::new(MemoryColdStore::with_records(vec![
        Document::new(1),
        Document::new(2),
    ]));
    let store = products(&bus, &cold).await;
    assert_eq!(store.size(), 2);

    store.remove(ItemId(1)).await.unwrap();
    store.drain().await.unwrap();

    assert_eq!(store.size(), 1);
    assert!(store.find_by_id(ItemId(1)).unwrap().is_none());
}

#[tokio::test]
async fn test_reads_are_independent_copies() {
    let bus = MemoryBus::new();
    let cold = Arc::new(MemoryColdStore::with_records(vec![
        Document::new(1).with_field("name", json!("bolt")),
    ]));
    let store = products(&bus, &cold).await;

    let mut copy = store.find_by_id(ItemId(1)).unwrap().unwrap();
    copy.fields.insert("name".into(), json!("changed"));

    let fresh = store.find_by_id(ItemId(1)).unwrap().unwrap();
    assert_eq!(fresh.get("name"), Some(&json!("bolt")));
}

#[tokio::test]
async fn test_dispatcher_task_applies_messages() {
    init_tracing();
    let bus = MemoryBus::new();
    let cold = Arc::new(MemoryColdStore::new());

    let writer = products(&bus, &cold).await;
    let reader = Arc::new(products(&bus, &cold).await);
    let dispatcher = tokio::spawn(Arc::clone(&reader).run());

    writer.create_new(&Document::new(10)).await.unwrap();
    writer.create_new(&Document::new(5)).await.unwrap();

    assert!(eventually(|| reader.size() == 2).await);
    let ids: Vec<i64> = reader.fetch_all().iter().map(|d| d.id.0).collect();
    assert_eq!(ids, vec![5, 10]);

    dispatcher.abort();
}

#[tokio::test]
async fn test_dispatcher_does_not_block_inbox_users() {
    let bus = MemoryBus::new();
    let cold = Arc::new(MemoryColdStore::new());

    let writer = products(&bus, &cold).await;
    let reader = Arc::new(products(&bus, &cold).await);
    let dispatcher = tokio::spawn(Arc::clone(&reader).run());

    writer.create_new(&Document::new(1)).await.unwrap();
    assert!(eventually(|| reader.size() == 1).await);

    let second_init = tokio::time::timeout(Duration::from_secs(1), reader.init()).await;
    assert!(matches!(second_init, Ok(Ok(()))));
    let drained = tokio::time::timeout(Duration::from_secs(1), reader.drain()).await;
    assert!(matches!(drained, Ok(Ok(0))));
    // Only one dispatcher may own the subscription
    assert!(Arc::clone(&reader).run().await.is_err());

    // Stopping the dispatcher hands the subscription back to drain
    dispatcher.abort();
    let _ = dispatcher.await;
    writer.create_new(&Document::new(2)).await.unwrap();
    assert_eq!(reader.drain().await.unwrap(), 1);
    assert_eq!(reader.size(), 2);
}

#[tokio::test]
async fn test_late_replica_bootstraps_current_state() {
    let bus = MemoryBus::new();
    let cold = Arc::new(MemoryColdStore::new());

    let writer = products(&bus, &cold).await;
    writer.create_new(&Document::new(1)).await.unwrap();
    writer.create_new(&Document::new(2)).await.unwrap();

    let late = products(&bus, &cold).await;
    assert_eq!(late.size(), 2);
    // Nothing published before it subscribed reaches it
    assert_eq!(late.drain().await.unwrap(), 0);
}

// --- Config replicas ---

#[tokio::test]
async fn test_config_activation_reaches_every_replica() {
    init_tracing();
    let bus = MemoryBus::new();
    let cold = Arc::new(MemoryColdStore::with_records(vec![
        ConfigDocument::new(1, ConfigStatus::Inactive),
        ConfigDocument::new(2, ConfigStatus::Active),
    ]));

    let admin = limits(&bus, &cold).await;
    let worker = limits(&bus, &cold).await;

    admin.activate(Version(1)).await.unwrap();

    for store in [&admin, &worker] {
        store.drain().await.unwrap();
        assert_eq!(store.active_version(), Some(Version(1)));
        let previous = store.get(Version(2)).unwrap().unwrap();
        assert_eq!(previous.status, ConfigStatus::Inactive);
    }
}

#[tokio::test]
async fn test_revision_workflow() {
    let bus = MemoryBus::new();
    let cold = Arc::new(MemoryColdStore::with_records(vec![
        ConfigDocument::new(1, ConfigStatus::Active).with_field("rate", json!(100)),
    ]));

    let admin = limits(&bus, &cold).await;
    let worker = limits(&bus, &cold).await;

    let mut draft = admin.active().unwrap();
    draft.fields.insert("rate".into(), json!(250));
    let revision = admin.publish_revision(&draft).await.unwrap();
    admin.drain().await.unwrap();

    admin.activate(revision).await.unwrap();
    admin.remove(Version(1)).await.unwrap_err();
    admin.drain().await.unwrap();
    admin.remove(Version(1)).await.unwrap();

    worker.drain().await.unwrap();
    assert_eq!(worker.size(), 1);
    let active = worker.active().unwrap();
    assert_eq!(active.version, Version(2));
    assert_eq!(active.get("rate"), Some(&json!(250)));
}

#[tokio::test]
async fn test_catalog_and_config_channels_are_separate() {
    let bus = MemoryBus::new();
    let items = Arc::new(MemoryColdStore::new());
    let configs = Arc::new(MemoryColdStore::with_records(vec![
        ConfigDocument::new(1, ConfigStatus::Active),
    ]));

    let catalog = products(&bus, &items).await;
    let config = limits(&bus, &configs).await;

    catalog.create_new(&Document::new(1)).await.unwrap();
    assert_eq!(config.drain().await.unwrap(), 0);
    assert_eq!(catalog.drain().await.unwrap(), 1);
}

// --- Transport notifications ---

#[tokio::test]
async fn test_broadcast_emits_published_event() {
    let bus = MemoryBus::new();
    let cold = Arc::new(MemoryColdStore::new());
    let handler = connected(&bus).await;
    let events = handler.listen(ListenerConfig::on(EventKind::Published));

    let store = Products::new(LiveStoreConfig::named("products"), Catalog::new())
        .unwrap()
        .with_cold_store(cold)
        .with_transport(Arc::clone(&handler) as Arc<dyn livecache::Transport>);
    store.init().await.unwrap();

    store.create_new(&Document::new(7)).await.unwrap();

    assert_eq!(
        events.try_recv().unwrap(),
        ChannelEvent::Published {
            channel: "CATALOG:products".to_string(),
            message: "UPDATE:7".to_string(),
        }
    );
    assert!(events.try_recv().is_err());
}
