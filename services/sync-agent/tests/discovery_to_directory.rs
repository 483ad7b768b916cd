//! Discovery cycles feeding a registry, read back through the resolution client

use std::sync::Arc;
use std::time::Duration;

use gateway_registry::{
    router, AppState, Directory, HttpDirectory, MemoryDirectory, ResolutionClient,
};
use gateway_sync::sinks::{DirectSink, GatewaySink, WebhookSink};
use gateway_sync::{
    parse_credentials, ArnAccountResolver, DiscoveredItem, PropagationOptions, Propagator,
    StaticInventory,
};

const CREDENTIALS: &str = r#"
- role_arn: arn:aws:iam::123456789012:role/gateway-reader
  region: us-east-1
  default_token: shared-token
  only:
    g1:
      rename: gw1
      token: gw1-token
    g3:
"#;

fn inventory() -> StaticInventory {
    let mut inventory = StaticInventory::new();
    inventory.insert(
        "arn:aws:iam::123456789012:role/gateway-reader",
        vec![
            DiscoveredItem::new("g1", "id1"),
            DiscoveredItem::new("g2", "id2"),
            DiscoveredItem::new("g2", "id2dup"),
            DiscoveredItem::new("g3", "id3"),
            DiscoveredItem::new("g5", "id5"),
        ],
    );
    inventory
}

fn options() -> PropagationOptions {
    PropagationOptions {
        retry: 2,
        retry_interval: Duration::from_millis(10),
        call_timeout: Duration::from_secs(2),
        dry_run: false,
    }
}

#[tokio::test]
async fn test_direct_sink_populates_directory() {
    let directory = Arc::new(MemoryDirectory::new());
    let propagator = Propagator::new(
        Arc::new(inventory()),
        Arc::new(ArnAccountResolver),
        Arc::new(DirectSink::new(directory.clone())),
        options(),
    );

    let credentials = parse_credentials(CREDENTIALS).unwrap();
    let report = propagator.run_cycle(&credentials).await;

    assert_eq!(report.saved, 2);
    assert_eq!(report.duplicates, 1);
    assert_eq!(report.filtered, 1);

    let names: Vec<String> = directory
        .dump()
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.gateway_name)
        .collect();
    assert_eq!(
        names,
        vec!["123456789012:us-east-1:g3", "123456789012:us-east-1:gw1"]
    );

    let gw1 = directory.get("123456789012:us-east-1:gw1").await.unwrap();
    assert_eq!(gw1.gateway_id, "id1");
    assert_eq!(gw1.token.as_deref(), Some("gw1-token"));
    let g3 = directory.get("123456789012:us-east-1:g3").await.unwrap();
    assert_eq!(g3.token.as_deref(), Some("shared-token"));

    // Readers pick the entries up through refresh
    let client = ResolutionClient::new(
        directory.clone(),
        Arc::new(MemoryDirectory::new()),
        Duration::from_secs(60),
    );
    assert_eq!(client.lookup("123456789012:us-east-1:gw1"), None);
    client.refresh_now("123456789012:us-east-1:gw1", None).await;
    assert_eq!(
        client.lookup("123456789012:us-east-1:gw1").as_deref(),
        Some("id1")
    );
}

#[tokio::test]
async fn test_webhook_sink_against_registry() {
    let store = Arc::new(MemoryDirectory::new());
    let app = router(AppState::new(store.clone(), Some("shared-token".to_string())));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let sink = WebhookSink::new(&format!("http://{}", addr), Duration::from_secs(2)).unwrap();
    let propagator = Propagator::new(
        Arc::new(inventory()),
        Arc::new(ArnAccountResolver),
        Arc::new(sink),
        options(),
    );

    let credentials = parse_credentials(CREDENTIALS).unwrap();
    let report = propagator.run_cycle(&credentials).await;

    // gw1 carries its own token, which the registry does not know: rejected
    // after both attempts. g3 carries the shared token and lands.
    assert_eq!(report.saved, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(
        store.get("123456789012:us-east-1:g3").await.unwrap().gateway_id,
        "id3"
    );
    assert!(store
        .get("123456789012:us-east-1:gw1")
        .await
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
async fn test_direct_sink_forwards_item_token_to_remote_directory() {
    let store = Arc::new(MemoryDirectory::new());
    let app = router(AppState::new(store.clone(), Some("admin".to_string())));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // No write token configured on the remote directory itself
    let remote = HttpDirectory::new(&format!("http://{}", addr), Duration::from_secs(2)).unwrap();
    let sink = DirectSink::new(Arc::new(remote));

    sink.save("a:r:gw2", "id2", Some("admin")).await.unwrap();
    sink.save("a:r:gw2", "id3", Some("admin")).await.unwrap();

    let entry = store.get("a:r:gw2").await.unwrap();
    assert_eq!(entry.gateway_id, "id3");
    assert_eq!(entry.changes, 2);
    assert_eq!(entry.token.as_deref(), Some("admin"));

    assert!(sink.save("a:r:gw3", "id4", None).await.is_err());
    assert!(store.get("a:r:gw3").await.unwrap_err().is_not_found());
}
