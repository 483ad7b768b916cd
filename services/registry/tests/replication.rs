//! Resolution client against a live registry over HTTP

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use gateway_registry::{
    router, AppState, Directory, HttpDirectory, MemoryDirectory, ResolutionClient,
};

async fn spawn_registry(store: Arc<MemoryDirectory>, write_token: Option<&str>) -> SocketAddr {
    let app = router(AppState::new(store, write_token.map(str::to_string)));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn remote(addr: SocketAddr) -> HttpDirectory {
    HttpDirectory::new(&format!("http://{}", addr), Duration::from_secs(2)).unwrap()
}

async fn wait_for(client: &ResolutionClient, name: &str) -> Option<String> {
    for _ in 0..100 {
        if let Some(id) = client.lookup(name) {
            return Some(id);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    None
}

#[tokio::test]
async fn test_refresh_replicates_primary_into_fallback() {
    let primary_store = Arc::new(MemoryDirectory::new());
    let fallback_store = Arc::new(MemoryDirectory::new());
    primary_store.put("gw1", "id1").await.unwrap();

    let primary_addr = spawn_registry(primary_store.clone(), None).await;
    let fallback_addr = spawn_registry(fallback_store.clone(), Some("replica-token")).await;

    let client = ResolutionClient::new(
        Arc::new(remote(primary_addr)),
        Arc::new(remote(fallback_addr)),
        Duration::from_secs(60),
    );

    assert_eq!(client.lookup("gw1"), None);
    client.refresh("gw1", Some("replica-token"));

    assert_eq!(wait_for(&client, "gw1").await.as_deref(), Some("id1"));

    let mut replicated = None;
    for _ in 0..100 {
        if let Ok(entry) = fallback_store.get("gw1").await {
            replicated = Some(entry.gateway_id);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(replicated.as_deref(), Some("id1"));
}

#[tokio::test]
async fn test_replication_without_token_is_rejected() {
    let primary_store = Arc::new(MemoryDirectory::new());
    let fallback_store = Arc::new(MemoryDirectory::new());
    primary_store.put("gw1", "id1").await.unwrap();

    let fallback_addr = spawn_registry(fallback_store.clone(), Some("replica-token")).await;
    let client = ResolutionClient::new(
        primary_store,
        Arc::new(remote(fallback_addr)),
        Duration::from_secs(60),
    );

    // Cache still fills even though the fallback refused the write
    assert_eq!(client.refresh_now("gw1", None).await.as_deref(), Some("id1"));
    assert!(fallback_store.get("gw1").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_fallback_serves_removed_entry() {
    let primary_store = Arc::new(MemoryDirectory::new());
    let fallback_store = Arc::new(MemoryDirectory::new());
    fallback_store.put("gw1", "id1").await.unwrap();

    let primary_addr = spawn_registry(primary_store, None).await;
    let client = ResolutionClient::new(
        Arc::new(remote(primary_addr)),
        fallback_store,
        Duration::from_secs(60),
    );

    assert_eq!(client.refresh_now("gw1", None).await.as_deref(), Some("id1"));
    assert_eq!(client.lookup("gw1").as_deref(), Some("id1"));
}

#[tokio::test]
async fn test_lookup_expires_after_ttl() {
    let primary = Arc::new(MemoryDirectory::new());
    primary.put("gw1", "id1").await.unwrap();
    let client = ResolutionClient::new(
        primary.clone(),
        Arc::new(MemoryDirectory::new()),
        Duration::from_millis(100),
    );

    client.refresh_now("gw1", None).await;
    assert_eq!(client.lookup("gw1").as_deref(), Some("id1"));

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(client.lookup("gw1"), None);
    assert!(primary.get("gw1").await.is_ok());
}

#[tokio::test]
async fn test_remote_directory_round_trip() {
    let store = Arc::new(MemoryDirectory::new());
    let addr = spawn_registry(store.clone(), Some("admin")).await;
    let directory = remote(addr).with_write_token("admin");

    directory.put("123:us-east-1:gw1", "id1").await.unwrap();
    directory.put_token("123:us-east-1:gw1", "gw-token").await.unwrap();

    let entry = directory.get("123:us-east-1:gw1").await.unwrap();
    assert_eq!(entry.gateway_id, "id1");
    assert_eq!(
        store.get("123:us-east-1:gw1").await.unwrap().token.as_deref(),
        Some("gw-token")
    );
    assert_eq!(directory.dump().await.unwrap().len(), 1);
    assert!(directory.get("missing").await.unwrap_err().is_not_found());
}
