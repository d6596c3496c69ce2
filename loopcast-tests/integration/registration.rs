//! Integration tests for registration, revocation and expiry

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use loopcast_core::test_fixtures::{memory_share, patterned_bytes};
use loopcast_core::{LoopcastConfig, RemoteAccess, StreamProxy};
use reqwest::StatusCode;

use crate::common::{serve_memory_file, serve_memory_file_with};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registrations_share_one_listener() {
    let share: Arc<dyn RemoteAccess> = Arc::new(memory_share(&[
        ("a.mkv", patterned_bytes(100)),
        ("b.mkv", patterned_bytes(200)),
    ]));
    let proxy = Arc::new(StreamProxy::new(LoopcastConfig::for_testing()));

    // Spawned so registrations race on separate worker threads
    let registrations = (0..32).map(|i| {
        let proxy = proxy.clone();
        let share = share.clone();
        let path = if i % 2 == 0 { "a.mkv" } else { "b.mkv" };
        tokio::spawn(async move { proxy.register(share, path, Some(format!("Item {i}"))).await })
    });
    let urls: Vec<String> = join_all(registrations)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    let port = proxy.port().unwrap();
    let unique: HashSet<&String> = urls.iter().collect();
    assert_eq!(unique.len(), 32);
    assert!(
        urls.iter()
            .all(|url| url.starts_with(&format!("http://127.0.0.1:{port}/stream/")))
    );
    assert_eq!(proxy.registry().len(), 32);

    // Same path registered twice yields two working tokens
    for (i, url) in urls.iter().enumerate().take(4) {
        let expected = if i % 2 == 0 { 100 } else { 200 };
        let body = reqwest::get(url).await.unwrap().bytes().await.unwrap();
        assert_eq!(body.len(), expected);
    }
}

#[tokio::test]
async fn test_registrations_keep_their_own_share() {
    let first: Arc<dyn RemoteAccess> =
        Arc::new(memory_share(&[("same.mkv", vec![1u8; 10])]));
    let second: Arc<dyn RemoteAccess> =
        Arc::new(memory_share(&[("same.mkv", vec![2u8; 20])]));
    let proxy = StreamProxy::new(LoopcastConfig::for_testing());

    let first_url = proxy.register(first, "same.mkv", None).await.unwrap();
    let second_url = proxy.register(second, "same.mkv", None).await.unwrap();

    let first_body = reqwest::get(&first_url).await.unwrap().bytes().await.unwrap();
    let second_body = reqwest::get(&second_url).await.unwrap().bytes().await.unwrap();
    assert_eq!(first_body.as_ref(), &[1u8; 10]);
    assert_eq!(second_body.as_ref(), &[2u8; 20]);
}

#[tokio::test]
async fn test_revoked_url_is_not_found() {
    let fixture = serve_memory_file("a.mkv", patterned_bytes(100)).await;
    assert_eq!(reqwest::get(&fixture.url).await.unwrap().status(), StatusCode::OK);

    assert!(fixture.proxy.revoke_url(&fixture.url));

    assert_eq!(
        reqwest::get(&fixture.url).await.unwrap().status(),
        StatusCode::NOT_FOUND
    );
    // The listener is still up for other tokens
    assert!(fixture.proxy.is_serving());
}

#[tokio::test]
async fn test_expired_registration_is_not_found() {
    let mut config = LoopcastConfig::for_testing();
    config.registry.registration_ttl = Some(Duration::from_millis(100));
    let fixture = serve_memory_file_with(config, "a.mkv", patterned_bytes(100)).await;

    assert_eq!(reqwest::get(&fixture.url).await.unwrap().status(), StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(250)).await;

    assert_eq!(
        reqwest::get(&fixture.url).await.unwrap().status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(fixture.proxy.resolve_display_name(&fixture.url), None);
}

#[tokio::test]
async fn test_display_name_round_trip() {
    let share: Arc<dyn RemoteAccess> = Arc::new(memory_share(&[("a.mkv", patterned_bytes(10))]));
    let proxy = StreamProxy::new(LoopcastConfig::for_testing());

    let url = proxy
        .register(share, "a.mkv", Some("Holiday Video".to_string()))
        .await
        .unwrap();

    assert_eq!(
        proxy.resolve_display_name(&url).as_deref(),
        Some("Holiday Video")
    );
}
