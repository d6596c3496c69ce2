//! End-to-end streaming from the local directory adapter

use std::sync::Arc;

use loopcast_core::test_fixtures::{patterned_bytes, temp_local_share};
use loopcast_core::{LoopcastConfig, RemoteAccess, StreamProxy};
use reqwest::StatusCode;
use reqwest::header::RANGE;

#[tokio::test]
async fn test_stream_from_local_directory() -> anyhow::Result<()> {
    let data = patterned_bytes(70_000);
    let (share, _temp_dir) = temp_local_share(&[("shows/s01/e01.mkv", data.clone())]);
    let share: Arc<dyn RemoteAccess> = Arc::new(share);
    let proxy = StreamProxy::new(LoopcastConfig::for_testing());

    let url = proxy
        .register(share, "shows/s01/e01.mkv", Some("Episode 1".to_string()))
        .await?;

    let full = reqwest::get(&url).await?;
    assert_eq!(full.status(), StatusCode::OK);
    assert_eq!(full.bytes().await?.as_ref(), data.as_slice());

    let partial = reqwest::Client::new()
        .get(&url)
        .header(RANGE, "bytes=65536-")
        .send()
        .await?;
    assert_eq!(partial.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(partial.bytes().await?.as_ref(), &data[65536..]);

    Ok(())
}

#[tokio::test]
async fn test_escaping_path_is_rejected() -> anyhow::Result<()> {
    let (share, _temp_dir) = temp_local_share(&[("inside.mkv", patterned_bytes(10))]);
    let share: Arc<dyn RemoteAccess> = Arc::new(share);
    let proxy = StreamProxy::new(LoopcastConfig::for_testing());

    let url = proxy.register(share, "../outside.mkv", None).await?;
    let response = reqwest::get(&url).await?;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    Ok(())
}
