use std::net::SocketAddr;
use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use radio_core::api::{cover_file_name, ApiError, StationApi, MAX_CACHED_COVERS, MAX_COVER_BYTES};
use radio_core::config::{PollingConfig, StationConfig};
use radio_core::track::{ListenerCount, TrackId};
use serde_json::json;

/// Serve `router` under `/station/test` on an ephemeral port.
async fn spawn_station(router: Router) -> SocketAddr {
    let app = Router::new().nest("/station/test", router);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn api_for(addr: SocketAddr, timeout_ms: u64) -> StationApi {
    let station = StationConfig {
        name: "test".into(),
        api_base: format!("http://{}/", addr),
        ..StationConfig::default()
    };
    let polling = PollingConfig {
        timeout_ms,
        max_history: 2,
        ..PollingConfig::default()
    };
    StationApi::new(&station, &polling).unwrap()
}

#[tokio::test]
async fn fetches_current_song_listeners_and_history() {
    let router = Router::new()
        .route(
            "/current_song",
            get(|| async {
                Json(json!({
                    "id": 5,
                    "title": "Song A",
                    "artist": { "name": "Band", "image": "http://img.test/band.jpg" },
                    "started_at": "2024-03-01 18:04:11 +0100"
                }))
            }),
        )
        .route("/listeners", get(|| async { Json(json!({ "listeners": 42 })) }))
        .route(
            "/last_songs",
            get(|| async {
                Json(json!([
                    { "title": "One", "artist": { "name": "A" }, "started_at": "2024-03-01 18:00:00 +0100" },
                    "garbage",
                    { "title": "Two", "artist": { "name": "B" }, "started_at": "not a time" },
                    { "title": "Three", "artist": { "name": "C" } }
                ]))
            }),
        );
    let api = api_for(spawn_station(router).await, 2000);

    let track = api.fetch_current_track().await.unwrap();
    assert_eq!(track.id, Some(TrackId::new("5")));
    assert_eq!(track.display_key(), "Band - Song A");
    assert_eq!(
        track.artist_image_url.as_deref(),
        Some("http://img.test/band.jpg")
    );
    assert!(track.started_at.is_some());

    assert_eq!(
        api.fetch_listener_count().await,
        Some(ListenerCount::Known(42))
    );

    let history = api.fetch_history().await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].label, "A - One");
    assert_eq!(history[1].label, "B - Two");
    assert_eq!(history[1].time, "--:--");
}

#[tokio::test]
async fn listener_count_accepts_current_and_unknown_shapes() {
    let router = Router::new().route("/listeners", get(|| async { Json(json!({ "current": 7 })) }));
    let api = api_for(spawn_station(router).await, 2000);
    assert_eq!(api.fetch_listener_count().await, Some(ListenerCount::Known(7)));

    let router = Router::new().route("/listeners", get(|| async { Json(json!({ "count": "x" })) }));
    let api = api_for(spawn_station(router).await, 2000);
    assert_eq!(api.fetch_listener_count().await, Some(ListenerCount::Unknown));
    assert_eq!(ListenerCount::Unknown.label(), "? Live");
}

#[tokio::test]
async fn non_success_status_is_soft_failure() {
    let router = Router::new().route(
        "/current_song",
        get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") }),
    );
    let api = api_for(spawn_station(router).await, 2000);

    match api.get_json("/current_song").await {
        Err(ApiError::Status { status, .. }) => assert_eq!(status, 503),
        other => panic!("expected status error, got {:?}", other),
    }
    assert!(api.fetch_current_track().await.is_none());
    // unrouted path: 404, no rows
    assert!(api.fetch_history().await.is_empty());
}

#[tokio::test]
async fn slow_response_times_out() {
    let router = Router::new().route(
        "/current_song",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({ "id": 1, "title": "late" }))
        }),
    );
    let api = api_for(spawn_station(router).await, 150);

    match api.get_json("/current_song").await {
        Err(ApiError::Timeout { timeout, .. }) => assert_eq!(timeout, Duration::from_millis(150)),
        other => panic!("expected timeout, got {:?}", other),
    }
}

#[tokio::test]
async fn non_json_body_is_soft_failure() {
    let router = Router::new().route("/current_song", get(|| async { "<html>maintenance</html>" }));
    let api = api_for(spawn_station(router).await, 2000);
    assert!(api.fetch_current_track().await.is_none());
}

#[tokio::test]
async fn cover_is_cached_capped_and_pruned() {
    let router = Router::new()
        .route("/cover.jpg", get(|| async { vec![7u8; 64] }))
        .route("/huge.jpg", get(|| async { vec![0u8; MAX_COVER_BYTES + 1] }));
    let addr = spawn_station(router).await;
    let api = api_for(addr, 2000);
    let cache = tempfile::tempdir().unwrap();

    for i in 0..MAX_CACHED_COVERS + 5 {
        std::fs::write(cache.path().join(format!("cover-old-{}", i)), b"x").unwrap();
    }
    std::fs::write(cache.path().join("unrelated.txt"), b"keep").unwrap();

    let url = format!("http://{}/station/test/cover.jpg", addr);
    let path = api
        .fetch_cover(&url, cache.path().to_path_buf())
        .await
        .unwrap();
    assert_eq!(path, cache.path().join(cover_file_name(&url)));
    assert_eq!(std::fs::read(&path).unwrap(), vec![7u8; 64]);

    let covers = std::fs::read_dir(cache.path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().starts_with("cover-"))
        .count();
    assert_eq!(covers, MAX_CACHED_COVERS);
    assert!(cache.path().join("unrelated.txt").exists());

    let huge = format!("http://{}/station/test/huge.jpg", addr);
    assert_eq!(api.fetch_cover(&huge, cache.path().to_path_buf()).await, None);
    assert!(!cache.path().join(cover_file_name(&huge)).exists());
}
