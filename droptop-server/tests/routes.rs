//! Router behaviour against the in-memory store

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use droptop_server::{build_router, AppState, CatalogConfig, FixedStaticData, ServerSettings};
use droptop_store::{DocumentClient, MemoryStore, Namespace, StoreConfig};
use serde_json::{json, Value};
use tower::ServiceExt;

fn seeded_store(catalog: &CatalogConfig) -> MemoryStore {
    let store = MemoryStore::new();
    store
        .seed(
            &Namespace::new(&catalog.database, &catalog.apps_collection),
            [
                json!({"id": 1, "uuid": "a-1", "name": "Spotify Controls", "downloads": 41,
                       "direct_download_link": "https://cdn.example.com/spotify.rmskin"}),
                json!({"id": 2, "uuid": "a-2", "name": "Weather", "downloads": 3}),
            ],
        )
        .unwrap();
    store
        .seed(
            &Namespace::new(&catalog.database, &catalog.themes_collection),
            [json!({"id": 1, "uuid": "t-1", "name": "Nord", "downloads": 9})],
        )
        .unwrap();
    store
        .seed(
            &Namespace::new(&catalog.database, &catalog.counters_collection),
            [
                json!({"title": "downloads", "basic_downloads": 1200, "update_downloads": 340}),
                json!({"title": "version", "version": "4.2.0"}),
            ],
        )
        .unwrap();
    store
}

fn static_data() -> FixedStaticData {
    FixedStaticData {
        changelog: vec![
            json!({"version": "4.2.0", "changes": ["Faster launcher"]}),
            json!({"version": "4.1.0", "changes": ["Themes"]}),
        ],
        announcements: json!({"announcements": [{"title": "Welcome"}]}),
    }
}

fn app_with(store: &MemoryStore, catalog: CatalogConfig) -> Router {
    let client = DocumentClient::spawn(store.connector(), &StoreConfig::default());
    let state = AppState::new(client, catalog, static_data());
    build_router(state, &ServerSettings::default())
}

fn app() -> (Router, MemoryStore) {
    let catalog = CatalogConfig::default();
    let store = seeded_store(&catalog);
    (app_with(&store, catalog), store)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

async fn post(app: &Router, uri: &str, key: Option<&str>) -> (StatusCode, Value) {
    let mut request = Request::builder().method("POST").uri(uri);
    if let Some(key) = key {
        request = request.header(header::AUTHORIZATION, key);
    }
    send(app, request.body(Body::empty()).unwrap()).await
}

#[tokio::test]
async fn root_requires_version() {
    let (app, _) = app();
    let (status, body) = get(&app, "/").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "Bad Request");
    assert_eq!(body["error"]["status"], 400);
    assert_eq!(body["error"]["message"], "You need to specify the api version.");
}

#[tokio::test]
async fn health_reports_store_state_without_connecting() {
    let (app, store) = app();
    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "disconnected");
    assert_eq!(store.connection_count(), 0);
}

#[tokio::test]
async fn listing_ping_and_version() {
    let (app, _) = app();

    let (status, body) = get(&app, "/v1").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().len() > 10);

    let (_, body) = get(&app, "/v1/ping").await;
    assert_eq!(body, json!({"message": "pong"}));

    let (status, body) = get(&app, "/v1/version").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"title": "version", "version": "4.2.0"}));
}

#[tokio::test]
async fn lists_and_lookups() {
    let (app, store) = app();

    let (status, body) = get(&app, "/v1/community-apps").await;
    assert_eq!(status, StatusCode::OK);
    let apps = body.as_array().unwrap();
    assert_eq!(apps.len(), 2);
    assert!(apps.iter().all(|a| a.get("_id").is_none()));

    let (_, trailing) = get(&app, "/v1/community-apps/").await;
    assert_eq!(trailing, body);

    let (status, body) = get(&app, "/v1/community-apps/2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Weather");

    let (_, by_id) = get(&app, "/v1/community-apps/id/2").await;
    assert_eq!(by_id, body);

    let (status, body) = get(&app, "/v1/community-apps/name/spotify%20controls").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["uuid"], "a-1");

    let (status, body) = get(&app, "/v1/community-themes/uuid/t-1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Nord");

    // All of the above shared one connection
    assert_eq!(store.connection_count(), 1);
}

#[tokio::test]
async fn bad_and_unknown_ids() {
    let (app, _) = app();

    let (status, body) = get(&app, "/v1/community-themes/abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "Invalid id");
    assert_eq!(body["error"]["message"], "The 'abc' id is not a number.");

    let (status, body) = get(&app, "/v1/community-themes/id/77").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body["error"]["message"],
        "The theme with the '77' id does not exist."
    );

    let (status, body) = get(&app, "/v1/community-apps/uuid/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], "The app with the 'nope' uuid does not exist.");
}

#[tokio::test]
async fn bare_lookup_paths_redirect_to_list() {
    let (app, _) = app();
    for path in ["id", "name", "uuid", "download"] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/v1/community-apps/{path}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{path}");
        assert_eq!(
            response.headers()[header::LOCATION],
            "/v1/community-apps/"
        );
    }
}

#[tokio::test]
async fn download_counts_and_redirects() {
    let (app, _) = app();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/v1/community-apps/download/a-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers()[header::LOCATION],
        "https://cdn.example.com/spotify.rmskin"
    );

    let (_, body) = get(&app, "/v1/downloads/community-apps/a-1").await;
    assert_eq!(body, json!({"uuid": "a-1", "downloads": 42}));

    // No link on record
    let (status, _) = get(&app, "/v1/community-apps/download/a-2").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, body) = get(&app, "/v1/downloads/community-apps/a-2").await;
    assert_eq!(body["downloads"], 3);
}

#[tokio::test]
async fn download_totals() {
    let (app, _) = app();
    let (status, body) = get(&app, "/v1/downloads").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"basic_downloads": 1200, "update_downloads": 340}));
}

#[tokio::test]
async fn counters_need_a_uuid() {
    let (app, _) = app();
    let (status, body) = get(&app, "/v1/downloads/community-themes").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "You need to specify an uuid.");

    let (status, _) = post(&app, "/v1/downloads/community-apps", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn increment_is_open_without_api_key() {
    let (app, _) = app();

    let (status, body) = post(&app, "/v1/downloads/community-themes/t-1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"uuid": "t-1", "downloads": 10}));

    let (status, body) = post(&app, "/v1/downloads/community-themes/new-theme", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"uuid": "new-theme", "downloads": 1}));
}

#[tokio::test]
async fn increment_checks_configured_api_key() {
    let catalog = CatalogConfig {
        api_key: Some("s3cret".to_string()),
        ..CatalogConfig::default()
    };
    let store = seeded_store(&catalog);
    let app = app_with(&store, catalog);

    let (status, body) = post(&app, "/v1/downloads/community-apps/a-2", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["message"], "You need to specify a valid API KEY.");

    let (status, _) = post(&app, "/v1/downloads/community-apps/a-2", Some("wrong")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = post(&app, "/v1/downloads/community-apps/a-2", Some("s3cret")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["downloads"], 4);
}

#[tokio::test]
async fn changelog_and_announcements() {
    let (app, store) = app();

    let (status, body) = get(&app, "/v1/changelog").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, body) = get(&app, "/v1/changelog/4.1.0").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changes"][0], "Themes");

    let (status, body) = get(&app, "/v1/changelog/0.0.1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body["error"]["message"],
        "The changenote with the '0.0.1' version does not exist."
    );

    let (status, body) = get(&app, "/v1/announcements").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["announcements"][0]["title"], "Welcome");

    // Static data never touches the store
    assert_eq!(store.connection_count(), 0);
}

#[tokio::test]
async fn unreachable_store_is_500_then_recovers() {
    let (app, store) = app();
    store.set_unreachable(true);

    let (status, body) = get(&app, "/v1/community-apps").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["type"], "Something went wrong");
    assert_eq!(body["error"]["status"], 500);

    let (_, health) = get(&app, "/health").await;
    assert_eq!(health["database"], "failed");

    store.set_unreachable(false);
    let (status, _) = get(&app, "/v1/community-apps").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn unknown_routes_are_404() {
    let (app, _) = app();
    let (status, body) = get(&app, "/v2/anything").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], "404, not found!");
}
