//! Admin API tests, driven in-process through the router.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use tower::ServiceExt;

use api_gateway::admin::setup_admin_router;
use api_gateway::http::HttpServer;

mod common;

const KEY: &str = "test-admin-key";

async fn admin_router() -> (Router, HttpServer) {
    let (backend, _) = common::start_recording_backend().await;
    let dead = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let dead_addr = dead.local_addr().unwrap();
    drop(dead);

    let mut config = common::test_config(vec![
        common::service("orders", backend, "/healthz"),
        common::service("billing", dead_addr, "/healthz"),
    ]);
    config.admin.enabled = true;
    config.admin.api_key = KEY.to_string();

    let server = HttpServer::new(config).unwrap();
    (setup_admin_router(server.state().clone()), server)
}

fn request(method: Method, uri: &str, key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(key) = key {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", key));
    }
    builder.body(Body::empty()).unwrap()
}

async fn json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_requires_bearer_key() {
    let (router, _server) = admin_router().await;

    let missing = router
        .clone()
        .oneshot(request(Method::GET, "/admin/status", None))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let wrong = router
        .oneshot(request(Method::GET, "/admin/status", Some("nope")))
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_status_and_service_listing() {
    let (router, _server) = admin_router().await;

    let status = router
        .clone()
        .oneshot(request(Method::GET, "/admin/status", Some(KEY)))
        .await
        .unwrap();
    assert_eq!(status.status(), StatusCode::OK);
    let body = json(status).await;
    assert_eq!(body["services"], 2);
    assert_eq!(body["healthy_services"], 0);

    let list = router
        .oneshot(request(Method::GET, "/admin/services", Some(KEY)))
        .await
        .unwrap();
    let body = json(list).await;
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["billing", "orders"]);
    assert!(body.as_array().unwrap().iter().all(|s| s["status"] == "unknown"));
}

#[tokio::test]
async fn test_on_demand_check_commits_verdict() {
    let (router, server) = admin_router().await;

    let up = router
        .clone()
        .oneshot(request(Method::POST, "/admin/services/orders/check", Some(KEY)))
        .await
        .unwrap();
    assert_eq!(up.status(), StatusCode::OK);
    let body = json(up).await;
    assert_eq!(body["healthy"], true);
    assert_eq!(body["status"], "healthy");

    let down = router
        .clone()
        .oneshot(request(Method::POST, "/admin/services/billing/check", Some(KEY)))
        .await
        .unwrap();
    let body = json(down).await;
    assert_eq!(body["healthy"], false);
    assert_eq!(body["status"], "unhealthy");

    let missing = router
        .oneshot(request(Method::POST, "/admin/services/ghost/check", Some(KEY)))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    assert_eq!(server.state().registry.get("orders").unwrap().success_count, 1);
}

#[tokio::test]
async fn test_deregister() {
    let (router, server) = admin_router().await;

    let removed = router
        .clone()
        .oneshot(request(Method::DELETE, "/admin/services/orders", Some(KEY)))
        .await
        .unwrap();
    assert_eq!(removed.status(), StatusCode::NO_CONTENT);
    assert!(server.state().registry.get("orders").is_err());

    let again = router
        .oneshot(request(Method::DELETE, "/admin/services/orders", Some(KEY)))
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::NOT_FOUND);
}
