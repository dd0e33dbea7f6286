//! Operator API.
//!
//! Served on its own listener so it can stay bound to loopback while the
//! gateway listens publicly. Every route requires the bearer key.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub fn setup_admin_router(state: AppState) -> Router {
    let api_key = Arc::new(state.config.admin.api_key.clone());
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/services", get(list_services))
        .route("/admin/services/{name}", delete(deregister_service))
        .route("/admin/services/{name}/check", post(check_service))
        .layer(middleware::from_fn_with_state(api_key, admin_auth_middleware))
        .with_state(state)
}
