// ============================
// crates/backend-lib/src/router.rs
// ============================
//! HTTP router with the request-defense middleware stack.
use crate::error::AppError;
use crate::handlers::{account, login, logout, me};
use crate::middleware::{csrf_protect, enforce_access, resolve_session, security_headers};
use crate::AppState;
use axum::{http::Uri, middleware::from_fn_with_state, routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Create the router serving only the security endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    create_router_with(state, Router::new())
}

/// Create the router, placing `app_routes` behind the same middleware stack.
///
/// `app_routes` must not define a fallback.
pub fn create_router_with(state: Arc<AppState>, app_routes: Router<Arc<AppState>>) -> Router {
    // Layers wrap outward: the last one added runs first
    Router::new()
        .route("/login", get(login::login_page).post(login::login_submit))
        .route("/logout", get(logout::logout).post(logout::logout))
        .route("/me", get(me::me))
        .route(
            "/account/password",
            get(account::password_page).post(account::change_password),
        )
        .merge(app_routes)
        .fallback(not_found)
        .layer(from_fn_with_state(state.clone(), enforce_access))
        .layer(from_fn_with_state(state.clone(), csrf_protect))
        .layer(from_fn_with_state(state.clone(), resolve_session))
        .layer(from_fn_with_state(state.clone(), security_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(uri.path().to_string())
}
