//! Logout: ends the session and rotates the CSRF token.
use super::MaybePrincipal;
use crate::auth::generate_secure_token;
use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::State,
    http::header::SET_COOKIE,
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::info;

pub const LOGGED_OUT_PATH: &str = "/login?logout=true";

/// End the current session, clear its cookie and rotate the CSRF token
pub async fn logout(
    State(state): State<Arc<AppState>>,
    MaybePrincipal(principal): MaybePrincipal,
) -> Result<Response, AppError> {
    if let Some(principal) = principal {
        state.auth.logout(&principal.session_id).await;
        info!(username = %principal.username, "logged out");
    }

    let clear = state.cookies.clear_session_cookie()?;
    let csrf = state.cookies.csrf_cookie(&generate_secure_token())?;
    Ok((
        AppendHeaders([(SET_COOKIE, clear), (SET_COOKIE, csrf)]),
        Redirect::to(LOGGED_OUT_PATH),
    )
        .into_response())
}
