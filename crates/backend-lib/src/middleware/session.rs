//! Session cookie resolution.
use crate::auth::AuthenticatedSession;
use crate::cookies::sets_cookie;
use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header::SET_COOKIE,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

/// The live session behind a request, for handlers and later middleware
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub id: String,
    pub csrf_token: String,
}

/// Resolve the session cookie and attach the principal to the request.
///
/// A cookie naming an invalid session is treated as no session and cleared
/// on the way out unless the handler already replaced it.
pub async fn resolve_session(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(token) = state.cookies.session_token(request.headers()) else {
        return Ok(next.run(request).await);
    };

    let stale = match state.auth.resolve(&token).await {
        Ok(AuthenticatedSession { session, principal }) => {
            request.extensions_mut().insert(SessionContext {
                id: session.id,
                csrf_token: session.csrf_token,
            });
            request.extensions_mut().insert(principal);
            false
        },
        Err(AppError::SessionInvalid) => {
            debug!("request carried an invalid session cookie");
            true
        },
        Err(e) => return Err(e),
    };

    let mut response = next.run(request).await;
    if stale && !sets_cookie(response.headers(), &state.cookies.session_name) {
        if let Ok(clear) = state.cookies.clear_session_cookie() {
            response.headers_mut().append(SET_COOKIE, clear);
        }
    }
    Ok(response)
}
