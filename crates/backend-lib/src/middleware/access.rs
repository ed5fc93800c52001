//! Route policy enforcement.
use crate::error::AppError;
use crate::identity::Principal;
use crate::metrics::{ACCESS_DENIED, ACCESS_REDIRECTED};
use crate::policy::Decision;
use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use metrics::counter;
use std::sync::Arc;
use tracing::{debug, info};

/// Where anonymous visitors are sent
pub const LOGIN_PATH: &str = "/login";

pub async fn enforce_access(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let principal = request.extensions().get::<Principal>();
    let decision = state
        .policy
        .decide(request.uri().path(), request.method(), principal);

    match decision {
        Decision::Allow => next.run(request).await,
        Decision::RequireLogin => {
            counter!(ACCESS_REDIRECTED).increment(1);
            debug!(path = %request.uri().path(), "login required");
            Redirect::to(LOGIN_PATH).into_response()
        },
        Decision::Deny => {
            counter!(ACCESS_DENIED).increment(1);
            info!(
                path = %request.uri().path(),
                username = principal.map(|p| p.username.as_str()).unwrap_or_default(),
                "access denied by route policy"
            );
            AppError::AccessDenied.into_response()
        },
    }
}
