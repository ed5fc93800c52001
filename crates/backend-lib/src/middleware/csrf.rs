//! Anti-forgery token enforcement.
//!
//! State-changing requests must echo the expected token in the configured
//! header or form field. The expected token is the session's token when a
//! session is live, otherwise the value of the CSRF cookie.
use super::session::SessionContext;
use crate::auth::{generate_secure_token, tokens_match};
use crate::config::CsrfSettings;
use crate::cookies::sets_cookie;
use crate::error::AppError;
use crate::metrics::CSRF_REJECTED;
use crate::AppState;
use axum::{
    body::{self, Body},
    extract::{Request, State},
    http::{
        header::{CONTENT_TYPE, SET_COOKIE},
        Method,
    },
    middleware::Next,
    response::Response,
};
use metrics::counter;
use std::sync::Arc;
use tracing::warn;

/// Largest form body buffered while looking for the token field
const MAX_FORM_BYTES: usize = 64 * 1024;

/// The token a page should embed in its forms
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfToken(pub String);

/// Methods that never change state and so carry no token
pub fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE)
}

pub async fn csrf_protect(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let cookie_token = state.cookies.csrf_token(request.headers());
    let expected = request
        .extensions()
        .get::<SessionContext>()
        .map(|session| session.csrf_token.clone())
        .or_else(|| cookie_token.clone());

    let mut request = if is_safe_method(request.method()) {
        request
    } else {
        let (request, submitted) = submitted_token(request, &state.settings.csrf).await?;
        match (&expected, &submitted) {
            (Some(expected), Some(submitted)) if tokens_match(expected, submitted) => request,
            _ => {
                counter!(CSRF_REJECTED).increment(1);
                warn!(
                    method = %request.method(),
                    path = %request.uri().path(),
                    token_present = submitted.is_some(),
                    "CSRF token missing or mismatched"
                );
                return Err(AppError::CsrfRejected);
            },
        }
    };

    let page_token = expected.unwrap_or_else(generate_secure_token);
    request.extensions_mut().insert(CsrfToken(page_token.clone()));

    let mut response = next.run(request).await;

    let csrf_cookie = &state.cookies.csrf_name;
    if cookie_token.as_deref() != Some(page_token.as_str()) && !sets_cookie(response.headers(), csrf_cookie) {
        if let Ok(cookie) = state.cookies.csrf_cookie(&page_token) {
            response.headers_mut().append(SET_COOKIE, cookie);
        }
    }
    Ok(response)
}

/// Pull the submitted token from the header or, for form posts, the body.
/// The body is buffered and handed back intact.
async fn submitted_token(
    request: Request,
    settings: &CsrfSettings,
) -> Result<(Request, Option<String>), AppError> {
    let header_token = request
        .headers()
        .get(settings.header_name.as_str())
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    if header_token.is_some() {
        return Ok((request, header_token));
    }

    let is_form = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));
    if !is_form {
        return Ok((request, None));
    }

    let (parts, body) = request.into_parts();
    let bytes = body::to_bytes(body, MAX_FORM_BYTES)
        .await
        .map_err(|_| AppError::InvalidInput("form body too large".to_string()))?;
    let field_token = url::form_urlencoded::parse(&bytes)
        .find(|(key, _)| key == settings.form_field.as_str())
        .map(|(_, value)| value.into_owned());

    Ok((Request::from_parts(parts, Body::from(bytes)), field_token))
}
