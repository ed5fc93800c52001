//! Response hardening headers.
use crate::config::Settings;
use crate::error::AppError;
use crate::policy::{NormalizedPath, PatternSet};
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{
        header::{
            CACHE_CONTROL, CONTENT_SECURITY_POLICY, EXPIRES, PRAGMA, REFERRER_POLICY,
            X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS,
        },
        HeaderMap, HeaderName, HeaderValue,
    },
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

const PERMISSIONS_POLICY: HeaderName = HeaderName::from_static("permissions-policy");
const CROSS_DOMAIN_POLICIES: HeaderName = HeaderName::from_static("x-permitted-cross-domain-policies");

const PERMISSIONS_POLICY_VALUE: &str =
    "geolocation=(), microphone=(), camera=(), payment=(), usb=(), magnetometer=(), gyroscope=()";
const NO_STORE: &str = "no-store, no-cache, must-revalidate, max-age=0";

/// Precomputed header set applied to every response
#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    csp: HeaderValue,
    sensitive_paths: PatternSet,
}

impl SecurityHeaders {
    pub fn from_settings(settings: &Settings) -> Result<Self, AppError> {
        let csp = content_security_policy(&settings.image_origin()?);
        let csp = HeaderValue::from_str(&csp)
            .map_err(|e| AppError::Configuration(format!("invalid content security policy: {e}")))?;
        Ok(Self {
            csp,
            sensitive_paths: settings.sensitive_paths()?,
        })
    }

    /// Add the hardening headers for a response to `path`
    pub fn apply(&self, path: &str, headers: &mut HeaderMap) {
        headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
        headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
        headers.insert(CONTENT_SECURITY_POLICY, self.csp.clone());
        headers.insert(REFERRER_POLICY, HeaderValue::from_static("no-referrer"));
        headers.insert(PERMISSIONS_POLICY, HeaderValue::from_static(PERMISSIONS_POLICY_VALUE));
        headers.insert(CROSS_DOMAIN_POLICIES, HeaderValue::from_static("none"));

        if NormalizedPath::new(path).is_suspicious() || self.sensitive_paths.matches(path) {
            headers.insert(CACHE_CONTROL, HeaderValue::from_static(NO_STORE));
            headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
            headers.insert(EXPIRES, HeaderValue::from_static("0"));
        }
    }
}

fn content_security_policy(image_origin: &str) -> String {
    format!(
        "default-src 'self'; script-src 'self'; style-src 'self'; img-src 'self' data: {image_origin}; \
         font-src 'self'; connect-src 'self'; frame-ancestors 'none'; base-uri 'self'; form-action 'self'"
    )
}

/// Middleware adding the hardening headers, including to error responses
pub async fn security_headers(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let mut response = next.run(request).await;
    state.security_headers.apply(&path, response.headers_mut());
    response
}
