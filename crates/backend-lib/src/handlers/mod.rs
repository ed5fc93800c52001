// ============================
// crates/backend-lib/src/handlers/mod.rs
// ============================
//! HTTP handlers for the login, logout, identity and account endpoints.
pub mod account;
pub mod login;
pub mod logout;
pub mod me;

use crate::auth::AuthenticatedSession;
use crate::error::AppError;
use crate::identity::Principal;
use crate::AppState;
use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{header::SET_COOKIE, request::Parts, HeaderMap},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use std::convert::Infallible;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

/// Address of the client, used to key login lockouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

impl FromRequestParts<Arc<AppState>> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if state.settings.server.trust_proxy_headers {
            if let Some(ip) = forwarded_ip(&parts.headers) {
                return Ok(Self(ip));
            }
        }

        let ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED), |ConnectInfo(addr)| addr.ip());
        Ok(Self(ip))
    }
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let real_ip = headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.trim().parse().ok());

    real_ip.or_else(|| {
        headers
            .get("x-forwarded-for")
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse().ok())
    })
}

/// The request's principal when a session is live
#[derive(Debug, Clone)]
pub struct MaybePrincipal(pub Option<Principal>);

impl<S: Send + Sync> FromRequestParts<S> for MaybePrincipal {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<Principal>().cloned()))
    }
}

/// Redirect that installs a fresh session cookie and its CSRF cookie
pub(crate) fn session_redirect(
    state: &AppState,
    authenticated: &AuthenticatedSession,
    to: &str,
) -> Result<Response, AppError> {
    let session_cookie = state.cookies.session_cookie(&authenticated.session.id)?;
    let csrf_cookie = state.cookies.csrf_cookie(&authenticated.session.csrf_token)?;
    Ok((
        AppendHeaders([(SET_COOKIE, session_cookie), (SET_COOKIE, csrf_cookie)]),
        Redirect::to(to),
    )
        .into_response())
}

/// Minimal escaping for values interpolated into the built-in pages
pub(crate) fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            c => escaped.push(c),
        }
    }
    escaped
}
