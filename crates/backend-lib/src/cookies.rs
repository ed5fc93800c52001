// ============================
// crates/backend-lib/src/cookies.rs
// ============================
//! Session and CSRF cookie construction and parsing.
use crate::config::Settings;
use axum::http::{
    header::{InvalidHeaderValue, COOKIE, SET_COOKIE},
    HeaderMap, HeaderValue,
};

/// Names and attributes of the cookies the server issues
#[derive(Debug, Clone)]
pub struct CookieConfig {
    pub session_name: String,
    pub csrf_name: String,
    pub secure: bool,
}

impl CookieConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            session_name: settings.session.cookie_name.clone(),
            csrf_name: settings.csrf.cookie_name.clone(),
            secure: settings.session.secure_cookies,
        }
    }

    /// Session cookie. No `Max-Age`: the server decides when the session ends.
    pub fn session_cookie(&self, token: &str) -> Result<HeaderValue, InvalidHeaderValue> {
        self.build(&self.session_name, token, None)
    }

    pub fn clear_session_cookie(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        self.build(&self.session_name, "", Some(0))
    }

    pub fn csrf_cookie(&self, token: &str) -> Result<HeaderValue, InvalidHeaderValue> {
        self.build(&self.csrf_name, token, None)
    }

    pub fn session_token(&self, headers: &HeaderMap) -> Option<String> {
        read_cookie(headers, &self.session_name)
    }

    pub fn csrf_token(&self, headers: &HeaderMap) -> Option<String> {
        read_cookie(headers, &self.csrf_name)
    }

    fn build(&self, name: &str, value: &str, max_age: Option<u64>) -> Result<HeaderValue, InvalidHeaderValue> {
        let mut cookie = format!("{name}={value}; Path=/; HttpOnly; SameSite=Strict");
        if let Some(seconds) = max_age {
            cookie.push_str(&format!("; Max-Age={seconds}"));
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
    }
}

/// First non-empty value of the named cookie across all `Cookie` headers
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, val)| key.trim() == name && !val.trim().is_empty())
        .map(|(_, val)| val.trim().to_string())
}

/// Whether a response already sets the named cookie
pub fn sets_cookie(headers: &HeaderMap, name: &str) -> bool {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .any(|value| value.split_once('=').is_some_and(|(key, _)| key.trim() == name))
}
