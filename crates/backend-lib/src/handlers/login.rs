//! Login page and credential submission.
use super::{escape_html, session_redirect, ClientIp, MaybePrincipal};
use crate::error::AppError;
use crate::middleware::CsrfToken;
use crate::AppState;
use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse, Redirect, Response},
    Extension, Form,
};
use recipe_common::LoginForm;
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;
use zeroize::Zeroizing;

/// Redirect target after a failed login. Identical for every failure cause.
pub const LOGIN_FAILED_PATH: &str = "/login?error=true";

#[derive(Debug, Default, Deserialize)]
pub struct LoginPageQuery {
    pub error: Option<String>,
    pub logout: Option<String>,
}

/// Render the login form with the anti-forgery field
pub async fn login_page(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LoginPageQuery>,
    Extension(CsrfToken(token)): Extension<CsrfToken>,
) -> Html<String> {
    let notice = if query.error.is_some() {
        r#"<p class="error">Usuario o contraseña incorrectos.</p>"#
    } else if query.logout.is_some() {
        r#"<p class="info">Has cerrado sesión.</p>"#
    } else {
        ""
    };

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="es">
<head><meta charset="utf-8"><title>Iniciar sesión</title></head>
<body>
<h1>Iniciar sesión</h1>
{notice}
<form method="post" action="/login">
<input type="hidden" name="{field}" value="{token}">
<label>Usuario <input name="username" autocomplete="username" required></label>
<label>Contraseña <input type="password" name="password" autocomplete="current-password" required></label>
<button type="submit">Entrar</button>
</form>
</body>
</html>"#,
        field = escape_html(&state.settings.csrf.form_field),
        token = escape_html(&token),
    ))
}

/// Authenticate a form submission.
///
/// Success rotates both cookies and redirects home. Every authentication
/// failure, lockouts included, produces the same redirect and no session cookie.
#[instrument(skip_all)]
pub async fn login_submit(
    State(state): State<Arc<AppState>>,
    ClientIp(client): ClientIp,
    MaybePrincipal(current): MaybePrincipal,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let LoginForm { username, password } = form;
    let password = Zeroizing::new(password);

    match state.auth.login(&username, &password, client).await {
        Ok(authenticated) => {
            // A different identity logging in from the same browser ends the old session
            if let Some(previous) = current.filter(|p| p.session_id != authenticated.session.id) {
                state.auth.logout(&previous.session_id).await;
            }
            session_redirect(&state, &authenticated, "/")
        },
        Err(e) if e.is_authentication_failure() => Ok(Redirect::to(LOGIN_FAILED_PATH).into_response()),
        Err(e) => Err(e),
    }
}
