//! Password change for the signed-in identity.
use super::{escape_html, session_redirect};
use crate::error::AppError;
use crate::identity::Principal;
use crate::middleware::{CsrfToken, LOGIN_PATH};
use crate::AppState;
use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse, Redirect, Response},
    Extension, Form,
};
use recipe_common::PasswordChangeForm;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument};
use zeroize::Zeroizing;

pub const PASSWORD_CHANGE_FAILED_PATH: &str = "/account/password?error=true";

#[derive(Debug, Default, Deserialize)]
pub struct PasswordPageQuery {
    pub error: Option<String>,
}

pub async fn password_page(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PasswordPageQuery>,
    Extension(principal): Extension<Principal>,
    Extension(CsrfToken(token)): Extension<CsrfToken>,
) -> Html<String> {
    let notice = if query.error.is_some() {
        r#"<p class="error">No se pudo cambiar la contraseña.</p>"#
    } else {
        ""
    };

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="es">
<head><meta charset="utf-8"><title>Cambiar contraseña</title></head>
<body>
<h1>Cambiar contraseña de {username}</h1>
{notice}
<form method="post" action="/account/password">
<input type="hidden" name="{field}" value="{token}">
<label>Contraseña actual <input type="password" name="current_password" autocomplete="current-password" required></label>
<label>Nueva contraseña <input type="password" name="new_password" autocomplete="new-password" required></label>
<button type="submit">Guardar</button>
</form>
</body>
</html>"#,
        username = escape_html(&principal.username),
        field = escape_html(&state.settings.csrf.form_field),
        token = escape_html(&token),
    ))
}

/// Replace the password and rotate the session
#[instrument(skip_all)]
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Form(form): Form<PasswordChangeForm>,
) -> Result<Response, AppError> {
    let current = Zeroizing::new(form.current_password);
    let new = Zeroizing::new(form.new_password);

    match state
        .auth
        .change_password(&principal.session_id, &current, &new)
        .await
    {
        Ok(authenticated) => session_redirect(&state, &authenticated, "/"),
        Err(AppError::SessionInvalid) => Ok(Redirect::to(LOGIN_PATH).into_response()),
        Err(e @ (AppError::InvalidCredentials | AppError::InvalidInput(_))) => {
            debug!(code = e.error_code(), "password change rejected");
            Ok(Redirect::to(PASSWORD_CHANGE_FAILED_PATH).into_response())
        },
        Err(e) => Err(e),
    }
}
