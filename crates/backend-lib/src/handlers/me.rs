//! Identity context of the signed-in caller.
use crate::identity::Principal;
use axum::{Extension, Json};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub username: String,
    pub roles: Vec<String>,
}

/// Identity context of the authenticated caller
pub async fn me(Extension(principal): Extension<Principal>) -> Json<MeResponse> {
    Json(MeResponse {
        username: principal.username,
        roles: principal.roles.into_iter().collect(),
    })
}
