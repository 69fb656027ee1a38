//! Authenticated-user extractor.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::api::AppState;
use crate::CommerceError;

/// The user the request is made on behalf of.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub Uuid);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = CommerceError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let identity = &state.identity;
        let credential = parts.headers.get(identity.header()).and_then(|v| v.to_str().ok()).unwrap_or_default();
        identity.authenticate(credential).await
            .map(CurrentUser)
            .map_err(|e| CommerceError::Unauthorized(e.to_string()))
    }
}
