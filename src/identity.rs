//! Identity of the calling user.
//!
//! Signup, login and token validation belong to the auth service in front of
//! this one. Requests reach us with the authenticated user id in a header set
//! by that gateway, and we trust it as-is.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing credentials")]
    Missing,
    #[error("malformed credentials")]
    Malformed,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Name of the request header carrying the credential.
    fn header(&self) -> &str;

    async fn authenticate(&self, credential: &str) -> Result<Uuid, AuthError>;
}

/// Accepts the user id forwarded by the gateway.
#[derive(Debug, Clone)]
pub struct GatewayIdentity {
    header: String,
}

impl GatewayIdentity {
    pub const DEFAULT_HEADER: &'static str = "x-user-id";

    pub fn new(header: impl Into<String>) -> Self {
        Self { header: header.into().to_ascii_lowercase() }
    }
}

impl Default for GatewayIdentity {
    fn default() -> Self { Self::new(Self::DEFAULT_HEADER) }
}

#[async_trait]
impl IdentityProvider for GatewayIdentity {
    fn header(&self) -> &str { &self.header }

    async fn authenticate(&self, credential: &str) -> Result<Uuid, AuthError> {
        let credential = credential.trim();
        if credential.is_empty() { return Err(AuthError::Missing); }
        Uuid::parse_str(credential).map_err(|_| AuthError::Malformed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_gateway_identity() {
        let id = Uuid::now_v7();
        let provider = GatewayIdentity::new("X-User-Id");
        assert_eq!(provider.header(), "x-user-id");
        assert_eq!(provider.authenticate(&format!(" {id} ")).await, Ok(id));
        assert_eq!(provider.authenticate("").await, Err(AuthError::Missing));
        assert_eq!(provider.authenticate("bob").await, Err(AuthError::Malformed));
    }
}
