//! Upgrade-request parameters and token checking.

use std::collections::HashMap;

use async_trait::async_trait;

/// Identity claimed by the upgrade query string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpgradeParams {
    /// Bearer token.
    pub token: String,
    /// Claimed user id.
    pub user_id: String,
    /// Client platform id.
    pub platform_id: i32,
    /// Operation id, generated when the client omits it.
    pub operation_id: String,
}

/// Why an upgrade request was refused before the handshake.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UpgradeError {
    /// A required query parameter is absent or empty.
    #[error("missing query parameter '{0}'")]
    Missing(&'static str),
    /// `platformID` is not an integer.
    #[error("platformID '{0}' is not an integer")]
    InvalidPlatform(String),
}

impl UpgradeParams {
    /// Extract identity from the upgrade query.
    ///
    /// Accepts `userId`/`userID` and `platformID`/`platformId`.
    pub fn from_query(query: &HashMap<String, String>) -> Result<Self, UpgradeError> {
        let pick = |names: &[&str]| {
            names
                .iter()
                .filter_map(|name| query.get(*name))
                .find(|value| !value.is_empty())
                .cloned()
        };

        let token = pick(&["token"]).ok_or(UpgradeError::Missing("token"))?;
        let user_id = pick(&["userId", "userID"]).ok_or(UpgradeError::Missing("userId"))?;
        let raw_platform =
            pick(&["platformID", "platformId"]).ok_or(UpgradeError::Missing("platformID"))?;
        let platform_id = raw_platform
            .trim()
            .parse::<i32>()
            .map_err(|_| UpgradeError::InvalidPlatform(raw_platform.clone()))?;
        let operation_id =
            pick(&["operationID", "operationId"]).unwrap_or_else(tidings_core::ids::operation_id);

        Ok(Self {
            token,
            user_id,
            platform_id,
            operation_id,
        })
    }
}

/// Token rejected by an [`Authenticator`].
#[derive(Debug, thiserror::Error)]
#[error("token rejected: {0}")]
pub struct AuthError(pub String);

/// Decides whether an upgrade may proceed.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Check the token against the claimed identity.
    async fn authenticate(&self, params: &UpgradeParams) -> Result<(), AuthError>;
}

/// Accepts every token. Token verification belongs to a separate service.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

#[async_trait]
impl Authenticator for AllowAll {
    async fn authenticate(&self, _params: &UpgradeParams) -> Result<(), AuthError> {
        Ok(())
    }
}
