//! Core errors

use thiserror::Error;

use ascent_types::SubscriptionStatus;

/// Entitlement core errors
///
/// Every entitlement decision either succeeds or surfaces one of these;
/// nothing is swallowed. Note that limit exhaustion is NOT an error - it
/// comes back as a denied [`ascent_types::EntitlementDecision`].
#[derive(Error, Debug)]
pub enum CoreError {
    /// Missing user, subscription, or counted grant
    #[error("not found: {0}")]
    NotFound(String),

    /// An active subscription already exists for the user
    #[error("conflict: {0}")]
    Conflict(String),

    /// Illegal lifecycle transition
    #[error("cannot {action} a {status} subscription")]
    InvalidState {
        action: &'static str,
        status: SubscriptionStatus,
    },

    /// Feature name not in the catalog
    #[error("unknown feature: {0}")]
    UnknownFeature(String),

    /// Catalog or pricing configuration problem
    #[error("configuration error: {0}")]
    Config(String),

    /// Database error
    #[error("database error: {0}")]
    Database(String),
}

impl CoreError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Conflict(_) | Self::InvalidState { .. } => 409,
            Self::UnknownFeature(_) => 400,
            Self::Config(_) | Self::Database(_) => 500,
        }
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::InvalidState { .. } => "INVALID_STATE",
            Self::UnknownFeature(_) => "UNKNOWN_FEATURE",
            Self::Config(_) => "CONFIGURATION_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }
}

impl From<ascent_db::DbError> for CoreError {
    fn from(err: ascent_db::DbError) -> Self {
        tracing::error!("Database error: {}", err);
        Self::Database(err.to_string())
    }
}
