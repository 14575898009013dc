//! User identity, roles, and the free-tier usage record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Plan;

/// Unique user identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Create a new random user ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a user ID from a string
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for UserId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// User role - a denormalized view of entitlement tier for fast gating
///
/// `Pro` is only valid while an active pro/enterprise subscription exists;
/// `Admin` is an unconditional override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Free,
    Pro,
    Admin,
}

impl Role {
    /// Get the role identifier string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
            Self::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "pro" => Ok(Self::Pro),
            "admin" => Ok(Self::Admin),
            _ => Err(RoleParseError(s.to_string())),
        }
    }
}

/// Error parsing a role string
#[derive(Debug, Clone)]
pub struct RoleParseError(pub String);

impl std::fmt::Display for RoleParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid role: {}", self.0)
    }
}

impl std::error::Error for RoleParseError {}

/// Free-tier usage counters embedded on the user record
///
/// This is the only ledger consulted when no subscription document exists.
/// Only resume analyses and interview sessions have backing counters here;
/// the other free features are gated by their limit alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreeUsage {
    pub resume_analysis_count: i64,
    pub interview_sessions_count: i64,
    /// Anchor for the monthly reset of both counters
    pub last_reset_date: DateTime<Utc>,
}

impl FreeUsage {
    /// Fresh zeroed usage anchored at `now` (set at registration)
    pub fn zeroed(now: DateTime<Utc>) -> Self {
        Self {
            resume_analysis_count: 0,
            interview_sessions_count: 0,
            last_reset_date: now,
        }
    }
}

/// User record as the entitlement core sees it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub role: Role,
    pub usage: FreeUsage,
    /// Denormalized copy of the active subscription's plan, kept in lockstep
    /// by lifecycle transitions
    pub subscription_plan: Option<Plan>,
    /// Denormalized copy of the active subscription's period end
    pub subscription_ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
