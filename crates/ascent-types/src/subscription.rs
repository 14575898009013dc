//! Subscription documents and lifecycle status

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{BillingCycle, FeatureSet, Plan, UserId};

/// Unique subscription identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub Uuid);

impl SubscriptionId {
    /// Create a new random subscription ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a subscription ID from a string
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Subscription lifecycle status
///
/// `Cancelled` and `Expired` are terminal; no transition leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    /// Created, awaiting payment confirmation
    Pending,
    /// Paid and in force
    Active,
    /// Cancelled by the user or the payment provider
    Cancelled,
    /// Payment abandoned before activation
    Expired,
    /// In a trial period
    Trial,
}

impl SubscriptionStatus {
    /// Get the status identifier string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
            Self::Trial => "trial",
        }
    }

    /// Whether no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Expired)
    }

    /// Whether the subscription currently confers entitlements
    pub fn is_entitled(&self) -> bool {
        matches!(self, Self::Active | Self::Trial)
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Cancellation record, stamped once when the subscription is cancelled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cancellation {
    pub cancelled_at: DateTime<Utc>,
    pub reason: Option<String>,
    pub feedback: Option<String>,
}

/// Outcome of a single renewal attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenewalOutcome {
    Success,
    Failed,
}

/// One entry in the append-only renewal history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Renewal {
    pub date: DateTime<Utc>,
    pub amount_cents: i64,
    pub outcome: RenewalOutcome,
    pub transaction_id: String,
}

/// A user's subscription (at most one per user)
///
/// `features` is fully determined by `plan` except for the mutable `used`
/// counters inside counted grants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub user_id: UserId,
    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub billing_cycle: BillingCycle,
    pub price_cents: i64,
    pub currency: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub trial_ends_at: Option<DateTime<Utc>>,
    /// Payment provider name ("stripe", etc.); opaque to the core
    pub payment_provider: Option<String>,
    /// Provider-side subscription reference; opaque correlation key
    pub payment_ref: Option<String>,
    pub features: FeatureSet,
    pub cancellation: Option<Cancellation>,
    pub renewals: Vec<Renewal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
