//! Database row models
//!
//! These types map directly to database rows using SQLx's FromRow derive and
//! convert to the domain types in `ascent-types`. Enum-ish columns are stored
//! as their lowercase identifier strings; a value that fails to parse falls
//! back to the most restrictive default rather than failing the read.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use ascent_types::{
    BillingCycle, Cancellation, FeatureSet, FreeUsage, Plan, Renewal, Role, Subscription,
    SubscriptionId, SubscriptionStatus, User, UserId,
};

/// User row from the database
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    pub resume_analysis_count: i64,
    pub interview_sessions_count: i64,
    pub usage_reset_at: DateTime<Utc>,
    pub subscription_plan: Option<String>,
    pub subscription_ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRow {
    /// Convert to the domain user
    pub fn into_domain(self) -> User {
        User {
            id: UserId(self.id),
            email: self.email,
            role: self.role.parse().unwrap_or(Role::Free),
            usage: FreeUsage {
                resume_analysis_count: self.resume_analysis_count,
                interview_sessions_count: self.interview_sessions_count,
                last_reset_date: self.usage_reset_at,
            },
            subscription_plan: self.subscription_plan.and_then(|p| p.parse().ok()),
            subscription_ends_at: self.subscription_ends_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Subscription row from the database
///
/// `features`, `cancellation`, and `renewals` live in JSONB columns; the
/// counted-usage mutations in `pg::usage` operate on `features` in place.
#[derive(Debug, Clone, FromRow)]
pub struct SubscriptionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan: String,
    pub status: String,
    pub billing_cycle: String,
    pub price_cents: i64,
    pub currency: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub payment_provider: Option<String>,
    pub payment_ref: Option<String>,
    pub features: Json<FeatureSet>,
    pub cancellation: Option<Json<Cancellation>>,
    pub renewals: Json<Vec<Renewal>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionRow {
    /// Convert to the domain subscription
    pub fn into_domain(self) -> Subscription {
        Subscription {
            id: SubscriptionId(self.id),
            user_id: UserId(self.user_id),
            plan: self.plan.parse().unwrap_or(Plan::Free),
            status: parse_status(&self.status),
            billing_cycle: match self.billing_cycle.as_str() {
                "yearly" => BillingCycle::Yearly,
                _ => BillingCycle::Monthly,
            },
            price_cents: self.price_cents,
            currency: self.currency,
            start_date: self.start_date,
            end_date: self.end_date,
            trial_ends_at: self.trial_ends_at,
            payment_provider: self.payment_provider,
            payment_ref: self.payment_ref,
            features: self.features.0,
            cancellation: self.cancellation.map(|c| c.0),
            renewals: self.renewals.0,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

fn parse_status(s: &str) -> SubscriptionStatus {
    match s {
        "pending" => SubscriptionStatus::Pending,
        "active" => SubscriptionStatus::Active,
        "cancelled" => SubscriptionStatus::Cancelled,
        "trial" => SubscriptionStatus::Trial,
        _ => SubscriptionStatus::Expired,
    }
}
