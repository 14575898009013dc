//! Repository traits
//!
//! Async interfaces the entitlement core is written against. The core never
//! touches SQL directly; everything stateful goes through these seams so the
//! free-tier/subscription usage split can be reworked without touching
//! callers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use ascent_types::{
    Cancellation, Feature, FeatureSet, Plan, Renewal, Role, Subscription, SubscriptionId, User,
    UserId,
};

use crate::error::DbResult;

/// Free-tier counters embedded on the user record
///
/// Only these two features have backing counters outside a subscription;
/// the remaining free features are gated by their limit alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeCounter {
    ResumeAnalysis,
    Interviews,
}

/// User directory - the persisted user record
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Find a user by ID
    async fn find_by_id(&self, id: UserId) -> DbResult<Option<User>>;

    /// Find a user by email
    async fn find_by_email(&self, email: &str) -> DbResult<Option<User>>;

    /// Create a new user
    async fn create(&self, user: &User) -> DbResult<()>;

    /// Update the denormalized role
    async fn update_role(&self, id: UserId, role: Role) -> DbResult<()>;

    /// Update the denormalized subscription window (`None` clears it)
    async fn set_subscription_window(
        &self,
        id: UserId,
        plan: Option<Plan>,
        ends_at: Option<DateTime<Utc>>,
    ) -> DbResult<()>;

    /// Conditionally add one use to a free-tier counter.
    ///
    /// The guard (`count < limit`, skipped when `limit` is -1) is evaluated
    /// in the same statement as the increment, so concurrent callers cannot
    /// both cross the limit. Returns whether the charge matched.
    async fn charge_free_usage(&self, id: UserId, counter: FreeCounter, limit: i64)
        -> DbResult<bool>;

    /// Zero both free counters and move the reset anchor, but only if the
    /// stored anchor still equals `stale_anchor`. Concurrent lazy resets
    /// collapse to a single winner. Returns whether the reset applied.
    async fn reset_free_usage(
        &self,
        id: UserId,
        stale_anchor: DateTime<Utc>,
        new_anchor: DateTime<Utc>,
    ) -> DbResult<bool>;
}

/// Subscription document store (at most one document per user)
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Find a subscription by ID
    async fn find_by_id(&self, id: SubscriptionId) -> DbResult<Option<Subscription>>;

    /// Find the subscription for a user
    async fn find_by_user_id(&self, user_id: UserId) -> DbResult<Option<Subscription>>;

    /// Find a subscription by its provider payment reference
    async fn find_by_payment_ref(&self, payment_ref: &str) -> DbResult<Option<Subscription>>;

    /// Create a new subscription
    async fn create(&self, sub: &Subscription) -> DbResult<()>;

    /// Transition to active, stamping the payment reference and the
    /// recomputed feature set
    async fn mark_active(
        &self,
        id: SubscriptionId,
        payment_ref: &str,
        features: &FeatureSet,
    ) -> DbResult<()>;

    /// Transition to cancelled, stamping the cancellation record
    async fn mark_cancelled(&self, id: SubscriptionId, cancellation: &Cancellation)
        -> DbResult<()>;

    /// Transition to expired (abandoned checkout)
    async fn mark_expired(&self, id: SubscriptionId) -> DbResult<()>;

    /// Swap the plan in place: new plan, price, and feature set; status and
    /// dates untouched
    async fn replace_plan(
        &self,
        id: SubscriptionId,
        plan: Plan,
        price_cents: i64,
        features: &FeatureSet,
    ) -> DbResult<()>;

    /// Append one entry to the renewal history
    async fn append_renewal(&self, id: SubscriptionId, renewal: &Renewal) -> DbResult<()>;
}

/// Per-feature usage mutations on the subscription's counted grants
///
/// Both operations are single-statement conditional updates; this is where
/// the "compare and increment at the storage layer" requirement lives.
#[async_trait]
pub trait SubscriptionUsageStore: Send + Sync {
    /// Add one use to a counted grant where headroom remains: the update
    /// matches only while `used < limit` (or the limit is -1) and the grant
    /// is enabled. Returns whether a row matched.
    async fn try_charge(&self, user_id: UserId, feature: Feature) -> DbResult<bool>;

    /// Zero a counted grant and move its period anchor, keyed on the stale
    /// anchor so concurrent lazy resets collapse to one. Returns whether the
    /// reset applied.
    async fn reset_counter(
        &self,
        user_id: UserId,
        feature: Feature,
        stale_anchor: DateTime<Utc>,
        new_anchor: DateTime<Utc>,
    ) -> DbResult<bool>;
}
