//! In-memory repositories for testing
//!
//! Conditional mutations (`charge_free_usage`, `try_charge`, the two reset
//! operations) run under the DashMap entry lock, giving the same guard+write
//! atomicity the SQL implementations get from a single conditional UPDATE.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;

use ascent_db::{
    DbResult, FreeCounter, SubscriptionStore, SubscriptionUsageStore, UserDirectory,
};
use ascent_types::{
    Cancellation, Feature, FeatureGrant, FeatureSet, Plan, Renewal, Role, Subscription,
    SubscriptionId, SubscriptionStatus, User, UserId, UNLIMITED,
};

/// In-memory user directory
#[derive(Default, Clone)]
pub struct MockUserDirectory {
    users: Arc<DashMap<UserId, User>>,
}

// helpers are shared across test binaries; not every binary uses them all
#[allow(dead_code)]
impl MockUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a test user directly
    pub fn insert_user(&self, user: User) {
        self.users.insert(user.id, user);
    }

    /// Read a user back for assertions
    pub fn get(&self, id: UserId) -> Option<User> {
        self.users.get(&id).map(|r| r.value().clone())
    }
}

#[async_trait]
impl UserDirectory for MockUserDirectory {
    async fn find_by_id(&self, id: UserId) -> DbResult<Option<User>> {
        Ok(self.users.get(&id).map(|r| r.value().clone()))
    }

    async fn find_by_email(&self, email: &str) -> DbResult<Option<User>> {
        Ok(self
            .users
            .iter()
            .find(|r| r.value().email == email)
            .map(|r| r.value().clone()))
    }

    async fn create(&self, user: &User) -> DbResult<()> {
        self.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_role(&self, id: UserId, role: Role) -> DbResult<()> {
        if let Some(mut user) = self.users.get_mut(&id) {
            user.role = role;
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_subscription_window(
        &self,
        id: UserId,
        plan: Option<Plan>,
        ends_at: Option<DateTime<Utc>>,
    ) -> DbResult<()> {
        if let Some(mut user) = self.users.get_mut(&id) {
            user.subscription_plan = plan;
            user.subscription_ends_at = ends_at;
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn charge_free_usage(
        &self,
        id: UserId,
        counter: FreeCounter,
        limit: i64,
    ) -> DbResult<bool> {
        let Some(mut user) = self.users.get_mut(&id) else {
            return Ok(false);
        };
        let count = match counter {
            FreeCounter::ResumeAnalysis => &mut user.usage.resume_analysis_count,
            FreeCounter::Interviews => &mut user.usage.interview_sessions_count,
        };
        if limit == UNLIMITED || *count < limit {
            *count += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn reset_free_usage(
        &self,
        id: UserId,
        stale_anchor: DateTime<Utc>,
        new_anchor: DateTime<Utc>,
    ) -> DbResult<bool> {
        let Some(mut user) = self.users.get_mut(&id) else {
            return Ok(false);
        };
        if user.usage.last_reset_date != stale_anchor {
            return Ok(false);
        }
        user.usage.resume_analysis_count = 0;
        user.usage.interview_sessions_count = 0;
        user.usage.last_reset_date = new_anchor;
        Ok(true)
    }
}

/// In-memory subscription store; also implements the counted-usage
/// mutations so the same map backs both traits
#[derive(Default, Clone)]
pub struct MockSubscriptionStore {
    subs: Arc<DashMap<SubscriptionId, Subscription>>,
    by_user: Arc<DashMap<UserId, SubscriptionId>>,
}

#[allow(dead_code)]
impl MockSubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a subscription directly for scenario setup
    pub fn insert_subscription(&self, sub: Subscription) {
        self.by_user.insert(sub.user_id, sub.id);
        self.subs.insert(sub.id, sub);
    }

    /// Read a subscription back for assertions
    pub fn get(&self, id: SubscriptionId) -> Option<Subscription> {
        self.subs.get(&id).map(|r| r.value().clone())
    }

    fn id_for_user(&self, user_id: UserId) -> Option<SubscriptionId> {
        self.by_user.get(&user_id).map(|r| *r.value())
    }
}

#[async_trait]
impl SubscriptionStore for MockSubscriptionStore {
    async fn find_by_id(&self, id: SubscriptionId) -> DbResult<Option<Subscription>> {
        Ok(self.subs.get(&id).map(|r| r.value().clone()))
    }

    async fn find_by_user_id(&self, user_id: UserId) -> DbResult<Option<Subscription>> {
        Ok(self
            .id_for_user(user_id)
            .and_then(|id| self.subs.get(&id).map(|r| r.value().clone())))
    }

    async fn find_by_payment_ref(&self, payment_ref: &str) -> DbResult<Option<Subscription>> {
        Ok(self
            .subs
            .iter()
            .find(|r| r.value().payment_ref.as_deref() == Some(payment_ref))
            .map(|r| r.value().clone()))
    }

    async fn create(&self, sub: &Subscription) -> DbResult<()> {
        // one document per user: a superseded row is replaced
        if let Some(old_id) = self.id_for_user(sub.user_id) {
            self.subs.remove(&old_id);
        }
        self.insert_subscription(sub.clone());
        Ok(())
    }

    async fn mark_active(
        &self,
        id: SubscriptionId,
        payment_ref: &str,
        features: &FeatureSet,
    ) -> DbResult<()> {
        if let Some(mut sub) = self.subs.get_mut(&id) {
            sub.status = SubscriptionStatus::Active;
            sub.payment_ref = Some(payment_ref.to_string());
            sub.features = features.clone();
            sub.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn mark_cancelled(
        &self,
        id: SubscriptionId,
        cancellation: &Cancellation,
    ) -> DbResult<()> {
        if let Some(mut sub) = self.subs.get_mut(&id) {
            sub.status = SubscriptionStatus::Cancelled;
            sub.cancellation = Some(cancellation.clone());
            sub.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn mark_expired(&self, id: SubscriptionId) -> DbResult<()> {
        if let Some(mut sub) = self.subs.get_mut(&id) {
            sub.status = SubscriptionStatus::Expired;
            sub.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn replace_plan(
        &self,
        id: SubscriptionId,
        plan: Plan,
        price_cents: i64,
        features: &FeatureSet,
    ) -> DbResult<()> {
        if let Some(mut sub) = self.subs.get_mut(&id) {
            sub.plan = plan;
            sub.price_cents = price_cents;
            sub.features = features.clone();
            sub.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn append_renewal(&self, id: SubscriptionId, renewal: &Renewal) -> DbResult<()> {
        if let Some(mut sub) = self.subs.get_mut(&id) {
            sub.renewals.push(renewal.clone());
            sub.updated_at = Utc::now();
        }
        Ok(())
    }
}

#[async_trait]
impl SubscriptionUsageStore for MockSubscriptionStore {
    async fn try_charge(&self, user_id: UserId, feature: Feature) -> DbResult<bool> {
        let Some(id) = self.id_for_user(user_id) else {
            return Ok(false);
        };
        let Some(mut sub) = self.subs.get_mut(&id) else {
            return Ok(false);
        };
        if !sub.status.is_entitled() {
            return Ok(false);
        }
        match sub.features.get_mut(feature) {
            Some(FeatureGrant::Counted {
                enabled,
                limit,
                used,
                ..
            }) if *enabled && (*limit == UNLIMITED || *used < *limit) => {
                *used += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn reset_counter(
        &self,
        user_id: UserId,
        feature: Feature,
        stale_anchor: DateTime<Utc>,
        new_anchor: DateTime<Utc>,
    ) -> DbResult<bool> {
        let Some(id) = self.id_for_user(user_id) else {
            return Ok(false);
        };
        let Some(mut sub) = self.subs.get_mut(&id) else {
            return Ok(false);
        };
        match sub.features.get_mut(feature) {
            Some(FeatureGrant::Counted {
                used,
                period_started_at,
                ..
            }) if *period_started_at == stale_anchor => {
                *used = 0;
                *period_started_at = new_anchor;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
