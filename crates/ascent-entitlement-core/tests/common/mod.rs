pub mod mock_repos;

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use ascent_entitlement_core::{
    EntitlementResolver, FreeTierLimits, PlanCatalog, SubscriptionLifecycle,
};
use ascent_types::{
    BillingCycle, FreeUsage, Plan, Role, Subscription, SubscriptionId, SubscriptionStatus, User,
    UserId,
};

use mock_repos::{MockSubscriptionStore, MockUserDirectory};

pub type Resolver =
    EntitlementResolver<MockUserDirectory, MockSubscriptionStore, MockSubscriptionStore>;
pub type Lifecycle = SubscriptionLifecycle<MockUserDirectory, MockSubscriptionStore>;

/// Everything a test scenario needs, wired over shared in-memory stores
///
/// Shared across test binaries; not every binary touches every field.
#[allow(dead_code)]
pub struct TestHarness {
    pub users: Arc<MockUserDirectory>,
    pub subscriptions: Arc<MockSubscriptionStore>,
    pub catalog: Arc<PlanCatalog>,
    pub resolver: Arc<Resolver>,
    pub lifecycle: Lifecycle,
}

impl TestHarness {
    pub fn new() -> Self {
        let users = Arc::new(MockUserDirectory::new());
        let subscriptions = Arc::new(MockSubscriptionStore::new());
        let catalog = Arc::new(PlanCatalog::default());

        let resolver = Arc::new(EntitlementResolver::new(
            Arc::clone(&users),
            Arc::clone(&subscriptions),
            Arc::clone(&subscriptions),
            FreeTierLimits::default(),
        ));
        let lifecycle = SubscriptionLifecycle::new(
            Arc::clone(&users),
            Arc::clone(&subscriptions),
            Arc::clone(&catalog),
        );

        Self {
            users,
            subscriptions,
            catalog,
            resolver,
            lifecycle,
        }
    }

    /// Insert a free-tier user with zeroed usage anchored at `anchor`
    pub fn insert_free_user(&self, anchor: DateTime<Utc>) -> UserId {
        let user = test_user(Role::Free, FreeUsage::zeroed(anchor));
        let id = user.id;
        self.users.insert_user(user);
        id
    }
}

#[allow(dead_code)]
pub fn test_user(role: Role, usage: FreeUsage) -> User {
    let id = UserId::new();
    User {
        id,
        email: format!("test-{id}@example.com"),
        role,
        usage,
        subscription_plan: None,
        subscription_ends_at: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
}

/// Build an active subscription with the catalog's template for `plan`,
/// anchored at `now`
#[allow(dead_code)]
pub fn active_subscription(
    catalog: &PlanCatalog,
    user_id: UserId,
    plan: Plan,
    now: DateTime<Utc>,
) -> Subscription {
    Subscription {
        id: SubscriptionId::new(),
        user_id,
        plan,
        status: SubscriptionStatus::Active,
        billing_cycle: BillingCycle::Monthly,
        price_cents: catalog.price_cents(plan, BillingCycle::Monthly).unwrap(),
        currency: "usd".to_string(),
        start_date: now,
        end_date: now + chrono::Months::new(1),
        trial_ends_at: None,
        payment_provider: Some("stripe".to_string()),
        payment_ref: Some(format!("sub_{}", SubscriptionId::new())),
        features: catalog.features_for(plan, now).unwrap(),
        cancellation: None,
        renewals: Vec::new(),
        created_at: now,
        updated_at: now,
    }
}
