//! Webhook events driving the subscription lifecycle end to end

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::json;

use ascent_billing_core::{BillingError, DispatchOutcome, WebhookEvent, WebhookEventType, WebhookRouter};
use ascent_db::{DbResult, FreeCounter, SubscriptionStore, UserDirectory};
use ascent_entitlement_core::{PlanCatalog, SubscriptionLifecycle};
use ascent_types::{
    BillingCycle, Cancellation, FeatureSet, FreeUsage, Plan, Renewal, RenewalOutcome, Role,
    Subscription, SubscriptionId, SubscriptionStatus, User, UserId, UNLIMITED,
};

#[derive(Default)]
struct MemUsers {
    users: DashMap<UserId, User>,
}

#[async_trait]
impl UserDirectory for MemUsers {
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

#[derive(Default)]
struct MemSubs {
    subs: DashMap<SubscriptionId, Subscription>,
}

#[allow(dead_code)]
impl MemSubs {
    fn get(&self, id: SubscriptionId) -> Option<Subscription> {
        self.subs.get(&id).map(|r| r.value().clone())
    }
}

#[async_trait]
impl SubscriptionStore for MemSubs {
    async fn find_by_id(&self, id: SubscriptionId) -> DbResult<Option<Subscription>> {
        Ok(self.subs.get(&id).map(|r| r.value().clone()))
    }

    async fn find_by_user_id(&self, user_id: UserId) -> DbResult<Option<Subscription>> {
        Ok(self
            .subs
            .iter()
            .find(|r| r.value().user_id == user_id)
            .map(|r| r.value().clone()))
    }

    async fn find_by_payment_ref(&self, payment_ref: &str) -> DbResult<Option<Subscription>> {
        Ok(self
            .subs
            .iter()
            .find(|r| r.value().payment_ref.as_deref() == Some(payment_ref))
            .map(|r| r.value().clone()))
    }

    async fn create(&self, sub: &Subscription) -> DbResult<()> {
        self.subs.retain(|_, existing| existing.user_id != sub.user_id);
        self.subs.insert(sub.id, sub.clone());
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
        }
        Ok(())
    }

    async fn mark_cancelled(&self, id: SubscriptionId, cancellation: &Cancellation) -> DbResult<()> {
        if let Some(mut sub) = self.subs.get_mut(&id) {
            sub.status = SubscriptionStatus::Cancelled;
            sub.cancellation = Some(cancellation.clone());
        }
        Ok(())
    }

    async fn mark_expired(&self, id: SubscriptionId) -> DbResult<()> {
        if let Some(mut sub) = self.subs.get_mut(&id) {
            sub.status = SubscriptionStatus::Expired;
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
        }
        Ok(())
    }

    async fn append_renewal(&self, id: SubscriptionId, renewal: &Renewal) -> DbResult<()> {
        if let Some(mut sub) = self.subs.get_mut(&id) {
            sub.renewals.push(renewal.clone());
        }
        Ok(())
    }
}

struct Setup {
    users: Arc<MemUsers>,
    subscriptions: Arc<MemSubs>,
    router: WebhookRouter<MemUsers, MemSubs>,
    user_id: UserId,
    subscription_id: SubscriptionId,
}

async fn setup_with_pending() -> Setup {
    let users = Arc::new(MemUsers::default());
    let subscriptions = Arc::new(MemSubs::default());
    let catalog = Arc::new(PlanCatalog::default());

    let user = User {
        id: UserId::new(),
        email: "buyer@example.com".to_string(),
        role: Role::Free,
        usage: FreeUsage::zeroed(Utc::now()),
        subscription_plan: None,
        subscription_ends_at: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    let user_id = user.id;
    users.create(&user).await.unwrap();

    let lifecycle = SubscriptionLifecycle::new(
        Arc::clone(&users),
        Arc::clone(&subscriptions),
        Arc::clone(&catalog),
    );
    let pending = lifecycle
        .create_pending(user_id, Plan::Pro, BillingCycle::Monthly)
        .await
        .unwrap();

    let router = WebhookRouter::new(lifecycle, Arc::clone(&subscriptions));
    Setup {
        users,
        subscriptions,
        router,
        user_id,
        subscription_id: pending.id,
    }
}

fn event(event_type: &str, object: serde_json::Value) -> WebhookEvent {
    WebhookEvent {
        id: "evt_test".to_string(),
        event_type: WebhookEventType::from(event_type),
        object,
        created: Utc::now().timestamp(),
    }
}

fn checkout_event(subscription_id: SubscriptionId, payment_ref: &str) -> WebhookEvent {
    event(
        "checkout.session.completed",
        json!({
            "id": "cs_test",
            "client_reference_id": subscription_id.to_string(),
            "subscription": payment_ref,
        }),
    )
}

#[tokio::test]
async fn checkout_completion_activates_and_promotes() {
    let s = setup_with_pending().await;

    let outcome = s
        .router
        .dispatch(&checkout_event(s.subscription_id, "sub_prov_1"))
        .await
        .unwrap();
    assert_eq!(outcome, DispatchOutcome::Activated(s.subscription_id));

    let sub = s.subscriptions.get(s.subscription_id).unwrap();
    assert_eq!(sub.status, SubscriptionStatus::Active);
    assert_eq!(sub.payment_ref.as_deref(), Some("sub_prov_1"));

    let user = s.users.find_by_id(s.user_id).await.unwrap().unwrap();
    assert_eq!(user.role, Role::Pro);
    assert_eq!(user.subscription_plan, Some(Plan::Pro));
}

#[tokio::test]
async fn replayed_checkout_event_is_harmless() {
    let s = setup_with_pending().await;
    let evt = checkout_event(s.subscription_id, "sub_prov_1");

    s.router.dispatch(&evt).await.unwrap();
    let outcome = s.router.dispatch(&evt).await.unwrap();
    assert_eq!(outcome, DispatchOutcome::Activated(s.subscription_id));
    assert_eq!(
        s.subscriptions.get(s.subscription_id).unwrap().status,
        SubscriptionStatus::Active
    );
}

#[tokio::test]
async fn invoice_events_append_renewals() {
    let s = setup_with_pending().await;
    s.router
        .dispatch(&checkout_event(s.subscription_id, "sub_prov_1"))
        .await
        .unwrap();

    let paid = event(
        "invoice.payment_succeeded",
        json!({ "id": "in_1", "subscription": "sub_prov_1", "amount_paid": 1999 }),
    );
    assert_eq!(
        s.router.dispatch(&paid).await.unwrap(),
        DispatchOutcome::RenewalRecorded(s.subscription_id)
    );

    let failed = event(
        "invoice.payment_failed",
        json!({ "id": "in_2", "subscription": "sub_prov_1", "amount_due": 1999 }),
    );
    s.router.dispatch(&failed).await.unwrap();

    let sub = s.subscriptions.get(s.subscription_id).unwrap();
    // a failed renewal is recorded, never auto-cancelled
    assert_eq!(sub.status, SubscriptionStatus::Active);
    assert_eq!(sub.renewals.len(), 2);
    assert_eq!(sub.renewals[0].outcome, RenewalOutcome::Success);
    assert_eq!(sub.renewals[0].amount_cents, 1999);
    assert_eq!(sub.renewals[1].outcome, RenewalOutcome::Failed);
    assert_eq!(sub.renewals[1].transaction_id, "in_2");
}

#[tokio::test]
async fn provider_deletion_cancels_and_demotes() {
    let s = setup_with_pending().await;
    s.router
        .dispatch(&checkout_event(s.subscription_id, "sub_prov_1"))
        .await
        .unwrap();

    let deleted = event(
        "customer.subscription.deleted",
        json!({ "id": "sub_prov_1" }),
    );
    assert_eq!(
        s.router.dispatch(&deleted).await.unwrap(),
        DispatchOutcome::Cancelled(s.subscription_id)
    );

    let sub = s.subscriptions.get(s.subscription_id).unwrap();
    assert_eq!(sub.status, SubscriptionStatus::Cancelled);
    assert!(sub.cancellation.is_some());
    assert_eq!(
        s.users.find_by_id(s.user_id).await.unwrap().unwrap().role,
        Role::Free
    );
}

#[tokio::test]
async fn unknown_events_are_acknowledged() {
    let s = setup_with_pending().await;

    let outcome = s
        .router
        .dispatch(&event("price.created", json!({ "id": "price_1" })))
        .await
        .unwrap();
    assert_eq!(outcome, DispatchOutcome::Ignored);
}

#[tokio::test]
async fn unmatched_payment_reference_is_a_webhook_error() {
    let s = setup_with_pending().await;

    let paid = event(
        "invoice.payment_succeeded",
        json!({ "id": "in_9", "subscription": "sub_nobody", "amount_paid": 1999 }),
    );
    let err = s.router.dispatch(&paid).await.unwrap_err();
    assert!(matches!(err, BillingError::Webhook(_)));
}

#[tokio::test]
async fn checkout_without_reference_is_rejected() {
    let s = setup_with_pending().await;

    let evt = event(
        "checkout.session.completed",
        json!({ "id": "cs_test", "subscription": "sub_prov_1" }),
    );
    let err = s.router.dispatch(&evt).await.unwrap_err();
    assert!(matches!(err, BillingError::Webhook(_)));
}

#[tokio::test]
async fn one_off_invoice_is_ignored() {
    let s = setup_with_pending().await;

    let paid = event(
        "invoice.payment_succeeded",
        json!({ "id": "in_standalone", "amount_paid": 500 }),
    );
    assert_eq!(
        s.router.dispatch(&paid).await.unwrap(),
        DispatchOutcome::Ignored
    );
}
