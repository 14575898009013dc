//! PostgreSQL subscription store implementation

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;

use ascent_types::{
    Cancellation, FeatureSet, Plan, Renewal, Subscription, SubscriptionId, UserId,
};

use crate::error::DbResult;
use crate::models::SubscriptionRow;
use crate::repo::SubscriptionStore;

const SUB_COLUMNS: &str = "id, user_id, plan, status, billing_cycle, price_cents, currency, \
     start_date, end_date, trial_ends_at, payment_provider, payment_ref, \
     features, cancellation, renewals, created_at, updated_at";

/// PostgreSQL subscription store
#[derive(Clone)]
pub struct PgSubscriptionStore {
    pool: PgPool,
}

impl PgSubscriptionStore {
    /// Create a new subscription store
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionStore for PgSubscriptionStore {
    async fn find_by_id(&self, id: SubscriptionId) -> DbResult<Option<Subscription>> {
        let sub = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {SUB_COLUMNS} FROM subscriptions WHERE id = $1"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sub.map(SubscriptionRow::into_domain))
    }

    async fn find_by_user_id(&self, user_id: UserId) -> DbResult<Option<Subscription>> {
        // Uniqueness on user_id guarantees at most one row.
        let sub = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {SUB_COLUMNS} FROM subscriptions WHERE user_id = $1"
        ))
        .bind(user_id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sub.map(SubscriptionRow::into_domain))
    }

    async fn find_by_payment_ref(&self, payment_ref: &str) -> DbResult<Option<Subscription>> {
        let sub = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {SUB_COLUMNS} FROM subscriptions WHERE payment_ref = $1"
        ))
        .bind(payment_ref)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sub.map(SubscriptionRow::into_domain))
    }

    async fn create(&self, sub: &Subscription) -> DbResult<()> {
        // One row per user: a superseded (non-entitled) row is replaced in
        // place. The caller has already rejected entitled conflicts.
        sqlx::query(
            r#"
            INSERT INTO subscriptions (id, user_id, plan, status, billing_cycle, price_cents,
                                       currency, start_date, end_date, trial_ends_at,
                                       payment_provider, payment_ref, features, renewals)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (user_id) DO UPDATE
            SET id = EXCLUDED.id, plan = EXCLUDED.plan, status = EXCLUDED.status,
                billing_cycle = EXCLUDED.billing_cycle, price_cents = EXCLUDED.price_cents,
                currency = EXCLUDED.currency, start_date = EXCLUDED.start_date,
                end_date = EXCLUDED.end_date, trial_ends_at = EXCLUDED.trial_ends_at,
                payment_provider = EXCLUDED.payment_provider, payment_ref = EXCLUDED.payment_ref,
                features = EXCLUDED.features, cancellation = NULL,
                renewals = EXCLUDED.renewals, updated_at = NOW()
            "#,
        )
        .bind(sub.id.0)
        .bind(sub.user_id.0)
        .bind(sub.plan.as_str())
        .bind(sub.status.as_str())
        .bind(sub.billing_cycle.as_str())
        .bind(sub.price_cents)
        .bind(&sub.currency)
        .bind(sub.start_date)
        .bind(sub.end_date)
        .bind(sub.trial_ends_at)
        .bind(&sub.payment_provider)
        .bind(&sub.payment_ref)
        .bind(Json(&sub.features))
        .bind(Json(&sub.renewals))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_active(
        &self,
        id: SubscriptionId,
        payment_ref: &str,
        features: &FeatureSet,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE subscriptions
            SET status = 'active', payment_ref = $2, features = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .bind(payment_ref)
        .bind(Json(features))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_cancelled(
        &self,
        id: SubscriptionId,
        cancellation: &Cancellation,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE subscriptions
            SET status = 'cancelled', cancellation = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .bind(Json(cancellation))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_expired(&self, id: SubscriptionId) -> DbResult<()> {
        sqlx::query("UPDATE subscriptions SET status = 'expired', updated_at = NOW() WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn replace_plan(
        &self,
        id: SubscriptionId,
        plan: Plan,
        price_cents: i64,
        features: &FeatureSet,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE subscriptions
            SET plan = $2, price_cents = $3, features = $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .bind(plan.as_str())
        .bind(price_cents)
        .bind(Json(features))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn append_renewal(&self, id: SubscriptionId, renewal: &Renewal) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE subscriptions
            SET renewals = renewals || $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .bind(Json(renewal))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
