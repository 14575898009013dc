//! PostgreSQL counted-usage mutations
//!
//! Both statements mutate the `features` JSONB document on the subscription
//! row. A single UPDATE takes a row lock, so the guard and the write are
//! atomic without an application-level read-modify-write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use ascent_types::{Feature, UserId};

use crate::error::DbResult;
use crate::repo::SubscriptionUsageStore;

/// PostgreSQL subscription usage store
#[derive(Clone)]
pub struct PgSubscriptionUsageStore {
    pool: PgPool,
}

impl PgSubscriptionUsageStore {
    /// Create a new usage store
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionUsageStore for PgSubscriptionUsageStore {
    async fn try_charge(&self, user_id: UserId, feature: Feature) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET features = jsonb_set(
                    features,
                    ARRAY[$2::text, 'used'],
                    to_jsonb((features -> $2 ->> 'used')::bigint + 1)
                ),
                updated_at = NOW()
            WHERE user_id = $1
              AND status IN ('active', 'trial')
              AND (features -> $2 ->> 'enabled')::boolean
              AND (
                    (features -> $2 ->> 'limit')::bigint = -1
                    OR (features -> $2 ->> 'used')::bigint
                         < (features -> $2 ->> 'limit')::bigint
                  )
            "#,
        )
        .bind(user_id.0)
        .bind(feature.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn reset_counter(
        &self,
        user_id: UserId,
        feature: Feature,
        stale_anchor: DateTime<Utc>,
        new_anchor: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET features = jsonb_set(
                    jsonb_set(features, ARRAY[$2::text, 'used'], '0'::jsonb),
                    ARRAY[$2::text, 'period_started_at'],
                    to_jsonb($4::timestamptz)
                ),
                updated_at = NOW()
            WHERE user_id = $1
              AND (features -> $2 ->> 'period_started_at')::timestamptz = $3
            "#,
        )
        .bind(user_id.0)
        .bind(feature.as_str())
        .bind(stale_anchor)
        .bind(new_anchor)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
