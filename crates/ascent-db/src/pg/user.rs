//! PostgreSQL user directory implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use ascent_types::{Plan, Role, User, UserId};

use crate::error::DbResult;
use crate::models::UserRow;
use crate::repo::{FreeCounter, UserDirectory};

const USER_COLUMNS: &str = "id, email, role, resume_analysis_count, interview_sessions_count, \
     usage_reset_at, subscription_plan, subscription_ends_at, created_at, updated_at";

/// PostgreSQL user directory
#[derive(Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    /// Create a new user directory
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_by_id(&self, id: UserId) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user.map(UserRow::into_domain))
    }

    async fn find_by_email(&self, email: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user.map(UserRow::into_domain))
    }

    async fn create(&self, user: &User) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, role, resume_analysis_count,
                               interview_sessions_count, usage_reset_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user.id.0)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(user.usage.resume_analysis_count)
        .bind(user.usage.interview_sessions_count)
        .bind(user.usage.last_reset_date)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_role(&self, id: UserId, role: Role) -> DbResult<()> {
        sqlx::query("UPDATE users SET role = $1, updated_at = NOW() WHERE id = $2")
            .bind(role.as_str())
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn set_subscription_window(
        &self,
        id: UserId,
        plan: Option<Plan>,
        ends_at: Option<DateTime<Utc>>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET subscription_plan = $1, subscription_ends_at = $2, updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(plan.map(|p| p.as_str()))
        .bind(ends_at)
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn charge_free_usage(
        &self,
        id: UserId,
        counter: FreeCounter,
        limit: i64,
    ) -> DbResult<bool> {
        // Guard and increment in one statement so racing callers cannot both
        // cross the limit.
        let sql = match counter {
            FreeCounter::ResumeAnalysis => {
                r#"
                UPDATE users
                SET resume_analysis_count = resume_analysis_count + 1, updated_at = NOW()
                WHERE id = $1 AND ($2 = -1 OR resume_analysis_count < $2)
                "#
            }
            FreeCounter::Interviews => {
                r#"
                UPDATE users
                SET interview_sessions_count = interview_sessions_count + 1, updated_at = NOW()
                WHERE id = $1 AND ($2 = -1 OR interview_sessions_count < $2)
                "#
            }
        };

        let result = sqlx::query(sql)
            .bind(id.0)
            .bind(limit)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn reset_free_usage(
        &self,
        id: UserId,
        stale_anchor: DateTime<Utc>,
        new_anchor: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET resume_analysis_count = 0,
                interview_sessions_count = 0,
                usage_reset_at = $3,
                updated_at = NOW()
            WHERE id = $1 AND usage_reset_at = $2
            "#,
        )
        .bind(id.0)
        .bind(stale_anchor)
        .bind(new_anchor)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
