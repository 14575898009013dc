//! PostgreSQL repository implementations

mod subscription;
mod usage;
mod user;

pub use subscription::PgSubscriptionStore;
pub use usage::PgSubscriptionUsageStore;
pub use user::PgUserDirectory;

use crate::DbPool;

/// All repositories bundled together
#[derive(Clone)]
pub struct Repositories {
    pub users: PgUserDirectory,
    pub subscriptions: PgSubscriptionStore,
    pub subscription_usage: PgSubscriptionUsageStore,
}

impl Repositories {
    /// Create all repositories from a database pool
    pub fn new(pool: DbPool) -> Self {
        Self {
            users: PgUserDirectory::new(pool.clone()),
            subscriptions: PgSubscriptionStore::new(pool.clone()),
            subscription_usage: PgSubscriptionUsageStore::new(pool),
        }
    }
}
