//! Ascent DB - Database abstractions
//!
//! SQLx-based persistence layer for the entitlement core. The core depends
//! only on the repository traits in [`repo`]; [`pg`] provides the PostgreSQL
//! implementations, including the atomic compare-and-increment that backs
//! usage metering.
//!
//! # Example
//!
//! ```rust,ignore
//! use ascent_db::{create_pool, Repositories};
//!
//! let pool = create_pool("postgres://localhost/ascent").await?;
//! let repos = Repositories::new(pool);
//!
//! let user = repos.users.find_by_email("user@example.com").await?;
//! ```

pub mod error;
pub mod models;
pub mod pg;
pub mod pool;
pub mod repo;

pub use error::{DbError, DbResult};
pub use models::*;
pub use pg::Repositories;
pub use pool::{create_pool, DbPool};
pub use repo::*;
