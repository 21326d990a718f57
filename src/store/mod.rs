//! Order persistence.
//!
//! The reconciler consumes storage through the [`OrderStore`] trait so it
//! never depends on a concrete backend. Two implementations are provided:
//! a Postgres-backed store for production and an in-memory store for tests
//! and database-less runs.

pub mod memory;
pub mod postgres;

pub use memory::MemStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{AccrualRecord, OrderStatus};

/// Errors surfaced by a store backend.
///
/// Fetching zero matching rows is not an error; `fetch_by_status` returns
/// an empty `Vec` for that case. An `Err` always means the backend itself
/// misbehaved (or the caller violated a uniqueness constraint).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("order {0} already submitted")]
    DuplicateOrder(String),

    #[error("corrupt order row: {0}")]
    Corrupt(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Backend(#[from] sqlx::Error),
}

/// Persistence interface consumed by the reconciliation loop.
///
/// Implementations must be safe for concurrent invocation from many worker
/// tasks simultaneously; the store owns whatever locking or transaction
/// discipline that requires.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// All orders currently in `status`. Empty is a normal result.
    async fn fetch_by_status(&self, status: OrderStatus)
        -> Result<Vec<AccrualRecord>, StoreError>;

    /// Upsert the record's status and points by `order_id`.
    async fn persist(&self, record: &AccrualRecord) -> Result<(), StoreError>;

    /// Create a fresh `NEW` record for a user-submitted order number.
    async fn submit_order(&self, order_id: &str) -> Result<(), StoreError>;

    /// Point lookup of a single order's accrual projection.
    async fn fetch_accrual(&self, order_id: &str)
        -> Result<Option<AccrualRecord>, StoreError>;
}
