//! Postgres-backed order store.
//!
//! Thin `sqlx` wrapper around the orders table. Connection failure at
//! startup is the one fatal error class in the service, so `connect`
//! surfaces it to the caller instead of degrading.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::info;

use super::{OrderStore, StoreError};
use crate::types::{AccrualRecord, OrderStatus};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS orders(
    id         bigserial PRIMARY KEY,
    order_id   text NOT NULL UNIQUE,
    status     text NOT NULL CHECK
        (status IN ('NEW', 'REGISTERED', 'INVALID', 'PROCESSING', 'PROCESSED')),
    accrual    numeric,
    updated_at timestamptz NOT NULL
)";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to the database. Fatal on failure: the service cannot run
    /// without its store.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .acquire_timeout(Duration::from_secs(5))
            .connect(url)
            .await?;
        info!("Connected to Postgres");
        Ok(Self { pool })
    }

    /// Create the orders table if it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    fn record_from_row(row: &PgRow) -> Result<AccrualRecord, StoreError> {
        let order_id: String = row.try_get("order_id")?;
        let status_raw: String = row.try_get("status")?;
        let points: Option<Decimal> = row.try_get("accrual")?;

        let status: OrderStatus = status_raw
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("order {order_id}: {e}")))?;

        Ok(AccrualRecord {
            order_id,
            status,
            points,
        })
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn fetch_by_status(
        &self,
        status: OrderStatus,
    ) -> Result<Vec<AccrualRecord>, StoreError> {
        let rows = sqlx::query("SELECT order_id, status, accrual FROM orders WHERE status = $1")
            .bind(status.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::record_from_row).collect()
    }

    async fn persist(&self, record: &AccrualRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO orders (order_id, status, accrual, updated_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (order_id) DO UPDATE
                 SET status = excluded.status,
                     accrual = excluded.accrual,
                     updated_at = excluded.updated_at",
        )
        .bind(&record.order_id)
        .bind(record.status.to_string())
        .bind(record.points)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn submit_order(&self, order_id: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO orders (order_id, status, accrual, updated_at)
             VALUES ($1, $2, NULL, $3)
             ON CONFLICT (order_id) DO NOTHING",
        )
        .bind(order_id)
        .bind(OrderStatus::New.to_string())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::DuplicateOrder(order_id.to_string()));
        }
        Ok(())
    }

    async fn fetch_accrual(
        &self,
        order_id: &str,
    ) -> Result<Option<AccrualRecord>, StoreError> {
        let row = sqlx::query("SELECT order_id, status, accrual FROM orders WHERE order_id = $1")
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::record_from_row).transpose()
    }
}
