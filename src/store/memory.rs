//! In-memory order store.
//!
//! Keeps the full order table in a `HashMap` behind an async `RwLock`.
//! Used by tests and by the binary when no database is configured.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{OrderStore, StoreError};
use crate::types::{AccrualRecord, OrderStatus};

/// Thread-safe in-memory store keyed by order id.
#[derive(Default)]
pub struct MemStore {
    orders: RwLock<HashMap<String, AccrualRecord>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held.
    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    /// Clone out every record, in no particular order.
    pub async fn snapshot(&self) -> Vec<AccrualRecord> {
        self.orders.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl OrderStore for MemStore {
    async fn fetch_by_status(
        &self,
        status: OrderStatus,
    ) -> Result<Vec<AccrualRecord>, StoreError> {
        let orders = self.orders.read().await;
        Ok(orders
            .values()
            .filter(|r| r.status == status)
            .cloned()
            .collect())
    }

    async fn persist(&self, record: &AccrualRecord) -> Result<(), StoreError> {
        let mut orders = self.orders.write().await;
        orders.insert(record.order_id.clone(), record.clone());
        Ok(())
    }

    async fn submit_order(&self, order_id: &str) -> Result<(), StoreError> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(order_id) {
            return Err(StoreError::DuplicateOrder(order_id.to_string()));
        }
        orders.insert(order_id.to_string(), AccrualRecord::new(order_id));
        Ok(())
    }

    async fn fetch_accrual(
        &self,
        order_id: &str,
    ) -> Result<Option<AccrualRecord>, StoreError> {
        Ok(self.orders.read().await.get(order_id).cloned())
    }
}
