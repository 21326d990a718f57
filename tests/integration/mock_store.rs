//! Instrumented mock order store for integration testing.
//!
//! A deterministic `OrderStore` implementation that keeps the order table
//! in memory and records every call in arrival order. Individual fetches
//! and persists can be told to fail, which the failure-isolation and
//! barrier tests rely on.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use bonusd::store::{OrderStore, StoreError};
use bonusd::types::{AccrualRecord, OrderStatus};

/// One store call, in the order it arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Fetch(OrderStatus),
    Persist(String),
}

/// In-memory store with call recording and failure injection.
pub struct RecordingStore {
    orders: Mutex<HashMap<String, AccrualRecord>>,
    events: Mutex<Vec<StoreEvent>>,
    failing_persists: Mutex<HashSet<String>>,
    failing_fetches: Mutex<HashSet<OrderStatus>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self {
            orders: Mutex::new(HashMap::new()),
            events: Mutex::new(Vec::new()),
            failing_persists: Mutex::new(HashSet::new()),
            failing_fetches: Mutex::new(HashSet::new()),
        }
    }

    /// Insert a record directly, without recording an event.
    pub fn seed(&self, record: AccrualRecord) {
        self.orders
            .lock()
            .unwrap()
            .insert(record.order_id.clone(), record);
    }

    /// Force all fetches of `status` to return an error.
    pub fn set_fetch_error(&self, status: OrderStatus) {
        self.failing_fetches.lock().unwrap().insert(status);
    }

    /// Force persists of this order to fail.
    pub fn fail_persist_for(&self, order_id: &str) {
        self.failing_persists
            .lock()
            .unwrap()
            .insert(order_id.to_string());
    }

    pub fn clear_persist_failures(&self) {
        self.failing_persists.lock().unwrap().clear();
    }

    /// Every call recorded so far.
    pub fn events(&self) -> Vec<StoreEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn get(&self, order_id: &str) -> Option<AccrualRecord> {
        self.orders.lock().unwrap().get(order_id).cloned()
    }

    pub fn count_with_status(&self, status: OrderStatus) -> usize {
        self.orders
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.status == status)
            .count()
    }
}

#[async_trait]
impl OrderStore for RecordingStore {
    async fn fetch_by_status(
        &self,
        status: OrderStatus,
    ) -> Result<Vec<AccrualRecord>, StoreError> {
        self.events.lock().unwrap().push(StoreEvent::Fetch(status));

        if self.failing_fetches.lock().unwrap().contains(&status) {
            return Err(StoreError::Unavailable(format!(
                "injected fetch failure for {status}"
            )));
        }

        Ok(self
            .orders
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.status == status)
            .cloned()
            .collect())
    }

    async fn persist(&self, record: &AccrualRecord) -> Result<(), StoreError> {
        if self
            .failing_persists
            .lock()
            .unwrap()
            .contains(&record.order_id)
        {
            return Err(StoreError::Unavailable(format!(
                "injected persist failure for order {}",
                record.order_id
            )));
        }

        self.events
            .lock()
            .unwrap()
            .push(StoreEvent::Persist(record.order_id.clone()));
        self.orders
            .lock()
            .unwrap()
            .insert(record.order_id.clone(), record.clone());
        Ok(())
    }

    async fn submit_order(&self, order_id: &str) -> Result<(), StoreError> {
        let mut orders = self.orders.lock().unwrap();
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
        Ok(self.orders.lock().unwrap().get(order_id).cloned())
    }
}
