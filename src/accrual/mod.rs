//! Accrual authority client.
//!
//! The reconciler asks the authority for a terminal verdict on each
//! `PROCESSING` order. The verdict is opaque and non-deterministic from
//! the loop's perspective: a single call yields a single terminal state,
//! with no retry semantics of its own. [`RandomOracle`] stands in for the
//! remote authority with a uniform three-way draw.

use async_trait::async_trait;
use rand::Rng;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::debug;

use crate::types::AccrualOutcome;

/// Errors surfaced by an accrual authority.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("accrual authority unavailable: {0}")]
    Unavailable(String),
}

/// External authority returning a terminal accrual outcome per order.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccrualOracle: Send + Sync {
    async fn resolve(&self, order_id: &str) -> Result<AccrualOutcome, OracleError>;
}

/// Randomized accrual authority.
///
/// Draws uniformly among `PROCESSED` (with a point value in [0, 1000),
/// two decimal places), `INVALID`, and `REGISTERED`. Every outcome it
/// returns satisfies the points-iff-processed invariant.
#[derive(Default)]
pub struct RandomOracle;

impl RandomOracle {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AccrualOracle for RandomOracle {
    async fn resolve(&self, order_id: &str) -> Result<AccrualOutcome, OracleError> {
        let outcome = {
            let mut rng = rand::thread_rng();
            match rng.gen_range(0..3) {
                // Point value drawn in cents to stay off floats entirely.
                0 => AccrualOutcome::processed(Decimal::new(rng.gen_range(0..100_000), 2)),
                1 => AccrualOutcome::invalid(),
                _ => AccrualOutcome::registered(),
            }
        };

        debug!(order_id, status = %outcome.status, "Accrual outcome drawn");
        Ok(outcome)
    }
}
