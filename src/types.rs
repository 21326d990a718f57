//! Shared types for the accrual reconciliation service.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that store, oracle, and
//! reconciler modules can depend on them without circular references.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Order status
// ---------------------------------------------------------------------------

/// Lifecycle status of an order's accrual.
///
/// Orders only move forward: `New → Processing → {Processed, Invalid,
/// Registered}`. `Registered` is a terminal no-op outcome the accrual
/// authority may return; it is distinct from the initial `New` state and
/// such orders are never picked up again, since only `New` and
/// `Processing` orders are fetched each pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    Registered,
    Invalid,
    Processing,
    Processed,
}

impl OrderStatus {
    /// Whether the reconciler will never touch an order in this status again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Registered | Self::Invalid | Self::Processed)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::New => "NEW",
            Self::Registered => "REGISTERED",
            Self::Invalid => "INVALID",
            Self::Processing => "PROCESSING",
            Self::Processed => "PROCESSED",
        };
        write!(f, "{s}")
    }
}

/// Error returned when parsing an unrecognised status string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown order status: {0}")]
pub struct InvalidStatus(pub String);

impl FromStr for OrderStatus {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(Self::New),
            "REGISTERED" => Ok(Self::Registered),
            "INVALID" => Ok(Self::Invalid),
            "PROCESSING" => Ok(Self::Processing),
            "PROCESSED" => Ok(Self::Processed),
            other => Err(InvalidStatus(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Accrual record
// ---------------------------------------------------------------------------

/// The status/points projection of an order, as seen by reconciliation.
///
/// `points` is set if and only if `status == Processed`; every other
/// status carries no point value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccrualRecord {
    /// Order number as submitted by the user. Unique and immutable.
    pub order_id: String,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<Decimal>,
}

impl AccrualRecord {
    /// A freshly submitted order, awaiting its first reconciliation pass.
    pub fn new(order_id: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            status: OrderStatus::New,
            points: None,
        }
    }

    /// The register→acknowledge transition applied by the promote stage.
    pub fn into_processing(self) -> Self {
        Self {
            status: OrderStatus::Processing,
            ..self
        }
    }

    /// Apply a terminal outcome returned by the accrual authority.
    pub fn with_outcome(order_id: impl Into<String>, outcome: AccrualOutcome) -> Self {
        Self {
            order_id: order_id.into(),
            status: outcome.status,
            points: outcome.points,
        }
    }
}

impl fmt::Display for AccrualRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.points {
            Some(p) => write!(f, "order {} [{}] {p} pts", self.order_id, self.status),
            None => write!(f, "order {} [{}]", self.order_id, self.status),
        }
    }
}

// ---------------------------------------------------------------------------
// Accrual outcome
// ---------------------------------------------------------------------------

/// Terminal verdict returned by the accrual authority for one order.
#[derive(Debug, Clone, PartialEq)]
pub struct AccrualOutcome {
    pub status: OrderStatus,
    pub points: Option<Decimal>,
}

impl AccrualOutcome {
    /// The order earned points.
    pub fn processed(points: Decimal) -> Self {
        Self {
            status: OrderStatus::Processed,
            points: Some(points),
        }
    }

    /// The order was rejected by the authority.
    pub fn invalid() -> Self {
        Self {
            status: OrderStatus::Invalid,
            points: None,
        }
    }

    /// The authority acknowledged the order without awarding points.
    pub fn registered() -> Self {
        Self {
            status: OrderStatus::Registered,
            points: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
