//! Integration tests for the reconciliation loop.

mod mock_store;
