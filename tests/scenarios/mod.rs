//! Scenario-based tests for biopipe

mod cancellation;
mod dependency_order;
mod failure_blocking;
mod persistence_sync;
