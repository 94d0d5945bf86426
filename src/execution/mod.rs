//! Pipeline execution: scheduling and the pipeline graph store

pub mod scheduler;
pub mod store;

pub use scheduler::{ExecutionScheduler, SchedulingStrategy};
pub use store::{EventHandler, PipelineStore, StoreEvent, StoreOptions, CANCELLED_MESSAGE};
