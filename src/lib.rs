//! biopipe - DAG orchestration and job-status engine for computational-biology pipelines
//!
//! A blueprint proposed by a planner is approved into a [`Pipeline`], which a
//! [`PipelineStore`] runs in dependency order. Each node goes through a
//! [`NodeExecutor`](adapter::NodeExecutor) chosen by its type, and each remote
//! job is observed by a [`JobStatusTransport`] until it settles.

pub mod adapter;
pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;
pub mod transport;

// Re-export commonly used types
pub use adapter::{ExecutorError, ExecutorRegistry, HttpNodeExecutor, NodeExecutor, Submission};
pub use core::{BlueprintReview, NodeStatus, NodeType, Pipeline, PipelineBlueprint, PipelineStatus, Selection};
pub use execution::{PipelineStore, SchedulingStrategy, StoreEvent, StoreOptions};
pub use persistence::{PersistenceAdapter, PersistenceError, PipelineCache};
pub use transport::{JobStatusTransport, TransportConfig};
