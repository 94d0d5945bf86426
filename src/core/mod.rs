//! Core domain models for pipelines
//!
//! This module defines the fundamental data structures that represent
//! pipelines, their nodes and edges, blueprints awaiting approval, and
//! execution state.

pub mod blueprint;
pub mod config;
pub mod error;
pub mod node;
pub mod pipeline;
pub mod state;

pub use blueprint::{BlueprintReview, PipelineBlueprint, Selection};
pub use error::{PipelineError, ValidationError};
pub use node::*;
pub use pipeline::*;
pub use state::*;
