//! Execution scheduler - determines which nodes to submit next

use crate::core::Pipeline;

/// Strategy for scheduling node submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulingStrategy {
    /// One node in flight at a time, in topological order
    Sequential,

    /// Submit every eligible node as soon as it is ready
    #[default]
    Parallel,

    /// At most N nodes in flight
    LimitedParallel(usize),
}

/// Scheduler for determining which nodes to submit
#[derive(Debug, Clone, Default)]
pub struct ExecutionScheduler {
    strategy: SchedulingStrategy,
}

impl ExecutionScheduler {
    pub fn new(strategy: SchedulingStrategy) -> Self {
        Self { strategy }
    }

    /// IDs of the nodes to submit now; every one has all dependencies completed
    pub fn next_nodes(&self, pipeline: &Pipeline) -> Vec<String> {
        match self.strategy {
            SchedulingStrategy::Sequential => self.next_limited(pipeline, 1),
            SchedulingStrategy::Parallel => pipeline.ready_nodes().iter().map(|n| n.id.clone()).collect(),
            SchedulingStrategy::LimitedParallel(max) => self.next_limited(pipeline, max.max(1)),
        }
    }

    fn next_limited(&self, pipeline: &Pipeline, max: usize) -> Vec<String> {
        let in_flight = pipeline.in_flight_nodes().len();
        let remaining = max.saturating_sub(in_flight);
        if remaining == 0 {
            return vec![];
        }

        let ready: Vec<String> = pipeline.ready_nodes().iter().map(|n| n.id.clone()).collect();
        pipeline
            .execution_order()
            .into_iter()
            .filter(|id| ready.contains(id))
            .take(remaining)
            .collect()
    }
}
