//! CLI command definitions

use crate::core::Selection;
use crate::execution::SchedulingStrategy;
use clap::Args;
use serde_json::Value;

/// Validate a blueprint
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to blueprint file (YAML or JSON)
    pub blueprint: String,

    /// Node ids to approve (default: all proposed nodes)
    #[arg(long)]
    pub select: Vec<String>,

    /// Print the approved pipeline as JSON
    #[arg(long)]
    pub json: bool,
}

/// Approve and run a blueprint
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to blueprint file (YAML or JSON)
    pub blueprint: String,

    /// Node ids to approve (default: all proposed nodes)
    #[arg(long)]
    pub select: Vec<String>,

    /// Configuration overrides (node.key=value; value parsed as JSON when possible)
    #[arg(long, value_parser = parse_override)]
    pub set: Vec<ConfigOverride>,

    /// Scheduling strategy
    #[arg(long, value_enum, default_value_t = SchedulingStrategyArg::Parallel)]
    pub strategy: SchedulingStrategyArg,

    /// Conversation to attach the pipeline to
    #[arg(long)]
    pub conversation: Option<String>,

    /// Approve and print the execution order without running
    #[arg(long)]
    pub dry_run: bool,

    /// Don't save the pipeline
    #[arg(long)]
    pub no_save: bool,
}

impl RunCommand {
    pub fn selection(&self) -> Selection {
        selection(&self.select, &self.set)
    }
}

impl ValidateCommand {
    pub fn selection(&self) -> Selection {
        selection(&self.select, &[])
    }
}

fn selection(select: &[String], overrides: &[ConfigOverride]) -> Selection {
    let base = if select.is_empty() {
        Selection::all()
    } else {
        Selection::only(select.iter().cloned())
    };
    overrides.iter().fold(base, |sel, o| {
        sel.with_override(o.node.clone(), o.key.clone(), o.value.clone())
    })
}

/// List stored pipelines
#[derive(Debug, Args, Clone)]
pub struct ListCommand {
    /// Only pipelines of this conversation
    #[arg(long)]
    pub conversation: Option<String>,

    /// Request complete records instead of summaries
    #[arg(long)]
    pub full: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show a stored pipeline
#[derive(Debug, Args, Clone)]
pub struct ShowCommand {
    /// Pipeline id
    pub id: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Delete a stored pipeline
#[derive(Debug, Args, Clone)]
pub struct DeleteCommand {
    /// Pipeline id
    pub id: String,
}

/// Reconcile with the persistence backend
#[derive(Debug, Args, Clone)]
pub struct SyncCommand {
    /// Only pipelines of this conversation
    #[arg(long)]
    pub conversation: Option<String>,
}

/// Re-run a failed node
#[derive(Debug, Args, Clone)]
pub struct RerunCommand {
    /// Pipeline id
    pub id: String,

    /// Failed node to re-run; the nodes it blocked run again too
    pub node: String,

    /// Scheduling strategy
    #[arg(long, value_enum, default_value_t = SchedulingStrategyArg::Parallel)]
    pub strategy: SchedulingStrategyArg,
}

/// Scheduling strategy argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SchedulingStrategyArg {
    Sequential,
    Parallel,
    #[clap(name = "parallel-limited")]
    ParallelLimited,
}

impl From<SchedulingStrategyArg> for SchedulingStrategy {
    fn from(arg: SchedulingStrategyArg) -> Self {
        match arg {
            SchedulingStrategyArg::Sequential => SchedulingStrategy::Sequential,
            SchedulingStrategyArg::Parallel => SchedulingStrategy::Parallel,
            SchedulingStrategyArg::ParallelLimited => SchedulingStrategy::LimitedParallel(4),
        }
    }
}

/// A `node.key=value` configuration override
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigOverride {
    pub node: String,
    pub key: String,
    pub value: Value,
}

/// Parse `node.key=value`; the value is JSON if it parses, else a string
pub fn parse_override(s: &str) -> Result<ConfigOverride, String> {
    let (target, raw) = s
        .split_once('=')
        .ok_or_else(|| format!("Invalid override (expected node.key=value): {}", s))?;
    let (node, key) = target
        .split_once('.')
        .ok_or_else(|| format!("Invalid override target (expected node.key): {}", target))?;
    if node.is_empty() || key.is_empty() {
        return Err(format!("Invalid override target: {}", target));
    }

    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok(ConfigOverride {
        node: node.to_string(),
        key: key.to_string(),
        value,
    })
}
