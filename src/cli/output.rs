//! CLI output formatting

use crate::core::{NodeStatus, Pipeline, PipelineStatus, RunReport};
use crate::execution::StoreEvent;
use crate::persistence::PipelineRecord;
use console::Emoji;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static BLOCKED: Emoji<'_, '_> = Emoji("⛔ ", "# ");

/// Format a node status for display
pub fn format_node_status(status: NodeStatus) -> String {
    match status {
        NodeStatus::Idle => style("IDLE").dim().to_string(),
        NodeStatus::Queued => style("QUEUED").blue().to_string(),
        NodeStatus::Running => style("RUNNING").yellow().to_string(),
        NodeStatus::Completed => style("COMPLETED").green().to_string(),
        NodeStatus::Error => style("ERROR").red().to_string(),
    }
}

/// Format a pipeline status for display
pub fn format_status(status: PipelineStatus) -> String {
    match status {
        PipelineStatus::Draft => style("DRAFT").dim().to_string(),
        PipelineStatus::Running => style("RUNNING").yellow().to_string(),
        PipelineStatus::Completed => style("COMPLETED").green().to_string(),
        PipelineStatus::Failed => style("FAILED").red().to_string(),
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// One line per stored pipeline
pub fn format_record(record: &PipelineRecord) -> String {
    let status_icon = match record.status {
        PipelineStatus::Completed => CHECK,
        PipelineStatus::Failed => CROSS,
        PipelineStatus::Running => SPINNER,
        PipelineStatus::Draft => INFO,
    };
    let nodes = match &record.nodes {
        Some(nodes) => format!("{} nodes", nodes.len()),
        None => "summary".to_string(),
    };

    format!(
        "{} {} - {} - {} - {} - {}",
        status_icon,
        style(short_id(&record.id)).dim(),
        style(&record.name).bold(),
        format_status(record.status),
        style(nodes).cyan(),
        style(record.updated_at.format("%Y-%m-%d %H:%M")).dim()
    )
}

/// Multi-line pipeline details in execution order
pub fn format_pipeline(pipeline: &Pipeline) -> String {
    let mut lines = vec![
        format!("{} {}", INFO, style(&pipeline.name).bold()),
        format!("  ID: {}", style(&pipeline.id).cyan()),
        format!("  Status: {}", format_status(pipeline.status())),
        format!("  Updated: {}", style(pipeline.updated_at().to_rfc3339()).dim()),
        String::new(),
    ];

    for id in pipeline.execution_order() {
        let Some(node) = pipeline.node(&id) else {
            continue;
        };
        let deps = pipeline.dependencies(&id);
        let after = if deps.is_empty() {
            String::new()
        } else {
            format!(" after {}", deps.join(", "))
        };
        lines.push(format!(
            "  {} {} ({}){} - {}",
            style(&node.id).cyan(),
            node.label,
            style(node.node_type).dim(),
            style(after).dim(),
            format_node_status(node.status())
        ));
        if let Some(error) = node.error() {
            lines.push(format!("      {}", style(error).red()));
        }
    }

    lines.join("\n")
}

/// Format a store event for display
pub fn format_store_event(event: &StoreEvent) -> Option<String> {
    let line = match event {
        StoreEvent::PipelineStarted { pipeline_id, name } => format!(
            "{} Starting pipeline {} ({})",
            ROCKET,
            style(name).bold(),
            style(short_id(pipeline_id)).dim()
        ),
        StoreEvent::NodeQueued { .. } => return None,
        StoreEvent::NodeStarted { node_id, job_id } => match job_id {
            Some(job) => format!("{} {} (job {})", SPINNER, style(node_id).cyan(), style(job).dim()),
            None => format!("{} {}", SPINNER, style(node_id).cyan()),
        },
        StoreEvent::NodeProgress {
            node_id,
            progress,
            message,
        } => {
            let progress = progress.map(|p| format!("{}%", p)).unwrap_or_default();
            format!(
                "  {} {} {}",
                style(node_id).dim(),
                style(progress).cyan(),
                message.as_deref().unwrap_or_default()
            )
        }
        StoreEvent::NodeCompleted { node_id, duration_ms } => match duration_ms {
            Some(ms) => format!(
                "{} {} {}",
                CHECK,
                style(node_id).green(),
                style(format_duration_ms(*ms)).dim()
            ),
            None => format!("{} {}", CHECK, style(node_id).green()),
        },
        StoreEvent::NodeFailed {
            node_id,
            error,
            budget_exceeded,
        } => {
            let hint = if *budget_exceeded {
                style(" (the job may still finish remotely)").yellow().to_string()
            } else {
                String::new()
            };
            format!("{} {}: {}{}", CROSS, style(node_id).red(), style(error).dim(), hint)
        }
        StoreEvent::NodeBlocked { node_id, blocked_by } => format!(
            "{} {} blocked by {}",
            BLOCKED,
            style(node_id).yellow(),
            style(blocked_by).red()
        ),
        StoreEvent::NodeCancelled { node_id } => {
            format!("{} {} cancelled", WARN, style(node_id).yellow())
        }
        StoreEvent::PipelineFinished { status, .. } => {
            format!("{} Pipeline finished: {}", INFO, format_status(*status))
        }
        StoreEvent::SyncFailed { error, .. } => format!(
            "{} Could not save pipeline, changes kept locally: {}",
            WARN,
            style(error).dim()
        ),
    };
    Some(line)
}

/// Post-run summary
pub fn format_report(report: &RunReport) -> String {
    let mut lines = Vec::new();
    let headline = if report.is_success() {
        format!("{} Pipeline completed {}", CHECK, style("successfully").green())
    } else {
        format!("{} Pipeline {}", CROSS, style("failed").red())
    };
    lines.push(headline);
    lines.push(format!(
        "  {} completed, {} failed, {} blocked ({:.0}%)",
        style(report.completed.len()).green(),
        style(report.failed.len()).red(),
        style(report.blocked.len()).yellow(),
        report.progress() * 100.0
    ));

    for entry in &report.log {
        let duration = entry
            .duration_ms
            .map(format_duration_ms)
            .unwrap_or_else(|| "-".to_string());
        lines.push(format!(
            "  {:<24} {:<10} {}",
            entry.node_id,
            format_node_status(entry.status),
            style(duration).dim()
        ));
    }

    for (node, message) in &report.failed {
        lines.push(format!("  {} {}: {}", CROSS, style(node).red(), message));
    }
    for (node, cause) in &report.blocked {
        lines.push(format!(
            "  {} {} did not run because {} failed",
            BLOCKED,
            style(node).yellow(),
            style(cause).red()
        ));
    }
    if report.unsynced {
        lines.push(format!("{} Pipeline has unsynced changes", WARN));
    }

    lines.join("\n")
}

pub fn format_duration_ms(ms: i64) -> String {
    let secs = ms.max(0) / 1000;
    if secs < 60 {
        format!("{}.{:01}s", secs, (ms.max(0) % 1000) / 100)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
