use anyhow::{Context, Result};
use biopipe::adapter::{ExecutorRegistry, HttpNodeExecutor};
use biopipe::cli::commands::{
    DeleteCommand, ListCommand, RerunCommand, RunCommand, ShowCommand, SyncCommand, ValidateCommand,
};
use biopipe::cli::output::*;
use biopipe::cli::{Cli, Command};
use biopipe::core::config::{EngineConfig, PersistenceBackendKind};
use biopipe::core::{BlueprintReview, Pipeline, PipelineBlueprint};
use biopipe::execution::{PipelineStore, SchedulingStrategy, StoreOptions};
use biopipe::persistence::{
    HttpPersistence, InMemoryPersistence, ListFilters, PersistenceAdapter, PipelineCache,
};
use std::sync::Arc;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("Failed to load engine config from {}", path))?,
        None => EngineConfig::default(),
    };

    // Execute command
    match &cli.command {
        Command::Validate(cmd) => validate_blueprint(cmd)?,
        Command::Run(cmd) => run_blueprint(cmd, &config).await?,
        Command::List(cmd) => list_pipelines(cmd, &config).await?,
        Command::Show(cmd) => show_pipeline(cmd, &config).await?,
        Command::Delete(cmd) => delete_pipeline(cmd, &config).await?,
        Command::Sync(cmd) => sync_pipelines(cmd, &config).await?,
        Command::Rerun(cmd) => rerun_node(cmd, &config).await?,
    }

    Ok(())
}

async fn persistence_backend(config: &EngineConfig) -> Result<Arc<dyn PersistenceAdapter>> {
    let settings = &config.persistence;
    let backend: Arc<dyn PersistenceAdapter> = match settings.backend {
        PersistenceBackendKind::Memory => Arc::new(InMemoryPersistence::new()),
        PersistenceBackendKind::Http => {
            let url = settings
                .url
                .as_deref()
                .context("persistence.url is required for the http backend")?;
            Arc::new(HttpPersistence::new(url).with_method_override(settings.method_override))
        }
        #[cfg(feature = "sqlite")]
        PersistenceBackendKind::Sqlite => {
            use biopipe::persistence::SqlitePipelineStore;
            let store = match &settings.path {
                Some(path) => {
                    let path = path.to_str().context("persistence.path is not valid UTF-8")?;
                    SqlitePipelineStore::new(path).await?
                }
                None => SqlitePipelineStore::with_default_path().await?,
            };
            Arc::new(store)
        }
        #[cfg(not(feature = "sqlite"))]
        PersistenceBackendKind::Sqlite => {
            anyhow::bail!("biopipe was built without the sqlite feature; choose another persistence backend")
        }
    };
    Ok(backend)
}

fn executor_registry(config: &EngineConfig) -> Result<ExecutorRegistry> {
    let remote = HttpNodeExecutor::new(config.services.clone())
        .context("Failed to create compute service client")?;
    Ok(ExecutorRegistry::uniform(Arc::new(remote)))
}

fn store_options(config: &EngineConfig, strategy: SchedulingStrategy, conversation: Option<String>) -> StoreOptions {
    let mut options = StoreOptions {
        conversation_id: conversation,
        transport: config.transport.to_transport_config(),
        strategy,
        ..Default::default()
    };
    if let Some(session) = &config.session_id {
        options.session_id = session.clone();
    }
    options
}

fn approve_blueprint(path: &str, selection: &biopipe::core::Selection) -> Result<Pipeline> {
    let blueprint = PipelineBlueprint::from_file(path)?;
    let mut review = BlueprintReview::new(blueprint);
    let pipeline = review
        .approve(selection)
        .with_context(|| format!("Blueprint {} was not approved", path))?;
    Ok(pipeline)
}

fn validate_blueprint(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating blueprint...", INFO);

    match approve_blueprint(&cmd.blueprint, &cmd.selection()) {
        Ok(pipeline) => {
            println!("{} Blueprint is valid!", CHECK);
            println!("  Name: {}", style(&pipeline.name).bold());
            println!("  Nodes: {}", style(pipeline.nodes().len()).cyan());
            println!("  Edges: {}", style(pipeline.edges().len()).cyan());
            println!("  Order: {}", style(pipeline.execution_order().join(" -> ")).dim());

            if cmd.json {
                let json = serde_json::to_string_pretty(&pipeline)?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    }
}

async fn run_blueprint(cmd: &RunCommand, config: &EngineConfig) -> Result<()> {
    let pipeline = approve_blueprint(&cmd.blueprint, &cmd.selection())?;
    println!(
        "{} Approved pipeline: {} ({} nodes)",
        INFO,
        style(&pipeline.name).bold(),
        pipeline.nodes().len()
    );

    if cmd.dry_run {
        println!("{}", format_pipeline(&pipeline));
        return Ok(());
    }

    let persistence = if cmd.no_save {
        None
    } else {
        Some(persistence_backend(config).await?)
    };
    let store = PipelineStore::new(
        pipeline,
        executor_registry(config)?,
        persistence,
        store_options(config, cmd.strategy.into(), cmd.conversation.clone()),
    );

    execute(&store).await
}

async fn rerun_node(cmd: &RerunCommand, config: &EngineConfig) -> Result<()> {
    let persistence = persistence_backend(config).await?;
    let pipeline = persistence
        .load(&cmd.id)
        .await
        .with_context(|| format!("Failed to load pipeline {}", cmd.id))?;

    let store = PipelineStore::new(
        pipeline,
        executor_registry(config)?,
        Some(persistence),
        store_options(config, cmd.strategy.into(), None),
    );
    let reset = store.rerun_node(&cmd.node).await?;
    println!("{} Re-running {}", INFO, style(reset.join(", ")).cyan());

    execute(&store).await
}

/// Run the store to completion; Ctrl-C cancels the pipeline
async fn execute(store: &PipelineStore) -> Result<()> {
    store.add_event_handler(|event| {
        if let Some(line) = format_store_event(&event) {
            println!("{}", line);
        }
    });

    println!();
    let run = store.run();
    tokio::pin!(run);
    let mut cancelled = false;
    let report = loop {
        tokio::select! {
            result = &mut run => break result?,
            signal = tokio::signal::ctrl_c(), if !cancelled => {
                if let Err(e) = signal {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                }
                println!("\n{} Cancelling pipeline...", WARN);
                store.cancel_pipeline().await?;
                cancelled = true;
            }
        }
    };

    println!("\n{}", format_report(&report));
    println!("  Pipeline ID: {}", style(&report.pipeline_id).dim());

    if !report.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

async fn list_pipelines(cmd: &ListCommand, config: &EngineConfig) -> Result<()> {
    let persistence = persistence_backend(config).await?;
    let records = persistence
        .list(&ListFilters {
            conversation_id: cmd.conversation.clone(),
            full: cmd.full,
        })
        .await?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("{} No pipelines found", INFO);
        return Ok(());
    }

    println!("{} Pipelines:", INFO);
    for record in &records {
        println!("  {}", format_record(record));
    }
    Ok(())
}

async fn show_pipeline(cmd: &ShowCommand, config: &EngineConfig) -> Result<()> {
    let persistence = persistence_backend(config).await?;
    let pipeline = persistence.load(&cmd.id).await?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&pipeline)?);
    } else {
        println!("{}", format_pipeline(&pipeline));
    }
    Ok(())
}

async fn delete_pipeline(cmd: &DeleteCommand, config: &EngineConfig) -> Result<()> {
    let persistence = persistence_backend(config).await?;
    persistence.delete(&cmd.id).await?;
    println!("{} Deleted pipeline {}", CHECK, style(&cmd.id).dim());
    Ok(())
}

async fn sync_pipelines(cmd: &SyncCommand, config: &EngineConfig) -> Result<()> {
    let persistence = persistence_backend(config).await?;
    let mut cache = PipelineCache::new(persistence);
    let filters = ListFilters {
        conversation_id: cmd.conversation.clone(),
        full: false,
    };

    let report = cache.sync(&filters).await?;
    debug!("Sync report: {:?}", report);

    println!(
        "{} Synced {} pipeline(s), {} hydrated from summaries",
        CHECK,
        style(report.updated.len()).cyan(),
        style(report.hydrated.len()).cyan()
    );
    for id in &report.skipped {
        println!("  {} Skipped {}", WARN, style(id).dim());
    }

    for pipeline in cache.pipelines() {
        println!(
            "  {} {} - {}",
            style(&pipeline.id).dim(),
            style(&pipeline.name).bold(),
            format_status(pipeline.status())
        );
    }
    Ok(())
}
