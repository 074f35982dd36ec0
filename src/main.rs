use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cadence_barrier::{
  BarrierCoordinator, BarrierWaiter, CoordinatorConfig, ValidatedBarrier, concurrent_batches,
  load_workflows, plan,
};
use cadence_config::{PipelineDef, WorkflowDef};
use cadence_store::SqliteStore;
use cadence_workflow::Workflow;

/// Cadence - barrier synchronization for concurrently launched workflows
#[derive(Parser)]
#[command(name = "cadence")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.cadence)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  /// SQLite database URL (default: sqlite://<data_dir>/cadence.db)
  #[arg(long, global = true)]
  database_url: Option<String>,

  /// Path to a JSON coordinator configuration file
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Show the barriers a pipeline run would create, without persisting them
  Plan {
    /// Path to the pipeline file (JSON)
    pipeline_file: PathBuf,

    /// Directory holding the workflow files (JSON) the pipeline references
    #[arg(long)]
    workflows: PathBuf,
  },

  /// Create the barriers of a pipeline run
  Launch {
    /// Path to the pipeline file (JSON)
    pipeline_file: PathBuf,

    /// Directory holding the workflow files (JSON) the pipeline references
    #[arg(long)]
    workflows: PathBuf,

    /// Pipeline execution id (default: a new uuid)
    #[arg(long)]
    execution_id: Option<String>,
  },

  /// Show a barrier instance
  Show {
    /// Barrier instance id
    id: String,
  },

  /// List the barrier instances of a pipeline execution
  List { pipeline_execution_id: String },

  /// Register the arrival of a workflow at a barrier
  Arrive {
    pipeline_execution_id: String,
    barrier: String,
    workflow_id: String,
    pipeline_state_id: String,

    /// Block until every participant has arrived
    #[arg(long)]
    wait: bool,
  },

  /// Wait until a barrier instance is saturated
  Wait {
    /// Barrier instance id
    id: String,
  },
}

#[derive(Serialize)]
struct PlannedBatch {
  batch: usize,
  workflows: Vec<String>,
  barriers: Vec<ValidatedBarrier>,
}

fn main() -> Result<()> {
  init_tracing();
  let cli = Cli::parse();

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".cadence"),
  };

  let Some(command) = cli.command else {
    println!("cadence - use --help to see available commands");
    return Ok(());
  };

  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async {
    let config = load_config(cli.config.as_deref()).await?;
    let open = || open_coordinator(&data_dir, cli.database_url.clone(), &config);

    match command {
      Commands::Plan {
        pipeline_file,
        workflows,
      } => plan_pipeline(&pipeline_file, &workflows).await,
      Commands::Launch {
        pipeline_file,
        workflows,
        execution_id,
      } => {
        let coordinator = open().await?;
        let (pipeline, workflows) = load_pipeline(&pipeline_file, &workflows).await?;
        let execution_id = execution_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        info!(
          pipeline_id = %pipeline.pipeline_id,
          execution_id = %execution_id,
          "launching pipeline"
        );

        let created = coordinator
          .construct_barriers(&pipeline, &workflows, &execution_id)
          .await
          .context("failed to construct barriers")?;
        print_json(&created)
      }
      Commands::Show { id } => {
        let coordinator = open().await?;
        print_json(&coordinator.get(&id).await?)
      }
      Commands::List {
        pipeline_execution_id,
      } => {
        let coordinator = open().await?;
        print_json(&coordinator.list(&pipeline_execution_id).await?)
      }
      Commands::Arrive {
        pipeline_execution_id,
        barrier,
        workflow_id,
        pipeline_state_id,
        wait,
      } => {
        let coordinator = open().await?;
        let status = if wait {
          BarrierWaiter::new(&coordinator, config.wait.clone())
            .arrive_and_wait(
              &barrier,
              &pipeline_execution_id,
              &workflow_id,
              &pipeline_state_id,
            )
            .await?
        } else {
          coordinator
            .arrive(
              &barrier,
              &pipeline_execution_id,
              &workflow_id,
              &pipeline_state_id,
            )
            .await?
        };
        print_json(&status)
      }
      Commands::Wait { id } => {
        let coordinator = open().await?;
        let instance = BarrierWaiter::new(&coordinator, config.wait.clone())
          .wait(&id)
          .await?;
        print_json(&instance)
      }
    }
  })
}

fn init_tracing() {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cadence=info")),
    )
    .with_writer(std::io::stderr)
    .init();
}

async fn load_config(path: Option<&Path>) -> Result<CoordinatorConfig> {
  let Some(path) = path else {
    return Ok(CoordinatorConfig::default());
  };
  let content = tokio::fs::read_to_string(path)
    .await
    .with_context(|| format!("failed to read config file: {}", path.display()))?;
  serde_json::from_str(&content)
    .with_context(|| format!("failed to parse config file: {}", path.display()))
}

async fn open_coordinator(
  data_dir: &Path,
  database_url: Option<String>,
  config: &CoordinatorConfig,
) -> Result<BarrierCoordinator<SqliteStore>> {
  let database_url = match database_url {
    Some(url) => url,
    None => {
      tokio::fs::create_dir_all(data_dir)
        .await
        .with_context(|| format!("failed to create data dir: {}", data_dir.display()))?;
      format!("sqlite://{}", data_dir.join("cadence.db").display())
    }
  };

  let options = SqliteConnectOptions::from_str(&database_url)
    .with_context(|| format!("invalid database url: {}", database_url))?
    .create_if_missing(true);
  let pool = SqlitePoolOptions::new()
    .connect_with(options)
    .await
    .with_context(|| format!("failed to open database: {}", database_url))?;

  let store = SqliteStore::with_config(pool, config.store.clone());
  store.migrate().await.context("failed to migrate database")?;
  Ok(BarrierCoordinator::new(store))
}

async fn load_pipeline(
  pipeline_file: &Path,
  workflows_dir: &Path,
) -> Result<(PipelineDef, HashMap<String, Workflow>)> {
  let pipeline_content = tokio::fs::read_to_string(pipeline_file)
    .await
    .with_context(|| format!("failed to read pipeline file: {}", pipeline_file.display()))?;
  let pipeline: PipelineDef = serde_json::from_str(&pipeline_content)
    .with_context(|| format!("failed to parse pipeline file: {}", pipeline_file.display()))?;
  eprintln!("Loaded pipeline: {}", pipeline.name);

  let mut defs = Vec::new();
  let mut entries = tokio::fs::read_dir(workflows_dir)
    .await
    .with_context(|| format!("failed to read workflows dir: {}", workflows_dir.display()))?;
  while let Some(entry) = entries.next_entry().await? {
    let path = entry.path();
    if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
      continue;
    }
    let content = tokio::fs::read_to_string(&path)
      .await
      .with_context(|| format!("failed to read workflow file: {}", path.display()))?;
    let def: WorkflowDef = serde_json::from_str(&content)
      .with_context(|| format!("failed to parse workflow file: {}", path.display()))?;
    defs.push(def);
  }
  eprintln!("Loaded {} workflows", defs.len());

  let workflows = load_workflows(defs).context("invalid workflow definition")?;
  Ok((pipeline, workflows))
}

async fn plan_pipeline(pipeline_file: &Path, workflows_dir: &Path) -> Result<()> {
  let (pipeline, workflows) = load_pipeline(pipeline_file, workflows_dir).await?;

  let batches = concurrent_batches(&pipeline, &workflows)?;
  let mut planned = Vec::with_capacity(batches.len());
  for (index, batch) in batches.iter().enumerate() {
    let barriers = plan(batch).with_context(|| format!("batch {} is invalid", index))?;
    planned.push(PlannedBatch {
      batch: index,
      workflows: batch.iter().map(|i| i.workflow_id.clone()).collect(),
      barriers,
    });
  }

  print_json(&planned)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

#[cfg(test)]
mod tests {
  use clap::CommandFactory;

  use super::*;

  #[test]
  fn test_cli_definition_is_valid() {
    Cli::command().debug_assert();
  }

  #[test]
  fn test_parse_arrive_with_wait() {
    let cli = Cli::try_parse_from(["cadence", "arrive", "exec", "deploy", "wf1", "ps1", "--wait"])
      .unwrap();
    assert!(matches!(
      cli.command,
      Some(Commands::Arrive { wait: true, ref barrier, .. }) if barrier == "deploy"
    ));
  }

  #[test]
  fn test_parse_wait() {
    let cli = Cli::try_parse_from(["cadence", "wait", "barrier-id", "--config", "cadence.json"])
      .unwrap();
    assert!(matches!(cli.command, Some(Commands::Wait { ref id }) if id == "barrier-id"));
    assert_eq!(cli.config, Some(PathBuf::from("cadence.json")));
  }
}
