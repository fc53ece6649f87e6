use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::prelude::*;

use handoff_engine::{EngineConfig, ProcessEngine};
use handoff_store::SqliteStore;
use handoff_workflow::Variables;

/// Handoff - approval workflows driven by people passing and rejecting tasks
#[derive(Parser)]
#[command(name = "handoff")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the SQLite database (default: ~/.handoff/handoff.db)
  #[arg(long, global = true)]
  db: Option<PathBuf>,

  /// Engine configuration file (JSON)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  /// Refuse a second running instance of a process for one business id
  #[arg(long, global = true)]
  unique_business_key: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Publish and inspect process definitions
  Def {
    #[command(subcommand)]
    command: DefCommand,
  },
  /// Start and inspect process instances
  Inst {
    #[command(subcommand)]
    command: InstCommand,
  },
  /// Act on tasks
  Task {
    #[command(subcommand)]
    command: TaskCommand,
  },
}

#[derive(Subcommand)]
enum DefCommand {
  /// Publish a definition resource (JSON file, `-` for stdin)
  Save {
    name: String,
    resource_file: PathBuf,
    #[arg(long)]
    user: String,
    #[arg(long, default_value = "default")]
    source: String,
  },
  /// List the latest version of each definition under a source
  List {
    #[arg(long, default_value = "default")]
    source: String,
  },
  /// Print a definition's nodes
  Get { process_id: i64 },
}

#[derive(Subcommand)]
enum InstCommand {
  /// Start an instance
  Start {
    process_id: i64,
    business_id: String,
    #[arg(long, default_value = "")]
    comment: String,
    /// Variables as a JSON object of strings
    #[arg(long, default_value = "{}")]
    vars: String,
  },
  /// Print an instance
  Show { instance_id: i64 },
  /// Terminate a running instance
  Terminate { instance_id: i64 },
  /// Print every task of an instance
  Tasks { instance_id: i64 },
}

#[derive(Subcommand)]
enum TaskCommand {
  /// Pass a pending task
  Pass {
    task_id: i64,
    #[arg(long, default_value = "")]
    comment: String,
    #[arg(long, default_value = "{}")]
    vars: String,
  },
  /// Reject a pending task
  Reject {
    task_id: i64,
    #[arg(long, default_value = "")]
    comment: String,
    #[arg(long, default_value = "{}")]
    vars: String,
  },
  /// Pending tasks of a user
  Todo { user: String },
  /// Tasks a user has passed or rejected
  Finished { user: String },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
    )
    .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
    .init();

  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(run(cli))
}

async fn run(cli: Cli) -> Result<()> {
  let db = match cli.db {
    Some(path) => path,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".handoff")
      .join("handoff.db"),
  };
  let config = load_config(cli.config.as_deref())?;
  let engine = open_engine(&db, config, cli.unique_business_key).await?;

  match cli.command {
    Commands::Def { command } => match command {
      DefCommand::Save {
        name,
        resource_file,
        user,
        source,
      } => {
        let resource = read_resource(&resource_file)?;
        let saved = engine
          .save_definition(&name, &resource, &user, &source)
          .await
          .context("failed to save definition")?;
        print_json(&saved)
      }
      DefCommand::List { source } => print_json(&engine.list_definitions(&source).await?),
      DefCommand::Get { process_id } => {
        let nodes = engine
          .get_definition(process_id)
          .await
          .with_context(|| format!("failed to load definition {}", process_id))?;
        print_json(nodes.nodes())
      }
    },
    Commands::Inst { command } => match command {
      InstCommand::Start {
        process_id,
        business_id,
        comment,
        vars,
      } => {
        let variables = parse_vars(&vars)?;
        let instance_id = engine
          .start_instance(process_id, &business_id, &comment, variables)
          .await
          .context("failed to start instance")?;
        print_json(&engine.get_instance(instance_id).await?)
      }
      InstCommand::Show { instance_id } => print_json(&engine.get_instance(instance_id).await?),
      InstCommand::Terminate { instance_id } => {
        engine
          .terminate_instance(instance_id)
          .await
          .with_context(|| format!("failed to terminate instance {}", instance_id))?;
        print_json(&engine.get_instance(instance_id).await?)
      }
      InstCommand::Tasks { instance_id } => print_json(&engine.instance_tasks(instance_id).await?),
    },
    Commands::Task { command } => match command {
      TaskCommand::Pass {
        task_id,
        comment,
        vars,
      } => {
        let resolution = engine
          .pass_task(task_id, &comment, parse_vars(&vars)?)
          .await
          .with_context(|| format!("failed to pass task {}", task_id))?;
        print_json(&resolution)
      }
      TaskCommand::Reject {
        task_id,
        comment,
        vars,
      } => {
        let resolution = engine
          .reject_task(task_id, &comment, parse_vars(&vars)?)
          .await
          .with_context(|| format!("failed to reject task {}", task_id))?;
        print_json(&resolution)
      }
      TaskCommand::Todo { user } => print_json(&engine.todo_tasks(&user).await?),
      TaskCommand::Finished { user } => print_json(&engine.finished_tasks(&user).await?),
    },
  }
}

async fn open_engine(db: &Path, config: EngineConfig, unique_business_key: bool) -> Result<ProcessEngine> {
  if let Some(parent) = db.parent() {
    tokio::fs::create_dir_all(parent)
      .await
      .with_context(|| format!("failed to create {}", parent.display()))?;
  }

  let url = format!("sqlite://{}", db.display());
  debug!(%url, "opening database");
  let store = SqliteStore::connect(&url)
    .await
    .with_context(|| format!("failed to open database: {}", db.display()))?
    .with_unique_business_key(unique_business_key);
  store.migrate().await.context("failed to migrate database")?;

  Ok(ProcessEngine::with_config(Arc::new(store), config))
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
  let Some(path) = path else {
    return Ok(EngineConfig::default());
  };
  let content = std::fs::read_to_string(path)
    .with_context(|| format!("failed to read config file: {}", path.display()))?;
  serde_json::from_str(&content)
    .with_context(|| format!("failed to parse config file: {}", path.display()))
}

fn read_resource(path: &Path) -> Result<String> {
  if path == Path::new("-") {
    let mut buffer = String::new();
    io::stdin()
      .read_to_string(&mut buffer)
      .context("failed to read resource from stdin")?;
    return Ok(buffer);
  }
  std::fs::read_to_string(path)
    .with_context(|| format!("failed to read resource file: {}", path.display()))
}

fn parse_vars(json: &str) -> Result<Variables> {
  Variables::from_json(json).context("variables must be a JSON object of strings")
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}
