mod config;

/// Version injected at compile time via ARMKIT_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("ARMKIT_VERSION") {
    Some(v) => v,
    None => "dev",
};

use anyhow::{Context, Result};
use armkit::arm::auth::EnvironmentCredential;
use armkit::arm::http::format_error;
use armkit::resource::{get_all_resource_keys, get_resource, ParentScope};
use armkit::{
    ArmClient, GenericResource, Operation, OperationStatus, ResourceCollection, ResourceId,
    WaitUntil,
};
use clap::{Parser, Subcommand, ValueEnum};
use config::Config;
use futures::TryStreamExt;
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Command-line client for the resource-management API
#[derive(Parser, Debug)]
#[command(name = "armkit", version = VERSION, about, long_about = None)]
struct Args {
    /// Management endpoint
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Default API version for types that do not pin one
    #[arg(long, global = true)]
    api_version: Option<String>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List known resource types
    Types,
    /// List all resources of a type under a scope
    List {
        /// Resource type key (see `types`)
        resource: String,
        /// Parent resource id, e.g. /subscriptions/{id}/resourceGroups/{name};
        /// a path without a subscription uses the default subscription
        #[arg(long)]
        scope: Option<String>,
        /// Page size hint
        #[arg(long)]
        top: Option<u32>,
    },
    /// Get one resource
    Get {
        resource: String,
        #[arg(long)]
        scope: Option<String>,
        name: String,
    },
    /// Check whether a resource exists
    Exists {
        resource: String,
        #[arg(long)]
        scope: Option<String>,
        name: String,
    },
    /// Create or replace a resource from a JSON file
    Put {
        resource: String,
        #[arg(long)]
        scope: Option<String>,
        name: String,
        /// JSON file holding the resource body
        #[arg(long)]
        body: PathBuf,
        /// Return once the service accepted the request
        #[arg(long)]
        no_wait: bool,
    },
    /// Delete a resource
    Delete {
        resource: String,
        #[arg(long)]
        scope: Option<String>,
        name: String,
        /// Return once the service accepted the request
        #[arg(long)]
        no_wait: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Failed to open log file {}: {}", log_path.display(), e);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("armkit {} started with log level: {:?}", VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("armkit").join("armkit.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".armkit").join("armkit.log");
    }
    PathBuf::from("armkit.log")
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    if let Err(err) = run(args).await {
        tracing::error!("{:#}", err);
        eprintln!("Error: {err:#}");
        if let Some(e @ armkit::Error::Request(_)) = err.downcast_ref::<armkit::Error>() {
            eprintln!("{}", format_error(e));
        }
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = Config::load();

    let endpoint = config.effective_endpoint(args.endpoint.as_deref());
    let options = config.to_client_options(args.api_version.as_deref());
    let connect = || -> Result<ArmClient> {
        tracing::info!("Using endpoint: {}, api-version: {}", endpoint, options.api_version);
        ArmClient::new(&endpoint, Arc::new(EnvironmentCredential), options.clone())
            .context("Failed to create management client")
    };

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, stopping wait");
            trigger.cancel();
        }
    });

    match args.command {
        Command::Types => print_types(),
        Command::List {
            resource,
            scope,
            top,
        } => {
            let scope = config::effective_scope(scope.as_deref())?;
            let collection = open_collection(connect()?, &resource, &scope)?;
            let mut pageable = collection.get_all();
            if let Some(top) = top {
                pageable = pageable.with_page_size_hint(top);
            }

            let items: Vec<GenericResource> = pageable
                .items()
                .try_collect()
                .await
                .with_context(|| format!("Failed to list {resource} under {scope}"))?;
            tracing::info!("Listed {} {}", items.len(), resource);

            if let Err(e) = config.set_last_resource(&resource) {
                tracing::warn!("Failed to save config: {:#}", e);
            }
            print_json(&items)
        }
        Command::Get {
            resource,
            scope,
            name,
        } => {
            let scope = config::effective_scope(scope.as_deref())?;
            let collection = open_collection(connect()?, &resource, &scope)?;
            let response = collection
                .get(&name)
                .await
                .with_context(|| format!("Failed to get {resource} '{name}'"))?;
            print_json(response.value())
        }
        Command::Exists {
            resource,
            scope,
            name,
        } => {
            let scope = config::effective_scope(scope.as_deref())?;
            let collection = open_collection(connect()?, &resource, &scope)?;
            let response = collection
                .exists(&name)
                .await
                .with_context(|| format!("Failed to check {resource} '{name}'"))?;
            print_json(&json!({ "name": name, "exists": response.value() }))
        }
        Command::Put {
            resource,
            scope,
            name,
            body,
            no_wait,
        } => {
            let content = std::fs::read_to_string(&body)
                .with_context(|| format!("Failed to read {}", body.display()))?;
            let data: GenericResource = serde_json::from_str(&content)
                .with_context(|| format!("Invalid resource body in {}", body.display()))?;

            let scope = config::effective_scope(scope.as_deref())?;
            let collection = open_collection(connect()?, &resource, &scope)?;
            let operation = collection
                .create_or_update(wait_until(no_wait), &name, &data, &cancel)
                .await
                .with_context(|| format!("Failed to create or update {resource} '{name}'"))?;
            print_operation(&operation)
        }
        Command::Delete {
            resource,
            scope,
            name,
            no_wait,
        } => {
            let scope = config::effective_scope(scope.as_deref())?;
            let collection = open_collection(connect()?, &resource, &scope)?;
            let operation = collection
                .delete(wait_until(no_wait), &name, &cancel)
                .await
                .with_context(|| format!("Failed to delete {resource} '{name}'"))?;
            print_operation(&operation)
        }
    }
}

fn wait_until(no_wait: bool) -> WaitUntil {
    if no_wait {
        WaitUntil::Started
    } else {
        WaitUntil::Completed
    }
}

fn open_collection(client: ArmClient, resource: &str, scope: &str) -> Result<ResourceCollection> {
    let def = get_resource(resource).with_context(|| {
        format!("Unknown resource type '{resource}'. Run `armkit types` to list them")
    })?;
    let parent = ResourceId::parse(scope).context("Invalid --scope")?;
    Ok(ResourceCollection::new(client, parent, def.clone())?)
}

fn print_types() -> Result<()> {
    let types: Vec<_> = get_all_resource_keys()
        .into_iter()
        .filter_map(|key| get_resource(key).map(|def| (key, def)))
        .map(|(key, def)| {
            let parent = match &def.parent {
                ParentScope::Subscription => "subscription".to_string(),
                ParentScope::ResourceGroup => "resource group".to_string(),
                ParentScope::Resource(parent) => parent.clone(),
            };
            json!({
                "key": key,
                "type": def.full_type(),
                "apiVersion": def.api_version,
                "parent": parent,
            })
        })
        .collect();
    print_json(&types)
}

fn print_operation<T: Serialize>(operation: &Operation<T>) -> Result<()> {
    let mut output = json!({
        "id": operation.id(),
        "status": operation.status(),
    });
    if let Some(location) = operation.location() {
        output["location"] = json!(location.as_str());
    }
    if let Some(error) = operation.error() {
        output["error"] = serde_json::to_value(error)?;
    }
    if let Ok(value) = operation.value() {
        output["value"] = serde_json::to_value(value)?;
    }
    print_json(&output)?;

    match operation.status() {
        OperationStatus::Failed | OperationStatus::Canceled => {
            anyhow::bail!("Operation {} ended {}", operation.id(), operation.status())
        }
        _ => Ok(()),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
