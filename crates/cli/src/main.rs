mod config;
mod error;
mod input;

use std::path::{Path, PathBuf};

use chrono::{Local, TimeDelta, Utc};
use clap::{Parser, Subcommand};
use datastore::{BackendKind, BucketMetadata, Datastore, Event};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use config::{Config, pulsetime_from_secs};
use error::Result;
use input::{Batch, read_json};

#[derive(Parser)]
#[command(name = "chronolog")]
#[command(about = "Store and compact timestamped activity events", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured backend (memory, file, document-store)
    #[arg(short, long, global = true)]
    backend: Option<BackendKind>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all buckets
    Buckets,
    /// Create a bucket
    Create {
        id: String,
        /// Kind of data the bucket holds
        #[arg(short = 't', long = "type")]
        kind: String,
        #[arg(long, default_value = "unknown")]
        client: String,
        #[arg(long, default_value = "unknown")]
        hostname: String,
        /// Display name (defaults to the id)
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Delete a bucket and all of its events
    Delete { id: String },
    /// Show a bucket's metadata
    Info { id: String },
    /// Insert an event (JSON object) or events (JSON array)
    Insert {
        id: String,
        /// Read JSON from this file instead of stdin
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Print the most recent events, newest first
    Events {
        id: String,
        /// Number of events, -1 for all
        #[arg(short, long, default_value = "-1", allow_negative_numbers = true)]
        limit: i64,
    },
    /// Replace the most recently inserted event
    ReplaceLast {
        id: String,
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Merge a heartbeat into the last event, or insert it
    Heartbeat {
        id: String,
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Seconds; defaults to the configured pulsetime
        #[arg(short, long)]
        pulsetime: Option<f64>,
    },
    /// Print events flooded, oldest first
    Flood {
        id: String,
        #[arg(short, long)]
        pulsetime: Option<f64>,
        #[arg(short, long, default_value = "-1", allow_negative_numbers = true)]
        limit: i64,
    },
}

fn main() {
    init_logging();
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::discover(cli.config.as_deref())?;
    if let Some(backend) = cli.backend {
        config.storage.backend = backend;
    }
    debug!(backend = %config.storage.backend, "loaded configuration");

    let mut store = Datastore::open(&config.storage, &config.document_store)?;

    match cli.command {
        Commands::Buckets => cmd_buckets(&store),
        Commands::Create {
            id,
            kind,
            client,
            hostname,
            name,
        } => {
            let mut metadata = BucketMetadata::new(id, kind, client, hostname, Utc::now());
            if let Some(name) = name {
                metadata = metadata.with_name(name);
            }
            let bucket = store.create_bucket(metadata)?;
            println!("Created bucket {}", bucket.id());
            Ok(())
        }
        Commands::Delete { id } => {
            store.delete_bucket(&id)?;
            println!("Deleted bucket {id}");
            Ok(())
        }
        Commands::Info { id } => {
            let metadata = store.bucket(id)?.metadata()?;
            println!("{}", serde_json::to_string_pretty(&metadata)?);
            Ok(())
        }
        Commands::Insert { id, file } => cmd_insert(&mut store, id, file.as_deref()),
        Commands::Events { id, limit } => {
            let events = store.bucket(id)?.get(limit_arg(limit))?;
            print_events(&events)
        }
        Commands::ReplaceLast { id, file } => {
            let event = Batch::from_json(read_json(file.as_deref())?)?.into_single()?;
            store.bucket(id)?.replace_last(event)?;
            Ok(())
        }
        Commands::Heartbeat {
            id,
            file,
            pulsetime,
        } => {
            let pulsetime = pulsetime_arg(pulsetime, &config)?;
            let event = Batch::from_json(read_json(file.as_deref())?)?.into_single()?;
            let mut bucket = store.bucket(id)?;
            let id = bucket.id().to_string();
            let stored = transform::heartbeat(bucket.backend_mut(), &id, event, pulsetime)?;
            println!("{}", serde_json::to_string(&stored)?);
            Ok(())
        }
        Commands::Flood {
            id,
            pulsetime,
            limit,
        } => {
            let pulsetime = pulsetime_arg(pulsetime, &config)?;
            let events = store.bucket(id)?.get(limit_arg(limit))?;
            print_events(&transform::flood(&events, pulsetime))
        }
    }
}

fn cmd_buckets(store: &Datastore) -> Result<()> {
    let buckets = store.buckets()?;

    if buckets.is_empty() {
        println!("No buckets found.");
        return Ok(());
    }

    println!(
        "{:<32}  {:<16}  {:<20}  {:<16}  CREATED",
        "BUCKET ID", "TYPE", "CLIENT", "HOSTNAME"
    );
    println!("{}", "-".repeat(104));

    for metadata in buckets.values() {
        let created = metadata.created.with_timezone(&Local).format("%Y-%m-%d %H:%M");
        println!(
            "{:<32}  {:<16}  {:<20}  {:<16}  {created}",
            metadata.id, metadata.kind, metadata.client, metadata.hostname
        );
    }

    Ok(())
}

fn cmd_insert(store: &mut Datastore, id: String, file: Option<&Path>) -> Result<()> {
    let batch = Batch::from_json(read_json(file)?)?;
    let count = batch.len();
    let mut bucket = store.bucket(id)?;
    match batch {
        Batch::One(event) => bucket.insert_one(event)?,
        Batch::Many(events) => bucket.insert_many(events)?,
    }
    println!("Inserted {count} event(s) into {}", bucket.id());
    Ok(())
}

/// Negative limits mean "everything".
fn limit_arg(limit: i64) -> Option<usize> {
    usize::try_from(limit).ok()
}

fn pulsetime_arg(secs: Option<f64>, config: &Config) -> Result<TimeDelta> {
    Ok(match secs {
        Some(secs) => pulsetime_from_secs(secs)?,
        None => config.pulsetime()?,
    })
}

fn print_events(events: &[Event]) -> Result<()> {
    for event in events {
        println!("{}", serde_json::to_string(event)?);
    }
    Ok(())
}
