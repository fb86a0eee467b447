//! Tracker CLI - bootstrap binary for the event tracking core.
//!
//! A thin client over [`tracker_engine::Engine`]: loads configuration,
//! wires an in-memory storage driver and the default collaborators, and
//! runs a single payload through `track()`. A production deployment
//! would swap the in-memory driver for an Elasticsearch-backed one
//! satisfying the same `StorageDriver` trait (non-goal here).

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tracker_core::prelude::*;
use tracker_engine::prelude::*;
use tracker_storage::prelude::*;
use tracker_telemetry::{LogConfig, RequestContext, setup_logging};

/// Tracker CLI - run payloads through the event tracking core.
#[derive(Parser)]
#[command(name = "tracker")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file; embedded defaults are used
    /// if omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (`trace`, `debug`, `info`, `warn`, `error`).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single payload through `track()` and print the response.
    Track {
        /// Path to a JSON-encoded `TrackerPayload`; reads stdin if omitted.
        #[arg(short, long)]
        payload: Option<PathBuf>,

        /// Bridge this request is presented as arriving through.
        #[arg(long, default_value = "rest")]
        bridge: String,

        /// Detach the pipeline and return immediately with a minimal response.
        #[arg(long)]
        run_async: bool,
    },

    /// Print the effective configuration and exit.
    Config,
}

fn read_payload(path: Option<&PathBuf>) -> Result<TrackerPayload> {
    let raw = match path {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("reading payload from {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf).context("reading payload from stdin")?;
            buf
        },
    };
    serde_json::from_str(&raw).context("parsing payload JSON")
}

/// Seed an in-memory storage driver with a permissive demo source
/// matching `source_id`, so a CLI run works without any external setup.
fn demo_storage(source_id: &SourceId) -> InMemoryStorageDriver {
    let storage = InMemoryStorageDriver::new();
    storage.seed_source(EventSource {
        id: source_id.clone(),
        returns_profile: true,
        transitional: false,
        synchronize_profiles: false,
        allowed_bridges: vec!["rest".to_owned(), "javascript".to_owned(), "webhook".to_owned()],
        consent: serde_json::Value::Null,
    });
    storage
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => tracker_config::Config::load_file(path).with_context(|| format!("loading config from {}", path.display()))?,
        None => tracker_config::Config::load(None).context("loading embedded config defaults")?,
    };

    setup_logging(&LogConfig::new(cli.log_level.clone())).ok();

    match cli.command {
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config).context("serializing config")?);
            Ok(())
        },
        Commands::Track { payload, bridge, run_async } => {
            let payload = read_payload(payload.as_ref())?;
            let source_id = payload.source.id().clone();

            let storage: Arc<dyn StorageDriver> = Arc::new(demo_storage(&source_id));
            let engine_config = EngineConfig::from(&config);
            let engine = Engine::with_defaults(storage, engine_config);

            let context = RequestContext::generate().with_operation("track");
            let _guard = context.enter();

            let response = engine
                .track(TrackRequest {
                    payload,
                    client_ip: None,
                    bridge,
                    internal_source: None,
                    run_async,
                    static_profile_id: None,
                    allowed_bridges: None,
                })
                .await
                .context("running track()")?;

            println!("{}", serde_json::to_string_pretty(&response).context("serializing response")?);
            Ok(())
        },
    }
}
