//! Scenelink CLI - command bridge for a GUI-hosted 3D application.
//!
//! This is the binary entry point. See the `scenelink` library for the
//! core functionality.

use anyhow::Result;
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use scenelink::{BridgeClient, Config};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// Global allocator configured per M-MIMALLOC-APPS guideline.
/// mimalloc provides better multi-threaded performance than the system allocator.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Global flag for signal-triggered shutdown (as Arc for signal-hook compatibility)
static SHUTDOWN_FLAG: std::sync::LazyLock<Arc<AtomicBool>> =
    std::sync::LazyLock::new(|| Arc::new(AtomicBool::new(false)));

// CLI
#[derive(Parser)]
#[command(name = "scenelink")]
#[command(version)]
#[command(about = "Command bridge between tool-calling assistants and a 3D host application")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the simulated host application (listener + tick loop)
    Host {
        /// Listen port (overrides config; 0 picks an ephemeral port)
        #[arg(long)]
        port: Option<u16>,
        /// Enable asset catalog commands regardless of config
        #[arg(long)]
        assets: bool,
    },
    /// Serve MCP JSON-RPC on stdio, bridging to the host socket
    Serve,
    /// Send one command and print its result
    Call {
        /// Command name (see `scenelink tools`)
        name: String,
        /// Parameters as a JSON object
        #[arg(default_value = "{}")]
        params: String,
    },
    /// List the capability catalog
    Tools,
    /// Check whether the host is reachable
    Status,
}

fn init_logging() {
    // Serve mode writes protocol to stdout and the host runs under a
    // GUI, so logs default to stderr; SCENELINK_LOG_FILE redirects.
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Ok(path) = std::env::var("SCENELINK_LOG_FILE") {
        match std::fs::File::create(&path) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(e) => eprintln!("Warning: could not open log file {path}: {e}"),
        }
    }
    builder.format_timestamp_secs().init();
}

fn run_host(mut config: Config, port: Option<u16>, assets: bool) -> Result<()> {
    if let Some(port) = port {
        config.port = port;
    }
    if assets {
        config.assets_enabled = true;
    }

    // Set up signal handlers
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::flag;
    flag::register(SIGINT, Arc::clone(&SHUTDOWN_FLAG))?;
    flag::register(SIGTERM, Arc::clone(&SHUTDOWN_FLAG))?;
    flag::register(SIGHUP, Arc::clone(&SHUTDOWN_FLAG))?;

    println!("Starting simulated host on {}:{} ...", config.host, config.port);
    scenelink::sim::run_host(&config, &SHUTDOWN_FLAG)
}

fn run_call(config: &Config, name: &str, params: &str) -> Result<()> {
    let params: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(params).map_err(|e| anyhow::anyhow!("params must be a JSON object: {e}"))?;

    let client = BridgeClient::new(config);
    match client.call(name, params) {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}

fn run_status(config: &Config) -> Result<()> {
    let client = BridgeClient::new(config);
    match client.fetch_scene() {
        Ok(scene) => {
            println!(
                "Host reachable at {}:{} - scene '{}' with {} object(s)",
                config.host, config.port, scene.name, scene.object_count
            );
            Ok(())
        }
        Err(err) => {
            eprintln!("Host not reachable at {}:{}: {err}", config.host, config.port);
            std::process::exit(1);
        }
    }
}

fn run_tools() {
    for spec in scenelink::client::catalog() {
        println!("{:<28} {}", spec.name, spec.description);
    }
}

fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Host { port, assets } => run_host(config, port, assets)?,
        Commands::Serve => scenelink::serve::run(&config)?,
        Commands::Call { name, params } => run_call(&config, &name, &params)?,
        Commands::Tools => run_tools(),
        Commands::Status => run_status(&config)?,
    }

    Ok(())
}
