//! gantry, a supervised HTTP application server.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌────────────────────────────────────────────────────┐
//!                  │                     SUPERVISOR                     │
//!                  │                                                    │
//!   signals ──────▶│  bind listener → drop privileges → resolve app    │
//!   (TERM/INT/HUP) │        │                                           │
//!                  │        ▼                                           │
//!                  │  ┌──────────┐   shared accept    ┌─────────────┐  │
//!   clients ──────▶│  │ listener │◀──────────────────▶│ worker pool │  │
//!                  │  └──────────┘                    │  w0 w1 … wN │  │
//!                  │                                  └──────┬──────┘  │
//!                  │         worker events / drain signals   │         │
//!                  │◀─────────────────────────────────────────┘         │
//!                  │                                                    │
//!                  │  crash → budgeted respawn    SIGHUP → rolling     │
//!                  │  SIGTERM → drain, bounded by drain timeout        │
//!                  └────────────────────────────────────────────────────┘
//! ```
//!
//! Exit codes: 0 clean shutdown, 1 fatal startup error, 2 unclean shutdown
//! (drain timeout exceeded).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use gantry::app::{status, AppRegistry};
use gantry::config::{loader, validation};
use gantry::lifecycle::{signals, ShutdownOutcome};
use gantry::observability::logging;
use gantry::{ServerConfig, Supervisor};

const EXIT_STARTUP_FAILURE: u8 = 1;
const EXIT_UNCLEAN_SHUTDOWN: u8 = 2;

#[derive(Parser)]
#[command(name = "gantry", about = "Supervised HTTP application server", version)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address (e.g. 0.0.0.0:8080).
    #[arg(long)]
    bind: Option<String>,

    /// Number of workers in the pool.
    #[arg(long)]
    workers: Option<usize>,

    /// Log verbosity (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Application entry point, module:attribute style.
    #[arg(long)]
    app: Option<String>,

    /// Unprivileged account to switch to after binding.
    #[arg(long)]
    user: Option<String>,
}

fn apply_cli_overrides(config: &mut ServerConfig, cli: &Cli) {
    if let Some(bind) = &cli.bind {
        config.listener.bind_address = bind.clone();
    }
    if let Some(workers) = cli.workers {
        config.workers.count = workers;
    }
    if let Some(level) = &cli.log_level {
        config.observability.log_level = level.clone();
    }
    if let Some(app) = &cli.app {
        config.app.entry_point = app.clone();
    }
    if let Some(user) = &cli.user {
        config.runtime.user = Some(user.clone());
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match loader::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("gantry: {error}");
            return ExitCode::from(EXIT_STARTUP_FAILURE);
        }
    };
    apply_cli_overrides(&mut config, &cli);
    if let Err(errors) = validation::validate_config(&config) {
        for error in &errors {
            eprintln!("gantry: invalid configuration: {error}");
        }
        return ExitCode::from(EXIT_STARTUP_FAILURE);
    }

    logging::init(&config.observability.log_level);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        workers = config.workers.count,
        app = %config.app.entry_point,
        "gantry starting"
    );

    let mut registry = AppRegistry::new();
    if let Err(error) = registry.register(status::ENTRY_POINT, status::factory()) {
        tracing::error!(error = %error, "failed to register built-in application");
        return ExitCode::from(EXIT_STARTUP_FAILURE);
    }

    let (supervisor, control) = Supervisor::new(config, registry, cli.config.clone());

    let signal_control = control.control_sender();
    tokio::spawn(async move {
        if let Err(error) = signals::listen(signal_control).await {
            tracing::error!(error = %error, "signal handler failed");
        }
    });

    match supervisor.run().await {
        Ok(ShutdownOutcome::Clean) => ExitCode::SUCCESS,
        Ok(ShutdownOutcome::Forced) => ExitCode::from(EXIT_UNCLEAN_SHUTDOWN),
        Err(error) => {
            tracing::error!(error = %error, "fatal startup error");
            ExitCode::from(EXIT_STARTUP_FAILURE)
        }
    }
}
