//! cvisionary - command line client for the CVisionary resume scoring service.
//!
//! Logs in as a student or recruiter, keeps the session between runs, and
//! shows which views the current session may open.

mod commands;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cvisionary_core::auth::SessionContext;
use cvisionary_core::{ApiClient, Config, Role};

/// Log file name prefix in the cache directory (rotated daily)
const LOG_FILE_PREFIX: &str = "cvisionary.log";

/// cvisionary - resume scoring client
#[derive(Parser, Debug)]
#[command(name = "cvisionary")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a config file (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in and remember the session
    Login {
        /// Account email (defaults to CVISIONARY_EMAIL or the last login)
        #[arg(short, long)]
        email: Option<String>,

        /// Role to log in as
        #[arg(short, long, default_value = "student")]
        role: Role,
    },

    /// Create an account (does not log in)
    Signup {
        #[arg(short, long)]
        email: Option<String>,

        #[arg(short, long, default_value = "student")]
        role: Role,
    },

    /// Forget the current session
    Logout,

    /// Show who is logged in
    Status,

    /// Check whether a view may be opened, e.g. `open /recruiter`
    Open {
        /// View path or name
        view: String,
    },

    /// List the navigation links for the current session
    Nav,

    /// List analysed resumes (recruiters only)
    Resumes,
}

/// Initialize the tracing subscriber for logging.
///
/// Console output goes to stderr filtered by `RUST_LOG` (default `warn`);
/// a daily log file in the cache directory records `info` and above.
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let appender = config.cache_dir().ok().and_then(|dir| {
        RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(LOG_FILE_PREFIX)
            .build(dir)
            .ok()
    });

    let (file_layer, guard) = match appender {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(EnvFilter::new("info"));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_filter(console_filter))
        .with(file_layer)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config_path = cli.config;
    let config = match config_path {
        Some(ref path) => {
            let mut config = Config::load_from(path)?;
            config.apply_env();
            config
        }
        None => Config::load(),
    };

    let _log_guard = init_tracing(&config);
    debug!(api = %config.api_base_url, storage = ?config.storage, "Configuration loaded");

    let api = ApiClient::from_config(&config)?;
    let store = config.session_store()?;
    let context = SessionContext::new(Arc::new(api.clone()), store);
    context.subscribe(|state| match state.session() {
        Some(session) => info!(identity = %session.identity(), role = %session.role(), "Session active"),
        None => info!("Session cleared"),
    });
    context.boot();

    match cli.command {
        Commands::Login { email, role } => {
            let identity = commands::login(&context, &config, email, role).await?;
            if let Err(e) = commands::remember_identity(config_path.as_deref(), &identity) {
                warn!(error = %e, "Failed to save config");
            }
            Ok(())
        }
        Commands::Signup { email, role } => commands::signup(&context, &config, email, role).await,
        Commands::Logout => {
            commands::logout(&context);
            Ok(())
        }
        Commands::Status => {
            commands::status(&context);
            Ok(())
        }
        Commands::Open { view } => commands::open(&context, &view),
        Commands::Nav => {
            commands::nav(&context);
            Ok(())
        }
        Commands::Resumes => commands::resumes(&context, &api).await,
    }
}
