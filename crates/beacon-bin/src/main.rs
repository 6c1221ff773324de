//! Beacon - command-line host for the event delivery pipeline.

mod app;

use std::path::PathBuf;

use beacon_config_and_utils::{init_logging, Config, Paths};
use clap::{Parser, Subcommand};

/// Beacon command-line interface.
#[derive(Parser)]
#[command(name = "beacon")]
#[command(about = "Buffered, crash-safe delivery of interaction events")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error). Defaults to the configured level.
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for config, storage and logs. Defaults to ~/.beacon
    #[arg(long, env = "BEACON_HOME", global = true)]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Track one event and try to deliver it immediately
    Track {
        /// Event identifier
        event_id: String,
        /// Event properties as a JSON object
        #[arg(long, default_value = "{}")]
        props: String,
    },
    /// Send every persisted event in a single attempt
    Flush,
    /// Retry persisted events with bounded attempts
    Retry {
        /// Attempts before giving up. Defaults to the configured value.
        #[arg(long)]
        attempts: Option<u32>,
        /// Seconds between attempts. Defaults to the configured value.
        #[arg(long)]
        interval: Option<u64>,
    },
    /// List persisted events awaiting delivery
    Pending,
    /// Discard every persisted event
    Reset,
    /// Store collector credentials
    Login {
        #[arg(long, env = "BEACON_API_KEY")]
        api_key: String,
        #[arg(long)]
        session_id: String,
        #[arg(long)]
        user_id: Option<String>,
    },
    /// Remove stored collector credentials
    Logout,
    /// Read events from stdin and deliver them until EOF or Ctrl-C
    Run {
        /// Flush interval in seconds (5 to 60). Defaults to the configured value.
        #[arg(long)]
        flush_interval: Option<f64>,
        /// Enable the idle monitor with this threshold in seconds
        #[arg(long)]
        idle_threshold: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    paths.ensure_dirs()?;
    let mut config = Config::load(&paths)?;
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    config.validate()?;

    let also_stderr = matches!(cli.command, Commands::Run { .. });
    init_logging(&config.log_level, &paths, also_stderr);

    match cli.command {
        Commands::Track { event_id, props } => app::track(&config, &paths, &event_id, &props).await?,
        Commands::Flush => app::flush(&config, &paths).await?,
        Commands::Retry { attempts, interval } => {
            app::retry(&config, &paths, attempts, interval).await?
        }
        Commands::Pending => app::pending(&config, &paths)?,
        Commands::Reset => app::reset(&config, &paths)?,
        Commands::Login {
            api_key,
            session_id,
            user_id,
        } => app::login(&paths, &api_key, &session_id, user_id.as_deref())?,
        Commands::Logout => app::logout(&paths)?,
        Commands::Run {
            flush_interval,
            idle_threshold,
        } => {
            if let Some(secs) = flush_interval {
                config.flush_interval_secs = secs;
            }
            if idle_threshold.is_some() {
                config.idle_threshold_secs = idle_threshold;
            }
            config.validate()?;
            app::run(&config, &paths).await?
        }
    }

    Ok(())
}
