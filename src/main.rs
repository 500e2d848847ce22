use clap::Parser;
use std::path::PathBuf;
use std::process;
use tracing::{error, info};
use watchlog::{ArrivalWatcher, Config, ConfigError, ExtractionEngine, PathRegistry};

#[derive(Parser, Debug)]
#[command(name = "watchlog")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Extract ZIP archives as they arrive in synced directories")]
#[command(
    long_about = "Watches directories for ZIP archives moved in by a sync process and extracts \
                  each one, once, to a paired output directory as <name>.txt."
)]
#[command(after_help = "EXAMPLES:\n  \
    watchlog -w /srv/sync/app1 /srv/sync/app2 -e /srv/logs/app1 /srv/logs/app2\n  \
    watchlog --config /etc/watchlog.toml -v")]
struct Cli {
    /// Directories to watch (paired by position with --extract-to)
    #[arg(short = 'w', long = "watch-paths", num_args = 1.., value_name = "DIR")]
    watch_paths: Vec<PathBuf>,

    /// Directories to extract into (paired by position with --watch-paths)
    #[arg(short = 'e', long = "extract-to", num_args = 1.., value_name = "DIR")]
    extract_to: Vec<PathBuf>,

    /// Configuration file path
    #[arg(short, long, help = "Path to TOML configuration file")]
    config: Option<PathBuf>,

    /// Verbose output level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (warnings and errors only)
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn default_log_level(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.default_log_level())),
        )
        .init();

    let exit_code = run(cli).await;
    process::exit(exit_code);
}

async fn run(cli: Cli) -> i32 {
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let mapping = match PathRegistry::build(&config.watch_paths, &config.extract_to) {
        Ok(mapping) => mapping,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let engine = ExtractionEngine::new(config.extraction.clone());
    let tracker = engine.completion_tracker().into_shared();

    let mut watcher = match ArrivalWatcher::new(mapping, engine, tracker) {
        Ok(watcher) => watcher.with_seed_manifest(config.seed_manifest.clone()),
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    if let Err(e) = watcher.start() {
        eprintln!("Error: {}", e);
        return 1;
    }

    if let Err(e) = watcher.reconcile().await {
        error!(error = %e, "Startup reconciliation failed");
        eprintln!("Error: {}", e);
        return 1;
    }

    info!("Waiting for arrivals (Ctrl+C to stop)");
    watchlog::run_until_signal(watcher).await;
    0
}

fn load_config(cli: &Cli) -> watchlog::Result<Config> {
    let base = match &cli.config {
        Some(path) => Config::from_toml_file(path)?,
        None => Config::default(),
    };

    let config = base.with_overrides(cli.watch_paths.clone(), cli.extract_to.clone());
    config.validate()?;

    if config.watch_paths.is_empty() || config.extract_to.is_empty() {
        return Err(ConfigError::Invalid {
            key: "watch_paths".to_string(),
            message: "at least one --watch-paths and --extract-to directory is required"
                .to_string(),
        }
        .into());
    }

    Ok(config)
}
