use clap::Parser;
use colored::*;
use eyre::{Context, Result, bail};
use log::{info, warn};
use std::fs;

use restartd::config::Config;
use restartd::signals::ShutdownSignals;
use restartd::supervisor::{Supervisor, TokioSleeper};
use restartd::watcher::{ChangeSource, Disabled, NotifySource};
use tokio_util::sync::CancellationToken;

mod cli;

use cli::Cli;
use cli::commands::Commands;

fn setup_logging(config: &Config, verbose: bool) -> Result<()> {
    let level = if verbose {
        "debug"
    } else {
        config.log_level.as_deref().unwrap_or("info")
    };
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level));

    if let Some(log_file) = &config.log_file {
        if let Some(parent) = log_file.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).context("Failed to create log directory")?;
        }
        let target = Box::new(
            fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_file)
                .context("Failed to open log file")?,
        );
        builder.target(env_logger::Target::Pipe(target));
    }

    builder.init();

    match &config.log_file {
        Some(path) => info!("Logging initialized, writing to: {}", path.display()),
        None => info!("Logging initialized"),
    }
    Ok(())
}

fn run_application(cli: &Cli, config: Config) -> Result<()> {
    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        None => handle_run_command(config, false, &[]),
        Some(Commands::Run { no_watch, command }) => handle_run_command(config, *no_watch, command),
        Some(Commands::Config) => handle_config_command(&config),
    }
}

fn handle_run_command(mut config: Config, no_watch: bool, command: &[String]) -> Result<()> {
    if let Some((program, args)) = command.split_first() {
        config.worker.program = program.clone();
        config.worker.args = args.to_vec();
    }
    config.validate().context("Invalid configuration")?;

    let worker = config.worker.command();
    let changes: Box<dyn ChangeSource> = if no_watch || !config.watch.enabled {
        info!("Hot reload disabled");
        Box::new(Disabled)
    } else {
        let filter = config.watch.filter();
        let source = NotifySource::new(config.watch_dir(), filter.clone());
        info!("Watching {} for {:?} changes", source.dir().display(), filter.extensions());
        Box::new(source)
    };

    println!("{} {}", "Supervising:".green(), worker.display());

    let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
    let summary = runtime.block_on(async move {
        let shutdown = CancellationToken::new();

        // Handlers must be installed before the first spawn.
        match ShutdownSignals::register() {
            Ok(mut signals) => {
                let trigger = shutdown.clone();
                tokio::spawn(async move {
                    match signals.recv().await {
                        Ok(name) => {
                            info!("Received {}, shutting down", name);
                            trigger.cancel();
                        }
                        Err(e) => warn!("Signal listener failed: {}", e),
                    }
                });
            }
            Err(e) => warn!("Signal handlers unavailable: {}", e),
        }

        let mut supervisor =
            Supervisor::new(worker, changes, TokioSleeper, config.exit_codes, config.policy);
        supervisor.run(shutdown).await
    });

    println!(
        "{} {} runs, {} crashes, {} reloads, {} restart requests",
        "Stopped:".cyan(),
        summary.runs,
        summary.crashes,
        summary.file_triggered,
        summary.restarts_requested
    );
    Ok(())
}

fn handle_config_command(config: &Config) -> Result<()> {
    let yaml = serde_yaml::to_string(config).context("Failed to render configuration")?;
    println!("{}", "Effective configuration:".cyan());
    print!("{}", yaml);
    if let Err(e) = config.validate() {
        bail!("Configuration is invalid: {}", e);
    }
    Ok(())
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration (a broken config file is an error)
    let (config, source) = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    // Setup logging once the level is known
    setup_logging(&config, cli.is_verbose()).context("Failed to setup logging")?;

    match &source {
        Some(path) => info!("Loaded config from: {}", path.display()),
        None => info!("No config file found, using defaults"),
    }

    run_application(&cli, config).context("Application failed")?;

    Ok(())
}
