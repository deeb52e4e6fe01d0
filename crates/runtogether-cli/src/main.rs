//! runtogether
//!
//! Starts several commands at once and terminates all of them as soon as
//! one terminates, or when runtogether itself receives SIGINT / SIGTERM.
//! The exit code is that of the first command to terminate (130 when
//! interrupted, 1 when a command could not be started).

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use runtogether_config::{Config, tokenize};
use runtogether_supervisor::{ExitPolicy, Supervisor};
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::{Level, error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "runtogether")]
#[command(about = "Run several commands together; stop them all when one stops", long_about = None)]
#[command(version)]
struct Cli {
    /// Commands to run, one shell-style string each (e.g. "npm run watch")
    commands: Vec<String>,

    /// YAML configuration file; its commands run before the ones given here
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seconds between asking children to terminate and killing them
    #[arg(short = 't', long, value_name = "SECONDS")]
    kill_timeout: Option<f64>,

    /// Seconds between two liveness checks
    #[arg(long, value_name = "SECONDS")]
    poll_interval: Option<f64>,

    /// Which child exits stop the group
    #[arg(long, value_enum)]
    exit_on: Option<ExitOn>,

    /// Command to run after every child has been stopped
    #[arg(long, value_name = "COMMAND")]
    on_shutdown: Option<String>,

    /// Only print warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Print debug output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ExitOn {
    /// Any exit stops the group
    Any,
    /// Only failures stop the group
    NonZero,
}

impl From<ExitOn> for ExitPolicy {
    fn from(value: ExitOn) -> Self {
        match value {
            ExitOn::Any => ExitPolicy::Any,
            ExitOn::NonZero => ExitPolicy::NonZero,
        }
    }
}

fn init_tracing(cli: &Cli) {
    let level = if cli.quiet {
        Level::WARN
    } else if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .with_ansi(std::io::stdout().is_terminal())
        .init();
}

/// Merge the optional config file with the command line; flags win.
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => runtogether_config::parse_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => Config::default(),
    };

    config.commands.extend(cli.commands.iter().cloned());
    if let Some(timeout) = cli.kill_timeout {
        config.grace_period = timeout;
    }
    if let Some(interval) = cli.poll_interval {
        config.poll_interval = interval;
    }
    if let Some(exit_on) = cli.exit_on {
        config.exit_on = exit_on.into();
    }
    if let Some(hook) = &cli.on_shutdown {
        config.on_shutdown = Some(hook.clone());
    }

    runtogether_config::validate_config(&config)?;

    if config.commands.is_empty() {
        bail!("No commands to run; pass them as arguments or list them in --config");
    }
    Ok(config)
}

/// Build the completion callback running the `on_shutdown` command
fn shutdown_hook(line: &str, config: &Config) -> Result<impl FnOnce() + Send + use<>> {
    let argv = tokenize::split_non_empty(line)?;
    let mut command = std::process::Command::new(&argv[0]);
    command.args(&argv[1..]).envs(&config.env);
    if let Some(dir) = &config.working_dir {
        command.current_dir(dir);
    }

    let line = line.to_string();
    Ok(move || {
        info!("Running shutdown hook: {}", line);
        match command.status() {
            Ok(status) if status.success() => {}
            Ok(status) => warn!("Shutdown hook '{}' exited with {}", line, status),
            Err(err) => error!("Failed to run shutdown hook '{}': {}", line, err),
        }
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let config = load_config(&cli)?;
    // Tokenize everything up front: a malformed command fails the run before
    // anything has been started.
    let commands = config.build_commands()?;

    let mut supervisor = Supervisor::new(config.supervisor_config()?);
    if let Some(hook) = &config.on_shutdown {
        supervisor = supervisor.on_complete(shutdown_hook(hook, &config)?);
    }

    let code = smol::block_on(supervisor.run(commands));
    std::process::exit(code);
}
