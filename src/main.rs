//! vibemq-mgmt - inspect management configuration offline
//!
//! Usage:
//!   vibemq-mgmt [OPTIONS] <COMMAND>
//!
//! Commands:
//!   check     Load and validate a configuration file
//!   render    Print resolved bridge definitions as JSON
//!   selector  Translate a client selector into the native filter syntax
//!
//! Options:
//!   -l, --log-level        Log level (error, warn, info, debug, trace)
//!   -h, --help             Print help

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

use vibemq_mgmt::bridge::ConnectorSource;
use vibemq_mgmt::config::Config;
use vibemq_mgmt::subscription::to_core_filter;

/// Log level for CLI
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum LogLevel {
    /// Only errors
    Error,
    /// Warnings and errors
    #[default]
    Warn,
    /// Informational messages
    Info,
    /// Debug messages
    Debug,
    /// Trace messages (very verbose)
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }

    fn from_config(level: &str) -> Self {
        match level.to_lowercase().as_str() {
            "error" => LogLevel::Error,
            "warn" => LogLevel::Warn,
            "info" => LogLevel::Info,
            "debug" => LogLevel::Debug,
            "trace" => LogLevel::Trace,
            _ => LogLevel::Warn,
        }
    }
}

/// vibemq-mgmt - bridge and subscription management tooling
#[derive(Parser, Debug)]
#[command(name = "vibemq-mgmt")]
#[command(author = "VibeMQ Contributors")]
#[command(version)]
#[command(about = "Validate bridge configuration and translate subscription selectors")]
struct Args {
    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load and validate a configuration file
    Check {
        /// Configuration file path (TOML format)
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Print resolved bridge definitions as JSON (passwords redacted)
    Render {
        /// Configuration file path (TOML format)
        #[arg(short, long)]
        config: PathBuf,

        /// Only render this bridge
        #[arg(long)]
        bridge: Option<String>,
    },
    /// Translate a client selector into the native filter syntax
    Selector {
        /// Selector expression
        expression: String,
    },
}

fn init_logging(level: LogLevel) -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level.to_tracing_level())
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn load_config(path: &Path) -> Config {
    match Config::load_file(path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config file: {}", e);
            std::process::exit(1);
        }
    }
}

/// CLI overrides config, config overrides default (warn)
fn log_level(cli: Option<LogLevel>, config: Option<&Config>) -> LogLevel {
    cli.unwrap_or_else(|| {
        config
            .map(|c| LogLevel::from_config(&c.log.level))
            .unwrap_or_default()
    })
}

fn check(path: &Path, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    info!("Loaded configuration from {:?}", path);
    for (bridge, spec) in config.bridge.iter().zip(config.resolved_bridges()?) {
        let connectors = match &spec.connectors {
            ConnectorSource::DiscoveryGroup(group) => format!("discovery group {}", group),
            ConnectorSource::Static(list) => format!("connectors {}", list.join(",")),
        };
        println!(
            "{}: queue {} via {} routing {}{}",
            spec.name,
            spec.queue_name,
            connectors,
            spec.routing_type,
            if bridge.enabled { "" } else { " (disabled)" }
        );
    }
    println!("Configuration OK");
    Ok(())
}

fn render(config: &Config, bridge: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let specs: Vec<_> = config
        .resolved_bridges()?
        .into_iter()
        .filter(|s| bridge.map_or(true, |b| s.name == b))
        .collect();
    if let Some(name) = bridge {
        if specs.is_empty() {
            eprintln!("No bridge named '{}'", name);
            std::process::exit(1);
        }
    }
    debug!("Rendering {} bridges", specs.len());
    println!("{}", serde_json::to_string_pretty(&specs)?);
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    match &args.command {
        Command::Check { config: path } => {
            let config = load_config(path);
            init_logging(log_level(args.log_level, Some(&config)))?;
            check(path, &config)?;
        }
        Command::Render {
            config: path,
            bridge,
        } => {
            let config = load_config(path);
            init_logging(log_level(args.log_level, Some(&config)))?;
            render(&config, bridge.as_deref())?;
        }
        Command::Selector { expression } => {
            init_logging(log_level(args.log_level, None))?;
            match to_core_filter(Some(expression))? {
                Some(filter) => println!("{}", filter),
                None => println!(),
            }
        }
    }

    Ok(())
}
