//! Safelight CLI - Main entry point
//!
//! Loads one compiled filter, either as a local module process or on a
//! remote device through the build server, and describes or runs it.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use safelight_common::values::{LOG_KEY, PIXELS_PROCESSED_KEY, TIME_USEC_KEY};
use safelight_common::wire::LOCAL_DEVICE;
use safelight_common::{Argument, ArgumentKind, BuildInfo, SafelightConfig, Value, ValueMap};
use safelight_session::{FilterSession, HttpRemoteDevice, ProcessTransportFactory};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for safelight
#[derive(Parser, Debug)]
#[command(name = "safelight")]
#[command(about = "Load, describe and run compiled image filters")]
#[command(version)]
struct Args {
    /// Path to TOML configuration file (default: SAFELIGHT_CONFIG, then the platform config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a filter and print its arguments
    Describe {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Load a filter, apply parameter values and run it once
    Run {
        #[command(flatten)]
        filter: FilterArgs,

        /// Thread count for the filter (default: num_threads from config)
        #[arg(long)]
        threads: Option<u32>,

        /// Set an input parameter, e.g. --set brightness_level=2.5
        #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_assignment)]
        set: Vec<(String, Value)>,

        /// Side length of synthesized input buffers (clamped to 1..=4096)
        #[arg(long)]
        side_length: Option<i32>,
    },
}

/// Identifies the build to load
#[derive(clap::Args, Debug)]
struct FilterArgs {
    /// Build signature
    #[arg(long)]
    signature: String,

    /// Build target
    #[arg(long)]
    target: String,

    /// Execution device; the local device runs the module as a child process
    #[arg(long, default_value = LOCAL_DEVICE)]
    device: String,

    /// Directory holding module executables
    #[arg(long, env = "SAFELIGHT_MODULE_DIR")]
    module_dir: Option<PathBuf>,

    /// Build server URL for remote devices
    #[arg(long, env = "SAFELIGHT_SERVER_URL")]
    server_url: Option<String>,
}

impl FilterArgs {
    fn build_info(&self) -> BuildInfo {
        BuildInfo::new(&self.signature, &self.target, &self.device)
    }
}

fn parse_assignment(text: &str) -> std::result::Result<(String, Value), String> {
    let (name, value) = text
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", text))?;
    let value = Value::parse_literal(value)
        .ok_or_else(|| format!("'{}' is not a number or boolean", value))?;
    Ok((name.trim().to_string(), value))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = SafelightConfig::load(args.config.as_deref())
        .context("Failed to load configuration")?;

    // RUST_LOG wins over the configured level
    let default_filter = format!(
        "safelight={level},safelight_session={level},safelight_common={level}",
        level = config.logging.level
    );
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("safelight {}", safelight_session::build_id());

    match args.command {
        Command::Describe { filter } => {
            let mut session = build_session(&config, &filter)?;
            load(&mut session, &filter).await?;
            print_arguments(session.arguments());
            session.unload();
        }
        Command::Run {
            filter,
            threads,
            set,
            side_length,
        } => {
            let mut session = build_session(&config, &filter)?;
            if let Some(side) = side_length {
                session.set_default_buffer_side_length(side);
            }
            load(&mut session, &filter).await?;

            let mut changed = ValueMap::new();
            for (name, value) in set {
                if !session.arguments().iter().any(|a| a.name == name && a.is_input()) {
                    bail!("'{}' is not an input parameter of this filter", name);
                }
                changed.insert(name, value);
            }
            if !changed.is_empty() {
                session.on_values_changed(changed);
            }

            let num_threads = threads.unwrap_or(config.num_threads);
            let result = session.run(num_threads).await;
            let values = match result {
                Ok(values) => values,
                Err(e) => {
                    print_log(session.values());
                    session.unload();
                    bail!("Run failed: {}", e);
                }
            };
            print_run(session.arguments(), &values);
            session.unload();
        }
    }

    Ok(())
}

fn build_session(config: &SafelightConfig, filter: &FilterArgs) -> Result<FilterSession> {
    let module_dir = filter
        .module_dir
        .clone()
        .unwrap_or_else(|| config.module_dir.clone());
    let server_url = filter
        .server_url
        .clone()
        .unwrap_or_else(|| config.server_url.clone());

    let remote = HttpRemoteDevice::new(server_url, config.http_timeout())
        .context("Failed to create remote device client")?;
    let mut session = FilterSession::new(
        Arc::new(ProcessTransportFactory::new(module_dir)),
        Arc::new(remote),
    );
    session.set_default_buffer_side_length(config.default_buffer_side_length);
    Ok(session)
}

async fn load(session: &mut FilterSession, filter: &FilterArgs) -> Result<()> {
    let build = filter.build_info();
    session
        .load_filter(Some(&build))
        .await
        .with_context(|| format!("Failed to load filter {} for {}", build.signature, build.device))?;
    Ok(())
}

fn kind_label(kind: ArgumentKind) -> &'static str {
    match kind {
        ArgumentKind::Scalar => "scalar",
        ArgumentKind::InputBuffer => "input",
        ArgumentKind::OutputBuffer => "output",
    }
}

fn print_arguments(arguments: &[Argument]) {
    for a in arguments {
        let mut line = format!(
            "{:<24} {:<7} {}{}",
            a.name,
            kind_label(a.kind),
            a.type_code,
            a.type_bits
        );
        if a.is_buffer() {
            line.push_str(&format!(" x{}", a.dimensions));
        }
        for (label, bound) in [("def", &a.def), ("min", &a.min), ("max", &a.max)] {
            if let Some(v) = bound {
                line.push_str(&format!(" {}={}", label, v));
            }
        }
        println!("{}", line);
    }
}

fn print_log(values: &ValueMap) {
    if let Some(log) = values.get(LOG_KEY).and_then(Value::as_text) {
        if !log.is_empty() {
            print!("{}", log);
        }
    }
}

fn print_run(arguments: &[Argument], values: &ValueMap) {
    print_log(values);
    let number = |key: &str| values.get(key).and_then(Value::as_number).unwrap_or(0.0);
    println!("time_usec: {}", number(TIME_USEC_KEY));
    println!("pixels_processed: {}", number(PIXELS_PROCESSED_KEY));
    for a in arguments.iter().filter(|a| !a.is_input()) {
        match values.get(&a.name).and_then(Value::as_buffer) {
            Some(b) => println!("{}: extent {:?}, {} bytes", a.name, b.extent, b.host.len()),
            None => println!("{}: (none)", a.name),
        }
    }
}
