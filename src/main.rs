//! Mediabroker - Media Object Conversion Broker
//!
//! Command line front end for resolving and running media conversions.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tracing_appender::{non_blocking, rolling};

use mediabroker::capability::DeviceTable;
use mediabroker::cli::{Args, Commands};
use mediabroker::config::Config;
use mediabroker::converter::describe;
use mediabroker::engine::EngineCommandBuilder;
use mediabroker::{MediaManager, MimeType};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;

    // Load configuration
    let config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if std::path::Path::new("mediabroker.toml").exists() {
                info!("Found mediabroker.toml in current directory, loading...");
                Config::from_file("mediabroker.toml")?
            } else {
                Config::default()
            }
        }
    };

    let manager = MediaManager::new(config, Arc::new(DeviceTable::new()))?;

    match args.command {
        Commands::Convert { input, from, to, output } => {
            info!("Converting {} to {}", input.display(), to);

            let from = match from {
                Some(from) => MimeType::parse(&from)?,
                None => manager.guess_mime_type(&input.to_string_lossy()),
            };
            let data = tokio::fs::read(&input).await?;
            let media = manager.create_media_object(data, from);

            let converted = manager.convert(&media, &MimeType::parse(&to)?).await?;
            let data = converted.get_data().await?;
            tokio::fs::write(&output, data.as_bytes()).await?;

            println!(
                "Wrote {} ({}, {} bytes)",
                output.display(),
                converted.mime_type(),
                data.len()
            );
        }
        Commands::Snapshot { url, output } => {
            info!("Capturing snapshot from {}", url);

            let media = manager.create_media_object(url, MimeType::accept_url());
            let bytes = manager
                .convert_to_buffer(&media, &MimeType::parse("image/jpeg")?)
                .await?;
            tokio::fs::write(&output, &bytes).await?;

            println!("Wrote {} ({} bytes)", output.display(), bytes.len());
        }
        Commands::Plan { from, to } => {
            let chain = manager.plan(&MimeType::parse(&from)?, &MimeType::parse(&to)?)?;
            if chain.is_empty() {
                println!("{} already satisfies {}; no conversion needed", from, to);
            } else {
                for (index, step) in chain.steps().iter().enumerate() {
                    println!(
                        "{:<4} {:<30} {} -> {}",
                        index,
                        step.converter.name(),
                        step.from,
                        step.to
                    );
                }
            }
        }
        Commands::Converters => {
            println!("\nActive converters (resolution order):");
            println!("{}", "-".repeat(65));
            for converter in manager.converters() {
                println!("{}", describe(converter.as_ref()));
            }
        }
        Commands::Engine => {
            println!("Engine path: {}", manager.engine_path());

            let config = &manager.config().engine;
            let output = EngineCommandBuilder::new(&config.binary_path)
                .version_check()
                .execute(config.log_window_bytes)
                .await?;
            let version = String::from_utf8_lossy(&output.stdout);
            println!("{}", version.lines().next().unwrap_or("Unknown version"));
        }
    }

    Ok(())
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = std::env::current_dir()?.join(".mediabroker").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "mediabroker.log");
    let (non_blocking_file, _guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(_guard);

    // Determine log level
    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    // Console output goes to stderr so converted data can be piped
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(true)
        .with_line_number(true);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized - console: {}, file: {}",
          log_level, log_dir.join("mediabroker.log").display());

    Ok(())
}
