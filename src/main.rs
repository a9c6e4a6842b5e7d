//! vidcap - video caption service
//!
//! Serves captions for local video files, generated by remote multimodal
//! inference backends and cached on disk per (video, model).

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use tokio::net::TcpListener;
use tracing::{info, warn, Level};
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vidcap::api::{create_router, AppState};
use vidcap::cli::{Args, Commands};
use vidcap::config::Config;
use vidcap::media;
use vidcap::videos::validate_filename;

const LOG_FILE_NAME: &str = "vidcap.log";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // needs neither a valid configuration nor logging
    if let Commands::InitConfig { path, force } = &args.command {
        return init_config(path, *force);
    }

    let config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    let _guard = setup_logging(args.verbose, &config.logging.dir)?;

    info!("Starting vidcap");

    match args.command {
        Commands::InitConfig { path, force } => init_config(&path, force)?,
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);

            if let Err(e) = media::check_availability(&config.media).await {
                warn!("{}; audio extraction and duration probing will fail", e);
            }

            let state = AppState::from_config(config)?;
            let listener = TcpListener::bind((host.as_str(), port))
                .await
                .with_context(|| format!("Failed to bind {}:{}", host, port))?;
            info!("Listening on {}", listener.local_addr()?);

            axum::serve(listener, create_router(state))
                .with_graceful_shutdown(shutdown_signal())
                .await?;
            info!("Server stopped");
        }
        Commands::Caption {
            video,
            model,
            prompt,
            regenerate,
        } => {
            let model = model.unwrap_or_else(|| config.default_model.clone());
            let limits = config.limits.clone();
            let state = AppState::from_config(config)?;

            let path = state.library.resolve(&video)?;
            state.library.validate_constraints(&path, &limits).await?;

            let record = state
                .orchestrator
                .generate_or_fetch(&video, prompt.as_deref(), &model, regenerate)
                .await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Commands::Captions { video } => {
            validate_filename(&video)?;
            let state = AppState::from_config(config)?;
            let captions = state.orchestrator.cached_all(&video);

            if captions.is_empty() {
                println!("No cached captions for {}", video);
            } else {
                println!("{}", serde_json::to_string_pretty(&captions)?);
            }
        }
        Commands::Delete { video, model } => {
            validate_filename(&video)?;
            let model = model.unwrap_or_else(|| config.default_model.clone());
            let state = AppState::from_config(config)?;

            if state.orchestrator.delete(&video, &model)? {
                println!("Deleted caption for {} ({})", video, model);
            } else {
                println!("No cached caption for {} ({})", video, model);
            }
        }
        Commands::Models => {
            println!("\nRegistered Models:");
            println!("{:<12} {:<36} {:<18} {:<6} {:<30}", "Key", "Name", "Protocol", "Audio", "URL");
            println!("{}", "-".repeat(106));

            for model in &config.models {
                let marker = if model.key == config.default_model { "*" } else { " " };
                println!(
                    "{:<12} {:<36} {:<18} {:<6} {:<30}",
                    format!("{}{}", model.key, marker),
                    model.name,
                    format!("{:?}", model.protocol),
                    if model.requires_audio { "yes" } else { "no" },
                    model.url
                );
            }
            println!("\n* default model");
        }
        Commands::Health { model } => {
            let model = model.unwrap_or_else(|| config.default_model.clone());
            let state = AppState::from_config(config)?;
            let descriptor = state.orchestrator.registry().get(&model)?;

            let report = state.backend.health_check(descriptor).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.healthy {
                anyhow::bail!("Model service for {} is unhealthy", model);
            }
        }
    }

    Ok(())
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }

    Config::default().save_to_file(path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

/// Console plus daily-rolling file output. The returned guard flushes the
/// file writer on drop.
fn setup_logging(verbose: bool, log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let file_appender = rolling::daily(log_dir, LOG_FILE_NAME);
    let (non_blocking_file, guard) = non_blocking(file_appender);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join(LOG_FILE_NAME).display()
    );

    Ok(guard)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
