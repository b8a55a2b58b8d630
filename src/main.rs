use anyhow::{Context, Result};
use clap::Parser;
use mediaq::{
    app::config::{Config, GatewayKind},
    app::state::AppState,
    cli::{self, Cli, Commands},
    download::Controller,
    gateway::{HttpGateway, SimGateway, SimOptions, TaskGateway},
    tui::run_tui,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::prelude::*;

/// Buffered push events between the backend stream and the ingestor
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first to get verbose flag
    let cli = Cli::parse();

    // Set config directory override before anything resolves paths
    if let Some(ref config_dir) = cli.config {
        mediaq::util::paths::set_config_dir_override(Some(config_dir.clone()));
    }

    // Get logs directory (creates if needed)
    let logs_dir = mediaq::util::paths::get_logs_dir().unwrap_or_else(|_| PathBuf::from("."));
    std::fs::create_dir_all(&logs_dir).ok();

    // Set up daily rotating file appender
    let file_appender = tracing_appender::rolling::daily(&logs_dir, "app.jsonl");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Set log level based on verbose flag
    let log_level = if cli.verbose {
        tracing::Level::TRACE
    } else {
        tracing::Level::INFO
    };

    // One-shot commands also echo to stderr when verbose; the TUI owns the terminal
    let stderr_layer = (cli.verbose && cli.command.is_some()).then(|| {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_filter(tracing_subscriber::filter::LevelFilter::DEBUG)
    });

    // Initialize logging with JSON format for structured logs
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(tracing_subscriber::filter::LevelFilter::from_level(
                    log_level,
                )),
        )
        .with(stderr_layer)
        .init();

    tracing::info!("Starting mediaq...");
    if cli.verbose {
        tracing::info!("Verbose logging enabled (TRACE level)");
    }
    tracing::trace!("CLI arguments: {:?}", cli);

    // Load configuration; a broken file is reported and replaced by defaults
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Failed to load config, using defaults: {:#}", e);
            Config::default()
        }
    };
    tracing::info!("Config loaded: {:?}", config);

    let state = AppState::new(config.clone())?;

    let use_sim = cli.sim || config.gateway.kind == GatewayKind::Sim;

    // Route based on CLI arguments
    match cli.command {
        Some(Commands::Config { action }) => {
            // Config commands need no backend
            std::process::exit(cli::handler::handle_config(action, &state).await);
        }
        Some(command) => {
            // CLI mode - handle command and exit
            let controller = build_controller(&config, use_sim, &state).await?;
            let exit_code = cli::handler::handle_command(command, state, controller).await;
            std::process::exit(exit_code);
        }
        None => {
            let controller = build_controller(&config, use_sim, &state).await?;
            run_tui(state, controller).await?;
        }
    }

    Ok(())
}

/// Pick the backend, wire its push events into the controller
async fn build_controller(
    config: &Config,
    use_sim: bool,
    state: &AppState,
) -> Result<Controller<dyn TaskGateway>> {
    let options = config.ui.projector_options();

    if use_sim {
        tracing::info!("Using simulated backend");
        let (gateway, events) = SimGateway::new(SimOptions {
            tick: config.ui.tick(),
            ..SimOptions::default()
        });
        let gateway: Arc<dyn TaskGateway> = Arc::new(gateway);
        let controller = Controller::new(gateway, Arc::clone(&state.i18n), options);
        controller.spawn_ingest(events);
        return Ok(controller);
    }

    let gateway = Arc::new(
        HttpGateway::new(&config.gateway.base_url, config.gateway.connect_timeout())
            .context("Failed to create HTTP gateway")?,
    );
    if gateway.connect().await.is_err() {
        // Actions report "not ready" until the event stream reconnects
        tracing::info!("Starting without a backend connection");
    }

    let (tx, events) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    Arc::clone(&gateway).spawn_event_stream(tx);

    let gateway: Arc<dyn TaskGateway> = gateway;
    let controller = Controller::new(gateway, Arc::clone(&state.i18n), options);
    controller.spawn_ingest(events);
    Ok(controller)
}
