use anyhow::{anyhow, Context, Result};
use std::net::SocketAddr;
use tracing::{info, Level};
use tracing_log::LogTracer;
use tracing_subscriber::EnvFilter;

use crate::{
    bootstrap,
    cli::commands::LoggingArgs,
    config::ServiceConfig,
    server::{self, state::AppState},
};

/// Install the global tracing subscriber and route `log` records into it.
///
/// `RUST_LOG` wins over `--log-filter`, which wins over the verbosity default.
pub fn init_logging(logging: &LoggingArgs) -> Result<()> {
    let name = logging.get_effective_level();
    let level: Level = name.parse().unwrap_or(Level::INFO);
    let default_filter = format!("warn,qaserve={name},qaserve_core={name},tower_http=info");

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::builder()
            .with_default_directive(level.into())
            .parse_lossy(logging.log_filter.as_deref().unwrap_or(&default_filter)),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;
    LogTracer::init().map_err(|e| anyhow!("Failed to initialize log tracer: {}", e))?;

    Ok(())
}

/// Load the model, serve until SIGINT/SIGTERM, then unload
pub async fn handle_serve(config: ServiceConfig) -> Result<()> {
    config.validate()?;

    let addr: SocketAddr = config
        .bind_addr()
        .parse()
        .with_context(|| format!("Invalid listen address {}", config.bind_addr()))?;

    info!("Loading QA model");
    let model = bootstrap::load_model(&config)
        .await
        .context("Failed to load QA model")?;
    info!("QA model loaded: {} on {}", model.model_name(), model.device());

    let state = AppState::with_model(config, model);
    let result = server::start_server(addr, state.clone(), server::shutdown_signal()).await;

    state.model_slot.clear();
    info!("QA model unloaded");
    info!("Request totals: {}", state.metrics.snapshot());

    result
}

/// Resolve the configured model into the cache and print its directory
pub async fn handle_fetch(config: ServiceConfig) -> Result<()> {
    config.validate()?;

    let resolver = bootstrap::resolver(&config)?;
    let (_, model_dir) = bootstrap::resolve_model(&resolver, &config.model.name)
        .await
        .with_context(|| format!("Failed to fetch model {}", config.model.name))?;

    println!("{}", model_dir.display());
    Ok(())
}

/// Load the model and print the answer to a single question
pub async fn handle_ask(config: ServiceConfig, context: String, question: String) -> Result<()> {
    config.validate()?;

    let model = bootstrap::load_model(&config)
        .await
        .context("Failed to load QA model")?;

    let answer = tokio::task::spawn_blocking(move || model.answer(&context, &question))
        .await
        .context("Inference task failed")??;

    println!("{}", answer);
    Ok(())
}
