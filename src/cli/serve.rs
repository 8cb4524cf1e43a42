//! Serve command implementation

use crate::api::{create_router, AppState};
use crate::cli::ServeArgs;
use crate::config::{ArbiterConfig, LogFormat};
use crate::events::{EventBus, RouterEvent};
use crate::provider::HttpProvider;
use crate::registry::InMemoryRegistry;
use crate::routing::Router;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Load configuration with CLI overrides
pub fn load_config_with_overrides(
    args: &ServeArgs,
) -> Result<ArbiterConfig, Box<dyn std::error::Error>> {
    // Load from file if it exists, otherwise use defaults
    let mut config = if args.config.exists() {
        ArbiterConfig::load(Some(&args.config))?
    } else {
        tracing::debug!("Config file not found, using defaults");
        ArbiterConfig::default()
    };

    config = config.with_env_overrides();

    // CLI overrides (highest priority)
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(ref host) = args.host {
        config.server.host = host.clone();
    }
    if let Some(ref log_level) = args.log_level {
        config.logging.level = log_level.clone();
    }

    Ok(config)
}

/// Initialize tracing based on configuration
pub fn init_tracing(
    config: &crate::config::LoggingConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let filter_str = crate::logging::build_filter_directives(config);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    if config.enable_content_logging {
        eprintln!("WARNING: Content logging is enabled. Prompt previews will be logged.");
        eprintln!("         This may include sensitive data. Use only for debugging.");
    }

    match config.format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()?;
        }
    }

    Ok(())
}

/// Build the registry and router from configuration and import the
/// configured models and rules.
pub fn build_router(
    config: &ArbiterConfig,
) -> Result<(Arc<InMemoryRegistry>, Arc<Router>), Box<dyn std::error::Error>> {
    let registry = Arc::new(InMemoryRegistry::new());
    let provider = Arc::new(HttpProvider::new(config.provider.timeout())?);
    let router = Arc::new(Router::new(registry.clone(), provider, config));

    let bundle = config.bundle();
    if bundle.is_empty() {
        tracing::warn!("No models or rules configured; import a bundle via POST /v1/import");
    } else {
        bundle.apply(&registry, router.rules())?;
    }

    Ok((registry, router))
}

/// Periodically sweep expired idempotency keys and prune old metrics.
pub fn spawn_maintenance(
    router: Arc<Router>,
    config: &ArbiterConfig,
    cancel_token: CancellationToken,
) -> JoinHandle<()> {
    let sweep_every = Duration::from_secs(config.idempotency.sweep_interval_seconds.max(1));
    let prune_every = config.metrics.prune_interval();
    let retention = config.metrics.retention();

    tokio::spawn(async move {
        let mut sweep = tokio::time::interval(sweep_every);
        let mut prune = tokio::time::interval(prune_every);

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    tracing::debug!("Maintenance loop stopped");
                    break;
                }
                _ = sweep.tick() => {
                    let purged = router.purge_idempotency();
                    if purged > 0 {
                        tracing::debug!(purged, "Swept expired idempotency keys");
                    }
                }
                _ = prune.tick() => {
                    router.prune_metrics(retention);
                }
            }
        }
    })
}

/// Log every router event until cancelled.
pub fn spawn_event_logger(events: &EventBus, cancel_token: CancellationToken) -> JoinHandle<()> {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = cancel_token.cancelled() => break,
                event = rx.recv() => event,
            };
            match event {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event logger lagged behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn log_event(event: &RouterEvent) {
    match event {
        RouterEvent::CircuitBreakerStateChange { model_id, from, to, .. } => {
            tracing::warn!(model_id = %model_id, from = ?from, to = ?to, "Circuit breaker transition");
        }
        other => {
            let payload = serde_json::to_string(other).unwrap_or_default();
            tracing::trace!(event = other.name(), payload = %payload, "Router event");
        }
    }
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for CTRL+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }

    cancel_token.cancel();
}

/// Main serve command handler
pub async fn run_serve(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config_with_overrides(&args)?;
    config.validate()?;

    init_tracing(&config.logging)?;

    tracing::info!("Starting Arbiter server");
    tracing::debug!(?config, "Loaded configuration");

    let (registry, router) = build_router(&config)?;
    tracing::info!(
        models = registry.model_count(),
        rules = router.rules().len(),
        "Routing state loaded"
    );

    let cancel_token = CancellationToken::new();
    let maintenance = spawn_maintenance(router.clone(), &config, cancel_token.clone());
    let event_logger = spawn_event_logger(router.events(), cancel_token.clone());

    let addr = config.server.bind_address();
    let config = Arc::new(config);
    let state = Arc::new(AppState::new(registry, router.clone(), config));
    let app = create_router(state);

    tracing::info!(addr = %addr, "Arbiter API server listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel_token.clone()))
        .await?;

    router.shutdown();
    tracing::info!("Waiting for background tasks to stop");
    maintenance.await?;
    event_logger.await?;

    tracing::info!("Arbiter server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    fn args(config: PathBuf, port: Option<u16>) -> ServeArgs {
        ServeArgs {
            config,
            port,
            host: None,
            log_level: None,
        }
    }

    #[test]
    fn test_serve_config_loading() {
        let temp = NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "[server]\nrequest_timeout_seconds = 30").unwrap();

        let config = load_config_with_overrides(&args(temp.path().to_path_buf(), None)).unwrap();
        assert_eq!(config.server.request_timeout_seconds, 30);
    }

    #[test]
    fn test_serve_cli_overrides_config() {
        let temp = NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "[server]\nport = 8080").unwrap();

        let config =
            load_config_with_overrides(&args(temp.path().to_path_buf(), Some(9000))).unwrap();
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn test_serve_works_without_config_file() {
        let config =
            load_config_with_overrides(&args(PathBuf::from("nonexistent.toml"), Some(8101)))
                .unwrap();
        assert_eq!(config.server.port, 8101);
        assert_eq!(config.metrics.window_capacity, 10_000);
    }

    #[test]
    fn test_build_router_imports_bundle() {
        let config: ArbiterConfig = toml::from_str(
            r#"
            [[models]]
            id = "gpt-4"
            provider = "openai"
            endpoints = [{ url = "http://localhost:9003" }]

            [[rules]]
            id = "default"
            name = "Default"
            target_models = [{ model_id = "gpt-4" }]
            "#,
        )
        .unwrap();

        let (registry, router) = build_router(&config).unwrap();
        assert_eq!(registry.model_count(), 1);
        assert_eq!(router.rules().len(), 1);
    }

    #[tokio::test]
    async fn test_background_tasks_stop_on_cancel() {
        let config = ArbiterConfig::default();
        let (_registry, router) = build_router(&config).unwrap();

        let cancel = CancellationToken::new();
        let maintenance = spawn_maintenance(router.clone(), &config, cancel.clone());
        let logger = spawn_event_logger(router.events(), cancel.clone());

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let stopped = tokio::time::timeout(Duration::from_secs(1), async {
            maintenance.await.unwrap();
            logger.await.unwrap();
        })
        .await;
        assert!(stopped.is_ok());
    }
}
