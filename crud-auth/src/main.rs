use crud_auth::{
    build_router,
    config::AuthConfig,
    db,
    services::{
        spawn_revocation_sweeper, Clock, CodeUsageLedger, CredentialStore, Database,
        GoogleEndpoints, GoogleProvider, MemoryCodeLedger, MemoryCredentialStore, SystemClock,
    },
    AppState,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use service_core::observability::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), service_core::error::AppError> {
    // Load configuration - fail fast if invalid
    let config = AuthConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    )?;

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;

    tracing::info!(
        service = %config.service_name,
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.environment,
        "Starting authentication service"
    );

    let (store, ledger): (Arc<dyn CredentialStore>, Arc<dyn CodeUsageLedger>) =
        match &config.database.url {
            Some(url) => {
                let pool = db::create_pool(url, config.database.max_connections)
                    .await
                    .map_err(|e| service_core::error::AppError::DatabaseError(e.into()))?;
                db::run_migrations(&pool)
                    .await
                    .map_err(|e| service_core::error::AppError::DatabaseError(e.into()))?;
                let database = Arc::new(Database::new(pool));
                (
                    database.clone() as Arc<dyn CredentialStore>,
                    database as Arc<dyn CodeUsageLedger>,
                )
            }
            None => {
                tracing::warn!("DATABASE_URL not set; using in-memory stores (data is lost on restart)");
                (
                    Arc::new(MemoryCredentialStore::new()) as Arc<dyn CredentialStore>,
                    Arc::new(MemoryCodeLedger::new()) as Arc<dyn CodeUsageLedger>,
                )
            }
        };

    let provider = GoogleProvider::new(
        config.google.client_id.clone(),
        config.google.client_secret.clone(),
        config.google.redirect_uri.clone(),
        GoogleEndpoints {
            auth_url: config.google.auth_url.clone(),
            token_url: config.google.token_url.clone(),
            userinfo_url: config.google.userinfo_url.clone(),
        },
        Duration::from_secs(config.google.http_timeout_seconds),
    )?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let state = AppState::new(config.clone(), store, ledger, Arc::new(provider), clock)
        .with_metrics(metrics_handle);

    let sweeper = spawn_revocation_sweeper(
        state.revocations().clone(),
        Duration::from_secs(config.jwt.revocation_sweep_interval_seconds),
    );

    let app = build_router(state);

    let addr: SocketAddr = config
        .common
        .bind_address()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address: {}", e))?;

    let service_span = tracing::info_span!(
        "service",
        service = %config.service_name,
        environment = ?config.environment,
    );
    let _guard = service_span.enter();

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    service_core::axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    sweeper.abort();
    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
