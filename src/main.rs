use oldie_mobile_api::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    repository::{PostgresRepository, RepositoryState},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Initializes configuration, logging, the document store and the HTTP
/// server, then tears the store down once the server has drained.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast on missing production secrets).
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: RUST_LOG wins, otherwise crate debug + request summaries.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "oldie_mobile_api=debug,tower_http=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Store: explicit connect + migrate, no lazy global handle.
    let postgres = PostgresRepository::connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DB_USER/DB_PASSWORD/DB_HOST.");
    postgres
        .migrate()
        .await
        .expect("FATAL: Failed to create the collection tables.");
    let repo = Arc::new(postgres) as RepositoryState;

    // 4. State + router.
    let addr = config.listen_addr();
    let app_state = AppState {
        repo: repo.clone(),
        config,
    };
    let app = create_router(app_state);

    // 5. Serve until Ctrl-C / SIGTERM.
    let listener = TcpListener::bind(addr)
        .await
        .expect("FATAL: Failed to bind the listening port.");
    tracing::info!("Server is running on port {}", addr.port());
    tracing::info!("API Documentation (Swagger UI) available at: http://localhost:{}/swagger-ui", addr.port());

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "HTTP server terminated with an error");
    }

    // 6. Teardown.
    repo.close().await;
    tracing::info!("Store connections closed; exiting.");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
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
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received; draining connections.");
}
