use message_store::{AppState, ConversationStore, StoreServerConfig, build_router};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| "message_store=debug,axum=info".to_string());
    if std::env::var("MESSAGE_STORE_LOG_JSON").is_ok_and(|value| value.trim() == "true") {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = match StoreServerConfig::from_env() {
        Ok(cfg) => cfg,
        Err(err) => {
            error!("failed to read config: {err}");
            std::process::exit(1);
        }
    };

    let app = build_router(AppState::new(ConversationStore::new(), config.api_key));

    let listener = match tokio::net::TcpListener::bind(config.bind_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("failed to bind {}: {err}", config.bind_addr);
            std::process::exit(1);
        }
    };

    info!(
        "message store listening on {}",
        listener.local_addr().unwrap_or(config.bind_addr)
    );

    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("failed to listen for shutdown signal: {err}");
        }
        info!("shutting down message store");
    };

    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
    {
        error!("message store server failed: {err}");
        std::process::exit(1);
    }
}
