//! Nimbus server binary.
//!
//! Wires configuration, the Postgres conversation store, the Redis
//! event log, the broadcast hub, and the application handlers into the
//! Axum router, then serves until shutdown.

use std::sync::Arc;

use redis::aio::ConnectionManager;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use nimbus::adapters::ai::{OpenRouterConfig, OpenRouterModel};
use nimbus::adapters::http::{app_router, AppState};
use nimbus::adapters::postgres::PostgresConversationStore;
use nimbus::adapters::redis::RedisEventLog;
use nimbus::adapters::sse::BroadcastHub;
use nimbus::adapters::weather::{OpenWeatherConfig, OpenWeatherService};
use nimbus::application::handlers::{
    ConnectStreamHandler, OrchestratorConfig, ReplyOrchestrator, SubmitMessageHandler,
};
use nimbus::application::stream_registry::StreamSessionRegistry;
use nimbus::config::AppConfig;
use nimbus::ports::{ChatModel, ConversationStore, EventLog, WeatherService};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load()?;
    tracing::info!(
        addr = %config.server.socket_addr(),
        "Starting nimbus"
    );

    // Durable conversation store.
    let pool = PgPoolOptions::new()
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .connect(&config.database.url)
        .await?;
    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations applied");
    }
    let store: Arc<dyn ConversationStore> = Arc::new(PostgresConversationStore::new(pool));

    // Durable event log.
    let redis_client = redis::Client::open(config.redis.url.as_str())?;
    let redis_conn = ConnectionManager::new(redis_client).await?;
    let log: Arc<dyn EventLog> = Arc::new(RedisEventLog::new(
        redis_conn,
        config.streaming.idle_retention(),
    ));

    // Outbound providers.
    let api_key = config
        .ai
        .openrouter_api_key
        .clone()
        .ok_or("NIMBUS__AI__OPENROUTER_API_KEY is required")?;
    let model: Arc<dyn ChatModel> = Arc::new(OpenRouterModel::new(
        OpenRouterConfig::new(api_key)
            .with_model(&config.ai.model)
            .with_base_url(&config.ai.base_url)
            .with_app_url(&config.ai.app_url)
            .with_app_title(&config.ai.app_title)
            .with_timeout(config.ai.timeout())
            .with_temperature(config.ai.temperature)
            .with_max_tokens(config.ai.max_tokens),
    ));
    let weather_key = config
        .weather
        .openweather_api_key
        .clone()
        .ok_or("NIMBUS__WEATHER__OPENWEATHER_API_KEY is required")?;
    let weather: Arc<dyn WeatherService> = Arc::new(OpenWeatherService::new(
        OpenWeatherConfig::new(weather_key)
            .with_base_url(&config.weather.base_url)
            .with_timeout(config.weather.timeout()),
    ));

    // Streaming core.
    let hub = Arc::new(BroadcastHub::new(config.streaming.channel_capacity));
    let registry = Arc::new(StreamSessionRegistry::new(
        Arc::clone(&log),
        config.streaming.done_retention(),
    ));
    BroadcastHub::spawn_heartbeat(Arc::clone(&hub), config.streaming.heartbeat());
    StreamSessionRegistry::spawn_idle_sweep(
        Arc::clone(&registry),
        config.streaming.sweep_interval(),
        config.streaming.session_idle(),
    );

    // Application handlers.
    let orchestrator = Arc::new(ReplyOrchestrator::new(
        Arc::clone(&store),
        model,
        Arc::clone(&weather),
        Arc::clone(&registry),
        Arc::clone(&hub),
        OrchestratorConfig {
            max_tool_rounds: config.ai.max_tool_rounds,
        },
    ));
    let submit = Arc::new(SubmitMessageHandler::new(
        Arc::clone(&store),
        Arc::clone(&hub),
        orchestrator,
    ));
    let connect = Arc::new(ConnectStreamHandler::new(
        Arc::clone(&store),
        Arc::clone(&registry),
        Arc::clone(&hub),
    ));

    let state = AppState {
        store,
        registry,
        hub,
        weather,
        submit,
        connect,
    };

    let listener = tokio::net::TcpListener::bind(config.server.socket_addr()).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
