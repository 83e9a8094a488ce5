use codedrop::infrastructure::storage;
use codedrop::services::sweeper::BackgroundSweeper;
use codedrop::{AppState, create_app};
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initial Environment & Logging Setup
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "codedrop=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting submission portal...");

    // 2. Load Config & Setup Storage
    let config = codedrop::config::PortalConfig::from_env();
    info!(
        "🛡️  Portal Config: Port={}, Max Size={}MB, Data Dir={}",
        config.port,
        config.max_file_size / 1024 / 1024,
        config.data_dir.display()
    );

    let (registry, store) = storage::setup_storage(&config).await?;

    // 3. Setup Graceful Shutdown Channel
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    // 4. Initialize Background Sweeper
    let sweeper = BackgroundSweeper::new(
        store.clone(),
        Duration::from_secs(config.staging_max_age_hours * 3600),
        shutdown_rx,
    );
    tokio::spawn(sweeper.run());
    info!("👷 Background sweeper initialized.");

    // 5. Initialize API Service
    let state = AppState {
        registry,
        store,
        config: config.clone(),
    };

    // Configure tracing layer for HTTP requests
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &axum::http::Request<_>| {
            let request_id = request
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown");
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id,
            )
        })
        .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
            info!("📥 {} {}", request.method(), request.uri());
        })
        .on_response(
            |response: &axum::http::Response<_>,
             latency: std::time::Duration,
             _span: &tracing::Span| {
                info!(
                    "📤 Finished in {:?} with status {}",
                    latency,
                    response.status()
                );
            },
        );

    let app = create_app(state).layer(trace_layer);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("✅ Portal listening on: http://0.0.0.0:{}", config.port);
    info!(
        "📖 Swagger UI documentation: http://localhost:{}/swagger-ui",
        config.port
    );

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
        })
        .await
    {
        error!("❌ Server runtime error: {}", e);
    }

    // 6. Notify the sweeper and exit
    let _ = shutdown_tx.send(true);

    info!("👋 Portal exited cleanly.");
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
            info!("⌨️  Ctrl+C received, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, initiating graceful shutdown...");
        },
    }
}
