use anyhow::Context;
use axum::{
    http::HeaderValue,
    routing::get,
    Router,
};
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod bg_task;
mod config;
mod handlers;
mod models;
mod services;
mod utils;

use crate::bg_task::Collector;
use crate::config::Settings;
use crate::services::backend_relay::BackendRelay;
use crate::services::steam_charts::SteamChartsScraper;
use crate::services::transport::{HttpTransport, ReqwestTransport};

// Application State
pub struct AppState {
    pub scraper: Arc<SteamChartsScraper>,
    /// Flips to `true` once the process starts shutting down.
    pub shutdown: watch::Receiver<bool>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::from_env().context("invalid configuration")?;

    let transport: Arc<dyn HttpTransport> =
        Arc::new(ReqwestTransport::new(settings.http_timeout).context("failed to build HTTP client")?);
    let scraper = Arc::new(SteamChartsScraper::new(settings.scraper.clone(), transport.clone()));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state = Arc::new(AppState {
        scraper: scraper.clone(),
        shutdown: shutdown_rx.clone(),
    });

    let collector = Collector {
        scraper,
        relay: BackendRelay::new(&settings.backend, transport),
        schedule: settings.schedule,
        run_on_startup: settings.run_on_startup,
    };
    let collector_handle = tokio::spawn(bg_task::start_background_task(collector, shutdown_rx.clone()));

    let app = build_router(state, &settings)?;

    let addr = format!("{}:{}", settings.server_host, settings.server_port)
        .parse::<SocketAddr>()
        .context("invalid SERVER_HOST/SERVER_PORT")?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let mut server_shutdown = shutdown_rx;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = server_shutdown.wait_for(|stop| *stop).await;
        })
        .await
        .context("server error")?;

    if let Err(e) = collector_handle.await {
        tracing::error!("Collector task ended abnormally: {}", e);
    }
    tracing::info!("shutdown complete");
    Ok(())
}

fn build_router(state: Arc<AppState>, settings: &Settings) -> anyhow::Result<Router> {
    let origin = settings
        .cors_allowed_origin
        .parse::<HeaderValue>()
        .context("invalid CORS_ALLOWED_ORIGIN")?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_headers(Any)
        .allow_methods(Any);

    let mut app = Router::new()
        .route("/", get(root))
        .route("/api/steamcharts/top-games", get(handlers::steam_charts::get_top_games));

    if settings.swagger_enabled {
        app = app.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", handlers::ApiDoc::openapi()));
    }

    Ok(app
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state))
}

async fn root() -> &'static str {
    "SteamCharts Backend API"
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Unable to listen for shutdown signal: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => tracing::error!("Unable to listen for SIGTERM: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
