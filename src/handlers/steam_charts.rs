use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tokio::sync::watch;
use crate::AppState;
use crate::models::game::Game;

#[utoipa::path(
    get,
    path = "/api/steamcharts/top-games",
    tag = "steamcharts",
    responses(
        (status = 200, description = "Current top games", body = Vec<Game>),
        (status = 404, description = "No games found on SteamCharts"),
        (status = 500, description = "Scraping failed"),
        (status = 503, description = "Server is shutting down")
    )
)]
pub async fn get_top_games(
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let mut shutdown = state.shutdown.clone();
    let result = tokio::select! {
        biased;
        _ = wait_for_shutdown(&mut shutdown) => {
            return (StatusCode::SERVICE_UNAVAILABLE, "Server is shutting down.").into_response();
        }
        result = state.scraper.get_top_games() => result,
    };

    match result {
        Ok(games) if games.is_empty() => {
            (StatusCode::NOT_FOUND, "No games found on SteamCharts.").into_response()
        }
        Ok(games) => (StatusCode::OK, Json(games)).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to fetch data: {}", e),
        )
            .into_response(),
    }
}

async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        // Sender gone without a signal: never cut the request short.
        std::future::pending::<()>().await;
    }
}
