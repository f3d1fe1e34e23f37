use std::sync::Arc;

use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html};
use thiserror::Error;

use crate::config::ScraperConfig;
use crate::models::game::Game;
use crate::services::transport::{HttpTransport, TransportError};
use crate::utils::{parse_count, selector};

/// Leaderboard rows taken from the top of the table.
pub const MAX_GAMES: usize = 10;

const ACCESS_DENIED_MARKER: &str = "Access denied";

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("could not build the SteamCharts request: {0}")]
    Request(String),
}

pub struct SteamChartsScraper {
    config: ScraperConfig,
    transport: Arc<dyn HttpTransport>,
}

impl SteamChartsScraper {
    pub fn new(config: ScraperConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    /// Fetches the leaderboard and returns its top rows.
    ///
    /// Blocked pages, missing tables and network failures all produce an
    /// empty list; only a request that cannot be built is an error.
    pub async fn get_top_games(&self) -> Result<Vec<Game>, ScraperError> {
        let resp = match self.transport.get(&self.config.base_url, &self.config.user_agent).await {
            Ok(resp) => resp,
            Err(TransportError::Network(e)) => {
                tracing::warn!(url = %self.config.base_url, "SteamCharts unreachable: {}", e);
                return Ok(Vec::new());
            }
            Err(TransportError::InvalidRequest(e)) => return Err(ScraperError::Request(e)),
        };

        if resp.body.trim().is_empty() || resp.body.contains(ACCESS_DENIED_MARKER) {
            tracing::warn!(status = %resp.status, "SteamCharts denied access or returned an empty page");
            return Ok(Vec::new());
        }

        if !resp.status.is_success() {
            tracing::warn!(status = %resp.status, "SteamCharts returned a non-success status");
            return Ok(Vec::new());
        }

        Ok(parse_top_games(&resp.body, Utc::now()))
    }
}

/// Extracts up to [`MAX_GAMES`] rows from the `#top-games` table.
pub fn parse_top_games(html: &str, scraped_at: DateTime<Utc>) -> Vec<Game> {
    let document = Html::parse_document(html);

    let Some(table) = document.select(selector!("table#top-games")).next() else {
        tracing::warn!("Top games table not found on SteamCharts page");
        return Vec::new();
    };

    table
        .select(selector!("tbody > tr"))
        .take(MAX_GAMES)
        .enumerate()
        .filter_map(|(idx, row)| parse_row(idx + 1, row, scraped_at))
        .collect()
}

fn parse_row(rank: usize, row: ElementRef, scraped_at: DateTime<Utc>) -> Option<Game> {
    let name = cell_text(row, selector!("td.game-name a"));
    let current = cell_text(row, selector!("td[class='num']"));
    let peak = cell_text(row, selector!("td.peak-concurrent"));

    let (Some(name), Some(current), Some(peak)) = (name, current, peak) else {
        tracing::warn!(rank, "Skipping leaderboard row with missing cells");
        return None;
    };

    let current_players = match parse_count(&current) {
        Ok(n) => n,
        Err(e) => {
            tracing::error!(rank, game = %name, value = %current, "Invalid current player count: {}", e);
            return None;
        }
    };
    let peak_players = match parse_count(&peak) {
        Ok(n) => n,
        Err(e) => {
            tracing::error!(rank, game = %name, value = %peak, "Invalid peak player count: {}", e);
            return None;
        }
    };

    Some(Game {
        name,
        current_players,
        peak_players,
        date: scraped_at,
    })
}

fn cell_text(row: ElementRef, selector: &scraper::Selector) -> Option<String> {
    let text = row.select(selector).next()?.text().collect::<String>();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
