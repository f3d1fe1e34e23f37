use std::sync::Arc;

use reqwest::StatusCode;
use thiserror::Error;

use crate::config::BackendConfig;
use crate::models::game::Game;
use crate::services::transport::{HttpTransport, TransportError};

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("backend rejected games with status {0}")]
    Status(StatusCode),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("could not serialize games: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Forwards collected snapshots to the storage backend.
pub struct BackendRelay {
    games_url: String,
    transport: Arc<dyn HttpTransport>,
}

impl BackendRelay {
    pub fn new(config: &BackendConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            games_url: config.games_url(),
            transport,
        }
    }

    pub fn games_url(&self) -> &str {
        &self.games_url
    }

    pub async fn relay(&self, games: &[Game]) -> Result<(), RelayError> {
        let body = serde_json::to_string(games)?;
        let status = self.transport.post_json(&self.games_url, body).await?;
        if !status.is_success() {
            return Err(RelayError::Status(status));
        }
        Ok(())
    }
}
