use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use utoipa::ToSchema;

/// One leaderboard row captured at `date`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub name: String,
    pub current_players: u64,
    pub peak_players: u64,
    pub date: DateTime<Utc>,
}
