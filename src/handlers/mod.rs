use utoipa::OpenApi;

use crate::models::game::Game;

pub mod steam_charts;

#[derive(OpenApi)]
#[openapi(
    paths(steam_charts::get_top_games),
    components(schemas(Game)),
    tags((name = "steamcharts", description = "SteamCharts leaderboard snapshots"))
)]
pub struct ApiDoc;
