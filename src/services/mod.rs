pub mod backend_relay;
pub mod steam_charts;
pub mod transport;
