use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, DurationRound, Utc};
use tokio::sync::watch;

use crate::services::backend_relay::BackendRelay;
use crate::services::steam_charts::SteamChartsScraper;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Wake at the start of every UTC hour.
    Hourly,
    /// Wake a fixed period after the previous cycle.
    Every(Duration),
}

/// Next wake-up after `now`; always strictly later than `now`.
pub fn next_run(now: DateTime<Utc>, schedule: Schedule) -> DateTime<Utc> {
    match schedule {
        Schedule::Hourly => {
            let hour = chrono::Duration::hours(1);
            let hour_start = now.duration_trunc(hour).unwrap_or(now);
            hour_start + hour
        }
        Schedule::Every(period) => {
            let period = chrono::Duration::from_std(period)
                .ok()
                .filter(|p| *p > chrono::Duration::zero())
                .unwrap_or_else(|| chrono::Duration::seconds(1));
            now + period
        }
    }
}

/// How a single collection cycle ended; every variant lets the loop continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Relayed(usize),
    Empty,
    ScrapeFailed,
    RelayFailed,
}

pub struct Collector {
    pub scraper: Arc<SteamChartsScraper>,
    pub relay: BackendRelay,
    pub schedule: Schedule,
    pub run_on_startup: bool,
}

/// One fetch-then-relay pass. Failures are logged here and never returned.
pub async fn run_cycle(scraper: &SteamChartsScraper, relay: &BackendRelay) -> CycleOutcome {
    let games = match scraper.get_top_games().await {
        Ok(games) => games,
        Err(e) => {
            tracing::warn!("Collector: scraping failed: {}", e);
            return CycleOutcome::ScrapeFailed;
        }
    };

    if games.is_empty() {
        tracing::warn!("Collector: no games collected, skipping relay");
        return CycleOutcome::Empty;
    }

    match relay.relay(&games).await {
        Ok(()) => {
            tracing::info!(count = games.len(), url = relay.games_url(), "Collector: games relayed");
            CycleOutcome::Relayed(games.len())
        }
        Err(e) => {
            tracing::error!(url = relay.games_url(), "Collector: relay failed: {}", e);
            CycleOutcome::RelayFailed
        }
    }
}

pub async fn start_background_task(collector: Collector, mut shutdown: watch::Receiver<bool>) {
    tracing::info!(schedule = ?collector.schedule, "Background Task Started: SteamCharts collector");
    let mut run_now = collector.run_on_startup;

    loop {
        if !run_now {
            let next = next_run(Utc::now(), collector.schedule);
            tracing::info!(next_run = %next, "Collector: next collection scheduled");
            let delay = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);

            tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown) => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        run_now = false;

        tokio::select! {
            biased;
            _ = wait_for_shutdown(&mut shutdown) => break,
            outcome = run_cycle(&collector.scraper, &collector.relay) => {
                tracing::debug!(?outcome, "Collector: cycle finished");
            }
        }
    }

    tracing::info!("Background Task Stopped: SteamCharts collector");
}

async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    // A dropped sender means the process is going away as well.
    let _ = shutdown.wait_for(|stop| *stop).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackendConfig, ScraperConfig};
    use crate::services::transport::fake::FakeTransport;
    use crate::services::transport::{HttpResponse, HttpTransport, TransportError};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use reqwest::StatusCode;

    const PAGE: &str = r#"<table id="top-games"><tbody>
        <tr>
          <td class="game-name left"><a href="/app/730">Counter-Strike 2</a></td>
          <td class="num">1,234,567</td>
          <td class="num period-col peak-concurrent">1,500,000</td>
        </tr>
    </tbody></table>"#;

    fn collector_with(transport: Arc<dyn HttpTransport>, schedule: Schedule, run_on_startup: bool) -> Collector {
        let scraper_config = ScraperConfig::new("https://steamcharts.com", "charts-bot/1.0").unwrap();
        let backend_config = BackendConfig::new("http://storage.local", "/api/games").unwrap();
        Collector {
            scraper: Arc::new(SteamChartsScraper::new(scraper_config, transport.clone())),
            relay: BackendRelay::new(&backend_config, transport),
            schedule,
            run_on_startup,
        }
    }

    #[test]
    fn hourly_schedule_lands_on_next_hour_boundary() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 13, 42, 7).unwrap();
        assert_eq!(
            next_run(now, Schedule::Hourly),
            Utc.with_ymd_and_hms(2024, 5, 1, 14, 0, 0).unwrap()
        );

        let late = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(
            next_run(late, Schedule::Hourly),
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn hourly_schedule_is_strictly_in_the_future_on_the_boundary() {
        let on_boundary = Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap();
        assert_eq!(
            next_run(on_boundary, Schedule::Hourly),
            Utc.with_ymd_and_hms(2024, 5, 1, 14, 0, 0).unwrap()
        );

        let now = Utc::now();
        assert!(next_run(now, Schedule::Hourly) > now);
    }

    #[test]
    fn interval_schedule_adds_the_period() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 13, 42, 7).unwrap();
        assert_eq!(
            next_run(now, Schedule::Every(Duration::from_secs(60))),
            Utc.with_ymd_and_hms(2024, 5, 1, 13, 43, 7).unwrap()
        );
        assert!(next_run(now, Schedule::Every(Duration::ZERO)) > now);
    }

    #[tokio::test]
    async fn empty_result_skips_relay() {
        let transport = Arc::new(FakeTransport::with_page(StatusCode::OK, "<html><body></body></html>"));
        let collector = collector_with(transport.clone(), Schedule::Hourly, false);

        let outcome = run_cycle(&collector.scraper, &collector.relay).await;

        assert_eq!(outcome, CycleOutcome::Empty);
        assert_eq!(transport.post_count(), 0);
    }

    #[tokio::test]
    async fn non_empty_result_is_relayed_once() {
        let transport = Arc::new(FakeTransport::with_page(StatusCode::OK, PAGE));
        let collector = collector_with(transport.clone(), Schedule::Hourly, false);

        let outcome = run_cycle(&collector.scraper, &collector.relay).await;

        assert_eq!(outcome, CycleOutcome::Relayed(1));
        assert_eq!(transport.post_count(), 1);
    }

    #[tokio::test]
    async fn rejected_relay_is_contained() {
        let transport = Arc::new(
            FakeTransport::with_page(StatusCode::OK, PAGE).post_status(StatusCode::BAD_GATEWAY),
        );
        let collector = collector_with(transport.clone(), Schedule::Hourly, false);

        let outcome = run_cycle(&collector.scraper, &collector.relay).await;

        assert_eq!(outcome, CycleOutcome::RelayFailed);
        assert_eq!(transport.post_count(), 1);
    }

    #[tokio::test]
    async fn scrape_error_skips_relay() {
        let transport = Arc::new(FakeTransport::with_get(|| {
            Err(TransportError::InvalidRequest("bad header".to_string()))
        }));
        let collector = collector_with(transport.clone(), Schedule::Hourly, false);

        let outcome = run_cycle(&collector.scraper, &collector.relay).await;

        assert_eq!(outcome, CycleOutcome::ScrapeFailed);
        assert_eq!(transport.post_count(), 0);
    }

    #[tokio::test]
    async fn shutdown_during_sleep_stops_without_a_cycle() {
        let transport = Arc::new(FakeTransport::with_page(StatusCode::OK, PAGE));
        let collector = collector_with(transport.clone(), Schedule::Hourly, false);
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(start_background_task(collector, rx));
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("collector did not stop")
            .unwrap();
        assert_eq!(transport.get_count(), 0);
        assert_eq!(transport.post_count(), 0);
    }

    struct StalledTransport;

    #[async_trait]
    impl HttpTransport for StalledTransport {
        async fn get(&self, _url: &str, _user_agent: &str) -> Result<HttpResponse, TransportError> {
            std::future::pending().await
        }

        async fn post_json(&self, _url: &str, _body: String) -> Result<StatusCode, TransportError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn shutdown_interrupts_an_in_flight_cycle() {
        let collector = collector_with(Arc::new(StalledTransport), Schedule::Hourly, true);
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(start_background_task(collector, rx));
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("collector did not stop")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn interval_schedule_runs_one_cycle_per_tick() {
        let transport = Arc::new(FakeTransport::with_page(StatusCode::OK, PAGE));
        let collector = collector_with(transport.clone(), Schedule::Every(Duration::from_secs(60)), false);
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(start_background_task(collector, rx));
        tokio::time::sleep(Duration::from_secs(150)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(transport.get_count(), 2);
        assert_eq!(transport.post_count(), 2);
    }

    #[tokio::test]
    async fn run_on_startup_collects_immediately() {
        let transport = Arc::new(FakeTransport::with_page(StatusCode::OK, PAGE));
        let collector = collector_with(transport.clone(), Schedule::Hourly, true);
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(start_background_task(collector, rx));
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(transport.get_count(), 1);
        assert_eq!(transport.post_count(), 1);
    }
}
