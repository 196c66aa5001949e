use anyhow::Result;
use btscraper::{
    fetch::{Predicate, SodaClient},
    snapshot::SnapshotStore,
};
use reqwest::Client;
use std::{env, time::Duration};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

const REFRESH_DEADLINE: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    // ─── 2) load optional app token ──────────────────────────────────
    dotenv::dotenv().ok();
    let token = env::var("SOCRATA_APP_TOKEN").ok();
    match &token {
        Some(_) => info!("loaded app token"),
        None => warn!("SOCRATA_APP_TOKEN not set; continuing anonymously"),
    }

    // ─── 3) run the pipeline once and publish the snapshot ───────────
    let client = SodaClient::new(Client::new(), token)?;
    let predicate = Predicate::default();
    let store = SnapshotStore::new();
    let snapshot = store
        .refresh(&client, &predicate, REFRESH_DEADLINE)
        .await?;

    // ─── 4) report what downstream consumers will see ────────────────
    info!(
        cleaned = snapshot.cleaned.len(),
        nulls = snapshot.nulls.len(),
        passenger = snapshot.passenger.len(),
        months = snapshot.monthly.len(),
        auth = %snapshot.auth,
        "snapshot ready"
    );
    for agg in &snapshot.monthly {
        info!(
            year = agg.year,
            month = agg.month_name,
            total = agg.value,
            "monthly passenger total"
        );
    }

    Ok(())
}
