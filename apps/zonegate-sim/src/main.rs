mod cli;
mod config;
mod world;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use zonegate_admission::{AdmissionService, DrainStart};

use cli::Cli;
use config::SimSettings;
use world::SimRegion;

const ENTER_COMMAND: &str = "zoneEnter";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_filter.as_deref());

    let settings = config::load(&cli)?;
    let region = Arc::new(SimRegion::new(
        settings.admission.region_id,
        &settings.arrivals,
    ));
    let service = AdmissionService::new(settings.admission.clone(), region.deps())
        .context("start admission service")?;
    info!(
        region_id = %service.region_id(),
        participants = settings.arrivals.len(),
        tick_ms = settings.tick.as_millis() as u64,
        "simulation started"
    );

    let run_result = run_simulation(&service, &region, &settings).await;

    let stopping = service.clone();
    tokio::task::spawn_blocking(move || stopping.shutdown())
        .await
        .context("join shutdown task")?
        .context("shut down admission service")?;

    let info = service.queue_info();
    info!(
        region_id = %info.region_id,
        max_occupancy = info.max_occupancy,
        queue_len = info.queue_length,
        occupancy = region.occupancy(),
        "simulation finished"
    );
    run_result
}

fn init_tracing(directives: Option<&str>) {
    let filter = match directives {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Cooperative update loop: feeds ticks to the service, replays scripted
/// arrivals, and lets admitted participants leave once their stay ends.
async fn run_simulation(
    service: &AdmissionService,
    region: &SimRegion,
    settings: &SimSettings,
) -> Result<()> {
    let mut events = service.subscribe_events();
    let mut arrivals = settings.arrivals.iter().peekable();

    let started = Instant::now();
    let mut last_tick = started;
    let mut ticker = tokio::time::interval(settings.tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let deadline = tokio::time::sleep(settings.run_for);
    tokio::pin!(deadline);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut deadline => {
                info!(run_secs = settings.run_for.as_secs(), "run time elapsed");
                break;
            },
            signal = &mut ctrl_c => {
                signal.context("listen for ctrl-c")?;
                info!("interrupted");
                break;
            },
            now = ticker.tick() => {
                let since_start = now.saturating_duration_since(started);
                while let Some(arrival) = arrivals.next_if(|arrival| arrival.at <= since_start) {
                    service
                        .enqueue(arrival.participant, ENTER_COMMAND.into())
                        .context("enqueue arrival")?;
                }

                for participant in region.depart_due(now.into_std()) {
                    info!(%participant, "participant left region");
                }

                let elapsed = now.saturating_duration_since(last_tick);
                last_tick = now;
                match service.on_tick(elapsed).context("drive admission tick")? {
                    Some(DrainStart::Started) => debug!("drain started"),
                    Some(other) => debug!(outcome = ?other, "drain not started"),
                    None => {},
                }
            },
            event = events.recv() => match event {
                Ok(event) => debug!(?event, "admission event"),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "admission events lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }
    Ok(())
}
