use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use zonegate_admission::{AdmissionConfig, WaitPolicy};
use zonegate_core::{ParticipantId, RegionId};

use crate::cli::Cli;

const DEFAULT_STAY_MS: u64 = 4_000;
const GENERATED_ARRIVAL_GAP_MS: u64 = 250;

/// Region file as written on disk.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegionFile {
    pub region_id: u32,
    pub max_occupancy: usize,
    pub drain_interval_ms: u64,
    pub max_wait_ms: Option<u64>,
    pub participants: Vec<ScriptedParticipant>,
}

impl Default for RegionFile {
    fn default() -> Self {
        Self {
            region_id: 1,
            max_occupancy: 2,
            drain_interval_ms: 2_000,
            max_wait_ms: None,
            participants: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScriptedParticipant {
    pub id: u64,
    #[serde(default)]
    pub arrive_after_ms: u64,
    #[serde(default)]
    pub stay_ms: Option<u64>,
    #[serde(default)]
    pub banned: bool,
}

#[derive(Debug, Clone)]
pub struct Arrival {
    pub participant: ParticipantId,
    pub at: Duration,
    pub stay: Duration,
    pub banned: bool,
}

#[derive(Debug, Clone)]
pub struct SimSettings {
    pub admission: AdmissionConfig,
    pub tick: Duration,
    pub run_for: Duration,
    /// Sorted by arrival time.
    pub arrivals: Vec<Arrival>,
}

pub fn load(cli: &Cli) -> Result<SimSettings> {
    let file = match cli.config.as_deref() {
        Some(path) => read_region_file(path)?,
        None => RegionFile::default(),
    };
    resolve(file, cli)
}

fn read_region_file(path: &Path) -> Result<RegionFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read region file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse region file {}", path.display()))
}

pub fn resolve(file: RegionFile, cli: &Cli) -> Result<SimSettings> {
    ensure!(cli.tick_ms > 0, "--tick-ms must be positive");

    let region_id = RegionId::new(cli.region_id.unwrap_or(file.region_id));
    let max_occupancy = cli.max_occupancy.unwrap_or(file.max_occupancy);
    let drain_interval_ms = cli.drain_interval_ms.unwrap_or(file.drain_interval_ms);
    let wait_policy = match cli.max_wait_ms.or(file.max_wait_ms) {
        Some(ms) => WaitPolicy::Bounded(Duration::from_millis(ms)),
        None => WaitPolicy::Indefinite,
    };

    let admission = AdmissionConfig {
        drain_interval: Duration::from_millis(drain_interval_ms),
        wait_policy,
        ..AdmissionConfig::new(region_id, max_occupancy)
    };
    admission.validate().context("invalid region settings")?;

    let scripted = match cli.participants {
        Some(count) => generated(count),
        None => file.participants,
    };
    let default_stay = cli.stay_ms.unwrap_or(DEFAULT_STAY_MS);
    let mut arrivals = scripted
        .into_iter()
        .map(|p| Arrival {
            participant: ParticipantId::new(p.id),
            at: Duration::from_millis(p.arrive_after_ms),
            stay: Duration::from_millis(p.stay_ms.unwrap_or(default_stay)),
            banned: p.banned,
        })
        .collect::<Vec<_>>();
    arrivals.sort_by_key(|arrival| arrival.at);

    Ok(SimSettings {
        admission,
        tick: Duration::from_millis(cli.tick_ms),
        run_for: Duration::from_secs(cli.run_secs),
        arrivals,
    })
}

fn generated(count: usize) -> Vec<ScriptedParticipant> {
    (0..count as u64)
        .map(|idx| ScriptedParticipant {
            id: idx + 1,
            arrive_after_ms: idx * GENERATED_ARRIVAL_GAP_MS,
            stay_ms: None,
            banned: false,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use zonegate_admission::WaitPolicy;
    use zonegate_core::{ParticipantId, RegionId};

    use super::{RegionFile, resolve};
    use crate::cli::Cli;

    fn cli() -> Cli {
        Cli {
            tick_ms: 100,
            run_secs: 30,
            ..Cli::default()
        }
    }

    #[test]
    fn region_file_fills_missing_fields_with_defaults() {
        let file: RegionFile = serde_json::from_str(
            r#"{
                "max_occupancy": 1,
                "participants": [
                    { "id": 9, "arrive_after_ms": 500, "banned": true },
                    { "id": 4, "stay_ms": 100 }
                ]
            }"#,
        )
        .expect("parse");

        let settings = resolve(file, &cli()).expect("resolve");

        assert_eq!(settings.admission.region_id, RegionId::new(1));
        assert_eq!(settings.admission.max_occupancy, 1);
        assert_eq!(settings.admission.drain_interval, Duration::from_secs(2));
        assert_eq!(settings.admission.wait_policy, WaitPolicy::Indefinite);
        let order = settings
            .arrivals
            .iter()
            .map(|arrival| arrival.participant)
            .collect::<Vec<_>>();
        assert_eq!(order, vec![ParticipantId::new(4), ParticipantId::new(9)]);
        assert_eq!(settings.arrivals[0].stay, Duration::from_millis(100));
        assert_eq!(settings.arrivals[1].stay, Duration::from_millis(4_000));
        assert!(settings.arrivals[1].banned);
    }

    #[test]
    fn flags_override_the_file() {
        let cli = Cli {
            region_id: Some(12),
            max_occupancy: Some(7),
            drain_interval_ms: Some(250),
            max_wait_ms: Some(3_000),
            participants: Some(3),
            stay_ms: Some(900),
            ..cli()
        };

        let settings = resolve(RegionFile::default(), &cli).expect("resolve");

        assert_eq!(settings.admission.region_id, RegionId::new(12));
        assert_eq!(settings.admission.max_occupancy, 7);
        assert_eq!(settings.admission.drain_interval, Duration::from_millis(250));
        assert_eq!(
            settings.admission.wait_policy,
            WaitPolicy::Bounded(Duration::from_secs(3))
        );
        assert_eq!(settings.arrivals.len(), 3);
        assert_eq!(settings.arrivals[2].at, Duration::from_millis(500));
        assert!(
            settings
                .arrivals
                .iter()
                .all(|arrival| arrival.stay == Duration::from_millis(900))
        );
    }

    #[test]
    fn zero_drain_interval_is_reported() {
        let cli = Cli {
            drain_interval_ms: Some(0),
            ..cli()
        };

        let err = resolve(RegionFile::default(), &cli).expect_err("invalid");

        assert!(format!("{err:#}").contains("drain interval"));
    }
}
