use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser, Clone, Default)]
#[command(name = "zonegate-sim")]
#[command(about = "Drive a simulated region through the admission queue")]
pub struct Cli {
    /// Region description (JSON). Flags below override its values.
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub region_id: Option<u32>,

    /// Participants allowed in the region at once.
    #[arg(long)]
    pub max_occupancy: Option<usize>,

    /// Update loop period.
    #[arg(long, default_value_t = 100)]
    pub tick_ms: u64,

    /// Time between drain checks.
    #[arg(long)]
    pub drain_interval_ms: Option<u64>,

    /// Reject entries that waited longer than this. Unset means wait forever.
    #[arg(long)]
    pub max_wait_ms: Option<u64>,

    /// Replace the scripted arrivals with this many generated participants.
    #[arg(long)]
    pub participants: Option<usize>,

    /// How long an admitted participant stays before leaving.
    #[arg(long)]
    pub stay_ms: Option<u64>,

    /// Stop after this many seconds. Ctrl-C stops earlier.
    #[arg(long, default_value_t = 30)]
    pub run_secs: u64,

    /// Tracing filter, e.g. `info,zonegate_admission=debug`.
    #[arg(long)]
    pub log_filter: Option<String>,
}
