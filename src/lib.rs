pub mod clock;
pub mod cohort;
pub mod db;
pub mod engine;
pub mod errors;
pub mod funnel;
pub mod models;
pub mod mutator;
pub mod sequence;
pub mod store;

pub use crate::clock::{Clock, FixedClock, SystemClock};
pub use crate::cohort::{CohortMode, CohortSelector};
pub use crate::db::SqliteLeadStore;
pub use crate::engine::OutreachCore;
pub use crate::errors::{CoreError, CoreResult};
pub use crate::funnel::{FunnelSummary, StageCount};
pub use crate::models::{
    BulkFailure, BulkOutcome, CoreSettings, Lead, LeadFilter, LeadPatch, LeadStatus, NewLead,
    OutreachStep, Priority, ResponseRecord, StepState,
};
pub use crate::sequence::NextStep;
pub use crate::store::{LeadStore, MemoryLeadStore};

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

/// Install the JSON file logger. Safe to call once per process; the host
/// application decides where logs land.
pub fn init_tracing(data_dir: &Path) -> Result<(), String> {
    let log_dir = data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).map_err(|error| error.to_string())?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "outreach.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| error.to_string())
}
