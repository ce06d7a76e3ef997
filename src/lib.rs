//! # Gridwatch - electrical grid availability monitor
//!
//! A small always-on service that watches grid power for one fixed address
//! by polling two independent upstreams - a smart-home sensor reporting the
//! live on/off grid state, and a utility-provider feed announcing
//! scheduled/emergency outage windows - and turns them into a deduplicated,
//! time-windowed history of state transitions plus a live notification
//! fan-out.
//!
//! ## Architecture
//!
//! The application follows a modular architecture with clear separation of concerns:
//!
//! - `config`: environment-variable configuration with validation
//! - `logging`: structured logging and tracing
//! - `clock`: civil time provider pinned to one timezone
//! - `grid_state`: poller for the live sensor state
//! - `outage`: poller for the announced outage window
//! - `history`: deduplicated, windowed, atomically persisted ledger
//! - `subscribe`: fire-and-forget subscriber fan-out
//! - `monitor`: aggregated snapshot for presentation
//! - `report`: error reporting seam for recovered failures
//! - `web`: HTTP server, status page and JSON API

pub mod clock;
pub mod config;
pub mod error;
pub mod grid_state;
pub mod history;
pub mod logging;
pub mod monitor;
pub mod outage;
pub mod report;
pub mod subscribe;
pub mod web;

// Re-export commonly used types
pub use clock::{Clock, LocalTimestamp};
pub use config::Config;
pub use error::{GridwatchError, Result};
pub use grid_state::{GridState, GridStateService};
pub use history::{GridHistoryService, HistoryItem};
pub use outage::{OutageService, OutageWindow};

/// Build version injected by build.rs
pub const VERSION: &str = env!("APP_VERSION");

/// Take a std mutex, recovering the guard if a panicking handler poisoned it
pub(crate) fn lock_ignore_poison<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
