//! History ledger
//!
//! Keeps the ordered, deduplicated, time-windowed log of grid state
//! intervals. Each detected change closes the currently open interval and
//! opens a new one; closed intervals older than the retention window are
//! evicted. The in-memory sequence is authoritative; the JSON file on disk
//! exists only for restart recovery and is replaced atomically.

use crate::clock::{Clock, LocalTimestamp};
use crate::error::{GridwatchError, Result};
use crate::grid_state::GridState;
use crate::lock_ignore_poison;
use crate::logging::{StructuredLogger, get_logger};
use crate::report::ErrorReporter;
use crate::subscribe::{Subscriber, fan_out, subscriber};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One closed or open interval of grid state
///
/// `to == None` means the interval is still ongoing. The ledger holds at
/// most one open item and it is always the last one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub state: GridState,
    pub from: LocalTimestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<LocalTimestamp>,
}

/// Ledger of grid state intervals with atomic persistence
pub struct GridHistoryService {
    file_path: String,
    window: Duration,
    clock: Clock,

    state: Mutex<Vec<HistoryItem>>,
    subscribers: Mutex<Vec<Subscriber<Vec<HistoryItem>>>>,

    logger: StructuredLogger,
    reporter: Arc<dyn ErrorReporter>,
}

impl GridHistoryService {
    /// Create a ledger persisting to `file_path` with the given retention window
    pub fn new(
        file_path: String,
        window: Duration,
        clock: Clock,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        Self {
            file_path,
            window,
            clock,
            state: Mutex::new(Vec::new()),
            subscribers: Mutex::new(Vec::new()),
            logger: get_logger("history"),
            reporter,
        }
    }

    /// Load the persisted sequence, then register subscribers
    ///
    /// A missing, unreadable or corrupt file is recoverable: the ledger
    /// starts empty and the next successful write replaces the file.
    pub fn start(&self, subscribers: Vec<Subscriber<Vec<HistoryItem>>>) {
        let loaded = self.read_db();
        *lock_ignore_poison(&self.state) = loaded;
        *lock_ignore_poison(&self.subscribers) = subscribers;
    }

    /// Snapshot copy of the current sequence
    pub fn state(&self) -> Vec<HistoryItem> {
        lock_ignore_poison(&self.state).clone()
    }

    /// Ingestion entry point, shaped for direct registration as a grid
    /// state poller subscriber
    pub fn on_history_update(self: &Arc<Self>) -> Subscriber<GridState> {
        let service = Arc::clone(self);
        subscriber(move |state: GridState| service.ingest(state))
    }

    /// Apply one observed grid state to the ledger
    ///
    /// Repeats of the last state are dropped (upstream may deliver duplicate
    /// notifications). Mutation, dedup and eviction run in one critical
    /// section; fan-out and the disk write happen after the lock is released.
    pub fn ingest(&self, state: GridState) {
        let snapshot = {
            let mut items = lock_ignore_poison(&self.state);
            if items.last().is_some_and(|last| last.state == state) {
                return;
            }
            let now = self.clock.now();
            if let Some(last) = items.last_mut() {
                last.to = Some(now);
            }
            items.push(HistoryItem {
                state,
                from: now,
                to: None,
            });
            evict_closed_before(&mut items, now.minus(self.window));
            items.clone()
        };

        let subscribers = lock_ignore_poison(&self.subscribers).clone();
        fan_out(&subscribers, snapshot.clone());

        if let Err(e) = self.write_snapshot_to_db(&snapshot) {
            // In-memory state stays authoritative; disk catches up on the
            // next successful write.
            self.logger.error(&format!("history db write failed: {}", e));
            self.reporter.capture("history", &e);
        }
    }

    fn read_db(&self) -> Vec<HistoryItem> {
        let raw = match std::fs::read_to_string(&self.file_path) {
            Ok(raw) => raw,
            Err(e) => {
                self.logger.warn(&format!(
                    "history db read failed, falling back to empty state: {}",
                    e
                ));
                return Vec::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(items) => items,
            Err(e) => {
                self.logger.warn(&format!(
                    "history db parse failed, falling back to empty state: {}",
                    e
                ));
                Vec::new()
            }
        }
    }

    /// Serialize and atomically replace the on-disk file
    ///
    /// Write goes to `<path>.tmp` first and is renamed over the target, so a
    /// failure at either step leaves the previous file untouched.
    fn write_snapshot_to_db(&self, items: &[HistoryItem]) -> Result<()> {
        let data = serde_json::to_vec_pretty(items)?;
        let tmp = format!("{}.tmp", self.file_path);
        std::fs::write(&tmp, data).map_err(|e| {
            GridwatchError::persistence(format!("cannot write history to temp file: {}", e))
        })?;
        std::fs::rename(&tmp, &self.file_path).map_err(|e| {
            GridwatchError::persistence(format!("cannot rename temp file to db file: {}", e))
        })?;
        Ok(())
    }
}

/// Drop items whose `to` is set and strictly before the cutoff
///
/// An open item is never evicted regardless of its age.
fn evict_closed_before(items: &mut Vec<HistoryItem>, cutoff: LocalTimestamp) {
    items.retain(|item| item.to.is_none_or(|to| to >= cutoff));
}
