//! Aggregated presentation state
//!
//! The [`Monitor`] is the consumer side of the subscriber contract: it
//! registers one handler on each feed (grid state, outage window, history
//! snapshot) and keeps the latest combined [`PowerSnapshot`] for the web
//! layer. Handlers are safe under concurrent invocation; each takes the
//! internal lock only long enough to swap its field.

use crate::clock::Clock;
use crate::grid_state::GridState;
use crate::history::HistoryItem;
use crate::lock_ignore_poison;
use crate::outage::OutageWindow;
use crate::subscribe::{Subscriber, subscriber};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Latest combined view of everything the pollers know
#[derive(Debug, Clone, Serialize)]
pub struct PowerSnapshot {
    /// Currently announced outage window, if any
    pub outage: Option<OutageWindow>,

    /// Live grid state: "pending" until the first successful poll
    pub grid: String,

    /// Windowed history of state intervals
    pub history: Vec<HistoryItem>,

    /// Monitored address as shown to the user
    pub address: String,

    /// Build version string
    pub version: String,

    /// Set on synthetic example renderings only
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub demo: bool,
}

/// Holder of the latest snapshot, fed by the three subscription points
pub struct Monitor {
    snapshot: Mutex<PowerSnapshot>,
}

impl Monitor {
    pub fn new(address: String, version: String) -> Self {
        Self {
            snapshot: Mutex::new(PowerSnapshot {
                outage: None,
                grid: "pending".to_string(),
                history: Vec::new(),
                address,
                version,
                demo: false,
            }),
        }
    }

    /// Copy of the current combined snapshot
    pub fn snapshot(&self) -> PowerSnapshot {
        lock_ignore_poison(&self.snapshot).clone()
    }

    /// Seed the history field (used once at startup, before the pollers run)
    pub fn set_history(&self, history: Vec<HistoryItem>) {
        lock_ignore_poison(&self.snapshot).history = history;
    }

    /// Subscriber handle for the grid state feed
    pub fn on_grid_update(self: &Arc<Self>) -> Subscriber<GridState> {
        let monitor = Arc::clone(self);
        subscriber(move |state: GridState| {
            lock_ignore_poison(&monitor.snapshot).grid = state.as_str().to_string();
        })
    }

    /// Subscriber handle for the outage feed
    pub fn on_outage_update(self: &Arc<Self>) -> Subscriber<Option<OutageWindow>> {
        let monitor = Arc::clone(self);
        subscriber(move |outage: Option<OutageWindow>| {
            lock_ignore_poison(&monitor.snapshot).outage = outage;
        })
    }

    /// Subscriber handle for the history snapshot feed
    pub fn on_history_snapshot(self: &Arc<Self>) -> Subscriber<Vec<HistoryItem>> {
        let monitor = Arc::clone(self);
        subscriber(move |history: Vec<HistoryItem>| {
            lock_ignore_poison(&monitor.snapshot).history = history;
        })
    }
}

/// Build the synthetic snapshot behind the `/example/{on,off}` pages
pub fn demo_snapshot(grid: GridState, address: &str, version: &str, clock: &Clock) -> PowerSnapshot {
    let now = clock.now();
    let hours = |h: u64, m: u64| now.minus(Duration::from_secs(h * 3600 + m * 60));

    let mut history = vec![
        HistoryItem {
            state: GridState::Off,
            from: hours(23, 0),
            to: Some(hours(21, 45)),
        },
        HistoryItem {
            state: GridState::On,
            from: hours(21, 45),
            to: Some(hours(18, 0)),
        },
        HistoryItem {
            state: GridState::Off,
            from: hours(18, 0),
            to: Some(hours(14, 30)),
        },
        HistoryItem {
            state: GridState::On,
            from: hours(14, 30),
            to: Some(hours(6, 0)),
        },
        HistoryItem {
            state: GridState::Off,
            from: hours(6, 0),
            to: Some(hours(4, 45)),
        },
    ];

    let mut outage = None;
    match grid {
        GridState::On => {
            history.push(HistoryItem {
                state: GridState::On,
                from: hours(4, 45),
                to: None,
            });
        }
        GridState::Off => {
            history.push(HistoryItem {
                state: GridState::On,
                from: hours(4, 45),
                to: Some(hours(0, 35)),
            });
            history.push(HistoryItem {
                state: GridState::Off,
                from: hours(0, 35),
                to: None,
            });
            outage = Some(OutageWindow {
                kind: "emergency".to_string(),
                from: Some(hours(0, 35)),
                to: Some(now.plus(Duration::from_secs(85 * 60))),
            });
        }
    }

    PowerSnapshot {
        outage,
        grid: grid.as_str().to_string(),
        history,
        address: address.to_string(),
        version: version.to_string(),
        demo: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn handlers_update_their_fields() {
        let monitor = Arc::new(Monitor::new("Kyiv, Khreshchatyk, 12".into(), "test".into()));
        assert_eq!(monitor.snapshot().grid, "pending");

        monitor.on_grid_update()(GridState::On);
        monitor.on_outage_update()(Some(OutageWindow {
            kind: "scheduled".into(),
            from: None,
            to: None,
        }));
        monitor.on_history_snapshot()(vec![]);

        let snap = monitor.snapshot();
        assert_eq!(snap.grid, "on");
        assert_eq!(snap.outage.unwrap().kind, "scheduled");
        assert!(snap.history.is_empty());
    }

    #[test]
    fn demo_snapshot_alternates_and_ends_open() {
        let clock = Clock::new("Europe/Kyiv").unwrap();
        for grid in [GridState::On, GridState::Off] {
            let snap = demo_snapshot(grid, "addr", "v", &clock);
            assert!(snap.demo);
            assert_eq!(snap.grid, grid.as_str());
            for pair in snap.history.windows(2) {
                assert_ne!(pair[0].state, pair[1].state);
            }
            let last = snap.history.last().unwrap();
            assert!(last.to.is_none());
            assert_eq!(last.state, grid);
        }
    }

    #[test]
    fn snapshot_serializes_without_demo_flag_by_default() {
        let monitor = Monitor::new("addr".into(), "v".into());
        let json = serde_json::to_string(&monitor.snapshot()).unwrap();
        assert!(!json.contains("\"demo\""));
        assert!(json.contains("\"grid\":\"pending\""));
        assert!(json.contains("\"outage\":null"));
    }
}
