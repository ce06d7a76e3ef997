//! Grid state poller
//!
//! Polls the smart-home sensor endpoint for the live on/off grid state on a
//! fixed interval, detects changes against the last known value and fans the
//! new state out to subscribers. Fetch failures are reported and retried
//! after a short fixed backoff without consuming the regular tick.

use crate::error::{GridwatchError, Result};
use crate::lock_ignore_poison;
use crate::logging::{StructuredLogger, get_logger};
use crate::report::ErrorReporter;
use crate::subscribe::{Subscriber, fan_out};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;

/// Wait between retries after a failed poll, independent of the poll interval
const FAILURE_BACKOFF: Duration = Duration::from_secs(10);

/// Client-side timeout for a single sensor request
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Live grid state as reported by the sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridState {
    On,
    Off,
}

impl GridState {
    /// Parse the sensor's `state` field; anything but `on`/`off` is an error
    pub fn parse(label: &str) -> Result<Self> {
        match label {
            "on" => Ok(Self::On),
            "off" => Ok(Self::Off),
            other => Err(GridwatchError::fetch(
                "grid-state",
                &format!("unexpected grid state value, expected on|off, was {}", other),
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
        }
    }
}

impl fmt::Display for GridState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct SensorStateResponse {
    state: String,
}

/// Poller for the smart-home grid sensor
pub struct GridStateService {
    url: String,
    token: String,
    poll_interval: Duration,
    failure_backoff: Duration,

    state: Mutex<Option<GridState>>,
    subscribers: Mutex<Vec<Subscriber<GridState>>>,

    client: reqwest::Client,
    logger: StructuredLogger,
    reporter: Arc<dyn ErrorReporter>,
}

impl GridStateService {
    /// Create a new poller against the sensor state endpoint
    pub fn new(
        url: String,
        token: String,
        poll_interval: Duration,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| GridwatchError::generic(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            url,
            token,
            poll_interval,
            failure_backoff: FAILURE_BACKOFF,
            state: Mutex::new(None),
            subscribers: Mutex::new(Vec::new()),
            client,
            logger: get_logger("grid-state"),
            reporter,
        })
    }

    /// Override the failure backoff (shortened in tests)
    pub fn with_failure_backoff(mut self, backoff: Duration) -> Self {
        self.failure_backoff = backoff;
        self
    }

    /// Register subscribers and begin the independent polling loop
    ///
    /// The loop runs until the shutdown signal fires; cancellation during
    /// either the regular wait or the failure backoff exits immediately.
    pub fn start(self: &Arc<Self>, shutdown: watch::Receiver<bool>, subscribers: Vec<Subscriber<GridState>>) {
        *lock_ignore_poison(&self.subscribers) = subscribers;
        let service = Arc::clone(self);
        tokio::spawn(async move {
            service.run(shutdown).await;
        });
    }

    async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            match self.fetch_state().await {
                Ok(state) => {
                    self.observe(state);
                }
                Err(e) => {
                    self.logger.error(&format!("grid state poll failed: {}", e));
                    self.reporter.capture("grid-state", &e);
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = sleep(self.failure_backoff) => {}
                    }
                    continue;
                }
            }
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = sleep(self.poll_interval) => {}
            }
        }
        self.logger.info("grid state poller stopped");
    }

    /// Record one observation; on change, store it and fan out to
    /// subscribers. Returns whether the observation changed the state.
    pub fn observe(&self, state: GridState) -> bool {
        {
            let mut last = lock_ignore_poison(&self.state);
            if *last == Some(state) {
                return false;
            }
            *last = Some(state);
        }
        self.logger
            .info(&format!("grid state changed to {}", state));
        let subscribers = lock_ignore_poison(&self.subscribers).clone();
        fan_out(&subscribers, state);
        true
    }

    /// Issue one authenticated fetch of the live sensor state
    pub async fn fetch_state(&self) -> Result<GridState> {
        self.logger
            .debug(&format!("pulling grid state from {}", self.url));
        let response = self
            .client
            .get(&self.url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| GridwatchError::fetch("grid-state", &format!("request failed: {}", e)))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(GridwatchError::fetch(
                "grid-state",
                &format!("unexpected response status code, expected 200, was {}", status.as_u16()),
            ));
        }

        let body: SensorStateResponse = response.json().await.map_err(|e| {
            GridwatchError::fetch("grid-state", &format!("failed to decode grid state: {}", e))
        })?;
        GridState::parse(&body.state)
    }
}
