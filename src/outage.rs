//! Outage poller
//!
//! Polls the utility-provider endpoint for the announced outage window (if
//! any) at the configured address. The provider answers per street; the
//! poller looks up its own building in the response map. A missing building
//! key is a fetch error, never "no outage". Changes are detected by
//! structural equality and fanned out to subscribers.

use crate::clock::LocalTimestamp;
use crate::config::OutageConfig;
use crate::error::{GridwatchError, Result};
use crate::lock_ignore_poison;
use crate::logging::{StructuredLogger, get_logger};
use crate::report::ErrorReporter;
use crate::subscribe::{Subscriber, fan_out};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;

/// Wait between retries after a failed poll, independent of the poll interval
const FAILURE_BACKOFF: Duration = Duration::from_secs(10);

/// Client-side timeout for a single provider request
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// One announced outage window
///
/// Equality is structural over category and both bounds; a bound that is
/// `None` on both sides compares equal, one-sided `None` compares unequal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutageWindow {
    /// Free-text category, e.g. "emergency" or "scheduled"
    #[serde(rename = "type")]
    pub kind: String,

    /// Announced start, if the provider published one
    pub from: Option<LocalTimestamp>,

    /// Announced end, if the provider published one
    pub to: Option<LocalTimestamp>,
}

#[derive(Debug, Deserialize)]
struct ProviderResponse {
    #[serde(default)]
    city: String,
    #[serde(default)]
    street: String,
    buildings: HashMap<String, BuildingStatus>,
}

#[derive(Debug, Deserialize)]
struct BuildingStatus {
    #[serde(default)]
    #[allow(dead_code)]
    group: String,
    outage: Option<OutageWindow>,
}

/// Poller for the utility-provider outage feed
pub struct OutageService {
    url: String,
    region: String,
    city: String,
    street: String,
    building: String,
    poll_interval: Duration,
    failure_backoff: Duration,

    state: Mutex<Option<OutageWindow>>,
    subscribers: Mutex<Vec<Subscriber<Option<OutageWindow>>>>,

    client: reqwest::Client,
    logger: StructuredLogger,
    reporter: Arc<dyn ErrorReporter>,
}

impl OutageService {
    /// Create a new poller for the configured address
    pub fn new(config: &OutageConfig, reporter: Arc<dyn ErrorReporter>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| GridwatchError::generic(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            url: config.status_url(),
            region: config.region.clone(),
            city: config.city.clone(),
            street: config.street.clone(),
            building: config.building.clone(),
            poll_interval: config.poll_interval,
            failure_backoff: FAILURE_BACKOFF,
            state: Mutex::new(None),
            subscribers: Mutex::new(Vec::new()),
            client,
            logger: get_logger("outage"),
            reporter,
        })
    }

    /// Override the failure backoff (shortened in tests)
    pub fn with_failure_backoff(mut self, backoff: Duration) -> Self {
        self.failure_backoff = backoff;
        self
    }

    /// Register subscribers and begin the independent polling loop
    pub fn start(
        self: &Arc<Self>,
        shutdown: watch::Receiver<bool>,
        subscribers: Vec<Subscriber<Option<OutageWindow>>>,
    ) {
        *lock_ignore_poison(&self.subscribers) = subscribers;
        let service = Arc::clone(self);
        tokio::spawn(async move {
            service.run(shutdown).await;
        });
    }

    async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            match self.fetch_outage().await {
                Ok(outage) => {
                    self.observe(outage);
                }
                Err(e) => {
                    self.logger.error(&format!("outage poll failed: {}", e));
                    self.reporter.capture("outage", &e);
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
        self.logger.info("outage poller stopped");
    }

    /// Record one observation; on structural change, store it and fan out.
    /// `None` means "no active outage" and participates in the comparison.
    pub fn observe(&self, outage: Option<OutageWindow>) -> bool {
        {
            let mut last = lock_ignore_poison(&self.state);
            if *last == outage {
                return false;
            }
            *last = outage.clone();
        }
        match &outage {
            Some(window) => self
                .logger
                .info(&format!("outage window changed: kind={}", window.kind)),
            None => self.logger.info("outage window cleared"),
        }
        let subscribers = lock_ignore_poison(&self.subscribers).clone();
        fan_out(&subscribers, outage);
        true
    }

    /// Issue one fetch of the street status and look up our building
    pub async fn fetch_outage(&self) -> Result<Option<OutageWindow>> {
        self.logger
            .debug(&format!("pulling outage status from {}", self.url));
        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("region", self.region.as_str()),
                ("city", self.city.as_str()),
                ("street", self.street.as_str()),
            ])
            .send()
            .await
            .map_err(|e| GridwatchError::fetch("outage", &format!("request failed: {}", e)))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(GridwatchError::fetch(
                "outage",
                &format!("unexpected response status code, expected 200, was {}", status.as_u16()),
            ));
        }

        let body: ProviderResponse = response.json().await.map_err(|e| {
            GridwatchError::fetch("outage", &format!("failed to decode street status: {}", e))
        })?;
        self.logger.debug(&format!(
            "provider answered for {} / {}",
            body.city, body.street
        ));

        lookup_building(&body, &self.building)
    }
}

/// Pick the configured building out of the provider response
///
/// An absent key means the provider does not know the address in this
/// response, which must surface as a fetch error rather than "no outage".
fn lookup_building(response: &ProviderResponse, building: &str) -> Result<Option<OutageWindow>> {
    match response.buildings.get(building) {
        Some(status) => Ok(status.outage.clone()),
        None => Err(GridwatchError::fetch(
            "outage",
            &format!(
                "cannot find required building {} among {} answered",
                building,
                response.buildings.len()
            ),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(kind: &str, from: Option<&str>, to: Option<&str>) -> OutageWindow {
        OutageWindow {
            kind: kind.to_string(),
            from: from.map(|s| LocalTimestamp::parse(s).unwrap()),
            to: to.map(|s| LocalTimestamp::parse(s).unwrap()),
        }
    }

    #[test]
    fn structural_equality() {
        let a = window("emergency", Some("10:00 01.03.2025"), Some("14:00 01.03.2025"));
        let b = window("emergency", Some("10:00 01.03.2025"), Some("14:00 01.03.2025"));
        assert_eq!(a, b);

        // one side missing a bound is a change
        let c = window("emergency", Some("10:00 01.03.2025"), None);
        assert_ne!(a, c);

        // both missing compares equal
        let d = window("emergency", None, None);
        let e = window("emergency", None, None);
        assert_eq!(d, e);

        let f = window("scheduled", Some("10:00 01.03.2025"), Some("14:00 01.03.2025"));
        assert_ne!(a, f);
    }

    #[test]
    fn provider_response_parses_with_null_outage() {
        let raw = r#"{
            "city": "Kyiv",
            "street": "Khreshchatyk",
            "buildings": {
                "12": {"group": "3.1", "outage": null},
                "14": {"group": "3.1", "outage": {"type": "emergency", "from": "08:00 02.03.2025", "to": null}}
            }
        }"#;
        let parsed: ProviderResponse = serde_json::from_str(raw).unwrap();
        assert!(lookup_building(&parsed, "12").unwrap().is_none());

        let active = lookup_building(&parsed, "14").unwrap().unwrap();
        assert_eq!(active.kind, "emergency");
        assert!(active.from.is_some());
        assert!(active.to.is_none());
    }

    #[test]
    fn missing_building_is_an_error_not_no_outage() {
        let raw = r#"{"city": "Kyiv", "street": "Khreshchatyk", "buildings": {"12": {"group": "1", "outage": null}}}"#;
        let parsed: ProviderResponse = serde_json::from_str(raw).unwrap();
        let err = lookup_building(&parsed, "99").unwrap_err();
        assert!(matches!(err, GridwatchError::Fetch { .. }));
    }
}
