#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

use device_client::{ClientError, DeviceClient, DeviceSession};
use reading_store::ReadingStore;
use types::{DeviceConfig, DeviceReading, ProtocolVersion};

/// Points the meters only refresh on request; asked for before every
/// status query so instantaneous values are current.
pub const REFRESH_POINTS: [&str; 3] = ["18", "19", "20"];

#[derive(Debug, Clone)]
pub struct ActorConfig {
    /// Pause between the end of one poll cycle and the start of the next.
    pub poll_interval: Duration,
    /// Bound on each network operation within an attempt.
    pub request_timeout: Duration,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            request_timeout: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Error)]
pub enum PollError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("connect did not complete within {timeout_ms}ms")]
    ConnectTimeout { timeout_ms: u64 },
    #[error("device reported an error: {0}")]
    Device(String),
}

/// Outcome of one full poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A candidate version produced a clean status.
    Success(ProtocolVersion),
    /// Every candidate failed; the store entry was reset to missing.
    Failed,
}

/// Candidate scan order: last known good version first, then the fixed
/// descending list minus that version.
pub fn version_candidates(last_good: Option<ProtocolVersion>) -> Vec<ProtocolVersion> {
    let mut order = Vec::with_capacity(ProtocolVersion::CANDIDATES.len());
    if let Some(version) = last_good {
        order.push(version);
    }
    order.extend(
        ProtocolVersion::CANDIDATES
            .iter()
            .copied()
            .filter(|candidate| Some(*candidate) != last_good),
    );
    order
}

/// A polling task responsible for one meter.
///
/// Runs until shutdown; a device that never answers only ever costs its own
/// store entry, never the process.
pub struct PollerActor<C: DeviceClient> {
    device: DeviceConfig,
    client: C,
    store: Arc<ReadingStore>,
    shutdown: watch::Receiver<bool>,
    config: ActorConfig,
    last_good: Option<ProtocolVersion>,
}

impl<C: DeviceClient> PollerActor<C> {
    pub fn new(
        device: DeviceConfig,
        client: C,
        store: Arc<ReadingStore>,
        shutdown: watch::Receiver<bool>,
        config: ActorConfig,
    ) -> Self {
        Self {
            device,
            client,
            store,
            shutdown,
            config,
            last_good: None,
        }
    }

    pub fn last_good(&self) -> Option<ProtocolVersion> {
        self.last_good
    }

    pub async fn run(mut self) {
        loop {
            if *self.shutdown.borrow() {
                info!(device = %self.device.device_id, "poller shutdown requested");
                break;
            }

            let cycle_start = Instant::now();
            let outcome = self.poll_cycle().await;
            debug!(
                device = %self.device.device_id,
                elapsed_ms = cycle_start.elapsed().as_millis() as u64,
                success = matches!(outcome, CycleOutcome::Success(_)),
                "poll cycle complete"
            );

            tokio::select! {
                _ = sleep(self.config.poll_interval) => {}
                _ = self.shutdown.changed() => {
                    if *self.shutdown.borrow() {
                        info!(device = %self.device.device_id, "poller shutdown requested");
                        break;
                    }
                }
            }
        }
    }

    /// One pass over the candidate versions, ending in a store write.
    pub async fn poll_cycle(&mut self) -> CycleOutcome {
        for version in version_candidates(self.last_good) {
            match self.try_version(version).await {
                Ok(reading) => {
                    self.store.set(&self.device.device_id, reading);
                    if self.last_good != Some(version) {
                        info!(
                            device = %self.device.device_id,
                            %version,
                            "meter answered on new protocol version"
                        );
                    }
                    self.last_good = Some(version);
                    return CycleOutcome::Success(version);
                }
                Err(err) => {
                    warn!(
                        device = %self.device.device_id,
                        %version,
                        error = %err,
                        "poll attempt failed"
                    );
                }
            }
        }

        warn!(
            device = %self.device.device_id,
            "all protocol versions failed, marking readings missing"
        );
        self.store
            .set(&self.device.device_id, DeviceReading::missing());
        CycleOutcome::Failed
    }

    async fn try_version(&self, version: ProtocolVersion) -> Result<DeviceReading, PollError> {
        let connect = self.client.connect(&self.device);
        let mut session = timeout(self.config.request_timeout, connect)
            .await
            .map_err(|_| PollError::ConnectTimeout {
                timeout_ms: self.config.request_timeout.as_millis() as u64,
            })??;

        session.set_timeout(self.config.request_timeout);
        session.set_version(version);
        session.refresh_points(&REFRESH_POINTS).await?;

        let status = session.status().await?;
        if let Some(message) = status.error {
            return Err(PollError::Device(message));
        }

        Ok(dps_parser::decode(&status.points))
    }
}
