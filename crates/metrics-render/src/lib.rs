//! Rendering of the reading store into the Prometheus text format, behind a
//! TTL-bounded payload cache.

use std::time::Duration;

use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use reading_store::ReadingStore;
use types::DeviceReading;

/// Prometheus text exposition format v0.0.4.
pub const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

const NAMESPACE: &str = "tuya";
const DEVICE_LABEL: &str = "device_id";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("metrics registry error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// Gauge families for the fixed 17-field reading catalog, registered on an
/// explicitly owned registry so tests can construct isolated instances.
pub struct MeterMetrics {
    registry: Registry,
    current_a: GaugeVec,
    current_b: GaugeVec,
    direction_current_a: GaugeVec,
    direction_current_b: GaugeVec,
    energy_forward_a: GaugeVec,
    energy_forward_b: GaugeVec,
    energy_reverse_a: GaugeVec,
    energy_reverse_b: GaugeVec,
    power_a: GaugeVec,
    power_b: GaugeVec,
    power_factor_a: GaugeVec,
    power_factor_b: GaugeVec,
    forward_energy_total: GaugeVec,
    reverse_energy_total: GaugeVec,
    total_power: GaugeVec,
    frequency: GaugeVec,
    voltage: GaugeVec,
}

impl MeterMetrics {
    pub fn new() -> Result<Self, RenderError> {
        let registry = Registry::new();
        Ok(Self {
            current_a: gauge(&registry, "current_a", "Current in A.")?,
            current_b: gauge(&registry, "current_b", "Current in A.")?,
            direction_current_a: gauge(
                &registry,
                "direction_current_a",
                "Direction of current 1 is forward, 0 is reverse.",
            )?,
            direction_current_b: gauge(
                &registry,
                "direction_current_b",
                "Direction of current 1 is forward, 0 is reverse.",
            )?,
            energy_forward_a: gauge(&registry, "energy_forward_a", "Forward energy in kWh.")?,
            energy_forward_b: gauge(&registry, "energy_forward_b", "Forward energy in kWh.")?,
            energy_reverse_a: gauge(&registry, "energy_reverse_a", "Reverse energy in kWh.")?,
            energy_reverse_b: gauge(&registry, "energy_reverse_b", "Reverse energy in kWh.")?,
            power_a: gauge(&registry, "power_a", "Power in W.")?,
            power_b: gauge(&registry, "power_b", "Power in W.")?,
            power_factor_a: gauge(&registry, "power_factor_a", "Power factor.")?,
            power_factor_b: gauge(&registry, "power_factor_b", "Power factor.")?,
            forward_energy_total: gauge(
                &registry,
                "forward_energy_total",
                "Total forward energy in kWh.",
            )?,
            reverse_energy_total: gauge(
                &registry,
                "reverse_energy_total",
                "Total reverse energy in kWh.",
            )?,
            total_power: gauge(&registry, "total_power", "Total power in W.")?,
            frequency: gauge(&registry, "frequency", "Frequency in Hz.")?,
            voltage: gauge(&registry, "voltage", "Voltage in V.")?,
            registry,
        })
    }

    /// Render one consistent snapshot into the exposition format.
    pub fn render(&self, snapshot: &[(String, DeviceReading)]) -> Result<Vec<u8>, RenderError> {
        for (device_id, reading) in snapshot {
            self.record(device_id, reading);
        }

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }

    fn record(&self, device_id: &str, reading: &DeviceReading) {
        let labels = &[device_id];
        self.current_a.with_label_values(labels).set(reading.current_a);
        self.current_b.with_label_values(labels).set(reading.current_b);
        self.direction_current_a
            .with_label_values(labels)
            .set(reading.direction_current_a);
        self.direction_current_b
            .with_label_values(labels)
            .set(reading.direction_current_b);
        self.energy_forward_a
            .with_label_values(labels)
            .set(reading.energy_forward_a);
        self.energy_forward_b
            .with_label_values(labels)
            .set(reading.energy_forward_b);
        self.energy_reverse_a
            .with_label_values(labels)
            .set(reading.energy_reverse_a);
        self.energy_reverse_b
            .with_label_values(labels)
            .set(reading.energy_reverse_b);
        self.power_a.with_label_values(labels).set(reading.power_a);
        self.power_b.with_label_values(labels).set(reading.power_b);
        self.power_factor_a
            .with_label_values(labels)
            .set(reading.power_factor_a);
        self.power_factor_b
            .with_label_values(labels)
            .set(reading.power_factor_b);
        self.forward_energy_total
            .with_label_values(labels)
            .set(reading.forward_energy_total);
        self.reverse_energy_total
            .with_label_values(labels)
            .set(reading.reverse_energy_total);
        self.total_power
            .with_label_values(labels)
            .set(reading.total_power);
        self.frequency.with_label_values(labels).set(reading.frequency);
        self.voltage.with_label_values(labels).set(reading.voltage);
    }
}

fn gauge(registry: &Registry, name: &str, help: &str) -> Result<GaugeVec, RenderError> {
    let gauge = GaugeVec::new(
        Opts::new(name, help).namespace(NAMESPACE),
        &[DEVICE_LABEL],
    )?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

struct CachedPayload {
    bytes: Vec<u8>,
    rendered_at: Instant,
}

/// Memoized rendered payload with a freshness bound.
///
/// The single mutex makes the TTL check and the recompute one atomic step:
/// scrapes racing a cold cache line up behind the first one and get the
/// payload it produced rather than recomputing it again. A failed render
/// leaves the previous payload in place for the endpoint's stale fallback.
pub struct RenderCache {
    ttl: Duration,
    cached: Mutex<Option<CachedPayload>>,
}

impl RenderCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            cached: Mutex::new(None),
        }
    }

    /// Serve the cached payload while it is fresh, otherwise render a new
    /// one from a single store snapshot.
    pub async fn payload(
        &self,
        metrics: &MeterMetrics,
        store: &ReadingStore,
    ) -> Result<Vec<u8>, RenderError> {
        let mut cached = self.cached.lock().await;

        if let Some(entry) = cached.as_ref() {
            if entry.rendered_at.elapsed() <= self.ttl {
                debug!("serving cached metrics payload");
                return Ok(entry.bytes.clone());
            }
        }

        let bytes = metrics.render(&store.snapshot())?;
        *cached = Some(CachedPayload {
            bytes: bytes.clone(),
            rendered_at: Instant::now(),
        });
        Ok(bytes)
    }

    /// Last successfully rendered payload, however old.
    pub async fn stale(&self) -> Option<Vec<u8>> {
        self.cached
            .lock()
            .await
            .as_ref()
            .map(|entry| entry.bytes.clone())
    }
}
