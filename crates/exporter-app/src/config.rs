use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use poller_actor::ActorConfig;
use types::DeviceConfig;

const DEFAULT_LISTEN_PORT: u16 = 9999;
const DEFAULT_CACHE_TTL_MS: u64 = 5_000;
const DEFAULT_RESPAWN_DELAY_MS: u64 = 1_000;

#[derive(Clone, Debug)]
pub struct ExporterConfig {
    pub listen_port: u16,
    /// Drive configured devices with the simulated backend instead of a
    /// production protocol library.
    pub simulate: bool,
    pub devices: Vec<DeviceConfig>,
    pub poller: ActorConfig,
    pub cache_ttl: Duration,
    pub respawn_delay_ms: u64,
}

impl ExporterConfig {
    pub fn load() -> Result<Self> {
        Self::load_with_path(None)
    }

    pub fn load_with_path(config_path: Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(file_config) = load_file_config(config_path.as_deref())? {
            apply_file_config(&mut config, file_config);
        }

        apply_env_overrides(&mut config);
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.listen_port == 0 {
            anyhow::bail!("listen_port must be between 1 and 65535");
        }
        if self.poller.poll_interval.as_millis() == 0 {
            anyhow::bail!("poller.poll_interval_ms must be >= 1");
        }
        if self.poller.request_timeout.as_millis() == 0 {
            anyhow::bail!("poller.request_timeout_ms must be >= 1");
        }
        if self.respawn_delay_ms == 0 {
            anyhow::bail!("respawn_delay_ms must be >= 1");
        }

        let mut seen = HashSet::new();
        for device in &self.devices {
            if device.device_id.trim().is_empty() {
                anyhow::bail!("devices[].device_id must be non-empty");
            }
            if device.address.trim().is_empty() {
                anyhow::bail!(
                    "devices[].address must be non-empty (device {})",
                    device.device_id
                );
            }
            if device.local_key.trim().is_empty() {
                anyhow::bail!(
                    "devices[].local_key must be non-empty (device {})",
                    device.device_id
                );
            }
            if !seen.insert(device.device_id.as_str()) {
                anyhow::bail!("duplicate device_id {}", device.device_id);
            }
        }

        Ok(())
    }
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            listen_port: DEFAULT_LISTEN_PORT,
            simulate: false,
            devices: Vec::new(),
            poller: ActorConfig::default(),
            cache_ttl: Duration::from_millis(DEFAULT_CACHE_TTL_MS),
            respawn_delay_ms: DEFAULT_RESPAWN_DELAY_MS,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FileConfig {
    listen_port: Option<u16>,
    simulate: Option<bool>,
    respawn_delay_ms: Option<u64>,
    poller: Option<FilePollerConfig>,
    cache: Option<FileCacheConfig>,
    devices: Option<Vec<DeviceConfig>>,
}

#[derive(Debug, Deserialize)]
struct FilePollerConfig {
    poll_interval_ms: Option<u64>,
    request_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct FileCacheConfig {
    ttl_ms: Option<u64>,
}

fn load_file_config(config_path: Option<&str>) -> Result<Option<FileConfig>> {
    let path = match config_path {
        Some(path) => path.to_string(),
        None => match env::var("TUYA_CONFIG") {
            Ok(value) => value,
            Err(_) => return Ok(None),
        },
    };

    let content = fs::read_to_string(&path)
        .with_context(|| format!("read config file {path}"))?;
    let ext = Path::new(&path).extension().and_then(|value| value.to_str());

    let config = match ext {
        Some("json") => serde_json::from_str(&content).context("parse json config")?,
        _ => toml::from_str(&content).context("parse toml config")?,
    };

    Ok(Some(config))
}

fn apply_file_config(config: &mut ExporterConfig, file: FileConfig) {
    if let Some(port) = file.listen_port {
        config.listen_port = port;
    }
    if let Some(simulate) = file.simulate {
        config.simulate = simulate;
    }
    if let Some(delay) = file.respawn_delay_ms {
        config.respawn_delay_ms = delay;
    }

    if let Some(poller) = file.poller {
        if let Some(interval_ms) = poller.poll_interval_ms {
            config.poller.poll_interval = Duration::from_millis(interval_ms);
        }
        if let Some(timeout_ms) = poller.request_timeout_ms {
            config.poller.request_timeout = Duration::from_millis(timeout_ms);
        }
    }

    if let Some(cache) = file.cache {
        if let Some(ttl_ms) = cache.ttl_ms {
            config.cache_ttl = Duration::from_millis(ttl_ms);
        }
    }

    if let Some(devices) = file.devices {
        config.devices = devices;
    }
}

fn apply_env_overrides(config: &mut ExporterConfig) {
    if let Some(port) = parse_env_u16("TUYA_PORT") {
        config.listen_port = port;
    }
    if let Some(simulate) = parse_env_bool("TUYA_SIMULATE") {
        config.simulate = simulate;
    }
    if let Some(interval_ms) = parse_env_u64("TUYA_POLL_INTERVAL_MS") {
        config.poller.poll_interval = Duration::from_millis(interval_ms);
    }
    if let Some(timeout_ms) = parse_env_u64("TUYA_REQUEST_TIMEOUT_MS") {
        config.poller.request_timeout = Duration::from_millis(timeout_ms);
    }
    if let Some(ttl_ms) = parse_env_u64("TUYA_CACHE_TTL_MS") {
        config.cache_ttl = Duration::from_millis(ttl_ms);
    }
    if let Some(delay) = parse_env_u64("TUYA_RESPAWN_DELAY_MS") {
        config.respawn_delay_ms = delay;
    }
    if let Ok(value) = env::var("TUYA_DEVICES") {
        config.devices = parse_devices(&value);
    }
}

/// `TUYA_DEVICES` is a comma list of `device_id:address:local_key` triples.
fn parse_devices(value: &str) -> Vec<DeviceConfig> {
    value
        .split(',')
        .filter_map(|entry| {
            let trimmed = entry.trim();
            if trimmed.is_empty() {
                return None;
            }
            let mut parts = trimmed.splitn(3, ':');
            let device_id = parts.next()?.to_string();
            let address = parts.next()?.to_string();
            let local_key = parts.next()?.to_string();
            Some(DeviceConfig {
                device_id,
                address,
                local_key,
            })
        })
        .collect()
}

fn parse_env_u16(key: &str) -> Option<u16> {
    env::var(key).ok().and_then(|value| value.parse().ok())
}

fn parse_env_u64(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|value| value.parse().ok())
}

fn parse_env_bool(key: &str) -> Option<bool> {
    env::var(key).ok().and_then(|value| value.parse().ok())
}
