//! Latest-reading store shared between pollers and the export path.

use std::collections::BTreeMap;
use std::sync::RwLock;

use types::DeviceReading;

/// Concurrent map device_id -> latest reading.
///
/// One entry per configured device for the process lifetime, pre-filled
/// with the missing sentinel. Each poller writes only its own entry; the
/// export path reads a snapshot of all of them. A reading is replaced
/// wholesale under the lock, so readers never observe a torn record.
#[derive(Debug, Default)]
pub struct ReadingStore {
    readings: RwLock<BTreeMap<String, DeviceReading>>,
}

impl ReadingStore {
    pub fn new<I>(device_ids: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let readings = device_ids
            .into_iter()
            .map(|id| (id.into(), DeviceReading::missing()))
            .collect();
        Self {
            readings: RwLock::new(readings),
        }
    }

    /// Replace the entry for `device_id` with `reading`.
    pub fn set(&self, device_id: &str, reading: DeviceReading) {
        let mut readings = self
            .readings
            .write()
            .unwrap_or_else(|err| err.into_inner());
        readings.insert(device_id.to_string(), reading);
    }

    /// Copy of every entry, ordered by device id.
    pub fn snapshot(&self) -> Vec<(String, DeviceReading)> {
        let readings = self
            .readings
            .read()
            .unwrap_or_else(|err| err.into_inner());
        readings
            .iter()
            .map(|(id, reading)| (id.clone(), *reading))
            .collect()
    }

    pub fn get(&self, device_id: &str) -> Option<DeviceReading> {
        let readings = self
            .readings
            .read()
            .unwrap_or_else(|err| err.into_inner());
        readings.get(device_id).copied()
    }

    pub fn len(&self) -> usize {
        let readings = self
            .readings
            .read()
            .unwrap_or_else(|err| err.into_inner());
        readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
