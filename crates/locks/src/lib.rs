//! Device lock registry
//!
//! Process-wide set of devices reserved for in-flight multi-device batches.
//! Reservations are advisory and independent of per-device transaction
//! state: they coordinate batches issued within this process, they do not
//! replace the coordinator's single-open-transaction rule.
//!
//! All operations are synchronous try-lock style: they either take effect
//! immediately or fail, they never wait.

use fleetlink_common::DeviceId;
use parking_lot::Mutex;
use std::collections::HashSet;
use thiserror::Error;

/// A batch lock request overlapped devices already reserved
///
/// Nothing was locked as a side effect of the failed request.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Devices already reserved: {devices:?}")]
pub struct LockConflict {
    /// The overlapping devices, sorted for determinism
    pub devices: Vec<DeviceId>,
}

/// Registry of devices reserved for multi-device batches
#[derive(Debug)]
pub struct DeviceLockRegistry {
    /// Currently reserved devices
    locked: Mutex<HashSet<DeviceId>>,
}

impl DeviceLockRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            locked: Mutex::new(HashSet::new()),
        }
    }

    /// Reserve every device in `devices`, or none of them
    ///
    /// Fails with the overlap if any requested device is already reserved;
    /// on failure the registry is unchanged. Requesting the same device
    /// twice in one call is allowed and reserves it once.
    pub fn lock_devices(&self, devices: &[DeviceId]) -> Result<(), LockConflict> {
        let mut locked = self.locked.lock();

        let mut conflicts: Vec<DeviceId> = devices
            .iter()
            .filter(|d| locked.contains(*d))
            .cloned()
            .collect();

        if !conflicts.is_empty() {
            conflicts.sort();
            conflicts.dedup();
            return Err(LockConflict { devices: conflicts });
        }

        for device in devices {
            locked.insert(device.clone());
        }
        Ok(())
    }

    /// Release every device in `devices`
    ///
    /// Idempotent: releasing a device that is not reserved is not an error.
    pub fn release_devices(&self, devices: &[DeviceId]) {
        let mut locked = self.locked.lock();
        for device in devices {
            locked.remove(device);
        }
    }

    /// Whether a device is currently reserved
    pub fn is_device_locked(&self, device: &DeviceId) -> bool {
        self.locked.lock().contains(device)
    }
}

impl Default for DeviceLockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn devices(ids: &[&str]) -> Vec<DeviceId> {
        ids.iter().map(|id| DeviceId::new(*id)).collect()
    }

    #[test]
    fn test_batch_lock_is_all_or_nothing() {
        let registry = DeviceLockRegistry::new();

        registry.lock_devices(&devices(&["a", "b", "c"])).unwrap();

        let err = registry
            .lock_devices(&devices(&["c", "d"]))
            .unwrap_err();
        assert_eq!(err.devices, devices(&["c"]));

        // The non-overlapping device must not have been reserved
        assert!(!registry.is_device_locked(&DeviceId::new("d")));
        assert!(registry.is_device_locked(&DeviceId::new("c")));
    }

    #[test]
    fn test_release_then_relock() {
        let registry = DeviceLockRegistry::new();
        let set = devices(&["a", "b"]);

        registry.lock_devices(&set).unwrap();
        registry.release_devices(&set);
        registry.lock_devices(&set).unwrap();
    }

    #[test]
    fn test_release_is_idempotent() {
        let registry = DeviceLockRegistry::new();

        registry.release_devices(&devices(&["ghost"]));
        registry.lock_devices(&devices(&["ghost"])).unwrap();
        registry.release_devices(&devices(&["ghost"]));
        registry.release_devices(&devices(&["ghost"]));
        assert!(!registry.is_device_locked(&DeviceId::new("ghost")));
    }

    #[test]
    fn test_conflict_reports_full_overlap_sorted() {
        let registry = DeviceLockRegistry::new();
        registry.lock_devices(&devices(&["b", "d"])).unwrap();

        let err = registry
            .lock_devices(&devices(&["d", "a", "b"]))
            .unwrap_err();
        assert_eq!(err.devices, devices(&["b", "d"]));
    }

    #[test]
    fn test_disjoint_batches_coexist() {
        let registry = DeviceLockRegistry::new();
        registry.lock_devices(&devices(&["a", "b"])).unwrap();
        registry.lock_devices(&devices(&["c", "d"])).unwrap();

        for id in ["a", "b", "c", "d"] {
            assert!(registry.is_device_locked(&DeviceId::new(id)));
        }
    }
}
