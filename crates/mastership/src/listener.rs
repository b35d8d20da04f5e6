//! Session lifecycle listeners

use fleetlink_common::DeviceId;

/// Downstream observer of a device's master session lifecycle
///
/// Notified from the resolver's control loop; implementations must not
/// block.
pub trait SessionListener: Send + Sync {
    /// The endpoint stopped being master for the device
    fn session_down(&self, device: &DeviceId);

    /// The ownership subscription itself ended; no further notifications
    /// will follow
    fn session_terminated(&self, device: &DeviceId);
}
