use std::collections::HashMap;

use tracing::{debug, info, warn};

use super::{Device, DeviceId, DeviceKind};
use crate::backend::ControllerRole;
use crate::observer::Observers;

/// Canonical set of known devices, owned by the update context.
///
/// Devices are only ever added. Lookups hand out shared references that
/// stay meaningful for the life of the process.
#[derive(Debug)]
pub struct DeviceRegistry {
    devices: Vec<Device>,
    by_id: HashMap<DeviceId, usize>,
    dominant_hand: ControllerRole,
    on_detected: Observers<Device>,
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self {
            devices: Vec::new(),
            by_id: HashMap::new(),
            dominant_hand: ControllerRole::RightHand,
            on_detected: Observers::new(),
        }
    }

    pub(crate) fn insert(&mut self, device: Device) {
        if self.by_id.contains_key(&device.id()) {
            warn!("Device {} was detected twice, keeping the first", device.id());
            return;
        }

        info!("Detected {:?} {}", device.kind(), device.id());
        let slot = self.devices.len();
        self.by_id.insert(device.id(), slot);
        self.devices.push(device);
        self.on_detected.notify(&self.devices[slot]);
    }

    pub(crate) fn device_entry(&mut self, id: DeviceId) -> Option<&mut Device> {
        let slot = *self.by_id.get(&id)?;
        self.devices.get_mut(slot)
    }

    pub(crate) fn set_dominant_hand(&mut self, hand: ControllerRole) {
        debug!("Dominant hand is {:?}", hand);
        self.dominant_hand = hand;
    }

    /// Fires on the update context, once per device.
    pub fn on_device_detected(&mut self, callback: impl FnMut(&Device) + Send + 'static) {
        self.on_detected.subscribe(callback);
    }

    /// Like [`DeviceRegistry::on_device_detected`], but replays every device
    /// already known first.
    pub fn bind_device_detected(&mut self, mut callback: impl FnMut(&Device) + Send + 'static) {
        for device in &self.devices {
            callback(device);
        }
        self.on_detected.subscribe(callback);
    }

    pub fn device(&self, id: DeviceId) -> Option<&Device> {
        self.by_id.get(&id).and_then(|slot| self.devices.get(*slot))
    }

    /// Mutable access for subscribing to a device's observers. State
    /// setters are not reachable from here.
    pub fn device_mut(&mut self, id: DeviceId) -> Option<&mut Device> {
        self.device_entry(id)
    }

    /// All devices in detection order.
    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter()
    }

    pub fn enabled_devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter().filter(|device| device.is_enabled())
    }

    pub fn controllers(&self) -> impl Iterator<Item = &Device> {
        self.devices
            .iter()
            .filter(|device| device.kind() == DeviceKind::Controller)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn headset(&self) -> Option<&Device> {
        self.devices
            .iter()
            .find(|device| device.kind() == DeviceKind::Headset)
    }

    /// Prefers an enabled controller when several share a role.
    pub fn controller_for_role(&self, role: ControllerRole) -> Option<&Device> {
        let mut candidates = self.controllers().filter(|device| device.role() == role);
        let first = candidates.next()?;
        if first.is_enabled() {
            return Some(first);
        }
        candidates.find(|device| device.is_enabled()).or(Some(first))
    }

    pub fn left_hand(&self) -> Option<&Device> {
        self.controller_for_role(ControllerRole::LeftHand)
    }

    pub fn right_hand(&self) -> Option<&Device> {
        self.controller_for_role(ControllerRole::RightHand)
    }

    pub fn dominant_hand(&self) -> ControllerRole {
        self.dominant_hand
    }

    /// The enabled controller in the dominant hand, else any enabled one.
    pub fn dominant_controller(&self) -> Option<&Device> {
        self.controllers()
            .find(|device| device.is_enabled() && device.role() == self.dominant_hand)
            .or_else(|| self.controllers().find(|device| device.is_enabled()))
    }

    /// First enabled controller that is not the dominant one.
    pub fn secondary_controller(&self) -> Option<&Device> {
        let dominant = self.dominant_controller().map(Device::id);
        self.controllers()
            .find(|device| device.is_enabled() && Some(device.id()) != dominant)
    }
}
