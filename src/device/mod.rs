//! Tracked devices.
//!
//! A [`Device`] is created by the pose poller on the draw thread the first
//! time a backend index reports a valid class, then moved into the
//! [`registry::DeviceRegistry`] on the update thread. Its public surface is
//! read-only. Every mutation goes through the [`DeviceOwner`] returned
//! alongside it, and owners only ever run inside update-queue commands.
//!
//! ```text
//!  Undiscovered ──first sighting──► Tracked(disabled) ◄──connected──► Tracked(enabled)
//! ```
//!
//! Nothing ever returns a device to `Undiscovered`.

pub mod registry;

use glam::{Quat, Vec3};

use crate::backend::{ControllerRole, DeviceClass, DeviceIndex, InputSourceHandle, TrackingQuality};
use crate::observer::Observers;
use crate::pose::Pose;

use self::registry::DeviceRegistry;

/// Stable identity assigned by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub DeviceIndex);

impl DeviceId {
    pub fn index(self) -> DeviceIndex {
        self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Headset,
    Controller,
    Tracker,
    TrackingReference,
    DisplayRedirect,
    Generic,
}

impl DeviceKind {
    /// `None` for slots the backend reports as invalid.
    pub fn from_class(class: DeviceClass) -> Option<Self> {
        match class {
            DeviceClass::Invalid => None,
            DeviceClass::Hmd => Some(DeviceKind::Headset),
            DeviceClass::Controller => Some(DeviceKind::Controller),
            DeviceClass::GenericTracker => Some(DeviceKind::Tracker),
            DeviceClass::TrackingReference => Some(DeviceKind::TrackingReference),
            DeviceClass::DisplayRedirect => Some(DeviceKind::DisplayRedirect),
            DeviceClass::Other(_) => Some(DeviceKind::Generic),
        }
    }
}

/// Extra identity for controllers, fixed at detection time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerDetails {
    pub role: ControllerRole,
    pub input_source: InputSourceHandle,
}

#[derive(Debug)]
pub struct Device {
    id: DeviceId,
    kind: DeviceKind,
    controller: Option<ControllerDetails>,
    enabled: bool,
    tracking: TrackingQuality,
    render_pose: Pose,
    game_pose: Pose,

    // Fired on the update context
    on_enabled: Observers<Device>,
    on_disabled: Observers<Device>,
    on_tracking_changed: Observers<TrackingQuality>,
}

impl Device {
    pub(crate) fn new(
        id: DeviceId,
        kind: DeviceKind,
        controller: Option<ControllerDetails>,
    ) -> (Device, DeviceOwner) {
        let device = Device {
            id,
            kind,
            controller,
            enabled: false,
            tracking: TrackingQuality::Uninitialized,
            render_pose: Pose::default(),
            game_pose: Pose::default(),
            on_enabled: Observers::new(),
            on_disabled: Observers::new(),
            on_tracking_changed: Observers::new(),
        };
        (device, DeviceOwner { id })
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub fn controller(&self) -> Option<&ControllerDetails> {
        self.controller.as_ref()
    }

    pub fn role(&self) -> ControllerRole {
        self.controller
            .map(|details| details.role)
            .unwrap_or_default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn tracking_quality(&self) -> TrackingQuality {
        self.tracking
    }

    /// Game pose: predicted for gameplay and input logic.
    pub fn pose(&self) -> &Pose {
        &self.game_pose
    }

    /// Render pose: captured for placing visuals this frame.
    pub fn render_pose(&self) -> &Pose {
        &self.render_pose
    }

    pub fn position(&self) -> Vec3 {
        self.game_pose.position
    }

    pub fn rotation(&self) -> Quat {
        self.game_pose.rotation
    }

    pub fn velocity(&self) -> Vec3 {
        self.game_pose.velocity
    }

    pub fn angular_velocity(&self) -> Vec3 {
        self.game_pose.angular_velocity
    }

    pub fn render_position(&self) -> Vec3 {
        self.render_pose.position
    }

    pub fn render_rotation(&self) -> Quat {
        self.render_pose.rotation
    }

    pub fn on_enabled(&mut self, callback: impl FnMut(&Device) + Send + 'static) {
        self.on_enabled.subscribe(callback);
    }

    /// Like [`Device::on_enabled`], but also runs right away if the device is
    /// already enabled.
    pub fn bind_enabled(&mut self, mut callback: impl FnMut(&Device) + Send + 'static) {
        if self.enabled {
            callback(self);
        }
        self.on_enabled.subscribe(callback);
    }

    pub fn on_disabled(&mut self, callback: impl FnMut(&Device) + Send + 'static) {
        self.on_disabled.subscribe(callback);
    }

    pub fn on_tracking_changed(&mut self, callback: impl FnMut(&TrackingQuality) + Send + 'static) {
        self.on_tracking_changed.subscribe(callback);
    }

    fn set_enabled(&mut self, enabled: bool) {
        if self.enabled == enabled {
            return;
        }
        self.enabled = enabled;
        // Observers need `&Device` while the list itself is borrowed mutably
        let slot = if enabled {
            &mut self.on_enabled
        } else {
            &mut self.on_disabled
        };
        let mut observers = std::mem::take(slot);
        observers.notify(self);
        if enabled {
            self.on_enabled = observers;
        } else {
            self.on_disabled = observers;
        }
    }

    fn set_tracking(&mut self, tracking: TrackingQuality) {
        if self.tracking == tracking {
            return;
        }
        self.tracking = tracking;
        self.on_tracking_changed.notify(&tracking);
    }
}

/// The only way to mutate a [`Device`].
///
/// Owners are handed out with the device and held by the pose poller. They
/// act on the registry, so they can only be used where the registry is
/// reachable: inside commands drained on the update context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceOwner {
    id: DeviceId,
}

impl DeviceOwner {
    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn set_enabled(&self, registry: &mut DeviceRegistry, enabled: bool) {
        if let Some(device) = registry.device_entry(self.id) {
            device.set_enabled(enabled);
        }
    }

    pub fn set_poses(&self, registry: &mut DeviceRegistry, render: Pose, game: Pose) {
        if let Some(device) = registry.device_entry(self.id) {
            device.render_pose = render;
            device.game_pose = game;
        }
    }

    pub fn set_tracking_quality(&self, registry: &mut DeviceRegistry, tracking: TrackingQuality) {
        if let Some(device) = registry.device_entry(self.id) {
            device.set_tracking(tracking);
        }
    }
}
