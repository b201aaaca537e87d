//! Seam between the crate and the VR runtime.
//!
//! Everything the draw, update and input contexts need from the runtime goes
//! through [`TrackingBackend`]. The trait mirrors the shape of the native
//! compositor/system/input interfaces: raw 3x4 row-major matrices, per-index
//! device classes and opaque numeric handles. Conversion into the crate's
//! own types happens elsewhere (see [`crate::pose`]).
//!
//! ```text
//!  draw thread ──wait_get_poses──┐
//!  update thread ──events/models─┼──► TrackingBackend (runtime or mock)
//!  input thread ──action data────┘
//! ```
//!
//! Implementations must be callable from all three threads at once.

pub mod mock;

use serde::{Deserialize, Serialize};

/// Upper bound on device indices reported by the runtime.
pub const MAX_TRACKED_DEVICES: usize = 64;

/// Index of a device slot as reported by the runtime.
pub type DeviceIndex = u32;

// Backend errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    #[error("Application does not have scene focus")]
    NoFocus,

    #[error("Runtime is not initialized")]
    NotInitialized,

    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    #[error("Unknown property requested: {0}")]
    UnknownProperty(String),

    #[error("Runtime call failed: {0}")]
    Runtime(String),
}

/// Row-major 3x4 rigid transform in the runtime's right-handed space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawMatrix34 {
    pub m: [[f32; 4]; 3],
}

impl RawMatrix34 {
    pub const IDENTITY: Self = Self {
        m: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
        ],
    };

    pub fn from_translation(x: f32, y: f32, z: f32) -> Self {
        let mut matrix = Self::IDENTITY;
        matrix.m[0][3] = x;
        matrix.m[1][3] = y;
        matrix.m[2][3] = z;
        matrix
    }
}

impl Default for RawMatrix34 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Tracking quality reported per device.
///
/// `Stale` never comes from the runtime; the pose poller assigns it when
/// focus has been lost for longer than the configured timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TrackingQuality {
    #[default]
    Uninitialized,
    Calibrating,
    CalibratingOutOfRange,
    Valid,
    OutOfRange,
    FallbackRotationOnly,
    Stale,
}

/// One entry of the pose arrays filled by [`TrackingBackend::wait_get_poses`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RawPose {
    pub device_to_absolute: RawMatrix34,
    pub velocity: [f32; 3],
    pub angular_velocity: [f32; 3],
    pub tracking: TrackingQuality,
    pub pose_is_valid: bool,
    pub device_is_connected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeviceClass {
    #[default]
    Invalid,
    Hmd,
    Controller,
    GenericTracker,
    TrackingReference,
    DisplayRedirect,
    /// A class value this crate has no dedicated kind for.
    Other(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ControllerRole {
    #[default]
    Invalid,
    LeftHand,
    RightHand,
    OptOut,
    Treadmill,
    Stylus,
}

impl ControllerRole {
    /// Input source path used to restrict action reads to this hand.
    pub fn input_source_path(self) -> Option<&'static str> {
        match self {
            ControllerRole::LeftHand => Some("/user/hand/left"),
            ControllerRole::RightHand => Some("/user/hand/right"),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TrackingOrigin {
    Seated,
    #[default]
    Standing,
    RawUncalibrated,
}

// Opaque runtime handles. Zero is never handed out by a runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ActionHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ActionSetHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct InputSourceHandle(pub u64);

impl InputSourceHandle {
    /// Unrestricted reads.
    pub const ANY: Self = Self(0);

    pub fn is_any(self) -> bool {
        self.0 == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DigitalActionData {
    pub active: bool,
    pub state: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AnalogActionData {
    pub active: bool,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PoseActionData {
    pub active: bool,
    pub pose: RawPose,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PosePrediction {
    /// Predict this many seconds ahead of now.
    SecondsFromNow(f32),
    /// Predict for the frame the next `wait_get_poses` will target.
    NextFrame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SkeletalTrackingLevel {
    #[default]
    Estimated,
    Partial,
    Full,
}

/// Finger curl (thumb to pinky) and splay between adjacent fingers, 0..=1.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SkeletalSummary {
    pub finger_curl: [f32; 5],
    pub finger_splay: [f32; 4],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AxisType {
    #[default]
    None,
    TrackPad,
    Joystick,
    Trigger,
}

/// Legacy per-controller input snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RawControllerState {
    pub packet_num: u32,
    pub buttons_pressed: u64,
    pub buttons_touched: u64,
    pub axes: [[f32; 2]; 5],
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RawComponentState {
    pub tracking_to_component_local: RawMatrix34,
    pub tracking_to_component_render_model: RawMatrix34,
    pub properties: u32,
    pub scroll_wheel_visible: bool,
}

/// Runtime event as pulled from the event queue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawEvent {
    pub event_type: u32,
    pub device_index: DeviceIndex,
    pub age_seconds: f32,
}

/// Everything the crate needs from a VR runtime.
pub trait TrackingBackend: Send + Sync {
    // Lifecycle
    fn initialize(&self) -> Result<(), BackendError>;
    fn shutdown(&self);
    fn acknowledge_quit(&self);
    fn is_headset_present(&self) -> bool;
    fn runtime_version(&self) -> Option<String>;

    // Compositor
    fn set_tracking_origin(&self, origin: TrackingOrigin);

    /// Blocks until the compositor releases the next frame, then fills both
    /// pose arrays (indexed by device index).
    fn wait_get_poses(
        &self,
        render: &mut [RawPose],
        game: &mut [RawPose],
    ) -> Result<(), BackendError>;

    // System
    fn device_class(&self, index: DeviceIndex) -> DeviceClass;
    fn controller_role(&self, index: DeviceIndex) -> Result<ControllerRole, BackendError>;
    fn render_model_name(&self, index: DeviceIndex) -> Result<String, BackendError>;
    fn poll_next_event(&self) -> Option<RawEvent>;
    fn should_application_pause(&self) -> bool;

    // Render models
    fn component_count(&self, model: &str) -> usize;
    fn component_name(&self, model: &str, component: usize) -> Option<String>;
    fn component_state(
        &self,
        model: &str,
        component: &str,
        source: InputSourceHandle,
    ) -> Option<RawComponentState>;

    // Action input
    fn input_source_handle(&self, path: &str) -> Result<InputSourceHandle, BackendError>;
    fn action_set_handle(&self, path: &str) -> Result<ActionSetHandle, BackendError>;
    fn action_handle(&self, path: &str) -> Result<ActionHandle, BackendError>;
    fn dominant_hand(&self) -> Result<ControllerRole, BackendError>;
    fn update_action_state(&self, sets: &[ActionSetHandle]) -> Result<(), BackendError>;
    fn digital_action_data(
        &self,
        action: ActionHandle,
        restrict: InputSourceHandle,
    ) -> Result<DigitalActionData, BackendError>;
    fn analog_action_data(
        &self,
        action: ActionHandle,
        restrict: InputSourceHandle,
    ) -> Result<AnalogActionData, BackendError>;
    fn pose_action_data(
        &self,
        action: ActionHandle,
        origin: TrackingOrigin,
        prediction: PosePrediction,
        restrict: InputSourceHandle,
    ) -> Result<PoseActionData, BackendError>;
    fn skeletal_tracking_level(
        &self,
        action: ActionHandle,
    ) -> Result<SkeletalTrackingLevel, BackendError>;
    fn skeletal_summary(&self, action: ActionHandle) -> Result<SkeletalSummary, BackendError>;
    fn trigger_haptic_vibration(
        &self,
        action: ActionHandle,
        delay_seconds: f32,
        duration_seconds: f32,
        frequency: f32,
        amplitude: f32,
        restrict: InputSourceHandle,
    ) -> Result<(), BackendError>;

    // Legacy controller input
    fn controller_state(&self, index: DeviceIndex) -> Option<RawControllerState>;
    fn supported_buttons(&self, index: DeviceIndex) -> Result<u64, BackendError>;
    fn axis_type(&self, index: DeviceIndex, axis: usize) -> Result<AxisType, BackendError>;
    fn trigger_haptic_pulse(&self, index: DeviceIndex, axis: u32, duration_micros: u16);
}
