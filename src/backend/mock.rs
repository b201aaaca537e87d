//! Scriptable in-process runtime.
//!
//! `MockBackend` keeps a full picture of a fake VR system behind a mutex.
//! Tests and the demo binary mutate it through plain setters while the
//! contexts read it through [`TrackingBackend`]. Handles are handed out
//! per path on first request, starting at 1.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::{
    ActionHandle, ActionSetHandle, AnalogActionData, AxisType, BackendError, ControllerRole,
    DeviceClass, DeviceIndex, DigitalActionData, InputSourceHandle, PoseActionData,
    PosePrediction, RawComponentState, RawControllerState, RawEvent, RawMatrix34, RawPose,
    SkeletalSummary, SkeletalTrackingLevel, TrackingBackend, TrackingOrigin, TrackingQuality,
    MAX_TRACKED_DEVICES,
};

#[derive(Debug, Clone, Default)]
struct MockDevice {
    class: DeviceClass,
    role: ControllerRole,
    connected: bool,
    pose_valid: bool,
    matrix: RawMatrix34,
    velocity: [f32; 3],
    angular_velocity: [f32; 3],
    // Predicted game pose. Mirrors the render pose when unset.
    game: Option<(RawMatrix34, [f32; 3], [f32; 3])>,
    tracking: TrackingQuality,
    render_model: Option<String>,
    controller_state: Option<RawControllerState>,
    supported_buttons: u64,
    axis_types: [AxisType; 5],
}

/// A haptic vibration recorded by the mock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordedVibration {
    pub action: ActionHandle,
    pub restrict: InputSourceHandle,
    pub duration_seconds: f32,
    pub frequency: f32,
    pub amplitude: f32,
}

#[derive(Debug)]
struct MockState {
    init_error: Option<BackendError>,
    initialized: bool,
    headset_present: bool,
    runtime_version: Option<String>,
    devices: Vec<MockDevice>,
    pose_error: Option<BackendError>,
    frame_time: Option<Duration>,
    wait_calls: u64,
    origin_changes: Vec<TrackingOrigin>,
    events: VecDeque<RawEvent>,
    should_pause: bool,
    models: HashMap<String, Vec<String>>,
    component_states: HashMap<(String, String, InputSourceHandle), RawComponentState>,
    handles: HashMap<String, u64>,
    next_handle: u64,
    failing_paths: HashSet<String>,
    dominant_hand: Result<ControllerRole, BackendError>,
    action_state_error: Option<BackendError>,
    action_state_updates: u64,
    digital: HashMap<(ActionHandle, InputSourceHandle), DigitalActionData>,
    analog: HashMap<(ActionHandle, InputSourceHandle), AnalogActionData>,
    poses: HashMap<(ActionHandle, InputSourceHandle), PoseActionData>,
    skeletons: HashMap<ActionHandle, (SkeletalTrackingLevel, SkeletalSummary)>,
    vibrations: Vec<RecordedVibration>,
    haptic_pulses: Vec<(DeviceIndex, u32, u16)>,
    quit_acknowledgements: u32,
    shutdown_calls: u32,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            init_error: None,
            initialized: false,
            headset_present: true,
            runtime_version: Some("mock-1.0".to_string()),
            devices: vec![MockDevice::default(); MAX_TRACKED_DEVICES],
            pose_error: None,
            frame_time: None,
            wait_calls: 0,
            origin_changes: Vec::new(),
            events: VecDeque::new(),
            should_pause: false,
            models: HashMap::new(),
            component_states: HashMap::new(),
            handles: HashMap::new(),
            next_handle: 1,
            failing_paths: HashSet::new(),
            dominant_hand: Ok(ControllerRole::RightHand),
            action_state_error: None,
            action_state_updates: 0,
            digital: HashMap::new(),
            analog: HashMap::new(),
            poses: HashMap::new(),
            skeletons: HashMap::new(),
            vibrations: Vec::new(),
            haptic_pulses: Vec::new(),
            quit_acknowledgements: 0,
            shutdown_calls: 0,
        }
    }
}

impl MockState {
    fn handle(&mut self, path: &str) -> Result<u64, BackendError> {
        if self.failing_paths.contains(path) {
            return Err(BackendError::InvalidHandle(path.to_string()));
        }
        if let Some(handle) = self.handles.get(path) {
            return Ok(*handle);
        }
        let handle = self.next_handle;
        self.next_handle += 1;
        self.handles.insert(path.to_string(), handle);
        Ok(handle)
    }

    fn source(&mut self, path: Option<&str>) -> InputSourceHandle {
        match path {
            Some(path) => InputSourceHandle(self.handle(path).unwrap_or(0)),
            None => InputSourceHandle::ANY,
        }
    }

    fn device(&self, index: DeviceIndex) -> Option<&MockDevice> {
        self.devices.get(index as usize)
    }

    fn device_mut(&mut self, index: DeviceIndex) -> Option<&mut MockDevice> {
        self.devices.get_mut(index as usize)
    }
}

#[derive(Debug, Default)]
pub struct MockBackend {
    state: Mutex<MockState>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A headset, two hand controllers and a base station, all connected.
    pub fn demo() -> Self {
        let backend = Self::new();
        backend.add_device(0, DeviceClass::Hmd);
        backend.add_device(1, DeviceClass::Controller);
        backend.add_device(2, DeviceClass::Controller);
        backend.add_device(3, DeviceClass::TrackingReference);
        backend.set_role(1, ControllerRole::LeftHand);
        backend.set_role(2, ControllerRole::RightHand);

        backend.set_pose(0, RawMatrix34::from_translation(0.0, 1.7, 0.0));
        backend.set_pose(1, RawMatrix34::from_translation(-0.2, 1.1, -0.3));
        backend.set_pose(2, RawMatrix34::from_translation(0.2, 1.1, -0.3));
        backend.set_pose(3, RawMatrix34::from_translation(2.0, 2.2, 2.0));

        let components = vec!["base".to_string(), "trigger".to_string(), "tip".to_string()];
        backend.add_render_model("{indexcontroller}valve_controller_knu_1_0_left", components.clone());
        backend.add_render_model("{indexcontroller}valve_controller_knu_1_0_right", components);
        backend.set_render_model(1, "{indexcontroller}valve_controller_knu_1_0_left");
        backend.set_render_model(2, "{indexcontroller}valve_controller_knu_1_0_right");

        for index in 0..4 {
            backend.set_connected(index, true);
            backend.set_tracking(index, TrackingQuality::Valid);
        }
        backend.set_frame_time(Some(Duration::from_millis(11)));
        backend
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn with_device(&self, index: DeviceIndex, f: impl FnOnce(&mut MockDevice)) {
        if let Some(device) = self.state().device_mut(index) {
            f(device);
        }
    }

    pub fn set_init_error(&self, error: Option<BackendError>) {
        self.state().init_error = error;
    }

    pub fn set_headset_present(&self, present: bool) {
        self.state().headset_present = present;
    }

    pub fn add_device(&self, index: DeviceIndex, class: DeviceClass) {
        self.with_device(index, |device| {
            device.class = class;
            device.pose_valid = true;
        });
    }

    pub fn set_role(&self, index: DeviceIndex, role: ControllerRole) {
        self.with_device(index, |device| device.role = role);
    }

    pub fn set_connected(&self, index: DeviceIndex, connected: bool) {
        self.with_device(index, |device| device.connected = connected);
    }

    pub fn set_pose(&self, index: DeviceIndex, matrix: RawMatrix34) {
        self.with_device(index, |device| device.matrix = matrix);
    }

    pub fn set_pose_valid(&self, index: DeviceIndex, valid: bool) {
        self.with_device(index, |device| device.pose_valid = valid);
    }

    pub fn set_velocity(&self, index: DeviceIndex, velocity: [f32; 3], angular: [f32; 3]) {
        self.with_device(index, |device| {
            device.velocity = velocity;
            device.angular_velocity = angular;
        });
    }

    /// Scripts a game pose that differs from the render pose.
    pub fn set_game_pose(
        &self,
        index: DeviceIndex,
        matrix: RawMatrix34,
        velocity: [f32; 3],
        angular: [f32; 3],
    ) {
        self.with_device(index, |device| device.game = Some((matrix, velocity, angular)));
    }

    pub fn set_tracking(&self, index: DeviceIndex, tracking: TrackingQuality) {
        self.with_device(index, |device| device.tracking = tracking);
    }

    pub fn set_render_model(&self, index: DeviceIndex, model: &str) {
        let model = model.to_string();
        self.with_device(index, |device| device.render_model = Some(model));
    }

    pub fn add_render_model(&self, model: &str, components: Vec<String>) {
        self.state().models.insert(model.to_string(), components);
    }

    pub fn set_component_state(
        &self,
        model: &str,
        component: &str,
        source: Option<&str>,
        state: RawComponentState,
    ) {
        let mut guard = self.state();
        let source = guard.source(source);
        guard
            .component_states
            .insert((model.to_string(), component.to_string(), source), state);
    }

    pub fn set_pose_error(&self, error: Option<BackendError>) {
        self.state().pose_error = error;
    }

    pub fn set_frame_time(&self, frame_time: Option<Duration>) {
        self.state().frame_time = frame_time;
    }

    pub fn push_event(&self, event: RawEvent) {
        self.state().events.push_back(event);
    }

    pub fn set_should_pause(&self, pause: bool) {
        self.state().should_pause = pause;
    }

    pub fn set_dominant_hand(&self, hand: Result<ControllerRole, BackendError>) {
        self.state().dominant_hand = hand;
    }

    /// Every later lookup of `path` fails with `InvalidHandle`.
    pub fn fail_path(&self, path: &str) {
        self.state().failing_paths.insert(path.to_string());
    }

    pub fn set_action_state_error(&self, error: Option<BackendError>) {
        self.state().action_state_error = error;
    }

    pub fn set_digital(&self, action: &str, source: Option<&str>, state: bool) {
        let mut guard = self.state();
        let Ok(handle) = guard.handle(action) else {
            return;
        };
        let source = guard.source(source);
        guard
            .digital
            .insert((ActionHandle(handle), source), DigitalActionData { active: true, state });
    }

    pub fn set_analog(&self, action: &str, source: Option<&str>, x: f32, y: f32, z: f32) {
        let mut guard = self.state();
        let Ok(handle) = guard.handle(action) else {
            return;
        };
        let source = guard.source(source);
        guard.analog.insert(
            (ActionHandle(handle), source),
            AnalogActionData {
                active: true,
                x,
                y,
                z,
            },
        );
    }

    pub fn set_pose_action(&self, action: &str, source: Option<&str>, pose: RawPose) {
        let mut guard = self.state();
        let Ok(handle) = guard.handle(action) else {
            return;
        };
        let source = guard.source(source);
        guard
            .poses
            .insert((ActionHandle(handle), source), PoseActionData { active: true, pose });
    }

    pub fn set_skeleton(
        &self,
        action: &str,
        level: SkeletalTrackingLevel,
        summary: SkeletalSummary,
    ) {
        let mut guard = self.state();
        let Ok(handle) = guard.handle(action) else {
            return;
        };
        guard.skeletons.insert(ActionHandle(handle), (level, summary));
    }

    pub fn set_controller_state(&self, index: DeviceIndex, state: RawControllerState) {
        self.with_device(index, |device| device.controller_state = Some(state));
    }

    pub fn set_supported_buttons(&self, index: DeviceIndex, mask: u64) {
        self.with_device(index, |device| device.supported_buttons = mask);
    }

    pub fn set_axis_type(&self, index: DeviceIndex, axis: usize, axis_type: AxisType) {
        self.with_device(index, |device| {
            if let Some(slot) = device.axis_types.get_mut(axis) {
                *slot = axis_type;
            }
        });
    }

    pub fn wait_calls(&self) -> u64 {
        self.state().wait_calls
    }

    pub fn origin_changes(&self) -> Vec<TrackingOrigin> {
        self.state().origin_changes.clone()
    }

    pub fn action_state_updates(&self) -> u64 {
        self.state().action_state_updates
    }

    pub fn vibrations(&self) -> Vec<RecordedVibration> {
        self.state().vibrations.clone()
    }

    pub fn haptic_pulses(&self) -> Vec<(DeviceIndex, u32, u16)> {
        self.state().haptic_pulses.clone()
    }

    pub fn quit_acknowledgements(&self) -> u32 {
        self.state().quit_acknowledgements
    }

    pub fn shutdown_calls(&self) -> u32 {
        self.state().shutdown_calls
    }

    pub fn is_initialized(&self) -> bool {
        self.state().initialized
    }
}

impl TrackingBackend for MockBackend {
    fn initialize(&self) -> Result<(), BackendError> {
        let mut state = self.state();
        if let Some(error) = state.init_error.clone() {
            return Err(error);
        }
        state.initialized = true;
        Ok(())
    }

    fn shutdown(&self) {
        let mut state = self.state();
        state.shutdown_calls += 1;
        state.initialized = false;
    }

    fn acknowledge_quit(&self) {
        self.state().quit_acknowledgements += 1;
    }

    fn is_headset_present(&self) -> bool {
        self.state().headset_present
    }

    fn runtime_version(&self) -> Option<String> {
        self.state().runtime_version.clone()
    }

    fn set_tracking_origin(&self, origin: TrackingOrigin) {
        self.state().origin_changes.push(origin);
    }

    fn wait_get_poses(
        &self,
        render: &mut [RawPose],
        game: &mut [RawPose],
    ) -> Result<(), BackendError> {
        let frame_time = {
            let mut state = self.state();
            state.wait_calls += 1;
            if let Some(error) = state.pose_error.clone() {
                return Err(error);
            }
            for (index, device) in state.devices.iter().enumerate() {
                let pose = RawPose {
                    device_to_absolute: device.matrix,
                    velocity: device.velocity,
                    angular_velocity: device.angular_velocity,
                    tracking: device.tracking,
                    pose_is_valid: device.pose_valid && device.connected,
                    device_is_connected: device.connected,
                };
                if let Some(slot) = render.get_mut(index) {
                    *slot = pose;
                }
                if let Some(slot) = game.get_mut(index) {
                    *slot = match device.game {
                        Some((matrix, velocity, angular_velocity)) => RawPose {
                            device_to_absolute: matrix,
                            velocity,
                            angular_velocity,
                            ..pose
                        },
                        None => pose,
                    };
                }
            }
            state.frame_time
        };
        if let Some(frame_time) = frame_time {
            std::thread::sleep(frame_time);
        }
        Ok(())
    }

    fn device_class(&self, index: DeviceIndex) -> DeviceClass {
        self.state()
            .device(index)
            .map(|device| device.class)
            .unwrap_or_default()
    }

    fn controller_role(&self, index: DeviceIndex) -> Result<ControllerRole, BackendError> {
        self.state()
            .device(index)
            .map(|device| device.role)
            .ok_or_else(|| BackendError::InvalidHandle(format!("device {index}")))
    }

    fn render_model_name(&self, index: DeviceIndex) -> Result<String, BackendError> {
        self.state()
            .device(index)
            .and_then(|device| device.render_model.clone())
            .ok_or_else(|| BackendError::UnknownProperty("RenderModelName".to_string()))
    }

    fn poll_next_event(&self) -> Option<RawEvent> {
        self.state().events.pop_front()
    }

    fn should_application_pause(&self) -> bool {
        self.state().should_pause
    }

    fn component_count(&self, model: &str) -> usize {
        self.state().models.get(model).map_or(0, Vec::len)
    }

    fn component_name(&self, model: &str, component: usize) -> Option<String> {
        self.state()
            .models
            .get(model)
            .and_then(|components| components.get(component).cloned())
    }

    fn component_state(
        &self,
        model: &str,
        component: &str,
        source: InputSourceHandle,
    ) -> Option<RawComponentState> {
        self.state()
            .component_states
            .get(&(model.to_string(), component.to_string(), source))
            .copied()
    }

    fn input_source_handle(&self, path: &str) -> Result<InputSourceHandle, BackendError> {
        self.state().handle(path).map(InputSourceHandle)
    }

    fn action_set_handle(&self, path: &str) -> Result<ActionSetHandle, BackendError> {
        self.state().handle(path).map(ActionSetHandle)
    }

    fn action_handle(&self, path: &str) -> Result<ActionHandle, BackendError> {
        self.state().handle(path).map(ActionHandle)
    }

    fn dominant_hand(&self) -> Result<ControllerRole, BackendError> {
        self.state().dominant_hand.clone()
    }

    fn update_action_state(&self, _sets: &[ActionSetHandle]) -> Result<(), BackendError> {
        let mut state = self.state();
        if let Some(error) = state.action_state_error.clone() {
            return Err(error);
        }
        state.action_state_updates += 1;
        Ok(())
    }

    fn digital_action_data(
        &self,
        action: ActionHandle,
        restrict: InputSourceHandle,
    ) -> Result<DigitalActionData, BackendError> {
        Ok(self
            .state()
            .digital
            .get(&(action, restrict))
            .copied()
            .unwrap_or_default())
    }

    fn analog_action_data(
        &self,
        action: ActionHandle,
        restrict: InputSourceHandle,
    ) -> Result<AnalogActionData, BackendError> {
        Ok(self
            .state()
            .analog
            .get(&(action, restrict))
            .copied()
            .unwrap_or_default())
    }

    fn pose_action_data(
        &self,
        action: ActionHandle,
        _origin: TrackingOrigin,
        _prediction: PosePrediction,
        restrict: InputSourceHandle,
    ) -> Result<PoseActionData, BackendError> {
        Ok(self
            .state()
            .poses
            .get(&(action, restrict))
            .copied()
            .unwrap_or_default())
    }

    fn skeletal_tracking_level(
        &self,
        action: ActionHandle,
    ) -> Result<SkeletalTrackingLevel, BackendError> {
        self.state()
            .skeletons
            .get(&action)
            .map(|(level, _)| *level)
            .ok_or_else(|| BackendError::InvalidHandle(format!("action {}", action.0)))
    }

    fn skeletal_summary(&self, action: ActionHandle) -> Result<SkeletalSummary, BackendError> {
        self.state()
            .skeletons
            .get(&action)
            .map(|(_, summary)| *summary)
            .ok_or_else(|| BackendError::InvalidHandle(format!("action {}", action.0)))
    }

    fn trigger_haptic_vibration(
        &self,
        action: ActionHandle,
        _delay_seconds: f32,
        duration_seconds: f32,
        frequency: f32,
        amplitude: f32,
        restrict: InputSourceHandle,
    ) -> Result<(), BackendError> {
        self.state().vibrations.push(RecordedVibration {
            action,
            restrict,
            duration_seconds,
            frequency,
            amplitude,
        });
        Ok(())
    }

    fn controller_state(&self, index: DeviceIndex) -> Option<RawControllerState> {
        self.state()
            .device(index)
            .and_then(|device| device.controller_state)
    }

    fn supported_buttons(&self, index: DeviceIndex) -> Result<u64, BackendError> {
        self.state()
            .device(index)
            .map(|device| device.supported_buttons)
            .ok_or_else(|| BackendError::UnknownProperty("SupportedButtons".to_string()))
    }

    fn axis_type(&self, index: DeviceIndex, axis: usize) -> Result<AxisType, BackendError> {
        self.state()
            .device(index)
            .and_then(|device| device.axis_types.get(axis).copied())
            .ok_or_else(|| BackendError::UnknownProperty(format!("Axis{axis}Type")))
    }

    fn trigger_haptic_pulse(&self, index: DeviceIndex, axis: u32, duration_micros: u16) {
        self.state().haptic_pulses.push((index, axis, duration_micros));
    }
}
