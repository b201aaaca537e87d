//! Typed action objects.
//!
//! An [`Action`] carries the backend handle for one manifest path plus a
//! per-kind cached state. Input actions re-read their value on
//! [`Action::update`], but only when the backend marks the read active.
//! A restricted copy is a separate `Action` scoped to one physical
//! controller; building one never touches the unrestricted action.

use glam::{Vec2, Vec3};
use tracing::debug;

use super::manifest::{ActionDecl, ActionKind};
use super::value::InputValue;
use crate::backend::{
    ActionHandle, BackendError, ControllerRole, InputSourceHandle, PosePrediction,
    SkeletalSummary, SkeletalTrackingLevel, TrackingBackend, TrackingOrigin,
};
use crate::pose::Pose;

/// Per-kind state of an action.
#[derive(Debug)]
pub enum ActionState {
    Boolean(InputValue<bool>),
    Scalar(InputValue<f32>),
    Vector2(InputValue<Vec2>),
    Vector3(InputValue<Vec3>),
    /// Poses are fetched on demand with an explicit prediction.
    Pose,
    Skeleton {
        hand: ControllerRole,
        tracking_level: SkeletalTrackingLevel,
    },
    Haptic,
}

impl ActionState {
    fn for_kind(kind: ActionKind) -> Self {
        match kind {
            ActionKind::Boolean => ActionState::Boolean(InputValue::default()),
            ActionKind::Scalar => ActionState::Scalar(InputValue::default()),
            ActionKind::Vector2 => ActionState::Vector2(InputValue::default()),
            ActionKind::Vector3 => ActionState::Vector3(InputValue::default()),
            ActionKind::Pose => ActionState::Pose,
            ActionKind::LeftHandSkeleton => ActionState::Skeleton {
                hand: ControllerRole::LeftHand,
                tracking_level: SkeletalTrackingLevel::default(),
            },
            ActionKind::RightHandSkeleton => ActionState::Skeleton {
                hand: ControllerRole::RightHand,
                tracking_level: SkeletalTrackingLevel::default(),
            },
            ActionKind::Vibration => ActionState::Haptic,
        }
    }

    fn snapshot(&self) -> Self {
        match self {
            ActionState::Boolean(value) => ActionState::Boolean(value.snapshot()),
            ActionState::Scalar(value) => ActionState::Scalar(value.snapshot()),
            ActionState::Vector2(value) => ActionState::Vector2(value.snapshot()),
            ActionState::Vector3(value) => ActionState::Vector3(value.snapshot()),
            ActionState::Pose => ActionState::Pose,
            ActionState::Skeleton {
                hand,
                tracking_level,
            } => ActionState::Skeleton {
                hand: *hand,
                tracking_level: *tracking_level,
            },
            ActionState::Haptic => ActionState::Haptic,
        }
    }
}

/// Haptic burst parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vibration {
    pub delay_seconds: f32,
    pub duration_seconds: f32,
    pub frequency: f32,
    pub amplitude: f32,
}

impl Default for Vibration {
    fn default() -> Self {
        Self {
            delay_seconds: 0.0,
            duration_seconds: 0.1,
            frequency: 160.0,
            amplitude: 1.0,
        }
    }
}

#[derive(Debug)]
pub struct Action {
    name: String,
    path: String,
    kind: ActionKind,
    handle: ActionHandle,
    restriction: InputSourceHandle,
    state: ActionState,
}

impl Action {
    pub(crate) fn new(decl: &ActionDecl, handle: ActionHandle) -> Self {
        Self {
            name: decl.name.clone(),
            path: decl.path(),
            kind: decl.kind,
            handle,
            restriction: InputSourceHandle::ANY,
            state: ActionState::for_kind(decl.kind),
        }
    }

    /// A copy scoped to `source`, starting from this action's current value.
    ///
    /// The copy has no observers of its own yet.
    pub fn restricted_to(&self, source: InputSourceHandle) -> Action {
        Action {
            name: self.name.clone(),
            path: self.path.clone(),
            kind: self.kind,
            handle: self.handle,
            restriction: source,
            state: self.state.snapshot(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn handle(&self) -> ActionHandle {
        self.handle
    }

    pub fn restriction(&self) -> Option<InputSourceHandle> {
        (!self.restriction.is_any()).then_some(self.restriction)
    }

    pub fn state(&self) -> &ActionState {
        &self.state
    }

    /// Re-reads the cached value. Inactive or failed reads leave it as is.
    pub fn update(&mut self, backend: &dyn TrackingBackend) {
        let result = match &mut self.state {
            ActionState::Boolean(value) => backend
                .digital_action_data(self.handle, self.restriction)
                .map(|data| {
                    if data.active {
                        value.set(data.state);
                    }
                }),
            ActionState::Scalar(value) => backend
                .analog_action_data(self.handle, self.restriction)
                .map(|data| {
                    if data.active {
                        value.set(data.x);
                    }
                }),
            ActionState::Vector2(value) => backend
                .analog_action_data(self.handle, self.restriction)
                .map(|data| {
                    if data.active {
                        value.set(Vec2::new(data.x, data.y));
                    }
                }),
            ActionState::Vector3(value) => backend
                .analog_action_data(self.handle, self.restriction)
                .map(|data| {
                    if data.active {
                        value.set(Vec3::new(data.x, data.y, data.z));
                    }
                }),
            ActionState::Skeleton { tracking_level, .. } => backend
                .skeletal_tracking_level(self.handle)
                .map(|level| *tracking_level = level),
            ActionState::Pose | ActionState::Haptic => Ok(()),
        };

        if let Err(e) = result {
            debug!("Failed to read action {}: {}", self.path, e);
        }
    }

    pub fn boolean(&self) -> Option<&InputValue<bool>> {
        match &self.state {
            ActionState::Boolean(value) => Some(value),
            _ => None,
        }
    }

    pub fn boolean_mut(&mut self) -> Option<&mut InputValue<bool>> {
        match &mut self.state {
            ActionState::Boolean(value) => Some(value),
            _ => None,
        }
    }

    pub fn scalar(&self) -> Option<&InputValue<f32>> {
        match &self.state {
            ActionState::Scalar(value) => Some(value),
            _ => None,
        }
    }

    pub fn scalar_mut(&mut self) -> Option<&mut InputValue<f32>> {
        match &mut self.state {
            ActionState::Scalar(value) => Some(value),
            _ => None,
        }
    }

    pub fn vector2(&self) -> Option<&InputValue<Vec2>> {
        match &self.state {
            ActionState::Vector2(value) => Some(value),
            _ => None,
        }
    }

    pub fn vector2_mut(&mut self) -> Option<&mut InputValue<Vec2>> {
        match &mut self.state {
            ActionState::Vector2(value) => Some(value),
            _ => None,
        }
    }

    pub fn vector3(&self) -> Option<&InputValue<Vec3>> {
        match &self.state {
            ActionState::Vector3(value) => Some(value),
            _ => None,
        }
    }

    pub fn vector3_mut(&mut self) -> Option<&mut InputValue<Vec3>> {
        match &mut self.state {
            ActionState::Vector3(value) => Some(value),
            _ => None,
        }
    }

    /// Reads a pose action. `None` when this is not a pose action or the
    /// read is inactive.
    pub fn fetch_pose(
        &self,
        backend: &dyn TrackingBackend,
        origin: TrackingOrigin,
        prediction: PosePrediction,
    ) -> Option<Pose> {
        if !matches!(self.state, ActionState::Pose) {
            return None;
        }
        match backend.pose_action_data(self.handle, origin, prediction, self.restriction) {
            Ok(data) if data.active => Some(Pose::from_raw(&data.pose)),
            Ok(_) => None,
            Err(e) => {
                debug!("Failed to read pose action {}: {}", self.path, e);
                None
            }
        }
    }

    pub fn tracking_level(&self) -> Option<SkeletalTrackingLevel> {
        match self.state {
            ActionState::Skeleton { tracking_level, .. } => Some(tracking_level),
            _ => None,
        }
    }

    pub fn skeleton_hand(&self) -> Option<ControllerRole> {
        match self.state {
            ActionState::Skeleton { hand, .. } => Some(hand),
            _ => None,
        }
    }

    pub fn skeleton_summary(&self, backend: &dyn TrackingBackend) -> Option<SkeletalSummary> {
        if !matches!(self.state, ActionState::Skeleton { .. }) {
            return None;
        }
        backend.skeletal_summary(self.handle).ok()
    }

    pub fn trigger_vibration(
        &self,
        backend: &dyn TrackingBackend,
        vibration: Vibration,
    ) -> Result<(), BackendError> {
        if !matches!(self.state, ActionState::Haptic) {
            return Err(BackendError::InvalidHandle(format!(
                "{} is not a vibration action",
                self.path
            )));
        }
        backend.trigger_haptic_vibration(
            self.handle,
            vibration.delay_seconds,
            vibration.duration_seconds,
            vibration.frequency,
            vibration.amplitude,
            self.restriction,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;
    use crate::backend::{RawMatrix34, RawPose};

    fn bound(backend: &MockBackend, name: &str, kind: ActionKind) -> Action {
        let decl = ActionDecl {
            name: name.to_string(),
            set: "main".to_string(),
            kind,
            requirement: Default::default(),
        };
        let handle = backend.action_handle(&decl.path()).unwrap();
        Action::new(&decl, handle)
    }

    #[test]
    fn inactive_read_keeps_value() {
        let backend = MockBackend::new();
        let mut action = bound(&backend, "trigger", ActionKind::Scalar);
        backend.set_analog("/actions/main/in/trigger", None, 0.75, 0.0, 0.0);
        action.update(&backend);
        assert_eq!(action.scalar().unwrap().get(), 0.75);

        // Nothing scripted for the right hand, so the read is inactive
        let source = backend.input_source_handle("/user/hand/right").unwrap();
        let mut restricted = action.restricted_to(source);
        restricted.update(&backend);
        assert_eq!(restricted.scalar().unwrap().get(), 0.75);
        assert_eq!(restricted.restriction(), Some(source));
        assert_eq!(action.restriction(), None);
    }

    #[test]
    fn vector_actions_read_components() {
        let backend = MockBackend::new();
        let mut stick = bound(&backend, "move", ActionKind::Vector2);
        let mut accel = bound(&backend, "accel", ActionKind::Vector3);
        backend.set_analog("/actions/main/in/move", None, 0.1, -0.2, 9.0);
        backend.set_analog("/actions/main/in/accel", None, 1.0, 2.0, 3.0);
        stick.update(&backend);
        accel.update(&backend);
        assert_eq!(stick.vector2().unwrap().get(), Vec2::new(0.1, -0.2));
        assert_eq!(accel.vector3().unwrap().get(), Vec3::new(1.0, 2.0, 3.0));
        assert!(stick.boolean().is_none());
    }

    #[test]
    fn pose_fetch_converts_coordinates() {
        let backend = MockBackend::new();
        let action = bound(&backend, "aim", ActionKind::Pose);
        assert!(action
            .fetch_pose(&backend, TrackingOrigin::Standing, PosePrediction::NextFrame)
            .is_none());

        backend.set_pose_action(
            "/actions/main/in/aim",
            None,
            RawPose {
                device_to_absolute: RawMatrix34::from_translation(0.0, 1.0, 2.0),
                velocity: [0.0, 0.0, 1.0],
                ..Default::default()
            },
        );
        let pose = action
            .fetch_pose(&backend, TrackingOrigin::Standing, PosePrediction::SecondsFromNow(0.02))
            .unwrap();
        assert_eq!(pose.position, Vec3::new(0.0, 1.0, -2.0));
        assert_eq!(pose.velocity, Vec3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn skeleton_tracks_level_and_summary() {
        let backend = MockBackend::new();
        let mut hand = bound(&backend, "left_hand", ActionKind::LeftHandSkeleton);
        let summary = SkeletalSummary {
            finger_curl: [0.1, 0.9, 0.9, 0.9, 0.9],
            finger_splay: [0.2; 4],
        };
        backend.set_skeleton(
            "/actions/main/in/left_hand",
            SkeletalTrackingLevel::Partial,
            summary,
        );
        hand.update(&backend);
        assert_eq!(hand.tracking_level(), Some(SkeletalTrackingLevel::Partial));
        assert_eq!(hand.skeleton_hand(), Some(ControllerRole::LeftHand));
        assert_eq!(hand.skeleton_summary(&backend), Some(summary));
    }

    #[test]
    fn vibration_goes_out_with_restriction() {
        let backend = MockBackend::new();
        let buzz = bound(&backend, "buzz", ActionKind::Vibration);
        assert_eq!(buzz.path(), "/actions/main/out/buzz");
        let left = backend.input_source_handle("/user/hand/left").unwrap();
        buzz.restricted_to(left)
            .trigger_vibration(&backend, Vibration::default())
            .unwrap();

        let sent = backend.vibrations();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].restrict, left);
        assert_eq!(sent[0].action, buzz.handle());

        let grip = bound(&backend, "grip", ActionKind::Boolean);
        assert!(grip.trigger_vibration(&backend, Vibration::default()).is_err());
    }
}
