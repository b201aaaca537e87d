//! Draw context: the pose poller.
//!
//! [`DrawContext::poll_poses`] blocks on the runtime until the next frame's
//! poses are ready, then turns what changed into commands for the update
//! and input queues. It never writes device state itself.
//!
//! ```text
//! wait_get_poses ──► per index ──► class valid? ──► first sighting? ──► Device + Owner ──► update queue
//!                                        │
//!                                        ├─► connected edge ──► input queue (controllers) + update queue
//!                                        ├─► pose valid ──────► update queue (render + game pose)
//!                                        └─► quality edge ────► update queue
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::backend::{
    BackendError, ControllerRole, DeviceIndex, InputSourceHandle, RawPose, TrackingBackend,
    TrackingOrigin, TrackingQuality, MAX_TRACKED_DEVICES,
};
use crate::device::{ControllerDetails, Device, DeviceId, DeviceKind, DeviceOwner};
use crate::pose::Pose;
use crate::scheduler::Scheduler;

/// Draw-side view of one discovered index.
#[derive(Debug)]
struct TrackedSlot {
    owner: DeviceOwner,
    controller: Option<ControllerDetails>,
    enabled: bool,
    tracking: TrackingQuality,
}

#[derive(Debug, Default)]
struct FocusState {
    lost_since: Option<Instant>,
    stale_reported: bool,
}

/// What a single [`DrawContext::poll_poses`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Poses were read and changes scheduled.
    Polled,
    /// The application does not have focus; nothing was scheduled except a
    /// possible staleness downgrade.
    NoFocus,
    /// The runtime reported an error; the tick was skipped.
    Failed,
}

pub struct DrawContext {
    backend: Arc<dyn TrackingBackend>,
    scheduler: Scheduler,
    requested_origin: TrackingOrigin,
    applied_origin: Option<TrackingOrigin>,
    stale_timeout: Option<Duration>,
    render_poses: Vec<RawPose>,
    game_poses: Vec<RawPose>,
    slots: HashMap<DeviceIndex, TrackedSlot>,
    focus: FocusState,
    frames: u64,
}

impl DrawContext {
    pub(crate) fn new(
        backend: Arc<dyn TrackingBackend>,
        scheduler: Scheduler,
        origin: TrackingOrigin,
        stale_timeout: Option<Duration>,
    ) -> Self {
        Self {
            backend,
            scheduler,
            requested_origin: origin,
            applied_origin: None,
            stale_timeout,
            render_poses: vec![RawPose::default(); MAX_TRACKED_DEVICES],
            game_poses: vec![RawPose::default(); MAX_TRACKED_DEVICES],
            slots: HashMap::new(),
            focus: FocusState::default(),
            frames: 0,
        }
    }

    /// Takes effect on the next poll.
    pub fn set_tracking_origin(&mut self, origin: TrackingOrigin) {
        self.requested_origin = origin;
    }

    pub fn tracking_origin(&self) -> TrackingOrigin {
        self.requested_origin
    }

    /// Number of polls that produced pose data.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// One draw tick.
    pub fn poll_poses(&mut self) -> PollOutcome {
        if self.applied_origin != Some(self.requested_origin) {
            let origin = self.requested_origin;
            info!("Switching tracking origin to {:?}", origin);
            self.backend.set_tracking_origin(origin);
            self.applied_origin = Some(origin);
            self.scheduler
                .enqueue_input(move |input| input.set_tracking_origin(origin));
        }

        match self
            .backend
            .wait_get_poses(&mut self.render_poses, &mut self.game_poses)
        {
            Ok(()) => {}
            Err(BackendError::NoFocus) => {
                self.on_focus_lost();
                return PollOutcome::NoFocus;
            }
            Err(e) => {
                error!("Failed to get poses: {}", e);
                return PollOutcome::Failed;
            }
        }

        if self.focus.lost_since.take().is_some() {
            info!("Regained focus");
            self.focus.stale_reported = false;
        }
        self.frames += 1;

        for index in 0..MAX_TRACKED_DEVICES as DeviceIndex {
            self.poll_index(index);
        }
        PollOutcome::Polled
    }

    fn poll_index(&mut self, index: DeviceIndex) {
        let Some(kind) = DeviceKind::from_class(self.backend.device_class(index)) else {
            return;
        };

        if !self.slots.contains_key(&index) {
            let slot = self.discover(index, kind);
            self.slots.insert(index, slot);
        }
        let Some(slot) = self.slots.get_mut(&index) else {
            return;
        };

        let render = &self.render_poses[index as usize];
        let game = &self.game_poses[index as usize];
        let owner = slot.owner;
        let id = owner.id();

        let connected = render.device_is_connected;
        if connected != slot.enabled {
            slot.enabled = connected;
            debug!("Device {} {}", id, if connected { "connected" } else { "disconnected" });
            if let Some(details) = slot.controller {
                if connected {
                    self.scheduler
                        .enqueue_input(move |input| input.add_controller(id, details));
                } else {
                    self.scheduler
                        .enqueue_input(move |input| input.remove_controller(id));
                }
            }
            self.scheduler
                .enqueue_update(move |registry| owner.set_enabled(registry, connected));
        }

        if render.pose_is_valid {
            let render_pose = Pose::from_raw(render);
            let game_pose = Pose::from_raw(game);
            self.scheduler
                .enqueue_update(move |registry| owner.set_poses(registry, render_pose, game_pose));
        }

        let tracking = render.tracking;
        if tracking != slot.tracking {
            slot.tracking = tracking;
            self.scheduler
                .enqueue_update(move |registry| owner.set_tracking_quality(registry, tracking));
        }
    }

    fn discover(&mut self, index: DeviceIndex, kind: DeviceKind) -> TrackedSlot {
        let controller = (kind == DeviceKind::Controller).then(|| self.controller_details(index));
        let (device, owner) = Device::new(DeviceId(index), kind, controller);
        debug!("First sighting of {:?} at index {}", kind, index);
        self.scheduler.enqueue_update(move |registry| registry.insert(device));

        TrackedSlot {
            owner,
            controller,
            enabled: false,
            tracking: TrackingQuality::Uninitialized,
        }
    }

    fn controller_details(&self, index: DeviceIndex) -> ControllerDetails {
        let role = self.backend.controller_role(index).unwrap_or_else(|e| {
            warn!("Could not read role of controller {}: {}", index, e);
            ControllerRole::Invalid
        });
        let input_source = match role.input_source_path() {
            Some(path) => self.backend.input_source_handle(path).unwrap_or_else(|e| {
                warn!("Could not resolve input source of controller {}: {}", index, e);
                InputSourceHandle::ANY
            }),
            None => InputSourceHandle::ANY,
        };
        ControllerDetails { role, input_source }
    }

    fn on_focus_lost(&mut self) {
        let now = Instant::now();
        let since = *self.focus.lost_since.get_or_insert_with(|| {
            warn!("Lost application focus, keeping last known poses");
            now
        });

        let Some(timeout) = self.stale_timeout else {
            return;
        };
        if self.focus.stale_reported || now.duration_since(since) < timeout {
            return;
        }

        warn!(
            "No focus for {:?}, marking {} devices stale",
            now.duration_since(since),
            self.slots.len()
        );
        self.focus.stale_reported = true;
        for slot in self.slots.values_mut() {
            if slot.tracking == TrackingQuality::Stale {
                continue;
            }
            slot.tracking = TrackingQuality::Stale;
            let owner = slot.owner;
            self.scheduler.enqueue_update(move |registry| {
                owner.set_tracking_quality(registry, TrackingQuality::Stale)
            });
        }
    }
}
