//! Input context.
//!
//! Owns every action object and the raw input state of each controller.
//! Nothing here is shared: other threads reach it only by pushing commands
//! onto its queue.
//!
//! ```text
//! ┌──────────── update_input() ─────────────┐
//! │ 1. drain input queue                    │
//! │ 2. legacy raw input of polled devices   │
//! │ 3. refresh active action sets           │
//! │ 4. update every bound action            │
//! └─────────────────────────────────────────┘
//! ```

pub mod action;
pub mod legacy;
pub mod manifest;
pub mod table;
pub mod value;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::backend::{BackendError, PosePrediction, SkeletalSummary, TrackingBackend, TrackingOrigin};
use crate::device::{ControllerDetails, DeviceId};
use crate::pose::Pose;
use crate::scheduler::{CommandQueue, CommandSender, ExecutionContext};

use self::action::{Action, Vibration};
use self::legacy::LegacyInput;
use self::table::ActionTable;

type LoadedCallback = Box<dyn FnOnce(&mut ActionTable) + Send>;

#[derive(Debug)]
struct ControllerInput {
    details: ControllerDetails,
    polled: bool,
    legacy: Option<LegacyInput>,
}

/// State mutated by input-queue commands.
pub struct InputState {
    controllers: HashMap<DeviceId, ControllerInput>,
    actions: Option<ActionTable>,
    pending_loaded: Vec<LoadedCallback>,
    origin: TrackingOrigin,
}

impl InputState {
    fn new(origin: TrackingOrigin) -> Self {
        Self {
            controllers: HashMap::new(),
            actions: None,
            pending_loaded: Vec::new(),
            origin,
        }
    }

    /// Starts polling raw input of a connected controller.
    pub(crate) fn add_controller(&mut self, id: DeviceId, details: ControllerDetails) {
        debug!("Polling raw input of controller {}", id);
        self.controllers
            .entry(id)
            .and_modify(|controller| controller.polled = true)
            .or_insert(ControllerInput {
                details,
                polled: true,
                legacy: None,
            });
    }

    /// Stops polling a disconnected controller and zeroes its raw input.
    pub(crate) fn remove_controller(&mut self, id: DeviceId) {
        let Some(controller) = self.controllers.get_mut(&id) else {
            return;
        };
        debug!("Stopped polling raw input of controller {}", id);
        controller.polled = false;
        if let Some(legacy) = controller.legacy.as_mut() {
            legacy.reset();
        }
    }

    pub(crate) fn install_actions(&mut self, mut table: ActionTable) {
        if self.actions.is_some() {
            warn!("Actions are already installed, ignoring new table");
            return;
        }
        info!("Actions loaded");
        for callback in self.pending_loaded.drain(..) {
            callback(&mut table);
        }
        self.actions = Some(table);
    }

    pub(crate) fn set_tracking_origin(&mut self, origin: TrackingOrigin) {
        self.origin = origin;
    }

    fn source_of(&self, device: DeviceId) -> Option<crate::backend::InputSourceHandle> {
        self.controllers
            .get(&device)
            .map(|controller| controller.details.input_source)
    }
}

pub struct InputContext {
    backend: Arc<dyn TrackingBackend>,
    queue: CommandQueue<InputState>,
    state: InputState,
}

impl InputContext {
    pub(crate) fn new(backend: Arc<dyn TrackingBackend>, origin: TrackingOrigin) -> Self {
        Self {
            backend,
            queue: CommandQueue::new(ExecutionContext::Input),
            state: InputState::new(origin),
        }
    }

    pub(crate) fn sender(&self) -> CommandSender<InputState> {
        self.queue.sender()
    }

    /// One input tick. Returns the number of commands drained.
    pub fn update_input(&mut self) -> usize {
        let drained = self.queue.drain(&mut self.state);

        let backend = self.backend.as_ref();
        for controller in self.state.controllers.values_mut() {
            if !controller.polled {
                continue;
            }
            if let Some(legacy) = controller.legacy.as_mut() {
                legacy.update(backend);
            }
        }

        if let Some(actions) = self.state.actions.as_mut() {
            actions.update(backend);
        }
        drained
    }

    /// Runs `callback` once the manifest is bound, or right now if it
    /// already is.
    pub fn on_actions_loaded(&mut self, callback: impl FnOnce(&mut ActionTable) + Send + 'static) {
        match self.state.actions.as_mut() {
            Some(table) => callback(table),
            None => self.state.pending_loaded.push(Box::new(callback)),
        }
    }

    pub fn actions_loaded(&self) -> bool {
        self.state.actions.is_some()
    }

    pub fn actions(&self) -> Option<&ActionTable> {
        self.state.actions.as_ref()
    }

    pub fn actions_mut(&mut self) -> Option<&mut ActionTable> {
        self.state.actions.as_mut()
    }

    pub fn action(&self, name: &str) -> Option<&Action> {
        self.state.actions.as_ref()?.action(name)
    }

    pub fn action_mut(&mut self, name: &str) -> Option<&mut Action> {
        self.state.actions.as_mut()?.action_mut(name)
    }

    /// The copy of `name` owned by controller `device`. `None` when the
    /// action is unbound or the device was never seen as a controller.
    pub fn action_for(&mut self, name: &str, device: DeviceId) -> Option<&mut Action> {
        let source = self.state.source_of(device)?;
        self.state.actions.as_mut()?.restricted(name, device, source)
    }

    fn scoped(&mut self, name: &str, device: Option<DeviceId>) -> Option<&mut Action> {
        match device {
            Some(device) => self.action_for(name, device),
            None => self.action_mut(name),
        }
    }

    pub fn fetch_pose(
        &mut self,
        name: &str,
        device: Option<DeviceId>,
        prediction: PosePrediction,
    ) -> Option<Pose> {
        let backend = self.backend.clone();
        let origin = self.state.origin;
        self.scoped(name, device)?
            .fetch_pose(backend.as_ref(), origin, prediction)
    }

    pub fn skeleton_summary(&self, name: &str) -> Option<SkeletalSummary> {
        self.action(name)?.skeleton_summary(self.backend.as_ref())
    }

    pub fn trigger_vibration(
        &mut self,
        name: &str,
        device: Option<DeviceId>,
        vibration: Vibration,
    ) -> Result<(), BackendError> {
        let backend = self.backend.clone();
        let action = self
            .scoped(name, device)
            .ok_or_else(|| BackendError::InvalidHandle(format!("no bound action {name}")))?;
        action.trigger_vibration(backend.as_ref(), vibration)
    }

    /// Controllers seen so far, with whether they are currently polled.
    pub fn controllers(&self) -> impl Iterator<Item = (DeviceId, &ControllerDetails, bool)> {
        self.state
            .controllers
            .iter()
            .map(|(id, controller)| (*id, &controller.details, controller.polled))
    }

    pub fn is_polled(&self, device: DeviceId) -> bool {
        self.state
            .controllers
            .get(&device)
            .is_some_and(|controller| controller.polled)
    }

    /// Raw input of `device`, discovering its buttons and axes on first use.
    pub fn legacy_input(&mut self, device: DeviceId) -> Option<&mut LegacyInput> {
        let backend = self.backend.as_ref();
        let controller = self.state.controllers.get_mut(&device)?;
        Some(
            controller
                .legacy
                .get_or_insert_with(|| LegacyInput::discover(backend, device.index())),
        )
    }

    pub fn tracking_origin(&self) -> TrackingOrigin {
        self.state.origin
    }

    pub fn backend(&self) -> &Arc<dyn TrackingBackend> {
        &self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;
    use crate::backend::{ControllerRole, DeviceClass, InputSourceHandle, RawControllerState};
    use crate::input::manifest::{ActionKind, ActionManifest, ActionSetUsage};
    use std::sync::Mutex;

    fn context() -> (Arc<MockBackend>, InputContext) {
        let backend = Arc::new(MockBackend::new());
        let context = InputContext::new(backend.clone(), TrackingOrigin::Standing);
        (backend, context)
    }

    fn left() -> ControllerDetails {
        ControllerDetails {
            role: ControllerRole::LeftHand,
            input_source: InputSourceHandle(77),
        }
    }

    fn manifest() -> ActionManifest {
        ActionManifest::new()
            .with_set("main", ActionSetUsage::LeftRight)
            .with_action("main", "grip", ActionKind::Boolean)
    }

    #[test]
    fn actions_loaded_fires_late_and_early_subscribers() {
        let (backend, mut context) = context();
        let log = Arc::new(Mutex::new(Vec::new()));

        let early = log.clone();
        context.on_actions_loaded(move |table| early.lock().unwrap().push(("early", table.len())));
        assert!(log.lock().unwrap().is_empty());

        let table = ActionTable::bind(&manifest(), backend.as_ref());
        context.sender().enqueue(move |state| state.install_actions(table));
        context.update_input();
        assert!(context.actions_loaded());

        let late = log.clone();
        context.on_actions_loaded(move |table| late.lock().unwrap().push(("late", table.len())));
        assert_eq!(*log.lock().unwrap(), vec![("early", 1), ("late", 1)]);
    }

    #[test]
    fn second_table_is_ignored() {
        let (backend, mut context) = context();
        let first = ActionTable::bind(&manifest(), backend.as_ref());
        let second = ActionTable::bind(
            &manifest().with_action("main", "extra", ActionKind::Scalar),
            backend.as_ref(),
        );
        context.sender().enqueue(move |state| state.install_actions(first));
        context.sender().enqueue(move |state| state.install_actions(second));
        context.update_input();
        assert_eq!(context.actions().unwrap().len(), 1);
    }

    #[test]
    fn action_for_unknown_controller_is_none() {
        let (backend, mut context) = context();
        let table = ActionTable::bind(&manifest(), backend.as_ref());
        context.sender().enqueue(move |state| state.install_actions(table));
        context.update_input();

        assert!(context.action_for("grip", DeviceId(1)).is_none());
        context
            .sender()
            .enqueue(|state| state.add_controller(DeviceId(1), left()));
        context.update_input();
        let action = context.action_for("grip", DeviceId(1)).unwrap();
        assert_eq!(action.restriction(), Some(InputSourceHandle(77)));
    }

    #[test]
    fn disconnect_zeroes_legacy_input() {
        let (backend, mut context) = context();
        backend.add_device(1, DeviceClass::Controller);
        backend.set_supported_buttons(1, 1 << 2);
        context
            .sender()
            .enqueue(|state| state.add_controller(DeviceId(1), left()));
        context.update_input();
        assert!(context.is_polled(DeviceId(1)));

        context.legacy_input(DeviceId(1)).unwrap();
        backend.set_controller_state(
            1,
            RawControllerState {
                packet_num: 3,
                buttons_pressed: 1 << 2,
                ..Default::default()
            },
        );
        context.update_input();
        let pressed = |context: &mut InputContext| {
            context
                .legacy_input(DeviceId(1))
                .unwrap()
                .button_mut(2)
                .unwrap()
                .value()
                .get()
                .pressed
        };
        assert!(pressed(&mut context));

        context
            .sender()
            .enqueue(|state| state.remove_controller(DeviceId(1)));
        context.update_input();
        assert!(!context.is_polled(DeviceId(1)));
        assert!(!pressed(&mut context));
    }
}
