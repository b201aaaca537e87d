//! Update context.
//!
//! Owns the [`DeviceRegistry`] and the [`ComponentResolver`]. Each
//! [`UpdateContext::update`] drains the update queue first, so device
//! observers and detection callbacks all fire on this context.

use std::sync::Arc;

use tracing::{debug, info};

use crate::backend::{DeviceIndex, TrackingBackend};
use crate::component::{ComponentResolver, ComponentState, DeviceModel};
use crate::device::registry::DeviceRegistry;
use crate::device::{Device, DeviceId};
use crate::observer::Observers;
use crate::scheduler::{CommandQueue, CommandSender, ExecutionContext};

/// Runtime event, with the device resolved when the registry knows it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VrEvent {
    pub event_type: u32,
    pub device_index: DeviceIndex,
    pub device: Option<DeviceId>,
    pub age_seconds: f32,
}

pub struct UpdateContext {
    backend: Arc<dyn TrackingBackend>,
    queue: CommandQueue<DeviceRegistry>,
    registry: DeviceRegistry,
    components: ComponentResolver,
    poll_events: bool,
    paused: bool,
    on_event: Observers<VrEvent>,
    on_user_distracted: Observers<()>,
    on_user_focused: Observers<()>,
}

impl UpdateContext {
    pub(crate) fn new(backend: Arc<dyn TrackingBackend>, poll_events: bool) -> Self {
        Self {
            backend,
            queue: CommandQueue::new(ExecutionContext::Update),
            registry: DeviceRegistry::new(),
            components: ComponentResolver::new(),
            poll_events,
            paused: false,
            on_event: Observers::new(),
            on_user_distracted: Observers::new(),
            on_user_focused: Observers::new(),
        }
    }

    pub(crate) fn sender(&self) -> CommandSender<DeviceRegistry> {
        self.queue.sender()
    }

    /// One update tick. Returns the number of commands drained.
    pub fn update(&mut self) -> usize {
        let drained = self.queue.drain(&mut self.registry);

        if self.poll_events && !self.on_event.is_empty() {
            self.pump_events();
        }

        let paused = self.backend.should_application_pause();
        if paused != self.paused {
            self.paused = paused;
            if paused {
                info!("User distracted");
                self.on_user_distracted.notify(&());
            } else {
                info!("User focused");
                self.on_user_focused.notify(&());
            }
        }

        self.components.refresh(self.backend.as_ref(), &self.registry);
        drained
    }

    fn pump_events(&mut self) {
        while let Some(raw) = self.backend.poll_next_event() {
            let id = DeviceId(raw.device_index);
            let event = VrEvent {
                event_type: raw.event_type,
                device_index: raw.device_index,
                device: self.registry.device(id).map(Device::id),
                age_seconds: raw.age_seconds,
            };
            debug!("Runtime event {} for index {}", event.event_type, event.device_index);
            self.on_event.notify(&event);
        }
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// For subscribing to registry and device observers.
    pub fn registry_mut(&mut self) -> &mut DeviceRegistry {
        &mut self.registry
    }

    /// Subscribing enables the event pump.
    pub fn on_event(&mut self, callback: impl FnMut(&VrEvent) + Send + 'static) {
        self.on_event.subscribe(callback);
    }

    pub fn on_user_distracted(&mut self, callback: impl FnMut(&()) + Send + 'static) {
        self.on_user_distracted.subscribe(callback);
    }

    pub fn on_user_focused(&mut self, callback: impl FnMut(&()) + Send + 'static) {
        self.on_user_focused.subscribe(callback);
    }

    pub fn is_user_distracted(&self) -> bool {
        self.paused
    }

    /// Resolves the render model of `device` if it is not known yet.
    pub fn device_model(&mut self, device: DeviceId) -> Option<&DeviceModel> {
        let device = self.registry.device(device)?;
        self.components.resolve_model(self.backend.as_ref(), device)
    }

    pub fn component_state(&self, device: DeviceId, component: &str) -> Option<&ComponentState> {
        self.components.state(device, component)
    }

    pub fn components(&self) -> &ComponentResolver {
        &self.components
    }
}
