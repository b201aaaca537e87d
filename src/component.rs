//! Render-model sub-part state.
//!
//! Controllers expose named sub-parts (buttons, triggers, status panel).
//! The resolver finds a device's render model once, memoizes it, and on
//! every update tick re-reads each sub-part's transforms and flags for
//! every enabled controller. Everything here runs on the update context.

use std::collections::HashMap;

use bitflags::bitflags;
use tracing::{debug, warn};

use crate::backend::{InputSourceHandle, RawComponentState, TrackingBackend};
use crate::device::registry::DeviceRegistry;
use crate::device::{Device, DeviceId, DeviceKind};
use crate::pose::Transform;

/// Model assumed for controllers whose render model name cannot be read.
pub const FALLBACK_CONTROLLER_MODEL: &str = "{indexcontroller}valve_controller_knu_1_0_left";

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ComponentProperties: u32 {
        const IS_STATIC = 1 << 0;
        const IS_VISIBLE = 1 << 1;
        const IS_TOUCHED = 1 << 2;
        const IS_PRESSED = 1 << 3;
        const IS_SCROLLED = 1 << 4;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ComponentState {
    /// Relative to the device.
    pub local: Transform,
    /// Relative to the tracking origin.
    pub render: Transform,
    pub scroll_wheel_visible: bool,
    pub properties: ComponentProperties,
}

impl ComponentState {
    fn from_raw(raw: &RawComponentState) -> Self {
        Self {
            local: Transform::from_raw(&raw.tracking_to_component_local),
            render: Transform::from_raw(&raw.tracking_to_component_render_model),
            scroll_wheel_visible: raw.scroll_wheel_visible,
            properties: ComponentProperties::from_bits_truncate(raw.properties),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.properties.contains(ComponentProperties::IS_VISIBLE)
    }

    pub fn is_pressed(&self) -> bool {
        self.properties.contains(ComponentProperties::IS_PRESSED)
    }

    pub fn is_touched(&self) -> bool {
        self.properties.contains(ComponentProperties::IS_TOUCHED)
    }
}

/// Render model metadata for one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceModel {
    pub name: String,
    pub components: Vec<String>,
    /// The runtime did not report a model name and the fallback was used.
    pub is_fallback: bool,
}

impl DeviceModel {
    pub fn has_component(&self, name: &str) -> bool {
        self.components.iter().any(|component| component == name)
    }
}

#[derive(Debug, Default)]
pub struct ComponentResolver {
    // `None` records a resolution that failed, so it is not retried every tick
    models: HashMap<DeviceId, Option<DeviceModel>>,
    states: HashMap<DeviceId, HashMap<String, ComponentState>>,
}

impl ComponentResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves and memoizes the render model of `device`.
    pub fn resolve_model(
        &mut self,
        backend: &dyn TrackingBackend,
        device: &Device,
    ) -> Option<&DeviceModel> {
        self.models
            .entry(device.id())
            .or_insert_with(|| load_model(backend, device))
            .as_ref()
    }

    /// The memoized model, without resolving.
    pub fn model(&self, device: DeviceId) -> Option<&DeviceModel> {
        self.models.get(&device).and_then(Option::as_ref)
    }

    pub fn state(&self, device: DeviceId, component: &str) -> Option<&ComponentState> {
        self.states.get(&device)?.get(component)
    }

    pub fn states(&self, device: DeviceId) -> impl Iterator<Item = (&str, &ComponentState)> {
        self.states
            .get(&device)
            .into_iter()
            .flat_map(|states| states.iter().map(|(name, state)| (name.as_str(), state)))
    }

    /// Re-reads every sub-part of every enabled controller. Sub-parts the
    /// backend cannot resolve this tick keep their previous state.
    pub fn refresh(&mut self, backend: &dyn TrackingBackend, registry: &DeviceRegistry) {
        for device in registry
            .enabled_devices()
            .filter(|device| device.kind() == DeviceKind::Controller)
        {
            let source = device
                .controller()
                .map(|details| details.input_source)
                .unwrap_or(InputSourceHandle::ANY);
            let Some(model) = self.resolve_model(backend, device).cloned() else {
                continue;
            };

            let states = self.states.entry(device.id()).or_default();
            for component in &model.components {
                if let Some(raw) = backend.component_state(&model.name, component, source) {
                    states.insert(component.clone(), ComponentState::from_raw(&raw));
                }
            }
        }
    }
}

fn load_model(backend: &dyn TrackingBackend, device: &Device) -> Option<DeviceModel> {
    let (name, is_fallback) = match backend.render_model_name(device.id().index()) {
        Ok(name) if !name.is_empty() => (name, false),
        Ok(_) | Err(_) if device.kind() == DeviceKind::Controller => {
            warn!(
                "No render model for controller {}, assuming {}",
                device.id(),
                FALLBACK_CONTROLLER_MODEL
            );
            (FALLBACK_CONTROLLER_MODEL.to_string(), true)
        }
        Ok(_) => return None,
        Err(e) => {
            debug!("No render model for {}: {}", device.id(), e);
            return None;
        }
    };

    let count = backend.component_count(&name);
    let components: Vec<String> = (0..count)
        .filter_map(|index| backend.component_name(&name, index))
        .collect();
    debug!(
        "Resolved render model {} with {} components for {}",
        name,
        components.len(),
        device.id()
    );

    Some(DeviceModel {
        name,
        components,
        is_fallback,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;
    use crate::backend::{ControllerRole, RawMatrix34};
    use crate::device::ControllerDetails;
    use glam::Vec3;

    const MODEL: &str = "test_controller";

    fn setup() -> (MockBackend, DeviceRegistry, InputSourceHandle) {
        let backend = MockBackend::new();
        backend.add_render_model(MODEL, vec!["trigger".to_string(), "scroll_wheel".to_string()]);
        backend.set_render_model(1, MODEL);
        let source = backend
            .input_source_handle("/user/hand/left")
            .expect("source handle");

        let mut registry = DeviceRegistry::new();
        let (device, owner) = Device::new(
            DeviceId(1),
            DeviceKind::Controller,
            Some(ControllerDetails {
                role: ControllerRole::LeftHand,
                input_source: source,
            }),
        );
        registry.insert(device);
        owner.set_enabled(&mut registry, true);
        (backend, registry, source)
    }

    fn raw_state(z: f32, properties: ComponentProperties) -> RawComponentState {
        RawComponentState {
            tracking_to_component_local: RawMatrix34::from_translation(0.0, 0.0, z),
            tracking_to_component_render_model: RawMatrix34::from_translation(1.0, 0.0, z),
            properties: properties.bits(),
            scroll_wheel_visible: z < 0.2,
        }
    }

    #[test]
    fn refresh_decomposes_transforms_and_flags() {
        let (backend, registry, _) = setup();
        backend.set_component_state(
            MODEL,
            "trigger",
            Some("/user/hand/left"),
            raw_state(0.5, ComponentProperties::IS_VISIBLE | ComponentProperties::IS_PRESSED),
        );

        let mut resolver = ComponentResolver::new();
        resolver.refresh(&backend, &registry);

        let state = resolver.state(DeviceId(1), "trigger").expect("trigger resolved");
        assert_eq!(state.local.position, Vec3::new(0.0, 0.0, -0.5));
        assert_eq!(state.render.position, Vec3::new(1.0, 0.0, -0.5));
        assert!(state.is_visible());
        assert!(state.is_pressed());
        assert!(!state.is_touched());
        assert!(resolver.state(DeviceId(1), "scroll_wheel").is_none());
    }

    #[test]
    fn unresolved_component_keeps_previous_state() {
        let (backend, registry, _) = setup();
        backend.set_component_state(
            MODEL,
            "scroll_wheel",
            Some("/user/hand/left"),
            raw_state(0.1, ComponentProperties::IS_VISIBLE),
        );

        let mut resolver = ComponentResolver::new();
        resolver.refresh(&backend, &registry);
        let before = *resolver.state(DeviceId(1), "scroll_wheel").unwrap();
        assert!(before.scroll_wheel_visible);

        // Backend stops answering for this source
        let other = MockBackend::new();
        other.add_render_model(MODEL, vec!["scroll_wheel".to_string()]);
        resolver.refresh(&other, &registry);

        assert_eq!(*resolver.state(DeviceId(1), "scroll_wheel").unwrap(), before);
    }

    #[test]
    fn controller_without_model_name_uses_fallback() {
        let backend = MockBackend::new();
        backend.add_render_model(FALLBACK_CONTROLLER_MODEL, vec!["base".to_string()]);
        let (device, _) = Device::new(
            DeviceId(2),
            DeviceKind::Controller,
            Some(ControllerDetails {
                role: ControllerRole::RightHand,
                input_source: InputSourceHandle(9),
            }),
        );

        let mut resolver = ComponentResolver::new();
        let model = resolver.resolve_model(&backend, &device).cloned().unwrap();
        assert!(model.is_fallback);
        assert_eq!(model.name, FALLBACK_CONTROLLER_MODEL);
        assert_eq!(model.components, vec!["base".to_string()]);
        assert_eq!(resolver.model(DeviceId(2)), Some(&model));
    }

    #[test]
    fn headset_without_model_resolves_to_none_once() {
        let backend = MockBackend::new();
        let (device, _) = Device::new(DeviceId(0), DeviceKind::Headset, None);
        let mut resolver = ComponentResolver::new();
        assert!(resolver.resolve_model(&backend, &device).is_none());

        backend.set_render_model(0, MODEL);
        assert!(resolver.resolve_model(&backend, &device).is_none());
    }
}
