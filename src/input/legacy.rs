//! Per-controller raw button and axis state.
//!
//! This predates manifest actions. Buttons and axes are discovered from the
//! controller's properties the first time they are requested, then updated
//! from the controller state snapshot whenever its packet number moves.

use glam::Vec2;
use tracing::{debug, warn};

use super::value::InputValue;
use crate::backend::{AxisType, BackendError, DeviceIndex, RawControllerState, TrackingBackend};

const AXIS_COUNT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ButtonState {
    pub pressed: bool,
    pub touched: bool,
}

#[derive(Debug)]
pub struct RawButton {
    pub button_id: u32,
    mask: u64,
    value: InputValue<ButtonState>,
}

impl RawButton {
    fn new(button_id: u32) -> Self {
        Self {
            button_id,
            mask: 1u64 << button_id,
            value: InputValue::default(),
        }
    }

    fn apply(&mut self, state: &RawControllerState) {
        self.value.set(ButtonState {
            pressed: state.buttons_pressed & self.mask != 0,
            touched: state.buttons_touched & self.mask != 0,
        });
    }

    pub fn value(&self) -> &InputValue<ButtonState> {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut InputValue<ButtonState> {
        &mut self.value
    }
}

#[derive(Debug)]
pub enum RawAxisValue {
    /// Triggers only use the first component.
    Single(InputValue<f32>),
    /// Track pads and joysticks.
    Vector(InputValue<Vec2>),
}

#[derive(Debug)]
pub struct RawAxis {
    pub index: usize,
    pub axis_type: AxisType,
    value: RawAxisValue,
}

impl RawAxis {
    fn apply(&mut self, state: &RawControllerState) {
        let [x, y] = state.axes[self.index];
        match &mut self.value {
            RawAxisValue::Single(value) => {
                value.set(x);
            }
            RawAxisValue::Vector(value) => {
                value.set(Vec2::new(x, y));
            }
        }
    }

    pub fn value(&self) -> &RawAxisValue {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut RawAxisValue {
        &mut self.value
    }
}

#[derive(Debug)]
pub struct LegacyInput {
    index: DeviceIndex,
    buttons: Vec<RawButton>,
    axes: Vec<RawAxis>,
    last_packet: Option<u32>,
}

impl LegacyInput {
    /// Reads the supported buttons and axis types of controller `index`.
    pub fn discover(backend: &dyn TrackingBackend, index: DeviceIndex) -> Self {
        let mut buttons = Vec::new();
        match backend.supported_buttons(index) {
            Ok(mask) => {
                buttons.extend((0..64).filter(|bit| mask & (1u64 << bit) != 0).map(RawButton::new));
            }
            Err(e) => warn!("Could not read supported buttons of device {}: {}", index, e),
        }

        let mut axes = Vec::new();
        for axis in 0..AXIS_COUNT {
            let axis_type = match backend.axis_type(index, axis) {
                Ok(axis_type) => axis_type,
                Err(BackendError::UnknownProperty(_)) => break,
                Err(e) => {
                    warn!("Could not read axis {} of device {}: {}", axis, index, e);
                    continue;
                }
            };
            let value = match axis_type {
                AxisType::Trigger => RawAxisValue::Single(InputValue::default()),
                AxisType::TrackPad | AxisType::Joystick => RawAxisValue::Vector(InputValue::default()),
                AxisType::None => continue,
            };
            axes.push(RawAxis {
                index: axis,
                axis_type,
                value,
            });
        }

        debug!(
            "Device {} exposes {} raw buttons and {} raw axes",
            index,
            buttons.len(),
            axes.len()
        );
        Self {
            index,
            buttons,
            axes,
            last_packet: None,
        }
    }

    /// Applies the latest controller snapshot unless it was already seen.
    pub fn update(&mut self, backend: &dyn TrackingBackend) {
        let Some(state) = backend.controller_state(self.index) else {
            return;
        };
        if self.last_packet == Some(state.packet_num) {
            return;
        }
        self.last_packet = Some(state.packet_num);
        self.apply(&state);
    }

    /// Zeroes every value, firing observers for anything that was non-zero.
    pub fn reset(&mut self) {
        self.last_packet = None;
        self.apply(&RawControllerState::default());
    }

    fn apply(&mut self, state: &RawControllerState) {
        for button in self.buttons.iter_mut() {
            button.apply(state);
        }
        for axis in self.axes.iter_mut() {
            axis.apply(state);
        }
    }

    pub fn buttons(&self) -> &[RawButton] {
        &self.buttons
    }

    pub fn button_mut(&mut self, button_id: u32) -> Option<&mut RawButton> {
        self.buttons
            .iter_mut()
            .find(|button| button.button_id == button_id)
    }

    pub fn axes(&self) -> &[RawAxis] {
        &self.axes
    }

    pub fn axis_mut(&mut self, index: usize) -> Option<&mut RawAxis> {
        self.axes.iter_mut().find(|axis| axis.index == index)
    }

    pub fn trigger_haptic_pulse(&self, backend: &dyn TrackingBackend, axis: u32, duration_micros: u16) {
        backend.trigger_haptic_pulse(self.index, axis, duration_micros);
    }
}
