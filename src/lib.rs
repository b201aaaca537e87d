//! Tracked-device poses and input actions for VR applications, spread
//! across three threads without shared locks.
//!
//! ```text
//!                 ┌──────────────┐  update queue   ┌───────────────┐
//!  runtime ──────►│ DrawContext  │────────────────►│ UpdateContext │──► DeviceRegistry, components
//!  (poses)        │ (pose poller)│                 └───────────────┘
//!                 └──────┬───────┘  input queue    ┌───────────────┐
//!                        └────────────────────────►│ InputContext  │──► ActionTable, raw input
//!                                                  └───────────────┘
//! ```
//!
//! A [`session::VrSession`] initializes the runtime and splits into the three
//! contexts plus a [`session::VrHandle`]. Each context is ticked by exactly one
//! thread, either by the caller or by [`runner::VrRunner`].

pub mod backend;
pub mod component;
pub mod config;
pub mod device;
pub mod error;
pub mod input;
pub mod observer;
pub mod poller;
pub mod pose;
pub mod runner;
pub mod scheduler;
pub mod session;
pub mod update;

pub use backend::{TrackingBackend, TrackingOrigin, TrackingQuality};
pub use config::VrSettings;
pub use device::{Device, DeviceId, DeviceKind};
pub use error::VrError;
pub use input::InputContext;
pub use poller::DrawContext;
pub use session::{VrContexts, VrHandle, VrSession};
pub use update::UpdateContext;
