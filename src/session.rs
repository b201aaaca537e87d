//! Session lifecycle.
//!
//! ```text
//! VrSession<Uninitialized> ──start()──► VrSession<Running> ──into_contexts()──► VrContexts
//!                                                                 ├─ DrawContext    (draw thread)
//!                                                                 ├─ UpdateContext  (update thread)
//!                                                                 ├─ InputContext   (input thread)
//!                                                                 └─ VrHandle       (any thread)
//! ```
//!
//! The three contexts are wired to each other only through the scheduler
//! queues. [`VrHandle`] is cheap to clone and safe to use from anywhere.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use statum::{machine, state};
use tracing::{error, info, warn};

use crate::backend::TrackingBackend;
use crate::config::VrSettings;
use crate::error::VrError;
use crate::input::manifest::ActionManifest;
use crate::input::table::ActionTable;
use crate::input::InputContext;
use crate::poller::DrawContext;
use crate::scheduler::Scheduler;
use crate::update::UpdateContext;

#[state]
#[derive(Debug, Clone)]
pub enum SessionState {
    Uninitialized, // Backend not yet initialized
    Running,       // Backend up, contexts can be handed out
}

#[machine]
pub struct VrSession<S: SessionState> {
    backend: Arc<dyn TrackingBackend>,
    settings: VrSettings,
}

impl<S: SessionState> VrSession<S> {
    pub fn settings(&self) -> &VrSettings {
        &self.settings
    }
}

impl VrSession<Uninitialized> {
    pub fn create(backend: Arc<dyn TrackingBackend>, settings: VrSettings) -> Self {
        info!("Creating VR session");
        Self::new(backend, settings)
    }

    /// Initializes the runtime. Failure is reported once here; nothing
    /// retries it.
    pub fn start(self) -> Result<VrSession<Running>, VrError> {
        match self.backend.initialize() {
            Ok(()) => {
                info!(
                    "VR runtime initialized (version {})",
                    self.backend
                        .runtime_version()
                        .unwrap_or_else(|| "unknown".to_string())
                );
                Ok(self.transition())
            }
            Err(e) => {
                error!("Failed to initialize VR runtime: {}", e);
                Err(VrError::Initialization(e))
            }
        }
    }
}

/// The three per-thread contexts plus the shared handle.
pub struct VrContexts {
    pub draw: DrawContext,
    pub update: UpdateContext,
    pub input: InputContext,
    pub handle: VrHandle,
}

impl VrSession<Running> {
    pub fn into_contexts(self) -> VrContexts {
        let update = UpdateContext::new(self.backend.clone(), self.settings.poll_backend_events);
        let input = InputContext::new(self.backend.clone(), self.settings.tracking_origin);
        let scheduler = Scheduler::new(update.sender(), input.sender());
        let draw = DrawContext::new(
            self.backend.clone(),
            scheduler.clone(),
            self.settings.tracking_origin,
            self.settings.stale_pose_timeout(),
        );
        let handle = VrHandle {
            backend: self.backend,
            scheduler,
            manifest_installed: Arc::new(AtomicBool::new(false)),
            shut_down: Arc::new(AtomicBool::new(false)),
        };

        info!("VR contexts created");
        VrContexts {
            draw,
            update,
            input,
            handle,
        }
    }
}

/// Thread-agnostic entry points into a running session.
#[derive(Clone)]
pub struct VrHandle {
    backend: Arc<dyn TrackingBackend>,
    scheduler: Scheduler,
    manifest_installed: Arc<AtomicBool>,
    shut_down: Arc<AtomicBool>,
}

impl VrHandle {
    /// Binds `manifest` against the runtime and hands the resulting table to
    /// the input context. Succeeds at most once per session.
    pub fn install_manifest(&self, manifest: &ActionManifest) -> Result<(), VrError> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(VrError::NotRunning);
        }
        if self
            .manifest_installed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Ignoring second action manifest");
            return Err(VrError::ManifestAlreadyInstalled);
        }

        let table = ActionTable::bind(manifest, self.backend.as_ref());
        let dominant_hand = table.dominant_hand();
        self.scheduler
            .enqueue_update(move |registry| registry.set_dominant_hand(dominant_hand));
        self.scheduler
            .enqueue_input(move |input| input.install_actions(table));
        Ok(())
    }

    pub fn is_manifest_installed(&self) -> bool {
        self.manifest_installed.load(Ordering::Acquire)
    }

    pub fn is_headset_present(&self) -> bool {
        self.backend.is_headset_present()
    }

    pub fn runtime_version(&self) -> Option<String> {
        self.backend.runtime_version()
    }

    /// Tells the runtime the application is handling its quit request.
    pub fn acknowledge_quit(&self) {
        self.backend.acknowledge_quit();
    }

    /// One-time teardown. Callers must have stopped ticking the contexts.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("Shutting down VR runtime");
        self.backend.shutdown();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    pub fn backend(&self) -> &Arc<dyn TrackingBackend> {
        &self.backend
    }
}
