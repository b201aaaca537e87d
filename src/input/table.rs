use std::collections::HashMap;

use tracing::{debug, error, info, warn};

use super::action::Action;
use super::manifest::ActionManifest;
use crate::backend::{
    ActionSetHandle, BackendError, ControllerRole, InputSourceHandle, TrackingBackend,
};
use crate::device::DeviceId;

#[derive(Debug)]
struct ActionEntry {
    default: Action,
    restricted: HashMap<DeviceId, Action>,
}

/// Bound actions of an installed manifest, owned by the input context.
///
/// The set of bound names never changes after [`ActionTable::bind`].
/// Restricted copies are added lazily, one per controller.
#[derive(Debug)]
pub struct ActionTable {
    sets: Vec<ActionSetHandle>,
    entries: HashMap<String, ActionEntry>,
    dominant_hand: ControllerRole,
}

impl ActionTable {
    /// Resolves every declared set and action against the backend.
    ///
    /// Paths the backend cannot resolve are logged and left out.
    pub fn bind(manifest: &ActionManifest, backend: &dyn TrackingBackend) -> Self {
        let mut sets = Vec::new();
        let mut entries = HashMap::new();

        for set in &manifest.action_sets {
            match backend.action_set_handle(&set.path()) {
                Ok(handle) => sets.push(handle),
                Err(e) => {
                    warn!("Could not resolve action set {}: {}", set.path(), e);
                    continue;
                }
            }

            for decl in manifest.actions_in(&set.name) {
                if entries.contains_key(&decl.name) {
                    warn!("Action {} declared twice, keeping the first", decl.name);
                    continue;
                }
                match backend.action_handle(&decl.path()) {
                    Ok(handle) => {
                        entries.insert(
                            decl.name.clone(),
                            ActionEntry {
                                default: Action::new(decl, handle),
                                restricted: HashMap::new(),
                            },
                        );
                    }
                    Err(e) => warn!("Could not resolve action {}: {}", decl.path(), e),
                }
            }
        }

        for decl in manifest
            .actions
            .iter()
            .filter(|decl| !manifest.action_sets.iter().any(|set| set.name == decl.set))
        {
            warn!("Action {} belongs to undeclared set {}, skipping", decl.name, decl.set);
        }

        let dominant_hand = match backend.dominant_hand() {
            Ok(hand @ (ControllerRole::LeftHand | ControllerRole::RightHand)) => hand,
            Ok(other) => {
                warn!("Dominant hand reported as {:?}, assuming right", other);
                ControllerRole::RightHand
            }
            Err(e) => {
                warn!("Could not read dominant hand, assuming right: {}", e);
                ControllerRole::RightHand
            }
        };

        info!(
            "Bound {} actions in {} action sets",
            entries.len(),
            sets.len()
        );
        Self {
            sets,
            entries,
            dominant_hand,
        }
    }

    pub fn dominant_hand(&self) -> ControllerRole {
        self.dominant_hand
    }

    pub fn action_sets(&self) -> &[ActionSetHandle] {
        &self.sets
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// The unrestricted action bound to `name`.
    pub fn action(&self, name: &str) -> Option<&Action> {
        self.entries.get(name).map(|entry| &entry.default)
    }

    pub fn action_mut(&mut self, name: &str) -> Option<&mut Action> {
        self.entries.get_mut(name).map(|entry| &mut entry.default)
    }

    /// The copy of `name` owned by controller `device`, reading through
    /// `source`. Created on first request and kept separate from the
    /// unrestricted action even when `source` is [`InputSourceHandle::ANY`].
    pub fn restricted(
        &mut self,
        name: &str,
        device: DeviceId,
        source: InputSourceHandle,
    ) -> Option<&mut Action> {
        let entry = self.entries.get_mut(name)?;
        Some(entry.restricted.entry(device).or_insert_with(|| {
            debug!("Creating copy of {} for controller {} (source {})", name, device, source.0);
            entry.default.restricted_to(source)
        }))
    }

    /// Existing copy for `device`, without creating one.
    pub fn existing_restricted(&self, name: &str, device: DeviceId) -> Option<&Action> {
        self.entries.get(name)?.restricted.get(&device)
    }

    /// Refreshes action set activation, then every bound action.
    ///
    /// Returns false when the activation refresh failed; no action is read
    /// in that case.
    pub fn update(&mut self, backend: &dyn TrackingBackend) -> bool {
        match backend.update_action_state(&self.sets) {
            Ok(()) => {}
            // Focus loss is reported by the draw context
            Err(BackendError::NoFocus) => return false,
            Err(e) => {
                error!("Failed to update action state: {}", e);
                return false;
            }
        }
        for entry in self.entries.values_mut() {
            entry.default.update(backend);
            for action in entry.restricted.values_mut() {
                action.update(backend);
            }
        }
        true
    }
}
