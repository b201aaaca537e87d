//! Action manifest declarations.
//!
//! A manifest lists action sets and the typed actions inside them. It can
//! be built in code or loaded from the `[manifest]` table of the settings
//! file:
//!
//! ```toml
//! [[manifest.action_sets]]
//! name = "main"
//! usage = "left_right"
//!
//! [[manifest.actions]]
//! name = "grip"
//! set = "main"
//! kind = "boolean"
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Boolean,
    Scalar,
    Vector2,
    Vector3,
    Pose,
    LeftHandSkeleton,
    RightHandSkeleton,
    Vibration,
}

impl ActionKind {
    /// Output actions live under `/out/`, everything else under `/in/`.
    pub fn is_output(self) -> bool {
        matches!(self, ActionKind::Vibration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionRequirement {
    Mandatory,
    #[default]
    Suggested,
    Optional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionSetUsage {
    #[default]
    LeftRight,
    Single,
    Hidden,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSetDecl {
    pub name: String,
    #[serde(default)]
    pub usage: ActionSetUsage,
}

impl ActionSetDecl {
    pub fn path(&self) -> String {
        format!("/actions/{}", self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDecl {
    pub name: String,
    pub set: String,
    pub kind: ActionKind,
    #[serde(default)]
    pub requirement: ActionRequirement,
}

impl ActionDecl {
    pub fn path(&self) -> String {
        let direction = if self.kind.is_output() { "out" } else { "in" };
        format!("/actions/{}/{}/{}", self.set, direction, self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionManifest {
    #[serde(default)]
    pub action_sets: Vec<ActionSetDecl>,
    #[serde(default)]
    pub actions: Vec<ActionDecl>,
}

impl ActionManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_set(mut self, name: &str, usage: ActionSetUsage) -> Self {
        self.action_sets.push(ActionSetDecl {
            name: name.to_string(),
            usage,
        });
        self
    }

    pub fn with_action(mut self, set: &str, name: &str, kind: ActionKind) -> Self {
        self.actions.push(ActionDecl {
            name: name.to_string(),
            set: set.to_string(),
            kind,
            requirement: ActionRequirement::default(),
        });
        self
    }

    pub fn actions_in<'a>(&'a self, set: &'a str) -> impl Iterator<Item = &'a ActionDecl> + 'a {
        self.actions.iter().filter(move |action| action.set == set)
    }
}
