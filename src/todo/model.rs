//! Domain model for todo records and their external projections.

use serde::{Deserialize, Serialize};

/// A todo record as the repository stores it, with its numeric id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    /// Repository-assigned numeric id. Never leaves the service unencoded.
    pub id: u64,
    /// Short title.
    pub title: String,
    /// Free-form description.
    pub description: String,
    /// Completion flag.
    pub completed: bool,
}

/// The external-facing projection of a [`Todo`].
///
/// The id is carried in its obfuscated wire form; projection happens once,
/// when a read fills the cache, so cached views are returned to later
/// readers without re-encoding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TodoView {
    /// Obfuscated id, as produced by the service's id codec.
    pub id: String,
    /// Short title.
    pub title: String,
    /// Free-form description.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Completion flag.
    pub completed: bool,
}

/// Payload for creating or fully replacing a todo.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct TodoRequest {
    /// Short title; must not be empty.
    pub title: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Completion flag; new todos always start incomplete.
    #[serde(default)]
    pub completed: bool,
}

/// Partial-update payload; absent fields keep their stored values.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct TodoPatch {
    /// Replacement title, if any.
    pub title: Option<String>,
    /// Replacement description, if any.
    pub description: Option<String>,
    /// Replacement completion flag, if any.
    pub completed: Option<bool>,
}

impl TodoPatch {
    /// Returns `true` when the patch would change nothing.
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.completed.is_none()
    }
}
