use serde::{Deserialize, Serialize};

use crate::models::null_as_default;

/// A to-do entry on a project board.
#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
pub struct Task {
    /// Title of the task
    pub name: String,
    /// Free-text priority label, e.g. "high"
    #[serde(default, deserialize_with = "null_as_default")]
    pub priority: String,
}
