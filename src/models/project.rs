use jiff::civil::Date;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{attachment::Attachment, null_as_default, task::Task};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// UUID of the project
    pub id: Uuid,
    /// Human-facing label such as `PRJ-2025-042`, not unique
    #[serde(default, deserialize_with = "null_as_default")]
    pub display_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// Username of the manager, free text
    #[serde(default, deserialize_with = "null_as_default")]
    pub manager: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub budget: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub spent: f64,
    /// Completion percentage, 0 to 100
    #[serde(default, deserialize_with = "null_as_default")]
    pub progress: u8,
    #[serde(default)]
    pub deadline: Option<Date>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub members: Vec<Member>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tasks: Vec<Task>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub risks: Vec<Risk>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub files: Vec<Attachment>,
}

impl Project {
    /// An empty project with a fresh id and no attachments.
    pub fn new(display_id: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            display_id,
            name: String::new(),
            manager: String::new(),
            status: String::new(),
            budget: 0.0,
            spent: 0.0,
            progress: 0,
            deadline: None,
            description: String::new(),
            members: vec![],
            tasks: vec![],
            risks: vec![],
            files: vec![],
        }
    }
}

#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
pub struct Member {
    /// Copy of the member's username
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub role: String,
}

#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
pub struct Risk {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub desc: String,
}

/// Caller-controlled project fields, used both for creation and for
/// partial updates. A field left out (or `null`) means "not provided".
///
/// `id`, `displayId` and `files` are deliberately absent: unknown keys are
/// ignored, so a client echoing them back cannot overwrite them.
#[derive(Deserialize, Default, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ProjectFields {
    pub name: Option<String>,
    pub manager: Option<String>,
    pub status: Option<String>,
    pub budget: Option<f64>,
    pub spent: Option<f64>,
    pub progress: Option<i64>,
    /// ISO date; an empty string clears the deadline
    pub deadline: Option<String>,
    pub description: Option<String>,
    pub members: Option<Vec<Member>>,
    pub tasks: Option<Vec<Task>>,
    pub risks: Option<Vec<Risk>>,
}
