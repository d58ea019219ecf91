use serde::Serialize;

use crate::{
    models::{project::Project, user::User},
    storage::{Collection, Storage},
};

#[derive(Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub users: usize,
    pub projects: usize,
    pub total_budget: f64,
    pub total_spent: f64,
    /// Mean progress across projects, 0 when there are none
    pub average_progress: f64,
}

pub fn summarize(storage: &impl Storage) -> DashboardSummary {
    let users: Vec<User> = storage.load(Collection::Users);
    let projects: Vec<Project> = storage.load(Collection::Projects);

    let average_progress = if projects.is_empty() {
        0.0
    } else {
        projects.iter().map(|p| f64::from(p.progress)).sum::<f64>() / projects.len() as f64
    };

    DashboardSummary {
        users: users.len(),
        projects: projects.len(),
        total_budget: projects.iter().map(|p| p.budget).sum(),
        total_spent: projects.iter().map(|p| p.spent).sum(),
        average_progress,
    }
}
