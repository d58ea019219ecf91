use std::collections::HashSet;

use jiff::civil::Date;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    models::project::{Project, ProjectFields},
    storage::{Collection, Storage, StorageError, blobs::BlobStore},
};

const DISPLAY_ID_RANGE: u128 = 1000;
const DISPLAY_ID_ATTEMPTS: usize = 16;

#[derive(Debug, Error, PartialEq)]
pub enum InvalidProjectField {
    #[error("Project name must not be empty")]
    BlankName,

    #[error("Progress must be between 0 and 100, got {0}")]
    ProgressOutOfRange(i64),

    #[error("'{field}' must be a non-negative amount, got {value}")]
    InvalidAmount { field: &'static str, value: f64 },

    #[error("Invalid deadline date '{0}': {1}")]
    InvalidDeadline(String, String),
}

fn check_amount(field: &'static str, value: f64) -> Result<f64, InvalidProjectField> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(InvalidProjectField::InvalidAmount { field, value })
    }
}

/// Shallow merge: every provided field replaces the stored one wholesale.
fn apply_fields(project: &mut Project, fields: ProjectFields) -> Result<(), InvalidProjectField> {
    if let Some(progress) = fields.progress {
        project.progress = u8::try_from(progress)
            .ok()
            .filter(|p| *p <= 100)
            .ok_or(InvalidProjectField::ProgressOutOfRange(progress))?;
    }
    if let Some(budget) = fields.budget {
        project.budget = check_amount("budget", budget)?;
    }
    if let Some(spent) = fields.spent {
        project.spent = check_amount("spent", spent)?;
    }
    if let Some(deadline) = fields.deadline {
        project.deadline = if deadline.trim().is_empty() {
            None
        } else {
            Some(deadline.trim().parse::<Date>().map_err(|e| {
                InvalidProjectField::InvalidDeadline(deadline.clone(), e.to_string())
            })?)
        };
    }
    if let Some(name) = fields.name {
        project.name = name;
    }
    if let Some(manager) = fields.manager {
        project.manager = manager;
    }
    if let Some(status) = fields.status {
        project.status = status;
    }
    if let Some(description) = fields.description {
        project.description = description;
    }
    if let Some(members) = fields.members {
        project.members = members;
    }
    if let Some(tasks) = fields.tasks {
        project.tasks = tasks;
    }
    if let Some(risks) = fields.risks {
        project.risks = risks;
    }
    Ok(())
}

/// `PRJ-<year>-<n>` with `n` below 1000. Labels already in use are avoided
/// while a free number remains; past that the label is allowed to repeat.
fn generate_display_id(existing: &[Project]) -> String {
    let year = jiff::Zoned::now().year();
    let label = |n: u128| format!("PRJ-{year}-{n}");
    let random = || Uuid::new_v4().as_u128() % DISPLAY_ID_RANGE;
    let taken: HashSet<&str> = existing.iter().map(|p| p.display_id.as_str()).collect();

    for _ in 0..DISPLAY_ID_ATTEMPTS {
        let candidate = label(random());
        if !taken.contains(candidate.as_str()) {
            return candidate;
        }
    }

    (0..DISPLAY_ID_RANGE)
        .map(label)
        .find(|candidate| !taken.contains(candidate.as_str()))
        .unwrap_or_else(|| label(random()))
}

pub fn list_projects(storage: &impl Storage) -> Vec<Project> {
    storage.load(Collection::Projects)
}

#[derive(Debug, Error)]
pub enum GetProjectError {
    #[error("Project '{0}' not found")]
    ProjectNotFound(Uuid),
}

pub fn get_project(storage: &impl Storage, project_id: Uuid) -> Result<Project, GetProjectError> {
    storage
        .load::<Project>(Collection::Projects)
        .into_iter()
        .find(|p| p.id == project_id)
        .ok_or(GetProjectError::ProjectNotFound(project_id))
}

#[derive(Debug, Error)]
pub enum CreateProjectError {
    #[error("{0}")]
    InvalidField(#[from] InvalidProjectField),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub fn create_project(
    storage: &impl Storage,
    fields: ProjectFields,
) -> Result<Project, CreateProjectError> {
    let lock = storage.lock(Collection::Projects)?;
    let mut projects: Vec<Project> = storage.load_locked(&lock)?;

    let mut project = Project::new(generate_display_id(&projects));
    apply_fields(&mut project, fields)?;
    if project.name.trim().is_empty() {
        return Err(InvalidProjectField::BlankName.into());
    }

    projects.push(project.clone());
    storage.save(Collection::Projects, &projects)?;

    info!(project_id = %project.id, display_id = %project.display_id, "created project");
    Ok(project)
}

#[derive(Debug, Error)]
pub enum UpdateProjectError {
    #[error("Project '{0}' not found")]
    ProjectNotFound(Uuid),

    #[error("{0}")]
    InvalidField(#[from] InvalidProjectField),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub fn update_project(
    storage: &impl Storage,
    project_id: Uuid,
    fields: ProjectFields,
) -> Result<Project, UpdateProjectError> {
    let lock = storage.lock(Collection::Projects)?;
    let mut projects: Vec<Project> = storage.load_locked(&lock)?;

    let stored = projects
        .iter_mut()
        .find(|p| p.id == project_id)
        .ok_or(UpdateProjectError::ProjectNotFound(project_id))?;

    let mut updated = stored.clone();
    apply_fields(&mut updated, fields)?;
    if updated.name.trim().is_empty() {
        return Err(InvalidProjectField::BlankName.into());
    }
    *stored = updated.clone();

    storage.save(Collection::Projects, &projects)?;

    info!(project_id = %project_id, "updated project");
    Ok(updated)
}

#[derive(Debug, Error)]
pub enum DeleteProjectError {
    #[error("Project '{0}' not found")]
    ProjectNotFound(Uuid),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub struct DeleteProjectResult {
    pub project: Project,
    /// Server names of blobs that could not be removed
    pub failed_blob_removals: Vec<String>,
}

pub fn delete_project(
    storage: &impl Storage,
    blobs: &BlobStore,
    project_id: Uuid,
) -> Result<DeleteProjectResult, DeleteProjectError> {
    let lock = storage.lock(Collection::Projects)?;
    let mut projects: Vec<Project> = storage.load_locked(&lock)?;

    let position = projects
        .iter()
        .position(|p| p.id == project_id)
        .ok_or(DeleteProjectError::ProjectNotFound(project_id))?;
    let project = projects.remove(position);

    storage.save(Collection::Projects, &projects)?;

    // The record is gone either way; blob failures only get reported.
    let failed_blob_removals: Vec<String> = project
        .files
        .iter()
        .filter_map(|file| match blobs.remove(&file.server_name) {
            Ok(_) => None,
            Err(e) => {
                warn!(
                    project_id = %project_id,
                    server_name = %file.server_name,
                    error = %e,
                    "could not remove blob of deleted project"
                );
                Some(file.server_name.clone())
            }
        })
        .collect();

    info!(
        project_id = %project_id,
        files = project.files.len(),
        failed = failed_blob_removals.len(),
        "deleted project"
    );
    Ok(DeleteProjectResult {
        project,
        failed_blob_removals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{
            attachment::Attachment,
            project::{Member, Risk},
            task::Task,
        },
        storage::json::JsonFileStorage,
    };

    fn storage() -> (tempfile::TempDir, JsonFileStorage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().to_path_buf());
        (dir, storage)
    }

    fn named(name: &str) -> ProjectFields {
        ProjectFields {
            name: Some(name.to_string()),
            ..ProjectFields::default()
        }
    }

    fn member(name: &str, role: &str) -> Member {
        Member {
            name: name.to_string(),
            role: role.to_string(),
        }
    }

    #[test]
    fn test_create_then_get() {
        let (_dir, storage) = storage();

        let created = create_project(
            &storage,
            ProjectFields {
                name: Some(String::from("X")),
                manager: Some(String::from("ana")),
                status: Some(String::from("active")),
                budget: Some(1200.0),
                progress: Some(40),
                deadline: Some(String::from("2025-06-30")),
                ..ProjectFields::default()
            },
        )
        .unwrap();

        let fetched = get_project(&storage, created.id).unwrap();
        assert_eq!(fetched.id, created.id);
        assert!(fetched.files.is_empty());
        assert_eq!(fetched.name, "X");
        assert_eq!(fetched.manager, "ana");
        assert_eq!(fetched.status, "active");
        assert_eq!(fetched.budget, 1200.0);
        assert_eq!(fetched.progress, 40);
        assert_eq!(fetched.spent, 0.0);
        assert_eq!(fetched.deadline, Some(jiff::civil::date(2025, 6, 30)));
        assert!(fetched.display_id.starts_with("PRJ-"));
    }

    #[test]
    fn test_create_keeps_nested_collections() {
        let (_dir, storage) = storage();

        let created = create_project(
            &storage,
            ProjectFields {
                tasks: Some(vec![Task {
                    name: String::from("Kickoff"),
                    priority: String::from("high"),
                }]),
                risks: Some(vec![Risk {
                    name: String::from("Scope"),
                    desc: String::from("creep"),
                }]),
                ..named("X")
            },
        )
        .unwrap();

        assert_eq!(created.tasks.len(), 1);
        assert_eq!(created.risks[0].desc, "creep");
    }

    #[test]
    fn test_create_rejects_invalid_fields() {
        let (_dir, storage) = storage();

        let blank = create_project(&storage, named("  "));
        assert!(matches!(
            blank,
            Err(CreateProjectError::InvalidField(InvalidProjectField::BlankName))
        ));

        let progress = create_project(
            &storage,
            ProjectFields {
                progress: Some(101),
                ..named("X")
            },
        );
        assert!(matches!(
            progress,
            Err(CreateProjectError::InvalidField(
                InvalidProjectField::ProgressOutOfRange(101)
            ))
        ));

        let budget = create_project(
            &storage,
            ProjectFields {
                budget: Some(-1.0),
                ..named("X")
            },
        );
        assert!(matches!(
            budget,
            Err(CreateProjectError::InvalidField(
                InvalidProjectField::InvalidAmount { field: "budget", .. }
            ))
        ));

        assert!(list_projects(&storage).is_empty());
    }

    #[test]
    fn test_concurrent_creates_are_all_kept() {
        let (dir, _storage) = storage();

        std::thread::scope(|scope| {
            for i in 0..16 {
                let dir = dir.path().to_path_buf();
                scope.spawn(move || {
                    let storage = JsonFileStorage::new(dir);
                    create_project(&storage, named(&format!("P{i}"))).unwrap();
                });
            }
        });

        let storage = JsonFileStorage::new(dir.path().to_path_buf());
        let mut names: Vec<String> = list_projects(&storage).into_iter().map(|p| p.name).collect();
        names.sort();
        let mut expected: Vec<String> = (0..16).map(|i| format!("P{i}")).collect();
        expected.sort();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_create_keeps_hand_edited_records_with_nulls() {
        let (_dir, storage) = storage();
        let good = Project::new(String::from("PRJ-2024-1"));
        let mut document = serde_json::to_value(vec![good]).unwrap();
        document.as_array_mut().unwrap().push(serde_json::json!({
            "id": Uuid::new_v4(),
            "name": "Edited",
            "budget": null
        }));
        std::fs::write(
            storage.document_path(Collection::Projects),
            document.to_string(),
        )
        .unwrap();

        assert_eq!(list_projects(&storage).len(), 2);
        create_project(&storage, named("New")).unwrap();

        let names: Vec<String> = list_projects(&storage).into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["", "Edited", "New"]);
    }

    #[test]
    fn test_mutations_refuse_to_overwrite_malformed_document() {
        let (_dir, storage) = storage();
        let path = storage.document_path(Collection::Projects);
        let content = r#"[{"id": "67e55044-10b1-426f-9247-bb680e5fe0c8", "name": "Good"}, {"id": 7, "name": "Legacy"}]"#;
        std::fs::write(&path, content).unwrap();
        let good_id = Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();

        let created = create_project(&storage, named("New"));
        let updated = update_project(&storage, good_id, named("Renamed"));

        assert!(matches!(
            created,
            Err(CreateProjectError::Storage(StorageError::Corrupt { .. }))
        ));
        assert!(matches!(
            updated,
            Err(UpdateProjectError::Storage(StorageError::Corrupt { .. }))
        ));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), content);
    }

    #[test]
    fn test_update_preserves_id_and_files() {
        let (_dir, storage) = storage();
        let created = create_project(
            &storage,
            ProjectFields {
                status: Some(String::from("active")),
                ..named("X")
            },
        )
        .unwrap();

        // Seed a file the way the attachment manager would.
        let mut projects: Vec<Project> = storage.load(Collection::Projects);
        projects[0].files.push(Attachment::new(
            String::from("a.txt"),
            String::from("1-a.txt"),
            jiff::civil::date(2025, 1, 1),
        ));
        storage.save(Collection::Projects, &projects).unwrap();
        let before = get_project(&storage, created.id).unwrap();

        let updated = update_project(
            &storage,
            created.id,
            ProjectFields {
                budget: Some(500.0),
                ..ProjectFields::default()
            },
        )
        .unwrap();

        assert_eq!(updated.id, before.id);
        assert_eq!(updated.display_id, before.display_id);
        assert_eq!(updated.files, before.files);
        assert_eq!(updated.budget, 500.0);
        assert_eq!(updated.status, "active");
        assert_eq!(updated.name, "X");
        assert_eq!(get_project(&storage, created.id).unwrap(), updated);
    }

    #[test]
    fn test_update_replaces_members_wholesale() {
        let (_dir, storage) = storage();
        let created = create_project(
            &storage,
            ProjectFields {
                members: Some(vec![member("ana", "lead"), member("bo", "dev")]),
                ..named("X")
            },
        )
        .unwrap();

        update_project(
            &storage,
            created.id,
            ProjectFields {
                members: Some(vec![member("cy", "qa")]),
                ..ProjectFields::default()
            },
        )
        .unwrap();

        let fetched = get_project(&storage, created.id).unwrap();
        assert_eq!(fetched.members, vec![member("cy", "qa")]);
    }

    #[test]
    fn test_update_empty_deadline_clears_it() {
        let (_dir, storage) = storage();
        let created = create_project(
            &storage,
            ProjectFields {
                deadline: Some(String::from("2025-06-30")),
                ..named("X")
            },
        )
        .unwrap();

        let updated = update_project(
            &storage,
            created.id,
            ProjectFields {
                deadline: Some(String::new()),
                ..ProjectFields::default()
            },
        )
        .unwrap();

        assert!(updated.deadline.is_none());
    }

    #[test]
    fn test_update_invalid_field_leaves_record_untouched() {
        let (_dir, storage) = storage();
        let created = create_project(&storage, named("X")).unwrap();

        let result = update_project(
            &storage,
            created.id,
            ProjectFields {
                budget: Some(10.0),
                deadline: Some(String::from("not a date")),
                ..ProjectFields::default()
            },
        );

        assert!(matches!(
            result,
            Err(UpdateProjectError::InvalidField(InvalidProjectField::InvalidDeadline(..)))
        ));
        assert_eq!(get_project(&storage, created.id).unwrap().budget, 0.0);
    }

    #[test]
    fn test_update_unknown_project() {
        let (_dir, storage) = storage();

        let result = update_project(&storage, Uuid::new_v4(), named("Y"));

        assert!(matches!(result, Err(UpdateProjectError::ProjectNotFound(_))));
    }

    #[test]
    fn test_delete_unknown_project_leaves_collection() {
        let (dir, storage) = storage();
        let blobs = BlobStore::new(dir.path().join("uploads"));
        create_project(&storage, named("X")).unwrap();

        let result = delete_project(&storage, &blobs, Uuid::new_v4());

        assert!(matches!(result, Err(DeleteProjectError::ProjectNotFound(_))));
        assert_eq!(list_projects(&storage).len(), 1);
    }

    #[test]
    fn test_delete_removes_blobs() {
        let (dir, storage) = storage();
        let blobs = BlobStore::new(dir.path().join("uploads"));
        let created = create_project(&storage, named("X")).unwrap();

        let mut projects: Vec<Project> = storage.load(Collection::Projects);
        for server_name in ["1-a.txt", "2-missing.txt"] {
            projects[0].files.push(Attachment::new(
                server_name.to_string(),
                server_name.to_string(),
                jiff::civil::date(2025, 1, 1),
            ));
        }
        storage.save(Collection::Projects, &projects).unwrap();
        let blob_path = blobs.write("1-a.txt", b"hello").unwrap();

        let result = delete_project(&storage, &blobs, created.id).unwrap();

        assert_eq!(result.project.id, created.id);
        assert!(result.failed_blob_removals.is_empty());
        assert!(!blob_path.exists());
        assert!(list_projects(&storage).is_empty());
    }

    #[test]
    fn test_delete_reports_unremovable_blobs() {
        let (dir, storage) = storage();
        let blobs = BlobStore::new(dir.path().join("uploads"));
        let created = create_project(&storage, named("X")).unwrap();

        let mut projects: Vec<Project> = storage.load(Collection::Projects);
        projects[0].files.push(Attachment::new(
            String::from("evil"),
            String::from("../users.json"),
            jiff::civil::date(2025, 1, 1),
        ));
        storage.save(Collection::Projects, &projects).unwrap();

        let result = delete_project(&storage, &blobs, created.id).unwrap();

        assert_eq!(result.failed_blob_removals, vec![String::from("../users.json")]);
        assert!(list_projects(&storage).is_empty());
    }

    #[test]
    fn test_display_id_avoids_taken_labels() {
        let year = jiff::Zoned::now().year();

        // Take every label but one.
        let projects: Vec<Project> = (0..DISPLAY_ID_RANGE)
            .filter(|n| *n != 417)
            .map(|n| Project::new(format!("PRJ-{year}-{n}")))
            .collect();

        assert_eq!(generate_display_id(&projects), format!("PRJ-{year}-417"));
    }

    #[test]
    fn test_display_id_repeats_when_year_is_full() {
        let year = jiff::Zoned::now().year();
        let projects: Vec<Project> = (0..DISPLAY_ID_RANGE)
            .map(|n| Project::new(format!("PRJ-{year}-{n}")))
            .collect();

        let label = generate_display_id(&projects);

        assert!(projects.iter().any(|p| p.display_id == label));
    }
}
