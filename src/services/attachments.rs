use slug::slugify;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    models::{attachment::Attachment, project::Project},
    storage::{Collection, Storage, StorageError, blobs::BlobStore},
};

const MAX_STEM_LEN: usize = 100;
const MAX_EXTENSION_LEN: usize = 16;

/// Reduces an untrusted filename to `<slug>[.<ext>]`, safe as a single path
/// component and short enough to leave room for the timestamp prefix.
fn sanitize_file_name(original: &str) -> String {
    let base = original.rsplit(['/', '\\']).next().unwrap_or_default();
    let (stem, extension) = match base.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => (stem, extension),
        _ => (base, ""),
    };

    // Slugs are ASCII, so byte truncation stays on a char boundary.
    let mut stem = slugify(stem);
    stem.truncate(MAX_STEM_LEN);
    let mut stem = stem.trim_end_matches('-').to_string();
    if stem.is_empty() {
        stem = String::from("file");
    }
    let extension: String = extension
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(MAX_EXTENSION_LEN)
        .collect::<String>()
        .to_ascii_lowercase();

    if extension.is_empty() {
        stem
    } else {
        format!("{stem}.{extension}")
    }
}

/// `<unix millis>-<sanitized name>`, with a counter inserted when the name is
/// already used by the project or present on disk.
fn generate_server_name(
    original: &str,
    project: &Project,
    blobs: &BlobStore,
) -> Result<String, StorageError> {
    let millis = jiff::Timestamp::now().as_millisecond();
    let sanitized = sanitize_file_name(original);

    let mut candidate = format!("{millis}-{sanitized}");
    let mut counter = 1;
    while project.files.iter().any(|f| f.server_name == candidate) || blobs.exists(&candidate)? {
        candidate = format!("{millis}-{counter}-{sanitized}");
        counter += 1;
    }
    Ok(candidate)
}

#[derive(Debug, Error)]
pub enum AttachFileError {
    #[error("Project '{0}' not found")]
    ProjectNotFound(Uuid),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub struct AttachFileParameters {
    pub project_id: Uuid,
    pub original_name: String,
    pub bytes: Vec<u8>,
}

pub fn attach_file(
    storage: &impl Storage,
    blobs: &BlobStore,
    parameters: AttachFileParameters,
) -> Result<Attachment, AttachFileError> {
    let project_id = parameters.project_id;

    let lock = storage.lock(Collection::Projects)?;
    let mut projects: Vec<Project> = storage.load_locked(&lock)?;

    let project = projects
        .iter_mut()
        .find(|p| p.id == project_id)
        .ok_or(AttachFileError::ProjectNotFound(project_id))?;

    let server_name = generate_server_name(&parameters.original_name, project, blobs)?;
    blobs.write(&server_name, &parameters.bytes)?;

    let attachment = Attachment::new(
        parameters.original_name,
        server_name,
        jiff::Zoned::now().date(),
    );
    project.files.push(attachment.clone());

    if let Err(e) = storage.save(Collection::Projects, &projects) {
        if let Err(cleanup) = blobs.remove(&attachment.server_name) {
            warn!(server_name = %attachment.server_name, error = %cleanup, "orphaned blob after failed save");
        }
        return Err(e.into());
    }

    info!(
        project_id = %project_id,
        attachment_id = %attachment.id,
        server_name = %attachment.server_name,
        size = parameters.bytes.len(),
        "attached file"
    );
    Ok(attachment)
}

#[derive(Debug, Error)]
pub enum DetachFileError {
    #[error("Project '{0}' not found")]
    ProjectNotFound(Uuid),

    #[error("File '{0}' not found in project")]
    AttachmentNotFound(Uuid),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub fn detach_file(
    storage: &impl Storage,
    blobs: &BlobStore,
    project_id: Uuid,
    attachment_id: Uuid,
) -> Result<Attachment, DetachFileError> {
    let lock = storage.lock(Collection::Projects)?;
    let mut projects: Vec<Project> = storage.load_locked(&lock)?;

    let project = projects
        .iter_mut()
        .find(|p| p.id == project_id)
        .ok_or(DetachFileError::ProjectNotFound(project_id))?;

    let position = project
        .files
        .iter()
        .position(|f| f.id == attachment_id)
        .ok_or(DetachFileError::AttachmentNotFound(attachment_id))?;

    let server_name = &project.files[position].server_name;
    match blobs.remove(server_name) {
        Ok(true) => {}
        Ok(false) => debug!(server_name = %server_name, "blob already gone"),
        Err(StorageError::InvalidBlobName(name)) => {
            warn!(server_name = %name, "stored server name is not a valid blob name, dropping record only");
        }
        Err(e) => return Err(e.into()),
    }
    let attachment = project.files.remove(position);

    storage.save(Collection::Projects, &projects)?;

    info!(project_id = %project_id, attachment_id = %attachment_id, "detached file");
    Ok(attachment)
}
