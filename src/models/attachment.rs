use jiff::civil::Date;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Public path prefix under which uploaded blobs are served.
pub const UPLOADS_URL_PREFIX: &str = "/uploads/";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// UUID of the attachment, unrelated to the project id
    pub id: Uuid,
    /// Original filename as sent by the client
    pub name: String,
    /// Public path of the blob
    pub url: String,
    /// Sanitized on-disk filename
    pub server_name: String,
    /// Upload date
    pub date: Date,
}

impl Attachment {
    pub fn new(name: String, server_name: String, date: Date) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: format!("{UPLOADS_URL_PREFIX}{server_name}"),
            name,
            server_name,
            date,
        }
    }
}
