pub mod attachments;
pub mod dashboard;
pub mod projects;
pub mod users;
