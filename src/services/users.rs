use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::{
    models::user::{PublicUser, Role, User},
    storage::{Collection, Storage, StorageError},
};

#[derive(Debug, Error)]
pub enum RegisterUserError {
    #[error("Missing required field '{0}'")]
    MissingField(&'static str),

    #[error("A user with email '{0}' already exists")]
    EmailAlreadyExists(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub struct RegisterUserParameters {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Role,
}

fn required(value: Option<String>, field: &'static str) -> Result<String, &'static str> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(field),
    }
}

pub fn register_user(
    storage: &impl Storage,
    parameters: RegisterUserParameters,
) -> Result<PublicUser, RegisterUserError> {
    let username =
        required(parameters.username, "username").map_err(RegisterUserError::MissingField)?;
    let email = required(parameters.email, "email").map_err(RegisterUserError::MissingField)?;
    let password =
        required(parameters.password, "password").map_err(RegisterUserError::MissingField)?;

    let lock = storage.lock(Collection::Users)?;
    let mut users: Vec<User> = storage.load_locked(&lock)?;

    if users.iter().any(|u| u.email == email) {
        return Err(RegisterUserError::EmailAlreadyExists(email));
    }

    let user = User {
        id: Uuid::new_v4(),
        username,
        email,
        password,
        role: parameters.role,
        joined: jiff::Zoned::now().date(),
    };
    let public = PublicUser::from(&user);

    users.push(user);
    storage.save(Collection::Users, &users)?;

    info!(user_id = %public.id, role = ?public.role, "registered user");
    Ok(public)
}

#[derive(Debug, Error)]
pub enum AuthenticateError {
    #[error("Missing required field '{0}'")]
    MissingField(&'static str),

    #[error("Invalid email or password")]
    InvalidCredentials,
}

pub struct AuthenticateParameters {
    pub email: Option<String>,
    pub password: Option<String>,
}

pub fn authenticate(
    storage: &impl Storage,
    parameters: AuthenticateParameters,
) -> Result<PublicUser, AuthenticateError> {
    let email = required(parameters.email, "email").map_err(AuthenticateError::MissingField)?;
    let password =
        required(parameters.password, "password").map_err(AuthenticateError::MissingField)?;

    let users: Vec<User> = storage.load(Collection::Users);

    users
        .iter()
        .find(|u| u.email == email && u.password == password)
        .map(PublicUser::from)
        .ok_or(AuthenticateError::InvalidCredentials)
}

pub fn list_users(storage: &impl Storage) -> Vec<PublicUser> {
    storage
        .load::<User>(Collection::Users)
        .into_iter()
        .map(PublicUser::from)
        .collect()
}

#[derive(Debug, Error)]
pub enum DeleteUserError {
    #[error("User '{0}' not found")]
    UserNotFound(Uuid),

    #[error("User '{0}' is an administrator and cannot be deleted")]
    ProtectedUser(Uuid),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub fn delete_user(storage: &impl Storage, user_id: Uuid) -> Result<PublicUser, DeleteUserError> {
    let lock = storage.lock(Collection::Users)?;
    let mut users: Vec<User> = storage.load_locked(&lock)?;

    let position = users
        .iter()
        .position(|u| u.id == user_id)
        .ok_or(DeleteUserError::UserNotFound(user_id))?;

    if users[position].role == Role::Admin {
        return Err(DeleteUserError::ProtectedUser(user_id));
    }

    let removed = users.remove(position);
    storage.save(Collection::Users, &users)?;

    info!(user_id = %user_id, "deleted user");
    Ok(PublicUser::from(removed))
}
