//! Authentication errors
//!
//! The `Display` text of each variant is the message shown to the user.

use thiserror::Error;

use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Please fill in all required fields")]
    MissingFields,

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Password must be at least {0} characters")]
    PasswordTooShort(usize),

    #[error("Please enter a valid email address")]
    InvalidEmail,

    #[error("Email address is already registered")]
    EmailTaken,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Not logged in")]
    NotLoggedIn,

    #[error("User not found")]
    UserNotFound,

    #[error("Admin request not found: {0}")]
    RequestNotFound(String),

    #[error("Admin request already processed: {0}")]
    RequestAlreadyProcessed(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
