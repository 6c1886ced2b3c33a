//! localauth
//!
//! Local user authentication without a backend: registration, login, signed
//! session tokens, an admin-approval workflow with simulated email, and a
//! light/dark theme preference.
//!
//! # Architecture
//!
//! ```text
//! AuthService ──┐
//! EmailService ─┼──► StorageTiers ──┬── durable  (SQLite)
//! ThemeController┘                  └── volatile (in-memory)
//! ```
//!
//! Every service is constructed with its storage injected, so tests run
//! against [`MemoryStore`] and the CLI runs against [`SqliteStore`].

pub mod auth;
pub mod config;
pub mod email;
pub mod error;
pub mod models;
pub mod password;
pub mod storage;
pub mod theme;
pub mod token;

pub use auth::{AuthConfig, AuthService};
pub use config::Config;
pub use email::EmailService;
pub use error::AuthError;
pub use models::{
    AccountType, AdminRequest, AdminRequestForm, EmailNotification, Profile, ProfileUpdate,
    RegistrationForm, RequestStatus, Session, SessionUser, User,
};
pub use storage::{KeyValueStore, MemoryStore, SqliteStore, StorageError, StorageTiers};
pub use theme::{KeyChord, Theme, ThemeController};
pub use token::{Claims, TokenIssuer};
