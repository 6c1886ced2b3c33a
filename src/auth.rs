//! Authentication Service
//!
//! Registration, login, session tokens and the admin-approval workflow over
//! the two storage tiers.
//!
//! # Storage layout
//!
//! - `users` (durable): the full user list, rewritten on every change
//! - `userToken` / `currentUser`: the active session, in the durable tier when
//!   "remember me" was chosen at login and in the volatile tier otherwise
//! - `adminRequests` (durable): admin account requests with their status
//!
//! Lookups are linear scans. Nothing guards against a second process writing
//! the same durable file; the last writer wins.

use chrono::{Duration, Utc};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::AuthError;
use crate::models::{
    AccountType, AdminRequest, AdminRequestForm, Profile, ProfileUpdate, RegistrationForm,
    RequestStatus, Session, SessionUser, User,
};
use crate::password::{hash_password, verify_password};
use crate::storage::{keys, read_json, write_json, KeyValueStore, StorageTiers};
use crate::token::{Claims, TokenIssuer, DEFAULT_TOKEN_LIFETIME_DAYS};

/// Minimum password length
pub const DEFAULT_MIN_PASSWORD_LEN: usize = 6;

/// Password given to accounts created by admin approval
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

/// Recorded as the approver when nobody is logged in
const SYSTEM_ACTOR: &str = "system";

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

/// Authentication configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Token signing secret
    pub token_secret: String,
    /// Token lifetime in days
    pub token_lifetime_days: i64,
    pub min_password_len: usize,
    /// Initial password of approved admin accounts
    pub default_admin_password: String,
}

impl AuthConfig {
    /// Token lifetime as a duration; must be positive and representable
    pub fn token_lifetime(&self) -> Result<Duration, AuthError> {
        if self.token_lifetime_days <= 0 {
            return Err(AuthError::Config(format!(
                "token lifetime must be positive, got {} days",
                self.token_lifetime_days
            )));
        }

        Duration::try_days(self.token_lifetime_days).ok_or_else(|| {
            AuthError::Config(format!(
                "token lifetime of {} days is out of range",
                self.token_lifetime_days
            ))
        })
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: random_secret(),
            token_lifetime_days: DEFAULT_TOKEN_LIFETIME_DAYS,
            min_password_len: DEFAULT_MIN_PASSWORD_LEN,
            default_admin_password: DEFAULT_ADMIN_PASSWORD.to_string(),
        }
    }
}

/// Generate a random signing secret (development only)
pub fn random_secret() -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

    (0..64)
        .map(|_| ALPHABET[rand::random::<usize>() % ALPHABET.len()] as char)
        .collect()
}

/// Check an email address against the accepted format
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

/// Validate registration input.
///
/// Checks run in order: required fields, password confirmation, password
/// length, email format.
pub fn validate_registration(form: &RegistrationForm, min_password_len: usize) -> Result<(), AuthError> {
    if [&form.first_name, &form.last_name, &form.email, &form.password]
        .iter()
        .any(|field| field.trim().is_empty())
    {
        return Err(AuthError::MissingFields);
    }

    if form.password != form.confirm_password {
        return Err(AuthError::PasswordMismatch);
    }

    if form.password.chars().count() < min_password_len {
        return Err(AuthError::PasswordTooShort(min_password_len));
    }

    if !is_valid_email(&form.email) {
        return Err(AuthError::InvalidEmail);
    }

    Ok(())
}

/// Password check that treats an unreadable stored hash as a mismatch
fn password_matches(password: &str, hash: &str) -> bool {
    match verify_password(password, hash) {
        Ok(matches) => matches,
        Err(e) => {
            warn!("Stored password hash unreadable: {}", e);
            false
        }
    }
}

/// Authentication service
pub struct AuthService {
    tiers: StorageTiers,
    issuer: TokenIssuer,
    /// In-memory copy of the `users` list
    users: RwLock<Vec<User>>,
    /// Logged-in user, if any
    current_user: RwLock<Option<SessionUser>>,
    pub config: AuthConfig,
}

impl AuthService {
    /// Load state from storage and restore any live session
    pub fn new(tiers: StorageTiers, config: AuthConfig) -> Result<Self, AuthError> {
        let issuer = TokenIssuer::new(&config.token_secret, config.token_lifetime()?);
        let users: Vec<User> = read_json(tiers.durable.as_ref(), keys::USERS).unwrap_or_default();

        debug!("Loaded {} users", users.len());

        let service = Self {
            tiers,
            issuer,
            users: RwLock::new(users),
            current_user: RwLock::new(None),
            config,
        };
        service.check_auth_status();
        Ok(service)
    }

    /// Token issuer used for sessions
    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    fn persist_users(&self, users: &[User]) -> Result<(), AuthError> {
        write_json(self.tiers.durable.as_ref(), keys::USERS, users)?;
        Ok(())
    }

    /// Snapshot of all users
    pub fn users(&self) -> Vec<User> {
        self.users.read().clone()
    }

    pub fn find_user_by_email(&self, email: &str) -> Option<User> {
        self.users.read().iter().find(|u| u.email == email).cloned()
    }

    /// Whether any admin account has been created
    pub fn admin_exists(&self) -> bool {
        self.users.read().iter().any(|u| u.user_type == AccountType::Admin)
    }

    // ------------------------------------------------------------------------
    // Registration and login
    // ------------------------------------------------------------------------

    /// Register a new user
    pub fn register(&self, form: &RegistrationForm) -> Result<User, AuthError> {
        validate_registration(form, self.config.min_password_len)?;

        let mut users = self.users.write();

        if users.iter().any(|u| u.email == form.email) {
            warn!("Registration rejected, email already registered: {}", form.email);
            return Err(AuthError::EmailTaken);
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            first_name: form.first_name.clone(),
            last_name: form.last_name.clone(),
            email: form.email.clone(),
            user_type: form.user_type,
            password: hash_password(&form.password)?,
            created_at: Utc::now(),
            last_login: None,
            profile: Profile::default(),
            admin_request_id: None,
        };

        let mut updated = users.clone();
        updated.push(user.clone());
        self.persist_users(&updated)?;
        *users = updated;

        info!("Registered user {} ({})", user.email, user.id);
        Ok(user)
    }

    /// Log in and start a session.
    ///
    /// Unknown email and wrong password fail with the same error.
    pub fn login(&self, email: &str, password: &str, remember_me: bool) -> Result<Session, AuthError> {
        let session_user = {
            let mut users = self.users.write();

            let idx = users
                .iter()
                .position(|u| u.email == email)
                .filter(|&idx| password_matches(password, &users[idx].password));

            let Some(idx) = idx else {
                warn!("Failed login attempt for {}", email);
                return Err(AuthError::InvalidCredentials);
            };

            let mut updated = users.clone();
            updated[idx].last_login = Some(Utc::now());
            self.persist_users(&updated)?;
            *users = updated;

            SessionUser::from(&users[idx])
        };

        let token = self.issuer.issue(&session_user.id)?;
        self.write_session(&session_user, &token, remember_me)?;
        *self.current_user.write() = Some(session_user.clone());

        info!("User {} logged in (remember: {})", session_user.email, remember_me);

        Ok(Session {
            user: session_user,
            token,
            remember_me,
        })
    }

    /// Store the session in the tier chosen by `remember_me`
    fn write_session(&self, user: &SessionUser, token: &str, remember_me: bool) -> Result<(), AuthError> {
        self.remove_session_keys()?;

        let store = if remember_me {
            self.tiers.durable.as_ref()
        } else {
            self.tiers.volatile.as_ref()
        };

        store.set(keys::USER_TOKEN, token)?;
        write_json(store, keys::CURRENT_USER, user)?;
        Ok(())
    }

    fn remove_session_keys(&self) -> Result<(), AuthError> {
        for store in self.tiers.both() {
            store.remove(keys::USER_TOKEN)?;
            store.remove(keys::CURRENT_USER)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Tokens and session state
    // ------------------------------------------------------------------------

    /// True if the token decodes, is ours, and has not expired
    pub fn validate_token(&self, token: &str) -> bool {
        self.issuer.is_valid(token)
    }

    /// Decode a token's claims
    pub fn token_claims(&self, token: &str) -> Result<Claims, AuthError> {
        self.issuer.decode(token)
    }

    /// Restore the session from storage.
    ///
    /// The durable tier is consulted before the volatile one. Any missing,
    /// undecodable or expired piece clears the session.
    pub fn check_auth_status(&self) -> bool {
        let token = self
            .tiers
            .both()
            .into_iter()
            .find_map(|store| store.get(keys::USER_TOKEN).ok().flatten());
        let user = self
            .tiers
            .both()
            .into_iter()
            .find_map(|store| read_json::<SessionUser>(store, keys::CURRENT_USER));

        if let (Some(token), Some(user)) = (token, user) {
            match self.issuer.decode(&token) {
                Ok(claims) if claims.sub == user.id => {
                    debug!("Restored session for {}", user.email);
                    *self.current_user.write() = Some(user);
                    return true;
                }
                Ok(_) => warn!("Session token does not belong to stored user"),
                Err(_) => debug!("Stored session token rejected"),
            }
        }

        if let Err(e) = self.clear_session() {
            warn!("Failed to clear session: {}", e);
        }
        false
    }

    /// End the session in both tiers
    pub fn logout(&self) -> Result<(), AuthError> {
        let email = self.current_user.read().as_ref().map(|u| u.email.clone());
        self.clear_session()?;

        if let Some(email) = email {
            info!("User {} logged out", email);
        }
        Ok(())
    }

    fn clear_session(&self) -> Result<(), AuthError> {
        *self.current_user.write() = None;
        self.remove_session_keys()
    }

    pub fn current_user(&self) -> Option<SessionUser> {
        self.current_user.read().clone()
    }

    pub fn is_logged_in(&self) -> bool {
        self.current_user.read().is_some()
    }

    pub fn has_role(&self, role: AccountType) -> bool {
        self.current_user
            .read()
            .as_ref()
            .is_some_and(|u| u.user_type == role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(AccountType::Admin)
    }

    pub fn can_approve_admin_requests(&self) -> bool {
        self.is_admin()
    }

    fn current_user_id(&self) -> Result<String, AuthError> {
        self.current_user
            .read()
            .as_ref()
            .map(|u| u.id.clone())
            .ok_or(AuthError::NotLoggedIn)
    }

    // ------------------------------------------------------------------------
    // Account maintenance
    // ------------------------------------------------------------------------

    /// Merge a patch into the current user's profile
    pub fn update_profile(&self, patch: &ProfileUpdate) -> Result<Profile, AuthError> {
        let user_id = self.current_user_id()?;

        let profile = {
            let mut users = self.users.write();
            let idx = users
                .iter()
                .position(|u| u.id == user_id)
                .ok_or(AuthError::UserNotFound)?;

            let mut updated = users.clone();
            updated[idx].profile.apply(patch);
            let profile = updated[idx].profile.clone();
            self.persist_users(&updated)?;
            *users = updated;
            profile
        };

        let session_user = {
            let mut current = self.current_user.write();
            match current.as_mut() {
                Some(user) => {
                    user.profile = profile.clone();
                    user.clone()
                }
                None => return Ok(profile),
            }
        };

        // Rewrite the session copy wherever a session lives
        for store in self.tiers.both() {
            if store.get(keys::CURRENT_USER)?.is_some() {
                write_json(store, keys::CURRENT_USER, &session_user)?;
            }
        }

        info!("Updated profile for {}", session_user.email);
        Ok(profile)
    }

    /// Replace the current user's password
    pub fn change_password(&self, current_password: &str, new_password: &str) -> Result<(), AuthError> {
        let user_id = self.current_user_id()?;

        let mut users = self.users.write();
        let idx = users
            .iter()
            .position(|u| u.id == user_id)
            .ok_or(AuthError::UserNotFound)?;

        if !password_matches(current_password, &users[idx].password) {
            warn!("Password change rejected for {}: wrong current password", users[idx].email);
            return Err(AuthError::InvalidCredentials);
        }

        if new_password.chars().count() < self.config.min_password_len {
            return Err(AuthError::PasswordTooShort(self.config.min_password_len));
        }

        let mut updated = users.clone();
        updated[idx].password = hash_password(new_password)?;
        self.persist_users(&updated)?;
        *users = updated;

        info!("Password changed for {}", users[idx].email);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Admin requests
    // ------------------------------------------------------------------------

    fn durable(&self) -> &dyn KeyValueStore {
        self.tiers.durable.as_ref()
    }

    /// All admin requests, oldest first
    pub fn all_admin_requests(&self) -> Vec<AdminRequest> {
        read_json(self.durable(), keys::ADMIN_REQUESTS).unwrap_or_default()
    }

    pub fn pending_admin_requests(&self) -> Vec<AdminRequest> {
        self.all_admin_requests()
            .into_iter()
            .filter(|r| r.status == RequestStatus::Pending)
            .collect()
    }

    /// File a pending request for an admin account
    pub fn submit_admin_request(&self, form: &AdminRequestForm) -> Result<AdminRequest, AuthError> {
        if [&form.first_name, &form.last_name, &form.email]
            .iter()
            .any(|field| field.trim().is_empty())
        {
            return Err(AuthError::MissingFields);
        }

        if !is_valid_email(&form.email) {
            return Err(AuthError::InvalidEmail);
        }

        let request = AdminRequest {
            id: Uuid::new_v4().to_string(),
            first_name: form.first_name.clone(),
            last_name: form.last_name.clone(),
            email: form.email.clone(),
            phone: form.phone.clone(),
            position: form.position.clone(),
            reason: form.reason.clone(),
            status: RequestStatus::Pending,
            request_date: Utc::now(),
            processed_date: None,
            processed_by: None,
        };

        let mut requests = self.all_admin_requests();
        requests.push(request.clone());
        write_json(self.durable(), keys::ADMIN_REQUESTS, &requests)?;

        info!("Admin request {} filed by {}", request.id, request.email);
        Ok(request)
    }

    /// Approve or reject a pending admin request.
    ///
    /// Approval creates exactly one admin account with the default password.
    /// The request status is written before the account; if the account write
    /// fails the previous request list is restored, so a failed approval
    /// leaves the request pending and can be retried.
    pub fn handle_admin_approval(&self, request_id: &str, approved: bool) -> Result<AdminRequest, AuthError> {
        let previous = self.all_admin_requests();
        let idx = previous
            .iter()
            .position(|r| r.id == request_id)
            .ok_or_else(|| AuthError::RequestNotFound(request_id.to_string()))?;

        if previous[idx].status != RequestStatus::Pending {
            return Err(AuthError::RequestAlreadyProcessed(request_id.to_string()));
        }

        let mut request = previous[idx].clone();
        request.status = if approved {
            RequestStatus::Approved
        } else {
            RequestStatus::Rejected
        };
        request.processed_date = Some(Utc::now());
        request.processed_by = Some(
            self.current_user_id()
                .unwrap_or_else(|_| SYSTEM_ACTOR.to_string()),
        );

        let mut requests = previous.clone();
        requests[idx] = request.clone();

        if !approved {
            write_json(self.durable(), keys::ADMIN_REQUESTS, &requests)?;
            info!("Admin request {} {}", request.id, request.status);
            return Ok(request);
        }

        let mut users = self.users.write();
        if users.iter().any(|u| u.email == request.email) {
            warn!("Cannot approve {}: email already registered", request.id);
            return Err(AuthError::EmailTaken);
        }

        let admin = self.admin_user_for(&request)?;
        let mut updated = users.clone();
        updated.push(admin.clone());

        write_json(self.durable(), keys::ADMIN_REQUESTS, &requests)?;

        if let Err(e) = self.persist_users(&updated) {
            warn!("Admin account for {} not saved, reverting request: {}", request.id, e);
            if let Err(revert) = write_json(self.durable(), keys::ADMIN_REQUESTS, &previous) {
                warn!("Failed to revert admin request {}: {}", request.id, revert);
            }
            return Err(e);
        }
        *users = updated;

        info!("Created admin account {} from request {}", admin.email, request.id);
        info!("Admin request {} {}", request.id, request.status);
        Ok(request)
    }

    fn admin_user_for(&self, request: &AdminRequest) -> Result<User, AuthError> {
        Ok(User {
            id: Uuid::new_v4().to_string(),
            first_name: request.first_name.clone(),
            last_name: request.last_name.clone(),
            email: request.email.clone(),
            user_type: AccountType::Admin,
            password: hash_password(&self.config.default_admin_password)?,
            created_at: Utc::now(),
            last_login: None,
            profile: Profile {
                phone: request.phone.clone(),
                position: Some(request.position.clone()),
                ..Default::default()
            },
            admin_request_id: Some(request.id.clone()),
        })
    }
}
