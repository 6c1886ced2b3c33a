//! Persisted records and input forms

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Account type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    #[serde(alias = "user")]
    Regular,
    Admin,
}

impl Default for AccountType {
    fn default() -> Self {
        Self::Regular
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountType::Regular => write!(f, "regular"),
            AccountType::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "regular" | "user" => Ok(Self::Regular),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown account type: {}", other)),
        }
    }
}

/// Profile details attached to a user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub avatar: Option<String>,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
}

impl Profile {
    /// Merge the set fields of a patch into this profile
    pub fn apply(&mut self, patch: &ProfileUpdate) {
        if let Some(avatar) = &patch.avatar {
            self.avatar = Some(avatar.clone());
        }
        if let Some(phone) = &patch.phone {
            self.phone = phone.clone();
        }
        if let Some(address) = &patch.address {
            self.address = address.clone();
        }
        if let Some(bio) = &patch.bio {
            self.bio = bio.clone();
        }
        if let Some(position) = &patch.position {
            self.position = Some(position.clone());
        }
    }
}

/// User record stored in the `users` list
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub user_type: AccountType,
    /// Argon2 PHC hash
    pub password: String,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    #[serde(default)]
    pub profile: Profile,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_request_id: Option<String>,
}

/// User info held by a session (no password)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub user_type: AccountType,
    #[serde(default)]
    pub profile: Profile,
}

impl From<&User> for SessionUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            user_type: user.user_type,
            profile: user.profile.clone(),
        }
    }
}

impl SessionUser {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Two-letter initials for avatars
    pub fn initials(&self) -> String {
        self.first_name
            .chars()
            .take(1)
            .chain(self.last_name.chars().take(1))
            .collect::<String>()
            .to_uppercase()
    }
}

/// Result of a successful login
#[derive(Debug, Clone)]
pub struct Session {
    pub user: SessionUser,
    pub token: String,
    pub remember_me: bool,
}

/// Admin request status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestStatus::Pending => write!(f, "pending"),
            RequestStatus::Approved => write!(f, "approved"),
            RequestStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// A request for an admin account
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminRequest {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub reason: String,
    pub status: RequestStatus,
    pub request_date: DateTime<Utc>,
    pub processed_date: Option<DateTime<Utc>>,
    pub processed_by: Option<String>,
}

/// A simulated email stored in `emailNotifications`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailNotification {
    pub id: String,
    pub subject: String,
    pub body: String,
    pub recipient: String,
    pub sent_at: DateTime<Utc>,
    pub read: bool,
}

/// Registration form input
#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub user_type: AccountType,
    pub password: String,
    pub confirm_password: String,
}

/// Partial profile update; `None` fields are left untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub avatar: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub bio: Option<String>,
    pub position: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.avatar.is_none()
            && self.phone.is_none()
            && self.address.is_none()
            && self.bio.is_none()
            && self.position.is_none()
    }
}

/// Admin request form input
#[derive(Debug, Clone, Default)]
pub struct AdminRequestForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub position: String,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_type_accepts_legacy_user() {
        let parsed: AccountType = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(parsed, AccountType::Regular);
        assert_eq!(serde_json::to_string(&AccountType::Admin).unwrap(), "\"admin\"");
    }

    #[test]
    fn test_profile_merge_keeps_unset_fields() {
        let mut profile = Profile {
            phone: "0501234567".into(),
            bio: "hello".into(),
            ..Default::default()
        };

        profile.apply(&ProfileUpdate {
            bio: Some("updated".into()),
            ..Default::default()
        });

        assert_eq!(profile.phone, "0501234567");
        assert_eq!(profile.bio, "updated");
    }

    #[test]
    fn test_session_user_initials() {
        let user = SessionUser {
            id: "1".into(),
            first_name: "sara".into(),
            last_name: "khan".into(),
            email: "sara@example.com".into(),
            user_type: AccountType::Regular,
            profile: Profile::default(),
        };
        assert_eq!(user.initials(), "SK");
    }

    #[test]
    fn test_user_serializes_camel_case() {
        let user = User {
            id: "1".into(),
            first_name: "A".into(),
            last_name: "B".into(),
            email: "a@b.co".into(),
            user_type: AccountType::Regular,
            password: "hash".into(),
            created_at: Utc::now(),
            last_login: None,
            profile: Profile::default(),
            admin_request_id: None,
        };

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("firstName").is_some());
        assert!(json.get("userType").is_some());
        assert!(json.get("adminRequestId").is_none());
    }
}
