//! Auth Service Integration Tests
//!
//! Exercises the service against a SQLite durable tier to check what
//! survives a restart.

use localauth::storage::keys;
use localauth::{
    AccountType, AdminRequestForm, AuthConfig, AuthError, AuthService, KeyValueStore, MemoryStore,
    RegistrationForm, RequestStatus, SqliteStore, StorageTiers,
};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const SECRET: &str = "integration-secret-at-least-32-characters";

fn config() -> AuthConfig {
    AuthConfig {
        token_secret: SECRET.to_string(),
        ..Default::default()
    }
}

/// A fresh process: same durable file, new volatile tier
fn open_service(db_path: &Path) -> (AuthService, Arc<SqliteStore>) {
    let durable = Arc::new(SqliteStore::open(db_path).expect("Failed to open store"));
    let tiers = StorageTiers::new(durable.clone(), Arc::new(MemoryStore::new()));
    (AuthService::new(tiers, config()).expect("Failed to create service"), durable)
}

fn create_test_db(name: &str) -> (TempDir, std::path::PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join(format!("{}.db", name));
    (temp_dir, db_path)
}

fn registration(email: &str) -> RegistrationForm {
    RegistrationForm {
        first_name: "Nadia".into(),
        last_name: "Karim".into(),
        email: email.into(),
        user_type: AccountType::Regular,
        password: "secret12".into(),
        confirm_password: "secret12".into(),
    }
}

#[test]
fn test_users_survive_restart() {
    let (_temp, db_path) = create_test_db("users");

    {
        let (auth, _) = open_service(&db_path);
        auth.register(&registration("nadia@example.com")).unwrap();
    }

    let (auth, _) = open_service(&db_path);
    assert_eq!(auth.users().len(), 1);
    assert!(auth.login("nadia@example.com", "secret12", false).is_ok());
}

#[test]
fn test_remembered_session_survives_restart() {
    let (_temp, db_path) = create_test_db("remember");

    {
        let (auth, _) = open_service(&db_path);
        auth.register(&registration("nadia@example.com")).unwrap();
        auth.login("nadia@example.com", "secret12", true).unwrap();
    }

    let (auth, _) = open_service(&db_path);
    assert!(auth.is_logged_in());
    assert_eq!(auth.current_user().unwrap().email, "nadia@example.com");
}

#[test]
fn test_unremembered_session_ends_with_process() {
    let (_temp, db_path) = create_test_db("volatile");

    {
        let (auth, _) = open_service(&db_path);
        auth.register(&registration("nadia@example.com")).unwrap();
        auth.login("nadia@example.com", "secret12", false).unwrap();
        assert!(auth.is_logged_in());
    }

    let (auth, _) = open_service(&db_path);
    assert!(!auth.is_logged_in());
}

#[test]
fn test_forged_session_is_cleared() {
    let (_temp, db_path) = create_test_db("forged");

    let user_id = {
        let (auth, _) = open_service(&db_path);
        auth.register(&registration("nadia@example.com")).unwrap().id
    };

    // An unsigned base64 blob with a far-future expiry
    let durable = SqliteStore::open(&db_path).unwrap();
    let forged = format!("{{\"userId\":\"{}\",\"exp\":99999999999999}}", user_id);
    durable.set(keys::USER_TOKEN, &forged).unwrap();
    durable
        .set(
            keys::CURRENT_USER,
            &format!(
                "{{\"id\":\"{}\",\"firstName\":\"Nadia\",\"lastName\":\"Karim\",\"email\":\"nadia@example.com\",\"userType\":\"admin\"}}",
                user_id
            ),
        )
        .unwrap();
    drop(durable);

    let (auth, durable) = open_service(&db_path);
    assert!(!auth.is_logged_in());
    assert!(durable.get(keys::USER_TOKEN).unwrap().is_none());
    assert!(durable.get(keys::CURRENT_USER).unwrap().is_none());
}

#[test]
fn test_token_from_other_secret_is_invalid() {
    let (_temp, db_path) = create_test_db("secret");
    let (auth, _) = open_service(&db_path);
    auth.register(&registration("nadia@example.com")).unwrap();
    let session = auth.login("nadia@example.com", "secret12", true).unwrap();

    let other = AuthService::new(StorageTiers::in_memory(), AuthConfig::default()).unwrap();
    assert!(!other.validate_token(&session.token));
    assert!(auth.validate_token(&session.token));
}

#[test]
fn test_corrupt_user_list_reads_as_empty() {
    let (_temp, db_path) = create_test_db("corrupt");
    {
        let durable = SqliteStore::open(&db_path).unwrap();
        durable.set(keys::USERS, "[{\"broken\": ").unwrap();
    }

    let (auth, _) = open_service(&db_path);
    assert!(auth.users().is_empty());
    assert!(matches!(
        auth.login("nadia@example.com", "secret12", false),
        Err(AuthError::InvalidCredentials)
    ));
}

#[test]
fn test_admin_approval_workflow() {
    let (_temp, db_path) = create_test_db("approval");

    let request_id = {
        let (auth, _) = open_service(&db_path);
        auth.submit_admin_request(&AdminRequestForm {
            first_name: "Yusuf".into(),
            last_name: "Ali".into(),
            email: "yusuf@example.com".into(),
            phone: "0509998888".into(),
            position: "Moderator".into(),
            reason: "Help with reviews".into(),
        })
        .unwrap()
        .id
    };

    // Decided by a logged-in admin in a later process
    let (auth, _) = open_service(&db_path);
    auth.register(&RegistrationForm {
        user_type: AccountType::Admin,
        ..registration("boss@example.com")
    })
    .unwrap();
    let boss = auth.login("boss@example.com", "secret12", false).unwrap();
    assert!(auth.can_approve_admin_requests());

    let processed = auth.handle_admin_approval(&request_id, true).unwrap();
    assert_eq!(processed.status, RequestStatus::Approved);
    assert_eq!(processed.processed_by.as_deref(), Some(boss.user.id.as_str()));
    assert!(processed.processed_date.is_some());

    let (auth, _) = open_service(&db_path);
    let created: Vec<_> = auth
        .users()
        .into_iter()
        .filter(|u| u.admin_request_id.as_deref() == Some(request_id.as_str()))
        .collect();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].user_type, AccountType::Admin);
    assert_eq!(created[0].profile.phone, "0509998888");
    assert_eq!(auth.all_admin_requests().len(), 1);
    assert!(auth.pending_admin_requests().is_empty());

    // Approved admins log in with the default password and must change it
    auth.login("yusuf@example.com", "admin123", false).unwrap();
    auth.change_password("admin123", "a-better-one").unwrap();
    auth.logout().unwrap();
    assert!(auth.login("yusuf@example.com", "a-better-one", false).is_ok());
}

#[test]
fn test_non_admin_cannot_approve_flag() {
    let auth = AuthService::new(StorageTiers::in_memory(), config()).unwrap();
    auth.register(&registration("nadia@example.com")).unwrap();
    auth.login("nadia@example.com", "secret12", false).unwrap();

    assert!(auth.has_role(AccountType::Regular));
    assert!(!auth.is_admin());
    assert!(!auth.can_approve_admin_requests());
}
