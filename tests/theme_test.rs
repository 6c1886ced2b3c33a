//! Theme Preference Integration Tests

use localauth::storage::keys;
use localauth::{KeyValueStore, SqliteStore, Theme, ThemeController};
use std::sync::Arc;
use tempfile::TempDir;

fn open_controller(temp: &TempDir) -> (ThemeController, Arc<SqliteStore>) {
    let store = Arc::new(SqliteStore::open(&temp.path().join("prefs.db")).expect("Failed to open store"));
    (ThemeController::new(store.clone()), store)
}

#[test]
fn test_choice_survives_restart() {
    let temp = TempDir::new().unwrap();

    {
        let (theme, _) = open_controller(&temp);
        assert_eq!(theme.toggle_theme().unwrap(), Theme::Dark);
    }

    let (theme, store) = open_controller(&temp);
    assert_eq!(theme.current_theme(), Theme::Dark);
    assert_eq!(theme.attribute(), ("data-theme", "dark"));
    assert_eq!(store.get(keys::THEME).unwrap().as_deref(), Some("dark"));
}

#[test]
fn test_double_toggle_round_trips_persisted_value() {
    let temp = TempDir::new().unwrap();
    let (theme, store) = open_controller(&temp);
    theme.set_theme(Theme::Light).unwrap();

    theme.toggle_theme().unwrap();
    theme.toggle_theme().unwrap();

    assert_eq!(store.get(keys::THEME).unwrap().as_deref(), Some("light"));
}

#[test]
fn test_system_theme_not_persisted() {
    let temp = TempDir::new().unwrap();

    {
        let (theme, _) = open_controller(&temp);
        assert_eq!(theme.apply_system_theme(true), Some(Theme::Dark));
    }

    // Not saved, so a new session starts from the default again
    let (theme, _) = open_controller(&temp);
    assert!(!theme.has_explicit_choice());
    assert_eq!(theme.current_theme(), Theme::Light);
}
