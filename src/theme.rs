//! Theme Preference
//!
//! Tracks the light/dark preference, the value applied to the document
//! (`data-theme`), and whether the user has made an explicit choice. Only
//! explicit choices are persisted; the startup default and OS-driven themes
//! are applied without writing, so a later OS change can still take effect.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::storage::{keys, KeyValueStore, StorageError};

/// Document attribute carrying the theme
pub const THEME_ATTRIBUTE: &str = "data-theme";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    fn from_system(prefers_dark: bool) -> Self {
        if prefers_dark {
            Theme::Dark
        } else {
            Theme::Light
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("unknown theme: {}", other)),
        }
    }
}

/// A key press with modifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyChord {
    pub key: char,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub meta: bool,
}

impl KeyChord {
    pub fn new(key: char) -> Self {
        Self {
            key,
            ..Default::default()
        }
    }

    pub fn ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn meta(mut self) -> Self {
        self.meta = true;
        self
    }

    /// Ctrl+Shift+D, or Cmd+Shift+D
    pub fn is_toggle_shortcut(&self) -> bool {
        self.key.eq_ignore_ascii_case(&'d') && self.shift && !self.alt && (self.ctrl || self.meta)
    }
}

/// Theme controller
pub struct ThemeController {
    store: Arc<dyn KeyValueStore>,
    applied: RwLock<Theme>,
}

impl ThemeController {
    /// Apply the saved theme, or light if none is saved
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        let saved = Self::read_saved(store.as_ref());
        let theme = saved.unwrap_or_default();

        debug!("Theme initialized: {} (saved: {})", theme, saved.is_some());

        Self {
            store,
            applied: RwLock::new(theme),
        }
    }

    fn read_saved(store: &dyn KeyValueStore) -> Option<Theme> {
        match store.get(keys::THEME) {
            Ok(Some(raw)) => match raw.parse() {
                Ok(theme) => Some(theme),
                Err(e) => {
                    warn!("Ignoring saved theme: {}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to read theme: {}", e);
                None
            }
        }
    }

    pub fn current_theme(&self) -> Theme {
        *self.applied.read()
    }

    /// Attribute name and value reflected on the document
    pub fn attribute(&self) -> (&'static str, &'static str) {
        (THEME_ATTRIBUTE, self.current_theme().as_str())
    }

    /// Tooltip for the toggle control
    pub fn toggle_title(&self) -> &'static str {
        match self.current_theme() {
            Theme::Dark => "Switch to light mode",
            Theme::Light => "Switch to dark mode",
        }
    }

    /// True once a theme has been persisted
    pub fn has_explicit_choice(&self) -> bool {
        Self::read_saved(self.store.as_ref()).is_some()
    }

    /// Apply and persist a theme
    pub fn set_theme(&self, theme: Theme) -> Result<(), StorageError> {
        self.store.set(keys::THEME, theme.as_str())?;
        *self.applied.write() = theme;

        info!("Theme set to {}", theme);
        Ok(())
    }

    /// Flip between light and dark; returns the new theme
    pub fn toggle_theme(&self) -> Result<Theme, StorageError> {
        let next = self.current_theme().toggled();
        self.set_theme(next)?;
        Ok(next)
    }

    /// Toggle on the keyboard shortcut; returns whether the chord matched
    pub fn handle_shortcut(&self, chord: &KeyChord) -> Result<bool, StorageError> {
        if !chord.is_toggle_shortcut() {
            return Ok(false);
        }
        self.toggle_theme()?;
        Ok(true)
    }

    /// Follow an OS color-scheme change unless the user chose a theme
    pub fn on_system_preference_change(&self, prefers_dark: bool) -> Option<Theme> {
        self.apply_system_theme(prefers_dark)
    }

    /// Apply the OS preference unless the user chose a theme.
    ///
    /// The result is not persisted. Returns the applied theme, or `None` when
    /// an explicit choice takes precedence.
    pub fn apply_system_theme(&self, prefers_dark: bool) -> Option<Theme> {
        if self.has_explicit_choice() {
            debug!("Ignoring system theme; explicit choice saved");
            return None;
        }

        let theme = Theme::from_system(prefers_dark);
        *self.applied.write() = theme;
        debug!("Applied system theme {}", theme);
        Some(theme)
    }
}
