//! Scalar preferences: volume, mute, theme, notification flag.
//!
//! Read once at startup, each written back on its own when it changes.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::store::{keys, KeyValueStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

/// Volume fraction plus an independent mute flag.
///
/// Muting never touches `volume`, so unmuting restores exactly the last set
/// level.  A level of zero counts as muted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Volume {
    volume: f32,
    muted: bool,
}

impl Volume {
    pub fn new(volume: f32, muted: bool) -> Self {
        Self {
            volume: volume.clamp(0.0, 1.0),
            muted,
        }
    }

    /// Last set level, 0..=1, regardless of mute.
    pub fn level(&self) -> f32 {
        self.volume
    }

    pub fn percent(&self) -> u8 {
        (self.volume * 100.0).round() as u8
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// What the player should actually output.
    pub fn output(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.volume
        }
    }

    /// Slider input.  Values outside 0..=100 are clamped.
    pub fn set_percent(&mut self, percent: i32) {
        let p = percent.clamp(0, 100);
        self.volume = p as f32 / 100.0;
        self.muted = p == 0;
    }

    /// Step the slider by `delta` percentage points.
    pub fn step(&mut self, delta: i32) {
        self.set_percent(self.percent() as i32 + delta);
    }

    pub fn toggle_mute(&mut self) {
        self.muted = !self.muted;
    }

    /// Icon for the volume button.
    pub fn icon(&self) -> &'static str {
        if self.muted {
            "🔇"
        } else if self.percent() < 50 {
            "🔉"
        } else {
            "🔊"
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Preferences {
    pub volume: Volume,
    pub theme: Theme,
    /// The persisted wish; whether notifications actually fire also depends
    /// on permission.
    pub notifications: bool,
}

impl Preferences {
    pub fn load(store: &impl KeyValueStore, default_volume: f32) -> Self {
        let volume = match store.get(keys::VOLUME) {
            Some(raw) => match raw.trim().parse::<f32>() {
                Ok(v) if (0.0..=1.0).contains(&v) => v,
                _ => {
                    warn!("prefs: ignoring stored volume {:?}", raw);
                    default_volume
                }
            },
            None => default_volume,
        };
        let muted = store.get(keys::MUTED).as_deref() == Some("true");
        let theme = match store.get(keys::THEME).as_deref() {
            Some("light") => Theme::Light,
            _ => Theme::Dark,
        };
        let notifications = store.get(keys::NOTIFICATIONS).as_deref() == Some("true");

        Self {
            volume: Volume::new(volume, muted),
            theme,
            notifications,
        }
    }

    pub fn save_volume(&self, store: &mut impl KeyValueStore) -> Result<(), StoreError> {
        store.set(keys::VOLUME, &self.volume.level().to_string())?;
        self.save_muted(store)
    }

    pub fn save_muted(&self, store: &mut impl KeyValueStore) -> Result<(), StoreError> {
        store.set(keys::MUTED, bool_str(self.volume.is_muted()))
    }

    pub fn save_theme(&self, store: &mut impl KeyValueStore) -> Result<(), StoreError> {
        store.set(keys::THEME, self.theme.as_str())
    }

    pub fn save_notifications(&self, store: &mut impl KeyValueStore) -> Result<(), StoreError> {
        store.set(keys::NOTIFICATIONS, bool_str(self.notifications))
    }
}

fn bool_str(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_mute_unmute_restores_volume() {
        let mut v = Volume::new(0.55, false);
        v.toggle_mute();
        assert!(v.is_muted());
        assert_eq!(v.output(), 0.0);
        v.toggle_mute();
        assert!(!v.is_muted());
        assert_eq!(v.level(), 0.55);
        assert_eq!(v.output(), 0.55);
    }

    #[test]
    fn test_zero_volume_mutes_and_raise_unmutes() {
        let mut v = Volume::new(0.7, false);
        v.set_percent(0);
        assert!(v.is_muted());
        assert_eq!(v.icon(), "🔇");

        v.set_percent(40);
        assert!(!v.is_muted());
        assert!((v.level() - 0.40).abs() < f32::EPSILON);
        assert_eq!(v.icon(), "🔉");
    }

    #[test]
    fn test_set_percent_clamps() {
        let mut v = Volume::new(0.5, false);
        v.set_percent(250);
        assert_eq!(v.percent(), 100);
        v.step(-300);
        assert_eq!(v.percent(), 0);
        assert!(v.is_muted());
    }

    #[test]
    fn test_load_defaults_and_coercion() {
        let mut store = MemoryStore::new();
        let prefs = Preferences::load(&store, 0.7);
        assert_eq!(prefs.volume.percent(), 70);
        assert!(!prefs.volume.is_muted());
        assert_eq!(prefs.theme, Theme::Dark);
        assert!(!prefs.notifications);

        store.set(keys::VOLUME, "3.5").unwrap();
        store.set(keys::MUTED, "yes").unwrap();
        store.set(keys::THEME, "solarized").unwrap();
        let prefs = Preferences::load(&store, 0.7);
        assert_eq!(prefs.volume.percent(), 70);
        assert!(!prefs.volume.is_muted());
        assert_eq!(prefs.theme, Theme::Dark);
    }

    #[test]
    fn test_save_and_reload() {
        let mut store = MemoryStore::new();
        let mut prefs = Preferences::load(&store, 0.7);
        prefs.volume.set_percent(25);
        prefs.theme = Theme::Light;
        prefs.notifications = true;
        prefs.save_volume(&mut store).unwrap();
        prefs.save_theme(&mut store).unwrap();
        prefs.save_notifications(&mut store).unwrap();

        let reloaded = Preferences::load(&store, 0.7);
        assert_eq!(reloaded, prefs);
    }
}
