//! New-track desktop notifications.
//!
//! Two halves:
//! - `NotificationGate`, pure state: the persisted wish plus the remembered
//!   permission decision, and the enable/disable flow.
//! - `DesktopNotifier`, the side effect: raising a notification through the
//!   desktop notifier command (`notify-send` / `osascript`).

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::store::{keys, KeyValueStore, StoreError};
use crate::track::Track;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
    /// Not asked yet; enabling triggers an interactive request.
    Default,
    /// No notifier available on this system.
    Unsupported,
}

impl Permission {
    fn from_stored(raw: Option<&str>) -> Self {
        match raw {
            Some("granted") => Permission::Granted,
            Some("denied") => Permission::Denied,
            _ => Permission::Default,
        }
    }
}

/// Result of pressing the notification toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleStep {
    Enabled,
    Disabled,
    Blocked,
    Unsupported,
    /// Permission must be requested first; call `finish_request` with the answer.
    NeedsPermission,
    /// The request came back refused.
    Declined,
}

#[derive(Debug, Clone)]
pub struct NotificationGate {
    enabled: bool,
    permission: Permission,
}

impl NotificationGate {
    /// `wanted` is the persisted `notifications` flag.  It only takes effect
    /// when permission is already granted.
    pub fn load(
        store: &impl KeyValueStore,
        wanted: bool,
        supported: bool,
        allowed: bool,
    ) -> Self {
        let permission = if !supported {
            Permission::Unsupported
        } else if !allowed {
            Permission::Denied
        } else {
            Permission::from_stored(store.get(keys::NOTIFICATION_PERMISSION).as_deref())
        };
        Self {
            enabled: wanted && permission == Permission::Granted,
            permission,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn permission(&self) -> Permission {
        self.permission
    }

    /// Whether a detected track change should raise a notification.
    pub fn should_notify(&self) -> bool {
        self.enabled && self.permission == Permission::Granted
    }

    pub fn toggle(&mut self) -> ToggleStep {
        if self.permission == Permission::Unsupported {
            return ToggleStep::Unsupported;
        }
        if self.enabled {
            self.enabled = false;
            return ToggleStep::Disabled;
        }
        match self.permission {
            Permission::Denied => ToggleStep::Blocked,
            Permission::Default => ToggleStep::NeedsPermission,
            Permission::Granted => {
                self.enabled = true;
                ToggleStep::Enabled
            }
            Permission::Unsupported => ToggleStep::Unsupported,
        }
    }

    /// Record the answer to an interactive request and remember it.
    pub fn finish_request(
        &mut self,
        granted: bool,
        store: &mut impl KeyValueStore,
    ) -> Result<ToggleStep, StoreError> {
        self.permission = if granted {
            Permission::Granted
        } else {
            Permission::Denied
        };
        let stored = if granted { "granted" } else { "denied" };
        let step = if granted {
            self.enabled = true;
            ToggleStep::Enabled
        } else {
            ToggleStep::Declined
        };
        store.set(keys::NOTIFICATION_PERMISSION, stored)?;
        Ok(step)
    }
}

/// What gets shown for a new track.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackNotification {
    pub summary: String,
    pub body: String,
    /// Remote artwork; the caller may swap in a cached local file.
    pub icon_url: Option<String>,
}

impl TrackNotification {
    pub fn for_track(track: &Track) -> Self {
        Self {
            summary: format!("♪ {}", track.title_or_unknown()),
            body: track.artist_or_unknown().to_string(),
            icon_url: track.artist_image_url.clone(),
        }
    }
}

// ── Desktop notifier ──────────────────────────────────────────────────────────

/// Shells out to the platform notifier command.
#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    binary: Option<PathBuf>,
    app_name: String,
}

impl DesktopNotifier {
    pub fn new(app_name: impl Into<String>) -> Self {
        let binary = crate::platform::find_notifier_binary();
        debug!("notify: notifier binary {:?}", binary);
        Self {
            binary,
            app_name: app_name.into(),
        }
    }

    pub fn is_supported(&self) -> bool {
        self.binary.is_some()
    }

    /// Raise one notification.  `icon` is a local file when available.
    pub async fn show(
        &self,
        summary: &str,
        body: &str,
        icon: Option<PathBuf>,
    ) -> anyhow::Result<()> {
        let binary = self
            .binary
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("no desktop notifier available"))?;
        let status = self
            .command(binary, summary, body, icon)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .await?;
        if !status.success() {
            anyhow::bail!("notifier exited with {}", status);
        }
        Ok(())
    }

    #[cfg(target_os = "macos")]
    fn command(
        &self,
        binary: &Path,
        summary: &str,
        body: &str,
        _icon: Option<PathBuf>,
    ) -> tokio::process::Command {
        let script = format!(
            "display notification {} with title {} subtitle {}",
            applescript_quote(body),
            applescript_quote(&self.app_name),
            applescript_quote(summary),
        );
        let mut cmd = tokio::process::Command::new(binary);
        cmd.arg("-e").arg(script);
        cmd
    }

    #[cfg(not(target_os = "macos"))]
    fn command(
        &self,
        binary: &Path,
        summary: &str,
        body: &str,
        icon: Option<PathBuf>,
    ) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(binary);
        cmd.arg("--app-name")
            .arg(&self.app_name)
            // Replace the previous song's bubble where supported
            .arg("--hint=string:x-canonical-private-synchronous:song");
        if let Some(icon) = icon {
            cmd.arg("--icon").arg(icon);
        }
        cmd.arg(summary).arg(body);
        cmd
    }
}

#[cfg(target_os = "macos")]
fn applescript_quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_unsupported_never_enables() {
        let store = MemoryStore::new();
        let mut gate = NotificationGate::load(&store, true, false, true);
        assert!(!gate.is_enabled());
        assert_eq!(gate.toggle(), ToggleStep::Unsupported);
        assert!(!gate.should_notify());
    }

    #[test]
    fn test_default_requests_then_remembers() {
        let mut store = MemoryStore::new();
        let mut gate = NotificationGate::load(&store, false, true, true);
        assert_eq!(gate.permission(), Permission::Default);
        assert_eq!(gate.toggle(), ToggleStep::NeedsPermission);
        assert!(!gate.is_enabled());

        assert_eq!(
            gate.finish_request(true, &mut store).unwrap(),
            ToggleStep::Enabled
        );
        assert!(gate.should_notify());

        // next start: wish + remembered grant → enabled
        let reloaded = NotificationGate::load(&store, true, true, true);
        assert!(reloaded.is_enabled());
    }

    #[test]
    fn test_declined_request_is_terminal() {
        let mut store = MemoryStore::new();
        let mut gate = NotificationGate::load(&store, false, true, true);
        gate.toggle();
        assert_eq!(
            gate.finish_request(false, &mut store).unwrap(),
            ToggleStep::Declined
        );
        assert_eq!(gate.toggle(), ToggleStep::Blocked);
        assert_eq!(
            NotificationGate::load(&store, true, true, true).permission(),
            Permission::Denied
        );
    }

    #[test]
    fn test_wish_without_grant_stays_off() {
        let store = MemoryStore::new();
        let gate = NotificationGate::load(&store, true, true, true);
        assert!(!gate.is_enabled());
    }

    #[test]
    fn test_config_disallow_is_denied() {
        let mut store = MemoryStore::new();
        store
            .set(keys::NOTIFICATION_PERMISSION, "granted")
            .unwrap();
        let mut gate = NotificationGate::load(&store, true, true, false);
        assert!(!gate.is_enabled());
        assert_eq!(gate.toggle(), ToggleStep::Blocked);
    }

    #[test]
    fn test_enabled_toggle_disables() {
        let mut store = MemoryStore::new();
        store
            .set(keys::NOTIFICATION_PERMISSION, "granted")
            .unwrap();
        let mut gate = NotificationGate::load(&store, true, true, true);
        assert_eq!(gate.toggle(), ToggleStep::Disabled);
        assert_eq!(gate.toggle(), ToggleStep::Enabled);
    }

    #[test]
    fn test_track_notification_text() {
        let track = Track {
            title: Some("Song A".into()),
            artist_name: Some("Band".into()),
            ..Track::default()
        };
        let n = TrackNotification::for_track(&track);
        assert_eq!(n.summary, "♪ Song A");
        assert_eq!(n.body, "Band");
        assert_eq!(n.icon_url, None);
    }
}
