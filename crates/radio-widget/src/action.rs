//! Action enum: everything a key press can ask the app to do.

use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Volume slider step, in percentage points.
pub const VOLUME_STEP: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    // ── Playback ─────────────────────────────────────────────────────────────
    TogglePlay,
    Volume(i32), // relative step
    Mute,

    // ── Preferences ──────────────────────────────────────────────────────────
    ToggleTheme,
    ToggleNotifications,

    // ── Song ─────────────────────────────────────────────────────────────────
    ToggleFavorite,
    Share,

    // ── Favorites list ───────────────────────────────────────────────────────
    SelectUp,
    SelectDown,
    RemoveSelected,

    // ── System ───────────────────────────────────────────────────────────────
    ToggleHelp,
    Quit,
}

/// Map a key press to an action.
pub fn action_for_key(key: KeyEvent) -> Option<Action> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') => Some(Action::Quit),
            _ => None,
        };
    }
    let action = match key.code {
        KeyCode::Char(' ') => Action::TogglePlay,
        KeyCode::Up | KeyCode::Char('+') => Action::Volume(VOLUME_STEP),
        KeyCode::Down | KeyCode::Char('-') => Action::Volume(-VOLUME_STEP),
        KeyCode::Char('m') | KeyCode::Char('M') => Action::Mute,
        KeyCode::Char('t') | KeyCode::Char('T') => Action::ToggleTheme,
        KeyCode::Char('n') | KeyCode::Char('N') => Action::ToggleNotifications,
        KeyCode::Char('h') | KeyCode::Char('H') => Action::ToggleFavorite,
        KeyCode::Char('s') | KeyCode::Char('S') => Action::Share,
        KeyCode::Char('k') => Action::SelectUp,
        KeyCode::Char('j') => Action::SelectDown,
        KeyCode::Char('x') | KeyCode::Delete => Action::RemoveSelected,
        KeyCode::Char('?') => Action::ToggleHelp,
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        _ => return None,
    };
    Some(action)
}
