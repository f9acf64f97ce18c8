//! Bottom bar with playback state and keybindings, plus separators.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use radio_core::playback::PlaybackState;

use crate::theme::Palette;

const KEYS: &str = "Space play/stop  ↑↓ vol  m mute  h fav  s share  j/k x favorites  t theme  n notify  ? help  q quit";

/// Status dot color for the current playback state.
pub fn state_color(state: PlaybackState, palette: &Palette) -> ratatui::style::Color {
    match state {
        PlaybackState::Playing => palette.playing,
        PlaybackState::Loading | PlaybackState::Error => palette.connecting,
        PlaybackState::Paused | PlaybackState::Idle => palette.muted,
    }
}

/// Draw the keybindings footer bar (one row).
pub fn draw_keys_bar(
    frame: &mut Frame,
    area: Rect,
    palette: &Palette,
    state: PlaybackState,
    status: &str,
) {
    let line = Line::from(vec![
        Span::styled(
            format!(" ● {} ", status),
            Style::default()
                .fg(state_color(state, palette))
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!(" {}", KEYS), palette.muted()),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

/// Draw a horizontal separator line.
pub fn draw_separator(frame: &mut Frame, area: Rect, palette: &Palette) {
    let line = Line::from(Span::styled("─".repeat(area.width as usize), palette.border()));
    frame.render_widget(Paragraph::new(line), area);
}
