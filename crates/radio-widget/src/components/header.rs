//! Header: station title on the left, listener count and toggles on the right.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Modifier,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use radio_core::prefs::Theme;
use radio_core::session::Session;
use radio_core::store::KeyValueStore;
use radio_core::track::ListenerCount;

use crate::theme::Palette;

pub fn draw<S: KeyValueStore>(
    frame: &mut Frame,
    area: Rect,
    session: &Session<S>,
    station_title: &str,
    palette: &Palette,
) {
    let listeners = session
        .listeners()
        .map(|l| l.label())
        .unwrap_or_else(|| ListenerCount::Unknown.label());
    let theme_icon = match session.theme() {
        Theme::Dark => "🌙",
        Theme::Light => "☀",
    };
    let notif_icon = if session.notifications_enabled() {
        "🔔"
    } else {
        "🔕"
    };
    let right = format!("{}  {}  {} ", listeners, theme_icon, notif_icon);

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(10), Constraint::Length(right.chars().count() as u16 + 2)])
        .split(area);

    let title = Line::from(vec![
        Span::styled(" 📻 ", palette.accent()),
        Span::styled(
            station_title.to_string(),
            palette.title().add_modifier(Modifier::BOLD),
        ),
    ]);
    frame.render_widget(Paragraph::new(title), cols[0]);

    let right_line = Line::from(vec![
        Span::styled("● ", palette.accent()),
        Span::styled(right, palette.secondary()),
    ]);
    frame.render_widget(
        Paragraph::new(right_line).alignment(ratatui::layout::Alignment::Right),
        cols[1],
    );
}
