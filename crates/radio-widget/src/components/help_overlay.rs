//! Centered popup with the keyboard shortcut reference.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use crate::theme::Palette;

const ROWS: &[(&str, &str)] = &[
    ("space", "play / stop the stream"),
    ("↑ / ↓  or  + / -", "volume up / down 10%"),
    ("m", "mute / unmute"),
    ("h", "favorite the current song"),
    ("s", "copy the current song to the clipboard"),
    ("j / k", "move favorites selection"),
    ("x / delete", "remove selected favorite"),
    ("t", "light / dark theme"),
    ("n", "desktop notifications on / off"),
    ("?", "toggle this help"),
    ("q / ctrl+c", "quit"),
];

pub fn draw(frame: &mut Frame, area: Rect, palette: &Palette) {
    let popup = centered_rect(60, ROWS.len() as u16 + 5, area);

    let mut lines = vec![
        Line::from(Span::styled(" keyboard shortcuts", palette.title())),
        Line::from(""),
    ];
    lines.extend(ROWS.iter().map(|(key, desc)| help_row(key, desc, palette)));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(" press ? or esc to close", palette.muted())));

    frame.render_widget(Clear, popup);
    frame.render_widget(
        Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(palette.border())
                .style(palette.base()),
        ),
        popup,
    );
}

fn help_row<'a>(key: &'a str, desc: &'a str, palette: &Palette) -> Line<'a> {
    Line::from(vec![
        Span::raw(" "),
        Span::styled(
            format!("{:<18}", key),
            Style::default()
                .fg(palette.primary)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(desc, palette.secondary()),
    ])
}

fn centered_rect(percent_x: u16, height: u16, r: Rect) -> Rect {
    let vert = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(height),
            Constraint::Min(0),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vert[1])[1]
}
