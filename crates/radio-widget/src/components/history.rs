//! Recently played list, as sent by the station.

use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem},
    Frame,
};

use radio_core::track::{HistoryEntry, NO_DATA};

use super::truncate;
use crate::theme::Palette;

pub fn draw(frame: &mut Frame, area: Rect, history: &[HistoryEntry], palette: &Palette) {
    let block = Block::default()
        .borders(Borders::TOP)
        .border_style(palette.border())
        .title(Span::styled(" Recently played ", palette.secondary()));
    let label_width = area.width.saturating_sub(8) as usize;

    let items: Vec<ListItem> = if history.is_empty() {
        vec![ListItem::new(Line::from(Span::styled(
            format!(" {}", NO_DATA),
            palette.muted(),
        )))]
    } else {
        history
            .iter()
            .map(|entry| {
                ListItem::new(Line::from(vec![
                    Span::styled(format!(" {} ", entry.time), palette.muted()),
                    Span::raw(truncate(&entry.label, label_width)),
                ]))
            })
            .collect()
    };
    frame.render_widget(List::new(items).block(block), area);
}
