//! Favorites list with a movable selection for removal.

use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
    Frame,
};

use super::truncate;
use crate::theme::Palette;

/// Selection over the favorites list.  The list itself lives in the session;
/// this only tracks which row is highlighted.
#[derive(Debug, Default)]
pub struct FavoritesPanel {
    list_state: ListState,
}

impl FavoritesPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> Option<usize> {
        self.list_state.selected()
    }

    pub fn select_next(&mut self, len: usize) {
        if len == 0 {
            self.list_state.select(None);
            return;
        }
        let next = match self.list_state.selected() {
            Some(i) => (i + 1).min(len - 1),
            None => 0,
        };
        self.list_state.select(Some(next));
    }

    pub fn select_prev(&mut self, len: usize) {
        if len == 0 {
            self.list_state.select(None);
            return;
        }
        let prev = match self.list_state.selected() {
            Some(i) => i.saturating_sub(1),
            None => 0,
        };
        self.list_state.select(Some(prev));
    }

    /// Keep the selection in range after the list changed.
    pub fn sync(&mut self, len: usize) {
        match self.list_state.selected() {
            Some(_) if len == 0 => self.list_state.select(None),
            Some(i) if i >= len => self.list_state.select(Some(len - 1)),
            _ => {}
        }
    }

    pub fn draw(&mut self, frame: &mut Frame, area: Rect, favorites: &[String], palette: &Palette) {
        let block = Block::default()
            .borders(Borders::TOP)
            .border_style(palette.border())
            .title(Span::styled(
                format!(" Favorites ({}) ", favorites.len()),
                palette.secondary(),
            ));
        let width = area.width.saturating_sub(4) as usize;

        if favorites.is_empty() {
            let empty = ListItem::new(Line::from(Span::styled(
                " No favorites saved yet",
                palette.muted(),
            )));
            frame.render_widget(List::new(vec![empty]).block(block), area);
            return;
        }

        let items: Vec<ListItem> = favorites
            .iter()
            .map(|fav| ListItem::new(Line::from(format!(" ♪ {}", truncate(fav, width)))))
            .collect();
        let list = List::new(items)
            .block(block)
            .highlight_style(palette.selected());
        frame.render_stateful_widget(list, area, &mut self.list_state);
    }
}
