//! Toasts: transient status messages in the top-right corner.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Clear, Paragraph},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use radio_core::session::{Notice, NoticeKind};

use crate::theme::Palette;

/// How long a message stays on screen.
pub const TOAST_DURATION: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Severity {
    Success,
    Error,
}

impl From<NoticeKind> for Severity {
    fn from(kind: NoticeKind) -> Self {
        match kind {
            NoticeKind::Success => Severity::Success,
            NoticeKind::Error => Severity::Error,
        }
    }
}

#[derive(Debug)]
struct Toast {
    message: String,
    severity: Severity,
    expires: Instant,
}

pub struct ToastManager {
    toasts: VecDeque<Toast>,
    max_visible: usize,
}

impl ToastManager {
    pub fn new() -> Self {
        Self {
            toasts: VecDeque::new(),
            max_visible: 3,
        }
    }

    pub fn push(&mut self, message: impl Into<String>, severity: Severity) {
        self.push_at(message, severity, Instant::now());
    }

    fn push_at(&mut self, message: impl Into<String>, severity: Severity, now: Instant) {
        let msg = message.into();
        self.toasts.retain(|t| t.message != msg);
        self.toasts.push_back(Toast {
            message: msg,
            severity,
            expires: now + TOAST_DURATION,
        });
        while self.toasts.len() > self.max_visible {
            self.toasts.pop_front();
        }
    }

    pub fn notice(&mut self, notice: Notice) {
        self.push(notice.text, notice.kind.into());
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.push(message, Severity::Success);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(message, Severity::Error);
    }

    /// Drop expired toasts.  Returns true when something disappeared.
    pub fn tick(&mut self) -> bool {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> bool {
        let before = self.toasts.len();
        self.toasts.retain(|t| t.expires > now);
        self.toasts.len() != before
    }

    /// Render toasts in the top-right corner of `area`, newest first.
    pub fn draw(&self, frame: &mut Frame, area: Rect, palette: &Palette) {
        let max_width = (area.width / 2).clamp(20, 60).min(area.width);
        let mut y = area.y + 1;

        for toast in self.toasts.iter().rev() {
            if y >= area.y + area.height {
                break;
            }
            let (icon, color) = match toast.severity {
                Severity::Success => ("✓", palette.toast_success),
                Severity::Error => ("✗", palette.toast_error),
            };
            let w = (toast.message.width() as u16 + 4).min(max_width);
            let toast_area = Rect {
                x: area.x + area.width.saturating_sub(w + 1),
                y,
                width: w,
                height: 1,
            };
            frame.render_widget(Clear, toast_area);
            let paragraph = Paragraph::new(Line::from(Span::styled(
                format!(" {} {} ", icon, toast.message),
                Style::default()
                    .fg(color)
                    .bg(palette.bg)
                    .add_modifier(Modifier::BOLD),
            )));
            frame.render_widget(paragraph, toast_area);
            y += 1;
        }
    }
}

impl Default for ToastManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toasts_expire_after_duration() {
        let mut toasts = ToastManager::new();
        let t0 = Instant::now();
        toasts.push_at("Copied!", Severity::Success, t0);

        assert!(!toasts.tick_at(t0 + Duration::from_secs(3)));
        assert_eq!(toasts.toasts.len(), 1);
        assert!(toasts.tick_at(t0 + TOAST_DURATION));
        assert!(toasts.toasts.is_empty());
    }

    #[test]
    fn test_duplicate_message_replaced() {
        let mut toasts = ToastManager::new();
        let t0 = Instant::now();
        toasts.push_at("Favorite saved", Severity::Success, t0);
        toasts.push_at("Favorite saved", Severity::Success, t0 + Duration::from_secs(2));
        assert_eq!(toasts.toasts.len(), 1);
        // the refreshed copy outlives the first deadline
        toasts.tick_at(t0 + TOAST_DURATION);
        assert_eq!(toasts.toasts.len(), 1);
    }

    #[test]
    fn test_queue_is_capped() {
        let mut toasts = ToastManager::new();
        for i in 0..10 {
            toasts.error(format!("message {}", i));
        }
        assert_eq!(toasts.toasts.len(), 3);
        assert_eq!(toasts.toasts.back().map(|t| t.message.as_str()), Some("message 9"));
    }
}
