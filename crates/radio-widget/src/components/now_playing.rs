//! Now-playing card.
//!
//! ```text
//!  ● Live                                    started 18:04
//!  Song A
//!  Band                                       ❤ Favorited
//!  🔊 ━━━━━━━━━━━━━━───────  70%
//!  ♪ 12 songs   ⏱ 2h 5m   ❤ 3 favorites
//! ```

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use radio_core::prefs::Volume;
use radio_core::session::Session;
use radio_core::store::KeyValueStore;

use super::truncate;
use crate::theme::Palette;
use crate::widgets::status_bar::state_color;

pub const HEIGHT: u16 = 5;

pub fn draw<S: KeyValueStore>(frame: &mut Frame, area: Rect, session: &Session<S>, palette: &Palette) {
    let width = area.width.saturating_sub(2) as usize;
    let now = session.now_playing();

    let started = now
        .track()
        .and_then(|t| t.start_time_label())
        .map(|t| format!("started {}", t))
        .unwrap_or_default();
    let status = format!("● {}", session.status_text());
    let pad = width.saturating_sub(status.chars().count() + started.chars().count());

    let favorite = if session.is_favorited() {
        Span::styled("❤ Favorited", palette.accent())
    } else {
        Span::styled("♡ Favorite", palette.muted())
    };
    let artist = truncate(now.artist(), width.saturating_sub(12));
    let artist_pad = width.saturating_sub(unicode_width::UnicodeWidthStr::width(artist.as_str()) + 11);

    let stats = session.stats();
    let lines = vec![
        Line::from(vec![
            Span::raw(" "),
            Span::styled(
                status,
                Style::default()
                    .fg(state_color(session.playback_state(), palette))
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(" ".repeat(pad)),
            Span::styled(started, palette.muted()),
        ]),
        Line::from(vec![
            Span::raw(" "),
            Span::styled(truncate(now.title(), width), palette.title()),
        ]),
        Line::from(vec![
            Span::raw(" "),
            Span::styled(artist, palette.secondary()),
            Span::raw(" ".repeat(artist_pad)),
            favorite,
        ]),
        volume_line(session.volume(), width, palette),
        Line::from(Span::styled(
            format!(
                " ♪ {} songs   ⏱ {}   ❤ {} favorites",
                stats.songs,
                session.listen_time_label(),
                session.favorites().len()
            ),
            palette.secondary(),
        )),
    ];
    frame.render_widget(Paragraph::new(lines), area);
}

fn volume_line(volume: Volume, width: usize, palette: &Palette) -> Line<'static> {
    let bar_width = width.saturating_sub(12).min(30);
    let filled = if volume.is_muted() {
        0
    } else {
        bar_width * volume.percent() as usize / 100
    };
    Line::from(vec![
        Span::raw(" "),
        Span::raw(volume.icon()),
        Span::raw(" "),
        Span::styled("━".repeat(filled), palette.accent()),
        Span::styled("─".repeat(bar_width - filled), palette.muted()),
        Span::styled(format!(" {:>3}%", volume.percent()), palette.secondary()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_volume_line_shows_level() {
        let line = volume_line(Volume::new(0.5, false), 32, &crate::theme::DARK);
        let text = bar(&line);
        assert!(text.contains("🔊"));
        assert_eq!(text.matches('━').count(), 10);
        assert!(text.ends_with(" 50%"));
    }

    #[test]
    fn test_muted_volume_line_is_empty() {
        let line = volume_line(Volume::new(0.8, true), 32, &crate::theme::DARK);
        let text = bar(&line);
        assert!(text.contains("🔇"));
        assert_eq!(text.matches('━').count(), 0);
        // level is kept while muted
        assert!(text.ends_with(" 80%"));
    }
}
