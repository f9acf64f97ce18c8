//! Panels of the widget screen.  Each draws from the session without
//! mutating it.

pub mod favorites;
pub mod header;
pub mod help_overlay;
pub mod history;
pub mod now_playing;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Cut `text` to at most `width` terminal columns, marking the cut with `…`.
pub fn truncate(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_fits_unchanged() {
        assert_eq!(truncate("Band - Song A", 20), "Band - Song A");
    }

    #[test]
    fn test_truncate_marks_cut() {
        assert_eq!(truncate("Band - Song A", 6), "Band …");
        assert_eq!(truncate("abc", 0), "");
    }

    #[test]
    fn test_truncate_counts_wide_chars() {
        // each CJK char is two columns
        assert_eq!(truncate("日本語の歌", 5), "日本…");
    }
}
