//! Color palettes for the dark and light themes.

use ratatui::style::{Color, Modifier, Style};

use radio_core::prefs::Theme;

#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub bg: Color,
    pub primary: Color,
    pub secondary: Color,
    pub muted: Color,
    pub accent: Color,
    pub playing: Color,
    pub connecting: Color,
    pub border: Color,
    pub selection_bg: Color,
    pub toast_success: Color,
    pub toast_error: Color,
}

pub const DARK: Palette = Palette {
    bg: Color::Rgb(18, 18, 18),
    primary: Color::Rgb(210, 210, 225),
    secondary: Color::Rgb(115, 115, 138),
    muted: Color::Rgb(72, 72, 88),
    accent: Color::Rgb(255, 95, 95),
    playing: Color::Rgb(80, 200, 120),
    connecting: Color::Rgb(255, 184, 80),
    border: Color::Rgb(40, 40, 52),
    selection_bg: Color::Rgb(28, 28, 40),
    toast_success: Color::Rgb(80, 200, 120),
    toast_error: Color::Rgb(255, 95, 95),
};

pub const LIGHT: Palette = Palette {
    bg: Color::Rgb(245, 244, 240),
    primary: Color::Rgb(30, 30, 40),
    secondary: Color::Rgb(96, 96, 112),
    muted: Color::Rgb(150, 150, 160),
    accent: Color::Rgb(210, 40, 60),
    playing: Color::Rgb(20, 140, 70),
    connecting: Color::Rgb(200, 120, 0),
    border: Color::Rgb(200, 198, 190),
    selection_bg: Color::Rgb(225, 222, 212),
    toast_success: Color::Rgb(20, 140, 70),
    toast_error: Color::Rgb(210, 40, 60),
};

pub fn palette(theme: Theme) -> &'static Palette {
    match theme {
        Theme::Dark => &DARK,
        Theme::Light => &LIGHT,
    }
}

impl Palette {
    pub fn base(&self) -> Style {
        Style::default().fg(self.primary).bg(self.bg)
    }

    pub fn secondary(&self) -> Style {
        Style::default().fg(self.secondary)
    }

    pub fn muted(&self) -> Style {
        Style::default().fg(self.muted)
    }

    pub fn accent(&self) -> Style {
        Style::default().fg(self.accent)
    }

    pub fn title(&self) -> Style {
        Style::default()
            .fg(self.primary)
            .add_modifier(Modifier::BOLD)
    }

    pub fn border(&self) -> Style {
        Style::default().fg(self.border)
    }

    pub fn selected(&self) -> Style {
        Style::default()
            .bg(self.selection_bg)
            .fg(self.primary)
            .add_modifier(Modifier::BOLD)
    }
}
