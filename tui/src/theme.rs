//! Colors for the arena and status line.
//!
//! Kanagawa Wave palette by default with a high-contrast override for
//! terminals without truecolor.

use ratatui::style::{Color, Modifier, Style};

mod colors {
    use super::Color;

    pub const BG_DARK: Color = Color::Rgb(22, 22, 29); // sumiInk0
    pub const BORDER: Color = Color::Rgb(84, 84, 109); // sumiInk6
    pub const TEXT_PRIMARY: Color = Color::Rgb(220, 215, 186); // fujiWhite
    pub const TEXT_MUTED: Color = Color::Rgb(114, 113, 105); // fujiGray
    pub const VIOLET: Color = Color::Rgb(149, 127, 184); // oniViolet
    pub const CYAN: Color = Color::Rgb(127, 180, 202); // springBlue
    pub const GREEN: Color = Color::Rgb(152, 187, 108); // springGreen
    pub const YELLOW: Color = Color::Rgb(230, 195, 132); // carpYellow
    pub const RED: Color = Color::Rgb(255, 93, 98); // peachRed
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub bg: Color,
    pub border: Color,
    pub text: Color,
    pub muted: Color,
    /// The local player's block.
    pub own: Color,
    pub other: Color,
    pub bullet: Color,
    pub connected: Color,
    pub disconnected: Color,
}

impl Palette {
    #[must_use]
    pub fn standard() -> Self {
        Self {
            bg: colors::BG_DARK,
            border: colors::BORDER,
            text: colors::TEXT_PRIMARY,
            muted: colors::TEXT_MUTED,
            own: colors::CYAN,
            other: colors::VIOLET,
            bullet: colors::YELLOW,
            connected: colors::GREEN,
            disconnected: colors::RED,
        }
    }

    #[must_use]
    pub fn high_contrast() -> Self {
        Self {
            bg: Color::Black,
            border: Color::Gray,
            text: Color::White,
            muted: Color::Gray,
            own: Color::Cyan,
            other: Color::White,
            bullet: Color::Yellow,
            connected: Color::Green,
            disconnected: Color::Red,
        }
    }

    #[must_use]
    pub fn title(&self) -> Style {
        Style::default().fg(self.own).add_modifier(Modifier::BOLD)
    }

    #[must_use]
    pub fn muted(&self) -> Style {
        Style::default().fg(self.muted)
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::standard()
    }
}
