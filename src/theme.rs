//! UI colours, with per-role overrides from the `[theme]` config table

use ratatui::style::Color;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    pub accent: Color,      // Active borders, focused field
    pub danger: Color,      // Delete hints, errors
    pub success: Color,     // Signed-in indicator
    pub warning: Color,     // Status messages
    pub text: Color,
    pub text_dim: Color,
    pub bg_selected: Color, // Focused row
    pub hover: Color,       // Hovered line in the preview
    pub inactive: Color,
    pub header: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            accent: Color::Rgb(250, 179, 135),
            danger: Color::Rgb(243, 139, 168),
            success: Color::Rgb(166, 218, 149),
            warning: Color::Rgb(250, 179, 135),
            text: Color::Rgb(205, 214, 244),
            text_dim: Color::Rgb(147, 153, 178),
            bg_selected: Color::Rgb(69, 71, 90),
            hover: Color::Rgb(137, 180, 250),
            inactive: Color::Rgb(88, 91, 112),
            header: Color::Rgb(243, 139, 168),
        }
    }
}

impl Theme {
    /// Defaults with any valid overrides applied; bad entries are logged and skipped
    pub fn from_overrides(overrides: &BTreeMap<String, String>) -> Self {
        let mut theme = Self::default();

        for (role, value) in overrides {
            let Some(color) = Self::parse_hex_color(value) else {
                tracing::warn!("Ignoring theme colour {} = {:?}: not a hex colour", role, value);
                continue;
            };
            let slot = match role.as_str() {
                "accent" => &mut theme.accent,
                "danger" => &mut theme.danger,
                "success" => &mut theme.success,
                "warning" => &mut theme.warning,
                "text" => &mut theme.text,
                "text_dim" => &mut theme.text_dim,
                "bg_selected" => &mut theme.bg_selected,
                "hover" => &mut theme.hover,
                "inactive" => &mut theme.inactive,
                "header" => &mut theme.header,
                _ => {
                    tracing::warn!("Unknown theme role {}", role);
                    continue;
                }
            };
            *slot = color;
        }

        theme
    }

    /// Parse a hex color string (#RRGGBB or #RGB)
    fn parse_hex_color(s: &str) -> Option<Color> {
        let s = s.trim().trim_start_matches('#');
        if !s.is_ascii() {
            return None;
        }

        if s.len() == 6 {
            let r = u8::from_str_radix(&s[0..2], 16).ok()?;
            let g = u8::from_str_radix(&s[2..4], 16).ok()?;
            let b = u8::from_str_radix(&s[4..6], 16).ok()?;
            Some(Color::Rgb(r, g, b))
        } else if s.len() == 3 {
            let r = u8::from_str_radix(&s[0..1], 16).ok()? * 17;
            let g = u8::from_str_radix(&s[1..2], 16).ok()? * 17;
            let b = u8::from_str_radix(&s[2..3], 16).ok()? * 17;
            Some(Color::Rgb(r, g, b))
        } else {
            None
        }
    }
}
