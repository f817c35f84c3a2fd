//! Colors and styles for the console. Nothing here depends on session state.

use ratatui::style::{Color, Modifier, Style};

use console_mux::ConnectionState;

pub const NODE_DEFAULT: Color = Color::Cyan;
pub const SELF_NODE: Color = Color::Yellow;
pub const LINK_DEFAULT: Color = Color::DarkGray;
pub const BORDER: Color = Color::DarkGray;
pub const HANDLE_DRAGGING: Color = Color::Yellow;
pub const PROMPT: Color = Color::Green;

pub fn connection(state: ConnectionState) -> Style {
    let color = match state {
        ConnectionState::Connected => Color::Green,
        ConnectionState::Connecting => Color::Yellow,
        ConnectionState::Disconnected => Color::Red,
    };
    Style::default()
        .fg(Color::Black)
        .bg(color)
        .add_modifier(Modifier::BOLD)
}

pub fn dim() -> Style {
    Style::default().add_modifier(Modifier::DIM)
}

pub fn label() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

/// `#RGB` or `#RRGGBB`. Anything else is `None`.
pub fn parse_hex(color: &str) -> Option<Color> {
    let hex = color.strip_prefix('#')?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        3 => {
            let mut rgb = hex.chars().map(|c| channel(&c.to_string()).map(|v| v * 17));
            Some(Color::Rgb(rgb.next()??, rgb.next()??, rgb.next()??))
        }
        6 => Some(Color::Rgb(
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_long_and_short_hex() {
        assert_eq!(parse_hex("#4CAF50"), Some(Color::Rgb(0x4C, 0xAF, 0x50)));
        assert_eq!(parse_hex("#9e9e9e"), Some(Color::Rgb(0x9E, 0x9E, 0x9E)));
        assert_eq!(parse_hex("#FFF"), Some(Color::Rgb(255, 255, 255)));
        assert_eq!(parse_hex("#0a0"), Some(Color::Rgb(0, 170, 0)));
    }

    #[test]
    fn rejects_other_colors() {
        assert_eq!(parse_hex("green"), None);
        assert_eq!(parse_hex("#12345"), None);
        assert_eq!(parse_hex("#GGGGGG"), None);
        assert_eq!(parse_hex("4CAF50"), None);
    }
}
