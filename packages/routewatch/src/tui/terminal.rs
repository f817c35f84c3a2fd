//! Terminal pane: the log buffer replayed through a VT100 emulator.
//!
//! The emulator is rebuilt from scratch whenever the log revision or the pane
//! size changes, so what is on screen is always exactly the retained entries
//! interpreted in order.

use console_mux::{FitTarget, LogSink, Size};
use ratatui::{
    buffer::Buffer,
    layout::{Position, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Widget},
};

use super::theme;

pub struct TerminalPane {
    parser: vt100::Parser,
    size: Size,
    /// Last row is reserved for the local prompt.
    prompt_row: bool,
    revision: Option<u64>,
}

fn vt_color(color: vt100::Color) -> Color {
    match color {
        vt100::Color::Default => Color::Reset,
        vt100::Color::Idx(i) => Color::Indexed(i),
        vt100::Color::Rgb(r, g, b) => Color::Rgb(r, g, b),
    }
}

fn cell_style(cell: &vt100::Cell) -> Style {
    let mut style = Style::default()
        .fg(vt_color(cell.fgcolor()))
        .bg(vt_color(cell.bgcolor()));
    if cell.bold() {
        style = style.add_modifier(Modifier::BOLD);
    }
    if cell.italic() {
        style = style.add_modifier(Modifier::ITALIC);
    }
    if cell.underline() {
        style = style.add_modifier(Modifier::UNDERLINED);
    }
    if cell.inverse() {
        style = style.add_modifier(Modifier::REVERSED);
    }
    style
}

impl TerminalPane {
    pub fn new(prompt_row: bool) -> Self {
        Self {
            parser: vt100::Parser::new(1, 1, 0),
            size: Size::default(),
            prompt_row,
            revision: None,
        }
    }

    /// Rows and columns handed to the emulator: the pane minus its top
    /// border and, in line mode, the prompt row.
    pub fn screen_size(&self) -> (u16, u16) {
        let reserved = 1 + u16::from(self.prompt_row);
        let rows = self.size.height.saturating_sub(reserved).max(1);
        let cols = self.size.width.max(1);
        (rows, cols)
    }

    /// Replay `logs` if it changed since the last sync.
    pub fn sync(&mut self, logs: &LogSink) {
        if self.revision == Some(logs.revision()) {
            return;
        }
        let (rows, cols) = self.screen_size();
        let mut parser = vt100::Parser::new(rows, cols, 0);
        for entry in logs.iter() {
            parser.process(entry.as_bytes());
        }
        self.parser = parser;
        self.revision = Some(logs.revision());
    }

    /// Draw into `area`. Returns where the terminal cursor belongs.
    pub fn render(
        &self,
        area: Rect,
        buf: &mut Buffer,
        prompt: Option<&str>,
        dragging: bool,
    ) -> Option<Position> {
        let border = if dragging {
            theme::HANDLE_DRAGGING
        } else {
            theme::BORDER
        };
        let block = Block::default()
            .title(" terminal ")
            .borders(Borders::TOP)
            .border_style(Style::default().fg(border));
        let inner = block.inner(area);
        block.render(area, buf);
        if inner.is_empty() {
            return None;
        }

        let screen = self.parser.screen();
        let (rows, cols) = screen.size();
        let screen_rows = if self.prompt_row {
            inner.height.saturating_sub(1)
        } else {
            inner.height
        };

        for row in 0..rows.min(screen_rows) {
            for col in 0..cols.min(inner.width) {
                let Some(cell) = screen.cell(row, col) else {
                    continue;
                };
                let Some(target) = buf.cell_mut((inner.x + col, inner.y + row)) else {
                    continue;
                };
                let contents = cell.contents();
                target.set_symbol(if contents.is_empty() { " " } else { &contents });
                target.set_style(cell_style(cell));
            }
        }

        match prompt {
            Some(pending) if self.prompt_row => {
                let y = inner.y + inner.height - 1;
                let line = format!("> {pending}");
                let visible: String = line
                    .chars()
                    .skip(line.chars().count().saturating_sub(inner.width as usize))
                    .collect();
                buf.set_string(inner.x, y, &visible, Style::default().fg(theme::PROMPT));
                let x = inner.x + (visible.chars().count() as u16).min(inner.width - 1);
                Some(Position::new(x, y))
            }
            _ => {
                if screen.hide_cursor() {
                    return None;
                }
                let (row, col) = screen.cursor_position();
                if row >= screen_rows || col >= inner.width {
                    return None;
                }
                Some(Position::new(inner.x + col, inner.y + row))
            }
        }
    }
}

impl FitTarget for TerminalPane {
    fn fit(&mut self, size: Size) {
        if size != self.size {
            self.size = size;
            self.revision = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sink(entries: &[&str]) -> LogSink {
        let mut logs = LogSink::new();
        for e in entries {
            logs.append(e.to_string());
        }
        logs
    }

    impl TerminalPane {
        fn screen_text(&self) -> String {
            self.parser.screen().contents()
        }
    }

    fn fitted(prompt_row: bool, width: u16, height: u16) -> TerminalPane {
        let mut pane = TerminalPane::new(prompt_row);
        pane.fit(Size { width, height });
        pane
    }

    #[test]
    fn screen_size_reserves_border_and_prompt() {
        assert_eq!(fitted(true, 80, 12).screen_size(), (10, 80));
        assert_eq!(fitted(false, 80, 12).screen_size(), (11, 80));
        assert_eq!(fitted(true, 0, 1).screen_size(), (1, 1));
    }

    #[test]
    fn replays_log_through_emulator() {
        let mut pane = fitted(false, 40, 6);
        pane.sync(&sink(&["\x1b[1;36mhello\x1b[0m\r\n", "wor", "ld\r\n"]));
        let text = pane.screen_text();
        assert!(text.starts_with("hello\nworld"));
    }

    #[test]
    fn backspace_sequence_erases() {
        let mut pane = fitted(false, 40, 6);
        pane.sync(&sink(&["> Ax", "\x08 \x08"]));
        assert_eq!(pane.screen_text().trim_end(), "> A");
    }

    #[test]
    fn sync_skips_unchanged_revision() {
        let mut pane = fitted(false, 40, 6);
        let mut logs = sink(&["one\r\n"]);
        pane.sync(&logs);
        logs.append("two\r\n".into());
        pane.sync(&logs);
        assert!(pane.screen_text().contains("two"));

        // Refit forces a rebuild at the new size.
        pane.fit(Size {
            width: 20,
            height: 4,
        });
        pane.sync(&logs);
        assert_eq!(pane.parser.screen().size(), (3, 20));
        assert!(pane.screen_text().contains("one"));
    }

    #[test]
    fn renders_prompt_on_last_row() {
        let mut pane = fitted(true, 30, 5);
        pane.sync(&sink(&["ready\r\n"]));
        let area = Rect::new(0, 0, 30, 5);
        let mut buf = Buffer::empty(area);
        let cursor = pane.render(area, &mut buf, Some("A ping"), false);

        let row = |y: u16| -> String { (0..30).map(|x| buf[(x, y)].symbol().to_string()).collect() };
        assert!(row(1).starts_with("ready"));
        assert!(row(4).starts_with("> A ping"));
        assert_eq!(cursor, Some(Position::new(8, 4)));
    }

    #[test]
    fn keystroke_mode_uses_emulator_cursor() {
        let mut pane = fitted(false, 30, 5);
        pane.sync(&sink(&["> B p"]));
        let area = Rect::new(0, 10, 30, 5);
        let mut buf = Buffer::empty(area);
        let cursor = pane.render(area, &mut buf, None, false);
        assert_eq!(cursor, Some(Position::new(5, 11)));
    }
}
