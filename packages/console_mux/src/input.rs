//! Operator input → outbound `command` envelopes.
//!
//! Two strategies share the [`InputStrategy`] seam and are picked by
//! configuration:
//!
//! - [`LineBuffered`]: edits a local line, one envelope per submitted line.
//! - [`KeystrokeStreamed`]: every input event, control characters included,
//!   becomes its own envelope and the backend does the line editing.
//!
//! Input events arrive as terminal text (`"\r"` for Enter, `"\x7f"` for
//! Backspace, and so on).

use serde::{Deserialize, Serialize};

use crate::envelope::Envelope;

const DEL: char = '\x7f';
const BACKSPACE: char = '\x08';

/// Wraps text into a `command` envelope. No escaping, validation or length limit.
pub struct CommandEncoder;

impl CommandEncoder {
    pub fn encode(text: impl Into<String>) -> Envelope {
        Envelope::command(text)
    }
}

pub trait InputStrategy: Send {
    /// Feed one input event. Returns the envelopes it produced, in order.
    fn feed(&mut self, input: &str) -> Vec<Envelope>;

    /// Text typed but not yet sent. Always empty for streaming strategies.
    fn pending(&self) -> &str;

    fn mode(&self) -> InputMode;
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    /// Edit locally, send one command per submitted line.
    #[default]
    Line,
    /// Send every keystroke as it happens.
    Keystroke,
}

impl InputMode {
    pub fn strategy(self) -> Box<dyn InputStrategy> {
        match self {
            Self::Line => Box::new(LineBuffered::new()),
            Self::Keystroke => Box::new(KeystrokeStreamed),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Line => "line",
            Self::Keystroke => "keystroke",
        }
    }
}

#[derive(Debug, Default)]
pub struct LineBuffered {
    line: String,
}

impl LineBuffered {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InputStrategy for LineBuffered {
    fn feed(&mut self, input: &str) -> Vec<Envelope> {
        let mut out = Vec::new();
        for c in input.chars() {
            match c {
                '\r' | '\n' => {
                    // Empty submissions are not sent.
                    if !self.line.is_empty() {
                        out.push(CommandEncoder::encode(std::mem::take(&mut self.line)));
                    }
                }
                DEL | BACKSPACE => {
                    self.line.pop();
                }
                // Everything else is part of the line, control characters included.
                c => self.line.push(c),
            }
        }
        out
    }

    fn pending(&self) -> &str {
        &self.line
    }

    fn mode(&self) -> InputMode {
        InputMode::Line
    }
}

#[derive(Debug, Default)]
pub struct KeystrokeStreamed;

impl InputStrategy for KeystrokeStreamed {
    fn feed(&mut self, input: &str) -> Vec<Envelope> {
        if input.is_empty() {
            return Vec::new();
        }
        vec![CommandEncoder::encode(input)]
    }

    fn pending(&self) -> &str {
        ""
    }

    fn mode(&self) -> InputMode {
        InputMode::Keystroke
    }
}
