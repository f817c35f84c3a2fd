//! Terminal input: a blocking reader thread and key → console text translation.

use ratatui::crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    Quit,
    Reconnect,
    Disconnect,
    /// Terminal text for the input strategy.
    Text(String),
    Ignore,
}

/// Map one key press to what the console should do with it.
///
/// Ctrl-Q/R/D are console controls; everything else becomes the bytes a
/// terminal would have sent for that key.
pub fn translate(key: KeyEvent) -> KeyAction {
    if key.kind == KeyEventKind::Release {
        return KeyAction::Ignore;
    }
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    let text = match key.code {
        KeyCode::Char(c) if ctrl => match c.to_ascii_lowercase() {
            'q' => return KeyAction::Quit,
            'r' => return KeyAction::Reconnect,
            'd' => return KeyAction::Disconnect,
            c @ 'a'..='z' => char::from(c as u8 & 0x1f).to_string(),
            _ => return KeyAction::Ignore,
        },
        KeyCode::Char(c) => c.to_string(),
        KeyCode::Enter => "\r".to_string(),
        KeyCode::Backspace => "\x7f".to_string(),
        KeyCode::Tab => "\t".to_string(),
        KeyCode::Esc => "\x1b".to_string(),
        KeyCode::Up => "\x1b[A".to_string(),
        KeyCode::Down => "\x1b[B".to_string(),
        KeyCode::Right => "\x1b[C".to_string(),
        KeyCode::Left => "\x1b[D".to_string(),
        KeyCode::Home => "\x1b[H".to_string(),
        KeyCode::End => "\x1b[F".to_string(),
        KeyCode::Delete => "\x1b[3~".to_string(),
        _ => return KeyAction::Ignore,
    };
    KeyAction::Text(text)
}

/// Reads terminal events on a dedicated thread until `shutdown` is set.
pub struct EventReader {
    shutdown: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl EventReader {
    pub fn spawn() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();

        let thread = std::thread::spawn(move || {
            while !shutdown_thread.load(Ordering::Relaxed) {
                // Poll with a timeout so the shutdown flag is checked regularly
                match event::poll(Duration::from_millis(100)) {
                    Ok(false) => continue,
                    Ok(true) => {}
                    Err(e) => {
                        warn!("terminal poll failed: {}", e);
                        break;
                    }
                }
                match event::read() {
                    Ok(ev) => {
                        if tx.send(ev).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("terminal read failed: {}", e);
                        break;
                    }
                }
            }
        });

        let reader = Self {
            shutdown,
            thread: Some(thread),
        };
        (reader, rx)
    }

    /// Stop the thread and wait for it. Idempotent.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for EventReader {
    fn drop(&mut self) {
        self.stop();
    }
}
