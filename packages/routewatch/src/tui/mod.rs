//! Operator console: graph pane on top, terminal pane below, status line at
//! the bottom. Everything runs on one task; terminal input arrives from a
//! reader thread over a channel.

mod graph;
mod keys;
mod terminal;
mod theme;

use std::time::Duration;

use anyhow::{Context, Result};
use console_mux::{
    ConnectionState, DragState, Endpoint, InputMode, LayoutController, Session, SessionConfig,
};
use ratatui::{
    Frame,
    crossterm::{
        event::{
            DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture,
            Event, MouseButton, MouseEvent, MouseEventKind,
        },
        execute,
    },
    layout::Rect,
    text::{Line, Span},
};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::FileConfig;
use graph::GraphPane;
use keys::{EventReader, KeyAction};
use terminal::TerminalPane;

const REDRAW_INTERVAL: Duration = Duration::from_millis(33);

struct App {
    session: Session,
    graph: GraphPane,
    terminal: TerminalPane,
    quit: bool,
}

impl App {
    fn new(session: Session) -> Self {
        let prompt_row = session.input_mode() == InputMode::Line;
        let mut app = Self {
            session,
            graph: GraphPane::new(),
            terminal: TerminalPane::new(prompt_row),
            quit: false,
        };
        app.fit();
        app
    }

    fn fit(&mut self) {
        self.session
            .layout()
            .bounds()
            .fit(&mut self.graph, &mut self.terminal);
    }

    fn handle_input(&mut self, event: Event) {
        match event {
            Event::Key(key) => match keys::translate(key) {
                KeyAction::Quit => self.quit = true,
                KeyAction::Reconnect => {
                    if self.session.connection_state() != ConnectionState::Disconnected {
                        self.session.disconnect();
                    }
                    self.session.connect();
                }
                KeyAction::Disconnect => {
                    self.session.disconnect();
                }
                KeyAction::Text(text) => {
                    self.session.submit_input(&text);
                }
                KeyAction::Ignore => {}
            },
            Event::Paste(text) => {
                self.session.submit_input(&text);
            }
            Event::Mouse(mouse) => self.handle_mouse(mouse),
            Event::Resize(width, height) => {
                // Bottom row belongs to the status line.
                let bounds = self
                    .session
                    .layout_mut()
                    .resize(width, height.saturating_sub(1));
                bounds.fit(&mut self.graph, &mut self.terminal);
            }
            Event::FocusGained | Event::FocusLost => {}
        }
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        let layout = self.session.layout_mut();
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                if layout.pointer_down(mouse.row) {
                    debug!(row = mouse.row, "drag started");
                }
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                if let Some(bounds) = layout.pointer_move(mouse.row) {
                    bounds.fit(&mut self.graph, &mut self.terminal);
                }
            }
            MouseEventKind::Up(MouseButton::Left) => layout.pointer_up(),
            _ => {}
        }
    }

    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();
        let bounds = self.session.layout().bounds();
        let graph_area = Rect::new(area.x, area.y, area.width, bounds.graph.height);
        let terminal_area = Rect::new(
            area.x,
            area.y + bounds.graph.height,
            area.width,
            bounds.terminal.height,
        );
        let status_area = Rect::new(area.x, area.bottom().saturating_sub(1), area.width, 1);

        self.terminal.sync(self.session.logs());
        let view = self.session.graph();
        self.graph
            .render(&view, graph_area.intersection(area), frame.buffer_mut());

        let prompt = match self.session.input_mode() {
            InputMode::Line => Some(self.session.pending_input()),
            InputMode::Keystroke => None,
        };
        let dragging = self.session.layout().drag_state() == DragState::Dragging;
        let cursor = self.terminal.render(
            terminal_area.intersection(area),
            frame.buffer_mut(),
            prompt,
            dragging,
        );
        if let Some(position) = cursor {
            frame.set_cursor_position(position);
        }

        frame.render_widget(status_line(&self.session), status_area.intersection(area));
    }
}

fn status_line(session: &Session) -> Line<'static> {
    let state = session.connection_state();
    let view = session.graph();
    Line::from(vec![
        Span::styled(format!(" {} ", state.as_str()), theme::connection(state)),
        Span::raw(format!(" {} ", session.endpoint())),
        Span::styled(format!("[{}] ", session.input_mode().as_str()), theme::label()),
        Span::raw(format!(
            "{} nodes · {} links ",
            view.nodes.len(),
            view.links.len()
        )),
        Span::styled(" ^Q quit · ^R reconnect · ^D disconnect ", theme::dim()),
    ])
}

/// Run the console until the operator quits.
pub async fn run(config: &FileConfig) -> Result<()> {
    let endpoint = Endpoint::from_origin(&config.endpoint.origin, config.endpoint.host.as_deref())
        .with_context(|| format!("Invalid endpoint origin: {}", config.endpoint.origin))?;

    let mut terminal = ratatui::init();
    let result = run_inner(&mut terminal, config, endpoint).await;

    if let Err(e) = execute!(std::io::stdout(), DisableMouseCapture, DisableBracketedPaste) {
        warn!("failed to release mouse capture: {}", e);
    }
    ratatui::restore();
    result
}

async fn run_inner(
    terminal: &mut ratatui::DefaultTerminal,
    config: &FileConfig,
    endpoint: Endpoint,
) -> Result<()> {
    execute!(std::io::stdout(), EnableMouseCapture, EnableBracketedPaste)
        .context("Failed to enable mouse capture")?;

    let size = terminal.size().context("Failed to query terminal size")?;
    let layout = LayoutController::with_margin(
        size.width,
        size.height.saturating_sub(1),
        config.layout.initial_terminal_height,
        config.layout.pane_margin,
    );
    let (session, mut transport) = Session::new(SessionConfig {
        endpoint,
        input_mode: config.input.mode,
        log_capacity: config.log.capacity,
        layout,
    });
    let mut app = App::new(session);
    app.session.mount();

    let (mut reader, mut input) = EventReader::spawn();
    let mut redraw = tokio::time::interval(REDRAW_INTERVAL);
    redraw.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let result = loop {
        if app.quit {
            break Ok(());
        }
        tokio::select! {
            Some(event) = transport.recv() => {
                app.session.handle_connection_event(event);
            }
            event = input.recv() => match event {
                Some(event) => app.handle_input(event),
                None => {
                    warn!("terminal input closed");
                    break Ok(());
                }
            },
            _ = redraw.tick() => {
                if let Err(e) = terminal.draw(|frame| app.draw(frame)) {
                    break Err(e).context("Failed to draw console");
                }
            }
        }
    };

    app.session.teardown();
    reader.stop();
    info!(stats = ?app.session.router_stats(), "console closed");
    result
}
