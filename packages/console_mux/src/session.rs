//! One operator session: the only place the components are wired together.
//!
//! The session owns exactly one of each component. Mount and teardown are
//! guarded by a lifecycle flag so a front-end that runs its setup twice
//! still ends up with one channel, and one that tears down twice releases
//! it once.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::connection::{
    ConnectionEvent, ConnectionManager, ConnectionState, Endpoint, TransportEvent,
};
use crate::input::{InputMode, InputStrategy};
use crate::layout::LayoutController;
use crate::log_sink::LogSink;
use crate::router::{MessageRouter, RouterStats};
use crate::topology_sink::{GraphView, TopologySink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Created,
    Mounted,
    TornDown,
}

pub struct SessionConfig {
    pub endpoint: Endpoint,
    pub input_mode: InputMode,
    pub log_capacity: usize,
    pub layout: LayoutController,
}

pub struct Session {
    endpoint: Endpoint,
    connection: ConnectionManager,
    router: MessageRouter,
    logs: LogSink,
    topology: TopologySink,
    input: Box<dyn InputStrategy>,
    layout: LayoutController,
    lifecycle: Lifecycle,
}

fn system_line(text: &str) -> String {
    format!("System: {text}\r\n")
}

impl Session {
    /// Returns the session and the receiver its transport events arrive on.
    /// Feed every received event back through [`Session::handle_connection_event`].
    pub fn new(config: SessionConfig) -> (Self, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (connection, events) = ConnectionManager::new();
        let session = Self {
            endpoint: config.endpoint,
            connection,
            router: MessageRouter::new(),
            logs: LogSink::with_capacity(config.log_capacity),
            topology: TopologySink::new(),
            input: config.input_mode.strategy(),
            layout: config.layout,
            lifecycle: Lifecycle::Created,
        };
        (session, events)
    }

    /// First call opens the channel. Later calls are no-ops returning `false`.
    pub fn mount(&mut self) -> bool {
        if self.lifecycle != Lifecycle::Created {
            debug!("session already mounted");
            return false;
        }
        self.lifecycle = Lifecycle::Mounted;
        info!(endpoint = %self.endpoint, mode = self.input.mode().as_str(), "session mounted");
        self.connect();
        true
    }

    /// Operator-driven (re)connect. A fresh channel starts with empty sinks.
    pub fn connect(&mut self) -> bool {
        if self.lifecycle != Lifecycle::Mounted {
            return false;
        }
        if !self.connection.connect(&self.endpoint) {
            return false;
        }
        self.logs.reset();
        self.topology.reset();
        self.router.reset_stream();
        true
    }

    /// Operator-driven close. Sends stop immediately.
    pub fn disconnect(&mut self) -> bool {
        if !self.connection.disconnect() {
            return false;
        }
        self.logs
            .append(system_line(&format!("Disconnected from {}.", self.endpoint)));
        true
    }

    /// Releases the channel. Idempotent; returns `true` only the first time.
    pub fn teardown(&mut self) -> bool {
        if self.lifecycle == Lifecycle::TornDown {
            return false;
        }
        self.connection.disconnect();
        self.lifecycle = Lifecycle::TornDown;
        info!("session torn down");
        true
    }

    /// Returns `true` when a sink changed.
    pub fn handle_connection_event(&mut self, event: ConnectionEvent) -> bool {
        if self.lifecycle == Lifecycle::TornDown {
            return false;
        }
        match self.connection.handle_event(event) {
            Some(TransportEvent::Opened) => {
                self.logs
                    .append(system_line(&format!("Connected to {}.", self.endpoint)));
                true
            }
            Some(TransportEvent::Frame(frame)) => {
                self.router
                    .route_frame(&frame, &mut self.logs, &mut self.topology);
                true
            }
            Some(TransportEvent::Closed { reason }) => {
                let text = match reason {
                    Some(reason) => format!("Connection to {} closed: {reason}", self.endpoint),
                    None => format!("Connection to {} closed.", self.endpoint),
                };
                self.logs.append(system_line(&text));
                true
            }
            None => false,
        }
    }

    /// Feed one operator input event. Returns how many envelopes were handed
    /// to the channel; zero while disconnected.
    pub fn submit_input(&mut self, input: &str) -> usize {
        let envelopes = self.input.feed(input);
        envelopes
            .iter()
            .filter(|envelope| self.connection.send(envelope))
            .count()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn logs(&self) -> &LogSink {
        &self.logs
    }

    pub fn graph(&self) -> Arc<GraphView> {
        self.topology.view()
    }

    pub fn topology_revision(&self) -> u64 {
        self.topology.revision()
    }

    pub fn input_mode(&self) -> InputMode {
        self.input.mode()
    }

    pub fn pending_input(&self) -> &str {
        self.input.pending()
    }

    pub fn layout(&self) -> &LayoutController {
        &self.layout
    }

    pub fn layout_mut(&mut self) -> &mut LayoutController {
        &mut self.layout
    }

    pub fn router_stats(&self) -> RouterStats {
        self.router.stats()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}
