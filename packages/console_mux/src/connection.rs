//! The single WebSocket channel to the backend.
//!
//! The socket lives in one spawned task. The manager keeps only the
//! outbound queue for that task and hands transport events to its owner over
//! an mpsc channel, each tagged with the connection epoch it belongs to.
//! Events from any other epoch are ignored, so a channel that has been
//! disconnected can never flip the state back to `Connected`.

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::envelope::Envelope;
use crate::error::ConnectionError;

/// Path every backend serves its channel on.
pub const CHANNEL_PATH: &str = "/ws";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: String,
}

impl Endpoint {
    /// Derive the channel URL from a page origin: `http://h` → `ws://h/ws`,
    /// `https://h` → `wss://h/ws`. `host` replaces the origin's host when set.
    pub fn from_origin(origin: &str, host: Option<&str>) -> Result<Self, ConnectionError> {
        let (scheme, rest) = if let Some(rest) = origin.strip_prefix("https://") {
            ("wss", rest)
        } else if let Some(rest) = origin.strip_prefix("http://") {
            ("ws", rest)
        } else {
            return Err(ConnectionError::InvalidOrigin(origin.to_string()));
        };

        let origin_host = rest.split(['/', '?', '#']).next().unwrap_or_default();
        let host = host.filter(|h| !h.is_empty()).unwrap_or(origin_host);
        if host.is_empty() {
            return Err(ConnectionError::InvalidOrigin(origin.to_string()));
        }

        Ok(Self {
            url: format!("{scheme}://{host}{CHANNEL_PATH}"),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_secure(&self) -> bool {
        self.url.starts_with("wss://")
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.url)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Frame(String),
    /// Close, error, or failed connect. `reason` is whatever the transport said.
    Closed { reason: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionEvent {
    pub epoch: u64,
    pub event: TransportEvent,
}

struct Channel {
    outbound: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

pub struct ConnectionManager {
    state: ConnectionState,
    epoch: u64,
    channel: Option<Channel>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
}

impl ConnectionManager {
    /// Returns the manager and the receiver its transport events arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let manager = Self {
            state: ConnectionState::Disconnected,
            epoch: 0,
            channel: None,
            events,
        };
        (manager, rx)
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Open the channel. A no-op returning `false` unless currently
    /// `Disconnected`. Must be called from within a tokio runtime.
    pub fn connect(&mut self, endpoint: &Endpoint) -> bool {
        if self.state != ConnectionState::Disconnected {
            debug!(state = self.state.as_str(), "connect ignored, channel already live");
            return false;
        }

        self.epoch += 1;
        self.state = ConnectionState::Connecting;

        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_channel(
            endpoint.url().to_string(),
            self.epoch,
            outbound_rx,
            self.events.clone(),
        ));
        self.channel = Some(Channel { outbound, task });

        info!(endpoint = %endpoint, epoch = self.epoch, "connecting");
        true
    }

    /// Close the channel from this side. Returns `false` if there was nothing
    /// to close. The channel task sends a close frame and exits on its own;
    /// anything it reports afterwards belongs to a stale epoch.
    pub fn disconnect(&mut self) -> bool {
        let Some(channel) = self.channel.take() else {
            return false;
        };
        drop(channel.outbound);
        self.epoch += 1;
        self.state = ConnectionState::Disconnected;
        info!("disconnected by operator");
        true
    }

    /// Best-effort, at-most-once. Silently dropped unless `Connected`.
    pub fn send(&self, envelope: &Envelope) -> bool {
        let live = self.state == ConnectionState::Connected;
        let Some(channel) = self.channel.as_ref().filter(|_| live) else {
            debug!(state = self.state.as_str(), "dropping outbound envelope");
            return false;
        };
        let json = match envelope.encode() {
            Ok(json) => json,
            Err(e) => {
                warn!("failed to encode outbound envelope: {}", e);
                return false;
            }
        };
        channel.outbound.send(json).is_ok()
    }

    /// Apply a transport event to the state machine. Returns the event when
    /// it belongs to the live channel and should be acted on.
    pub fn handle_event(&mut self, event: ConnectionEvent) -> Option<TransportEvent> {
        if event.epoch != self.epoch {
            debug!(
                epoch = event.epoch,
                current = self.epoch,
                "ignoring event from stale channel"
            );
            return None;
        }

        match (&event.event, self.state) {
            (TransportEvent::Opened, ConnectionState::Connecting) => {
                self.state = ConnectionState::Connected;
                info!(epoch = self.epoch, "channel open");
            }
            (TransportEvent::Frame(_), ConnectionState::Connected) => {}
            (
                TransportEvent::Closed { reason },
                ConnectionState::Connecting | ConnectionState::Connected,
            ) => {
                info!(
                    epoch = self.epoch,
                    reason = reason.as_deref().unwrap_or("none"),
                    "channel closed"
                );
                self.state = ConnectionState::Disconnected;
                self.channel = None;
            }
            _ => return None,
        }
        Some(event.event)
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(channel) = self.channel.take() {
            channel.task.abort();
        }
    }
}

async fn run_channel(
    url: String,
    epoch: u64,
    mut outbound: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
) {
    let emit = |event| {
        let _ = events.send(ConnectionEvent { epoch, event });
    };

    let ws = match tokio_tungstenite::connect_async(&url).await {
        Ok((ws, _)) => ws,
        Err(e) => {
            emit(TransportEvent::Closed {
                reason: Some(e.to_string()),
            });
            return;
        }
    };
    emit(TransportEvent::Opened);

    let (mut write, mut read) = ws.split();
    let reason = loop {
        tokio::select! {
            msg = outbound.recv() => match msg {
                Some(json) => {
                    if let Err(e) = write.send(Message::Text(json.into())).await {
                        break Some(e.to_string());
                    }
                }
                None => {
                    let _ = write.send(Message::Close(None)).await;
                    break None;
                }
            },
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    emit(TransportEvent::Frame(text.as_str().to_owned()));
                }
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => emit(TransportEvent::Frame(text)),
                    Err(_) => warn!("dropping non-UTF-8 binary frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    break frame
                        .map(|f| f.reason.as_str().to_owned())
                        .filter(|r| !r.is_empty());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => break Some(e.to_string()),
                None => break None,
            },
        }
    };
    emit(TransportEvent::Closed { reason });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_from_plain_origin() {
        let ep = Endpoint::from_origin("http://localhost:8000", None).unwrap();
        assert_eq!(ep.url(), "ws://localhost:8000/ws");
        assert!(!ep.is_secure());
    }

    #[test]
    fn endpoint_from_secure_origin() {
        let ep = Endpoint::from_origin("https://console.example.net/app/?x=1", None).unwrap();
        assert_eq!(ep.url(), "wss://console.example.net/ws");
        assert!(ep.is_secure());
    }

    #[test]
    fn endpoint_host_override_keeps_scheme() {
        let ep =
            Endpoint::from_origin("https://console.example.net", Some("10.0.0.5:9000")).unwrap();
        assert_eq!(ep.url(), "wss://10.0.0.5:9000/ws");

        let ep = Endpoint::from_origin("http://localhost:8000", Some("")).unwrap();
        assert_eq!(ep.url(), "ws://localhost:8000/ws");
    }

    #[test]
    fn endpoint_rejects_bad_origin() {
        assert!(Endpoint::from_origin("ftp://host", None).is_err());
        assert!(Endpoint::from_origin("localhost:8000", None).is_err());
        assert!(Endpoint::from_origin("http://", None).is_err());
    }

    #[test]
    fn send_while_disconnected_is_dropped() {
        let (manager, _rx) = ConnectionManager::new();
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(!manager.send(&Envelope::command("A table")));
    }

    #[test]
    fn stale_epoch_events_are_ignored() {
        let (mut manager, _rx) = ConnectionManager::new();
        let event = ConnectionEvent {
            epoch: 7,
            event: TransportEvent::Opened,
        };
        assert_eq!(manager.handle_event(event), None);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn disconnect_without_channel_is_noop() {
        let (mut manager, _rx) = ConnectionManager::new();
        assert!(!manager.disconnect());
        assert_eq!(manager.epoch(), 0);
    }

    #[tokio::test]
    async fn connect_is_idempotent_while_live() {
        let (mut manager, _rx) = ConnectionManager::new();
        // Nothing listens on port 9; the attempt stays `Connecting` until its event is handled.
        let ep = Endpoint::from_origin("http://127.0.0.1:9", None).unwrap();

        assert!(manager.connect(&ep));
        assert_eq!(manager.state(), ConnectionState::Connecting);
        assert!(!manager.connect(&ep));
        assert_eq!(manager.epoch(), 1);
    }

    #[tokio::test]
    async fn failed_connect_reports_closed() {
        let (mut manager, mut rx) = ConnectionManager::new();
        let ep = Endpoint::from_origin("http://127.0.0.1:9", None).unwrap();
        manager.connect(&ep);

        let event = rx.recv().await.unwrap();
        assert!(matches!(event.event, TransportEvent::Closed { reason: Some(_) }));
        assert!(manager.handle_event(event).is_some());
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(!manager.send(&Envelope::command("late")));
    }
}
