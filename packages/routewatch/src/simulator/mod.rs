//! Development backend: serves `/ws` the way a real routed-network
//! controller does, with a synthetic network behind it.

mod console;
mod network;

use console::ConsoleSession;
use network::Network;

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
    routing::get,
};
use futures::{sink::SinkExt, stream::StreamExt};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

#[derive(Clone, Debug)]
pub struct SimulatorConfig {
    pub bind: String,
    pub nodes: usize,
    pub tick: Duration,
    /// Emit topology as routing tables instead of graphs.
    pub legacy: bool,
}

#[derive(Clone)]
struct SimState {
    network: Arc<Mutex<Network>>,
    topo: broadcast::Sender<String>,
    legacy: bool,
}

impl SimState {
    fn new(network: Network, legacy: bool) -> Self {
        let (topo, _) = broadcast::channel(16);
        Self {
            network: Arc::new(Mutex::new(network)),
            topo,
            legacy,
        }
    }

    fn topology_frame(&self) -> Option<String> {
        let network = self.network.lock().ok()?;
        topology_frame(&network, self.legacy)
    }
}

fn frame(kind: &str, data: Value) -> String {
    json!({"type": kind, "data": data}).to_string()
}

fn log_frame(text: &str) -> String {
    frame("log", Value::String(text.to_string()))
}

fn topology_frame(network: &Network, legacy: bool) -> Option<String> {
    let data = if legacy {
        network.legacy_payload()?
    } else {
        network.graph_payload()
    };
    Some(frame("topo", data))
}

fn app(state: SimState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(state)
}

pub async fn run(config: SimulatorConfig) -> Result<()> {
    let network = Network::new(config.nodes);
    info!(
        nodes = network.len(),
        legacy = config.legacy,
        "starting simulated network"
    );
    let state = SimState::new(network, config.legacy);
    tokio::spawn(tick_loop(state.clone(), config.tick));

    let addr = config
        .bind
        .parse::<SocketAddr>()
        .with_context(|| format!("Invalid bind address: {}", config.bind))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Simulator listening on ws://{}/ws", listener.local_addr()?);

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal");
    };

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Simulator server error")
}

async fn tick_loop(state: SimState, period: Duration) {
    let mut rng = StdRng::from_os_rng();
    let mut interval = tokio::time::interval(period);
    interval.tick().await;
    loop {
        interval.tick().await;
        let frame = {
            let Ok(mut network) = state.network.lock() else {
                warn!("network state poisoned, stopping ticks");
                return;
            };
            let flipped = network.tick(&mut rng);
            debug!(
                tick = network.ticks(),
                node = %flipped,
                up = network.is_up(&flipped),
                "liveness toggled"
            );
            topology_frame(&network, state.legacy)
        };
        if let Some(frame) = frame {
            // No receivers just means no clients are connected.
            let _ = state.topo.send(frame);
        }
    }
}

async fn ws_handler(State(state): State<SimState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_client(socket, state))
}

async fn handle_client(socket: WebSocket, state: SimState) {
    info!("console client connected");
    let (mut sender, mut receiver) = socket.split();
    let mut topo_rx = state.topo.subscribe();
    let mut console = ConsoleSession::new();

    let mut greeting = vec![log_frame(&console.welcome())];
    greeting.extend(state.topology_frame());
    for text in greeting {
        if sender.send(Message::Text(text.into())).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            msg = receiver.next() => {
                let data = match msg {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        debug!("client socket error: {}", e);
                        break;
                    }
                };
                let Some(command) = parse_command(data.as_str()) else {
                    warn!("ignoring non-command frame from client");
                    continue;
                };
                let replies = match state.network.lock() {
                    Ok(mut network) => console.feed(&command, &mut network),
                    Err(_) => break,
                };
                debug!(replies = replies.len(), buffered = console.pending(), "console input");
                for reply in replies {
                    let text = log_frame(&reply);
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        return;
                    }
                }
            }
            topo = topo_rx.recv() => match topo {
                Ok(frame) => {
                    if sender.send(Message::Text(frame.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Topology broadcast lagged by {} messages", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    info!("console client disconnected");
}

fn parse_command(text: &str) -> Option<String> {
    let value: Value = serde_json::from_str(text).ok()?;
    if value.get("type")?.as_str()? != "command" {
        return None;
    }
    value.get("data")?.as_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_command_frames() {
        assert_eq!(
            parse_command(r#"{"type":"command","data":"A table"}"#).as_deref(),
            Some("A table")
        );
        assert_eq!(parse_command(r#"{"type":"log","data":"x"}"#), None);
        assert_eq!(parse_command(r#"{"type":"command","data":5}"#), None);
        assert_eq!(parse_command("nope"), None);
    }

    #[test]
    fn frames_decode_on_the_client() {
        use console_mux::envelope::Envelope;

        let network = Network::new(4);
        let graph = topology_frame(&network, false).unwrap();
        let Envelope::Topology(snapshot) = Envelope::decode(&graph).unwrap() else {
            panic!("expected topology");
        };
        assert_eq!(snapshot.nodes.len(), 4);
        assert!(snapshot.self_id.is_none());

        let legacy = topology_frame(&network, true).unwrap();
        let Envelope::Topology(snapshot) = Envelope::decode(&legacy).unwrap() else {
            panic!("expected topology");
        };
        assert_eq!(snapshot.self_id.as_deref(), Some("A"));
        assert_eq!(snapshot.nodes.len(), 4);
        assert_eq!(snapshot.links.len(), 3);

        let log = log_frame("hi\r\n");
        assert_eq!(Envelope::decode(&log).unwrap(), Envelope::Log("hi\r\n".into()));
    }

    async fn serve(legacy: bool) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let origin = format!("http://{}", listener.local_addr().unwrap());
        let state = SimState::new(Network::new(4), legacy);
        tokio::spawn(async move { axum::serve(listener, app(state)).await });
        origin
    }

    async fn pump_until(
        session: &mut console_mux::Session,
        events: &mut tokio::sync::mpsc::UnboundedReceiver<console_mux::ConnectionEvent>,
        done: impl Fn(&console_mux::Session) -> bool,
    ) {
        while !done(session) {
            let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
                .await
                .expect("timed out waiting for simulator")
                .expect("event channel closed");
            session.handle_connection_event(event);
        }
    }

    fn console_session(
        origin: &str,
        mode: console_mux::InputMode,
    ) -> (
        console_mux::Session,
        tokio::sync::mpsc::UnboundedReceiver<console_mux::ConnectionEvent>,
    ) {
        console_mux::Session::new(console_mux::SessionConfig {
            endpoint: console_mux::Endpoint::from_origin(origin, None).unwrap(),
            input_mode: mode,
            log_capacity: 100,
            layout: console_mux::LayoutController::with_margin(120, 40, 12, 3),
        })
    }

    #[tokio::test]
    async fn console_round_trip_against_simulator() {
        let origin = serve(false).await;
        let (mut session, mut events) = console_session(&origin, console_mux::InputMode::Line);
        session.mount();

        pump_until(&mut session, &mut events, |s| s.topology_revision() > 1).await;
        assert!(session.logs().contents().contains("Global Network Controller"));
        assert_eq!(session.graph().nodes.len(), 4);

        assert_eq!(session.submit_input("A table\r"), 1);
        pump_until(&mut session, &mut events, |s| {
            s.logs().contents().contains("Routing Table (A)")
        })
        .await;
        assert!(session.logs().contents().contains("A table\r\n"));
    }

    #[tokio::test]
    async fn keystroke_client_is_echoed_by_simulator() {
        let origin = serve(true).await;
        let (mut session, mut events) =
            console_session(&origin, console_mux::InputMode::Keystroke);
        session.mount();

        pump_until(&mut session, &mut events, |s| s.topology_revision() > 1).await;
        assert_eq!(session.graph().self_id.as_deref(), Some("A"));

        for key in ["B", " ", "p", "x", "\x7f"] {
            session.submit_input(key);
        }
        pump_until(&mut session, &mut events, |s| {
            s.logs().contents().ends_with("B px\x08 \x08")
        })
        .await;
    }
}
