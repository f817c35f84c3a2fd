//! Global command console served over the `log` channel.
//!
//! Operators address a node with `<NodeID> <command>`. The console queues the
//! command on that node and, if the node is up, runs everything it has queued.
//! `BROADCAST <command>` queues on every node.
//!
//! Keystroke clients are line-edited here (echo, backspace). A client is taken
//! to be line-buffered once it sends a multi-character chunk with no line
//! ending, erase key or escape in it, and from then on every payload it sends
//! is one complete line.

use super::network::Network;

pub const PROMPT: &str = "> ";
/// Target that addresses every node at once.
const BROADCAST: &str = "BROADCAST";

pub fn banner() -> String {
    let mut text = [
        "\r\n\x1b[1;36m=== Global Network Controller ===\x1b[0m",
        "Command Syntax: <NodeID> <Command>",
        "Example: 'A ping B'",
        "         'A tracert C'",
        "         'A table'",
        "-----------------------------------",
    ]
    .join("\r\n");
    text.push_str("\r\n");
    text
}

/// How a client has been sending input, as far as the console can tell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum ClientInput {
    #[default]
    Unknown,
    Lines,
    Keystrokes,
}

/// Only a keystroke client sends line endings, erase keys or escape sequences.
fn is_keystroke_only(data: &str) -> bool {
    data.starts_with('\x1b') || data.contains(['\r', '\n', '\x7f', '\x08'])
}

/// Per-client line editor and dispatcher.
#[derive(Debug, Default)]
pub struct ConsoleSession {
    line: String,
    input: ClientInput,
}

impl ConsoleSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// First text a client sees.
    pub fn welcome(&self) -> String {
        banner() + PROMPT
    }

    /// Feed one `command` payload. Returns the text chunks to send back, in order.
    pub fn feed(&mut self, data: &str, network: &mut Network) -> Vec<String> {
        let mut out = Vec::new();

        if self.input == ClientInput::Unknown {
            if is_keystroke_only(data) {
                self.input = ClientInput::Keystrokes;
            } else if data.chars().count() > 1 {
                self.input = ClientInput::Lines;
                // Single characters seen so far were lines of their own.
                self.line.clear();
            }
        }
        if self.input == ClientInput::Lines {
            out.push(format!("{data}\r\n"));
            out.extend(run_line(data.trim(), network));
            out.push(PROMPT.to_string());
            return out;
        }
        if data.starts_with('\x1b') {
            // Cursor keys and other escape sequences have no meaning here.
            return out;
        }

        for c in data.chars() {
            match c {
                '\r' | '\n' => {
                    out.push("\r\n".to_string());
                    let line = std::mem::take(&mut self.line);
                    out.extend(run_line(line.trim(), network));
                    out.push(PROMPT.to_string());
                }
                '\x7f' | '\x08' => {
                    if self.line.pop().is_some() {
                        out.push("\x08 \x08".to_string());
                    }
                }
                c if c.is_control() => {}
                c => {
                    self.line.push(c);
                    out.push(c.to_string());
                }
            }
        }
        out
    }

    pub fn pending(&self) -> &str {
        &self.line
    }
}

fn system(text: &str) -> String {
    format!("[System] {text}\r\n")
}

fn run_line(line: &str, network: &mut Network) -> Vec<String> {
    if line.is_empty() {
        return Vec::new();
    }
    let mut parts = line.splitn(2, char::is_whitespace);
    let target = parts.next().unwrap_or_default();
    if target.eq_ignore_ascii_case("help") {
        return vec![banner()];
    }

    let command = parts.next().map(str::trim).unwrap_or_default();
    if target.eq_ignore_ascii_case(BROADCAST) {
        return broadcast(command, network);
    }

    let Some(node) = network.canonical_id(target) else {
        return vec![system(&format!("Unknown node: {target}"))];
    };
    if command.is_empty() {
        return vec![system(&format!("Incomplete command. Usage: {node} <cmd>"))];
    }

    network.queue_command(&node, command.to_string());
    let mut out = vec![system(&format!("Queued command for {node}: {command}"))];
    run_queued(&node, network, &mut out);
    out
}

fn broadcast(command: &str, network: &mut Network) -> Vec<String> {
    if command.is_empty() {
        return vec![system(&format!("Incomplete command. Usage: {BROADCAST} <cmd>"))];
    }
    let count = network.queue_broadcast(command);
    let mut out = vec![system(&format!(
        "Queued command for all {count} nodes: {command}"
    ))];
    for node in network.ids() {
        run_queued(&node, network, &mut out);
    }
    out
}

/// Run everything queued on `node`, or report it waiting if the node is down.
fn run_queued(node: &str, network: &mut Network, out: &mut Vec<String>) {
    if !network.is_up(node) {
        let waiting = network.queued(node);
        out.push(system(&format!("{node} is down; {waiting} command(s) waiting")));
        return;
    }
    for queued in network.drain_commands(node) {
        out.push(execute(node, &queued, network));
    }
}

/// Run one command on `node` and render its output.
fn execute(node: &str, command: &str, network: &Network) -> String {
    let mut words = command.split_whitespace();
    let verb = words.next().unwrap_or_default().to_ascii_lowercase();
    let arg = words.next();

    match (verb.as_str(), arg) {
        ("table", _) => render_table(node, network),
        ("ping", Some(dest)) => match network.path(node, dest) {
            Some(path) => format!(
                "[{node}] Reply from {}: hops={} time={}ms\r\n",
                path[path.len() - 1],
                path.len() - 1,
                (path.len() - 1) * 4 + 1
            ),
            None => format!("[{node}] Destination {dest} unreachable.\r\n"),
        },
        ("tracert", Some(dest)) => match network.path(node, dest) {
            Some(path) => {
                let mut out = format!("[{node}] Tracing route to {dest}\r\n");
                for (hop, id) in path.iter().enumerate().skip(1) {
                    out.push_str(&format!("  {hop:>2}  {id}\r\n"));
                }
                out.push_str("Trace complete.\r\n");
                out
            }
            None => format!("[{node}] Destination {dest} unreachable.\r\n"),
        },
        ("send", Some(dest)) => {
            let message = words.collect::<Vec<_>>().join(" ");
            if message.is_empty() {
                return format!("[{node}] Usage: send <ID> <Msg>\r\n");
            }
            match network.path(node, dest) {
                Some(path) => format!(
                    "[{node}] Message to {} delivered via {}: {message}\r\n",
                    path[path.len() - 1],
                    path.join(" -> ")
                ),
                None => format!("[{node}] Destination {dest} unreachable.\r\n"),
            }
        }
        ("send", None) => format!("[{node}] Usage: send <ID> <Msg>\r\n"),
        ("ping" | "tracert", None) => format!("[{node}] Usage: {verb} <NodeID>\r\n"),
        _ => format!("[{node}] Unknown command: {command}\r\n"),
    }
}

fn render_table(node: &str, network: &Network) -> String {
    let mut out = format!("------- Routing Table ({node}) -------\r\n");
    out.push_str(&format!(
        "{:<15} {:<10} {:<15} {}\r\n",
        "Destination", "Cost", "Next Hop", "Interface"
    ));
    for route in network.routing_table(node) {
        out.push_str(&format!(
            "{:<15} {:<10} {:<15} {}\r\n",
            route.destination, route.cost, route.next_hop, route.interface
        ));
    }
    out.push_str("-----------------------------------\r\n");
    out
}
