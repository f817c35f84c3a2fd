//! Decodes inbound frames and dispatches them to the sink for their kind.

use tracing::{debug, warn};

use crate::envelope::Envelope;
use crate::log_sink::LogSink;
use crate::topology_sink::TopologySink;

/// Rewrite every bare `\n` as `\r\n`. Existing `\r\n` pairs and lone `\r`
/// are kept; no other byte is touched.
pub fn normalize_line_endings(text: &str) -> String {
    normalize_after(text, false).0
}

/// Like [`normalize_line_endings`], for text that continues a stream.
/// `after_cr` says whether the previous chunk ended in `\r`; the returned
/// flag says whether this one does.
fn normalize_after(text: &str, after_cr: bool) -> (String, bool) {
    let mut out = String::with_capacity(text.len() + text.len() / 16);
    let mut prev_cr = after_cr;
    for c in text.chars() {
        if c == '\n' && !prev_cr {
            out.push('\r');
        }
        out.push(c);
        prev_cr = c == '\r';
    }
    (out, prev_cr)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStats {
    pub routed: u64,
    pub dropped: u64,
}

/// Where a single frame ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    Log,
    Topology { dropped_links: usize },
    Dropped,
}

#[derive(Debug, Default)]
pub struct MessageRouter {
    stats: RouterStats,
    /// Last log chunk ended in `\r`; a leading `\n` in the next completes the pair.
    log_after_cr: bool,
}

impl MessageRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one raw frame and dispatch it. A frame that fails to decode is
    /// logged and dropped; it never affects the next one.
    pub fn route_frame(
        &mut self,
        frame: &str,
        logs: &mut LogSink,
        topology: &mut TopologySink,
    ) -> Routed {
        match Envelope::decode(frame) {
            Ok(envelope) => self.dispatch(envelope, logs, topology),
            Err(e) => {
                warn!(code = e.error_code(), "dropping inbound frame: {}", e);
                self.stats.dropped += 1;
                Routed::Dropped
            }
        }
    }

    pub fn dispatch(
        &mut self,
        envelope: Envelope,
        logs: &mut LogSink,
        topology: &mut TopologySink,
    ) -> Routed {
        match envelope {
            Envelope::Log(text) => {
                let (text, ends_cr) = normalize_after(&text, self.log_after_cr);
                self.log_after_cr = ends_cr;
                logs.append(text);
                self.stats.routed += 1;
                Routed::Log
            }
            Envelope::Topology(snapshot) => {
                let nodes = snapshot.nodes.len();
                let dropped_links = topology.apply(snapshot);
                debug!(nodes, dropped_links, "topology snapshot applied");
                self.stats.routed += 1;
                Routed::Topology { dropped_links }
            }
            other => {
                warn!(kind = other.kind().tag(), "no inbound route for envelope, dropping");
                self.stats.dropped += 1;
                Routed::Dropped
            }
        }
    }

    pub fn stats(&self) -> RouterStats {
        self.stats
    }

    /// A fresh channel starts a fresh log stream.
    pub(crate) fn reset_stream(&mut self) {
        self.log_after_cr = false;
    }
}
