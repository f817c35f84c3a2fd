//! Core of the routewatch operator console.
//!
//! One WebSocket channel carries two inbound streams (terminal log text and
//! topology snapshots) and one outbound stream (operator commands). This
//! crate multiplexes them: [`ConnectionManager`] owns the channel,
//! [`MessageRouter`] fans inbound frames out to [`LogSink`] and
//! [`TopologySink`], an [`InputStrategy`] turns keystrokes into outbound
//! envelopes, and [`LayoutController`] keeps the two panes sized.
//!
//! [`Session`] wires one of each together. Front-ends only talk to it.

pub mod connection;
pub mod envelope;
pub mod error;
pub mod input;
pub mod layout;
pub mod log_sink;
pub mod router;
pub mod session;
pub mod topology;
pub mod topology_sink;

pub use connection::{
    ConnectionEvent, ConnectionManager, ConnectionState, Endpoint, TransportEvent,
};
pub use envelope::{Envelope, EnvelopeKind};
pub use error::{ConnectionError, DecodeError};
pub use input::{CommandEncoder, InputMode, InputStrategy, KeystrokeStreamed, LineBuffered};
pub use layout::{DragState, FitTarget, LayoutController, LayoutState, PaneBounds, Size};
pub use log_sink::LogSink;
pub use router::{MessageRouter, Routed, RouterStats};
pub use session::{Lifecycle, Session, SessionConfig};
pub use topology::{Link, Node, RoutingTableTopology, TopologySnapshot, WireShape};
pub use topology_sink::{GraphView, TopologySink};
