//! The tagged wrapper carried by every frame on the shared channel.
//!
//! Wire format: `{"type": "log" | "topo" | "command", "data": <payload>}`

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DecodeError;
use crate::topology::TopologySnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvelopeKind {
    Log,
    Topology,
    Command,
}

impl EnvelopeKind {
    pub fn tag(self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Topology => "topo",
            Self::Command => "command",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "log" => Some(Self::Log),
            "topo" => Some(Self::Topology),
            "command" => Some(Self::Command),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// Raw terminal text, possibly with ANSI escapes.
    Log(String),
    /// Already normalized into the canonical shape.
    Topology(TopologySnapshot),
    /// Operator input travelling to the backend.
    Command(String),
}

#[derive(Deserialize)]
struct InboundFrame {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Serialize)]
struct OutboundFrame<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    data: Value,
}

impl Envelope {
    pub fn command(text: impl Into<String>) -> Self {
        Self::Command(text.into())
    }

    pub fn kind(&self) -> EnvelopeKind {
        match self {
            Self::Log(_) => EnvelopeKind::Log,
            Self::Topology(_) => EnvelopeKind::Topology,
            Self::Command(_) => EnvelopeKind::Command,
        }
    }

    /// Decode one text frame. Unknown `type` values are an error, never a
    /// pass-through variant.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let frame: InboundFrame = serde_json::from_str(text)?;
        let tag = frame.kind.ok_or(DecodeError::MissingField("type"))?;
        let data = frame.data.ok_or(DecodeError::MissingField("data"))?;

        match EnvelopeKind::from_tag(&tag) {
            Some(EnvelopeKind::Log) => match data {
                Value::String(text) => Ok(Self::Log(text)),
                _ => Err(DecodeError::NonTextPayload { kind: "log" }),
            },
            Some(EnvelopeKind::Command) => match data {
                Value::String(text) => Ok(Self::Command(text)),
                _ => Err(DecodeError::NonTextPayload { kind: "command" }),
            },
            Some(EnvelopeKind::Topology) => TopologySnapshot::from_wire(data).map(Self::Topology),
            None => Err(DecodeError::UnknownKind(tag)),
        }
    }

    /// Encode as one text frame. Topology is always written in the graph shape.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        let data = match self {
            Self::Log(text) | Self::Command(text) => Value::String(text.clone()),
            Self::Topology(snapshot) => snapshot.to_wire(),
        };
        serde_json::to_string(&OutboundFrame {
            kind: self.kind().tag(),
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::Node;

    #[test]
    fn decode_log() {
        let env = Envelope::decode(r#"{"type":"log","data":"\u001b[1;32mok\u001b[0m\n"}"#).unwrap();
        assert_eq!(env, Envelope::Log("\x1b[1;32mok\x1b[0m\n".to_string()));
    }

    #[test]
    fn decode_topology_legacy_shape() {
        let env = Envelope::decode(r#"{"type":"topo","data":{"id":"A","table":{"B":{"cost":1}}}}"#)
            .unwrap();
        match env {
            Envelope::Topology(snap) => {
                assert_eq!(snap.self_id.as_deref(), Some("A"));
                assert_eq!(snap.nodes.len(), 2);
            }
            other => panic!("expected topology, got {other:?}"),
        }
    }

    #[test]
    fn decode_unknown_kind() {
        let err = Envelope::decode(r#"{"type":"metrics","data":{}}"#).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownKind(ref k) if k == "metrics"));
    }

    #[test]
    fn decode_missing_fields() {
        let err = Envelope::decode(r#"{"data":"x"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::MissingField("type")));
        let err = Envelope::decode(r#"{"type":"log"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::MissingField("data")));
    }

    #[test]
    fn decode_non_text_log() {
        let err = Envelope::decode(r#"{"type":"log","data":42}"#).unwrap_err();
        assert_eq!(err.error_code(), "non_text_payload");
    }

    #[test]
    fn decode_garbage() {
        assert!(Envelope::decode("not json").is_err());
        assert!(Envelope::decode("[1,2,3]").is_err());
    }

    #[test]
    fn encode_command() {
        let json = Envelope::command("A ping B").encode().unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "command");
        assert_eq!(value["data"], "A ping B");
    }

    #[test]
    fn encode_command_keeps_control_characters() {
        let json = Envelope::command("\x7f").encode().unwrap();
        assert_eq!(Envelope::decode(&json).unwrap(), Envelope::command("\x7f"));
    }

    #[test]
    fn encode_topology_uses_topo_tag() {
        let snap = TopologySnapshot {
            self_id: None,
            nodes: vec![Node::new("A", 10.0)],
            links: Vec::new(),
        };
        let json = Envelope::Topology(snap).encode().unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "topo");
        assert_eq!(value["data"]["nodes"][0]["id"], "A");
    }
}
