//! Error types for frame decoding and connection management.
//!
//! Nothing here is fatal to the console: a `DecodeError` costs one frame, a
//! `ConnectionError` costs one connect attempt.

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed frame: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("frame is missing the `{0}` field")]
    MissingField(&'static str),

    #[error("unknown envelope type `{0}`")]
    UnknownKind(String),

    #[error("`{kind}` payload must be a string")]
    NonTextPayload { kind: &'static str },

    #[error("topology payload matches no known shape")]
    UnknownTopologyShape,
}

impl DecodeError {
    /// Short machine-readable code, used as a structured log field.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidJson(_) => "invalid_json",
            Self::MissingField(_) => "missing_field",
            Self::UnknownKind(_) => "unknown_kind",
            Self::NonTextPayload { .. } => "non_text_payload",
            Self::UnknownTopologyShape => "unknown_topology_shape",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("invalid endpoint origin `{0}`: expected http:// or https://")]
    InvalidOrigin(String),

    #[error("failed to encode outbound envelope: {0}")]
    Encode(#[from] serde_json::Error),
}
