/// Why a `claimCharacter` request was refused.
///
/// Both variants are reported to the requester only and leave state untouched.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ClaimError {
    #[error("{name} is already controlled by another player")]
    AlreadyClaimed { name: String },
    #[error("a character name is required")]
    EmptyName,
}

impl ClaimError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::AlreadyClaimed { .. } => "claim_conflict",
            Self::EmptyName => "empty_name",
        }
    }
}

/// Inbound frame could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unknown event: {0}")]
    UnknownEvent(String),
    #[error("invalid payload for {event}: {source}")]
    InvalidPayload {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ProtocolError {
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed",
            Self::UnknownEvent(_) => "unknown_event",
            Self::InvalidPayload { .. } => "invalid_payload",
        }
    }
}
