/// Connection and session lifecycle failures. Connect/pair failures are
/// non-fatal and retryable by the caller; read-loop failures surface only as
/// the reason handed to the disconnect event.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("pairing write failed: {0}")]
    Pair(#[source] std::io::Error),

    #[error("socket closed by host")]
    Eof,

    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not connected")]
    NotConnected,
}

impl ConnectionError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect_failed",
            Self::Pair(_) => "pair_failed",
            Self::Eof => "eof",
            Self::Io(_) => "io",
            Self::NotConnected => "not_connected",
        }
    }
}

/// A line that could not be decoded into an inbound message. Never fatal:
/// the offending line is dropped and the read loop continues.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("message has no type field")]
    MissingType,

    #[error("malformed {tag:?} message: {source}")]
    Shape {
        tag: String,
        #[source]
        source: serde_json::Error,
    },
}
