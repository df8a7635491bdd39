use thiserror::Error;

/// Malformed or unexpected frame contents.
///
/// Any of these forces the session closed: the codec never attempts to
/// resynchronize a stream once a frame fails to decode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("empty frame")]
    EmptyFrame,

    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u8),

    #[error("malformed {command} frame: expected {expected} payload byte(s), got {got}")]
    Length {
        command: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("invalid {field} byte {value:#04x}")]
    InvalidArgument { field: &'static str, value: u8 },

    #[error("non-binary frame received")]
    NotBinary,

    #[error("unexpected {got} while waiting for {expected}")]
    Unexpected {
        expected: &'static str,
        got: &'static str,
    },
}

/// Top-level error type for the `lampctl-api` crate.
///
/// Transport failures of any flavour (DNS, refused, TLS, timeout) collapse
/// into [`Error::ConnectFailed`] while opening; once a connection exists,
/// failures surface as [`Error::Transport`] or [`Error::Closed`].
#[derive(Debug, Error)]
pub enum Error {
    // ── Connection ──────────────────────────────────────────────────
    /// The device could not be reached.
    #[error("could not connect to {address}: {reason}")]
    ConnectFailed { address: String, reason: String },

    /// The address is not a usable WebSocket URL.
    #[error("invalid device address: {0}")]
    InvalidAddress(#[from] url::ParseError),

    // ── Live connection ─────────────────────────────────────────────
    /// Reading or writing an open connection failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The peer closed the connection.
    #[error("connection closed")]
    Closed,

    // ── Codec ───────────────────────────────────────────────────────
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl Error {
    /// Returns `true` if this error happened before a connection existed.
    pub fn is_connect(&self) -> bool {
        matches!(self, Self::ConnectFailed { .. } | Self::InvalidAddress(_))
    }
}
