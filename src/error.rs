//! Error types for the bot session core.
//!
//! This module defines the session-level error taxonomy and the parse
//! errors produced by the line parser. Parse failures never escape the
//! read loop; they are downgraded to unrecognized events at the
//! classification layer.

use thiserror::Error;

/// Convenience type alias for Results using [`SessionError`].
pub type Result<T, E = SessionError> = std::result::Result<T, E>;

/// Errors raised by the session connection.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    /// TCP connect failed. Fatal to this attempt; reconnection is the
    /// caller's responsibility.
    #[error("connect to {addr} failed: {source}")]
    Connect {
        /// The `host:port` we tried to reach.
        addr: String,
        /// The underlying socket error.
        #[source]
        source: std::io::Error,
    },

    /// TCP connect did not complete within the bounded timeout.
    #[error("connect to {addr} timed out after {timeout_ms} ms")]
    ConnectTimeout {
        /// The `host:port` we tried to reach.
        addr: String,
        /// The timeout that elapsed.
        timeout_ms: u64,
    },

    /// I/O error during reading or writing after connect.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The configured wire charset label was not recognized.
    #[error("unknown wire charset: {0}")]
    UnknownCharset(String),
}

/// Errors encountered when splitting a protocol line into its parts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseError {
    /// Line was empty after trimming the terminator.
    #[error("empty line")]
    EmptyLine,

    /// No command token was found where one was required.
    #[error("missing command at position {position}")]
    MissingCommand {
        /// Character position where parsing stopped.
        position: usize,
    },
}

/// Why the session loop stopped.
///
/// Returned by the dispatcher when it leaves the `Stopped` state; the
/// binary maps each variant to a distinct process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// An operator issued `$stop` for this channel (or `all`).
    OperatorStop,
    /// An operator issued `$forcerestart`; the external restart path has
    /// been notified.
    ForcedRestart,
    /// The remote closed the connection (empty read). The external
    /// restart path has been notified.
    ConnectionLost,
    /// The process received an interrupt signal.
    Interrupted,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            StopReason::OperatorStop => "stopped by operator",
            StopReason::ForcedRestart => "forced restart by operator",
            StopReason::ConnectionLost => "lost connection with server",
            StopReason::Interrupted => "interrupted",
        };
        f.write_str(text)
    }
}
