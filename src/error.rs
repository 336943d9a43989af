use std::error::Error;
use std::fmt;
use std::fmt::Display;

use crate::network::codec::CodecError;

/// All errors this library can return.
///
/// The per-frame path ([`FrameScheduler::tick`](crate::FrameScheduler::tick)) never
/// fails: late, duplicated and gapped packets are absorbed by policy. Errors only
/// surface while a session or a transport is being set up.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LockstepError {
    /// The pacing configuration was rejected.
    InvalidConfig {
        /// Further specifies why the configuration was invalid.
        info: String,
    },
    /// No transport could be established for a networked session.
    ///
    /// This is the start-up failure of a lock-step session; it is never retried internally.
    TransportUnavailable {
        /// What was missing or failed.
        context: String,
    },
    /// Serialization or deserialization of commands or packets failed.
    SerializationError {
        /// A description of what failed to serialize/deserialize.
        context: String,
    },
    /// An internal error occurred that should not happen under normal operation.
    /// If you encounter this error, please report it as a bug.
    InternalError {
        /// A description of the internal error.
        context: String,
    },
    /// A network socket operation failed.
    SocketError {
        /// A description of the socket error.
        context: String,
    },
}

impl Display for LockstepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockstepError::InvalidConfig { info } => {
                write!(f, "Invalid configuration: {}", info)
            }
            LockstepError::TransportUnavailable { context } => {
                write!(f, "Transport unavailable at session start: {}", context)
            }
            LockstepError::SerializationError { context } => {
                write!(f, "Serialization error: {}", context)
            }
            LockstepError::InternalError { context } => {
                write!(f, "Internal error (please report as bug): {}", context)
            }
            LockstepError::SocketError { context } => {
                write!(f, "Socket error: {}", context)
            }
        }
    }
}

impl Error for LockstepError {}

impl From<CodecError> for LockstepError {
    fn from(err: CodecError) -> Self {
        LockstepError::SerializationError {
            context: err.to_string(),
        }
    }
}

impl From<std::io::Error> for LockstepError {
    fn from(err: std::io::Error) -> Self {
        LockstepError::SocketError {
            context: format!("{:?}: {}", err.kind(), err),
        }
    }
}
