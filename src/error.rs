use std::fmt;

/// BenchError enumerates over all possible errors returned by the
/// load generator and its store collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BenchError {
    /// Bad configuration or argument, detected before any store call.
    InvalidArgument(String),
    /// The store rejected or failed a `get`/`put`.
    Store(String),
    /// Malformed frame on the wire.
    Protocol(String),
    /// A read or write on the connection did not finish in time.
    Timeout(String),
    /// Socket or file failure.
    Io(String),
}

impl fmt::Display for BenchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            Self::Store(msg) => write!(f, "store error: {}", msg),
            Self::Protocol(msg) => write!(f, "protocol error: {}", msg),
            Self::Timeout(msg) => write!(f, "timeout: {}", msg),
            Self::Io(msg) => write!(f, "io error: {}", msg),
        }
    }
}

impl std::error::Error for BenchError {}

impl From<std::io::Error> for BenchError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
