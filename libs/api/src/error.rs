/// Category of an ingest error. Decides how far the failure reaches:
/// tear down the session, fail the command, or refuse to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or untrusted bytes on the wire — the stream position is
    /// no longer reliable, the session must be torn down.
    Protocol,
    /// The storage collaborator refused the operation (unknown frame,
    /// chunk conflict, finalized frame).
    Storage,
    /// I/O error on the connection — transient from the peer's point of
    /// view, fatal for this session.
    Io,
    /// Invalid configuration — permanent, fail at startup.
    Config,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Protocol => f.write_str("protocol"),
            ErrorKind::Storage => f.write_str("storage"),
            ErrorKind::Io => f.write_str("io"),
            ErrorKind::Config => f.write_str("config"),
        }
    }
}

/// Unified error type for the decoding path.
///
/// Carries an `ErrorKind` for categorization and a human-readable message.
/// `From` impls assign the appropriate kind automatically and allow
/// ergonomic `?` inside the reader and session code.
#[derive(Clone)]
pub struct IngestError {
    kind: ErrorKind,
    message: String,
}

impl IngestError {
    /// Protocol violation — session is no longer parseable.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Protocol, message: msg.into() }
    }

    /// Storage collaborator failure — the command fails explicitly.
    pub fn storage(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Storage, message: msg.into() }
    }

    /// Connection I/O failure.
    pub fn io(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Io, message: msg.into() }
    }

    /// Configuration error — permanent, fail at startup.
    pub fn config(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Config, message: msg.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Debug for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for IngestError {}

impl From<std::io::Error> for IngestError {
    fn from(e: std::io::Error) -> Self {
        Self { kind: ErrorKind::Io, message: e.to_string() }
    }
}

impl From<std::string::FromUtf8Error> for IngestError {
    fn from(e: std::string::FromUtf8Error) -> Self {
        Self { kind: ErrorKind::Protocol, message: e.to_string() }
    }
}
