// Error handling framework
// Classified transfer errors and raw transport failures

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Semantic error kinds produced by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    Connection,
    Timeout,
    Permissions,
    File,
    Protocol,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Connection => "ConnectionError",
            ErrorKind::Timeout => "TimeoutError",
            ErrorKind::Permissions => "PermissionsError",
            ErrorKind::File => "FileError",
            ErrorKind::Protocol => "ProtocolError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host/file context attached to a classified error
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    pub host: Option<String>,
    pub file: Option<String>,
}

impl ErrorContext {
    pub fn host(host: impl Into<String>) -> Self {
        Self {
            host: Some(host.into()),
            file: None,
        }
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Message prefix in the form "Error on host H: Error transferring file F. "
    pub fn prefix(&self) -> String {
        let mut prefix = String::new();
        if let Some(host) = &self.host {
            prefix.push_str(&format!("Error on host {}: ", host));
        }
        if let Some(file) = &self.file {
            prefix.push_str(&format!("Error transferring file {}. ", file));
        }
        prefix
    }
}

/// A transfer failure classified into one of five semantic kinds
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct TransferError {
    pub kind: ErrorKind,
    pub message: String,
    pub host: Option<String>,
    pub file: Option<String>,
}

impl TransferError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            host: None,
            file: None,
        }
    }

    pub fn with_context(mut self, context: &ErrorContext) -> Self {
        self.host = context.host.clone();
        self.file = context.file.clone();
        self
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connection, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn permissions(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Permissions, message)
    }

    pub fn file(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::File, message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Protocol, message)
    }

    /// Same kind and context, message prefixed with `label`
    pub fn prefixed(mut self, label: &str) -> Self {
        self.message = format!("{}{}", label, self.message);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// Raw failures surfaced by a transport before classification
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Unable to resolve host {host}: {reason}")]
    HostResolution { host: String, reason: String },

    #[error("Connection refused by {host}")]
    ConnectionRefused { host: String },

    #[error("Opening the connection timed out: {0}")]
    OpenTimeout(String),

    #[error("Read timed out: {0}")]
    ReadTimeout(String),

    #[error("Connection lost: {0}")]
    Disconnected(String),

    #[error("Authentication failed for user {username}: {reason}")]
    AuthenticationFailed { username: String, reason: String },

    #[error("Host key error: {0}")]
    HostKey(String),

    #[error("SFTP status {code}: {message}")]
    SftpStatus { code: i32, message: String },

    #[error("FTP reply {code}: {message}")]
    FtpReply { code: u32, message: String },

    #[error("Not connected")]
    NotConnected,

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
