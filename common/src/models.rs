// Data models shared by transports and the transfer orchestration

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

// ============================================================================
// Transport-facing models
// ============================================================================

/// Remote file metadata keyed by attribute name (`mtime`, `atime`, `size`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttributes(BTreeMap<String, i64>);

impl FileAttributes {
    pub const MTIME: &'static str = "mtime";
    pub const ATIME: &'static str = "atime";
    pub const SIZE: &'static str = "size";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mtime(mut self, mtime: i64) -> Self {
        self.insert(Self::MTIME, mtime);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: i64) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<i64> {
        self.0.get(key).copied()
    }

    pub fn mtime(&self) -> Option<i64> {
        self.get(Self::MTIME)
    }

    pub fn atime(&self) -> Option<i64> {
        self.get(Self::ATIME)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Overlay `other` on top of these attributes
    pub fn merge(&mut self, other: &FileAttributes) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), *value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// One entry returned by a directory listing or stat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    /// Bare name within the listed directory
    pub name: String,
    pub is_directory: bool,
    pub attributes: FileAttributes,
}

impl RemoteEntry {
    pub fn file(name: impl Into<String>, attributes: FileAttributes) -> Self {
        Self {
            name: name.into(),
            is_directory: false,
            attributes,
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_directory: true,
            attributes: FileAttributes::default(),
        }
    }
}

/// Credentials used to authenticate a transport session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credentials {
    Password {
        username: String,
        password: String,
    },
    SshKey {
        username: String,
        private_key_path: String,
        #[serde(default)]
        passphrase: Option<String>,
    },
}

impl Credentials {
    pub fn username(&self) -> &str {
        match self {
            Credentials::Password { username, .. } => username,
            Credentials::SshKey { username, .. } => username,
        }
    }
}

/// Open/read timeouts applied when a transport connects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub open: Duration,
    pub read: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            open: Duration::from_secs(30),
            read: Duration::from_secs(60),
        }
    }
}

// ============================================================================
// Orchestration models
// ============================================================================

/// Wire protocol spoken by a configured source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Sftp,
    Ftp,
}

impl Protocol {
    pub fn label(&self) -> &'static str {
        match self {
            Protocol::Sftp => "SFTP",
            Protocol::Ftp => "FTP",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Protocol::Sftp => 22,
            Protocol::Ftp => 21,
        }
    }
}

/// What a configured source does on each run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferDirection {
    Get,
    Put,
    Test,
}

impl TransferDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferDirection::Get => "get",
            TransferDirection::Put => "put",
            TransferDirection::Test => "test",
        }
    }
}

/// Per-batch counts reported by `get_files`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransferResult {
    pub attempted: usize,
    pub collected: usize,
    pub failed: usize,
}
