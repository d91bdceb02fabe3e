// In-memory transport shared by the integration tests
#![allow(dead_code)]

use common::config::ConnectionConfig;
use common::errors::TransportError;
use common::models::{Credentials, FileAttributes, Protocol, RemoteEntry, Timeouts};
use common::transport::Transport;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex};

pub const TEST_HOST: &str = "sftp.example.com";
pub const TEST_USER: &str = "ftptest";
pub const TEST_PASSWORD: &str = "secret";
pub const FIXED_MTIME: i64 = 1_700_000_000;

/// SFTP "failure" status, classified as a protocol error
pub const SFTP_FAILURE: i32 = 4;
/// SFTP "permission denied" status
pub const SFTP_PERMISSION_DENIED: i32 = 3;
/// SFTP "no such file" status
pub const SFTP_NO_SUCH_FILE: i32 = 2;
/// SFTP "operation unsupported" status
pub const SFTP_OP_UNSUPPORTED: i32 = 8;

#[derive(Debug, Clone, Copy)]
pub enum ConnectFailure {
    Unresolvable,
    Refused,
}

#[derive(Default)]
pub struct RemoteState {
    pub files: BTreeMap<String, Vec<u8>>,
    pub dirs: BTreeSet<String>,
    /// Remaining injected failures per normalized path: (count, sftp code)
    pub get_failures: HashMap<String, (u32, i32)>,
    pub put_failures: HashMap<String, (u32, i32)>,
    pub stat_failures: HashMap<String, (u32, i32)>,
    pub delete_failures: HashMap<String, (u32, i32)>,
    pub connect_failure: Option<ConnectFailure>,
    pub get_calls: HashMap<String, u32>,
    pub put_calls: HashMap<String, u32>,
    pub mkdir_calls: Vec<String>,
    pub closed: u32,
}

/// Normalized key for a remote path: no leading "./" or "/", no trailing "/"
pub fn normalize(path: &str) -> String {
    let mut p = path;
    loop {
        if let Some(rest) = p.strip_prefix("./") {
            p = rest;
        } else if let Some(rest) = p.strip_prefix('/') {
            p = rest;
        } else {
            break;
        }
    }
    let p = p.trim_end_matches('/');
    if p == "." {
        String::new()
    } else {
        p.to_string()
    }
}

fn parent_of(path: &str) -> String {
    match path.rsplit_once('/') {
        Some((parent, _)) => parent.to_string(),
        None => String::new(),
    }
}

fn name_of(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}

fn status(code: i32, message: &str) -> TransportError {
    TransportError::SftpStatus {
        code,
        message: message.to_string(),
    }
}

/// Transport double whose handles all share one remote tree
#[derive(Clone)]
pub struct MockTransport {
    state: Arc<Mutex<RemoteState>>,
    password: String,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(RemoteState::default())),
            password: TEST_PASSWORD.to_string(),
        }
    }

    pub fn boxed(&self) -> Box<dyn Transport> {
        Box::new(self.clone())
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut RemoteState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn add_dir(&self, path: &str) {
        let key = normalize(path);
        self.with_state(|s| {
            let mut current = String::new();
            for part in key.split('/').filter(|p| !p.is_empty()) {
                if !current.is_empty() {
                    current.push('/');
                }
                current.push_str(part);
                s.dirs.insert(current.clone());
            }
        });
    }

    pub fn add_file(&self, path: &str, content: &[u8]) {
        let key = normalize(path);
        self.add_dir(&parent_of(&key));
        self.with_state(|s| {
            s.files.insert(key, content.to_vec());
        });
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.with_state(|s| s.files.get(&normalize(path)).cloned())
    }

    pub fn has_dir(&self, path: &str) -> bool {
        self.with_state(|s| s.dirs.contains(&normalize(path)))
    }

    pub fn file_count(&self) -> usize {
        self.with_state(|s| s.files.len())
    }

    /// Every remote file path under `root`, relative to it
    pub fn files_under(&self, root: &str) -> Vec<String> {
        let root = normalize(root);
        self.with_state(|s| {
            s.files
                .keys()
                .filter_map(|k| {
                    if root.is_empty() {
                        Some(k.clone())
                    } else {
                        k.strip_prefix(&format!("{}/", root)).map(str::to_string)
                    }
                })
                .collect()
        })
    }

    pub fn fail_get(&self, path: &str, times: u32, code: i32) {
        self.with_state(|s| {
            s.get_failures.insert(normalize(path), (times, code));
        });
    }

    pub fn fail_put(&self, path: &str, times: u32, code: i32) {
        self.with_state(|s| {
            s.put_failures.insert(normalize(path), (times, code));
        });
    }

    /// Make the next `times` stats of `path` answer with `code`, whatever
    /// the path holds
    pub fn fail_stat(&self, path: &str, times: u32, code: i32) {
        self.with_state(|s| {
            s.stat_failures.insert(normalize(path), (times, code));
        });
    }

    pub fn fail_delete(&self, path: &str, times: u32, code: i32) {
        self.with_state(|s| {
            s.delete_failures.insert(normalize(path), (times, code));
        });
    }

    pub fn mkdir_calls(&self) -> Vec<String> {
        self.with_state(|s| s.mkdir_calls.clone())
    }

    pub fn fail_connect(&self, failure: ConnectFailure) {
        self.with_state(|s| s.connect_failure = Some(failure));
    }

    pub fn get_calls(&self, path: &str) -> u32 {
        self.with_state(|s| s.get_calls.get(&normalize(path)).copied().unwrap_or(0))
    }

    pub fn put_calls(&self, path: &str) -> u32 {
        self.with_state(|s| s.put_calls.get(&normalize(path)).copied().unwrap_or(0))
    }

    pub fn closed(&self) -> u32 {
        self.with_state(|s| s.closed)
    }
}

fn take_failure(failures: &mut HashMap<String, (u32, i32)>, key: &str) -> Option<i32> {
    let (remaining, code) = failures.get_mut(key)?;
    if *remaining == 0 {
        return None;
    }
    *remaining -= 1;
    Some(*code)
}

fn is_dir(state: &RemoteState, key: &str) -> bool {
    key.is_empty() || state.dirs.contains(key)
}

impl Transport for MockTransport {
    fn protocol(&self) -> Protocol {
        Protocol::Sftp
    }

    fn connect(&mut self, host: &str, _port: u16, _timeouts: Timeouts) -> Result<(), TransportError> {
        match self.with_state(|s| s.connect_failure) {
            Some(ConnectFailure::Unresolvable) => Err(TransportError::HostResolution {
                host: host.to_string(),
                reason: "Name or service not known".to_string(),
            }),
            Some(ConnectFailure::Refused) => Err(TransportError::ConnectionRefused {
                host: host.to_string(),
            }),
            None => Ok(()),
        }
    }

    fn authenticate(&mut self, credentials: &Credentials) -> Result<(), TransportError> {
        match credentials {
            Credentials::Password { password, .. } if *password == self.password => Ok(()),
            other => Err(TransportError::AuthenticationFailed {
                username: other.username().to_string(),
                reason: "Authentication failed".to_string(),
            }),
        }
    }

    fn list(&mut self, path: &str) -> Result<Vec<RemoteEntry>, TransportError> {
        let key = normalize(path);
        self.with_state(|s| {
            if !is_dir(s, &key) {
                return Err(status(2, "No such file"));
            }
            let mut entries = Vec::new();
            for dir in s.dirs.iter().filter(|d| parent_of(d) == key && !d.is_empty()) {
                entries.push(RemoteEntry::directory(name_of(dir)));
            }
            for (file, content) in s.files.iter().filter(|(f, _)| parent_of(f) == key) {
                let mut attributes = FileAttributes::new().with_mtime(FIXED_MTIME);
                attributes.insert(FileAttributes::SIZE, content.len() as i64);
                entries.push(RemoteEntry::file(name_of(file), attributes));
            }
            Ok(entries)
        })
    }

    fn stat(&mut self, path: &str) -> Result<RemoteEntry, TransportError> {
        let key = normalize(path);
        self.with_state(|s| {
            if let Some(code) = take_failure(&mut s.stat_failures, &key) {
                return Err(status(code, "Injected stat failure"));
            }
            if let Some(content) = s.files.get(&key) {
                let mut attributes = FileAttributes::new().with_mtime(FIXED_MTIME);
                attributes.insert(FileAttributes::ATIME, FIXED_MTIME);
                attributes.insert(FileAttributes::SIZE, content.len() as i64);
                Ok(RemoteEntry::file(name_of(&key), attributes))
            } else if is_dir(s, &key) {
                Ok(RemoteEntry::directory(name_of(&key)))
            } else {
                Err(status(2, "No such file"))
            }
        })
    }

    fn get(&mut self, remote_path: &str, local_path: &Path) -> Result<(), TransportError> {
        let key = normalize(remote_path);
        let content = self.with_state(|s| {
            *s.get_calls.entry(key.clone()).or_insert(0) += 1;
            if let Some(code) = take_failure(&mut s.get_failures, &key) {
                return Err(status(code, "Injected get failure"));
            }
            s.files.get(&key).cloned().ok_or_else(|| status(2, "No such file"))
        })?;
        std::fs::write(local_path, content)?;
        Ok(())
    }

    fn put(&mut self, local_path: &Path, remote_path: &str) -> Result<(), TransportError> {
        let key = normalize(remote_path);
        let content = std::fs::read(local_path)?;
        self.with_state(|s| {
            *s.put_calls.entry(key.clone()).or_insert(0) += 1;
            if let Some(code) = take_failure(&mut s.put_failures, &key) {
                return Err(status(code, "Injected put failure"));
            }
            if !is_dir(s, &parent_of(&key)) {
                return Err(status(2, "No such file"));
            }
            s.files.insert(key, content);
            Ok(())
        })
    }

    fn delete(&mut self, path: &str) -> Result<(), TransportError> {
        let key = normalize(path);
        self.with_state(|s| {
            if let Some(code) = take_failure(&mut s.delete_failures, &key) {
                return Err(status(code, "Injected delete failure"));
            }
            match s.files.remove(&key) {
                Some(_) => Ok(()),
                None => Err(status(2, "No such file")),
            }
        })
    }

    fn mkdir(&mut self, path: &str) -> Result<(), TransportError> {
        let key = normalize(path);
        self.with_state(|s| {
            s.mkdir_calls.push(key.clone());
            if is_dir(s, &key) || s.files.contains_key(&key) {
                return Err(status(11, "File already exists"));
            }
            if !is_dir(s, &parent_of(&key)) {
                return Err(status(2, "No such file"));
            }
            s.dirs.insert(key);
            Ok(())
        })
    }

    fn rmdir(&mut self, path: &str) -> Result<(), TransportError> {
        let key = normalize(path);
        self.with_state(|s| {
            if !s.dirs.contains(&key) {
                return Err(status(2, "No such file"));
            }
            let occupied = s.files.keys().any(|f| parent_of(f) == key)
                || s.dirs.iter().any(|d| parent_of(d) == key);
            if occupied {
                return Err(status(SFTP_FAILURE, "Directory not empty"));
            }
            s.dirs.remove(&key);
            Ok(())
        })
    }

    fn close(&mut self) {
        self.with_state(|s| s.closed += 1);
    }
}

pub fn credentials(password: &str) -> Credentials {
    Credentials::Password {
        username: TEST_USER.to_string(),
        password: password.to_string(),
    }
}

/// Connection settings against the mock, local side rooted at `local_dir`
pub fn config(local_dir: &Path) -> ConnectionConfig {
    let mut config = ConnectionConfig::new(TEST_HOST, 22, credentials(TEST_PASSWORD));
    config.directory_path = "readwrite_dir".to_string();
    config.local_directory = local_dir.to_path_buf();
    config.connection_test_pause_ms = 0;
    config
}

/// Write `content` to `relative` below `root`, creating parents
pub fn write_local(root: &Path, relative: &str, content: &[u8]) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}
