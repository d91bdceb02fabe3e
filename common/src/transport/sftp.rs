// SFTP transport over libssh2
// Every ssh2 failure becomes a TransportError

use super::{connect_tcp, Transport};
use crate::errors::TransportError;
use crate::models::{Credentials, FileAttributes, Protocol, RemoteEntry, Timeouts};
use ssh2::{ErrorCode, FileStat, Session, Sftp};
use std::fs::File;
use std::io;
use std::net::TcpStream;
use std::path::Path;
use tracing::{debug, error, info, instrument};

// libssh2 session error codes
const LIBSSH2_ERROR_SOCKET_SEND: i32 = -7;
const LIBSSH2_ERROR_TIMEOUT: i32 = -9;
const LIBSSH2_ERROR_HOSTKEY_INIT: i32 = -10;
const LIBSSH2_ERROR_HOSTKEY_SIGN: i32 = -11;
const LIBSSH2_ERROR_SOCKET_DISCONNECT: i32 = -13;
const LIBSSH2_ERROR_AUTHENTICATION_FAILED: i32 = -18;
const LIBSSH2_ERROR_PUBLICKEY_UNVERIFIED: i32 = -19;
const LIBSSH2_ERROR_SOCKET_TIMEOUT: i32 = -30;
const LIBSSH2_ERROR_SOCKET_RECV: i32 = -43;

/// SFTP session wrapper
pub struct SftpTransport {
    session: Option<Session>,
    sftp: Option<Sftp>,
    _tcp: Option<TcpStream>,
}

impl SftpTransport {
    pub fn new() -> Self {
        Self {
            session: None,
            sftp: None,
            _tcp: None,
        }
    }

    fn session(&self) -> Result<&Session, TransportError> {
        self.session.as_ref().ok_or(TransportError::NotConnected)
    }

    fn sftp(&self) -> Result<&Sftp, TransportError> {
        self.sftp.as_ref().ok_or(TransportError::NotConnected)
    }
}

impl Default for SftpTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Translate an ssh2 error, keeping SFTP status codes intact
fn map_ssh_error(e: ssh2::Error) -> TransportError {
    match e.code() {
        ErrorCode::SFTP(code) => TransportError::SftpStatus {
            code,
            message: e.message().to_string(),
        },
        ErrorCode::Session(code) => match code {
            LIBSSH2_ERROR_TIMEOUT | LIBSSH2_ERROR_SOCKET_TIMEOUT => {
                TransportError::ReadTimeout(e.message().to_string())
            }
            LIBSSH2_ERROR_SOCKET_DISCONNECT | LIBSSH2_ERROR_SOCKET_SEND | LIBSSH2_ERROR_SOCKET_RECV => {
                TransportError::Disconnected(e.message().to_string())
            }
            LIBSSH2_ERROR_HOSTKEY_INIT | LIBSSH2_ERROR_HOSTKEY_SIGN => {
                TransportError::HostKey(e.message().to_string())
            }
            _ => TransportError::Other(format!("{} (libssh2 code {})", e.message(), code)),
        },
    }
}

/// io::Error raised while streaming file content; libssh2 tunnels its own
/// errors through io::Error, so unwrap those back to status codes.
fn map_stream_error(e: io::Error) -> TransportError {
    if e.get_ref().map_or(false, |inner| inner.is::<ssh2::Error>()) {
        if let Some(Ok(ssh)) = e.into_inner().map(|inner| inner.downcast::<ssh2::Error>()) {
            return map_ssh_error(*ssh);
        }
        return TransportError::Other("SFTP stream error".to_string());
    }
    match e.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
            TransportError::ReadTimeout(e.to_string())
        }
        _ => TransportError::Io(e),
    }
}

fn entry_from_stat(name: String, stat: &FileStat) -> RemoteEntry {
    let mut attributes = FileAttributes::new();
    if let Some(mtime) = stat.mtime {
        attributes.insert(FileAttributes::MTIME, mtime as i64);
    }
    if let Some(atime) = stat.atime {
        attributes.insert(FileAttributes::ATIME, atime as i64);
    }
    if let Some(size) = stat.size {
        attributes.insert(FileAttributes::SIZE, size as i64);
    }
    RemoteEntry {
        name,
        is_directory: stat.is_dir(),
        attributes,
    }
}

/// Log the server host key fingerprint
fn log_host_key(sess: &Session) {
    if let Some((_host_key_bytes, host_key_type)) = sess.host_key() {
        if let Some(hash_bytes) = sess.host_key_hash(ssh2::HashType::Sha256) {
            let hash_hex = hash_bytes
                .iter()
                .map(|b| format!("{:02x}", b))
                .collect::<Vec<_>>()
                .join(":");
            debug!(host_key_type = ?host_key_type, hash = %hash_hex, "Server host key");
        }
    }
}

impl Transport for SftpTransport {
    fn protocol(&self) -> Protocol {
        Protocol::Sftp
    }

    #[instrument(skip(self, timeouts), fields(host = %host, port = %port))]
    fn connect(
        &mut self,
        host: &str,
        port: u16,
        timeouts: Timeouts,
    ) -> Result<(), TransportError> {
        info!(host = %host, port = %port, "Establishing SFTP connection");

        let tcp = connect_tcp(host, port, timeouts)?;

        let mut sess = Session::new().map_err(|e| {
            error!(error = %e, "Failed to create SSH session");
            map_ssh_error(e)
        })?;
        sess.set_timeout(timeouts.read.as_millis().min(u32::MAX as u128) as u32);
        sess.set_tcp_stream(tcp.try_clone()?);

        sess.handshake().map_err(|e| {
            error!(error = %e, "SSH handshake failed");
            map_ssh_error(e)
        })?;
        log_host_key(&sess);

        self.session = Some(sess);
        self._tcp = Some(tcp);
        Ok(())
    }

    #[instrument(skip(self, credentials), fields(username = %credentials.username()))]
    fn authenticate(&mut self, credentials: &Credentials) -> Result<(), TransportError> {
        let sess = self.session()?;
        let username = credentials.username().to_string();

        let result = match credentials {
            Credentials::Password { username, password } => {
                debug!(username = %username, "Authenticating with password");
                sess.userauth_password(username, password)
            }
            Credentials::SshKey {
                username,
                private_key_path,
                passphrase,
            } => {
                debug!(username = %username, key_path = %private_key_path, "Authenticating with SSH key");
                sess.userauth_pubkey_file(
                    username,
                    None,
                    Path::new(private_key_path),
                    passphrase.as_deref(),
                )
            }
        };

        result.map_err(|e| match e.code() {
            ErrorCode::Session(LIBSSH2_ERROR_AUTHENTICATION_FAILED)
            | ErrorCode::Session(LIBSSH2_ERROR_PUBLICKEY_UNVERIFIED) => {
                error!(error = %e, username = %username, "SSH authentication failed");
                TransportError::AuthenticationFailed {
                    username: username.clone(),
                    reason: e.message().to_string(),
                }
            }
            _ => map_ssh_error(e),
        })?;

        if !sess.authenticated() {
            return Err(TransportError::AuthenticationFailed {
                username,
                reason: "session not authenticated".to_string(),
            });
        }

        let sftp = sess.sftp().map_err(|e| {
            error!(error = %e, "Failed to open SFTP channel");
            map_ssh_error(e)
        })?;
        self.sftp = Some(sftp);

        info!("SFTP connection established successfully");
        Ok(())
    }

    fn list(&mut self, path: &str) -> Result<Vec<RemoteEntry>, TransportError> {
        let entries = self.sftp()?.readdir(Path::new(path)).map_err(map_ssh_error)?;
        debug!(dir_path = %path, entries_count = entries.len(), "Directory listed");

        Ok(entries
            .into_iter()
            .filter_map(|(entry_path, stat)| {
                let name = entry_path.file_name()?.to_str()?.to_string();
                if name == "." || name == ".." {
                    return None;
                }
                Some(entry_from_stat(name, &stat))
            })
            .collect())
    }

    fn stat(&mut self, path: &str) -> Result<RemoteEntry, TransportError> {
        let stat = self.sftp()?.stat(Path::new(path)).map_err(map_ssh_error)?;
        let name = path.rsplit('/').next().unwrap_or(path).to_string();
        Ok(entry_from_stat(name, &stat))
    }

    fn get(&mut self, remote_path: &str, local_path: &Path) -> Result<(), TransportError> {
        let mut remote_file = self
            .sftp()?
            .open(Path::new(remote_path))
            .map_err(map_ssh_error)?;
        let mut local_file = File::create(local_path)?;
        let bytes = io::copy(&mut remote_file, &mut local_file).map_err(map_stream_error)?;
        debug!(remote_path = %remote_path, size = bytes, "File downloaded");
        Ok(())
    }

    fn put(&mut self, local_path: &Path, remote_path: &str) -> Result<(), TransportError> {
        let mut local_file = File::open(local_path)?;
        let mut remote_file = self
            .sftp()?
            .create(Path::new(remote_path))
            .map_err(map_ssh_error)?;
        let bytes = io::copy(&mut local_file, &mut remote_file).map_err(map_stream_error)?;
        remote_file.fsync().or_else(|e| match e.code() {
            // fsync@openssh.com is an extension; servers without it answer OP_UNSUPPORTED
            ErrorCode::SFTP(8) => Ok(()),
            _ => Err(map_ssh_error(e)),
        })?;
        debug!(remote_path = %remote_path, size = bytes, "File uploaded");
        Ok(())
    }

    fn delete(&mut self, path: &str) -> Result<(), TransportError> {
        self.sftp()?.unlink(Path::new(path)).map_err(map_ssh_error)
    }

    fn mkdir(&mut self, path: &str) -> Result<(), TransportError> {
        self.sftp()?.mkdir(Path::new(path), 0o755).map_err(map_ssh_error)
    }

    fn rmdir(&mut self, path: &str) -> Result<(), TransportError> {
        self.sftp()?.rmdir(Path::new(path)).map_err(map_ssh_error)
    }

    fn close(&mut self) {
        self.sftp = None;
        if let Some(sess) = self.session.take() {
            if let Err(e) = sess.disconnect(None, "closing", None) {
                debug!(error = %e, "SSH disconnect failed");
            }
        }
        self._tcp = None;
    }
}

impl Drop for SftpTransport {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_from_stat() {
        let stat = FileStat {
            size: Some(42),
            uid: None,
            gid: None,
            perm: Some(0o100644),
            atime: Some(1_600_000_000),
            mtime: Some(1_600_000_100),
        };
        let entry = entry_from_stat("a.txt".to_string(), &stat);
        assert!(!entry.is_directory);
        assert_eq!(entry.attributes.mtime(), Some(1_600_000_100));
        assert_eq!(entry.attributes.atime(), Some(1_600_000_000));
        assert_eq!(entry.attributes.get(FileAttributes::SIZE), Some(42));
    }

    #[test]
    fn test_operations_require_connection() {
        let mut transport = SftpTransport::new();
        assert!(matches!(
            transport.list("."),
            Err(TransportError::NotConnected)
        ));
        assert!(matches!(
            transport.delete("a.txt"),
            Err(TransportError::NotConnected)
        ));
        transport.close();
    }

    #[test]
    fn test_stream_error_timeout() {
        let err = map_stream_error(io::Error::new(io::ErrorKind::TimedOut, "slow"));
        assert!(matches!(err, TransportError::ReadTimeout(_)));
    }
}
