// Transport capability interface
// The orchestration layer only talks to remote servers through this trait

mod ftp;
mod sftp;

pub use ftp::FtpTransport;
pub use sftp::SftpTransport;

use crate::errors::TransportError;
use crate::models::{Credentials, Protocol, RemoteEntry, Timeouts};
use std::path::Path;

/// Primitive remote operations over one wire protocol.
///
/// Paths are '/'-separated remote paths. Every call blocks until the server
/// answers or the configured read timeout expires. A session is not safe for
/// concurrent use; open one transport per connection.
pub trait Transport: Send {
    /// Protocol spoken by this transport
    fn protocol(&self) -> Protocol;

    /// Open the network session
    fn connect(&mut self, host: &str, port: u16, timeouts: Timeouts)
        -> Result<(), TransportError>;

    /// Authenticate the open session
    fn authenticate(&mut self, credentials: &Credentials) -> Result<(), TransportError>;

    /// Entries directly inside `path`, in server order, without `.` and `..`
    fn list(&mut self, path: &str) -> Result<Vec<RemoteEntry>, TransportError>;

    /// Metadata for a single path
    fn stat(&mut self, path: &str) -> Result<RemoteEntry, TransportError>;

    /// Download `remote_path` into `local_path`, replacing it
    fn get(&mut self, remote_path: &str, local_path: &Path) -> Result<(), TransportError>;

    /// Upload `local_path` to `remote_path`, replacing it
    fn put(&mut self, local_path: &Path, remote_path: &str) -> Result<(), TransportError>;

    /// Remove a remote file
    fn delete(&mut self, path: &str) -> Result<(), TransportError>;

    /// Create a single remote directory (parent must exist)
    fn mkdir(&mut self, path: &str) -> Result<(), TransportError>;

    /// Remove an empty remote directory
    fn rmdir(&mut self, path: &str) -> Result<(), TransportError>;

    /// Close the session. Safe to call more than once.
    fn close(&mut self);
}

/// Build the transport for a configured protocol
pub fn for_protocol(protocol: Protocol, passive_mode: bool) -> Box<dyn Transport> {
    match protocol {
        Protocol::Sftp => Box::new(SftpTransport::new()),
        Protocol::Ftp => Box::new(FtpTransport::new(passive_mode)),
    }
}

/// Seconds since the Unix epoch, saturating on clock skew
pub(crate) fn unix_seconds(time: std::time::SystemTime) -> i64 {
    match time.duration_since(std::time::UNIX_EPOCH) {
        Ok(duration) => duration.as_secs() as i64,
        Err(_) => 0,
    }
}

/// Resolve `host:port`, mapping failures onto transport errors
pub(crate) fn resolve(host: &str, port: u16) -> Result<Vec<std::net::SocketAddr>, TransportError> {
    use std::net::ToSocketAddrs;

    let addrs: Vec<_> = (host, port)
        .to_socket_addrs()
        .map_err(|e| TransportError::HostResolution {
            host: host.to_string(),
            reason: e.to_string(),
        })?
        .collect();

    if addrs.is_empty() {
        return Err(TransportError::HostResolution {
            host: host.to_string(),
            reason: "no addresses returned".to_string(),
        });
    }
    Ok(addrs)
}

/// Open a TCP stream to the first reachable address within `timeout`
pub(crate) fn connect_tcp(
    host: &str,
    port: u16,
    timeouts: Timeouts,
) -> Result<std::net::TcpStream, TransportError> {
    use std::net::TcpStream;

    let mut last_error = None;
    for addr in resolve(host, port)? {
        match TcpStream::connect_timeout(&addr, timeouts.open) {
            Ok(tcp) => {
                tcp.set_read_timeout(Some(timeouts.read))?;
                tcp.set_write_timeout(Some(timeouts.read))?;
                return Ok(tcp);
            }
            Err(e) => last_error = Some(e),
        }
    }

    match last_error {
        Some(e) => Err(open_error(host, port, timeouts, e)),
        None => Err(TransportError::HostResolution {
            host: host.to_string(),
            reason: "no addresses returned".to_string(),
        }),
    }
}

/// Map a failed TCP open onto refused, timed out or plain I/O
pub(crate) fn open_error(
    host: &str,
    port: u16,
    timeouts: Timeouts,
    error: std::io::Error,
) -> TransportError {
    use std::io::ErrorKind;

    match error.kind() {
        ErrorKind::ConnectionRefused => TransportError::ConnectionRefused {
            host: host.to_string(),
        },
        ErrorKind::TimedOut | ErrorKind::WouldBlock => {
            TransportError::OpenTimeout(format!("{}:{} after {:?}", host, port, timeouts.open))
        }
        _ => TransportError::Io(error),
    }
}
