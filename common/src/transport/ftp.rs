// FTP transport over suppaftp
// Binary transfers, passive or active data connections

use super::{connect_tcp, open_error, unix_seconds, Transport};
use crate::classify::FTP_FILE_UNAVAILABLE;
use crate::errors::TransportError;
use crate::models::{Credentials, FileAttributes, Protocol, RemoteEntry, Timeouts};
use chrono::{DateTime, Utc};
use std::fs::File;
use std::io;
use std::path::Path;
use std::str::FromStr;
use suppaftp::list::File as ListedFile;
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream, Mode};
use tracing::{debug, error, info, instrument, warn};

/// FTP control connection wrapper
pub struct FtpTransport {
    stream: Option<FtpStream>,
    passive_mode: bool,
    host: String,
}

impl FtpTransport {
    pub fn new(passive_mode: bool) -> Self {
        Self {
            stream: None,
            passive_mode,
            host: String::new(),
        }
    }

    fn stream(&mut self) -> Result<&mut FtpStream, TransportError> {
        self.stream.as_mut().ok_or(TransportError::NotConnected)
    }
}

/// Translate a suppaftp error, keeping reply codes intact
fn map_ftp_error(e: FtpError) -> TransportError {
    match e {
        FtpError::ConnectionError(io) => match io.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
                TransportError::ReadTimeout(io.to_string())
            }
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => TransportError::Disconnected(io.to_string()),
            _ => TransportError::Io(io),
        },
        FtpError::UnexpectedResponse(response) => TransportError::FtpReply {
            code: response.status.code(),
            message: String::from_utf8_lossy(&response.body).trim().to_string(),
        },
        other => TransportError::Other(other.to_string()),
    }
}

/// Errors from opening the control connection and reading the greeting
fn connect_error(host: &str, port: u16, timeouts: Timeouts, e: FtpError) -> TransportError {
    match e {
        FtpError::ConnectionError(io) => open_error(host, port, timeouts, io),
        other => map_ftp_error(other),
    }
}

/// MDTM, CWD and SIZE were all refused: report the path as missing, keeping the
/// MDTM reply text
fn stat_not_found(path: &str, mdtm_error: FtpError) -> TransportError {
    match mdtm_error {
        FtpError::UnexpectedResponse(response) => TransportError::FtpReply {
            code: FTP_FILE_UNAVAILABLE,
            message: format!(
                "{}: {}",
                path,
                String::from_utf8_lossy(&response.body).trim()
            ),
        },
        other => map_ftp_error(other),
    }
}

fn entry_from_listing(listed: &ListedFile) -> RemoteEntry {
    let mut attributes = FileAttributes::new();
    attributes.insert(FileAttributes::MTIME, unix_seconds(listed.modified()));
    attributes.insert(FileAttributes::SIZE, listed.size() as i64);
    RemoteEntry {
        name: listed.name().to_string(),
        is_directory: listed.is_directory(),
        attributes,
    }
}

impl Transport for FtpTransport {
    fn protocol(&self) -> Protocol {
        Protocol::Ftp
    }

    #[instrument(skip(self, timeouts), fields(host = %host, port = %port))]
    fn connect(
        &mut self,
        host: &str,
        port: u16,
        timeouts: Timeouts,
    ) -> Result<(), TransportError> {
        info!(host = %host, port = %port, "Establishing FTP connection");

        // suppaftp has no timed connect: find an address that answers within
        // the open timeout first, then hand that address to the FTP client
        let addr = connect_tcp(host, port, timeouts)?.peer_addr()?;

        let mut stream = FtpStream::connect(addr).map_err(|e| {
            error!(error = %e, "Failed to open FTP control connection");
            connect_error(host, port, timeouts, e)
        })?;
        stream.get_ref().set_read_timeout(Some(timeouts.read))?;
        stream.get_ref().set_write_timeout(Some(timeouts.read))?;

        stream.set_mode(if self.passive_mode {
            Mode::Passive
        } else {
            Mode::Active
        });

        self.host = host.to_string();
        self.stream = Some(stream);
        Ok(())
    }

    #[instrument(skip(self, credentials), fields(username = %credentials.username()))]
    fn authenticate(&mut self, credentials: &Credentials) -> Result<(), TransportError> {
        let (username, password) = match credentials {
            Credentials::Password { username, password } => (username, password),
            Credentials::SshKey { .. } => {
                return Err(TransportError::Unsupported(
                    "SSH key authentication over FTP".to_string(),
                ))
            }
        };

        let stream = self.stream()?;
        stream.login(username, password).map_err(|e| match e {
            FtpError::UnexpectedResponse(response)
                if matches!(response.status.code(), 430 | 530) =>
            {
                error!(username = %username, "FTP login rejected");
                TransportError::AuthenticationFailed {
                    username: username.clone(),
                    reason: String::from_utf8_lossy(&response.body).trim().to_string(),
                }
            }
            other => map_ftp_error(other),
        })?;
        stream
            .transfer_type(FileType::Binary)
            .map_err(map_ftp_error)?;

        info!("FTP connection established successfully");
        Ok(())
    }

    fn list(&mut self, path: &str) -> Result<Vec<RemoteEntry>, TransportError> {
        let lines = self.stream()?.list(Some(path)).map_err(map_ftp_error)?;
        debug!(dir_path = %path, entries_count = lines.len(), "Directory listed");

        let mut entries = Vec::with_capacity(lines.len());
        for line in lines {
            match ListedFile::from_str(&line) {
                Ok(listed) if listed.name() == "." || listed.name() == ".." => {}
                Ok(listed) => entries.push(entry_from_listing(&listed)),
                Err(e) => warn!(line = %line, error = ?e, "Skipping unparseable LIST line"),
            }
        }
        Ok(entries)
    }

    fn stat(&mut self, path: &str) -> Result<RemoteEntry, TransportError> {
        let name = path.rsplit('/').next().unwrap_or(path).to_string();
        let stream = self.stream()?;

        match stream.mdtm(path) {
            Ok(modified) => {
                let mtime = DateTime::<Utc>::from_naive_utc_and_offset(modified, Utc).timestamp();
                let mut attributes = FileAttributes::new().with_mtime(mtime);
                if let Ok(size) = stream.size(path) {
                    attributes.insert(FileAttributes::SIZE, size as i64);
                }
                Ok(RemoteEntry {
                    name,
                    is_directory: false,
                    attributes,
                })
            }
            Err(mdtm_error) => {
                // MDTM only answers for files; try CWD for directories, then
                // SIZE for servers without MDTM
                let cwd = stream.pwd().map_err(map_ftp_error)?;
                if stream.cwd(path).is_ok() {
                    stream.cwd(&cwd).map_err(map_ftp_error)?;
                    return Ok(RemoteEntry::directory(name));
                }
                match stream.size(path) {
                    Ok(size) => {
                        let mut attributes = FileAttributes::new();
                        attributes.insert(FileAttributes::SIZE, size as i64);
                        Ok(RemoteEntry {
                            name,
                            is_directory: false,
                            attributes,
                        })
                    }
                    Err(FtpError::UnexpectedResponse(_)) => Err(stat_not_found(path, mdtm_error)),
                    Err(other) => Err(map_ftp_error(other)),
                }
            }
        }
    }

    fn get(&mut self, remote_path: &str, local_path: &Path) -> Result<(), TransportError> {
        let mut local_file = File::create(local_path)?;
        let bytes = self
            .stream()?
            .retr(remote_path, |reader| {
                io::copy(reader, &mut local_file).map_err(FtpError::ConnectionError)
            })
            .map_err(map_ftp_error)?;
        debug!(remote_path = %remote_path, size = bytes, "File downloaded");
        Ok(())
    }

    fn put(&mut self, local_path: &Path, remote_path: &str) -> Result<(), TransportError> {
        let mut local_file = File::open(local_path)?;
        let bytes = self
            .stream()?
            .put_file(remote_path, &mut local_file)
            .map_err(map_ftp_error)?;
        debug!(remote_path = %remote_path, size = bytes, "File uploaded");
        Ok(())
    }

    fn delete(&mut self, path: &str) -> Result<(), TransportError> {
        self.stream()?.rm(path).map_err(map_ftp_error)
    }

    fn mkdir(&mut self, path: &str) -> Result<(), TransportError> {
        self.stream()?.mkdir(path).map_err(map_ftp_error)
    }

    fn rmdir(&mut self, path: &str) -> Result<(), TransportError> {
        self.stream()?.rmdir(path).map_err(map_ftp_error)
    }

    fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.quit() {
                debug!(host = %self.host, error = %e, "FTP QUIT failed");
            }
        }
    }
}

impl Drop for FtpTransport {
    fn drop(&mut self) {
        self.close();
    }
}
