// Error classification
// Maps raw transport failures onto the five semantic error kinds

use crate::errors::{ErrorContext, ErrorKind, TransferError, TransportError};

/// SFTP status codes (draft-ietf-secsh-filexfer-13, codes 1 through 31)
const SFTP_STATUS_TABLE: &[(i32, ErrorKind, &str)] = &[
    (1, ErrorKind::File, "An attempt to read past the end-of-file was made."),
    (2, ErrorKind::File, "A reference was made to a file which does not exist."),
    (3, ErrorKind::Permissions, "The user does not have sufficient permissions to perform the operation."),
    (4, ErrorKind::Protocol, "An unknown error occurred."),
    (5, ErrorKind::Protocol, "A badly formatted packet or other SFTP protocol incompatibility was detected."),
    (6, ErrorKind::Connection, "There is no connection to the server."),
    (7, ErrorKind::Connection, "The connection to the server was lost."),
    (8, ErrorKind::Protocol, "An attempted operation could not be completed by the server because the server does not support the operation."),
    (9, ErrorKind::Protocol, "The handle value was invalid."),
    (10, ErrorKind::File, "The file path does not exist or is invalid."),
    (11, ErrorKind::File, "The file already exists."),
    (12, ErrorKind::File, "The file is on read-only media, or the media is write protected."),
    (13, ErrorKind::File, "The requested operation cannot be completed because there is no media available in the drive."),
    (14, ErrorKind::File, "The requested operation cannot be completed because there is insufficient free space on the filesystem."),
    (15, ErrorKind::File, "The operation cannot be completed because it would exceed the user's storage quota."),
    (16, ErrorKind::Permissions, "A principal referenced by the request (either the owner, group, or who field of an ACL) was unknown."),
    (17, ErrorKind::File, "The file could not be opened because it is locked by another process."),
    (18, ErrorKind::File, "The directory is not empty."),
    (19, ErrorKind::File, "The specified file is not a directory."),
    (20, ErrorKind::File, "The filename is not valid."),
    (21, ErrorKind::File, "Too many symbolic links encountered, or an SSH_FXF_NOFOLLOW open encountered a symbolic link as the final component."),
    (22, ErrorKind::File, "The file cannot be deleted."),
    (23, ErrorKind::Protocol, "One of the parameters was out of range, or the parameters specified cannot be used together."),
    (24, ErrorKind::File, "The specified file was a directory in a context where a directory cannot be used."),
    (25, ErrorKind::File, "A read or write operation failed because another process's mandatory byte-range lock overlaps with the request."),
    (26, ErrorKind::File, "A request for a byte range lock was refused."),
    (27, ErrorKind::File, "An operation was attempted on a file for which a delete operation is pending."),
    (28, ErrorKind::File, "The file is corrupt."),
    (29, ErrorKind::Permissions, "The principal specified can not be assigned as an owner of a file."),
    (30, ErrorKind::Permissions, "The principal specified can not be assigned as the primary group of a file."),
    (31, ErrorKind::File, "The requested operation could not be completed because the specified byte range lock has not been granted."),
];

/// SFTP status: no such file
pub const SFTP_NO_SUCH_FILE: i32 = 2;
/// SFTP status: no such path
pub const SFTP_NO_SUCH_PATH: i32 = 10;
/// SFTP status: file already exists
pub const SFTP_FILE_ALREADY_EXISTS: i32 = 11;
/// FTP reply: requested file or directory unavailable
pub const FTP_FILE_UNAVAILABLE: u32 = 550;

/// Whether the server reported the path as missing
pub fn is_not_found(error: &TransportError) -> bool {
    match error {
        TransportError::SftpStatus { code, .. } => {
            *code == SFTP_NO_SUCH_FILE || *code == SFTP_NO_SUCH_PATH
        }
        TransportError::FtpReply { code, .. } => *code == FTP_FILE_UNAVAILABLE,
        _ => false,
    }
}

/// Kind and fixed description for an SFTP status code
pub fn sftp_status(code: i32) -> (ErrorKind, &'static str) {
    SFTP_STATUS_TABLE
        .iter()
        .find(|(c, _, _)| *c == code)
        .map(|(_, kind, description)| (*kind, *description))
        .unwrap_or((ErrorKind::Protocol, "Unexpected error occurred."))
}

/// Kind and fixed description for an FTP reply code
pub fn ftp_reply(code: u32) -> (ErrorKind, &'static str) {
    match code {
        421 => (ErrorKind::Connection, "Service not available, closing control connection."),
        425 => (ErrorKind::Connection, "Can't open data connection."),
        426 => (ErrorKind::Connection, "Connection closed; transfer aborted."),
        430 | 530 => (ErrorKind::Permissions, "Not logged in or invalid credentials."),
        532 => (ErrorKind::Permissions, "Need account for storing files."),
        450 => (ErrorKind::File, "Requested file action not taken. File unavailable."),
        451 => (ErrorKind::File, "Requested action aborted. Local error in processing."),
        452 => (ErrorKind::File, "Requested action not taken. Insufficient storage space in system."),
        550 => (ErrorKind::File, "Requested action not taken. File unavailable."),
        551 => (ErrorKind::File, "Requested action aborted. Page type unknown."),
        552 => (ErrorKind::File, "Requested file action aborted. Exceeded storage allocation."),
        553 => (ErrorKind::File, "Requested action not taken. File name not allowed."),
        500 | 501 => (ErrorKind::Protocol, "Syntax error in command or arguments."),
        502 => (ErrorKind::Protocol, "Command not implemented."),
        503 => (ErrorKind::Protocol, "Bad sequence of commands."),
        504 => (ErrorKind::Protocol, "Command not implemented for that parameter."),
        _ => (ErrorKind::Protocol, "Unexpected reply from server."),
    }
}

/// Classify a raw transport failure. Total over every `TransportError`.
pub fn classify(error: &TransportError, context: &ErrorContext) -> TransferError {
    let prefix = context.prefix();
    let host = context.host.as_deref().unwrap_or("unknown host");

    let (kind, message) = match error {
        TransportError::HostResolution { host, .. } => (
            ErrorKind::Connection,
            format!("Unable to resolve host {}.", host),
        ),
        TransportError::ConnectionRefused { host } => (
            ErrorKind::Connection,
            format!("The server {} refused the connection.", host),
        ),
        TransportError::OpenTimeout(detail) => (
            ErrorKind::Timeout,
            format!(
                "{}Opening the connection to {} timed out: {}",
                prefix, host, detail
            ),
        ),
        TransportError::ReadTimeout(detail) => (
            ErrorKind::Timeout,
            format!("{}Remote server timed out: {}", prefix, detail),
        ),
        TransportError::Disconnected(detail) => (
            ErrorKind::Connection,
            format!(
                "{}Remote server terminated the connection unexpectedly: {}",
                prefix, detail
            ),
        ),
        TransportError::AuthenticationFailed { username, reason } => (
            ErrorKind::Permissions,
            format!(
                "{}Permissions failure when logging in as {}: {}",
                prefix, username, reason
            ),
        ),
        TransportError::HostKey(detail) => (
            ErrorKind::Connection,
            format!("{}SSH Host Key Error: {}", prefix, detail),
        ),
        TransportError::SftpStatus { code, message } => {
            let (kind, description) = sftp_status(*code);
            (kind, format!("{}{} ({})", prefix, description, message))
        }
        TransportError::FtpReply { code, message } => {
            let (kind, description) = ftp_reply(*code);
            (
                kind,
                format!("{}{} ({} {})", prefix, description, code, message.trim()),
            )
        }
        TransportError::NotConnected => (
            ErrorKind::Connection,
            format!("{}There is no connection to the server.", prefix),
        ),
        TransportError::Unsupported(operation) => (
            ErrorKind::Protocol,
            format!(
                "{}The server does not support the operation: {}",
                prefix, operation
            ),
        ),
        TransportError::Io(io) => (
            io_kind(io),
            format!("{}Local I/O error: {}", prefix, io),
        ),
        TransportError::Other(detail) => (
            ErrorKind::Protocol,
            format!("{}Unexpected error from host {}: {}", prefix, host, detail),
        ),
    };

    TransferError::new(kind, message).with_context(context)
}

fn io_kind(error: &std::io::Error) -> ErrorKind {
    use std::io::ErrorKind as Io;
    match error.kind() {
        Io::TimedOut | Io::WouldBlock => ErrorKind::Timeout,
        Io::ConnectionRefused
        | Io::ConnectionReset
        | Io::ConnectionAborted
        | Io::NotConnected
        | Io::BrokenPipe => ErrorKind::Connection,
        Io::PermissionDenied => ErrorKind::Permissions,
        _ => ErrorKind::File,
    }
}
