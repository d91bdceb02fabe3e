// Connection health check: write a marker, pause, delete it

use super::connection::Connection;
use crate::classify::classify;
use crate::config::ConnectionConfig;
use crate::errors::{TransferError, TransportError};
use crate::path_mirror::join_remote;
use crate::transport::Transport;
use std::io::Write;
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub const MARKER_CONTENT: &str = "This is test content";

/// Prefix carried by every health-check error message
pub fn error_prefix(label: &str) -> String {
    format!("{} Connection Test error: ", label)
}

impl Connection {
    /// Upload a marker file to the base directory, wait, and delete it.
    /// Returns `None` when every step succeeded, otherwise the first
    /// classified error with its message prefixed. Deleting the marker is
    /// attempted even when the upload failed.
    #[instrument(skip(self), fields(host = %self.config.host))]
    pub fn test_connection(&mut self) -> Option<TransferError> {
        let prefix = error_prefix(self.protocol().label());
        let marker_name = format!("transfer_test_{}", Uuid::new_v4().simple());
        let remote_path = join_remote(&self.config.directory_path, &marker_name);
        let context = self.file_context(&marker_name);

        let marker = match write_marker() {
            Ok(marker) => marker,
            Err(e) => {
                let classified = classify(&TransportError::Io(e), &context);
                return Some(classified.prefixed(&prefix));
            }
        };

        let mut first_error = self
            .transport
            .put(marker.path(), &remote_path)
            .err()
            .map(|e| classify(&e, &context));

        std::thread::sleep(self.config.connection_test_pause());

        if let Err(e) = self.transport.delete(&remote_path) {
            let classified = classify(&e, &context);
            if first_error.is_none() {
                first_error = Some(classified);
            } else {
                warn!(path = %remote_path, error = %classified, "Marker cleanup failed");
            }
        }

        match first_error {
            None => {
                info!(path = %remote_path, "Connection test passed");
                None
            }
            Some(error) => {
                warn!(kind = %error.kind, error = %error, "Connection test failed");
                Some(error.prefixed(&prefix))
            }
        }
    }
}

fn write_marker() -> std::io::Result<tempfile::NamedTempFile> {
    let mut marker = tempfile::NamedTempFile::new()?;
    marker.write_all(MARKER_CONTENT.as_bytes())?;
    marker.flush()?;
    Ok(marker)
}

/// Open a connection, run the marker check, and close. Open failures
/// (resolve, connect, authenticate) are reported with the same prefix.
pub fn test_connection(
    config: ConnectionConfig,
    transport: Box<dyn Transport>,
) -> Option<TransferError> {
    let prefix = error_prefix(transport.protocol().label());
    match Connection::open_scoped(config, transport, |connection| {
        Ok(connection.test_connection())
    }) {
        Ok(outcome) => outcome,
        Err(error) => Some(error.prefixed(&prefix)),
    }
}
