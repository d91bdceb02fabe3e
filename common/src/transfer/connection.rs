// Scoped connection: open → operate → close on every exit path

use crate::classify::classify;
use crate::config::ConnectionConfig;
use crate::errors::{ErrorContext, TransferError};
use crate::models::Protocol;
use crate::path_mirror::{PathMirror, RelativePath};
use crate::retry::RetryPolicy;
use crate::transport::Transport;
use glob::{MatchOptions, Pattern};
use tracing::{debug, error, info, instrument};

/// Glob semantics shared by remote and local matching: `*` stays inside one
/// path component, `**/` spans directories.
pub(crate) const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Filename pattern as matched against '/'-joined relative paths, without a
/// leading `./`
pub(crate) fn normalize_pattern(pattern: &str) -> String {
    let mut trimmed = pattern;
    while let Some(rest) = trimmed.strip_prefix("./") {
        trimmed = rest;
    }
    trimmed.to_string()
}

/// Whether matching `pattern` has to descend into subdirectories
pub(crate) fn pattern_spans_directories(pattern: &str) -> bool {
    pattern.contains('/') || pattern.contains("**")
}

/// One authenticated transport session plus the configuration it runs under
pub struct Connection {
    pub(crate) transport: Box<dyn Transport>,
    pub(crate) config: ConnectionConfig,
    pub(crate) mirror: PathMirror,
    pub(crate) pattern: Pattern,
    pub(crate) retry: RetryPolicy,
    closed: bool,
}

impl Connection {
    /// Connect and authenticate. Failures here are fatal to the connection
    /// and are not retried.
    #[instrument(skip(config, transport), fields(host = %config.host, port = %config.port))]
    pub fn open(
        mut config: ConnectionConfig,
        mut transport: Box<dyn Transport>,
    ) -> Result<Self, TransferError> {
        let context = ErrorContext::host(&config.host);

        config.validate().map_err(|e| {
            TransferError::protocol(format!("Invalid connection configuration: {}", e))
                .with_context(&context)
        })?;
        config.filename_pattern = normalize_pattern(&config.filename_pattern);
        let pattern = Pattern::new(&config.filename_pattern).map_err(|e| {
            TransferError::protocol(format!(
                "Invalid filename pattern '{}': {}",
                config.filename_pattern, e
            ))
            .with_context(&context)
        })?;

        if let Err(e) = transport.connect(&config.host, config.port, config.timeouts()) {
            transport.close();
            let classified = classify(&e, &context);
            error!(kind = %classified.kind, error = %classified, "Connect failed");
            return Err(classified);
        }
        if let Err(e) = transport.authenticate(&config.auth) {
            transport.close();
            let classified = classify(&e, &context);
            error!(kind = %classified.kind, error = %classified, "Authentication failed");
            return Err(classified);
        }

        let mut connection = Self {
            mirror: PathMirror::new(&config.directory_path, &config.local_directory),
            retry: RetryPolicy::with_config(crate::retry::MAX_ATTEMPTS, config.retry_delay()),
            pattern,
            transport,
            config,
            closed: false,
        };

        if connection.config.create_directory_path {
            let base = connection.config.directory_path.clone();
            // Dropping the connection on error closes the transport
            connection.ensure_directory(&base)?;
        }

        info!(
            protocol = connection.protocol().label(),
            directory_path = %connection.config.directory_path,
            "Connection opened"
        );
        Ok(connection)
    }

    /// Open, run `operation`, and close regardless of how `operation` ends
    pub fn open_scoped<T, F>(
        config: ConnectionConfig,
        transport: Box<dyn Transport>,
        operation: F,
    ) -> Result<T, TransferError>
    where
        F: FnOnce(&mut Connection) -> Result<T, TransferError>,
    {
        let mut connection = Self::open(config, transport)?;
        let result = operation(&mut connection);
        connection.close();
        result
    }

    pub fn protocol(&self) -> Protocol {
        self.transport.protocol()
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Close the transport session. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.transport.close();
        self.closed = true;
        debug!(host = %self.config.host, "Connection closed");
    }

    /// Remove a file or empty directory below the base directory
    #[instrument(skip(self), fields(host = %self.config.host))]
    pub fn remove_subpath(&mut self, path: &str) -> Result<(), TransferError> {
        let context = self.file_context(path);
        let relative = RelativePath::parse(path).ok_or_else(|| invalid_subpath(path, &context))?;
        let full_path = self.mirror.to_remote(&relative);

        let entry = self
            .transport
            .stat(&full_path)
            .map_err(|e| classify(&e, &context))?;
        let removed = if entry.is_directory {
            self.transport.rmdir(&full_path)
        } else {
            self.transport.delete(&full_path)
        };
        removed.map_err(|e| classify(&e, &context))?;

        info!(path = %full_path, directory = entry.is_directory, "Removed remote path");
        Ok(())
    }

    /// Names of the entries inside a subdirectory of the base directory
    #[instrument(skip(self), fields(host = %self.config.host))]
    pub fn list_subdir(&mut self, path: &str) -> Result<Vec<String>, TransferError> {
        let context = self.file_context(path);
        let full_path = match path.trim_start_matches("./") {
            "" | "." => self.config.directory_path.clone(),
            _ => {
                let relative =
                    RelativePath::parse(path).ok_or_else(|| invalid_subpath(path, &context))?;
                self.mirror.to_remote(&relative)
            }
        };

        let entries = self
            .transport
            .list(&full_path)
            .map_err(|e| classify(&e, &context))?;
        Ok(entries.into_iter().map(|entry| entry.name).collect())
    }

    pub(crate) fn host_context(&self) -> ErrorContext {
        ErrorContext::host(&self.config.host)
    }

    pub(crate) fn file_context(&self, file: &str) -> ErrorContext {
        self.host_context().with_file(file)
    }
}

fn invalid_subpath(path: &str, context: &ErrorContext) -> TransferError {
    TransferError::file(format!(
        "{}'{}' is not a path below the base directory.",
        context.prefix(),
        path
    ))
    .with_context(context)
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}
