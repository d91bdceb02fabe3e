// Batch upload: list local files, cap, upload to every destination with retry

use super::connection::{Connection, MATCH_OPTIONS};
use crate::circuit_breaker::ConsecutiveFailureBreaker;
use crate::classify::classify;
use crate::errors::{ErrorContext, TransferError, TransportError};
use crate::models::TransferDirection;
use crate::path_mirror::{join_remote, remote_parent, RelativePath};
use crate::telemetry;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

impl Connection {
    /// Upload every matching local file (up to `maximum_transfer`) to the
    /// base directory and each duplicate destination, invoking
    /// `on_result(local_path, error)` per attempted file.
    ///
    /// A file counts as put only when every destination accepted it; only
    /// then is the local copy deleted (when `delete_on_put` is set).
    #[instrument(skip(self, on_result), fields(host = %self.config.host, base = %self.config.directory_path))]
    pub fn put_files<F>(&mut self, mut on_result: F) -> Result<(), TransferError>
    where
        F: FnMut(Option<&Path>, Option<&TransferError>),
    {
        let started = Instant::now();
        let candidates = self.local_candidates()?;
        info!(
            candidates = candidates.len(),
            destinations = self.destination_roots().len(),
            "Starting batch put"
        );

        let mut breaker = ConsecutiveFailureBreaker::new("put");

        for (local_path, relative) in candidates {
            match self.put_to_all_destinations(&local_path, &relative) {
                Ok(()) => {
                    breaker.record_success();
                    telemetry::record_file_succeeded(TransferDirection::Put, &self.config.host);
                    info!(file = %relative.as_string(), "File put");

                    on_result(Some(&local_path), None);

                    if self.config.delete_on_put && local_path.exists() {
                        if let Err(e) = std::fs::remove_file(&local_path) {
                            warn!(path = %local_path.display(), error = %e, "Failed to delete local file after put");
                        }
                    }
                }
                Err(error) => {
                    telemetry::record_file_failed(
                        TransferDirection::Put,
                        &self.config.host,
                        error.kind,
                    );
                    warn!(file = %relative.as_string(), error = %error, "File failed");

                    on_result(None, Some(&error));

                    if let Err(abort) = breaker.record_failure() {
                        telemetry::record_batch_aborted(TransferDirection::Put, &self.config.host);
                        telemetry::record_batch_duration(TransferDirection::Put, started.elapsed());
                        return Err(abort.with_context(&self.host_context()));
                    }
                }
            }
        }

        telemetry::record_batch_duration(TransferDirection::Put, started.elapsed());
        info!("Batch put finished");
        Ok(())
    }

    /// Upload a single local file into `dest_subdir` below the base directory
    /// and every duplicate destination, under the same retry rules as
    /// `put_files`. The local file is left in place.
    #[instrument(skip(self), fields(host = %self.config.host, local_path = %local_path.display()))]
    pub fn put_file(&mut self, local_path: &Path, dest_subdir: &str) -> Result<(), TransferError> {
        let display = local_path.display().to_string();
        let context = self.file_context(&display);

        if !local_path.is_file() {
            return Err(TransferError::file(format!(
                "{}Local file {} does not exist.",
                context.prefix(),
                display
            ))
            .with_context(&context));
        }
        let filename = local_path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                TransferError::file(format!("{}Invalid local filename.", context.prefix()))
                    .with_context(&context)
            })?;
        let relative = RelativePath::parse(&join_remote(dest_subdir, filename)).ok_or_else(|| {
            TransferError::file(format!(
                "{}Invalid destination subdirectory {}.",
                context.prefix(),
                dest_subdir
            ))
            .with_context(&context)
        })?;

        let result = self.put_to_all_destinations(local_path, &relative);
        match &result {
            Ok(()) => telemetry::record_file_succeeded(TransferDirection::Put, &self.config.host),
            Err(e) => telemetry::record_file_failed(TransferDirection::Put, &self.config.host, e.kind),
        }
        result
    }

    /// Primary base directory followed by each duplicate destination root
    pub fn destination_roots(&self) -> Vec<String> {
        std::iter::once(self.config.directory_path.clone())
            .chain(self.config.duplicate_put_directory_paths.iter().cloned())
            .collect()
    }

    /// Upload to each destination in order, each with its own retry budget.
    /// Stops at the first destination that exhausts its attempts; copies
    /// already written to earlier destinations are left in place.
    fn put_to_all_destinations(
        &mut self,
        local_path: &Path,
        relative: &RelativePath,
    ) -> Result<(), TransferError> {
        let relative_str = relative.as_string();
        let context = self.file_context(&relative_str);

        for root in self.destination_roots() {
            let remote_path = self.mirror.to_remote_under(&root, relative);
            let retry = self.retry.clone();
            retry
                .attempt(&remote_path, |_attempt| {
                    self.upload_once(local_path, &remote_path, &context)
                })
                .into_result()?;
            debug!(file = %relative_str, destination = %root, "Destination accepted file");
        }
        Ok(())
    }

    /// One upload attempt: remote parents, then the transfer
    fn upload_once(
        &mut self,
        local_path: &Path,
        remote_path: &str,
        context: &ErrorContext,
    ) -> Result<(), TransferError> {
        if let Some(parent) = remote_parent(remote_path) {
            self.ensure_directory(parent)?;
        }
        self.transport
            .put(local_path, remote_path)
            .map_err(|e| classify(&e, context))
    }

    /// Matching local files below the local directory, capped at
    /// `maximum_transfer`, in glob order
    pub(crate) fn local_candidates(&self) -> Result<Vec<(PathBuf, RelativePath)>, TransferError> {
        let root = self.mirror.local_root();
        let root_str = root.to_str().ok_or_else(|| {
            TransferError::file(format!(
                "Local directory {} is not valid UTF-8.",
                root.display()
            ))
        })?;
        let full_pattern = format!(
            "{}/{}",
            glob::Pattern::escape(root_str.trim_end_matches('/')),
            self.config.filename_pattern
        );

        let paths = glob::glob_with(&full_pattern, MATCH_OPTIONS).map_err(|e| {
            TransferError::protocol(format!(
                "Invalid filename pattern '{}': {}",
                self.config.filename_pattern, e
            ))
        })?;

        let mut found = Vec::new();
        for entry in paths {
            if found.len() >= self.config.maximum_transfer {
                break;
            }
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    let classified = classify(
                        &TransportError::Io(e.into()),
                        &ErrorContext::default(),
                    );
                    warn!(error = %classified, "Skipping unreadable local path");
                    continue;
                }
            };
            if !path.is_file() {
                continue;
            }
            match self.mirror.relative_of_local(&path) {
                Some(relative) => found.push((path, relative)),
                None => warn!(path = %path.display(), "Local path outside local directory, skipping"),
            }
        }

        debug!(matched = found.len(), pattern = %full_pattern, "Local candidates selected");
        Ok(found)
    }
}
