// Batch download: list, cap, download with retry, report, delete remote original

use super::connection::{pattern_spans_directories, Connection, MATCH_OPTIONS};
use crate::circuit_breaker::ConsecutiveFailureBreaker;
use crate::classify::classify;
use crate::errors::{ErrorContext, TransferError, TransportError};
use crate::models::{FileAttributes, RemoteEntry, TransferDirection, TransferResult};
use crate::path_mirror::{join_remote, RelativePath};
use crate::retry::RetryOutcome;
use crate::telemetry;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// A remote file selected for download
#[derive(Debug, Clone)]
pub(crate) struct RemoteCandidate {
    pub relative: RelativePath,
    pub remote_path: String,
    pub attributes: FileAttributes,
}

impl Connection {
    /// Download every matching remote file (up to `maximum_transfer`),
    /// invoking `on_result(local_path, attributes, error)` per attempted file.
    /// Each remote original is deleted after its local copy is written.
    ///
    /// Returns `Err` when the base directory cannot be listed or when three
    /// files in a row fail.
    #[instrument(skip(self, on_result), fields(host = %self.config.host, base = %self.config.directory_path))]
    pub fn get_files<F>(&mut self, mut on_result: F) -> Result<TransferResult, TransferError>
    where
        F: FnMut(Option<&Path>, &FileAttributes, Option<&TransferError>),
    {
        let started = Instant::now();
        let candidates = self.remote_candidates()?;
        info!(candidates = candidates.len(), "Starting batch get");

        let mut result = TransferResult::default();
        let mut breaker = ConsecutiveFailureBreaker::new("get");

        for candidate in candidates {
            result.attempted += 1;
            let relative = candidate.relative.as_string();
            let local_path = self.mirror.to_local(&candidate.relative);
            let context = self.file_context(&relative);

            let retry = self.retry.clone();
            let outcome = retry.attempt(&candidate.remote_path, |_attempt| {
                self.download_once(&candidate, &local_path, &context)
            });

            match outcome {
                RetryOutcome::Succeeded { attempts, .. } => {
                    let attributes = self.downloaded_attributes(&candidate, &context);
                    result.collected += 1;
                    breaker.record_success();
                    telemetry::record_file_succeeded(TransferDirection::Get, &self.config.host);
                    info!(file = %relative, attempts, "File collected");

                    on_result(Some(&local_path), &attributes, None);

                    // Deleting the original is best effort; the download stands
                    if let Err(e) = self.transport.delete(&candidate.remote_path) {
                        let classified = classify(&e, &context);
                        warn!(file = %relative, error = %classified, "Failed to delete remote original");
                    }
                }
                RetryOutcome::Failed { error, attempts } => {
                    result.failed += 1;
                    telemetry::record_file_failed(
                        TransferDirection::Get,
                        &self.config.host,
                        error.kind,
                    );
                    warn!(file = %relative, attempts, error = %error, "File failed");
                    remove_partial(&local_path);

                    on_result(None, &candidate.attributes, Some(&error));

                    if let Err(abort) = breaker.record_failure() {
                        telemetry::record_batch_aborted(TransferDirection::Get, &self.config.host);
                        telemetry::record_batch_duration(TransferDirection::Get, started.elapsed());
                        return Err(abort.with_context(&self.host_context()));
                    }
                }
            }
        }

        telemetry::record_batch_duration(TransferDirection::Get, started.elapsed());
        info!(
            attempted = result.attempted,
            collected = result.collected,
            failed = result.failed,
            "Batch get finished"
        );
        Ok(result)
    }

    /// One download attempt: local parents, then the transfer itself
    fn download_once(
        &mut self,
        candidate: &RemoteCandidate,
        local_path: &Path,
        context: &ErrorContext,
    ) -> Result<(), TransferError> {
        if let Some(parent) = local_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| classify(&TransportError::Io(e), context))?;
        }

        self.transport
            .get(&candidate.remote_path, local_path)
            .map_err(|e| classify(&e, context))
    }

    /// Listing attributes refreshed from a stat of the downloaded file.
    /// The listing already carries mtime, so a failed stat keeps it.
    fn downloaded_attributes(
        &mut self,
        candidate: &RemoteCandidate,
        context: &ErrorContext,
    ) -> FileAttributes {
        let mut attributes = candidate.attributes.clone();
        match self.transport.stat(&candidate.remote_path) {
            Ok(stat) => attributes.merge(&stat.attributes),
            Err(e) => {
                let classified = classify(&e, context);
                warn!(file = %candidate.relative.as_string(), error = %classified, "Stat after download failed, using listing attributes");
            }
        }
        attributes
    }

    /// Matching remote files in listing order, capped at `maximum_transfer`
    pub(crate) fn remote_candidates(&mut self) -> Result<Vec<RemoteCandidate>, TransferError> {
        let limit = self.config.maximum_transfer;
        let recursive = pattern_spans_directories(&self.config.filename_pattern);
        let mut found = Vec::new();

        let base = self.config.directory_path.clone();
        let entries = self
            .transport
            .list(&base)
            .map_err(|e| classify(&e, &self.file_context(&base)))?;
        self.collect_candidates("", entries, recursive, limit, &mut found);

        debug!(matched = found.len(), limit, recursive, "Remote candidates selected");
        Ok(found)
    }

    fn collect_candidates(
        &mut self,
        relative_dir: &str,
        entries: Vec<RemoteEntry>,
        recursive: bool,
        limit: usize,
        found: &mut Vec<RemoteCandidate>,
    ) {
        for entry in entries {
            if found.len() >= limit {
                return;
            }
            let relative = if relative_dir.is_empty() {
                entry.name.clone()
            } else {
                format!("{}/{}", relative_dir, entry.name)
            };

            if entry.is_directory {
                if !recursive {
                    continue;
                }
                let remote_dir = join_remote(&self.config.directory_path, &relative);
                match self.transport.list(&remote_dir) {
                    Ok(children) => {
                        self.collect_candidates(&relative, children, recursive, limit, found)
                    }
                    Err(e) => {
                        let classified = classify(&e, &self.file_context(&relative));
                        warn!(dir = %remote_dir, error = %classified, "Failed to list directory, continuing");
                    }
                }
                continue;
            }

            if !self.pattern.matches_with(&relative, MATCH_OPTIONS) {
                continue;
            }
            if let Some(parsed) = RelativePath::parse(&relative) {
                found.push(RemoteCandidate {
                    remote_path: self.mirror.to_remote(&parsed),
                    relative: parsed,
                    attributes: entry.attributes,
                });
            }
        }
    }
}

fn remove_partial(local_path: &Path) {
    if local_path.is_file() {
        if let Err(e) = std::fs::remove_file(local_path) {
            debug!(path = %local_path.display(), error = %e, "Could not remove partial download");
        }
    }
}
