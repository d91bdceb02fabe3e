// Idempotent remote "mkdir -p"

use super::connection::Connection;
use crate::classify::{classify, is_not_found, SFTP_FILE_ALREADY_EXISTS};
use crate::errors::{TransferError, TransportError};
use tracing::{debug, instrument};

/// Every prefix of `path` that names a directory to create, shortest first.
/// Leading `/` and `./` are kept on each prefix; `.` components are skipped.
pub fn directory_segments(path: &str) -> Vec<String> {
    let (lead, rest) = if let Some(rest) = path.strip_prefix('/') {
        ("/", rest)
    } else if let Some(rest) = path.strip_prefix("./") {
        ("./", rest)
    } else {
        ("", path)
    };

    let mut segments = Vec::new();
    let mut current = lead.to_string();
    for component in rest.split('/').filter(|c| !c.is_empty() && *c != ".") {
        if !current.is_empty() && !current.ends_with('/') {
            current.push('/');
        }
        current.push_str(component);
        segments.push(current.clone());
    }
    segments
}

impl Connection {
    /// Create every segment of `full_path` from the root down. Segments that
    /// already exist as directories are skipped; a segment that exists as a
    /// regular file is a `FileError`. Only a segment reported missing is
    /// created; any other stat failure is returned classified.
    #[instrument(skip(self), fields(host = %self.config.host))]
    pub fn ensure_directory(&mut self, full_path: &str) -> Result<(), TransferError> {
        let context = self.file_context(full_path);

        for segment in directory_segments(full_path) {
            match self.transport.stat(&segment) {
                Ok(entry) if entry.is_directory => continue,
                Ok(_) => {
                    let name = segment.rsplit('/').next().unwrap_or(&segment);
                    return Err(TransferError::file(format!(
                        "{}Could not create {}. {} is a file.",
                        context.prefix(),
                        full_path,
                        name
                    ))
                    .with_context(&context));
                }
                Err(e) if is_not_found(&e) => {}
                Err(e) => return Err(classify(&e, &context)),
            }

            if let Err(e) = self.transport.mkdir(&segment) {
                // Lost a race with another creator of the same directory
                if already_exists(&e) || self.is_remote_directory(&segment) {
                    debug!(path = %segment, "Directory already exists");
                    continue;
                }
                return Err(classify(&e, &context));
            }
            debug!(path = %segment, "Directory created");
        }
        Ok(())
    }

    fn is_remote_directory(&mut self, path: &str) -> bool {
        matches!(self.transport.stat(path), Ok(entry) if entry.is_directory)
    }
}

fn already_exists(error: &TransportError) -> bool {
    matches!(
        error,
        TransportError::SftpStatus { code, .. } if *code == SFTP_FILE_ALREADY_EXISTS
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_segments() {
        assert_eq!(directory_segments("a/b/c"), vec!["a", "a/b", "a/b/c"]);
    }

    #[test]
    fn test_absolute_segments() {
        assert_eq!(directory_segments("/srv/in/"), vec!["/srv", "/srv/in"]);
    }

    #[test]
    fn test_dot_prefixed_segments() {
        assert_eq!(directory_segments("./out/2024"), vec!["./out", "./out/2024"]);
    }

    #[test]
    fn test_root_has_no_segments() {
        assert!(directory_segments("/").is_empty());
        assert!(directory_segments("./").is_empty());
        assert!(directory_segments(".").is_empty());
        assert!(directory_segments("").is_empty());
    }

    #[test]
    fn test_duplicate_separators_are_collapsed() {
        assert_eq!(directory_segments("a//b"), vec!["a", "a/b"]);
    }

    #[test]
    fn test_already_exists_detection() {
        assert!(already_exists(&TransportError::SftpStatus {
            code: SFTP_FILE_ALREADY_EXISTS,
            message: "exists".to_string(),
        }));
        assert!(!already_exists(&TransportError::SftpStatus {
            code: 3,
            message: "denied".to_string(),
        }));
    }
}
