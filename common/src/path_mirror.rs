// Path mirroring between a remote base directory and a local working directory

use std::path::{Component, Path, PathBuf};

/// Relative location of an entry below a base directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelativePath {
    /// Subdirectory components joined with '/', empty for root-level files
    pub dir: String,
    pub filename: String,
}

impl RelativePath {
    /// Parse a '/'-separated relative path. Rejects absolute paths, empty
    /// names and parent-directory components.
    pub fn parse(relative: &str) -> Option<Self> {
        let trimmed = relative.trim_start_matches("./");
        if trimmed.is_empty() || trimmed.starts_with('/') {
            return None;
        }
        let mut parts: Vec<&str> = trimmed.split('/').filter(|p| !p.is_empty() && *p != ".").collect();
        if parts.iter().any(|p| *p == "..") {
            return None;
        }
        let filename = parts.pop()?.to_string();
        Some(Self {
            dir: parts.join("/"),
            filename,
        })
    }

    /// '/'-joined form, e.g. `nested/dir_1/file_0.txt`
    pub fn as_string(&self) -> String {
        if self.dir.is_empty() {
            self.filename.clone()
        } else {
            format!("{}/{}", self.dir, self.filename)
        }
    }

    pub fn depth(&self) -> usize {
        if self.dir.is_empty() {
            0
        } else {
            self.dir.split('/').count()
        }
    }
}

/// Join a remote root and a '/'-separated relative path
pub fn join_remote(root: &str, relative: &str) -> String {
    let relative = relative.trim_start_matches('/');
    let root = normalize_root(root);
    if root.is_empty() {
        relative.to_string()
    } else if relative.is_empty() {
        root.to_string()
    } else if root == "/" {
        format!("/{}", relative)
    } else {
        format!("{}/{}", root, relative)
    }
}

/// Parent of a remote path, `None` for entries directly under the root
pub fn remote_parent(path: &str) -> Option<&str> {
    match path.rsplit_once('/') {
        Some(("", _)) => Some("/"),
        Some((parent, _)) => Some(parent),
        None => None,
    }
}

fn normalize_root(root: &str) -> &str {
    if root == "/" {
        return root;
    }
    root.trim_end_matches('/')
}

/// Maps entries between a remote base directory and a local root
#[derive(Debug, Clone)]
pub struct PathMirror {
    remote_base: String,
    local_root: PathBuf,
}

impl PathMirror {
    pub fn new(remote_base: impl Into<String>, local_root: impl Into<PathBuf>) -> Self {
        Self {
            remote_base: remote_base.into(),
            local_root: local_root.into(),
        }
    }

    pub fn remote_base(&self) -> &str {
        &self.remote_base
    }

    pub fn local_root(&self) -> &Path {
        &self.local_root
    }

    /// Relative location of a full remote path under the base directory
    pub fn relative_of_remote(&self, remote_full: &str) -> Option<RelativePath> {
        let root = normalize_root(&self.remote_base);
        let rest = if root.is_empty() {
            remote_full
        } else if root == "/" {
            remote_full.strip_prefix('/')?
        } else {
            remote_full.strip_prefix(root)?.strip_prefix('/')?
        };
        RelativePath::parse(rest)
    }

    /// Full remote path under the base directory
    pub fn to_remote(&self, relative: &RelativePath) -> String {
        join_remote(&self.remote_base, &relative.as_string())
    }

    /// Full remote path under an arbitrary destination root
    pub fn to_remote_under(&self, root: &str, relative: &RelativePath) -> String {
        join_remote(root, &relative.as_string())
    }

    /// Local path below the local root
    pub fn to_local(&self, relative: &RelativePath) -> PathBuf {
        let mut path = self.local_root.clone();
        if !relative.dir.is_empty() {
            for part in relative.dir.split('/') {
                path.push(part);
            }
        }
        path.push(&relative.filename);
        path
    }

    /// Relative location of a local file under the local root
    pub fn relative_of_local(&self, local: &Path) -> Option<RelativePath> {
        let rest = match local.strip_prefix(&self.local_root) {
            Ok(rest) => rest,
            // "." as the root: relative paths are already relative to it
            Err(_) if self.local_root_is_current_dir() && local.is_relative() => local,
            Err(_) => return None,
        };
        let mut parts = Vec::new();
        for component in rest.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_str()?.to_string()),
                Component::CurDir => {}
                _ => return None,
            }
        }
        RelativePath::parse(&parts.join("/"))
    }

    fn local_root_is_current_dir(&self) -> bool {
        self.local_root
            .components()
            .all(|component| component == Component::CurDir)
    }
}
