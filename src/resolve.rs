//! Turning a request path into something to serve.
//!
//! Each request is resolved once into a [`Target`]. In live mode that takes
//! a single stat (plus a directory read for directories); in snapshot mode
//! it is a lookup in the startup [`FileTree`].

use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{FileServerError, display_path};
use crate::listing::ListingEntry;
use crate::size::{DIR_SIZE, format_size};
use crate::tree::FileTree;
use crate::{AppState, Source};

/// What a request path points at.
#[derive(Debug)]
pub enum Target {
    Directory {
        /// Normalized root-relative path, empty for the root.
        rel_path: String,
        entries: Vec<ListingEntry>,
    },
    File {
        path: PathBuf,
    },
}

/// Normalize a request path to `a/b/c` form.
///
/// Parent references, absolute components and NUL bytes are rejected even
/// when they would stay inside the root.
pub fn clean_request_path(request_path: &str) -> Result<String, FileServerError> {
    let relative = request_path.trim_start_matches('/');
    let mut segments = Vec::new();

    for component in Path::new(relative).components() {
        match component {
            Component::Normal(name) => {
                let name = name.to_string_lossy();
                if name.contains('\0') {
                    warn!("Path component contains null byte: {:?}", name);
                    return Err(FileServerError::PathTraversal);
                }
                segments.push(name.into_owned());
            }
            Component::ParentDir => {
                warn!("Path traversal attempt detected: parent directory (..) in path");
                return Err(FileServerError::PathTraversal);
            }
            Component::CurDir => continue,
            Component::RootDir | Component::Prefix(_) => {
                warn!("Absolute path component in relative path");
                return Err(FileServerError::PathTraversal);
            }
        }
    }

    Ok(segments.join("/"))
}

/// Canonicalize `path` and make sure it did not leave `root` through a
/// symlink.
pub fn verify_within_root(root: &Path, path: &Path, rel_path: &str) -> Result<PathBuf, FileServerError> {
    let canonical_root = root.canonicalize().map_err(FileServerError::Io)?;
    let canonical_path = path
        .canonicalize()
        .map_err(|err| FileServerError::from_lookup(err, rel_path))?;

    if !canonical_path.starts_with(&canonical_root) {
        warn!(
            "Symlink escape attempt: {:?} resolved to {:?} which is outside {:?}",
            path, canonical_path, canonical_root
        );
        return Err(FileServerError::PathTraversal);
    }

    Ok(canonical_path)
}

/// Resolve `request_path` against the state's source. Blocking.
pub fn resolve(state: &AppState, request_path: &str) -> Result<Target, FileServerError> {
    let rel_path = clean_request_path(request_path)?;
    match &state.source {
        Source::Live => resolve_live(&state.root_dir, &rel_path),
        Source::Snapshot(tree) => resolve_in_tree(tree, &state.root_dir, &rel_path),
    }
}

fn resolve_live(root: &Path, rel_path: &str) -> Result<Target, FileServerError> {
    let path = if rel_path.is_empty() {
        root.to_path_buf()
    } else {
        root.join(rel_path)
    };
    let path = verify_within_root(root, &path, rel_path)?;

    let metadata =
        std::fs::metadata(&path).map_err(|err| FileServerError::from_lookup(err, rel_path))?;

    if metadata.is_file() {
        return Ok(Target::File { path });
    }
    if !metadata.is_dir() {
        return Err(FileServerError::NotFound(display_path(rel_path)));
    }

    debug!("Listing directory: {}", path.display());

    let read_dir = std::fs::read_dir(&path).map_err(|err| unreadable(rel_path, &err))?;
    let mut entries = Vec::new();

    for entry in read_dir {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping unreadable entry");
                continue;
            }
        };
        let name = entry.file_name().to_string_lossy().into_owned();

        // Follows symlinks so linked directories list as directories.
        let metadata = match std::fs::metadata(entry.path()) {
            Ok(metadata) => metadata,
            Err(err) => {
                warn!(path = %entry.path().display(), error = %err, "skipping unreadable entry");
                continue;
            }
        };

        entries.push(ListingEntry {
            path: if rel_path.is_empty() {
                name.clone()
            } else {
                format!("{rel_path}/{name}")
            },
            name,
            size: if metadata.is_dir() {
                DIR_SIZE.to_string()
            } else {
                format_size(metadata.len())
            },
            is_dir: metadata.is_dir(),
        });
    }

    Ok(Target::Directory {
        rel_path: rel_path.to_string(),
        entries,
    })
}

fn resolve_in_tree(tree: &FileTree, root: &Path, rel_path: &str) -> Result<Target, FileServerError> {
    let node = tree.find_match(rel_path)?;

    if !node.is_dir {
        let path = verify_within_root(root, &node.path, rel_path)?;
        return Ok(Target::File { path });
    }

    if let Some(reason) = &node.read_error {
        return Err(FileServerError::UnreadableDirectory {
            path: display_path(rel_path),
            reason: reason.clone(),
        });
    }

    Ok(Target::Directory {
        rel_path: rel_path.to_string(),
        entries: tree.children(node).map(ListingEntry::from).collect(),
    })
}

fn unreadable(rel_path: &str, err: &std::io::Error) -> FileServerError {
    warn!(path = %display_path(rel_path), error = %err, "directory cannot be read");
    FileServerError::UnreadableDirectory {
        path: display_path(rel_path),
        reason: err.to_string(),
    }
}
