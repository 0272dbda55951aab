//! Snapshot of a directory subtree.
//!
//! The tree is built breadth-first into an arena of [`TreeNode`]s. The arena
//! doubles as the work queue: nodes are appended as they are discovered and
//! processed in index order, so traversal depth never touches the call stack.
//! A directory that cannot be enumerated is flagged on its node and the walk
//! moves on to its siblings.

use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{FileServerError, display_path};
use crate::size::{DIR_SIZE, format_size};

/// Index of a node inside a [`FileTree`].
pub type NodeId = usize;

/// One filesystem entry as seen at traversal time.
#[derive(Debug, Clone)]
pub struct TreeNode {
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Path relative to the tree root, `/`-separated, empty for the root.
    pub rel_path: String,
    pub name: String,
    /// Formatted size, [`DIR_SIZE`] for directories.
    pub size: String,
    pub is_dir: bool,
    /// Set when this directory could not be enumerated.
    pub read_error: Option<String>,
    pub parent: Option<NodeId>,
    /// Children in enumeration order.
    pub children: Vec<NodeId>,
}

impl TreeNode {
    fn new(path: PathBuf, rel_path: String, name: String, info: &EntryInfo, parent: Option<NodeId>) -> Self {
        Self {
            path,
            rel_path,
            name,
            size: if info.is_dir {
                DIR_SIZE.to_string()
            } else {
                format_size(info.len)
            },
            is_dir: info.is_dir,
            read_error: None,
            parent,
            children: Vec::new(),
        }
    }

    pub fn is_unreadable(&self) -> bool {
        self.read_error.is_some()
    }
}

/// Stat result the traversal needs for one entry.
#[derive(Debug, Clone, Copy)]
pub struct EntryInfo {
    pub is_dir: bool,
    pub len: u64,
    /// The entry is a symlink; `is_dir` and `len` describe its target.
    pub is_symlink: bool,
}

/// A directory entry whose metadata may have failed to load.
#[derive(Debug)]
pub struct DirItem {
    pub name: String,
    pub info: io::Result<EntryInfo>,
}

/// Source of directory listings for the traversal.
pub trait DirReader {
    fn stat(&self, path: &Path) -> io::Result<EntryInfo>;

    /// Enumerate `path`. The outer error means the directory itself could
    /// not be opened; an inner error is one entry that could not be read.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<io::Result<DirItem>>>;

    /// Resolve symlinks in `path`.
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        Ok(path.to_path_buf())
    }
}

/// Reads the real filesystem. Symlinks are followed, so a broken link
/// surfaces as an unreadable entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsReader;

impl DirReader for FsReader {
    fn stat(&self, path: &Path) -> io::Result<EntryInfo> {
        let metadata = std::fs::metadata(path)?;
        Ok(EntryInfo {
            is_dir: metadata.is_dir(),
            len: metadata.len(),
            is_symlink: false,
        })
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<io::Result<DirItem>>> {
        let items: Vec<io::Result<DirItem>> = std::fs::read_dir(path)?
            .map(|entry| {
                let entry = entry?;
                let is_symlink = entry.file_type()?.is_symlink();
                let info = std::fs::metadata(entry.path()).map(|metadata| EntryInfo {
                    is_dir: metadata.is_dir(),
                    len: metadata.len(),
                    is_symlink,
                });
                Ok(DirItem {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    info,
                })
            })
            .collect();
        Ok(items)
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        path.canonicalize()
    }
}

#[derive(Debug, Clone)]
pub struct FileTree {
    nodes: Vec<TreeNode>,
}

impl FileTree {
    /// Walk the filesystem under `root`, logging entries that cannot be read.
    pub fn build(root: &Path) -> io::Result<Self> {
        Self::build_with_reporter(&FsReader, root, |path, err| {
            warn!(path = %path.display(), error = %err, "skipping unreadable entry");
        })
    }

    /// Walk `root` through `reader`, handing every per-entry failure to
    /// `report`. Only a failure to stat or resolve `root` itself is returned.
    ///
    /// Linked directories are descended into unless they resolve outside
    /// `root` or back onto a directory already on the current branch; such
    /// links are kept as unreadable directories.
    pub fn build_with_reporter<R, F>(reader: &R, root: &Path, mut report: F) -> io::Result<Self>
    where
        R: DirReader + ?Sized,
        F: FnMut(&Path, &io::Error),
    {
        let info = reader.stat(root)?;
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.display().to_string());

        let mut nodes = vec![TreeNode::new(root.to_path_buf(), String::new(), name, &info, None)];
        // Symlink-free location of each node, parallel to `nodes`.
        let mut real_paths = vec![reader.canonicalize(root)?];
        let mut cursor = 0;

        while cursor < nodes.len() {
            let id = cursor;
            cursor += 1;

            if !nodes[id].is_dir || nodes[id].is_unreadable() {
                continue;
            }

            let dir_path = nodes[id].path.clone();
            let items = match reader.read_dir(&dir_path) {
                Ok(items) => items,
                Err(err) => {
                    report(&dir_path, &err);
                    nodes[id].read_error = Some(err.to_string());
                    continue;
                }
            };

            for item in items {
                let item = match item {
                    Ok(item) => item,
                    Err(err) => {
                        report(&dir_path, &err);
                        continue;
                    }
                };
                let child_path = dir_path.join(&item.name);
                let info = match item.info {
                    Ok(info) => info,
                    Err(err) => {
                        report(&child_path, &err);
                        continue;
                    }
                };

                let real_path = if info.is_symlink {
                    match reader.canonicalize(&child_path) {
                        Ok(real_path) => real_path,
                        Err(err) => {
                            report(&child_path, &err);
                            continue;
                        }
                    }
                } else {
                    real_paths[id].join(&item.name)
                };

                let rel_path = if nodes[id].rel_path.is_empty() {
                    item.name.clone()
                } else {
                    format!("{}/{}", nodes[id].rel_path, item.name)
                };

                let mut node = TreeNode::new(child_path, rel_path, item.name, &info, Some(id));
                if info.is_symlink && info.is_dir {
                    let refusal = if !real_path.starts_with(&real_paths[0]) {
                        Some("symlink leads outside the served root")
                    } else if on_branch(&nodes, &real_paths, id, &real_path) {
                        Some("symlink loop")
                    } else {
                        None
                    };
                    if let Some(reason) = refusal {
                        report(&node.path, &io::Error::other(reason));
                        node.read_error = Some(reason.to_string());
                    }
                }

                let child_id = nodes.len();
                nodes.push(node);
                real_paths.push(real_path);
                nodes[id].children.push(child_id);
            }
        }

        Ok(Self { nodes })
    }

    pub fn root(&self) -> &TreeNode {
        &self.nodes[0]
    }

    pub fn get(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in breadth-first order.
    pub fn iter(&self) -> impl Iterator<Item = &TreeNode> {
        self.nodes.iter()
    }

    pub fn children<'a>(&'a self, node: &'a TreeNode) -> impl Iterator<Item = &'a TreeNode> + 'a {
        node.children.iter().map(move |&id| &self.nodes[id])
    }

    /// Resolve a `/`-separated request path to a node by exact name match.
    ///
    /// Empty segments are ignored, so `"/"` and `""` both yield the root.
    pub fn find_match(&self, request_path: &str) -> Result<&TreeNode, FileServerError> {
        let mut current = self.root();
        for segment in request_path.split('/').filter(|s| !s.is_empty()) {
            current = self
                .children(current)
                .find(|child| child.name == segment)
                .ok_or_else(|| FileServerError::NotFound(display_path(request_path)))?;
        }
        Ok(current)
    }
}

/// Whether `real_path` is the location of `id` or one of its ancestors.
fn on_branch(nodes: &[TreeNode], real_paths: &[PathBuf], id: NodeId, real_path: &Path) -> bool {
    let mut current = Some(id);
    while let Some(node) = current {
        if real_paths[node] == real_path {
            return true;
        }
        current = nodes[node].parent;
    }
    false
}
