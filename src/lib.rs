//! HTTP file server for a single directory tree.
//!
//! Serves browsable listings (HTML or plain text), raw downloads and,
//! optionally, uploads into a separate directory. The binary wires these
//! modules to a CLI; everything is usable as a library too.

pub mod config;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod listing;
pub mod logging;
pub mod resolve;
pub mod routes;
pub mod size;
pub mod transfer;
pub mod tree;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

pub use config::Config;
pub use error::FileServerError;

use config::{ServeMode, UploadSettings};
use filter::ExclusionFilter;
use listing::ListingRenderer;
use logging::{RequestSink, TracingSink};
use tree::FileTree;

/// Where listings come from.
#[derive(Clone)]
pub enum Source {
    /// Read the filesystem on every request.
    Live,
    /// Tree walked once at startup, shared read-only.
    Snapshot(Arc<FileTree>),
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Canonical root directory (or file) being served
    pub root_dir: PathBuf,
    pub config: Arc<Config>,
    pub source: Source,
    pub renderer: Arc<ListingRenderer>,
    pub uploads: Arc<UploadSettings>,
    pub sink: Arc<dyn RequestSink>,
}

impl AppState {
    /// Validate `config` against `root_dir` and build the shared state.
    ///
    /// Fails on a missing root, a bad exclude pattern or an uploads
    /// directory that cannot be created. In snapshot mode this walks the
    /// whole tree before returning.
    pub fn new(root_dir: PathBuf, config: Config, version: impl Into<String>) -> Result<Self, FileServerError> {
        let root_dir = root_dir.canonicalize().map_err(|err| {
            FileServerError::Config(format!("root {} is not accessible: {}", root_dir.display(), err))
        })?;

        let filter = ExclusionFilter::new(config.include_dotfiles, config.exclude_pattern()?);
        let uploads = config.upload_settings()?;

        let source = match config.mode {
            ServeMode::Live => Source::Live,
            ServeMode::Snapshot => {
                let tree = FileTree::build(&root_dir)?;
                info!("Indexed {} entries under {}", tree.len(), root_dir.display());
                Source::Snapshot(Arc::new(tree))
            }
        };

        Ok(Self {
            root_dir,
            renderer: Arc::new(ListingRenderer::new(filter, version, routes::FILES_URL)),
            uploads: Arc::new(uploads),
            source,
            config: Arc::new(config),
            sink: Arc::new(TracingSink),
        })
    }

    /// Replace the request log sink.
    pub fn with_sink(mut self, sink: Arc<dyn RequestSink>) -> Self {
        self.sink = sink;
        self
    }
}
