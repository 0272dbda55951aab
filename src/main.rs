use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use dirserve::config::{Config, Disposition, ServeMode};
use dirserve::{AppState, routes};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "dirserve")]
#[command(about = "HTTP file server for a local directory tree")]
#[command(version)]
struct Cli {
    /// Directory (or single file) to serve
    #[arg(env = "DIRSERVE_ROOT", default_value = ".")]
    root: PathBuf,

    /// Port to listen on
    #[arg(short, long, env = "DIRSERVE_PORT", default_value = "8080")]
    port: u16,

    /// Address to bind to
    #[arg(short, long, env = "DIRSERVE_HOST", default_value = "0.0.0.0")]
    bind: String,

    /// Config file path (optional)
    #[arg(short, long, env = "DIRSERVE_CONFIG")]
    config: Option<PathBuf>,

    /// List dotfiles
    #[arg(long, env = "DIRSERVE_DOTFILES")]
    dotfiles: bool,

    /// Hide entries whose name matches this regular expression
    #[arg(long, env = "DIRSERVE_EXCLUDE")]
    exclude: Option<String>,

    /// Accept uploads on POST /files
    #[arg(long, env = "DIRSERVE_UPLOADS")]
    uploads: bool,

    /// Directory uploads are written to
    #[arg(long, env = "DIRSERVE_UPLOADS_DIR")]
    uploads_dir: Option<PathBuf>,

    /// Prefix uploaded file names with a timestamp
    #[arg(long, env = "DIRSERVE_UPLOADS_TIMESTAMP")]
    uploads_timestamp: bool,

    /// Maximum upload size in bytes (0 for unlimited)
    #[arg(long, env = "DIRSERVE_MAX_UPLOAD_SIZE")]
    max_upload_size: Option<u64>,

    /// Serve from a tree indexed at startup instead of reading per request
    #[arg(long, env = "DIRSERVE_MODE", value_enum)]
    mode: Option<ServeMode>,

    /// Content-Disposition for downloads
    #[arg(long, env = "DIRSERVE_DOWNLOAD", value_enum)]
    download: Option<Disposition>,

    /// Log level (trace|debug|info|warn|error)
    #[arg(long, env = "DIRSERVE_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, env = "DIRSERVE_LOG_FORMAT", value_enum, default_value = "text")]
    log_format: LogFormat,
}

impl Cli {
    fn init_logging(&self) {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "dirserve={level},tower_http={level}",
                level = self.log_level
            ))
        });

        match self.log_format {
            LogFormat::Json => tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .ok(),
            LogFormat::Text => tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .try_init()
                .ok(),
        };
    }

    /// File config first, then flags on top.
    fn load_config(&self) -> Result<Config, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        config.include_dotfiles |= self.dotfiles;
        config.uploads |= self.uploads;
        config.uploads_timestamp |= self.uploads_timestamp;
        if let Some(exclude) = &self.exclude {
            config.exclude = Some(exclude.clone());
        }
        if let Some(dir) = &self.uploads_dir {
            config.uploads_dir = Some(dir.clone());
        }
        if let Some(size) = self.max_upload_size {
            config.max_upload_size = size;
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(download) = self.download {
            config.download = download;
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    cli.init_logging();

    let config = cli.load_config()?;
    let root = std::path::absolute(&cli.root)?;
    let state = AppState::new(root, config, env!("CARGO_PKG_VERSION"))?;

    info!("Serving files from: {}", state.root_dir.display());
    info!("Mode: {:?}", state.config.mode);
    if let Some(pattern) = state.renderer.filter().pattern() {
        info!("Exclude pattern: {}", pattern);
    }
    if state.uploads.enabled {
        info!("Uploads dir: {}", state.uploads.dir.display());
    }

    let app = routes::create_router(state);

    let addr: SocketAddr = format!("{}:{}", cli.bind, cli.port).parse()?;
    info!("Starting dirserve on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
