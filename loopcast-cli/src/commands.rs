//! CLI command implementations

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Subcommand;
use loopcast_core::{LocalShare, LoopcastConfig, LoopcastError, RemoteAccess, Result, StreamProxy};
use reqwest::header::{CONTENT_LENGTH, RANGE};

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Register files and serve them until interrupted
    Serve {
        /// Directory the file paths are relative to
        #[arg(short, long, default_value = ".")]
        root: PathBuf,
        /// Files to expose as stream URLs
        #[arg(required = true)]
        files: Vec<String>,
    },
    /// Stream the start of a file through the proxy and report what was served
    Probe {
        /// Directory the file path is relative to
        #[arg(short, long, default_value = ".")]
        root: PathBuf,
        /// File to probe
        file: String,
        /// Number of leading bytes to request
        #[arg(short, long, default_value = "1024")]
        bytes: u64,
    },
}

/// Handle the CLI command
///
/// # Errors
/// Returns appropriate error based on the command that fails
pub async fn handle_command(command: Commands) -> Result<()> {
    match command {
        Commands::Serve { root, files } => serve_files(root, files).await,
        Commands::Probe { root, file, bytes } => probe_file(root, file, bytes).await,
    }
}

/// Register every file and keep the proxy running until Ctrl-C
///
/// # Errors
/// - `LoopcastError::Proxy` - Listener could not be started
/// - `LoopcastError::Io` - Waiting for the interrupt signal failed
pub async fn serve_files(root: PathBuf, files: Vec<String>) -> Result<()> {
    let proxy = StreamProxy::new(LoopcastConfig::from_env());
    let share: Arc<dyn RemoteAccess> = Arc::new(LocalShare::new(&root));
    tracing::info!("Serving {} files from {}", files.len(), root.display());

    for file in files {
        if !share.exists(&file).await? {
            return Err(LoopcastError::Configuration {
                reason: format!("{file} is not a file below {}", root.display()),
            });
        }
        let name = display_name(&file);
        let url = proxy.register(share.clone(), file, Some(name.clone())).await?;
        println!("{name} -> {url}");
    }

    println!("Serving on port {}; press Ctrl-C to stop", proxy.port().unwrap_or_default());
    tokio::signal::ctrl_c().await?;

    let stats = proxy.stats();
    println!(
        "Served {} connections, {} bytes ({} aborted streams)",
        stats.connections, stats.bytes_streamed, stats.aborted_streams
    );
    Ok(())
}

/// Request the first bytes of a file through the proxy and print the result
///
/// # Errors
/// - `LoopcastError::Proxy` - Listener could not be started
/// - `LoopcastError::Io` - HTTP request to the proxy failed
pub async fn probe_file(root: PathBuf, file: String, bytes: u64) -> Result<()> {
    let proxy = StreamProxy::new(LoopcastConfig::from_env());
    let share: Arc<dyn RemoteAccess> = Arc::new(LocalShare::new(&root));
    let url = proxy
        .register(share, file.clone(), Some(display_name(&file)))
        .await?;
    let client = reqwest::Client::new();

    let head = client.head(&url).send().await.map_err(http_error)?;
    let length = head
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();
    println!("HEAD {url} -> {} (length {length})", head.status());

    let last = bytes.saturating_sub(1);
    let response = client
        .get(&url)
        .header(RANGE, format!("bytes=0-{last}"))
        .send()
        .await
        .map_err(http_error)?;
    let status = response.status();
    let body = response.bytes().await.map_err(http_error)?;
    println!("GET bytes=0-{last} -> {status} ({} bytes received)", body.len());

    Ok(())
}

fn display_name(file: &str) -> String {
    Path::new(file)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.to_string())
}

fn http_error(error: reqwest::Error) -> LoopcastError {
    LoopcastError::Io(std::io::Error::other(error))
}
