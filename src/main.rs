use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use vitshare::common::AppConfig;
use vitshare::remote::RemoteClient;
use vitshare::service::ShareService;
use vitshare::store::TransferStore;

#[derive(Parser)]
#[command(name = "vitshare")]
#[command(about = "LAN file sharing with live transfer progress")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Share files and directories over HTTP on this machine
    Serve {
        /// Files or directories to share
        paths: Vec<PathBuf>,
        /// Listening port (0 picks an ephemeral port)
        #[arg(long)]
        port: Option<u16>,
        /// Directory incoming uploads are stored into
        #[arg(long)]
        receive_dir: Option<PathBuf>,
    },
    /// List a directory on a remote peer
    Ls {
        /// Peer base URL, e.g. http://192.168.1.20:8080
        url: String,
        /// Share password displayed by the peer
        #[arg(long, short)]
        password: String,
        /// Remote path to list (defaults to the share root)
        #[arg(default_value = "")]
        path: String,
    },
    /// Download a file from a remote peer
    Fetch {
        /// Peer base URL
        url: String,
        /// Share password displayed by the peer
        #[arg(long, short)]
        password: String,
        /// Remote file path as shown by `ls`
        remote_path: String,
        /// Destination directory (defaults to the current directory)
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vitshare=info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve {
            paths,
            port,
            receive_dir,
        } => serve(paths, port, receive_dir).await,
        Commands::Ls {
            url,
            password,
            path,
        } => ls(&url, &password, &path).await,
        Commands::Fetch {
            url,
            password,
            remote_path,
            out,
        } => fetch(&url, &password, &remote_path, &out).await,
    }
}

async fn serve(
    paths: Vec<PathBuf>,
    port: Option<u16>,
    receive_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut config = AppConfig::load()?;
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(dir) = receive_dir {
        config.receive_dir = dir;
    }
    config.validate()?;

    let service = ShareService::new(config);
    for path in paths {
        if !path.exists() {
            eprintln!("warning: {} does not exist yet", path.display());
        }
        service.registry().add(&path);
    }

    let info = service.start().await?;
    println!("Sharing at   {}", info.url());
    println!("Password     {}", info.password);
    println!("Press Ctrl+C to stop.");

    // live one-line progress from the fan-out
    let mut updates = service.subscribe();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                let active = snapshot.downloads.iter().filter(|d| !d.complete).count();
                let done = snapshot.downloads.len() - active;
                print!(
                    "\r{active} active, {done} finished, {} received   ",
                    snapshot.received.len()
                );
                use std::io::Write;
                let _ = std::io::stdout().flush();
            }
        }
    }

    println!("\nShutting down...");
    service.stop().await;
    Ok(())
}

async fn ls(url: &str, password: &str, path: &str) -> anyhow::Result<()> {
    let client = RemoteClient::connect(url, password, TransferStore::new()).await?;
    for file in client.list(path).await? {
        if file.is_dir {
            println!("{:>12}  {}/", "dir", file.rel_path);
        } else {
            println!("{:>12}  {}", file.size, file.rel_path);
        }
    }
    Ok(())
}

async fn fetch(url: &str, password: &str, remote_path: &str, out: &PathBuf) -> anyhow::Result<()> {
    let store = TransferStore::new();
    let client = RemoteClient::connect(url, password, store.clone()).await?;

    let file_name = std::path::Path::new(remote_path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow::anyhow!("remote path has no file name: {remote_path}"))?;
    let dest = out.join(file_name);

    let saved = client.download(remote_path, &dest).await?;
    let snapshot = store.snapshot();
    if let Some(entry) = snapshot.remote.last() {
        println!("Saved {} ({} bytes)", saved.display(), entry.bytes);
    } else {
        println!("Saved {}", saved.display());
    }
    Ok(())
}
