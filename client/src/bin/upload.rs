use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::process;

use clap::Parser;
use tokio::fs::File;

use client::handshake;
use ftransport::frame::{Initiation, Reply};
use ftransport::{Endpoint, Error, ProtocolKind, Result, TransferConfig, protocol};

/// Client to upload a file to the server.
#[derive(Debug, Parser)]
#[command(name = "upload", version, about = "Client to upload a file to the server")]
struct Args {
    /// Increase output verbosity.
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Decrease output verbosity.
    #[arg(short, long)]
    quiet: bool,

    /// Server IP address.
    #[arg(short = 'H', long)]
    host: IpAddr,

    /// Server port.
    #[arg(short, long)]
    port: u16,

    /// Source file path.
    #[arg(short, long)]
    src: PathBuf,

    /// File name under the server's storage directory.
    #[arg(short, long)]
    name: String,

    /// Error recovery protocol.
    #[arg(short = 'r', long, default_value_t = ProtocolKind::StopAndWait)]
    protocol: ProtocolKind,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    client::init_logger(args.verbose, args.quiet);

    if args.port == 0 {
        log::error!("invalid port: must be between 1 and 65535");
        process::exit(1);
    }
    if let Err(e) = run(&args).await {
        log::error!("upload failed: {e}");
        process::exit(1);
    }
}

async fn run(args: &Args) -> Result<()> {
    let filesize = match tokio::fs::metadata(&args.src).await {
        Ok(meta) if meta.is_file() => meta.len(),
        _ => {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("source file {} does not exist", args.src.display()),
            )));
        }
    };

    let server = SocketAddr::new(args.host, args.port);
    let endpoint = Endpoint::bind(client::ephemeral_addr(args.host)).await?;

    log::info!(
        "uploading {} as {:?}: {} bytes via {}",
        args.src.display(),
        args.name,
        filesize,
        args.protocol,
    );
    let initiation = Initiation::Upload {
        protocol: args.protocol,
        filename: args.name.clone(),
        filesize,
    };
    let peer = match handshake::request(&endpoint, server, &initiation).await? {
        Reply::UploadOk { port } => SocketAddr::new(args.host, port),
        other => return Err(Error::Handshake(format!("unexpected reply {other:?}"))),
    };
    log::debug!("upload accepted, data port {}", peer.port());

    let mut file = File::open(&args.src).await?;
    let stats = protocol::send_file(
        args.protocol,
        &TransferConfig::default(),
        &endpoint,
        peer,
        &mut file,
        filesize,
    )
    .await?;
    log::info!(
        "uploaded {:?}: {} bytes in {:.2?}",
        args.name,
        stats.bytes,
        stats.elapsed,
    );
    Ok(())
}
