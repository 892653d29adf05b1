use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::process;

use clap::Parser;
use tokio::fs::File;

use client::handshake;
use ftransport::frame::{Initiation, Reply};
use ftransport::{Endpoint, Error, ProtocolKind, Result, TransferConfig, protocol};

/// Client to download a file from the server.
#[derive(Debug, Parser)]
#[command(name = "download", version, about = "Client to download a file from the server")]
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

    /// Destination file path.
    #[arg(short = 'd', long)]
    dst: PathBuf,

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
        log::error!("download failed: {e}");
        process::exit(1);
    }
}

async fn run(args: &Args) -> Result<()> {
    let server = SocketAddr::new(args.host, args.port);
    let endpoint = Endpoint::bind(client::ephemeral_addr(args.host)).await?;

    let initiation = Initiation::Download {
        protocol: args.protocol,
        filename: args.name.clone(),
    };
    let filesize = match handshake::request(&endpoint, server, &initiation).await? {
        Reply::DownloadOk { port, filesize } => {
            log::debug!("download accepted, {filesize} bytes from data port {port}");
            filesize
        }
        Reply::FileNotFound => return Err(Error::FileNotFound),
        other => return Err(Error::Handshake(format!("unexpected reply {other:?}"))),
    };

    // A destination that names a directory receives the remote name.
    let path = if args.dst.is_dir() {
        args.dst.join(&args.name)
    } else {
        args.dst.clone()
    };

    log::info!(
        "downloading {:?} to {}: {} bytes via {}",
        args.name,
        path.display(),
        filesize,
        args.protocol,
    );
    let mut file = File::create(&path).await?;
    let stats = protocol::receive_file(
        args.protocol,
        &TransferConfig::default(),
        &endpoint,
        &mut file,
        filesize,
    )
    .await?;
    log::info!(
        "downloaded {:?}: {} bytes in {:.2?}",
        args.name,
        stats.bytes,
        stats.elapsed,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn all_required_args_must_be_present() {
        assert!(Args::try_parse_from(["download", "-H", "10.0.0.7", "-p", "9000"]).is_err());
        assert!(
            Args::try_parse_from([
                "download", "-H", "10.0.0.7", "-p", "9000", "-d", "out.bin", "-n", "in.bin",
            ])
            .is_ok()
        );
    }
}
