use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::process;

use clap::Parser;

use server::dispatcher::{Dispatcher, ServerConfig};

/// Server for the file transfer application.
#[derive(Debug, Parser)]
#[command(name = "server", version, about = "Server for file transfer application")]
struct Args {
    /// Increase output verbosity.
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Decrease output verbosity.
    #[arg(short, long)]
    quiet: bool,

    /// IP address to listen on.
    #[arg(short = 'H', long)]
    host: IpAddr,

    /// Port to listen on.
    #[arg(short, long)]
    port: u16,

    /// Storage dir path.
    #[arg(short, long, default_value = "storage")]
    storage: PathBuf,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logger(args.verbose, args.quiet);

    if args.port == 0 {
        log::error!("invalid port: must be between 1 and 65535");
        process::exit(1);
    }

    let cfg = ServerConfig::new(SocketAddr::new(args.host, args.port), args.storage.clone());
    let dispatcher = match Dispatcher::bind(cfg).await {
        Ok(dispatcher) => dispatcher,
        Err(e) => {
            log::error!("could not start the server: {e}");
            process::exit(1);
        }
    };
    log::info!(
        "server listening on {}:{}, storage {:?}",
        args.host,
        args.port,
        args.storage,
    );

    let interrupt = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => log::warn!("interrupt received, shutting down"),
            // No signal handler means no way to stop us gracefully; run on.
            Err(_) => std::future::pending().await,
        }
    };
    match dispatcher.run(interrupt).await {
        Ok(()) => {
            log::info!("server stopped");
            process::exit(130);
        }
        Err(e) => {
            log::error!("server failed: {e}");
            process::exit(1);
        }
    }
}

fn init_logger(verbose: bool, quiet: bool) {
    let default = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}
