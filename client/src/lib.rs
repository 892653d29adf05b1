//! Shared wiring for the `upload` and `download` drivers.

pub mod handshake;

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

/// Initializes the process-wide logger from the verbosity flags.
pub fn init_logger(verbose: bool, quiet: bool) {
    let default = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

/// An ephemeral local bind address in the server's address family.
pub fn ephemeral_addr(server: IpAddr) -> SocketAddr {
    match server {
        IpAddr::V4(_) => SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), 0),
        IpAddr::V6(_) => SocketAddr::new(Ipv6Addr::UNSPECIFIED.into(), 0),
    }
}
