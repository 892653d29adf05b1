//! Reliable file transfer over UDP.
//!
//! This crate is the delivery engine shared by the `server`, `upload` and
//! `download` binaries: the wire-frame codec, the bound datagram endpoint,
//! and two interchangeable recovery protocols (Stop-and-Wait and Selective
//! Repeat) with adaptive retransmission timeouts.
//!
//! A transfer is one file of a size declared during the handshake; there
//! is no end-of-stream frame, both sides terminate by counting bytes
//! against that declared size.

pub mod config;
pub mod endpoint;
pub mod error;
pub mod frame;
pub mod protocol;
pub mod rtt;
pub mod stats;

pub use config::{MSS, SelectiveRepeatConfig, StopAndWaitConfig, TransferConfig};
pub use endpoint::Endpoint;
pub use error::{Error, Result};
pub use protocol::ProtocolKind;
pub use stats::TransferStats;
