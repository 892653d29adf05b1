//! Frame codec for everything that crosses the wire.
//!
//! Every frame is a single datagram; there is no fragmentation above the
//! transport. Headers are ASCII, payloads are raw bytes.
//!
//! # Wire forms
//!
//! ```text
//! data frame      <seq>:<payload bytes>
//! acknowledgment  ACK:<seq>
//!
//! initiation      UPLOAD_CLIENT:<protocol>:<filename>:<filesize>
//!                 DOWNLOAD_CLIENT:<protocol>:<filename>
//! reply           UPLOAD_OK:<port>
//!                 DOWNLOAD_OK:<port>:<filesize>
//!                 ERROR:FileNotFound
//! ```
//!
//! A data frame is parsed by splitting on the *first* colon only: the
//! prefix must be a decimal sequence number, the suffix is the payload.
//! Payloads are opaque and may contain colons, NULs, or any other byte;
//! they are never text-decoded.

use crate::error::{Error, Result};
use crate::protocol::ProtocolKind;

/// A sequenced data frame borrowing its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataFrame<'a> {
    /// Sequence number. Stop-and-Wait alternates {0, 1}; Selective Repeat
    /// counts up from 0.
    pub seq: u64,

    /// Payload bytes, at most [`crate::config::MSS`] long.
    pub payload: &'a [u8],
}

impl<'a> DataFrame<'a> {
    /// Serializes the frame into a fresh buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.payload.len() + 24);
        out.extend_from_slice(self.seq.to_string().as_bytes());
        out.push(b':');
        out.extend_from_slice(self.payload);
        out
    }

    /// Parses a datagram as a data frame.
    ///
    /// Frames with no colon or a non-decimal prefix are malformed; callers
    /// drop those silently.
    pub fn parse(buf: &'a [u8]) -> Result<Self> {
        let colon = buf
            .iter()
            .position(|&b| b == b':')
            .ok_or(Error::MalformedFrame)?;
        let seq = parse_decimal(&buf[..colon])?;
        Ok(Self { seq, payload: &buf[colon + 1..] })
    }
}

/// Serializes an `ACK:<seq>` frame.
pub fn encode_ack(seq: u64) -> Vec<u8> {
    format!("ACK:{seq}").into_bytes()
}

/// Parses an `ACK:<seq>` frame, returning the acknowledged sequence number.
pub fn parse_ack(buf: &[u8]) -> Result<u64> {
    let rest = buf.strip_prefix(b"ACK:").ok_or(Error::MalformedFrame)?;
    parse_decimal(rest)
}

/// A session-initiation datagram, client to dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Initiation {
    /// `UPLOAD_CLIENT:<protocol>:<filename>:<filesize>`
    Upload {
        protocol: ProtocolKind,
        filename: String,
        filesize: u64,
    },

    /// `DOWNLOAD_CLIENT:<protocol>:<filename>`
    Download {
        protocol: ProtocolKind,
        filename: String,
    },
}

impl Initiation {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Upload { protocol, filename, filesize } => {
                format!("UPLOAD_CLIENT:{protocol}:{filename}:{filesize}").into_bytes()
            }
            Self::Download { protocol, filename } => {
                format!("DOWNLOAD_CLIENT:{protocol}:{filename}").into_bytes()
            }
        }
    }

    /// Parses an initiation datagram.
    ///
    /// An upload initiation must have exactly four colon-separated fields;
    /// a download initiation treats everything after the second colon as
    /// the filename.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(buf).map_err(|_| Error::MalformedFrame)?;
        if let Some(rest) = text.strip_prefix("UPLOAD_CLIENT:") {
            let fields: Vec<&str> = rest.split(':').collect();
            let [protocol, filename, filesize] = fields[..] else {
                return Err(Error::MalformedFrame);
            };
            Ok(Self::Upload {
                protocol: protocol.parse()?,
                filename: filename.to_owned(),
                filesize: parse_decimal(filesize.as_bytes())?,
            })
        } else if let Some(rest) = text.strip_prefix("DOWNLOAD_CLIENT:") {
            let (protocol, filename) = rest.split_once(':').ok_or(Error::MalformedFrame)?;
            Ok(Self::Download {
                protocol: protocol.parse()?,
                filename: filename.to_owned(),
            })
        } else {
            Err(Error::MalformedFrame)
        }
    }
}

/// A dispatcher reply to an initiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// `UPLOAD_OK:<private-port>`
    UploadOk { port: u16 },

    /// `DOWNLOAD_OK:<private-port>:<filesize>`
    DownloadOk { port: u16, filesize: u64 },

    /// `ERROR:FileNotFound`
    FileNotFound,
}

impl Reply {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::UploadOk { port } => format!("UPLOAD_OK:{port}").into_bytes(),
            Self::DownloadOk { port, filesize } => {
                format!("DOWNLOAD_OK:{port}:{filesize}").into_bytes()
            }
            Self::FileNotFound => b"ERROR:FileNotFound".to_vec(),
        }
    }

    pub fn parse(buf: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(buf).map_err(|_| Error::MalformedFrame)?;
        if let Some(port) = text.strip_prefix("UPLOAD_OK:") {
            Ok(Self::UploadOk { port: parse_port(port)? })
        } else if let Some(rest) = text.strip_prefix("DOWNLOAD_OK:") {
            let (port, filesize) = rest.split_once(':').ok_or(Error::MalformedFrame)?;
            Ok(Self::DownloadOk {
                port: parse_port(port)?,
                filesize: parse_decimal(filesize.as_bytes())?,
            })
        } else if text == "ERROR:FileNotFound" {
            Ok(Self::FileNotFound)
        } else {
            Err(Error::MalformedFrame)
        }
    }
}

/// Parses an unsigned ASCII decimal. Rejects empty input, signs, and
/// anything that is not a digit.
fn parse_decimal(buf: &[u8]) -> Result<u64> {
    if buf.is_empty() || !buf.iter().all(u8::is_ascii_digit) {
        return Err(Error::MalformedFrame);
    }
    std::str::from_utf8(buf)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(Error::MalformedFrame)
}

fn parse_port(field: &str) -> Result<u16> {
    let port = parse_decimal(field.as_bytes())?;
    u16::try_from(port).map_err(|_| Error::MalformedFrame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_frame_roundtrip() {
        let frame = DataFrame { seq: 17, payload: b"hello, world" };
        let wire = frame.encode();
        assert_eq!(&wire[..3], b"17:");

        let decoded = DataFrame::parse(&wire).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn payload_may_contain_colons_and_nulls() {
        let payload = b"a:b:\x00:c";
        let wire = DataFrame { seq: 0, payload }.encode();

        let decoded = DataFrame::parse(&wire).unwrap();
        assert_eq!(decoded.seq, 0);
        assert_eq!(decoded.payload, payload);
    }

    #[test]
    fn empty_payload_parses() {
        let decoded = DataFrame::parse(b"3:").unwrap();
        assert_eq!(decoded.seq, 3);
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn malformed_data_frames_are_rejected() {
        assert!(DataFrame::parse(b"no colon here").is_err());
        assert!(DataFrame::parse(b":payload").is_err());
        assert!(DataFrame::parse(b"-1:payload").is_err());
        assert!(DataFrame::parse(b"12x:payload").is_err());
        assert!(DataFrame::parse(b"ACK:7").is_err());
    }

    #[test]
    fn ack_roundtrip() {
        let wire = encode_ack(42);
        assert_eq!(wire, b"ACK:42");
        assert_eq!(parse_ack(&wire).unwrap(), 42);

        assert!(parse_ack(b"ACK:").is_err());
        assert!(parse_ack(b"NAK:3").is_err());
        assert!(parse_ack(b"0:data").is_err());
    }

    #[test]
    fn upload_initiation_roundtrip() {
        let init = Initiation::Upload {
            protocol: ProtocolKind::SelectiveRepeat,
            filename: "report.pdf".into(),
            filesize: 1_048_576,
        };
        let wire = init.encode();
        assert_eq!(wire, b"UPLOAD_CLIENT:selective-repeat:report.pdf:1048576");
        assert_eq!(Initiation::parse(&wire).unwrap(), init);
    }

    #[test]
    fn download_initiation_roundtrip() {
        let init = Initiation::Download {
            protocol: ProtocolKind::StopAndWait,
            filename: "a:b.bin".into(),
        };
        let wire = init.encode();
        assert_eq!(wire, b"DOWNLOAD_CLIENT:stop-and-wait:a:b.bin");
        assert_eq!(Initiation::parse(&wire).unwrap(), init);
    }

    #[test]
    fn bad_initiations_are_rejected() {
        // wrong field count
        assert!(Initiation::parse(b"UPLOAD_CLIENT:stop-and-wait:f.bin").is_err());
        assert!(Initiation::parse(b"UPLOAD_CLIENT:stop-and-wait:a:b.bin:10").is_err());
        // unknown protocol name, case-sensitive
        assert!(Initiation::parse(b"UPLOAD_CLIENT:Stop-And-Wait:f.bin:10").is_err());
        assert!(Initiation::parse(b"DOWNLOAD_CLIENT:go-back-n:f.bin").is_err());
        // bad filesize
        assert!(Initiation::parse(b"UPLOAD_CLIENT:stop-and-wait:f.bin:-1").is_err());
        // not an initiation at all
        assert!(Initiation::parse(b"0:payload").is_err());
        assert!(Initiation::parse(b"\xff\xfe").is_err());
    }

    #[test]
    fn reply_roundtrip() {
        for reply in [
            Reply::UploadOk { port: 49152 },
            Reply::DownloadOk { port: 50001, filesize: 0 },
            Reply::FileNotFound,
        ] {
            assert_eq!(Reply::parse(&reply.encode()).unwrap(), reply);
        }

        assert!(Reply::parse(b"UPLOAD_OK:99999").is_err());
        assert!(Reply::parse(b"DOWNLOAD_OK:8080").is_err());
        assert!(Reply::parse(b"ERROR:DiskFull").is_err());
    }
}
