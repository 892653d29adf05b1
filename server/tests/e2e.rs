//! Dispatcher-level scenarios: real handshakes against a running server.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tokio::fs::File;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use ftransport::config::{SelectiveRepeatConfig, StopAndWaitConfig, TransferConfig};
use ftransport::frame::{Initiation, Reply};
use ftransport::protocol::{self, ProtocolKind};
use ftransport::{Endpoint, Result};
use server::dispatcher::{Dispatcher, ServerConfig};

struct TestServer {
    addr: SocketAddr,
    stop: oneshot::Sender<()>,
    handle: JoinHandle<Result<()>>,
}

impl TestServer {
    async fn start(storage: PathBuf) -> Self {
        let transfer = TransferConfig {
            stop_and_wait: StopAndWaitConfig {
                idle_timeout: Duration::from_secs(2),
                drain: Duration::from_millis(100),
                ..StopAndWaitConfig::default()
            },
            selective_repeat: SelectiveRepeatConfig {
                idle_timeout: Duration::from_secs(2),
                drain: Duration::from_millis(100),
                ..SelectiveRepeatConfig::default()
            },
        };
        let cfg = ServerConfig {
            bind: "127.0.0.1:0".parse().unwrap(),
            storage,
            transfer,
            shutdown_grace: Duration::from_millis(500),
        };

        let dispatcher = Dispatcher::bind(cfg).await.unwrap();
        let addr = dispatcher.local_addr().unwrap();
        let (stop, stopped) = oneshot::channel();
        let handle = tokio::spawn(dispatcher.run(async {
            let _ = stopped.await;
        }));
        Self { addr, stop, handle }
    }

    async fn shutdown(self) {
        let _ = self.stop.send(());
        self.handle.await.unwrap().unwrap();
    }
}

fn quick_transfer() -> TransferConfig {
    TransferConfig {
        stop_and_wait: StopAndWaitConfig {
            drain: Duration::from_millis(100),
            ..StopAndWaitConfig::default()
        },
        selective_repeat: SelectiveRepeatConfig {
            drain: Duration::from_millis(100),
            ..SelectiveRepeatConfig::default()
        },
    }
}

fn payload(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = vec![0u8; len];
    rng.fill_bytes(&mut data);
    data
}

async fn handshake(endpoint: &Endpoint, server: SocketAddr, initiation: &Initiation) -> Reply {
    endpoint.send_to(&initiation.encode(), server).await.unwrap();
    let mut buf = [0u8; 512];
    let (n, _) = endpoint
        .recv_from_timeout(&mut buf, Duration::from_secs(2))
        .await
        .unwrap();
    Reply::parse(&buf[..n]).unwrap()
}

/// Drives a full upload the way the upload binary does.
async fn upload(server: SocketAddr, kind: ProtocolKind, name: &str, src: &Path) {
    let endpoint = Endpoint::bind("127.0.0.1:0").await.unwrap();
    let filesize = tokio::fs::metadata(src).await.unwrap().len();

    let initiation = Initiation::Upload {
        protocol: kind,
        filename: name.to_owned(),
        filesize,
    };
    let Reply::UploadOk { port } = handshake(&endpoint, server, &initiation).await else {
        panic!("upload was not accepted");
    };

    let mut file = File::open(src).await.unwrap();
    let peer = SocketAddr::new(server.ip(), port);
    protocol::send_file(kind, &quick_transfer(), &endpoint, peer, &mut file, filesize)
        .await
        .unwrap();
}

#[tokio::test]
async fn upload_lands_in_storage() {
    let storage = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let server = TestServer::start(storage.path().to_path_buf()).await;

    let data = payload(5000, 11);
    let src = scratch.path().join("local.bin");
    tokio::fs::write(&src, &data).await.unwrap();

    for (kind, name) in [
        (ProtocolKind::StopAndWait, "sw.bin"),
        (ProtocolKind::SelectiveRepeat, "sr.bin"),
    ] {
        upload(server.addr, kind, name, &src).await;
        assert_eq!(tokio::fs::read(storage.path().join(name)).await.unwrap(), data);
    }

    server.shutdown().await;
}

#[tokio::test]
async fn zero_byte_upload_creates_an_empty_file() {
    let storage = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let server = TestServer::start(storage.path().to_path_buf()).await;

    let src = scratch.path().join("empty.bin");
    tokio::fs::write(&src, b"").await.unwrap();
    upload(server.addr, ProtocolKind::StopAndWait, "empty.bin", &src).await;

    // The session drains briefly before closing the file.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(
        tokio::fs::read(storage.path().join("empty.bin")).await.unwrap(),
        b""
    );

    server.shutdown().await;
}

#[tokio::test]
async fn download_round_trips_a_stored_file() {
    let storage = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let server = TestServer::start(storage.path().to_path_buf()).await;

    let data = payload(40_000, 12);
    tokio::fs::write(storage.path().join("stored.bin"), &data).await.unwrap();

    let endpoint = Endpoint::bind("127.0.0.1:0").await.unwrap();
    let initiation = Initiation::Download {
        protocol: ProtocolKind::SelectiveRepeat,
        filename: "stored.bin".to_owned(),
    };
    let Reply::DownloadOk { port: _, filesize } = handshake(&endpoint, server.addr, &initiation).await
    else {
        panic!("download was not accepted");
    };
    assert_eq!(filesize, data.len() as u64);

    let dst = scratch.path().join("fetched.bin");
    let mut file = File::create(&dst).await.unwrap();
    protocol::receive_file(
        ProtocolKind::SelectiveRepeat,
        &quick_transfer(),
        &endpoint,
        &mut file,
        filesize,
    )
    .await
    .unwrap();

    assert_eq!(tokio::fs::read(&dst).await.unwrap(), data);
    server.shutdown().await;
}

#[tokio::test]
async fn missing_file_is_refused() {
    let storage = tempfile::tempdir().unwrap();
    let server = TestServer::start(storage.path().to_path_buf()).await;

    let endpoint = Endpoint::bind("127.0.0.1:0").await.unwrap();
    let initiation = Initiation::Download {
        protocol: ProtocolKind::StopAndWait,
        filename: "missing.bin".to_owned(),
    };
    assert_eq!(
        handshake(&endpoint, server.addr, &initiation).await,
        Reply::FileNotFound
    );

    // The public endpoint keeps serving afterwards.
    let initiation = Initiation::Download {
        protocol: ProtocolKind::StopAndWait,
        filename: "also-missing.bin".to_owned(),
    };
    assert_eq!(
        handshake(&endpoint, server.addr, &initiation).await,
        Reply::FileNotFound
    );

    server.shutdown().await;
}

#[tokio::test]
async fn traversal_names_are_rejected() {
    let storage = tempfile::tempdir().unwrap();
    let server = TestServer::start(storage.path().to_path_buf()).await;

    let endpoint = Endpoint::bind("127.0.0.1:0").await.unwrap();
    let initiation = Initiation::Download {
        protocol: ProtocolKind::StopAndWait,
        filename: "../secret.bin".to_owned(),
    };
    assert_eq!(
        handshake(&endpoint, server.addr, &initiation).await,
        Reply::FileNotFound
    );

    // An unsafe upload name is ignored outright: no reply, nothing created.
    let initiation = Initiation::Upload {
        protocol: ProtocolKind::StopAndWait,
        filename: "../evil.bin".to_owned(),
        filesize: 3,
    };
    endpoint.send_to(&initiation.encode(), server.addr).await.unwrap();
    let mut buf = [0u8; 512];
    assert!(
        endpoint
            .recv_from_timeout(&mut buf, Duration::from_millis(300))
            .await
            .is_err()
    );
    assert!(!storage.path().parent().unwrap().join("evil.bin").exists());

    server.shutdown().await;
}

#[tokio::test]
async fn garbage_on_the_public_endpoint_is_ignored() {
    let storage = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let server = TestServer::start(storage.path().to_path_buf()).await;

    let endpoint = Endpoint::bind("127.0.0.1:0").await.unwrap();
    for junk in [&b"hello"[..], b"UPLOAD_CLIENT:bad", b"\xff\x00\xfe", b"7:data"] {
        endpoint.send_to(junk, server.addr).await.unwrap();
    }

    // A well-formed initiation still goes through.
    let data = payload(2000, 13);
    let src = scratch.path().join("after-junk.bin");
    tokio::fs::write(&src, &data).await.unwrap();
    upload(server.addr, ProtocolKind::StopAndWait, "after-junk.bin", &src).await;
    assert_eq!(
        tokio::fs::read(storage.path().join("after-junk.bin")).await.unwrap(),
        data
    );

    server.shutdown().await;
}

#[tokio::test]
async fn duplicate_initiation_gets_a_fresh_session() {
    let storage = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let server = TestServer::start(storage.path().to_path_buf()).await;

    let data = payload(3000, 14);
    let src = scratch.path().join("dup.bin");
    tokio::fs::write(&src, &data).await.unwrap();

    let endpoint = Endpoint::bind("127.0.0.1:0").await.unwrap();
    let initiation = Initiation::Upload {
        protocol: ProtocolKind::StopAndWait,
        filename: "dup.bin".to_owned(),
        filesize: data.len() as u64,
    };

    // As if the first reply had been lost: the re-sent initiation earns its
    // own session, and the transfer proceeds against the newest port.
    let Reply::UploadOk { port: first } = handshake(&endpoint, server.addr, &initiation).await
    else {
        panic!("first initiation not accepted");
    };
    let Reply::UploadOk { port: second } = handshake(&endpoint, server.addr, &initiation).await
    else {
        panic!("second initiation not accepted");
    };
    assert_ne!(first, second);

    let mut file = File::open(&src).await.unwrap();
    let peer = SocketAddr::new(server.addr.ip(), second);
    protocol::send_file(
        ProtocolKind::StopAndWait,
        &quick_transfer(),
        &endpoint,
        peer,
        &mut file,
        data.len() as u64,
    )
    .await
    .unwrap();

    assert_eq!(tokio::fs::read(storage.path().join("dup.bin")).await.unwrap(), data);
    server.shutdown().await;
}

#[tokio::test]
async fn concurrent_uploads_stay_independent() {
    let storage = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let server = TestServer::start(storage.path().to_path_buf()).await;

    let data_a = payload(30_000, 15);
    let data_b = payload(30_000, 16);
    let src_a = scratch.path().join("a.bin");
    let src_b = scratch.path().join("b.bin");
    tokio::fs::write(&src_a, &data_a).await.unwrap();
    tokio::fs::write(&src_b, &data_b).await.unwrap();

    let addr = server.addr;
    let task_a = tokio::spawn({
        let src_a = src_a.clone();
        async move { upload(addr, ProtocolKind::SelectiveRepeat, "a.bin", &src_a).await }
    });
    let task_b = tokio::spawn({
        let src_b = src_b.clone();
        async move { upload(addr, ProtocolKind::SelectiveRepeat, "b.bin", &src_b).await }
    });
    task_a.await.unwrap();
    task_b.await.unwrap();

    assert_eq!(tokio::fs::read(storage.path().join("a.bin")).await.unwrap(), data_a);
    assert_eq!(tokio::fs::read(storage.path().join("b.bin")).await.unwrap(), data_b);
    server.shutdown().await;
}
