//! End-to-end tests over real TCP connections

use ember::config::Config;
use ember::server::Server;
use flate2::read::GzDecoder;
use std::collections::HashMap;
use std::io::Read;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct TestServer {
    addr: SocketAddr,
    root: PathBuf,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl TestServer {
    async fn start(tag: &str) -> Self {
        Self::start_with(tag, |_| {}).await
    }

    async fn start_with(tag: &str, tweak: impl FnOnce(&mut Config)) -> Self {
        let root = std::env::temp_dir().join(format!("ember-e2e-{}-{}", tag, std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        std::fs::create_dir_all(&root).unwrap();

        let mut cfg = Config::default();
        cfg.server.listen_addr = "127.0.0.1:0".to_string();
        cfg.files.directory = root.clone();
        tweak(&mut cfg);

        let server = Server::bind(cfg).await.unwrap();
        let addr = server.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();
        let handle = tokio::spawn(server.run(async {
            let _ = rx.await;
        }));

        Self {
            addr,
            root,
            shutdown: Some(tx),
            handle,
        }
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.handle.await.unwrap().unwrap();
    }
}

struct RawResponse {
    status_line: String,
    headers: HashMap<String, String>,
    header_order: Vec<String>,
    body: Vec<u8>,
}

async fn send(addr: SocketAddr, raw: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw).await.unwrap();

    // A reset after the response is fine; keep whatever arrived.
    let mut out = Vec::new();
    let _ = stream.read_to_end(&mut out).await;
    out
}

async fn request(addr: SocketAddr, raw: &[u8]) -> RawResponse {
    let out = send(addr, raw).await;
    let split = out
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("response has a header terminator");

    let head = std::str::from_utf8(&out[..split]).unwrap();
    let mut lines = head.split("\r\n");
    let status_line = lines.next().unwrap().to_string();

    let mut headers = HashMap::new();
    let mut header_order = Vec::new();
    for line in lines {
        let (k, v) = line.split_once(": ").unwrap();
        header_order.push(k.to_string());
        headers.insert(k.to_string(), v.to_string());
    }

    RawResponse {
        status_line,
        headers,
        header_order,
        body: out[split + 4..].to_vec(),
    }
}

fn gunzip(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    GzDecoder::new(data).read_to_end(&mut out).unwrap();
    out
}

#[tokio::test]
async fn test_root() {
    let server = TestServer::start("root").await;

    let resp = request(server.addr, b"GET / HTTP/1.1\r\nHost: localhost:4221\r\n\r\n").await;

    assert_eq!(resp.status_line, "HTTP/1.1 200 OK");
    assert_eq!(resp.headers["Content-Type"], "text/plain");
    assert_eq!(resp.headers["Content-Length"], resp.body.len().to_string());
    assert_eq!(resp.body, b"Hello, this is a 200!");

    server.stop().await;
}

#[tokio::test]
async fn test_echo() {
    let server = TestServer::start("echo").await;

    let resp = request(server.addr, b"GET /echo/abc%20def HTTP/1.1\r\n\r\n").await;
    assert_eq!(resp.status_line, "HTTP/1.1 200 OK");
    assert_eq!(resp.headers["Content-Type"], "text/plain");
    assert_eq!(resp.body, b"abc%20def");

    let empty = request(server.addr, b"GET /echo/ HTTP/1.1\r\n\r\n").await;
    assert_eq!(empty.status_line, "HTTP/1.1 200 OK");
    assert_eq!(empty.headers["Content-Length"], "0");
    assert!(empty.body.is_empty());

    server.stop().await;
}

#[tokio::test]
async fn test_user_agent() {
    let server = TestServer::start("ua").await;

    let resp = request(
        server.addr,
        b"GET /user-agent HTTP/1.1\r\nUser-Agent: foobar/1.2.3\r\n\r\n",
    )
    .await;
    assert_eq!(resp.body, b"foobar/1.2.3");

    let missing = request(server.addr, b"GET /user-agent HTTP/1.1\r\n\r\n").await;
    assert_eq!(missing.body, b"No User-Agent found");

    server.stop().await;
}

#[tokio::test]
async fn test_gzip_echo() {
    let server = TestServer::start("gzip").await;

    let resp = request(
        server.addr,
        b"GET /echo/abc HTTP/1.1\r\nAccept-Encoding: invalid-1, gzip, invalid-2\r\n\r\n",
    )
    .await;

    assert_eq!(resp.status_line, "HTTP/1.1 200 OK");
    assert_eq!(resp.headers["Content-Encoding"], "gzip");
    assert_eq!(resp.headers["Content-Length"], resp.body.len().to_string());
    assert_eq!(
        resp.header_order,
        ["Content-Type", "Content-Encoding", "Content-Length"]
    );
    assert_eq!(gunzip(&resp.body), b"abc");

    server.stop().await;
}

#[tokio::test]
async fn test_no_gzip_without_exact_token() {
    let server = TestServer::start("nogzip").await;

    let resp = request(
        server.addr,
        b"GET /echo/abc HTTP/1.1\r\nAccept-Encoding: invalid-encoding\r\n\r\n",
    )
    .await;

    assert!(!resp.headers.contains_key("Content-Encoding"));
    assert_eq!(resp.body, b"abc");

    server.stop().await;
}

#[tokio::test]
async fn test_upload_then_download() {
    let server = TestServer::start("files").await;

    let created = request(
        server.addr,
        b"POST /files/report.txt HTTP/1.1\r\nContent-Type: application/octet-stream\r\nContent-Length: 5\r\nAccept-Encoding: gzip\r\n\r\n12345",
    )
    .await;
    assert_eq!(created.status_line, "HTTP/1.1 201 Created");
    assert!(!created.headers.contains_key("Content-Encoding"));
    assert_eq!(created.body, b"201 Created Successfully");
    assert_eq!(std::fs::read(server.root.join("report.txt")).unwrap(), b"12345");

    let fetched = request(server.addr, b"GET /files/report.txt HTTP/1.1\r\n\r\n").await;
    assert_eq!(fetched.status_line, "HTTP/1.1 200 OK");
    assert_eq!(fetched.headers["Content-Type"], "application/octet-stream");
    assert_eq!(fetched.body, b"12345");

    let gzipped = request(
        server.addr,
        b"GET /files/report.txt HTTP/1.1\r\nAccept-Encoding: gzip\r\n\r\n",
    )
    .await;
    assert_eq!(gzipped.headers["Content-Encoding"], "gzip");
    assert_eq!(gunzip(&gzipped.body), b"12345");

    server.stop().await;
}

#[tokio::test]
async fn test_file_errors() {
    let server = TestServer::start("file-errors").await;

    let missing = request(server.addr, b"GET /files/missing HTTP/1.1\r\nAccept-Encoding: gzip\r\n\r\n").await;
    assert_eq!(missing.status_line, "HTTP/1.1 404 Not Found");
    assert!(!missing.headers.contains_key("Content-Encoding"));
    assert_eq!(missing.body, b"404 Not Found");

    let no_length = request(server.addr, b"POST /files/x HTTP/1.1\r\n\r\n").await;
    assert_eq!(no_length.status_line, "HTTP/1.1 411 Length Required");

    let negative = request(server.addr, b"POST /files/x HTTP/1.1\r\nContent-Length: -1\r\n\r\n").await;
    assert_eq!(negative.status_line, "HTTP/1.1 400 Bad Request");

    let garbage = request(server.addr, b"POST /files/x HTTP/1.1\r\nContent-Length: ten\r\n\r\n").await;
    assert_eq!(garbage.status_line, "HTTP/1.1 400 Bad Request");

    let put = request(server.addr, b"PUT /files/x HTTP/1.1\r\nContent-Length: 1\r\n\r\nx").await;
    assert_eq!(put.status_line, "HTTP/1.1 405 Method Not Allowed");

    let traversal = request(server.addr, b"GET /files/../secret HTTP/1.1\r\n\r\n").await;
    assert_eq!(traversal.status_line, "HTTP/1.1 400 Bad Request");

    server.stop().await;
}

#[tokio::test]
async fn test_unknown_path() {
    let server = TestServer::start("unknown").await;

    let resp = request(server.addr, b"GET /unknown/path HTTP/1.1\r\n\r\n").await;
    assert_eq!(resp.status_line, "HTTP/1.1 404 Not Found");
    assert_eq!(resp.body, b"404 Not Found");

    server.stop().await;
}

#[tokio::test]
async fn test_malformed_request_closes_without_response() {
    let server = TestServer::start("malformed").await;

    assert!(send(server.addr, b"NONSENSE\r\n\r\n").await.is_empty());
    assert!(send(server.addr, b"GET / HTTP/1.1\r\nno colon here\r\n\r\n").await.is_empty());

    server.stop().await;
}

#[tokio::test]
async fn test_concurrent_uploads() {
    let server = TestServer::start("concurrent").await;
    let addr = server.addr;

    let uploads = (0..8).map(|i| {
        tokio::spawn(async move {
            let body = format!("contents of file {i}").repeat(50);
            let raw = format!(
                "POST /files/f{i}.txt HTTP/1.1\r\nContent-Length: {}\r\n\r\n{body}",
                body.len()
            );
            let resp = request(addr, raw.as_bytes()).await;
            assert_eq!(resp.status_line, "HTTP/1.1 201 Created");
            body
        })
    });

    let bodies: Vec<String> = join_all(uploads.collect()).await;

    for (i, body) in bodies.iter().enumerate() {
        let raw = format!("GET /files/f{i}.txt HTTP/1.1\r\n\r\n");
        let resp = request(addr, raw.as_bytes()).await;
        assert_eq!(resp.body, body.as_bytes());
    }

    server.stop().await;
}

async fn join_all(handles: Vec<JoinHandle<String>>) -> Vec<String> {
    let mut out = Vec::with_capacity(handles.len());
    for handle in handles {
        out.push(handle.await.unwrap());
    }
    out
}

#[tokio::test]
async fn test_connection_deadline_closes_idle_peer() {
    let server = TestServer::start_with("deadline", |cfg| {
        cfg.server.connection_timeout_ms = 100;
    })
    .await;

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream.write_all(b"GET / HTTP/1.1\r\n").await.unwrap();

    let mut out = Vec::new();
    let read = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut out)).await;

    assert!(read.is_ok(), "server should close the idle connection");
    assert!(out.is_empty());

    server.stop().await;
}

#[tokio::test]
async fn test_shutdown_cancels_stalled_connection() {
    let server = TestServer::start_with("drain", |cfg| {
        cfg.server.drain_timeout_ms = 50;
    })
    .await;

    let mut stalled = TcpStream::connect(server.addr).await.unwrap();
    stalled.write_all(b"GET / HTTP/1.1\r\n").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    tokio::time::timeout(Duration::from_secs(5), server.stop())
        .await
        .expect("shutdown should not wait on the stalled connection");

    let mut out = Vec::new();
    let _ = stalled.read_to_end(&mut out).await;
    assert!(out.is_empty());
}
