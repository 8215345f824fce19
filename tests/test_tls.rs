//! Tests for the TLS server end to end

mod common;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rustls::ClientConfig;
use terminus::server::events::ServerOutcome;
use terminus::server::registry::{Registry, StartOutcome};
use tokio::io::AsyncWriteExt;

use common::{client_config, plain_spec, tls_request, tls_spec, write_test_bundle};

const REQUEST: &[u8] = b"GET /ping HTTP/1.1\r\nHost: x\r\n\r\n";

fn started_addr(outcome: StartOutcome) -> SocketAddr {
    match outcome {
        StartOutcome::Started(addr) => addr,
        StartOutcome::AlreadyRunning => panic!("server was already running"),
    }
}

async fn request_over_tls(
    addr: SocketAddr,
    config: Arc<ClientConfig>,
    request: Vec<u8>,
) -> std::io::Result<String> {
    tokio::task::spawn_blocking(move || tls_request(addr, config, &request))
        .await
        .unwrap()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}

#[tokio::test]
async fn test_tls_scenario() {
    let bundle = write_test_bundle();
    let registry = Registry::new();
    let addr = started_addr(registry.start(tls_spec("api-tls", &bundle)).await.unwrap());

    let config = client_config(&bundle.cert);
    let response = request_over_tls(addr, config, REQUEST.to_vec()).await.unwrap();

    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.contains("Connection: close\r\n"));
    assert!(response.contains("Hello TLS!"));
    assert!(response.contains("api-tls"));
    assert!(response.contains("GET /ping HTTP/1.1"));

    registry.stop("api-tls");
}

#[tokio::test]
async fn test_large_header_block_round_trip() {
    let bundle = write_test_bundle();
    let registry = Registry::new();
    let addr = started_addr(registry.start(tls_spec("api-big", &bundle)).await.unwrap());

    // A first line far larger than one TLS record, so both the read side
    // (multi-record reassembly) and the write side (multi-record echo)
    // must pump more than once.
    let path: String = std::iter::repeat('a').take(20_000).collect();
    let request = format!("GET /{path} HTTP/1.1\r\nHost: x\r\n\r\n").into_bytes();
    let first_line = format!("GET /{path} HTTP/1.1");

    let config = client_config(&bundle.cert);
    let response = request_over_tls(addr, config, request).await.unwrap();

    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.contains(&first_line));

    registry.stop("api-big");
}

#[tokio::test]
async fn test_abrupt_close_before_handshake() {
    let bundle = write_test_bundle();
    let registry = Registry::new();
    let addr = started_addr(registry.start(tls_spec("api-abrupt", &bundle)).await.unwrap());

    // Open a raw TCP connection and close it without a single TLS byte.
    let socket = tokio::net::TcpStream::connect(addr).await.unwrap();
    drop(socket);
    tokio::time::sleep(Duration::from_millis(50)).await;

    // The accept loop must survive and serve the next connection.
    let config = client_config(&bundle.cert);
    let response = request_over_tls(addr, config, REQUEST.to_vec()).await.unwrap();
    assert!(response.contains("server=api-abrupt"));

    registry.stop("api-abrupt");
}

#[tokio::test]
async fn test_garbage_bytes_abort_only_that_connection() {
    let bundle = write_test_bundle();
    let registry = Registry::new();
    let addr = started_addr(registry.start(tls_spec("api-garbage", &bundle)).await.unwrap());

    let mut socket = tokio::net::TcpStream::connect(addr).await.unwrap();
    let _ = socket.write_all(b"this is not a tls client hello\r\n\r\n").await;
    drop(socket);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let config = client_config(&bundle.cert);
    let response = request_over_tls(addr, config, REQUEST.to_vec()).await.unwrap();
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));

    registry.stop("api-garbage");
}

#[tokio::test]
async fn test_tls_and_plain_servers_are_isolated() {
    let bundle = write_test_bundle();
    let registry = Registry::new();
    let tls_addr = started_addr(registry.start(tls_spec("iso-tls", &bundle)).await.unwrap());
    let plain_addr = started_addr(registry.start(plain_spec("iso-plain")).await.unwrap());

    // Abort a handshake on the TLS server.
    let socket = tokio::net::TcpStream::connect(tls_addr).await.unwrap();
    drop(socket);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let config = client_config(&bundle.cert);
    let tls_response = request_over_tls(tls_addr, config, REQUEST.to_vec()).await.unwrap();
    assert!(tls_response.contains("server=iso-tls"));

    let mut plain = tokio::net::TcpStream::connect(plain_addr).await.unwrap();
    plain.write_all(REQUEST).await.unwrap();
    let mut response = Vec::new();
    tokio::io::AsyncReadExt::read_to_end(&mut plain, &mut response).await.unwrap();
    assert!(String::from_utf8_lossy(&response).contains("server=iso-plain"));

    registry.stop_all();
}

#[tokio::test]
async fn test_missing_bundle_fails_start() {
    let (registry, mut events) = Registry::channel();

    let mut spec = plain_spec("broken");
    spec.tls = Some(terminus::config::TlsConfig {
        bundle: "/nonexistent/bundle.pem".into(),
        passphrase: None,
        require_client_auth: false,
        client_ca: None,
        protocols: vec!["TLSv1.3".to_string()],
    });

    assert!(registry.start(spec).await.is_err());
    assert!(!registry.is_running("broken"));

    match events.try_recv().unwrap() {
        ServerOutcome::Failed { id, .. } => assert_eq!(id, "broken"),
        other => panic!("expected Failed outcome, got {other:?}"),
    }
}

#[tokio::test]
async fn test_passphrase_is_rejected() {
    let bundle = write_test_bundle();
    let registry = Registry::new();

    let mut spec = tls_spec("sealed", &bundle);
    spec.tls.as_mut().unwrap().passphrase = Some("secret".to_string());

    let err = registry.start(spec).await.unwrap_err();
    assert!(format!("{err:#}").contains("not supported"));
    assert!(!registry.is_running("sealed"));
}
