//! Tests for header-block scanning and response serialization

use terminus::http::headers::{find_header_end, first_line};
use terminus::http::response::{Response, StatusCode};

#[test]
fn test_terminator_found_only_when_complete() {
    let req = b"GET /ping HTTP/1.1\r\nHost: x\r\n\r\n";

    // No prefix of the request contains the terminator before it is
    // complete, however the stream is split into chunks.
    for cut in 0..req.len() {
        assert_eq!(find_header_end(&req[..cut]), None, "false positive at {cut}");
    }
    assert_eq!(find_header_end(req), Some(req.len() - 4));
}

#[test]
fn test_terminator_across_chunk_boundaries() {
    let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\ntrailing";
    let end = find_header_end(req).unwrap();

    // Accumulate in every possible two-chunk split; detection must fire
    // exactly once the accumulated bytes include the full terminator.
    for split in 0..req.len() {
        let mut acc = Vec::new();
        acc.extend_from_slice(&req[..split]);
        let before = find_header_end(&acc);
        assert_eq!(before.is_some(), split >= end + 4);

        acc.extend_from_slice(&req[split..]);
        assert_eq!(find_header_end(&acc), Some(end));
    }
}

#[test]
fn test_first_line() {
    assert_eq!(
        first_line("GET /ping HTTP/1.1\r\nHost: x\r\n\r\n"),
        "GET /ping HTTP/1.1"
    );
    assert_eq!(first_line(""), "<no request line>");
}

#[test]
fn test_hello_response_shape() {
    let resp = Response::hello("api-tls", true, "GET /ping HTTP/1.1");
    let bytes = resp.to_bytes();
    let text = String::from_utf8(bytes).unwrap();

    assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(text.contains("Content-Type: text/plain; charset=utf-8\r\n"));
    assert!(text.contains("Connection: close\r\n"));
    assert!(text.contains("Hello TLS!"));
    assert!(text.contains("server=api-tls"));
    assert!(text.contains("You said: GET /ping HTTP/1.1"));
}

#[test]
fn test_plain_hello_response() {
    let resp = Response::hello("api-http", false, "GET / HTTP/1.1");
    let text = String::from_utf8(resp.to_bytes()).unwrap();
    assert!(text.contains("Hello HTTP!"));
    assert!(text.contains("server=api-http"));
}

#[test]
fn test_content_length_matches_body() {
    let resp = Response::hello("api-tls", true, "GET /ping HTTP/1.1");
    let expected = resp.body.len();
    let text = String::from_utf8(resp.to_bytes()).unwrap();

    let (headers, body) = text.split_once("\r\n\r\n").unwrap();
    assert_eq!(body.len(), expected);
    let declared: usize = headers
        .lines()
        .find_map(|l| l.strip_prefix("Content-Length: "))
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(declared, expected);
}

#[test]
fn test_status_codes() {
    assert_eq!(StatusCode::Ok.as_u16(), 200);
    assert_eq!(StatusCode::Ok.reason_phrase(), "OK");
    assert_eq!(StatusCode::BadRequest.as_u16(), 400);
    assert_eq!(StatusCode::InternalServerError.as_u16(), 500);
}
