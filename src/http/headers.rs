//! Header-block scanning.

/// Maximum accumulated header-block size before the connection is aborted.
///
/// Matches the request data limit of the companion static file server.
pub const MAX_HEADER_BLOCK_BYTES: usize = 32 * 1024;

/// Position of the `\r\n\r\n` header terminator, if present.
pub fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// First line of the request text, e.g. `GET /ping HTTP/1.1`.
pub fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("<no request line>")
}
