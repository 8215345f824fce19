//! Minimal HTTP surface.
//!
//! This engine does not implement HTTP semantics. It extracts the header
//! block (terminated by two consecutive line breaks) and the first request
//! line, and serializes a fixed-shape response. No routing, no body
//! parsing, no keep-alive.
//!
//! - **`headers`**: header-block terminator scan and first-line extraction
//! - **`response`**: response representation and serialization

pub mod headers;
pub mod response;
