//! Response content coding.
//!
//! Negotiation is deliberately narrow: the client must list the exact token
//! `gzip`. Quality values and other codings are not interpreted.

use bytes::Bytes;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::{self, Write};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentCoding {
    #[default]
    Identity,
    Gzip,
}

impl ContentCoding {
    /// Picks the coding for a response from the `Accept-Encoding` value.
    pub fn negotiate(accept_encoding: Option<&str>) -> Self {
        match accept_encoding {
            Some(value) if accepts_gzip(value) => ContentCoding::Gzip,
            _ => ContentCoding::Identity,
        }
    }

    /// Value for the `Content-Encoding` header, if any.
    pub fn header_value(&self) -> Option<&'static str> {
        match self {
            ContentCoding::Identity => None,
            ContentCoding::Gzip => Some("gzip"),
        }
    }

    pub fn encode(&self, body: &Bytes) -> io::Result<Bytes> {
        match self {
            ContentCoding::Identity => Ok(body.clone()),
            ContentCoding::Gzip => gzip(body).map(Bytes::from),
        }
    }
}

/// True when any comma-separated token equals `gzip` after trimming.
pub fn accepts_gzip(accept_encoding: &str) -> bool {
    accept_encoding.split(',').any(|token| token.trim() == "gzip")
}

pub fn gzip(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2 + 32), Compression::default());
    encoder.write_all(data)?;
    let out = encoder.finish()?;
    trace!(input = data.len(), output = out.len(), "gzip compressed body");
    Ok(out)
}
