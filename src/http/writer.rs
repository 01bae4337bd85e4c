use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::error;

use crate::http::encoding::ContentCoding;
use crate::http::response::{Response, StatusCode};

const HTTP_VERSION: &str = "HTTP/1.1";

/// Serializes the status line, headers and blank line.
///
/// Headers go out in response order, followed by `Content-Encoding` when a
/// coding was applied and finally `Content-Length` for `body_len`.
fn serialize_head(resp: &Response, coding: ContentCoding, body_len: usize) -> Vec<u8> {
    let mut buf = Vec::with_capacity(128);

    // Status line
    let status_line = format!(
        "{} {} {}\r\n",
        HTTP_VERSION,
        resp.status.as_u16(),
        resp.status.reason_phrase()
    );
    buf.extend_from_slice(status_line.as_bytes());

    let framing = ["Content-Length", "Content-Encoding"];
    for (k, v) in resp.headers.iter().filter(|(k, _)| !framing.contains(&k.as_str())) {
        push_header(&mut buf, k, v);
    }

    if let Some(value) = coding.header_value() {
        push_header(&mut buf, "Content-Encoding", value);
    }
    push_header(&mut buf, "Content-Length", &body_len.to_string());

    // Header/body separator
    buf.extend_from_slice(b"\r\n");

    buf
}

fn push_header(buf: &mut Vec<u8>, key: &str, value: &str) {
    buf.extend_from_slice(key.as_bytes());
    buf.extend_from_slice(b": ");
    buf.extend_from_slice(value.as_bytes());
    buf.extend_from_slice(b"\r\n");
}

/// A response framed and ready to be written.
///
/// Compression happens here, before `Content-Length` is computed, so the
/// header always matches the bytes on the wire.
#[derive(Debug)]
pub struct ResponseWriter {
    status: StatusCode,
    head: Vec<u8>,
    body: Bytes,
}

impl ResponseWriter {
    /// Frames `response`, applying `coding` only if the response allows it.
    ///
    /// A compression failure replaces the response with a plain 500.
    pub fn new(response: Response, coding: ContentCoding) -> Self {
        let coding = if response.compressible {
            coding
        } else {
            ContentCoding::Identity
        };

        match coding.encode(&response.body) {
            Ok(body) => Self::framed(&response, coding, body),
            Err(e) => {
                error!(error = %e, "failed to compress response body");
                let fallback = Response::internal_error();
                let body = fallback.body.clone();
                Self::framed(&fallback, ContentCoding::Identity, body)
            }
        }
    }

    fn framed(response: &Response, coding: ContentCoding, body: Bytes) -> Self {
        Self {
            status: response.status,
            head: serialize_head(response, coding, body.len()),
            body,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Status line and headers, including the terminating blank line.
    pub fn head(&self) -> &[u8] {
        &self.head
    }

    /// Body bytes exactly as they will be sent.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Writes head then body. A failure part-way leaves the response
    /// truncated; nothing is retried.
    pub async fn write_to_stream<W>(&self, stream: &mut W) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        stream.write_all(&self.head).await?;
        stream.write_all(&self.body).await?;
        stream.flush().await
    }
}
