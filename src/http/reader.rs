use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};

use crate::http::parser::ParseError;
use crate::http::request::Body;

/// Longest accepted line, terminator excluded.
pub const MAX_LINE_LEN: usize = 8 * 1024;

const READ_BUFFER_CAPACITY: usize = 4096;

/// Buffered reader over one accepted connection.
///
/// The underlying stream stays reachable through [`WireReader::get_mut`] so
/// the response can be written back on the same connection.
#[derive(Debug)]
pub struct WireReader<S> {
    inner: BufReader<S>,
}

impl<S> WireReader<S>
where
    S: AsyncRead + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        Self {
            inner: BufReader::with_capacity(READ_BUFFER_CAPACITY, stream),
        }
    }

    /// Reads one `\n`-terminated line and strips `\n` or `\r\n`.
    pub async fn read_line(&mut self) -> Result<String, ParseError> {
        // Room for the longest line plus CRLF.
        let limit = (MAX_LINE_LEN + 2) as u64;
        let mut line = Vec::new();

        (&mut self.inner)
            .take(limit)
            .read_until(b'\n', &mut line)
            .await?;

        if line.last() != Some(&b'\n') {
            if line.len() as u64 >= limit {
                return Err(ParseError::LineTooLong);
            }
            return Err(ParseError::ConnectionClosed);
        }

        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        if line.len() > MAX_LINE_LEN {
            return Err(ParseError::LineTooLong);
        }

        String::from_utf8(line).map_err(|_| ParseError::InvalidUtf8)
    }

    /// Returns a body stream limited to exactly `len` more bytes.
    pub fn bounded(&mut self, len: u64) -> Body<'_> {
        let source: &mut (dyn AsyncBufRead + Send + Unpin) = &mut self.inner;
        Body::new(source, len)
    }

    pub fn get_mut(&mut self) -> &mut S {
        self.inner.get_mut()
    }
}
