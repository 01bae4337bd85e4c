use crate::http::reader::WireReader;
use crate::http::request::{Body, Method, Request};
use std::collections::HashMap;
use tokio::io::AsyncRead;

/// Most header lines accepted before the blank line.
pub const MAX_HEADERS: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("connection read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection closed before a complete line")]
    ConnectionClosed,

    #[error("malformed request line: {0:?}")]
    MalformedRequestLine(String),

    #[error("malformed header line: {0:?}")]
    MalformedHeader(String),

    #[error("request is not valid UTF-8")]
    InvalidUtf8,

    #[error("line exceeds the maximum length")]
    LineTooLong,

    #[error("too many header lines")]
    TooManyHeaders,
}

/// Everything before the body.
#[derive(Debug)]
struct RequestHead {
    method: Method,
    path: String,
    version: Option<String>,
    headers: HashMap<String, String>,
    /// Header lines seen so far, duplicates included.
    header_lines: usize,
}

impl RequestHead {
    /// Body length to attach, if the method carries one and the declared
    /// length is usable. Invalid lengths are left for the handler to reject.
    fn body_len(&self) -> Option<u64> {
        if !self.method.expects_body() {
            return None;
        }
        self.headers
            .get("Content-Length")
            .and_then(|v| v.parse::<u64>().ok())
    }

    fn into_request<'r>(self, body: Option<Body<'r>>) -> Request<'r> {
        Request {
            method: self.method,
            path: self.path,
            version: self.version,
            headers: self.headers,
            body,
        }
    }
}

#[derive(Debug)]
enum ParseState {
    RequestLine,
    Headers(RequestHead),
    Body(RequestHead),
}

/// Reads one request from the connection.
///
/// The returned request borrows the reader when it carries a body, so the
/// body must be consumed (or the request dropped) before the reader is used
/// again.
pub async fn parse_request<S>(reader: &mut WireReader<S>) -> Result<Request<'_>, ParseError>
where
    S: AsyncRead + Unpin + Send,
{
    let mut state = ParseState::RequestLine;

    loop {
        state = match state {
            ParseState::RequestLine => {
                let line = reader.read_line().await?;
                ParseState::Headers(parse_request_line(&line)?)
            }

            ParseState::Headers(mut head) => {
                let line = reader.read_line().await?;
                if line.trim().is_empty() {
                    ParseState::Body(head)
                } else {
                    if head.header_lines >= MAX_HEADERS {
                        return Err(ParseError::TooManyHeaders);
                    }
                    head.header_lines += 1;
                    let (key, value) = parse_header_line(&line)?;
                    head.headers.insert(key, value);
                    ParseState::Headers(head)
                }
            }

            ParseState::Body(head) => {
                let body = head.body_len().map(|len| reader.bounded(len));
                return Ok(head.into_request(body));
            }
        };
    }
}

/// Splits the trimmed request line on single spaces.
///
/// Needs at least a method and a path; a third token is kept as the version.
fn parse_request_line(line: &str) -> Result<RequestHead, ParseError> {
    let mut parts = line.trim().split(' ');

    let method = parts.next().filter(|m| !m.is_empty());
    let path = parts.next();

    match (method, path) {
        (Some(method), Some(path)) => Ok(RequestHead {
            method: Method::parse(method),
            path: path.to_string(),
            version: parts.next().map(str::to_string),
            headers: HashMap::new(),
            header_lines: 0,
        }),
        _ => Err(ParseError::MalformedRequestLine(line.to_string())),
    }
}

/// Splits on the first colon and trims both sides.
fn parse_header_line(line: &str) -> Result<(String, String), ParseError> {
    let (key, value) = line
        .split_once(':')
        .ok_or_else(|| ParseError::MalformedHeader(line.to_string()))?;

    Ok((key.trim().to_string(), value.trim().to_string()))
}
