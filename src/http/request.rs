use bytes::{Bytes, BytesMut};
use std::collections::HashMap;
use std::fmt;
use tokio::io::{AsyncBufRead, AsyncReadExt, Take};

/// Upper bound on the buffer reserved up front for a body.
const MAX_BODY_PREALLOC: u64 = 64 * 1024;

/// HTTP request methods.
///
/// Any token outside the common set is kept verbatim as `Extension`, so an
/// unknown method still routes and can be answered with 405 where relevant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    /// GET - Retrieve a resource
    GET,
    /// POST - Create or submit data
    POST,
    /// PUT - Replace a resource
    PUT,
    /// DELETE - Delete a resource
    DELETE,
    /// HEAD - Like GET but without the response body
    HEAD,
    /// OPTIONS - Describe communication options
    OPTIONS,
    /// PATCH - Partial modification of a resource
    PATCH,
    /// Any other method token
    Extension(String),
}

impl Method {
    /// Parses an HTTP method token (case-sensitive).
    ///
    /// # Example
    ///
    /// ```
    /// # use ember::http::request::Method;
    /// assert_eq!(Method::parse("GET"), Method::GET);
    /// assert_eq!(Method::parse("get"), Method::Extension("get".to_string()));
    /// ```
    pub fn parse(token: &str) -> Self {
        match token {
            "GET" => Method::GET,
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            "DELETE" => Method::DELETE,
            "HEAD" => Method::HEAD,
            "OPTIONS" => Method::OPTIONS,
            "PATCH" => Method::PATCH,
            other => Method::Extension(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::HEAD => "HEAD",
            Method::OPTIONS => "OPTIONS",
            Method::PATCH => "PATCH",
            Method::Extension(token) => token,
        }
    }

    /// Whether a request with this method conventionally carries a body.
    pub fn expects_body(&self) -> bool {
        matches!(self, Method::POST | Method::PUT)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `Content-Length` was present but is not a non-negative integer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid Content-Length: {0:?}")]
pub struct InvalidContentLength(pub String);

#[derive(Debug, thiserror::Error)]
pub enum BodyError {
    #[error("body truncated: expected {expected} bytes, received {received}")]
    Truncated { expected: u64, received: u64 },

    #[error("failed to read body: {0}")]
    Io(#[from] std::io::Error),
}

/// Request body as a read view over the connection, bounded to the declared
/// `Content-Length`.
pub struct Body<'r> {
    reader: Take<&'r mut (dyn AsyncBufRead + Send + Unpin)>,
    declared: u64,
}

impl<'r> Body<'r> {
    pub fn new(source: &'r mut (dyn AsyncBufRead + Send + Unpin), len: u64) -> Self {
        Self {
            reader: source.take(len),
            declared: len,
        }
    }

    /// The length declared by `Content-Length`.
    pub fn declared_len(&self) -> u64 {
        self.declared
    }

    /// Reads the whole body. Fails if the peer sends fewer bytes than declared.
    pub async fn read_to_end(mut self) -> Result<Bytes, BodyError> {
        let mut buf = BytesMut::with_capacity(self.declared.min(MAX_BODY_PREALLOC) as usize);

        loop {
            let n = self.reader.read_buf(&mut buf).await?;
            if n == 0 {
                break;
            }
        }

        let received = buf.len() as u64;
        if received < self.declared {
            return Err(BodyError::Truncated {
                expected: self.declared,
                received,
            });
        }

        Ok(buf.freeze())
    }
}

impl fmt::Debug for Body<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body")
            .field("declared", &self.declared)
            .field("remaining", &self.reader.limit())
            .finish()
    }
}

/// A parsed HTTP request.
///
/// `path` is the origin-form target exactly as sent, without decoding.
/// Header names are case-sensitive and the last duplicate wins. `body` is
/// present only for POST/PUT requests with a valid `Content-Length`.
#[derive(Debug)]
pub struct Request<'r> {
    /// The HTTP method (GET, POST, etc.)
    pub method: Method,
    /// The request target as sent (e.g., "/echo/abc")
    pub path: String,
    /// HTTP version token, when the request line carried one
    pub version: Option<String>,
    /// Request headers with trimmed names and values
    pub headers: HashMap<String, String>,
    /// Bounded body stream
    pub body: Option<Body<'r>>,
}

/// Builder for constructing body-less Request objects.
#[derive(Debug, Default)]
pub struct RequestBuilder {
    method: Option<Method>,
    path: Option<String>,
    version: Option<String>,
    headers: HashMap<String, String>,
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Result<Request<'static>, &'static str> {
        Ok(Request {
            method: self.method.ok_or("method missing")?,
            path: self.path.ok_or("path missing")?,
            version: self.version,
            headers: self.headers,
            body: None,
        })
    }
}

impl Request<'_> {
    /// Retrieves a header value by its exact name.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(|v| v.as_str())
    }

    /// Interprets the `Content-Length` header.
    ///
    /// `Ok(None)` when the header is absent; an error when it is present but
    /// negative or not a number.
    pub fn content_length(&self) -> Result<Option<u64>, InvalidContentLength> {
        match self.header("Content-Length") {
            None => Ok(None),
            Some(raw) => raw
                .parse::<u64>()
                .map(Some)
                .map_err(|_| InvalidContentLength(raw.to_string())),
        }
    }
}
