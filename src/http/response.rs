use bytes::Bytes;

/// HTTP status codes used by the server.
///
/// - `Ok` (200): Request successful
/// - `Created` (201): File stored
/// - `BadRequest` (400): Malformed Content-Length or file name
/// - `NotFound` (404): Unknown route or missing file
/// - `MethodNotAllowed` (405): Unsupported method on `/files/`
/// - `LengthRequired` (411): Upload without Content-Length
/// - `InternalServerError` (500): File or compression failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 201 Created
    Created,
    /// 400 Bad Request
    BadRequest,
    /// 404 Not Found
    NotFound,
    /// 405 Method Not Allowed
    MethodNotAllowed,
    /// 411 Length Required
    LengthRequired,
    /// 500 Internal Server Error
    InternalServerError,
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use ember::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::LengthRequired.as_u16(), 411);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::Created => 201,
            StatusCode::BadRequest => 400,
            StatusCode::NotFound => 404,
            StatusCode::MethodNotAllowed => 405,
            StatusCode::LengthRequired => 411,
            StatusCode::InternalServerError => 500,
        }
    }

    /// Returns the standard HTTP reason phrase for this status code.
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::Created => "Created",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::NotFound => "Not Found",
            StatusCode::MethodNotAllowed => "Method Not Allowed",
            StatusCode::LengthRequired => "Length Required",
            StatusCode::InternalServerError => "Internal Server Error",
        }
    }
}

pub const TEXT_PLAIN: &str = "text/plain";
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Represents an HTTP response before framing.
///
/// `Content-Length` and `Content-Encoding` are not stored here; the writer
/// derives them from the body it actually sends.
#[derive(Debug, Clone)]
pub struct Response {
    /// The HTTP status code
    pub status: StatusCode,
    /// Headers in the order they are written
    pub headers: Vec<(String, String)>,
    /// Response body as bytes
    pub body: Bytes,
    /// Whether the body may be gzip-compressed when the client accepts it
    pub compressible: bool,
}

/// Builder for constructing HTTP responses in a fluent style.
///
/// # Example
///
/// ```
/// # use ember::http::response::{ResponseBuilder, StatusCode};
/// let response = ResponseBuilder::new(StatusCode::Ok)
///     .header("Content-Type", "text/plain")
///     .body("hi")
///     .compressible(true)
///     .build();
/// assert_eq!(response.header("Content-Type"), Some("text/plain"));
/// ```
#[derive(Debug)]
pub struct ResponseBuilder {
    status: StatusCode,
    headers: Vec<(String, String)>,
    body: Bytes,
    compressible: bool,
}

impl ResponseBuilder {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
            compressible: false,
        }
    }

    /// Adds a header, replacing an earlier one with the same name in place.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.headers.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.headers.push((key, value)),
        }
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn compressible(mut self, compressible: bool) -> Self {
        self.compressible = compressible;
        self
    }

    pub fn build(self) -> Response {
        Response {
            status: self.status,
            headers: self.headers,
            body: self.body,
            compressible: self.compressible,
        }
    }
}

impl Response {
    /// 200 OK with a plain-text body eligible for compression.
    pub fn text(body: impl Into<Bytes>) -> Self {
        ResponseBuilder::new(StatusCode::Ok)
            .header("Content-Type", TEXT_PLAIN)
            .body(body)
            .compressible(true)
            .build()
    }

    /// 200 OK carrying raw file bytes, eligible for compression.
    pub fn octet_stream(body: impl Into<Bytes>) -> Self {
        ResponseBuilder::new(StatusCode::Ok)
            .header("Content-Type", OCTET_STREAM)
            .body(body)
            .compressible(true)
            .build()
    }

    /// 201 Created confirming a stored upload. Never compressed.
    pub fn created() -> Self {
        ResponseBuilder::new(StatusCode::Created)
            .header("Content-Type", TEXT_PLAIN)
            .body("201 Created Successfully")
            .build()
    }

    /// Plain-text error such as `404 Not Found`. Never compressed.
    pub fn error(status: StatusCode) -> Self {
        let body = format!("{} {}", status.as_u16(), status.reason_phrase());
        ResponseBuilder::new(status)
            .header("Content-Type", TEXT_PLAIN)
            .body(body)
            .build()
    }

    pub fn not_found() -> Self {
        Self::error(StatusCode::NotFound)
    }

    pub fn internal_error() -> Self {
        Self::error(StatusCode::InternalServerError)
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}
