//! HTTP protocol implementation.
//!
//! This module implements the HTTP/1.1 wire protocol for a single
//! request/response exchange per connection.
//!
//! # Architecture
//!
//! - **`reader`**: Buffered byte source with line and bounded-length reads
//! - **`parser`**: Request state machine producing a [`request::Request`]
//! - **`request`**: Request, method and body stream types
//! - **`encoding`**: `Accept-Encoding` negotiation and gzip compression
//! - **`response`**: Response representation with builder pattern
//! - **`writer`**: Frames a response and writes it to the client
//! - **`connection`**: Drives one connection from first byte to close
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌──────────────────────┐
//!        │  AwaitingRequestLine │
//!        └──────────┬───────────┘
//!                   ▼
//!        ┌──────────────────────┐
//!        │   AwaitingHeaders    │ ← until the blank line
//!        └──────────┬───────────┘
//!                   ▼
//!        ┌──────────────────────┐
//!        │    [AwaitingBody]    │ ← POST/PUT with Content-Length
//!        └──────────┬───────────┘
//!                   ▼
//!        ┌──────────────────────┐
//!        │       Routing        │
//!        └──────────┬───────────┘
//!                   ▼
//!        ┌──────────────────────┐
//!        │   WritingResponse    │
//!        └──────────┬───────────┘
//!                   ▼
//!                Closed
//! ```
//!
//! A parse or transport failure before routing goes straight to `Closed`
//! without writing anything.

pub mod connection;
pub mod encoding;
pub mod parser;
pub mod reader;
pub mod request;
pub mod response;
pub mod writer;
