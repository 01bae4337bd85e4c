use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::config::Config;
use crate::http::encoding::ContentCoding;
use crate::http::parser::{ParseError, parse_request};
use crate::http::reader::WireReader;
use crate::http::writer::ResponseWriter;
use crate::routes::Route;
use crate::routes::files::FileStore;

/// One accepted connection, serving exactly one request.
pub struct Connection<S> {
    reader: WireReader<S>,
    config: Arc<Config>,
    state: ConnectionState,
}

pub enum ConnectionState {
    /// Parsing the request and routing it to a handler
    Reading,
    Writing(ResponseWriter),
    Closed,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S, config: Arc<Config>) -> Self {
        Self {
            reader: WireReader::new(stream),
            config,
            state: ConnectionState::Reading,
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            match &mut self.state {
                ConnectionState::Reading => {
                    self.state = match self.read_and_route().await {
                        Some(writer) => ConnectionState::Writing(writer),
                        None => ConnectionState::Closed,
                    };
                }

                ConnectionState::Writing(writer) => {
                    let stream = self.reader.get_mut();
                    writer.write_to_stream(stream).await?;
                    debug!(status = writer.status().as_u16(), "response sent");

                    if let Err(e) = stream.shutdown().await {
                        debug!(error = %e, "failed to shut down connection");
                    }
                    self.state = ConnectionState::Closed;
                }

                ConnectionState::Closed => {
                    break;
                }
            }
        }

        Ok(())
    }

    /// Parses one request and produces the framed response for it.
    ///
    /// Returns `None` when the request could not be parsed; the connection
    /// is then closed without a response.
    async fn read_and_route(&mut self) -> Option<ResponseWriter> {
        let mut request = match parse_request(&mut self.reader).await {
            Ok(request) => request,
            Err(ParseError::ConnectionClosed) => {
                debug!("peer closed connection before a complete request");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "closing connection on unparseable request");
                return None;
            }
        };

        let coding = ContentCoding::negotiate(request.header("Accept-Encoding"));
        let route = Route::resolve(&request.method, &request.path);
        debug!(method = %request.method, path = %request.path, ?route, ?coding, "routing request");

        let files = FileStore::new(&self.config.files.directory);
        let response = route.dispatch(&mut request, &files).await;

        Some(ResponseWriter::new(response, coding))
    }
}
