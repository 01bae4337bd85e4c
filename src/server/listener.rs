use anyhow::Context;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::config::Config;
use crate::http::connection::Connection;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Accepts connections and runs each one in its own task.
///
/// Shutdown is graceful: once the shutdown future resolves the listener is
/// dropped, in-flight connections get the drain timeout to finish, and any
/// still running after that are cancelled.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    config: Arc<Config>,
}

impl Server {
    pub async fn bind(config: Config) -> anyhow::Result<Self> {
        let addr = &config.server.listen_addr;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind to {addr}"))?;

        info!("Listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            config: Arc::new(config),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        let Server { listener, config } = self;
        let tracker = TaskTracker::new();
        let cancel = CancellationToken::new();

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, no longer accepting connections");
                    break;
                }

                accepted = listener.accept() => {
                    match accepted {
                        Ok((socket, peer)) => {
                            info!("Accepted connection from {}", peer);
                            let span = info_span!("conn", %peer);
                            tracker.spawn(
                                serve(socket, Arc::clone(&config), cancel.child_token())
                                    .instrument(span),
                            );
                        }
                        Err(e) => back_off_after_accept_error(&e).await,
                    }
                }
            }
        }

        drop(listener);
        tracker.close();

        let drain = config.server.drain_timeout();
        if timeout(drain, tracker.wait()).await.is_err() {
            warn!(
                remaining = tracker.len(),
                "drain timeout elapsed, cancelling open connections"
            );
            cancel.cancel();
            tracker.wait().await;
        }

        info!("Server stopped");
        Ok(())
    }
}

/// Persistent accept errors such as EMFILE would otherwise spin the loop.
async fn back_off_after_accept_error(error: &std::io::Error) {
    warn!(error = %error, "failed to accept connection");
    tokio::time::sleep(ACCEPT_BACKOFF).await;
}

/// Runs one connection under the configured deadline, abandoning it if the
/// token is cancelled first.
async fn serve(socket: TcpStream, config: Arc<Config>, cancel: CancellationToken) {
    let deadline = config.server.connection_timeout();
    let mut conn = Connection::new(socket, config);

    tokio::select! {
        res = timeout(deadline, conn.run()) => {
            match res {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Connection error: {}", e),
                Err(_) => warn!(?deadline, "connection deadline elapsed, closing"),
            }
        }

        _ = cancel.cancelled() => {
            debug!("connection cancelled by shutdown");
        }
    }
}

/// Binds using `cfg` and serves until Ctrl-C.
pub async fn run(cfg: Config) -> anyhow::Result<()> {
    let server = Server::bind(cfg).await?;

    server
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("Shutdown signal received");
        })
        .await
}
