use ember::config::Config;
use ember::server::listener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load()?;

    tracing::info!(
        directory = %cfg.files.directory.display(),
        listen = %cfg.server.listen_addr,
        "Starting ember"
    );

    listener::run(cfg).await
}
