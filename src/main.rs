use harbor::config::Config;
use harbor::server::Server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let cfg = Config::load();

    let mut server = Server::with_runtime(tokio::runtime::Handle::current(), cfg.listen_port);
    server.set_timeout_duration(cfg.idle_timeout);
    if std::path::Path::new(&cfg.static_dir).is_dir() {
        server.configure_static(&cfg.static_prefix, &cfg.static_dir);
    }

    server.start()?;
    tracing::info!(port = server.port(), "harbor running");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    server.stop().await;

    Ok(())
}
