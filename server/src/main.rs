use clap::Parser;
use log::info;
use server::config::ServerConfig;
use server::network::Server;
use server::service::GameService;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let config = ServerConfig::parse();
    let settings = config.settings()?;

    info!(
        "Turn clock {}s, long poll {}s, k-factor {}, {} friend pair(s)",
        settings.turn_timeout.as_secs(),
        settings.long_poll_timeout.as_secs(),
        settings.k_factor,
        settings.friends.len()
    );

    let service = Arc::new(GameService::new(settings));
    let server = Server::bind(&config.address(), service).await?;

    tokio::select! {
        _ = server.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
