//! TCP front end: one request frame in, one response frame out.

use crate::service::GameService;
use log::{debug, error, info, warn};
use shared::frame::{read_packet, write_packet, FrameError};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{interval, sleep, MissedTickBehavior};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Accepts connections and hands each request to the game service.
pub struct Server {
    listener: TcpListener,
    service: Arc<GameService>,
}

impl Server {
    pub async fn bind(addr: &str, service: Arc<GameService>) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, service })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Spawns the task that expires turn clocks and evicts idle state.
    fn spawn_sweeper(&self) {
        let service = Arc::clone(&self.service);
        let period = service.settings().sweep_interval;

        tokio::spawn(async move {
            let mut interval = interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;

            loop {
                interval.tick().await;
                service.sweep(Instant::now());
            }
        });
    }

    /// Main accept loop. Runs until the task is dropped.
    pub async fn run(self) {
        self.spawn_sweeper();
        match self.local_addr() {
            Ok(addr) => info!("Server listening on {}", addr),
            Err(_) => info!("Server started"),
        }

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let service = Arc::clone(&self.service);
                    tokio::spawn(async move {
                        match handle_connection(stream, peer, service).await {
                            Ok(()) => {}
                            Err(FrameError::Io(e)) => debug!("Connection {} dropped: {}", peer, e),
                            Err(e) => warn!("Bad request from {}: {}", peer, e),
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    sleep(ACCEPT_BACKOFF).await;
                }
            }
        }
    }
}

/// Serves a single request. Any byte or EOF from the peer while the request
/// is in flight cancels it.
async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    service: Arc<GameService>,
) -> Result<(), FrameError> {
    let (mut reader, mut writer) = stream.split();
    let request = read_packet(&mut reader).await?;
    let name = request.name();
    if request.is_response() {
        warn!("{} sent a {} packet as a request", peer, name);
    }
    debug!("{} <- {}", name, peer);

    let response = tokio::select! {
        response = service.handle(request) => response,
        _ = reader.read_u8() => {
            debug!("{} from {} cancelled", name, peer);
            return Ok(());
        }
    };

    debug!("{} -> {}", response.name(), peer);
    write_packet(&mut writer, &response).await
}
