use log::debug;
use rand::Rng;
use shared::frame::{read_packet, write_packet, FrameError};
use shared::{
    AccountSummary, ChallengeStatus, ErrorKind, Identity, InviteSummary, Packet, QueueStatus,
    RoomSnapshot,
};
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::sleep;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection failed: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("{message}")]
    Server { kind: ErrorKind, message: String },
    #[error("server answered {got} to {sent}")]
    Unexpected {
        sent: &'static str,
        got: &'static str,
    },
    #[error("not in a room, use create, join, train or queue first")]
    NoRoom,
    #[error("background request stopped: {0}")]
    Task(#[from] JoinError),
}

impl ClientError {
    /// The server's classification, if the server rejected the request.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ClientError::Server { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Fresh per-process player id.
pub fn random_player_id() -> String {
    format!("p-{:016x}", rand::thread_rng().gen::<u64>())
}

/// Request/response client. Every call opens its own connection.
#[derive(Debug, Clone)]
pub struct Client {
    server_addr: String,
    identity: Identity,
    fake_ping_ms: u64,
}

impl Client {
    pub fn new(server_addr: impl Into<String>, identity: Identity) -> Self {
        Self {
            server_addr: server_addr.into(),
            identity,
            fake_ping_ms: 0,
        }
    }

    /// Adds artificial round-trip latency to every request.
    pub fn with_fake_ping(mut self, fake_ping_ms: u64) -> Self {
        self.fake_ping_ms = fake_ping_ms;
        self
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Sends one packet and returns the answer. Error packets become
    /// `ClientError::Server`.
    pub async fn request(&self, packet: &Packet) -> Result<Packet, ClientError> {
        if self.fake_ping_ms > 0 {
            sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
        }

        let mut stream = TcpStream::connect(&self.server_addr).await?;
        write_packet(&mut stream, packet).await?;
        let response = read_packet(&mut stream).await?;
        debug!("{} -> {}", packet.name(), response.name());

        if self.fake_ping_ms > 0 {
            sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
        }

        match response {
            Packet::Error { kind, message } => Err(ClientError::Server { kind, message }),
            response => Ok(response),
        }
    }

    fn unexpected(sent: &Packet, got: &Packet) -> ClientError {
        ClientError::Unexpected {
            sent: sent.name(),
            got: got.name(),
        }
    }

    async fn room(&self, packet: Packet) -> Result<RoomSnapshot, ClientError> {
        match self.request(&packet).await? {
            Packet::Room(snapshot) => Ok(snapshot),
            other => Err(Self::unexpected(&packet, &other)),
        }
    }

    async fn queue(&self, packet: Packet) -> Result<QueueStatus, ClientError> {
        match self.request(&packet).await? {
            Packet::Queue(status) => Ok(status),
            other => Err(Self::unexpected(&packet, &other)),
        }
    }

    async fn challenge(&self, packet: Packet) -> Result<ChallengeStatus, ClientError> {
        match self.request(&packet).await? {
            Packet::Challenge(status) => Ok(status),
            other => Err(Self::unexpected(&packet, &other)),
        }
    }

    async fn ack(&self, packet: Packet) -> Result<(), ClientError> {
        match self.request(&packet).await? {
            Packet::Ack => Ok(()),
            other => Err(Self::unexpected(&packet, &other)),
        }
    }

    pub async fn create_room(&self) -> Result<RoomSnapshot, ClientError> {
        self.room(Packet::CreateRoom {
            identity: self.identity.clone(),
        })
        .await
    }

    pub async fn join_room(&self, code: &str) -> Result<RoomSnapshot, ClientError> {
        self.room(Packet::JoinRoom {
            identity: self.identity.clone(),
            code: code.to_string(),
        })
        .await
    }

    pub async fn start_training(&self, level: u8) -> Result<RoomSnapshot, ClientError> {
        self.room(Packet::StartTraining {
            identity: self.identity.clone(),
            level,
        })
        .await
    }

    pub async fn play(&self, code: &str, column: usize) -> Result<RoomSnapshot, ClientError> {
        self.room(Packet::Play {
            identity: self.identity.clone(),
            code: code.to_string(),
            column,
        })
        .await
    }

    /// Reads a room. With `long_poll`, the server holds the answer until the
    /// room moves past `since` or its wait times out.
    pub async fn read_room(
        &self,
        code: &str,
        since: Option<u64>,
        long_poll: bool,
    ) -> Result<RoomSnapshot, ClientError> {
        self.room(Packet::ReadRoom {
            identity: self.identity.clone(),
            code: code.to_string(),
            since,
            long_poll,
        })
        .await
    }

    pub async fn rematch(&self, code: &str) -> Result<RoomSnapshot, ClientError> {
        self.room(Packet::Rematch {
            identity: self.identity.clone(),
            code: code.to_string(),
        })
        .await
    }

    pub async fn join_matchmaking(&self) -> Result<QueueStatus, ClientError> {
        self.queue(Packet::JoinMatchmaking {
            identity: self.identity.clone(),
        })
        .await
    }

    pub async fn poll_matchmaking(&self, ticket: &str) -> Result<QueueStatus, ClientError> {
        self.queue(Packet::PollMatchmaking {
            ticket: ticket.to_string(),
        })
        .await
    }

    pub async fn leave_matchmaking(&self, ticket: &str) -> Result<(), ClientError> {
        self.ack(Packet::LeaveMatchmaking {
            identity: self.identity.clone(),
            ticket: ticket.to_string(),
        })
        .await
    }

    pub async fn send_challenge(&self, target: &str) -> Result<ChallengeStatus, ClientError> {
        self.challenge(Packet::SendChallenge {
            identity: self.identity.clone(),
            target: target.to_string(),
        })
        .await
    }

    pub async fn poll_challenge(&self, ticket: &str) -> Result<ChallengeStatus, ClientError> {
        self.challenge(Packet::PollChallenge {
            ticket: ticket.to_string(),
        })
        .await
    }

    pub async fn accept_challenge(&self, ticket: &str) -> Result<RoomSnapshot, ClientError> {
        self.room(Packet::AcceptChallenge {
            identity: self.identity.clone(),
            ticket: ticket.to_string(),
        })
        .await
    }

    pub async fn decline_challenge(&self, ticket: &str) -> Result<(), ClientError> {
        self.ack(Packet::DeclineChallenge {
            identity: self.identity.clone(),
            ticket: ticket.to_string(),
        })
        .await
    }

    pub async fn cancel_challenge(&self, ticket: &str) -> Result<(), ClientError> {
        self.ack(Packet::CancelChallenge {
            identity: self.identity.clone(),
            ticket: ticket.to_string(),
        })
        .await
    }

    pub async fn list_invites(&self) -> Result<Vec<InviteSummary>, ClientError> {
        let packet = Packet::ListInvites {
            identity: self.identity.clone(),
        };
        match self.request(&packet).await? {
            Packet::Invites(invites) => Ok(invites),
            other => Err(Self::unexpected(&packet, &other)),
        }
    }

    pub async fn leaderboard(&self, query: &str) -> Result<Vec<AccountSummary>, ClientError> {
        let packet = Packet::Leaderboard {
            query: query.to_string(),
        };
        match self.request(&packet).await? {
            Packet::Standings(rows) => Ok(rows),
            other => Err(Self::unexpected(&packet, &other)),
        }
    }

    pub async fn profile(&self, name: &str) -> Result<AccountSummary, ClientError> {
        let packet = Packet::Profile {
            name: name.to_string(),
        };
        match self.request(&packet).await? {
            Packet::Account(summary) => Ok(summary),
            other => Err(Self::unexpected(&packet, &other)),
        }
    }
}

/// A matchmaking poll running on its own task, so other requests made in
/// the meantime never cancel it. Dropping the watch aborts the poll.
#[derive(Debug)]
pub struct QueueWatch {
    ticket: String,
    handle: JoinHandle<Result<QueueStatus, ClientError>>,
}

impl QueueWatch {
    pub fn spawn(client: &Client, ticket: &str) -> Self {
        let client = client.clone();
        let ticket = ticket.to_string();
        let polled = ticket.clone();
        Self {
            ticket,
            handle: tokio::spawn(async move { client.poll_matchmaking(&polled).await }),
        }
    }

    pub fn ticket(&self) -> &str {
        &self.ticket
    }

    /// Waits for the poll's answer. Call at most once.
    pub async fn finished(&mut self) -> Result<QueueStatus, ClientError> {
        (&mut self.handle).await?
    }
}

impl Drop for QueueWatch {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
