//! Rules, search and wire protocol shared by the server and its clients.
//!
//! Nothing in this crate holds session state: the board engine and game state
//! machine are plain values, and the [`Packet`] enum describes every request a
//! client can make and every response the server can give.

pub mod ai;
pub mod board;
pub mod frame;
pub mod game;

use serde::{Deserialize, Serialize};

pub use ai::BotLevel;
pub use board::{Board, Cell, MoveError, COLS, CONNECT, ROWS};
pub use game::{Game, GameStatus};

/// Player id used for the bot seat of training rooms.
pub const BOT_PLAYER_ID: &str = "BOT";

/// Who is making a request: a transient per-browser id plus an optional
/// authenticated account name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub player_id: String,
    pub account: Option<String>,
}

impl Identity {
    pub fn guest(player_id: impl Into<String>) -> Self {
        Self {
            player_id: player_id.into(),
            account: None,
        }
    }

    pub fn with_account(player_id: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            player_id: player_id.into(),
            account: Some(account.into()),
        }
    }

    /// Case-insensitive account key, `None` for guests.
    pub fn account_key(&self) -> Option<String> {
        self.account
            .as_deref()
            .map(normalize_account)
            .filter(|name| !name.is_empty())
    }

    /// True if both identities belong to the same browser or the same account.
    pub fn same_person(&self, other: &Identity) -> bool {
        if self.player_id == other.player_id {
            return true;
        }
        match (self.account_key(), other.account_key()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    pub fn display_name(&self) -> String {
        match &self.account {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => "Guest".to_string(),
        }
    }
}

pub fn normalize_account(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Broad class of a rejected request, so clients know whether to fix the
/// input or refresh their view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidInput,
    Conflict,
    NotFound,
    Unauthorized,
}

/// Everything a client needs to draw a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub code: String,
    pub revision: u64,
    pub board: Board,
    pub next_player: Cell,
    pub status: GameStatus,
    pub names: [String; 2],
    /// Both seats are filled.
    pub ready: bool,
    /// Seat held by the requester, if any.
    pub seat: Option<usize>,
    pub can_play: bool,
    pub last_move: Option<(usize, usize)>,
    pub forfeit: Option<String>,
    pub rematch: [bool; 2],
    pub bot_level: Option<BotLevel>,
    pub random: bool,
    /// Seconds left on the turn clock, `None` when it is not running.
    pub seconds_left: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueStatus {
    Waiting {
        ticket: String,
        rating: i32,
        min_rating: i32,
        max_rating: i32,
    },
    Matched {
        code: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChallengeStatus {
    Pending { ticket: String, target: String },
    Accepted { code: String },
    Declined,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteSummary {
    pub ticket: String,
    pub from: String,
    pub age_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub name: String,
    pub rating: i32,
    pub games: u32,
    pub wins: u32,
    pub losses: u32,
}

/// One request or one response. Every connection carries exactly one of each.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Packet {
    CreateRoom {
        identity: Identity,
    },
    JoinRoom {
        identity: Identity,
        code: String,
    },
    StartTraining {
        identity: Identity,
        level: u8,
    },
    Play {
        identity: Identity,
        code: String,
        column: usize,
    },
    ReadRoom {
        identity: Identity,
        code: String,
        since: Option<u64>,
        long_poll: bool,
    },
    Rematch {
        identity: Identity,
        code: String,
    },
    JoinMatchmaking {
        identity: Identity,
    },
    PollMatchmaking {
        ticket: String,
    },
    LeaveMatchmaking {
        identity: Identity,
        ticket: String,
    },
    SendChallenge {
        identity: Identity,
        target: String,
    },
    PollChallenge {
        ticket: String,
    },
    AcceptChallenge {
        identity: Identity,
        ticket: String,
    },
    DeclineChallenge {
        identity: Identity,
        ticket: String,
    },
    CancelChallenge {
        identity: Identity,
        ticket: String,
    },
    ListInvites {
        identity: Identity,
    },
    Leaderboard {
        query: String,
    },
    Profile {
        name: String,
    },

    Room(RoomSnapshot),
    Queue(QueueStatus),
    Challenge(ChallengeStatus),
    Invites(Vec<InviteSummary>),
    Standings(Vec<AccountSummary>),
    Account(AccountSummary),
    Ack,
    Error {
        kind: ErrorKind,
        message: String,
    },
}

impl Packet {
    /// Short label for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Packet::CreateRoom { .. } => "CreateRoom",
            Packet::JoinRoom { .. } => "JoinRoom",
            Packet::StartTraining { .. } => "StartTraining",
            Packet::Play { .. } => "Play",
            Packet::ReadRoom { .. } => "ReadRoom",
            Packet::Rematch { .. } => "Rematch",
            Packet::JoinMatchmaking { .. } => "JoinMatchmaking",
            Packet::PollMatchmaking { .. } => "PollMatchmaking",
            Packet::LeaveMatchmaking { .. } => "LeaveMatchmaking",
            Packet::SendChallenge { .. } => "SendChallenge",
            Packet::PollChallenge { .. } => "PollChallenge",
            Packet::AcceptChallenge { .. } => "AcceptChallenge",
            Packet::DeclineChallenge { .. } => "DeclineChallenge",
            Packet::CancelChallenge { .. } => "CancelChallenge",
            Packet::ListInvites { .. } => "ListInvites",
            Packet::Leaderboard { .. } => "Leaderboard",
            Packet::Profile { .. } => "Profile",
            Packet::Room(_) => "Room",
            Packet::Queue(_) => "Queue",
            Packet::Challenge(_) => "Challenge",
            Packet::Invites(_) => "Invites",
            Packet::Standings(_) => "Standings",
            Packet::Account(_) => "Account",
            Packet::Ack => "Ack",
            Packet::Error { .. } => "Error",
        }
    }

    pub fn is_response(&self) -> bool {
        matches!(
            self,
            Packet::Room(_)
                | Packet::Queue(_)
                | Packet::Challenge(_)
                | Packet::Invites(_)
                | Packet::Standings(_)
                | Packet::Account(_)
                | Packet::Ack
                | Packet::Error { .. }
        )
    }
}
