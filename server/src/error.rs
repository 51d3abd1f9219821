use shared::{ErrorKind, MoveError};
use thiserror::Error;

/// Failures surfaced to a caller of the game service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Move(#[from] MoveError),
    #[error("it is not your turn")]
    NotYourTurn,
    #[error("you are not seated in room {0}")]
    NotSeated(String),
    #[error("room {0} not found")]
    RoomNotFound(String),
    #[error("room {0} is full")]
    RoomFull(String),
    #[error("you cannot join your own room")]
    OwnRoom,
    #[error("the game is still in progress")]
    GameInProgress,
    #[error("waiting for an opponent to join")]
    WaitingForOpponent,
    #[error("could not allocate a free room code")]
    CodesExhausted,
    #[error("ticket {0} not found")]
    TicketNotFound(String),
    #[error("you already have a pending invite for {0}")]
    InviteExists(String),
    #[error("invite {0} not found")]
    InviteNotFound(String),
    #[error("this invite is not addressed to you")]
    NotYourInvite,
    #[error("only the challenger can cancel this invite")]
    NotChallenger,
    #[error("you can only challenge friends")]
    NotFriends,
    #[error("you cannot challenge yourself")]
    SelfChallenge,
    #[error("sign in with an account name first")]
    AccountRequired,
    #[error("account {0} not found")]
    AccountNotFound(String),
    #[error("unexpected request: {0}")]
    BadRequest(&'static str),
}

impl ServiceError {
    /// Wire classification of this failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Move(MoveError::ColumnOutOfRange(_))
            | ServiceError::Move(MoveError::InvalidPlayer)
            | ServiceError::NotYourTurn
            | ServiceError::SelfChallenge
            | ServiceError::BadRequest(_) => ErrorKind::InvalidInput,

            ServiceError::Move(MoveError::ColumnFull(_))
            | ServiceError::Move(MoveError::GameOver)
            | ServiceError::RoomFull(_)
            | ServiceError::OwnRoom
            | ServiceError::GameInProgress
            | ServiceError::WaitingForOpponent
            | ServiceError::CodesExhausted
            | ServiceError::InviteExists(_) => ErrorKind::Conflict,

            ServiceError::RoomNotFound(_)
            | ServiceError::TicketNotFound(_)
            | ServiceError::InviteNotFound(_)
            | ServiceError::AccountNotFound(_) => ErrorKind::NotFound,

            ServiceError::NotSeated(_)
            | ServiceError::NotYourInvite
            | ServiceError::NotChallenger
            | ServiceError::NotFriends
            | ServiceError::AccountRequired => ErrorKind::Unauthorized,
        }
    }
}

/// Startup failures from invalid command-line settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
    #[error("invalid friend pair '{0}', expected name:name")]
    BadFriendPair(String),
    #[error("invalid listen address '{0}'")]
    BadAddress(String),
    #[error("k-factor must be positive, got {0}")]
    BadKFactor(f64),
}
