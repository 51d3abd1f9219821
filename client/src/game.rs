use log::debug;
use shared::RoomSnapshot;

/// What the client currently knows about its room, ticket and invite.
#[derive(Debug, Clone, Default)]
pub struct ClientGameState {
    room: Option<RoomSnapshot>,
    pub ticket: Option<String>,
    pub challenge: Option<String>,
}

impl ClientGameState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn room(&self) -> Option<&RoomSnapshot> {
        self.room.as_ref()
    }

    pub fn code(&self) -> Option<&str> {
        self.room.as_ref().map(|room| room.code.as_str())
    }

    /// Revision to pass as `since` on the next long poll.
    pub fn revision(&self) -> Option<u64> {
        self.room.as_ref().map(|room| room.revision)
    }

    /// Stores `snapshot` unless it is older than what is already held for the
    /// same room. Returns true if the view changed.
    pub fn apply(&mut self, snapshot: RoomSnapshot) -> bool {
        match &self.room {
            Some(current) if current.code == snapshot.code => {
                if snapshot.revision <= current.revision {
                    debug!(
                        "Ignoring revision {} of {} (have {})",
                        snapshot.revision, snapshot.code, current.revision
                    );
                    return false;
                }
            }
            _ => {
                self.ticket = None;
                self.challenge = None;
            }
        }
        self.room = Some(snapshot);
        true
    }

    /// True while the room lacks an opponent or the opponent holds the move.
    pub fn waiting_on_opponent(&self) -> bool {
        match &self.room {
            Some(room) => !room.ready || (!room.can_play && !room.status.is_over()),
            None => false,
        }
    }

    pub fn leave_room(&mut self) {
        self.room = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Board, Cell, GameStatus};

    fn snapshot(code: &str, revision: u64) -> RoomSnapshot {
        RoomSnapshot {
            code: code.to_string(),
            revision,
            board: Board::new(),
            next_player: Cell::PlayerOne,
            status: GameStatus::InProgress,
            names: ["alice".to_string(), "bob".to_string()],
            ready: true,
            seat: Some(1),
            can_play: false,
            last_move: None,
            forfeit: None,
            rematch: [false, false],
            bot_level: None,
            random: false,
            seconds_left: None,
        }
    }

    #[test]
    fn test_stale_snapshots_are_ignored() {
        let mut state = ClientGameState::new();
        assert!(state.apply(snapshot("ABC234", 3)));
        assert!(!state.apply(snapshot("ABC234", 2)));
        assert!(!state.apply(snapshot("ABC234", 3)));
        assert!(state.apply(snapshot("ABC234", 4)));
        assert_eq!(state.revision(), Some(4));
    }

    #[test]
    fn test_new_room_replaces_old_and_clears_tickets() {
        let mut state = ClientGameState::new();
        state.ticket = Some("T1".to_string());
        assert!(state.apply(snapshot("ABC234", 7)));
        assert_eq!(state.ticket, None);
        assert!(state.apply(snapshot("XYZ567", 1)));
        assert_eq!(state.code(), Some("XYZ567"));
    }

    #[test]
    fn test_waiting_on_opponent() {
        let mut state = ClientGameState::new();
        assert!(!state.waiting_on_opponent());

        let mut room = snapshot("ABC234", 1);
        room.ready = false;
        state.apply(room);
        assert!(state.waiting_on_opponent());

        let mut room = snapshot("ABC234", 3);
        room.can_play = true;
        state.apply(room);
        assert!(!state.waiting_on_opponent());

        state.apply(snapshot("ABC234", 4));
        assert!(state.waiting_on_opponent());

        let mut room = snapshot("ABC234", 5);
        room.status = GameStatus::Draw;
        state.apply(room);
        assert!(!state.waiting_on_opponent());
    }
}
