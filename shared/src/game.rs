use crate::board::{Board, Cell, MoveError};
use serde::{Deserialize, Serialize};

/// Lifecycle of a single game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    InProgress,
    Won(Cell),
    Draw,
}

impl GameStatus {
    pub fn is_over(self) -> bool {
        self != GameStatus::InProgress
    }

    pub fn winner(self) -> Option<Cell> {
        match self {
            GameStatus::Won(cell) => Some(cell),
            _ => None,
        }
    }
}

/// A board plus turn ownership, terminal result and last-move bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub board: Board,
    pub next_player: Cell,
    pub status: GameStatus,
    /// (row, column) of the most recent placement.
    pub last_move: Option<(usize, usize)>,
    pub names: [String; 2],
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

impl Game {
    pub fn new() -> Self {
        Self::with_names("Player 1", "Player 2")
    }

    pub fn with_names(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self {
            board: Board::new(),
            next_player: Cell::PlayerOne,
            status: GameStatus::InProgress,
            last_move: None,
            names: [first.into(), second.into()],
        }
    }

    pub fn is_over(&self) -> bool {
        self.status.is_over()
    }

    /// Plays `column` for the player whose turn it is and returns the landing row.
    pub fn apply_move(&mut self, column: usize) -> Result<usize, MoveError> {
        if self.is_over() {
            return Err(MoveError::GameOver);
        }

        let row = self.board.place(column, self.next_player)?;
        self.last_move = Some((row, column));

        if let Some(winner) = self.board.detect_win() {
            self.status = GameStatus::Won(winner);
        } else if self.board.is_full() {
            self.status = GameStatus::Draw;
        } else {
            self.next_player = self.next_player.opponent();
        }
        Ok(row)
    }

    /// Ends the game in favour of `winner` without touching the board.
    pub fn forfeit_to(&mut self, winner: Cell) {
        self.status = GameStatus::Won(winner);
    }

    /// Fresh board for a rematch; display names survive.
    pub fn reset(&mut self) {
        let names = std::mem::take(&mut self.names);
        *self = Game {
            names,
            ..Game::new()
        };
    }
}
