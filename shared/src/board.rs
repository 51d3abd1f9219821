//! Connect-four rules: gravity placement, win detection and fullness.
//!
//! The board is a small `Copy` value so the search can explore branches on
//! private copies without sharing mutable state.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ROWS: usize = 6;
pub const COLS: usize = 7;
pub const CONNECT: usize = 4;

/// Contents of a single board cell. Row 0 is the top of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Cell {
    #[default]
    Empty,
    PlayerOne,
    PlayerTwo,
}

impl Cell {
    /// The other playable side. `Empty` maps to itself.
    pub fn opponent(self) -> Cell {
        match self {
            Cell::PlayerOne => Cell::PlayerTwo,
            Cell::PlayerTwo => Cell::PlayerOne,
            Cell::Empty => Cell::Empty,
        }
    }

    pub fn is_player(self) -> bool {
        self != Cell::Empty
    }

    /// Seat index (0 or 1) for a playable cell.
    pub fn seat(self) -> Option<usize> {
        match self {
            Cell::PlayerOne => Some(0),
            Cell::PlayerTwo => Some(1),
            Cell::Empty => None,
        }
    }

    pub fn from_seat(seat: usize) -> Cell {
        if seat == 0 {
            Cell::PlayerOne
        } else {
            Cell::PlayerTwo
        }
    }
}

/// Failures of a single placement or turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("column {0} is out of range")]
    ColumnOutOfRange(usize),
    #[error("only the two players may place pieces")]
    InvalidPlayer,
    #[error("column {0} is full")]
    ColumnFull(usize),
    #[error("game is already over")]
    GameOver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Board {
    grid: [[Cell; COLS]; ROWS],
    moves: usize,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    pub fn new() -> Self {
        Self {
            grid: [[Cell::Empty; COLS]; ROWS],
            moves: 0,
        }
    }

    pub fn get(&self, row: usize, col: usize) -> Cell {
        self.grid[row][col]
    }

    pub fn grid(&self) -> &[[Cell; COLS]; ROWS] {
        &self.grid
    }

    /// Number of pieces on the board.
    pub fn moves(&self) -> usize {
        self.moves
    }

    pub fn is_column_full(&self, col: usize) -> bool {
        self.grid[0][col] != Cell::Empty
    }

    /// Columns that can still take a piece, left to right.
    pub fn legal_columns(&self) -> Vec<usize> {
        (0..COLS).filter(|&c| !self.is_column_full(c)).collect()
    }

    /// Drops a piece into `col` and returns the row where it landed.
    pub fn place(&mut self, col: usize, cell: Cell) -> Result<usize, MoveError> {
        if col >= COLS {
            return Err(MoveError::ColumnOutOfRange(col));
        }
        if !cell.is_player() {
            return Err(MoveError::InvalidPlayer);
        }

        for row in (0..ROWS).rev() {
            if self.grid[row][col] == Cell::Empty {
                self.grid[row][col] = cell;
                self.moves += 1;
                return Ok(row);
            }
        }

        Err(MoveError::ColumnFull(col))
    }

    /// Copy-on-write variant of [`Board::place`] used by the search.
    pub fn with_move(&self, col: usize, cell: Cell) -> Option<Board> {
        let mut next = *self;
        next.place(col, cell).ok().map(|_| next)
    }

    pub fn is_full(&self) -> bool {
        self.moves >= ROWS * COLS
    }

    /// Scans horizontal, vertical and both diagonal runs and reports the first
    /// player holding four in a row.
    pub fn detect_win(&self) -> Option<Cell> {
        // (row step, col step)
        const DIRECTIONS: [(isize, isize); 4] = [(0, 1), (1, 0), (1, 1), (-1, 1)];

        for (dr, dc) in DIRECTIONS {
            for row in 0..ROWS {
                for col in 0..COLS {
                    let cell = self.grid[row][col];
                    if cell == Cell::Empty {
                        continue;
                    }
                    if self.run_matches(row, col, dr, dc, cell) {
                        return Some(cell);
                    }
                }
            }
        }
        None
    }

    fn run_matches(&self, row: usize, col: usize, dr: isize, dc: isize, cell: Cell) -> bool {
        (1..CONNECT as isize).all(|i| {
            let r = row as isize + dr * i;
            let c = col as isize + dc * i;
            r >= 0
                && c >= 0
                && (r as usize) < ROWS
                && (c as usize) < COLS
                && self.grid[r as usize][c as usize] == cell
        })
    }

    /// Every contiguous four-cell window in all four orientations.
    pub fn windows(&self) -> impl Iterator<Item = [Cell; CONNECT]> + '_ {
        let horizontal = (0..ROWS).flat_map(move |r| {
            (0..=COLS - CONNECT).map(move |c| {
                [
                    self.grid[r][c],
                    self.grid[r][c + 1],
                    self.grid[r][c + 2],
                    self.grid[r][c + 3],
                ]
            })
        });
        let vertical = (0..COLS).flat_map(move |c| {
            (0..=ROWS - CONNECT).map(move |r| {
                [
                    self.grid[r][c],
                    self.grid[r + 1][c],
                    self.grid[r + 2][c],
                    self.grid[r + 3][c],
                ]
            })
        });
        let falling = (0..=ROWS - CONNECT).flat_map(move |r| {
            (0..=COLS - CONNECT).map(move |c| {
                [
                    self.grid[r][c],
                    self.grid[r + 1][c + 1],
                    self.grid[r + 2][c + 2],
                    self.grid[r + 3][c + 3],
                ]
            })
        });
        let rising = (CONNECT - 1..ROWS).flat_map(move |r| {
            (0..=COLS - CONNECT).map(move |c| {
                [
                    self.grid[r][c],
                    self.grid[r - 1][c + 1],
                    self.grid[r - 2][c + 2],
                    self.grid[r - 3][c + 3],
                ]
            })
        });
        horizontal.chain(vertical).chain(falling).chain(rising)
    }
}
