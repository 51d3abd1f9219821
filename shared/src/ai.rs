//! Search opponent for bot-backed rooms.
//!
//! Level 1 plays a random legal column, level 2 is a one-ply greedy player and
//! levels 3 to 5 run minimax with alpha-beta pruning at depth 3, 4 and 5.

use crate::board::{Board, Cell, COLS, CONNECT, ROWS};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Score of a won position before the ply penalty.
pub const WIN_SCORE: i32 = 100_000;

const CENTER: usize = COLS / 2;
const CENTER_PIECE_BONUS: i32 = 6;

/// Bot strength, always within 1..=5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BotLevel(u8);

impl BotLevel {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    /// Clamps out-of-range requests to the nearest valid level.
    pub fn new(level: u8) -> Self {
        BotLevel(level.clamp(Self::MIN, Self::MAX))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn name(self) -> &'static str {
        match self.0 {
            1 => "Easy",
            2 => "Normal",
            3 => "Hard",
            4 => "Expert",
            _ => "Master",
        }
    }

    /// Minimax depth, `None` for the random and greedy levels.
    pub fn search_depth(self) -> Option<u32> {
        match self.0 {
            1 | 2 => None,
            level => Some(level as u32),
        }
    }
}

/// Picks a column for `me` using the thread-local RNG.
pub fn compute_move(board: &Board, me: Cell, level: BotLevel) -> Option<usize> {
    choose_move(board, me, level, &mut rand::thread_rng())
}

/// Picks a column for `me`, or `None` if the board has no legal column.
pub fn choose_move<R: Rng + ?Sized>(
    board: &Board,
    me: Cell,
    level: BotLevel,
    rng: &mut R,
) -> Option<usize> {
    match level.search_depth() {
        None if level.get() == 1 => board.legal_columns().choose(rng).copied(),
        None => pick_greedy(board, me),
        Some(depth) => pick_minimax(board, me, depth),
    }
}

fn immediate_win(board: &Board, player: Cell) -> Option<usize> {
    board.legal_columns().into_iter().find(|&col| {
        board
            .with_move(col, player)
            .and_then(|next| next.detect_win())
            == Some(player)
    })
}

fn pick_greedy(board: &Board, me: Cell) -> Option<usize> {
    if let Some(col) = immediate_win(board, me) {
        return Some(col);
    }
    if let Some(col) = immediate_win(board, me.opponent()) {
        return Some(col);
    }

    let mut best: Option<(usize, i32)> = None;
    for col in board.legal_columns() {
        let Some(next) = board.with_move(col, me) else {
            continue;
        };
        let score = evaluate(&next, me) - CENTER.abs_diff(col) as i32;
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((col, score));
        }
    }
    best.map(|(col, _)| col)
}

/// Legal columns ordered by distance from the centre.
fn ordered_moves(board: &Board) -> Vec<usize> {
    let mut moves = board.legal_columns();
    moves.sort_by_key(|&col| CENTER.abs_diff(col));
    moves
}

fn pick_minimax(board: &Board, me: Cell, depth: u32) -> Option<usize> {
    let mut best: Option<(usize, i32)> = None;
    let mut alpha = i32::MIN / 2;
    let beta = i32::MAX / 2;

    for col in ordered_moves(board) {
        let Some(next) = board.with_move(col, me) else {
            continue;
        };
        let score = minimax(&next, depth - 1, 1, alpha, beta, false, me);
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((col, score));
        }
        alpha = alpha.max(score);
    }
    best.map(|(col, _)| col)
}

/// Terminal score from `me`'s perspective, `ply` moves below the root.
fn terminal_score(board: &Board, me: Cell, ply: u32) -> Option<i32> {
    match board.detect_win() {
        Some(winner) if winner == me => Some(WIN_SCORE - ply as i32),
        Some(_) => Some(ply as i32 - WIN_SCORE),
        None if board.is_full() => Some(0),
        None => None,
    }
}

fn minimax(
    board: &Board,
    depth: u32,
    ply: u32,
    mut alpha: i32,
    mut beta: i32,
    maximizing: bool,
    me: Cell,
) -> i32 {
    if let Some(score) = terminal_score(board, me, ply) {
        return score;
    }
    if depth == 0 {
        return evaluate(board, me);
    }

    let mover = if maximizing { me } else { me.opponent() };
    let mut best = if maximizing { i32::MIN } else { i32::MAX };

    for col in ordered_moves(board) {
        let Some(next) = board.with_move(col, mover) else {
            continue;
        };
        let score = minimax(&next, depth - 1, ply + 1, alpha, beta, !maximizing, me);
        if maximizing {
            best = best.max(score);
            alpha = alpha.max(best);
        } else {
            best = best.min(score);
            beta = beta.min(best);
        }
        if beta <= alpha {
            break;
        }
    }
    best
}

fn score_window(window: &[Cell; CONNECT], me: Cell) -> i32 {
    let opp = me.opponent();
    let own = window.iter().filter(|&&c| c == me).count();
    let theirs = window.iter().filter(|&&c| c == opp).count();
    let empty = CONNECT - own - theirs;

    match (own, theirs, empty) {
        (4, _, _) => 10_000,
        (3, _, 1) => 100,
        (2, _, 2) => 10,
        (_, 3, 1) => -120,
        (_, 2, 2) => -12,
        _ => 0,
    }
}

/// Static evaluation of `board` from `me`'s perspective.
pub fn evaluate(board: &Board, me: Cell) -> i32 {
    let center = (0..ROWS).filter(|&row| board.get(row, CENTER) == me).count() as i32;
    let windows: i32 = board.windows().map(|w| score_window(&w, me)).sum();
    center * CENTER_PIECE_BONUS + windows
}
