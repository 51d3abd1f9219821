//! Plain-text drawing of rooms for the terminal client.

use shared::{Board, Cell, GameStatus, RoomSnapshot, COLS, ROWS};
use std::fmt::Write;

pub fn piece(cell: Cell) -> char {
    match cell {
        Cell::Empty => '.',
        Cell::PlayerOne => 'X',
        Cell::PlayerTwo => 'O',
    }
}

/// Grid with 1-based column labels. The last placed piece is drawn lowercase.
pub fn render_board(board: &Board, last_move: Option<(usize, usize)>) -> String {
    let mut out = String::new();
    let labels: Vec<String> = (1..=COLS).map(|c| c.to_string()).collect();
    let _ = writeln!(out, " {} ", labels.join(" "));

    for row in 0..ROWS {
        let cells: Vec<String> = (0..COLS)
            .map(|col| {
                let symbol = piece(board.get(row, col));
                if last_move == Some((row, col)) {
                    symbol.to_ascii_lowercase().to_string()
                } else {
                    symbol.to_string()
                }
            })
            .collect();
        let _ = writeln!(out, "|{}|", cells.join(" "));
    }
    let _ = write!(out, "+{}+", "-".repeat(COLS * 2 - 1));
    out
}

/// One-line summary of whose turn it is or how the game ended.
pub fn status_line(room: &RoomSnapshot) -> String {
    let name = |cell: Cell| -> String {
        cell.seat()
            .map(|seat| format!("{} ({})", room.names[seat], piece(cell)))
            .unwrap_or_default()
    };

    if !room.ready {
        return format!("Waiting for an opponent. Share code {}", room.code);
    }
    match room.status {
        GameStatus::InProgress => {
            let mut line = if room.can_play {
                "Your move".to_string()
            } else {
                format!("{} to move", name(room.next_player))
            };
            if let Some(secs) = room.seconds_left {
                let _ = write!(line, " ({}s left)", secs);
            }
            line
        }
        GameStatus::Draw => "Draw".to_string(),
        GameStatus::Won(winner) => {
            let mut line = if room.seat.is_some() && room.seat == winner.seat() {
                "You win".to_string()
            } else {
                format!("{} wins", name(winner))
            };
            if let Some(reason) = &room.forfeit {
                let _ = write!(line, ": {}", reason);
            }
            line
        }
    }
}

pub fn render_room(room: &RoomSnapshot) -> String {
    let mut out = String::new();
    let mut header = format!(
        "Room {}  X: {}  O: {}",
        room.code, room.names[0], room.names[1]
    );
    if let Some(level) = room.bot_level {
        let _ = write!(header, "  [training, level {}]", level.get());
    } else if room.random {
        header.push_str("  [ranked]");
    }
    let _ = writeln!(out, "{}", header);
    let _ = writeln!(out, "{}", render_board(&room.board, room.last_move));
    out.push_str(&status_line(room));

    if room.status.is_over() {
        let wants: Vec<&str> = (0..2)
            .filter(|&seat| room.rematch[seat])
            .map(|seat| room.names[seat].as_str())
            .collect();
        if !wants.is_empty() {
            let _ = write!(out, "\nRematch requested by {}", wants.join(", "));
        }
    }
    out
}
