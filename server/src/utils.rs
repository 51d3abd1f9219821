use rand::Rng;
use std::time::{Duration, Instant};

/// Unambiguous upper-case alphabet for human-typeable codes.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";
pub const ROOM_CODE_LEN: usize = 6;
const TICKET_LEN: usize = 26;

fn random_token(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

// Six characters, e.g. "K7QMZA"
pub fn generate_room_code() -> String {
    random_token(ROOM_CODE_LEN)
}

// Opaque id for matchmaking tickets and challenge invites
pub fn generate_ticket_id() -> String {
    random_token(TICKET_LEN)
}

/// Upper-cases and trims a code typed by a user.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Whole seconds from `now` until `deadline`, zero once it has passed.
pub fn seconds_until(deadline: Instant, now: Instant) -> u64 {
    let left = deadline.saturating_duration_since(now);
    // Round up so a running clock never shows 0 before it expires.
    if left.subsec_nanos() > 0 {
        left.as_secs() + 1
    } else {
        left.as_secs()
    }
}

pub fn older_than(since: Instant, age: Duration, now: Instant) -> bool {
    now.saturating_duration_since(since) > age
}
