//! In-memory account ratings with Elo updates.
//!
//! Credentials live elsewhere; an account here is just a display name plus a
//! rating and counters, created on first use.

use log::info;
use shared::{normalize_account, AccountSummary};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

pub const INITIAL_RATING: i32 = 1500;

/// Rating store consumed by the session and matchmaking code.
pub trait RatingStore: Send + Sync {
    /// Current rating, creating the account at [`INITIAL_RATING`] if needed.
    fn rating(&self, name: &str) -> i32;

    /// Applies one finished game. `score_a` is 1.0, 0.5 or 0.0 from `a`'s view.
    /// Returns the rating change of `a`; `b` moves by the negation.
    fn apply_match_result(&self, a: &str, b: &str, score_a: f64, k_factor: f64) -> i32;

    fn lookup(&self, name: &str) -> Option<AccountSummary>;

    /// Accounts whose name contains `query` (case-insensitive), best first.
    fn leaderboard(&self, query: &str) -> Vec<AccountSummary>;
}

/// Probability that a player rated `ra` beats one rated `rb`.
pub fn expected_score(ra: i32, rb: i32) -> f64 {
    1.0 / (1.0 + 10f64.powf((rb - ra) as f64 / 400.0))
}

/// Rating change for a player rated `ra` scoring `score` against `rb`.
pub fn rating_delta(ra: i32, rb: i32, score: f64, k_factor: f64) -> i32 {
    // f64::round already rounds half away from zero.
    (k_factor * (score - expected_score(ra, rb))).round() as i32
}

#[derive(Debug, Clone)]
struct Account {
    name: String,
    rating: i32,
    games: u32,
    wins: u32,
    losses: u32,
}

impl Account {
    fn new(name: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            rating: INITIAL_RATING,
            games: 0,
            wins: 0,
            losses: 0,
        }
    }

    fn summary(&self) -> AccountSummary {
        AccountSummary {
            name: self.name.clone(),
            rating: self.rating,
            games: self.games,
            wins: self.wins,
            losses: self.losses,
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryAccounts {
    accounts: RwLock<HashMap<String, Account>>,
}

impl MemoryAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RatingStore for MemoryAccounts {
    fn rating(&self, name: &str) -> i32 {
        let key = normalize_account(name);
        if let Some(account) = self
            .accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return account.rating;
        }

        let mut accounts = self.accounts.write().unwrap_or_else(PoisonError::into_inner);
        accounts
            .entry(key)
            .or_insert_with(|| Account::new(name))
            .rating
    }

    fn apply_match_result(&self, a: &str, b: &str, score_a: f64, k_factor: f64) -> i32 {
        let (key_a, key_b) = (normalize_account(a), normalize_account(b));
        let mut accounts = self.accounts.write().unwrap_or_else(PoisonError::into_inner);

        let ra = accounts
            .entry(key_a.clone())
            .or_insert_with(|| Account::new(a))
            .rating;
        let rb = accounts
            .entry(key_b.clone())
            .or_insert_with(|| Account::new(b))
            .rating;
        let delta = rating_delta(ra, rb, score_a, k_factor);

        let (a_won, b_won) = (score_a > 0.5, score_a < 0.5);
        if let Some(account) = accounts.get_mut(&key_a) {
            account.rating += delta;
            account.games += 1;
            account.wins += a_won as u32;
            account.losses += b_won as u32;
        }
        if let Some(account) = accounts.get_mut(&key_b) {
            account.rating -= delta;
            account.games += 1;
            account.wins += b_won as u32;
            account.losses += a_won as u32;
        }

        info!(
            "Rated game {} vs {} (score {}): {:+} / {:+}",
            a, b, score_a, delta, -delta
        );
        delta
    }

    fn lookup(&self, name: &str) -> Option<AccountSummary> {
        self.accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&normalize_account(name))
            .map(Account::summary)
    }

    fn leaderboard(&self, query: &str) -> Vec<AccountSummary> {
        let query = normalize_account(query);
        let mut standings: Vec<AccountSummary> = self
            .accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(key, _)| query.is_empty() || key.contains(&query))
            .map(|(_, account)| account.summary())
            .collect();
        standings.sort_by(|x, y| y.rating.cmp(&x.rating).then_with(|| x.name.cmp(&y.name)));
        standings
    }
}
