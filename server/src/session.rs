//! Authoritative room state.
//!
//! Every room lives in one map behind a single reader/writer lock. Mutations
//! happen in short critical sections; waiting for changes and running the
//! search opponent happen with the lock released, so a slow poller or a deep
//! search never blocks other rooms.
//!
//! The turn clock is evaluated whenever a room is touched: the first touch of
//! a full room arms it, and a touch after the deadline ends the game in favour
//! of the player who was not on the move.

use crate::accounts::RatingStore;
use crate::config::Settings;
use crate::error::ServiceError;
use crate::notify::{Notifier, Subscription};
use crate::utils::{generate_room_code, normalize_code, older_than, seconds_until};
use log::{debug, info};
use shared::ai::{self, BotLevel};
use shared::{normalize_account, Board, Cell, Game, GameStatus, Identity, RoomSnapshot, BOT_PLAYER_ID};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};
use std::time::{Duration, Instant};

pub const FORFEIT_TIMEOUT: &str = "Time limit exceeded";
const MAX_CODE_ATTEMPTS: usize = 64;
const BOT_ATTEMPTS: usize = 3;

/// One seat of a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub player_id: String,
    pub account: Option<String>,
    /// Set only by training rooms. A client-chosen id never makes a seat the bot.
    bot: bool,
}

impl Slot {
    fn human(identity: &Identity) -> Self {
        Self {
            player_id: identity.player_id.clone(),
            account: identity
                .account_key()
                .and(identity.account.as_deref())
                .map(|name| name.trim().to_string()),
            bot: false,
        }
    }

    fn bot() -> Self {
        Self {
            player_id: BOT_PLAYER_ID.to_string(),
            account: None,
            bot: true,
        }
    }

    fn is_bot(&self) -> bool {
        self.bot
    }

    fn account_key(&self) -> Option<String> {
        self.account.as_deref().map(normalize_account)
    }

    fn holds(&self, identity: &Identity) -> bool {
        !self.is_bot()
            && Identity {
                player_id: self.player_id.clone(),
                account: self.account.clone(),
            }
            .same_person(identity)
    }
}

/// A finished game between two accounts, to be rated.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub first: String,
    pub second: String,
    pub first_score: f64,
}

#[derive(Debug, Clone, Copy)]
struct BotJob {
    board: Board,
    cell: Cell,
    level: BotLevel,
    revision: u64,
}

#[derive(Debug)]
pub struct Session {
    code: String,
    game: Game,
    slots: [Option<Slot>; 2],
    revision: u64,
    deadline: Option<Instant>,
    rematch: [bool; 2],
    forfeit: Option<String>,
    bot_level: Option<BotLevel>,
    random: bool,
    /// Who opens the game after the next reset.
    start_next: Cell,
    touched: Instant,
    notifier: Arc<Notifier>,
}

impl Session {
    fn new(code: String, host: &Identity, now: Instant) -> Self {
        Self {
            code,
            game: Game::with_names(host.display_name(), "Waiting..."),
            slots: [Some(Slot::human(host)), None],
            revision: 1,
            deadline: None,
            rematch: [false; 2],
            forfeit: None,
            bot_level: None,
            random: false,
            start_next: Cell::PlayerTwo,
            touched: now,
            notifier: Arc::new(Notifier::new()),
        }
    }

    fn seat_of(&self, identity: &Identity) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().map_or(false, |s| s.holds(identity)))
    }

    fn is_ready(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    fn bot_seat(&self) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().map_or(false, Slot::is_bot))
    }

    fn is_bot_turn(&self) -> bool {
        self.bot_seat().map(Cell::from_seat) == Some(self.game.next_player)
    }

    fn bump(&mut self) {
        self.revision += 1;
        self.notifier.notify();
    }

    fn tick_clock(&mut self, now: Instant, turn_timeout: Duration) -> Option<MatchResult> {
        if !self.is_ready() || self.game.is_over() {
            return None;
        }
        let Some(deadline) = self.deadline else {
            self.deadline = Some(now + turn_timeout);
            self.bump();
            return None;
        };
        // The bot moves on the next read, it never runs out of time.
        if now < deadline || self.is_bot_turn() {
            return None;
        }

        let loser = self.game.next_player;
        self.game.forfeit_to(loser.opponent());
        self.forfeit = Some(FORFEIT_TIMEOUT.to_string());
        self.deadline = None;
        self.bump();
        info!("Room {}: {:?} forfeited on time", self.code, loser);
        self.result()
    }

    fn result(&self) -> Option<MatchResult> {
        if self.bot_level.is_some() {
            return None;
        }
        let first_score = match self.game.status {
            GameStatus::Won(Cell::PlayerOne) => 1.0,
            GameStatus::Won(_) => 0.0,
            GameStatus::Draw => 0.5,
            GameStatus::InProgress => return None,
        };
        let [Some(first), Some(second)] = &self.slots else {
            return None;
        };
        Some(MatchResult {
            first: first.account.clone()?,
            second: second.account.clone()?,
            first_score,
        })
    }

    fn join(&mut self, identity: &Identity) -> Result<(), ServiceError> {
        let same_browser = self.slots.iter().position(|slot| {
            slot.as_ref()
                .map_or(false, |s| !s.is_bot() && s.player_id == identity.player_id)
        });
        if let Some(seat) = same_browser {
            let refreshed = Slot::human(identity);
            if refreshed.account.is_some() && self.slots[seat].as_ref() != Some(&refreshed) {
                self.slots[seat] = Some(refreshed);
                self.game.names[seat] = identity.display_name();
                self.bump();
            }
            return Ok(());
        }

        let host_key = self.slots[0].as_ref().and_then(Slot::account_key);
        if host_key.is_some() && host_key == identity.account_key() {
            return Err(ServiceError::OwnRoom);
        }
        if self.slots[1].is_some() {
            return Err(ServiceError::RoomFull(self.code.clone()));
        }

        self.slots[1] = Some(Slot::human(identity));
        self.game.names[1] = identity.display_name();
        self.bump();
        info!(
            "Room {}: {} joined {}",
            self.code, self.game.names[1], self.game.names[0]
        );
        Ok(())
    }

    fn play(
        &mut self,
        identity: &Identity,
        column: usize,
        now: Instant,
        turn_timeout: Duration,
    ) -> Result<Option<MatchResult>, ServiceError> {
        let seat = self
            .seat_of(identity)
            .ok_or_else(|| ServiceError::NotSeated(self.code.clone()))?;
        if self.game.is_over() {
            return Err(shared::MoveError::GameOver.into());
        }
        if !self.is_ready() {
            return Err(ServiceError::WaitingForOpponent);
        }
        if Cell::from_seat(seat) != self.game.next_player {
            return Err(ServiceError::NotYourTurn);
        }

        let row = self.game.apply_move(column)?;
        debug!("Room {}: seat {} played ({}, {})", self.code, seat, row, column);
        Ok(self.after_move(now, turn_timeout))
    }

    fn after_move(&mut self, now: Instant, turn_timeout: Duration) -> Option<MatchResult> {
        if self.game.is_over() {
            self.deadline = None;
            self.bump();
            info!("Room {}: game over, {:?}", self.code, self.game.status);
            self.result()
        } else {
            self.deadline = Some(now + turn_timeout);
            self.bump();
            None
        }
    }

    fn bot_job(&self) -> Option<BotJob> {
        if !self.is_ready() || self.game.is_over() || !self.is_bot_turn() {
            return None;
        }
        Some(BotJob {
            board: self.game.board,
            cell: self.game.next_player,
            level: self.bot_level?,
            revision: self.revision,
        })
    }

    fn rematch(
        &mut self,
        identity: &Identity,
        now: Instant,
        turn_timeout: Duration,
    ) -> Result<(), ServiceError> {
        let seat = self
            .seat_of(identity)
            .ok_or_else(|| ServiceError::NotSeated(self.code.clone()))?;
        if !self.game.is_over() {
            return Err(ServiceError::GameInProgress);
        }
        if self.rematch[seat] {
            return Ok(());
        }

        self.rematch[seat] = true;
        if let Some(bot) = self.bot_seat() {
            self.rematch[bot] = true;
        } else {
            self.bump();
        }
        if self.rematch.iter().all(|&consent| consent) {
            self.restart(now, turn_timeout);
        }
        Ok(())
    }

    fn restart(&mut self, now: Instant, turn_timeout: Duration) {
        self.game.reset();
        self.game.next_player = self.start_next;
        self.start_next = self.start_next.opponent();
        self.forfeit = None;
        self.rematch = [false; 2];
        self.deadline = Some(now + turn_timeout);
        self.bump();
        info!(
            "Room {}: rematch started, {:?} opens",
            self.code, self.game.next_player
        );
    }

    fn snapshot(&self, viewer: &Identity, now: Instant) -> RoomSnapshot {
        let seat = self.seat_of(viewer);
        let ready = self.is_ready();
        let running = ready && !self.game.is_over();
        RoomSnapshot {
            code: self.code.clone(),
            revision: self.revision,
            board: self.game.board,
            next_player: self.game.next_player,
            status: self.game.status,
            names: self.game.names.clone(),
            ready,
            seat,
            can_play: running && seat.map(Cell::from_seat) == Some(self.game.next_player),
            last_move: self.game.last_move,
            forfeit: self.forfeit.clone(),
            rematch: self.rematch,
            bot_level: self.bot_level,
            random: self.random,
            seconds_left: if running {
                self.deadline.map(|deadline| seconds_until(deadline, now))
            } else {
                None
            },
        }
    }
}

enum Observation {
    Ready(Box<RoomSnapshot>),
    Unchanged(Subscription),
}

/// Counts from one background sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub forfeited: usize,
    pub evicted: usize,
}

/// Room-code keyed map of live sessions.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Session>>,
    accounts: Arc<dyn RatingStore>,
    settings: Settings,
}

impl SessionRegistry {
    pub fn new(accounts: Arc<dyn RatingStore>, settings: Settings) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            accounts,
            settings,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of long polls currently parked on a room.
    pub fn waiting_readers(&self, code: &str) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&normalize_code(code))
            .map_or(0, |session| session.notifier.subscriber_count())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Session>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Picks an unused code and inserts the session it builds, under one lock.
    fn insert_new<F>(&self, build: F) -> Result<String, ServiceError>
    where
        F: FnOnce(String, Instant) -> Session,
    {
        let mut sessions = self.write();
        let code = (0..MAX_CODE_ATTEMPTS)
            .map(|_| generate_room_code())
            .find(|code| !sessions.contains_key(code))
            .ok_or(ServiceError::CodesExhausted)?;
        sessions.insert(code.clone(), build(code.clone(), Instant::now()));
        Ok(code)
    }

    /// Runs `f` on the room after evaluating its turn clock.
    fn with_session<T, F>(&self, code: &str, f: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&mut Session, Instant) -> Result<T, ServiceError>,
    {
        let code = normalize_code(code);
        let now = Instant::now();
        let (clock, outcome) = {
            let mut sessions = self.write();
            let session = sessions
                .get_mut(&code)
                .ok_or_else(|| ServiceError::RoomNotFound(code.clone()))?;
            session.touched = now;
            let clock = session.tick_clock(now, self.settings.turn_timeout);
            (clock, f(session, now))
        };
        self.record(clock);
        outcome
    }

    fn record(&self, result: Option<MatchResult>) {
        if let Some(result) = result {
            self.accounts.apply_match_result(
                &result.first,
                &result.second,
                result.first_score,
                self.settings.k_factor,
            );
        }
    }

    pub fn create(&self, owner: &Identity) -> Result<RoomSnapshot, ServiceError> {
        let code = self.insert_new(|code, now| Session::new(code, owner, now))?;
        info!("Room {} created by {}", code, owner.display_name());
        self.with_session(&code, |session, now| Ok(session.snapshot(owner, now)))
    }

    /// Room against the search opponent, which takes the second seat.
    pub fn create_training(
        &self,
        owner: &Identity,
        level: BotLevel,
    ) -> Result<RoomSnapshot, ServiceError> {
        let turn_timeout = self.settings.turn_timeout;
        let code = self.insert_new(|code, now| {
            let mut session = Session::new(code, owner, now);
            session.slots[1] = Some(Slot::bot());
            session.game.names[1] = format!("Bot {}", level.name());
            session.bot_level = Some(level);
            session.deadline = Some(now + turn_timeout);
            session
        })?;
        info!("Training room {} at level {} for {}", code, level.get(), owner.display_name());
        self.with_session(&code, |session, now| Ok(session.snapshot(owner, now)))
    }

    /// Room with both seats filled and the clock already running. `first`
    /// opens the game.
    pub fn create_match(
        &self,
        first: &Identity,
        second: &Identity,
        random: bool,
    ) -> Result<String, ServiceError> {
        let turn_timeout = self.settings.turn_timeout;
        let code = self.insert_new(|code, now| {
            let mut session = Session::new(code, first, now);
            session.slots[1] = Some(Slot::human(second));
            session.game.names[1] = second.display_name();
            session.random = random;
            session.deadline = Some(now + turn_timeout);
            session
        })?;
        info!(
            "Room {} opened for {} vs {}",
            code,
            first.display_name(),
            second.display_name()
        );
        Ok(code)
    }

    pub fn join(&self, code: &str, identity: &Identity) -> Result<RoomSnapshot, ServiceError> {
        let turn_timeout = self.settings.turn_timeout;
        let (result, snapshot) = self.with_session(code, |session, now| {
            session.join(identity)?;
            let result = session.tick_clock(now, turn_timeout);
            Ok((result, session.snapshot(identity, now)))
        })?;
        self.record(result);
        Ok(snapshot)
    }

    pub fn play(
        &self,
        code: &str,
        identity: &Identity,
        column: usize,
    ) -> Result<RoomSnapshot, ServiceError> {
        let turn_timeout = self.settings.turn_timeout;
        let (result, snapshot) = self.with_session(code, |session, now| {
            let result = session.play(identity, column, now, turn_timeout)?;
            Ok((result, session.snapshot(identity, now)))
        })?;
        self.record(result);
        Ok(snapshot)
    }

    pub fn rematch(&self, code: &str, identity: &Identity) -> Result<RoomSnapshot, ServiceError> {
        let turn_timeout = self.settings.turn_timeout;
        self.with_session(code, |session, now| {
            session.rematch(identity, now, turn_timeout)?;
            Ok(session.snapshot(identity, now))
        })
    }

    /// Current state of a room as seen by `viewer`.
    ///
    /// With `long_poll` set and `since` equal to the current revision, waits
    /// until the room changes or the long-poll timeout passes, then returns
    /// whatever is current. Dropping the returned future abandons the wait.
    pub async fn read(
        &self,
        code: &str,
        viewer: &Identity,
        since: Option<u64>,
        long_poll: bool,
    ) -> Result<RoomSnapshot, ServiceError> {
        let started = Instant::now();
        loop {
            self.drive_bot(code)?;

            let observation = self.with_session(code, |session, now| {
                let snapshot = session.snapshot(viewer, now);
                let fresh = since.map_or(true, |seen| snapshot.revision > seen);
                Ok(if fresh || !long_poll {
                    Observation::Ready(Box::new(snapshot))
                } else {
                    Observation::Unchanged(session.notifier.subscribe())
                })
            })?;

            let mut subscription = match observation {
                Observation::Ready(snapshot) => return Ok(*snapshot),
                Observation::Unchanged(subscription) => subscription,
            };

            let remaining = self
                .settings
                .long_poll_timeout
                .saturating_sub(started.elapsed());
            if remaining.is_zero() || !subscription.wait(remaining).await {
                debug!("Long poll on {} timed out", code);
                return self.with_session(code, |session, now| Ok(session.snapshot(viewer, now)));
            }
        }
    }

    /// Plays the bot's reply if it is the bot's turn. The search runs with the
    /// lock released and its move is dropped if the room changed meanwhile.
    fn drive_bot(&self, code: &str) -> Result<(), ServiceError> {
        let turn_timeout = self.settings.turn_timeout;
        for _ in 0..BOT_ATTEMPTS {
            let Some(job) = self.with_session(code, |session, _| Ok(session.bot_job()))? else {
                return Ok(());
            };
            let Some(column) = ai::compute_move(&job.board, job.cell, job.level) else {
                return Ok(());
            };

            let applied = self.with_session(code, |session, now| {
                if session.revision != job.revision {
                    return Ok(false);
                }
                match session.game.apply_move(column) {
                    Ok(_) => {
                        session.after_move(now, turn_timeout);
                        Ok(true)
                    }
                    Err(err) => {
                        debug!("Room {}: bot move {} rejected: {}", session.code, column, err);
                        Ok(false)
                    }
                }
            })?;
            if applied {
                break;
            }
        }
        Ok(())
    }

    /// Expires overdue turn clocks and evicts rooms idle past the session TTL.
    pub fn sweep(&self, now: Instant) -> SweepReport {
        let mut report = SweepReport::default();
        let mut results = Vec::new();
        {
            let mut sessions = self.write();
            for session in sessions.values_mut() {
                let was_over = session.game.is_over();
                results.extend(session.tick_clock(now, self.settings.turn_timeout));
                if !was_over && session.game.is_over() {
                    report.forfeited += 1;
                }
            }

            let ttl = self.settings.session_ttl;
            sessions.retain(|code, session| {
                let keep = !older_than(session.touched, ttl, now);
                if !keep {
                    info!("Evicting idle room {}", code);
                    session.notifier.notify();
                    report.evicted += 1;
                }
                keep
            });
        }
        for result in results {
            self.record(Some(result));
        }
        report
    }
}
