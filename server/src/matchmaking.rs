//! Rating-window matchmaking queue.
//!
//! Waiting tickets sit in arrival order. A ticket accepts opponents within a
//! tolerance that widens the longer it waits. When two tickets pair, a room
//! is opened with the older ticket in the first seat and the waiting side is
//! signalled through its ticket channel. The room code is also kept for a
//! while so a poll that arrives after the signal still finds it.

use crate::config::Settings;
use crate::error::ServiceError;
use crate::session::SessionRegistry;
use crate::utils::{generate_ticket_id, older_than};
use log::{debug, info};
use shared::{Identity, QueueStatus};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::sleep;

pub const BASE_TOLERANCE: i32 = 50;
pub const TOLERANCE_STEP: i32 = 50;
pub const MAX_TOLERANCE: i32 = 800;
const STEP_SECS: u64 = 5;

/// Accepted rating gap after waiting `waited`.
pub fn tolerance(waited: Duration) -> i32 {
    let steps = (waited.as_secs() / STEP_SECS).min(MAX_TOLERANCE as u64) as i32;
    (BASE_TOLERANCE + steps * TOLERANCE_STEP).min(MAX_TOLERANCE)
}

#[derive(Debug)]
struct Ticket {
    id: String,
    identity: Identity,
    rating: i32,
    created: Instant,
    last_seen: Instant,
    tx: watch::Sender<Option<String>>,
    rx: watch::Receiver<Option<String>>,
}

impl Ticket {
    fn tolerance(&self, now: Instant) -> i32 {
        tolerance(now.saturating_duration_since(self.created))
    }

    fn status(&self, now: Instant) -> QueueStatus {
        let range = self.tolerance(now);
        QueueStatus::Waiting {
            ticket: self.id.clone(),
            rating: self.rating,
            min_rating: self.rating - range,
            max_rating: self.rating + range,
        }
    }
}

#[derive(Debug)]
struct Resolved {
    code: String,
    at: Instant,
}

#[derive(Debug, Default)]
struct QueueState {
    /// Ticket ids in arrival order.
    order: Vec<String>,
    tickets: HashMap<String, Ticket>,
    resolved: HashMap<String, Resolved>,
}

impl QueueState {
    fn remove(&mut self, id: &str) -> Option<Ticket> {
        let ticket = self.tickets.remove(id)?;
        self.order.retain(|queued| queued != id);
        Some(ticket)
    }

    fn resolve(&mut self, ticket: Ticket, code: &str, now: Instant) {
        ticket.tx.send_replace(Some(code.to_string()));
        self.resolved.insert(
            ticket.id,
            Resolved {
                code: code.to_string(),
                at: now,
            },
        );
    }
}

pub struct Matchmaker {
    state: Mutex<QueueState>,
    sessions: Arc<SessionRegistry>,
    settings: Settings,
}

impl Matchmaker {
    pub fn new(sessions: Arc<SessionRegistry>, settings: Settings) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            sessions,
            settings,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pairs `identity` with the first waiting ticket willing to accept the
    /// gap, or queues a new ticket. Re-enqueueing returns the existing ticket.
    pub fn enqueue(&self, identity: &Identity, rating: i32) -> Result<QueueStatus, ServiceError> {
        let now = Instant::now();
        let mut state = self.lock();

        let partner = state.order.iter().find(|id| {
            state.tickets.get(*id).map_or(false, |other| {
                !other.identity.same_person(identity)
                    && (other.rating - rating).abs() <= other.tolerance(now)
            })
        });
        if let Some(partner) = partner.cloned() {
            let Some(other) = state.remove(&partner) else {
                return Err(ServiceError::TicketNotFound(partner));
            };
            let code = match self.sessions.create_match(&other.identity, identity, true) {
                Ok(code) => code,
                Err(err) => {
                    state.order.insert(0, other.id.clone());
                    state.tickets.insert(other.id.clone(), other);
                    return Err(err);
                }
            };
            info!(
                "Paired {} ({}) with {} ({}) in room {}",
                other.identity.display_name(),
                other.rating,
                identity.display_name(),
                rating,
                code
            );
            state.resolve(other, &code, now);
            // A ticket the requester already held resolves to the same room.
            let own: Vec<String> = state
                .tickets
                .values()
                .filter(|t| t.identity.same_person(identity))
                .map(|t| t.id.clone())
                .collect();
            for id in own {
                if let Some(ticket) = state.remove(&id) {
                    state.resolve(ticket, &code, now);
                }
            }
            return Ok(QueueStatus::Matched { code });
        }

        if let Some(existing) = state
            .order
            .iter()
            .filter_map(|id| state.tickets.get(id))
            .find(|ticket| ticket.identity.same_person(identity))
        {
            return Ok(existing.status(now));
        }

        let (tx, rx) = watch::channel(None);
        let ticket = Ticket {
            id: generate_ticket_id(),
            identity: identity.clone(),
            rating,
            created: now,
            last_seen: now,
            tx,
            rx,
        };
        let status = ticket.status(now);
        debug!("Queued {} at {}", identity.display_name(), rating);
        state.order.push(ticket.id.clone());
        state.tickets.insert(ticket.id.clone(), ticket);
        Ok(status)
    }

    /// Current status of a ticket without waiting.
    pub fn status(&self, ticket: &str) -> Result<QueueStatus, ServiceError> {
        let state = self.lock();
        if let Some(resolved) = state.resolved.get(ticket) {
            return Ok(QueueStatus::Matched {
                code: resolved.code.clone(),
            });
        }
        state
            .tickets
            .get(ticket)
            .map(|t| t.status(Instant::now()))
            .ok_or_else(|| ServiceError::TicketNotFound(ticket.to_string()))
    }

    /// Retries pairing from the ticket's own window, then waits for a partner
    /// until the long-poll timeout. Dropping the future withdraws the ticket.
    pub async fn poll(&self, ticket: &str) -> Result<QueueStatus, ServiceError> {
        let mut rx = match self.try_pair(ticket)? {
            Ok(status) => return Ok(status),
            Err(rx) => rx,
        };

        let mut guard = WithdrawOnDrop {
            queue: self,
            ticket,
            armed: true,
        };
        let matched = tokio::select! {
            _ = wait_for_code(&mut rx) => true,
            _ = sleep(self.settings.long_poll_timeout) => false,
        };
        guard.armed = false;

        if !matched {
            debug!("Matchmaking poll for {} timed out", ticket);
        }
        self.status(ticket)
    }

    fn try_pair(
        &self,
        id: &str,
    ) -> Result<Result<QueueStatus, watch::Receiver<Option<String>>>, ServiceError> {
        let now = Instant::now();
        let mut state = self.lock();
        if let Some(resolved) = state.resolved.get(id) {
            return Ok(Ok(QueueStatus::Matched {
                code: resolved.code.clone(),
            }));
        }

        let Some(own) = state.tickets.get_mut(id) else {
            return Err(ServiceError::TicketNotFound(id.to_string()));
        };
        own.last_seen = now;
        let (identity, rating, range, created) = (
            own.identity.clone(),
            own.rating,
            own.tolerance(now),
            own.created,
        );

        let partner = state.order.iter().find(|other_id| {
            other_id.as_str() != id
                && state.tickets.get(*other_id).map_or(false, |other| {
                    !other.identity.same_person(&identity) && (other.rating - rating).abs() <= range
                })
        });
        let Some(partner) = partner.cloned() else {
            let rx = state.tickets.get(id).map(|own| own.rx.clone());
            return rx
                .map(Err)
                .ok_or_else(|| ServiceError::TicketNotFound(id.to_string()));
        };

        let Some(other) = state.tickets.get(&partner) else {
            return Err(ServiceError::TicketNotFound(partner));
        };
        let code = if created < other.created {
            self.sessions.create_match(&identity, &other.identity, true)?
        } else {
            self.sessions.create_match(&other.identity, &identity, true)?
        };
        info!(
            "Paired {} with {} in room {} after {}s",
            other.identity.display_name(),
            identity.display_name(),
            code,
            now.saturating_duration_since(other.created).as_secs()
        );

        for ticket_id in [partner.as_str(), id] {
            if let Some(ticket) = state.remove(ticket_id) {
                state.resolve(ticket, &code, now);
            }
        }
        Ok(Ok(QueueStatus::Matched { code }))
    }

    /// Removes a waiting ticket. Resolved tickets are left alone.
    pub fn withdraw(&self, ticket: &str) -> bool {
        let removed = self.lock().remove(ticket).is_some();
        if removed {
            debug!("Ticket {} withdrawn", ticket);
        }
        removed
    }

    /// Drops the ticket and any other ticket held by the same person.
    pub fn leave(&self, identity: &Identity, ticket: &str) {
        let mut state = self.lock();
        state.remove(ticket);
        let duplicates: Vec<String> = state
            .tickets
            .values()
            .filter(|t| t.identity.same_person(identity))
            .map(|t| t.id.clone())
            .collect();
        for id in duplicates {
            state.remove(&id);
        }
    }

    /// Forgets resolved tickets past the retention window and waiting tickets
    /// nobody has polled within the session TTL. Returns how many were dropped.
    pub fn sweep(&self, now: Instant) -> usize {
        let retention = self.settings.result_retention;
        let idle = self.settings.session_ttl;
        let mut state = self.lock();

        let before = state.resolved.len() + state.tickets.len();
        state
            .resolved
            .retain(|_, resolved| !older_than(resolved.at, retention, now));
        let abandoned: Vec<String> = state
            .tickets
            .values()
            .filter(|t| older_than(t.last_seen, idle, now))
            .map(|t| t.id.clone())
            .collect();
        for id in abandoned {
            state.remove(&id);
        }
        before - (state.resolved.len() + state.tickets.len())
    }
}

async fn wait_for_code(rx: &mut watch::Receiver<Option<String>>) {
    loop {
        if rx.borrow().is_some() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

struct WithdrawOnDrop<'a> {
    queue: &'a Matchmaker,
    ticket: &'a str,
    armed: bool,
}

impl Drop for WithdrawOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.queue.withdraw(self.ticket);
        }
    }
}
