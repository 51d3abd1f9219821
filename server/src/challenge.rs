//! Directed friend-to-friend challenges.
//!
//! Works like a matchmaking ticket without the rating window: the challenger
//! waits on the invite's channel until the target accepts or declines it.

use crate::config::Settings;
use crate::error::ServiceError;
use crate::friends::FriendGraph;
use crate::session::SessionRegistry;
use crate::utils::{generate_ticket_id, older_than};
use log::{debug, info};
use shared::{normalize_account, ChallengeStatus, Identity, InviteSummary};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::watch;
use tokio::time::sleep;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Outcome {
    Accepted(String),
    Declined,
}

impl Outcome {
    fn status(&self) -> ChallengeStatus {
        match self {
            Outcome::Accepted(code) => ChallengeStatus::Accepted { code: code.clone() },
            Outcome::Declined => ChallengeStatus::Declined,
        }
    }
}

#[derive(Debug)]
struct Invite {
    ticket: String,
    challenger: Identity,
    challenger_key: String,
    target: String,
    created: Instant,
    tx: watch::Sender<Option<Outcome>>,
    rx: watch::Receiver<Option<Outcome>>,
}

#[derive(Debug, Default)]
struct InviteState {
    by_ticket: HashMap<String, Invite>,
    /// Target account key to pending tickets.
    by_target: HashMap<String, BTreeSet<String>>,
    resolved: HashMap<String, (Outcome, Instant)>,
}

impl InviteState {
    fn insert(&mut self, invite: Invite) {
        self.by_target
            .entry(invite.target.clone())
            .or_default()
            .insert(invite.ticket.clone());
        self.by_ticket.insert(invite.ticket.clone(), invite);
    }

    fn remove(&mut self, ticket: &str) -> Option<Invite> {
        let invite = self.by_ticket.remove(ticket)?;
        if let Some(pending) = self.by_target.get_mut(&invite.target) {
            pending.remove(ticket);
            if pending.is_empty() {
                self.by_target.remove(&invite.target);
            }
        }
        Some(invite)
    }

    fn resolve(&mut self, invite: Invite, outcome: Outcome, now: Instant) {
        invite.tx.send_replace(Some(outcome.clone()));
        self.resolved.insert(invite.ticket, (outcome, now));
    }
}

fn account_of(identity: &Identity) -> Result<String, ServiceError> {
    identity.account_key().ok_or(ServiceError::AccountRequired)
}

pub struct Challenges {
    state: Mutex<InviteState>,
    sessions: Arc<SessionRegistry>,
    friends: Arc<dyn FriendGraph>,
    settings: Settings,
}

impl Challenges {
    pub fn new(
        sessions: Arc<SessionRegistry>,
        friends: Arc<dyn FriendGraph>,
        settings: Settings,
    ) -> Self {
        Self {
            state: Mutex::new(InviteState::default()),
            sessions,
            friends,
            settings,
        }
    }

    fn lock(&self) -> MutexGuard<'_, InviteState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn send(&self, challenger: &Identity, target: &str) -> Result<ChallengeStatus, ServiceError> {
        let from = account_of(challenger)?;
        let to = normalize_account(target);
        if to.is_empty() || to == from {
            return Err(ServiceError::SelfChallenge);
        }
        if !self.friends.are_friends(&from, &to) {
            return Err(ServiceError::NotFriends);
        }

        let mut state = self.lock();
        let duplicate = state.by_target.get(&to).map_or(false, |pending| {
            pending.iter().any(|ticket| {
                state
                    .by_ticket
                    .get(ticket)
                    .map_or(false, |invite| invite.challenger_key == from)
            })
        });
        if duplicate {
            return Err(ServiceError::InviteExists(target.trim().to_string()));
        }

        let (tx, rx) = watch::channel(None);
        let invite = Invite {
            ticket: generate_ticket_id(),
            challenger: challenger.clone(),
            challenger_key: from,
            target: to.clone(),
            created: Instant::now(),
            tx,
            rx,
        };
        let status = ChallengeStatus::Pending {
            ticket: invite.ticket.clone(),
            target: to,
        };
        info!("{} challenged {}", challenger.display_name(), target.trim());
        state.insert(invite);
        Ok(status)
    }

    pub fn status(&self, ticket: &str) -> Result<ChallengeStatus, ServiceError> {
        let state = self.lock();
        if let Some((outcome, _)) = state.resolved.get(ticket) {
            return Ok(outcome.status());
        }
        state
            .by_ticket
            .get(ticket)
            .map(|invite| ChallengeStatus::Pending {
                ticket: invite.ticket.clone(),
                target: invite.target.clone(),
            })
            .ok_or_else(|| ServiceError::InviteNotFound(ticket.to_string()))
    }

    /// Waits for the target's answer until the long-poll timeout.
    pub async fn poll(&self, ticket: &str) -> Result<ChallengeStatus, ServiceError> {
        let mut rx = {
            let state = self.lock();
            if let Some((outcome, _)) = state.resolved.get(ticket) {
                return Ok(outcome.status());
            }
            state
                .by_ticket
                .get(ticket)
                .map(|invite| invite.rx.clone())
                .ok_or_else(|| ServiceError::InviteNotFound(ticket.to_string()))?
        };

        tokio::select! {
            _ = async {
                while rx.borrow().is_none() {
                    if rx.changed().await.is_err() {
                        break;
                    }
                }
            } => {}
            _ = sleep(self.settings.long_poll_timeout) => {
                debug!("Challenge poll for {} timed out", ticket);
            }
        }
        self.status(ticket)
    }

    /// Opens a room with the challenger in the first seat and returns its code.
    pub fn accept(&self, identity: &Identity, ticket: &str) -> Result<String, ServiceError> {
        let by = account_of(identity)?;
        let mut state = self.lock();
        let invite = state
            .by_ticket
            .get(ticket)
            .ok_or_else(|| ServiceError::InviteNotFound(ticket.to_string()))?;
        if invite.target != by {
            return Err(ServiceError::NotYourInvite);
        }

        let code = self.sessions.create_match(&invite.challenger, identity, false)?;
        if let Some(invite) = state.remove(ticket) {
            info!("{} accepted a challenge from {}", by, invite.challenger_key);
            state.resolve(invite, Outcome::Accepted(code.clone()), Instant::now());
        }
        Ok(code)
    }

    pub fn decline(&self, identity: &Identity, ticket: &str) -> Result<(), ServiceError> {
        let by = account_of(identity)?;
        let mut state = self.lock();
        match state.by_ticket.get(ticket) {
            None => return Err(ServiceError::InviteNotFound(ticket.to_string())),
            Some(invite) if invite.target != by => return Err(ServiceError::NotYourInvite),
            Some(_) => {}
        }
        if let Some(invite) = state.remove(ticket) {
            info!("{} declined a challenge from {}", by, invite.challenger_key);
            state.resolve(invite, Outcome::Declined, Instant::now());
        }
        Ok(())
    }

    /// Withdraws a pending invite. Only the challenger may do this.
    pub fn cancel(&self, identity: &Identity, ticket: &str) -> Result<(), ServiceError> {
        let mut state = self.lock();
        match state.by_ticket.get(ticket) {
            None => return Err(ServiceError::InviteNotFound(ticket.to_string())),
            Some(invite) if !invite.challenger.same_person(identity) => {
                return Err(ServiceError::NotChallenger)
            }
            Some(_) => {}
        }
        state.remove(ticket);
        debug!("Challenge {} cancelled", ticket);
        Ok(())
    }

    /// Pending invites addressed to `identity`, oldest first.
    pub fn incoming(&self, identity: &Identity) -> Result<Vec<InviteSummary>, ServiceError> {
        let me = account_of(identity)?;
        let now = Instant::now();
        let state = self.lock();
        let mut invites: Vec<&Invite> = state
            .by_target
            .get(&me)
            .into_iter()
            .flatten()
            .filter_map(|ticket| state.by_ticket.get(ticket))
            .collect();
        invites.sort_by_key(|invite| invite.created);
        Ok(invites
            .into_iter()
            .map(|invite| InviteSummary {
                ticket: invite.ticket.clone(),
                from: invite.challenger.display_name(),
                age_secs: now.saturating_duration_since(invite.created).as_secs(),
            })
            .collect())
    }

    /// Drops answers past the retention window and invites left unanswered
    /// for longer than the session TTL.
    pub fn sweep(&self, now: Instant) -> usize {
        let retention = self.settings.result_retention;
        let ttl = self.settings.session_ttl;
        let mut state = self.lock();
        let before = state.resolved.len() + state.by_ticket.len();

        state
            .resolved
            .retain(|_, (_, at)| !older_than(*at, retention, now));
        let stale: Vec<String> = state
            .by_ticket
            .values()
            .filter(|invite| older_than(invite.created, ttl, now))
            .map(|invite| invite.ticket.clone())
            .collect();
        for ticket in stale {
            state.remove(&ticket);
        }
        before - (state.resolved.len() + state.by_ticket.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::MemoryAccounts;
    use crate::friends::MemoryFriends;
    use std::time::Duration;

    fn setup(settings: Settings) -> (Arc<Challenges>, Arc<SessionRegistry>) {
        let sessions = Arc::new(SessionRegistry::new(
            Arc::new(MemoryAccounts::new()),
            settings.clone(),
        ));
        let friends = Arc::new(MemoryFriends::with_pairs([("alice", "bob"), ("alice", "carol")]));
        (
            Arc::new(Challenges::new(Arc::clone(&sessions), friends, settings)),
            sessions,
        )
    }

    fn player(name: &str) -> Identity {
        Identity::with_account(format!("pid-{}", name), name)
    }

    fn ticket_of(status: ChallengeStatus) -> String {
        match status {
            ChallengeStatus::Pending { ticket, .. } => ticket,
            other => panic!("expected a pending invite, got {:?}", other),
        }
    }

    #[test]
    fn test_send_rules() {
        let (challenges, _) = setup(Settings::default());
        assert_eq!(
            challenges.send(&Identity::guest("pid-g"), "bob"),
            Err(ServiceError::AccountRequired)
        );
        assert_eq!(
            challenges.send(&player("alice"), " Alice "),
            Err(ServiceError::SelfChallenge)
        );
        assert_eq!(
            challenges.send(&player("bob"), "carol"),
            Err(ServiceError::NotFriends)
        );

        challenges.send(&player("alice"), "Bob").unwrap();
        assert_eq!(
            challenges.send(&player("alice"), "bob"),
            Err(ServiceError::InviteExists("bob".to_string()))
        );
        // A different target is fine.
        assert!(challenges.send(&player("alice"), "carol").is_ok());
    }

    #[tokio::test]
    async fn test_accept_opens_room_and_wakes_challenger() {
        let (challenges, sessions) = setup(Settings::default());
        let ticket = ticket_of(challenges.send(&player("alice"), "bob").unwrap());

        let accepting = Arc::clone(&challenges);
        let accepted_ticket = ticket.clone();
        let acceptor = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            accepting.accept(&player("bob"), &accepted_ticket).unwrap()
        });

        let status = challenges.poll(&ticket).await.unwrap();
        let code = acceptor.await.unwrap();
        assert_eq!(status, ChallengeStatus::Accepted { code: code.clone() });

        let room = sessions.join(&code, &player("alice")).unwrap();
        assert_eq!(room.seat, Some(0));
        assert!(room.ready);
        assert!(!room.random);
        assert!(challenges.incoming(&player("bob")).unwrap().is_empty());
    }

    #[test]
    fn test_only_target_answers() {
        let (challenges, _) = setup(Settings::default());
        let ticket = ticket_of(challenges.send(&player("alice"), "bob").unwrap());
        assert_eq!(
            challenges.accept(&player("carol"), &ticket),
            Err(ServiceError::NotYourInvite)
        );
        assert_eq!(
            challenges.decline(&player("alice"), &ticket),
            Err(ServiceError::NotYourInvite)
        );

        challenges.decline(&player("bob"), &ticket).unwrap();
        assert_eq!(challenges.status(&ticket), Ok(ChallengeStatus::Declined));
        assert_eq!(
            challenges.accept(&player("bob"), &ticket),
            Err(ServiceError::InviteNotFound(ticket.clone()))
        );
    }

    #[test]
    fn test_only_challenger_cancels() {
        let (challenges, _) = setup(Settings::default());
        let ticket = ticket_of(challenges.send(&player("alice"), "bob").unwrap());
        assert_eq!(
            challenges.cancel(&player("bob"), &ticket),
            Err(ServiceError::NotChallenger)
        );
        challenges.cancel(&player("alice"), &ticket).unwrap();
        assert!(challenges.status(&ticket).is_err());
        assert!(challenges.incoming(&player("bob")).unwrap().is_empty());
        // Cancelling frees the slot for a new invite.
        assert!(challenges.send(&player("alice"), "bob").is_ok());
    }

    #[test]
    fn test_incoming_oldest_first() {
        let (challenges, _) = setup(Settings::default());
        let friends_of_alice = ["bob", "carol"];
        let first = ticket_of(challenges.send(&player("bob"), "alice").unwrap());
        std::thread::sleep(Duration::from_millis(5));
        let second = ticket_of(challenges.send(&player("carol"), "alice").unwrap());

        let invites = challenges.incoming(&player("alice")).unwrap();
        let tickets: Vec<&str> = invites.iter().map(|i| i.ticket.as_str()).collect();
        assert_eq!(tickets, vec![first.as_str(), second.as_str()]);
        let from: Vec<&str> = invites.iter().map(|i| i.from.as_str()).collect();
        assert_eq!(from, friends_of_alice);
    }

    #[tokio::test]
    async fn test_poll_times_out_pending() {
        let settings = Settings {
            long_poll_timeout: Duration::from_millis(20),
            ..Settings::default()
        };
        let (challenges, _) = setup(settings);
        let ticket = ticket_of(challenges.send(&player("alice"), "bob").unwrap());
        let status = challenges.poll(&ticket).await.unwrap();
        assert_eq!(ticket_of(status), ticket);
    }

    #[test]
    fn test_sweep_expires_answers() {
        let settings = Settings {
            result_retention: Duration::from_secs(30),
            ..Settings::default()
        };
        let (challenges, _) = setup(settings);
        let ticket = ticket_of(challenges.send(&player("alice"), "bob").unwrap());
        challenges.decline(&player("bob"), &ticket).unwrap();
        assert_eq!(challenges.sweep(Instant::now()), 0);
        assert_eq!(challenges.sweep(Instant::now() + Duration::from_secs(31)), 1);
        assert!(challenges.status(&ticket).is_err());
    }
}
