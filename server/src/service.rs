use crate::accounts::{MemoryAccounts, RatingStore};
use crate::challenge::Challenges;
use crate::config::Settings;
use crate::error::ServiceError;
use crate::friends::{FriendGraph, MemoryFriends};
use crate::matchmaking::Matchmaker;
use crate::session::SessionRegistry;
use log::{debug, info};
use shared::{BotLevel, Identity, Packet};
use std::sync::Arc;
use std::time::Instant;

/// Every player-facing operation behind one request/response entry point.
pub struct GameService {
    sessions: Arc<SessionRegistry>,
    matchmaker: Matchmaker,
    challenges: Challenges,
    accounts: Arc<dyn RatingStore>,
    settings: Settings,
}

impl GameService {
    /// In-memory accounts, with the friend graph seeded from `settings`.
    pub fn new(settings: Settings) -> Self {
        let friends = MemoryFriends::with_pairs(settings.friends.iter().cloned());
        Self::with_stores(Arc::new(MemoryAccounts::new()), Arc::new(friends), settings)
    }

    pub fn with_stores(
        accounts: Arc<dyn RatingStore>,
        friends: Arc<dyn FriendGraph>,
        settings: Settings,
    ) -> Self {
        let sessions = Arc::new(SessionRegistry::new(Arc::clone(&accounts), settings.clone()));
        Self {
            matchmaker: Matchmaker::new(Arc::clone(&sessions), settings.clone()),
            challenges: Challenges::new(Arc::clone(&sessions), friends, settings.clone()),
            sessions,
            accounts,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Answers one request. Failures become `Packet::Error`.
    pub async fn handle(&self, request: Packet) -> Packet {
        let name = request.name();
        match self.dispatch(request).await {
            Ok(response) => response,
            Err(err) => {
                debug!("{} failed: {}", name, err);
                Packet::Error {
                    kind: err.kind(),
                    message: err.to_string(),
                }
            }
        }
    }

    async fn dispatch(&self, request: Packet) -> Result<Packet, ServiceError> {
        let response = match request {
            Packet::CreateRoom { identity } => Packet::Room(self.sessions.create(&identity)?),
            Packet::JoinRoom { identity, code } => {
                Packet::Room(self.sessions.join(&code, &identity)?)
            }
            Packet::StartTraining { identity, level } => Packet::Room(
                self.sessions
                    .create_training(&identity, BotLevel::new(level))?,
            ),
            Packet::Play {
                identity,
                code,
                column,
            } => Packet::Room(self.sessions.play(&code, &identity, column)?),
            Packet::ReadRoom {
                identity,
                code,
                since,
                long_poll,
            } => Packet::Room(self.sessions.read(&code, &identity, since, long_poll).await?),
            Packet::Rematch { identity, code } => {
                Packet::Room(self.sessions.rematch(&code, &identity)?)
            }

            Packet::JoinMatchmaking { identity } => {
                let rating = self
                    .rating_of(&identity)
                    .ok_or(ServiceError::AccountRequired)?;
                Packet::Queue(self.matchmaker.enqueue(&identity, rating)?)
            }
            Packet::PollMatchmaking { ticket } => Packet::Queue(self.matchmaker.poll(&ticket).await?),
            Packet::LeaveMatchmaking { identity, ticket } => {
                self.matchmaker.leave(&identity, &ticket);
                Packet::Ack
            }

            Packet::SendChallenge { identity, target } => {
                Packet::Challenge(self.challenges.send(&identity, &target)?)
            }
            Packet::PollChallenge { ticket } => {
                Packet::Challenge(self.challenges.poll(&ticket).await?)
            }
            Packet::AcceptChallenge { identity, ticket } => {
                let code = self.challenges.accept(&identity, &ticket)?;
                Packet::Room(self.sessions.read(&code, &identity, None, false).await?)
            }
            Packet::DeclineChallenge { identity, ticket } => {
                self.challenges.decline(&identity, &ticket)?;
                Packet::Ack
            }
            Packet::CancelChallenge { identity, ticket } => {
                self.challenges.cancel(&identity, &ticket)?;
                Packet::Ack
            }
            Packet::ListInvites { identity } => {
                Packet::Invites(self.challenges.incoming(&identity)?)
            }

            Packet::Leaderboard { query } => Packet::Standings(self.accounts.leaderboard(&query)),
            Packet::Profile { name } => Packet::Account(
                self.accounts
                    .lookup(&name)
                    .ok_or_else(|| ServiceError::AccountNotFound(name.trim().to_string()))?,
            ),

            response => return Err(ServiceError::BadRequest(response.name())),
        };
        Ok(response)
    }

    /// One pass of background housekeeping over rooms, queue and invites.
    pub fn sweep(&self, now: Instant) {
        let rooms = self.sessions.sweep(now);
        let tickets = self.matchmaker.sweep(now);
        let invites = self.challenges.sweep(now);
        if rooms.forfeited + rooms.evicted + tickets + invites > 0 {
            info!(
                "Sweep: {} forfeited, {} rooms evicted, {} tickets and {} invites dropped",
                rooms.forfeited, rooms.evicted, tickets, invites
            );
        }
    }

    /// Rating of the caller's account, created on first use. `None` for guests.
    fn rating_of(&self, identity: &Identity) -> Option<i32> {
        identity.account_key().map(|key| self.accounts.rating(&key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{ChallengeStatus, ErrorKind, GameStatus, QueueStatus, RoomSnapshot};

    fn service() -> GameService {
        GameService::new(Settings {
            friends: vec![("alice".to_string(), "bob".to_string())],
            ..Settings::default()
        })
    }

    fn player(name: &str) -> Identity {
        Identity::with_account(format!("pid-{}", name), name)
    }

    fn room(packet: Packet) -> RoomSnapshot {
        match packet {
            Packet::Room(snapshot) => snapshot,
            other => panic!("expected a room, got {:?}", other),
        }
    }

    fn error_kind(packet: Packet) -> ErrorKind {
        match packet {
            Packet::Error { kind, .. } => kind,
            other => panic!("expected an error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_room_flow_through_packets() {
        let service = service();
        let created = room(
            service
                .handle(Packet::CreateRoom {
                    identity: player("alice"),
                })
                .await,
        );
        let code = created.code.clone();
        let joined = room(
            service
                .handle(Packet::JoinRoom {
                    identity: player("bob"),
                    code: code.to_lowercase(),
                })
                .await,
        );
        assert!(joined.ready);
        assert_eq!(joined.seat, Some(1));

        let played = room(
            service
                .handle(Packet::Play {
                    identity: player("alice"),
                    code: code.clone(),
                    column: 3,
                })
                .await,
        );
        assert_eq!(played.last_move, Some((5, 3)));
        assert_eq!(played.status, GameStatus::InProgress);

        let refused = service
            .handle(Packet::Play {
                identity: player("alice"),
                code,
                column: 3,
            })
            .await;
        assert_eq!(error_kind(refused), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_errors_are_classified() {
        let service = service();
        let missing = service
            .handle(Packet::JoinRoom {
                identity: player("alice"),
                code: "ZZZZZZ".to_string(),
            })
            .await;
        assert_eq!(error_kind(missing), ErrorKind::NotFound);

        let guest_queue = service
            .handle(Packet::JoinMatchmaking {
                identity: Identity::guest("pid-guest"),
            })
            .await;
        assert_eq!(error_kind(guest_queue), ErrorKind::Unauthorized);

        let stray_response = service.handle(Packet::Ack).await;
        assert_eq!(error_kind(stray_response), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_matchmaking_uses_stored_ratings() {
        let service = service();
        let first = match service
            .handle(Packet::JoinMatchmaking {
                identity: player("alice"),
            })
            .await
        {
            Packet::Queue(QueueStatus::Waiting {
                rating,
                min_rating,
                max_rating,
                ..
            }) => {
                assert_eq!(rating, 1500);
                assert_eq!((min_rating, max_rating), (1450, 1550));
                rating
            }
            other => panic!("expected a waiting ticket, got {:?}", other),
        };
        assert_eq!(service.rating_of(&player("alice")), Some(first));

        match service
            .handle(Packet::JoinMatchmaking {
                identity: player("bob"),
            })
            .await
        {
            Packet::Queue(QueueStatus::Matched { code }) => {
                let snapshot = service
                    .sessions()
                    .join(&code, &player("alice"))
                    .unwrap();
                assert_eq!(snapshot.seat, Some(0));
                assert!(snapshot.random);
            }
            other => panic!("expected a match, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_challenge_accept_returns_room() {
        let service = service();
        let ticket = match service
            .handle(Packet::SendChallenge {
                identity: player("alice"),
                target: "bob".to_string(),
            })
            .await
        {
            Packet::Challenge(ChallengeStatus::Pending { ticket, .. }) => ticket,
            other => panic!("expected a pending invite, got {:?}", other),
        };

        match service
            .handle(Packet::ListInvites {
                identity: player("bob"),
            })
            .await
        {
            Packet::Invites(invites) => {
                assert_eq!(invites.len(), 1);
                assert_eq!(invites[0].from, "alice");
            }
            other => panic!("expected invites, got {:?}", other),
        }

        let accepted = room(
            service
                .handle(Packet::AcceptChallenge {
                    identity: player("bob"),
                    ticket: ticket.clone(),
                })
                .await,
        );
        assert_eq!(accepted.seat, Some(1));
        assert!(accepted.ready);

        match service.handle(Packet::PollChallenge { ticket }).await {
            Packet::Challenge(ChallengeStatus::Accepted { code }) => {
                assert_eq!(code, accepted.code)
            }
            other => panic!("expected acceptance, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_leaderboard_and_profile() {
        let service = service();
        service.rating_of(&player("Carol"));
        match service
            .handle(Packet::Profile {
                name: "CAROL".to_string(),
            })
            .await
        {
            Packet::Account(summary) => {
                assert_eq!(summary.rating, 1500);
                assert_eq!(summary.games, 0);
            }
            other => panic!("expected a profile, got {:?}", other),
        }

        let unknown = service
            .handle(Packet::Profile {
                name: "nobody".to_string(),
            })
            .await;
        assert_eq!(error_kind(unknown), ErrorKind::NotFound);

        match service
            .handle(Packet::Leaderboard {
                query: "car".to_string(),
            })
            .await
        {
            Packet::Standings(rows) => assert_eq!(rows.len(), 1),
            other => panic!("expected standings, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_training_starts_with_bot_seated() {
        let service = service();
        let snapshot = room(
            service
                .handle(Packet::StartTraining {
                    identity: Identity::guest("pid-g"),
                    level: 9,
                })
                .await,
        );
        assert_eq!(snapshot.bot_level, Some(BotLevel::new(5)));
        assert_eq!(snapshot.names[1], "Bot Master");
        assert!(snapshot.ready);
        assert!(snapshot.can_play);
    }
}
