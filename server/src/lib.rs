//! # Connect-Four Game Server Library
//!
//! The authoritative side of the game. Every room, move, queue ticket and
//! invite lives here; clients only ever see snapshots of it.
//!
//! ## Core Responsibilities
//!
//! ### Rooms
//! The session registry owns every room keyed by its six-character code. A
//! room holds the game, two seats, a revision counter that grows on every
//! observable change, and a turn clock. An expired clock forfeits the game to
//! the player who was waiting.
//!
//! ### Waiting For Change
//! Reads may park until a room moves past a known revision. Each room carries
//! a notifier; a parked read is released on change, on timeout, or when its
//! connection goes away.
//!
//! ### Pairing Players
//! The matchmaking queue pairs rated accounts whose ratings fall inside a
//! window that widens while they wait. Friends can also challenge each other
//! directly.
//!
//! ## Module Organization
//!
//! - `session`: room registry, turn clock, rematch and the training bot
//! - `notify`: per-room change notification
//! - `matchmaking`: rating-window queue
//! - `challenge`: directed friend invites
//! - `accounts` / `friends`: rating store and friendship graph
//! - `service`: request dispatch over all of the above
//! - `network`: TCP front end and background sweeper
//! - `config` / `error` / `utils`: ambient plumbing
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::Settings;
//! use server::network::Server;
//! use server::service::GameService;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = Arc::new(GameService::new(Settings::default()));
//!     let server = Server::bind("127.0.0.1:8080", service).await?;
//!
//!     // Accepts connections, serves one request per connection and sweeps
//!     // stale rooms in the background.
//!     server.run().await;
//!     Ok(())
//! }
//! ```

pub mod accounts;
pub mod challenge;
pub mod config;
pub mod error;
pub mod friends;
pub mod matchmaking;
pub mod network;
pub mod notify;
pub mod service;
pub mod session;
pub mod utils;
