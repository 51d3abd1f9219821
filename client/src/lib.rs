//! # Connect-Four Client Library
//!
//! Thin client for the game server. Every request opens its own TCP
//! connection, sends one frame and reads one frame back, so the client keeps
//! no connection state of its own; room state lives on the server and the
//! client simply holds the newest snapshot it has seen.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! Typed request helpers over the shared frame codec, with server-side
//! rejections surfaced as `ClientError::Server`.
//!
//! ### Game Module (`game`)
//! Local view of the current room. Snapshots older than the held revision
//! are ignored, and the held revision is what the next long poll waits past.
//!
//! ### Input Module (`input`)
//! Parses typed commands such as `join ABC234` or a bare column number.
//!
//! ### Rendering Module (`rendering`)
//! Draws a snapshot as text.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::{random_player_id, Client};
//! use shared::Identity;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new("127.0.0.1:8080", Identity::guest(random_player_id()));
//!     let room = client.create_room().await?;
//!
//!     // Blocks until someone joins or the server's long-poll timeout passes.
//!     let room = client.read_room(&room.code, Some(room.revision), true).await?;
//!     println!("{}", client::rendering::render_room(&room));
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod input;
pub mod network;
pub mod rendering;
