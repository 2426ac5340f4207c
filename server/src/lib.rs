//! # Arena Server Library
//!
//! Authoritative side of the two-player arena. The server owns the only
//! trustworthy copy of both players' positions: clients send sequenced
//! input commands, the server integrates them on a fixed tick, and the
//! resulting state is broadcast back as timestamped snapshots that the
//! clients reconcile and interpolate against.
//!
//! ## Architecture
//!
//! A single event loop consumes everything — accepted connections,
//! inbound text frames, disconnects, and per-match tick events. Network
//! tasks never touch game state; they only enqueue events. This keeps the
//! simulation deterministic and the input queues single-writer /
//! single-reader without locks.
//!
//! ### Match lifecycle
//!
//! A connecting participant joins the open match if one is waiting for a
//! guest, otherwise a new match is created with them as host. Each match
//! gets its own ticker task whose handle lives in the registry; ending
//! the match (either side disconnecting) aborts the ticker, notifies the
//! survivor and re-queues them for a new match.
//!
//! ### Simulation tick
//!
//! Every fixed step the pending commands of each slot are drained into a
//! single direction sum, resolved into one displacement, clamped to the
//! arena, and the slot's last-processed sequence is advanced to the last
//! drained command. Every third tick the resulting state goes out as a
//! snapshot to both participants.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new("127.0.0.1:8080").await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod network;
pub mod registry;
