//! # Arena Client Library
//!
//! Client side of the two-player arena synchronization core. The server
//! owns the truth; this crate makes the game *feel* local anyway:
//!
//! - **Prediction** — sampled input moves the local entity immediately,
//!   using the exact resolver and clamp the server will apply, so there
//!   is no perceived input lag.
//! - **Reconciliation** — each authoritative snapshot rewinds the local
//!   entity to the confirmed position, drops acknowledged commands and
//!   replays the rest. A correct prediction corrects by exactly nothing.
//! - **Interpolation** — the remote entity is rendered a fixed offset in
//!   the past, lerped between the two snapshots bracketing the render
//!   time, optionally eased to hide snapshot-rate stepping.
//!
//! Rendering and keyboard polling are the embedding application's
//! business: input arrives through a [`input::DirectionSource`] and the
//! drawable positions come out of
//! [`game::ClientGame::local_visual_position`] /
//! [`game::ClientGame::remote_visual_position`].

pub mod game;
pub mod input;
pub mod interpolation;
pub mod network;
