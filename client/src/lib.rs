//! # Pixelverse Client Library
//!
//! Client side of the shared pixel canvas: players join with a name, steer a
//! colored square around a logical grid with WASD, and watch everyone else
//! move through the player store's change feed.
//!
//! ## Architecture Overview
//!
//! ### Optimistic Movement
//! A key press moves the local square immediately. The matching update is
//! sent to the store afterwards, and the square snaps back if the store
//! rejects it.
//!
//! ### Change-Feed Reconciliation
//! Every write to the `players` collection comes back to every subscriber,
//! the writer included. Inserts, updates and deletes are merged by player id.
//! Updates for the local player are echoes of writes already applied and are
//! dropped.
//!
//! ### Best-Effort Cleanup
//! Leaving, closing the window, or dropping a session all issue a delete for
//! the local player without waiting for an answer.
//!
//! ## Module Organization
//!
//! ### Engine Module (`engine`)
//! - Session lifecycle (`Uninitialized` through `Terminated`)
//! - Local player identity and its exclusive record
//! - Merged player map, echo suppression, optimistic apply and revert
//!
//! ### Session Module (`session`)
//! - Request ids and reply routing
//! - The `Transport` seam used by both the UDP link and tests
//!
//! ### Network Module (`network`)
//! - UDP socket on a background tokio runtime
//! - Heartbeats and simulated latency
//!
//! ### Input Module (`input`)
//! - WASD to movement intents, every key repeat included
//!
//! ### Rendering Module (`rendering`)
//! - Pure frame planning from the player map
//! - macroquad painting, roster and leave button
//!
//! ### Menu and App Modules (`menu`, `app`)
//! - Name-entry form and the window loop switching between scenes
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::StoreLink;
//! use client::session::Session;
//! use shared::Direction;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let link = StoreLink::connect("127.0.0.1:8080", 0)?;
//! let mut session = Session::start(link, "Alice")?;
//!
//! loop {
//!     // Apply replies and change events
//!     session.pump();
//!
//!     // Optimistic move, sent to the store
//!     session.handle_direction(Direction::Up);
//!
//!     if session.engine().players().len() > 1 {
//!         break;
//!     }
//! }
//!
//! session.leave();
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod engine;
pub mod input;
pub mod menu;
pub mod network;
pub mod rendering;
pub mod session;
