//! # Player Store Library
//!
//! A small realtime store for the shared pixel canvas. It holds the players
//! currently present and tells every subscriber about each write.
//!
//! ## Core Responsibilities
//!
//! ### Player Table
//! One in-memory `players` collection supporting insert-and-return,
//! update-by-id, delete-by-id and select-all. Writes are applied as given;
//! the store does not validate movement.
//!
//! ### Change Feed
//! Clients subscribe to the `players` table and receive an insert, update or
//! delete event for every write, including their own. Subscribers keep their
//! place with heartbeats and are dropped once they go silent.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Event Loop
//! A receiver task decodes datagrams and forwards them over a channel to one
//! main loop that owns the table. Requests are handled strictly in arrival
//! order, so every subscriber sees the same sequence of events.
//!
//! ### UDP-Based Communication
//! Requests carry an id that the reply echoes. Lost datagrams are not
//! retried; the client treats a missing reply like any other unconfirmed
//! write.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new("127.0.0.1:8080", ServerConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod network;
pub mod table;
