//! # Presence Server Library
//!
//! This library provides the authoritative server side of the shared 2D world.
//! It keeps the registry of who is online and where, and relays positions and
//! chat between connected browser or native clients in near-real time.
//!
//! ## Core Responsibilities
//!
//! ### Session Registry
//! One in-memory table maps each live connection to its player record. It is
//! the only place positions are stored; clients only ever see what the server
//! echoes back. Nothing is persisted, and the table lives as long as the process.
//!
//! ### Broadcast Protocol
//! Inbound events are turned into registry mutations and outbound events:
//! - A joining client receives the full roster once (`playersUpdate`)
//! - Everyone else receives only the single new player (`playerUpdate`)
//! - Moves fan out to everyone except the mover
//! - Chat fans out to everyone, including the sender
//! - Disconnects are announced to every remaining connection
//!
//! ### Connection Management
//! Tracks every live websocket, assigns connection ids, enforces the capacity
//! limit and owns the outbound queue for each connection.
//!
//! ## Architecture Design
//!
//! ### Single Event Loop
//! Reader tasks decode frames and forward them to one main loop, which owns all
//! state and handles each event to completion before the next. No locks are
//! needed. Events from one connection stay in order; events from different
//! connections may interleave arbitrarily, which is safe because they touch
//! disjoint registry entries.
//!
//! ### Lenient Input
//! Missing or malformed join fields are defaulted, never rejected. Moves and
//! chat from connections that have not joined are dropped. Undecodable frames
//! are logged and ignored. No client message can take the server down.
//!
//! ## Module Organization
//!
//! - `registry`: the session table and its insert/update/remove/snapshot API
//! - `dispatch`: event handling and fan-out rules
//! - `client_manager`: live connections, ids and outbound queues
//! - `network`: websocket accept loop, per-connection tasks and the main loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Bind to an address and allow up to 1024 concurrent connections
//!     let mut server = Server::bind("127.0.0.1:3000", 1024).await?;
//!
//!     // Accepts connections and processes their events until the process exits
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Security Considerations
//!
//! Identity claims in `joinGame` are not verified and reported positions are
//! not checked for plausibility. Any connection can claim any username and
//! teleport anywhere. Both are known, accepted gaps.

pub mod client_manager;
pub mod dispatch;
pub mod network;
pub mod registry;
