//! # Plaza Client Library
//!
//! This library provides the client side of the shared 2D plaza: a window in
//! which the local player walks around, sees everyone else who is connected,
//! and exchanges short chat messages that float above the speaker.
//!
//! ## Architecture Overview
//!
//! The client is split between two threads that never share state directly:
//!
//! ### Render Thread
//! macroquad drives one frame callback on the main thread. Each frame drains
//! whatever the network thread delivered, applies it to the client state,
//! samples input, moves the local player, and redraws everything. Because
//! inbound events are applied at a single point in the frame, the roster is
//! never mutated while it is being drawn.
//!
//! ### Network Thread
//! A tokio runtime on a background thread owns the websocket. It forwards
//! decoded server events to the render thread, sends whatever the render
//! thread asks it to, downloads avatar images and runs the backstop timers
//! for chat bubbles.
//!
//! ### Local Authority
//! The local player's position is authoritative on this client. It is
//! reported to the server at a throttled rate and never corrected from the
//! server's echo. Other players are drawn exactly where the server last said
//! they were, with no prediction or interpolation.
//!
//! ## Module Organization
//!
//! - `game`: [`game::ClientState`], the single owner of client-side state
//! - `roster`: reconciles roster snapshots and deltas into per-player views
//! - `throttle`: decides when a position report goes out
//! - `chat`: chat log, self-expiring speech bubbles and the text composer
//! - `avatar`: one-shot avatar loading with a keyed cache and circle masking
//! - `camera`: world/screen projection that keeps the local player centered
//! - `input`: key sampling with press edge detection
//! - `rendering`: the per-frame draw pass
//! - `minimap`: fixed-scale overview in the corner
//! - `network`: the background websocket thread and its channels
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::game::{ClientState, Profile};
//! use client::network::NetworkHandle;
//! use macroquad::texture::Texture2D;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut state: ClientState<Texture2D> =
//!     ClientState::new(Profile::default(), "http://127.0.0.1:3000");
//! let mut network = NetworkHandle::spawn("ws://127.0.0.1:3000".to_string())?;
//!
//! // Once per frame
//! for event in network.drain() {
//!     for command in state.handle_network_event(event, shared::now_millis(), Texture2D::from_image) {
//!         network.send(command);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod avatar;
pub mod camera;
pub mod chat;
pub mod game;
pub mod input;
pub mod minimap;
pub mod network;
pub mod rendering;
pub mod roster;
pub mod throttle;
