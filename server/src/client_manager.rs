//! Connection bookkeeping for the presence server
//!
//! This module tracks every live websocket connection, whether or not it
//! has joined the world yet:
//! - Connection id assignment (random, unique among live connections)
//! - Capacity enforcement
//! - Outbound queues used for unicast and broadcast delivery
//!
//! Frames are encoded once by the caller and cloned into each recipient's
//! queue; a writer task per connection drains the queue onto the socket.
//! Queues are bounded. A connection whose queue is full has stopped reading
//! and is reported through [`ClientManager::take_stalled`] so the server can
//! drop it.

use log::{info, warn};
use rand::distributions::Alphanumeric;
use rand::Rng;
use shared::{ConnectionId, CONNECTION_ID_LEN};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_tungstenite::tungstenite::Message;

/// Frames a connection may have waiting before it counts as stalled
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// What happened to a queued frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Queued {
    Sent,
    /// The writer has gone away; the reader will report the close
    Closed,
    /// The peer is not draining its queue
    Full,
}

/// A live connection and the queue feeding its socket writer
#[derive(Debug)]
pub struct Client {
    pub id: ConnectionId,
    pub addr: SocketAddr,
    pub connected_at: Instant,
    sender: mpsc::Sender<Message>,
}

impl Client {
    pub fn new(id: ConnectionId, addr: SocketAddr, sender: mpsc::Sender<Message>) -> Self {
        Self {
            id,
            addr,
            connected_at: Instant::now(),
            sender,
        }
    }

    /// Queues a text frame without waiting for room
    pub fn send_text(&self, frame: &str) -> Queued {
        match self.sender.try_send(Message::Text(frame.to_string())) {
            Ok(()) => Queued::Sent,
            Err(TrySendError::Closed(_)) => Queued::Closed,
            Err(TrySendError::Full(_)) => Queued::Full,
        }
    }
}

/// Manages all live connections
pub struct ClientManager {
    clients: HashMap<ConnectionId, Client>,
    max_clients: usize,
    stalled: Vec<ConnectionId>,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            max_clients,
            stalled: Vec::new(),
        }
    }

    /// Registers a new connection
    ///
    /// Returns None when the server is at capacity. Ids are random
    /// alphanumeric strings; a draw that collides with a live id is redrawn.
    pub fn add_client(
        &mut self,
        addr: SocketAddr,
        sender: mpsc::Sender<Message>,
    ) -> Option<ConnectionId> {
        if self.clients.len() >= self.max_clients {
            warn!("Rejecting connection from {}: server full", addr);
            return None;
        }

        let id = loop {
            let candidate = Self::generate_id();
            if !self.clients.contains_key(&candidate) {
                break candidate;
            }
        };

        info!("Client {} connected from {}", id, addr);
        self.clients
            .insert(id.clone(), Client::new(id.clone(), addr, sender));
        Some(id)
    }

    /// Forgets a connection. Returns false if it was already gone.
    pub fn remove_client(&mut self, id: &ConnectionId) -> bool {
        match self.clients.remove(id) {
            Some(client) => {
                info!(
                    "Client {} disconnected after {:.1}s",
                    id,
                    client.connected_at.elapsed().as_secs_f32()
                );
                true
            }
            None => false,
        }
    }

    pub fn send_to(&mut self, id: &ConnectionId, frame: &str) -> bool {
        let Some(client) = self.clients.get(id) else {
            return false;
        };
        match client.send_text(frame) {
            Queued::Sent => true,
            Queued::Closed => false,
            Queued::Full => {
                self.stalled.push(id.clone());
                false
            }
        }
    }

    /// Queues a frame for every connection except `exclude`
    ///
    /// Returns the number of connections the frame was queued for.
    pub fn broadcast(&mut self, frame: &str, exclude: Option<&ConnectionId>) -> usize {
        let mut sent = 0;
        for client in self.clients.values() {
            if Some(&client.id) == exclude {
                continue;
            }
            match client.send_text(frame) {
                Queued::Sent => sent += 1,
                Queued::Closed => {}
                Queued::Full => self.stalled.push(client.id.clone()),
            }
        }
        sent
    }

    /// Connections whose queue overflowed since the last call
    pub fn take_stalled(&mut self) -> Vec<ConnectionId> {
        std::mem::take(&mut self.stalled)
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.clients.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    fn generate_id() -> ConnectionId {
        let id: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(CONNECTION_ID_LEN)
            .map(char::from)
            .collect();
        ConnectionId::new(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn channel() -> (mpsc::Sender<Message>, mpsc::Receiver<Message>) {
        mpsc::channel(OUTBOUND_QUEUE_CAPACITY)
    }

    fn drain(rx: &mut mpsc::Receiver<Message>) -> Vec<String> {
        let mut frames = Vec::new();
        while let Ok(Message::Text(text)) = rx.try_recv() {
            frames.push(text);
        }
        frames
    }

    #[test]
    fn test_generated_ids_are_alphanumeric() {
        let id = ClientManager::generate_id();
        assert_eq!(id.as_str().len(), CONNECTION_ID_LEN);
        assert!(id.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_add_and_remove_client() {
        let mut manager = ClientManager::new(4);
        let (tx, _rx) = channel();

        let id = manager.add_client(test_addr(), tx).unwrap();
        assert!(manager.contains(&id));
        assert_eq!(manager.len(), 1);

        assert!(manager.remove_client(&id));
        assert!(!manager.remove_client(&id));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_ids_are_unique_among_live_clients() {
        let mut manager = ClientManager::new(64);
        let mut ids = std::collections::HashSet::new();
        for _ in 0..64 {
            let (tx, _rx) = channel();
            ids.insert(manager.add_client(test_addr(), tx).unwrap());
        }
        assert_eq!(ids.len(), 64);
    }

    #[test]
    fn test_capacity_is_enforced() {
        let mut manager = ClientManager::new(1);
        let (tx1, _rx1) = channel();
        let (tx2, _rx2) = channel();

        assert!(manager.add_client(test_addr(), tx1).is_some());
        assert!(manager.add_client(test_addr(), tx2).is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_broadcast_skips_excluded_client() {
        let mut manager = ClientManager::new(4);
        let (tx_a, mut rx_a) = channel();
        let (tx_b, mut rx_b) = channel();
        let (tx_c, mut rx_c) = channel();
        let a = manager.add_client(test_addr(), tx_a).unwrap();
        manager.add_client(test_addr(), tx_b).unwrap();
        manager.add_client(test_addr(), tx_c).unwrap();

        assert_eq!(manager.broadcast("hello", Some(&a)), 2);
        assert!(drain(&mut rx_a).is_empty());
        assert_eq!(drain(&mut rx_b), vec!["hello"]);
        assert_eq!(drain(&mut rx_c), vec!["hello"]);

        assert_eq!(manager.broadcast("all", None), 3);
        assert_eq!(drain(&mut rx_a), vec!["all"]);
    }

    #[test]
    fn test_send_to_unknown_or_closed_client() {
        let mut manager = ClientManager::new(4);
        let (tx, rx) = channel();
        let id = manager.add_client(test_addr(), tx).unwrap();

        assert!(!manager.send_to(&ConnectionId::new("nobody"), "x"));
        assert!(manager.send_to(&id, "x"));

        drop(rx);
        assert!(!manager.send_to(&id, "x"));
    }

    #[test]
    fn test_full_queue_marks_client_stalled() {
        let mut manager = ClientManager::new(4);
        let (tx_slow, _rx_slow) = channel();
        let (tx_fast, mut rx_fast) = channel();
        let slow = manager.add_client(test_addr(), tx_slow).unwrap();
        manager.add_client(test_addr(), tx_fast).unwrap();

        for _ in 0..OUTBOUND_QUEUE_CAPACITY {
            assert_eq!(manager.broadcast("tick", None), 2);
            drain(&mut rx_fast);
        }
        assert!(manager.take_stalled().is_empty());

        assert_eq!(manager.broadcast("tick", None), 1);
        assert!(!manager.send_to(&slow, "tick"));
        assert_eq!(manager.take_stalled(), vec![slow.clone(), slow]);
        assert!(manager.take_stalled().is_empty());
    }
}
