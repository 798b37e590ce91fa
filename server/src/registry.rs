//! Authoritative in-memory registry of joined players
//!
//! The registry is the single source of truth for who is online and where.
//! It is owned by the server loop and mutated only through the operations
//! below; clients never write into it directly, they only see what the
//! server echoes back.
//!
//! Entries are keyed by connection id and live from `joinGame` until the
//! connection goes away. Nothing is validated beyond applying defaults: a
//! connection may claim any username or user id, and moves overwrite the
//! position unconditionally.

use log::{debug, info, warn};
use shared::{ConnectionId, JoinRequest, MoveRequest, PlayerSession, Position};
use std::collections::HashMap;

#[derive(Debug)]
struct Entry {
    /// Join sequence number, used to keep snapshots in join order
    seq: u64,
    session: PlayerSession,
}

/// Table of active player sessions indexed by connection id
#[derive(Debug, Default)]
pub struct SessionRegistry {
    entries: HashMap<ConnectionId, Entry>,
    next_seq: u64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the session for a connection from its join payload
    ///
    /// Missing or falsy fields are replaced by defaults. Joining again on a
    /// connection that already has a session replaces the session but keeps
    /// its place in the snapshot order.
    pub fn join(&mut self, id: &ConnectionId, request: JoinRequest) -> PlayerSession {
        let session = request.into_session(id.clone());

        match self.entries.get_mut(id) {
            Some(entry) => {
                info!("Player {} re-joined on {}", session.username, id);
                entry.session = session.clone();
            }
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.entries.insert(
                    id.clone(),
                    Entry {
                        seq,
                        session: session.clone(),
                    },
                );
                info!(
                    "Player {} joined ({}). Total players: {}",
                    session.username,
                    id,
                    self.entries.len()
                );
            }
        }

        session
    }

    /// Overwrites the position of a joined connection
    ///
    /// Returns None when the connection has no session, e.g. a move that
    /// arrives before the join or after the disconnect, or when the target
    /// is not a finite point. Non-finite coordinates would encode as `null`
    /// and poison every later snapshot.
    pub fn apply_move(&mut self, id: &ConnectionId, request: MoveRequest) -> Option<&PlayerSession> {
        if !request.x.is_finite() || !request.y.is_finite() {
            warn!("Ignoring non-finite move from {}", id);
            return None;
        }
        let entry = self.entries.get_mut(id)?;
        entry.session.position = Position::new(request.x, request.y);
        debug!(
            "Player {} moved to ({:.1}, {:.1})",
            id, request.x, request.y
        );
        Some(&entry.session)
    }

    /// Deletes a session. Removing an unknown id is a no-op.
    pub fn remove(&mut self, id: &ConnectionId) -> Option<PlayerSession> {
        let removed = self.entries.remove(id).map(|entry| entry.session);
        if let Some(session) = &removed {
            info!(
                "Player {} left ({}). Total players: {}",
                session.username,
                id,
                self.entries.len()
            );
        }
        removed
    }

    pub fn get(&self, id: &ConnectionId) -> Option<&PlayerSession> {
        self.entries.get(id).map(|entry| &entry.session)
    }

    /// Snapshot of every session in join order
    pub fn all(&self) -> Vec<PlayerSession> {
        let mut entries: Vec<&Entry> = self.entries.values().collect();
        entries.sort_by_key(|entry| entry.seq);
        entries
            .into_iter()
            .map(|entry| entry.session.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
