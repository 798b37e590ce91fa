//! Client-side roster of other players
//!
//! Merges roster snapshots and single-player deltas from the server into a
//! local table keyed by connection id. Positions are always the latest value
//! the server sent; nothing is predicted or interpolated for other players.
//! Updates about the local connection are ignored, since the local player's
//! own position is authoritative here.

use log::debug;
use shared::{ConnectionId, PlayerSession, Position};
use std::collections::BTreeMap;

/// Identifies a player on this client: the local player or a remote connection
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PlayerKey {
    Local,
    Remote(ConnectionId),
}

/// Local mirror of one other player's session
#[derive(Debug, Clone, PartialEq)]
pub struct ClientPlayerView {
    pub id: ConnectionId,
    pub user_id: Option<String>,
    pub username: String,
    pub position: Position,
    pub color: String,
    pub avatar: Option<String>,
    pub radius: f32,
    /// Wall-clock milliseconds of the last applied update
    pub last_update_time: u64,
}

impl ClientPlayerView {
    fn from_session(session: PlayerSession, now: u64) -> Self {
        Self {
            id: session.id,
            user_id: session.user_id,
            username: session.username,
            position: session.position,
            color: session.color,
            avatar: session.avatar,
            radius: session.radius,
            last_update_time: now,
        }
    }

    fn overwrite(&mut self, session: PlayerSession, now: u64) {
        self.position = session.position;
        self.color = session.color;
        self.username = session.username;
        self.avatar = session.avatar;
        self.radius = session.radius;
        self.user_id = session.user_id;
        self.last_update_time = now;
    }
}

/// An avatar image that should start loading for a newly seen player
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvatarRequest {
    pub id: ConnectionId,
    pub url: String,
}

#[derive(Debug, Default)]
pub struct Roster {
    local_id: Option<ConnectionId>,
    players: BTreeMap<ConnectionId, ClientPlayerView>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the id whose updates are treated as self-echoes and skipped
    pub fn set_local_id(&mut self, id: ConnectionId) {
        self.players.remove(&id);
        self.local_id = Some(id);
    }

    pub fn local_id(&self) -> Option<&ConnectionId> {
        self.local_id.as_ref()
    }

    /// Applies one player's state
    ///
    /// Existing entries are overwritten in place. New entries are inserted and,
    /// if they carry an avatar reference, an avatar request is returned.
    pub fn apply_update(&mut self, session: PlayerSession, now: u64) -> Option<AvatarRequest> {
        if self.local_id.as_ref() == Some(&session.id) {
            return None;
        }

        if let Some(view) = self.players.get_mut(&session.id) {
            view.overwrite(session, now);
            return None;
        }

        debug!("New player {} ({})", session.username, session.id);
        let request = session.avatar.clone().map(|url| AvatarRequest {
            id: session.id.clone(),
            url,
        });
        self.players
            .insert(session.id.clone(), ClientPlayerView::from_session(session, now));
        request
    }

    /// Applies a full roster snapshot entry by entry
    pub fn apply_snapshot(&mut self, players: Vec<PlayerSession>, now: u64) -> Vec<AvatarRequest> {
        players
            .into_iter()
            .filter_map(|session| self.apply_update(session, now))
            .collect()
    }

    pub fn remove(&mut self, id: &ConnectionId) -> Option<ClientPlayerView> {
        self.players.remove(id)
    }

    pub fn get(&self, id: &ConnectionId) -> Option<&ClientPlayerView> {
        self.players.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClientPlayerView> {
        self.players.values()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Drops every entry, e.g. after the connection is lost
    pub fn clear(&mut self) {
        self.players.clear();
    }
}
