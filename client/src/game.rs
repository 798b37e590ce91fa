//! Client-side world state
//!
//! Owns the local player, the roster of everyone else, chat, zoom and the
//! avatar cache. Both inbound network events and per-frame input are applied
//! here from the render thread, so nothing in this module needs locking.
//! Side effects that need the network thread come back as [`Command`]s.

use crate::avatar::{resolve_url, AvatarCache, AvatarSlot};
use crate::camera::Zoom;
use crate::chat::{ChatBubble, ChatBubbles, ChatLine, ChatLog};
use crate::input::{FrameInput, MOVE_SPEED};
use crate::network::{Command, NetworkEvent};
use crate::roster::{AvatarRequest, PlayerKey, Roster};
use crate::throttle::UpdateThrottle;
use log::{error, info, warn};
use macroquad::texture::Image;
use shared::{
    ChatBroadcast, ChatRequest, ClientEvent, ConnectionId, JoinRequest, MoveRequest, Position,
    ServerEvent, DEFAULT_COLOR, DEFAULT_RADIUS,
};

/// Who the local player claims to be when joining
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub username: String,
    pub user_id: Option<String>,
    pub color: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalPlayer {
    pub profile: Profile,
    pub position: Position,
    pub radius: f32,
    /// Movement keys were held on the last frame
    pub moving: bool,
}

pub struct ClientState<T> {
    pub local: LocalPlayer,
    pub roster: Roster,
    pub bubbles: ChatBubbles,
    pub chat_log: ChatLog,
    pub avatars: AvatarCache<PlayerKey, T>,
    pub zoom: Zoom,

    local_id: Option<ConnectionId>,
    throttle: UpdateThrottle,
    asset_base: String,
    last_error: Option<String>,
}

impl<T> ClientState<T> {
    pub fn new(profile: Profile, asset_base: impl Into<String>) -> Self {
        Self {
            local: LocalPlayer {
                profile,
                position: Position::new(0.0, 0.0),
                radius: DEFAULT_RADIUS,
                moving: false,
            },
            roster: Roster::new(),
            bubbles: ChatBubbles::new(),
            chat_log: ChatLog::new(),
            avatars: AvatarCache::new(),
            zoom: Zoom::default(),
            local_id: None,
            throttle: UpdateThrottle::new(),
            asset_base: asset_base.into(),
            last_error: None,
        }
    }

    pub fn local_id(&self) -> Option<&ConnectionId> {
        self.local_id.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.local_id.is_some()
    }

    /// Why the connection was lost, if it was
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Commands to issue once at startup
    pub fn start(&mut self) -> Vec<Command> {
        let Some(url) = self.local.profile.avatar_url.clone() else {
            return Vec::new();
        };
        if !self.avatars.request(PlayerKey::Local) {
            return Vec::new();
        }
        vec![Command::LoadAvatar {
            key: PlayerKey::Local,
            url: resolve_url(&self.asset_base, &url),
        }]
    }

    fn join_request(&self) -> JoinRequest {
        let profile = &self.local.profile;
        JoinRequest {
            id: profile.user_id.clone(),
            username: Some(profile.username.clone()),
            x: Some(self.local.position.x),
            y: Some(self.local.position.y),
            color: Some(profile.color.clone()),
            avatar: profile.avatar_url.clone(),
            radius: Some(self.local.radius),
        }
    }

    fn avatar_commands(&mut self, requests: Vec<AvatarRequest>) -> Vec<Command> {
        requests
            .into_iter()
            .filter_map(|request| {
                let key = PlayerKey::Remote(request.id);
                if !self.avatars.request(key.clone()) {
                    return None;
                }
                Some(Command::LoadAvatar {
                    key,
                    url: resolve_url(&self.asset_base, &request.url),
                })
            })
            .collect()
    }

    fn receive_chat(&mut self, chat: ChatBroadcast, now: u64) -> Vec<Command> {
        let own = self.local_id.as_ref() == Some(&chat.player_id);
        info!("{}: {}", chat.username, chat.message);

        self.chat_log.push(ChatLine {
            username: chat.username.clone(),
            message: chat.message.clone(),
            own,
        });

        let key = if own {
            PlayerKey::Local
        } else {
            PlayerKey::Remote(chat.player_id)
        };
        self.bubbles.insert(
            key.clone(),
            ChatBubble {
                message: chat.message,
                username: chat.username,
                position: Position::new(chat.x, chat.y),
                timestamp: now,
            },
        );
        vec![Command::ScheduleBubbleExpiry {
            key,
            timestamp: now,
        }]
    }

    fn handle_server_event(&mut self, event: ServerEvent, now: u64) -> Vec<Command> {
        match event {
            ServerEvent::Connected(id) => {
                info!("Connected as {}", id);
                self.roster.set_local_id(id.clone());
                self.local_id = Some(id);
                self.last_error = None;
                self.throttle.reset();
                vec![Command::Send(ClientEvent::JoinGame(self.join_request()))]
            }
            ServerEvent::PlayersUpdate(players) => {
                let requests = self.roster.apply_snapshot(players, now);
                info!("Roster: {} other players", self.roster.len());
                self.avatar_commands(requests)
            }
            ServerEvent::PlayerUpdate(update) => {
                let requests = self.roster.apply_update(update.player, now).into_iter().collect();
                self.avatar_commands(requests)
            }
            ServerEvent::ChatMessage(chat) => self.receive_chat(chat, now),
            ServerEvent::PlayerDisconnect(id) => {
                if let Some(player) = self.roster.remove(&id) {
                    info!("{} left", player.username);
                }
                let key = PlayerKey::Remote(id);
                self.avatars.evict(&key);
                self.bubbles.remove(&key);
                Vec::new()
            }
        }
    }

    /// Applies one event from the network thread
    ///
    /// `upload` turns a decoded avatar into whatever the renderer draws; it is
    /// only called if the avatar is still wanted.
    pub fn handle_network_event(
        &mut self,
        event: NetworkEvent,
        now: u64,
        upload: impl FnOnce(&Image) -> T,
    ) -> Vec<Command> {
        match event {
            NetworkEvent::Server(event) => self.handle_server_event(event, now),
            NetworkEvent::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.local_id = None;
                self.last_error = Some(reason);
                self.roster.clear();
                self.bubbles.retain(|key| *key == PlayerKey::Local);
                self.avatars.retain(|key| *key == PlayerKey::Local);
                Vec::new()
            }
            NetworkEvent::AvatarLoaded { key, image } => {
                if matches!(self.avatars.slot(&key), Some(AvatarSlot::Loading)) {
                    self.avatars.complete(&key, upload(&image));
                }
                Vec::new()
            }
            NetworkEvent::AvatarFailed { key, reason } => {
                error!("Failed to load avatar for {:?}: {}", key, reason);
                self.avatars.fail(&key);
                Vec::new()
            }
            NetworkEvent::BubbleExpired { key, timestamp } => {
                self.bubbles.expire_if_matches(&key, timestamp);
                Vec::new()
            }
        }
    }

    /// Applies this frame's input and returns what should go to the server
    pub fn update(&mut self, input: &FrameInput, dt: f32, now: u64) -> Vec<Command> {
        if input.reset_zoom {
            self.zoom.reset();
        }
        if input.zoom_delta != 0.0 {
            self.zoom.adjust(input.zoom_delta);
        }

        let step = input.direction.displacement(MOVE_SPEED, dt);
        self.local.position.x += step.x;
        self.local.position.y += step.y;
        self.local.moving = input.direction.is_moving();

        let mut commands = Vec::new();
        if !self.is_connected() {
            return commands;
        }

        if let Some(message) = &input.chat_message {
            commands.push(Command::Send(ClientEvent::ChatMessage(ChatRequest {
                message: message.clone(),
            })));
        }

        if self.throttle.should_send(self.local.position, now) {
            commands.push(Command::Send(ClientEvent::PlayerMove(MoveRequest {
                x: self.local.position.x,
                y: self.local.position.y,
            })));
        }
        commands
    }

    /// Lazy bubble expiry, run by the render pass before drawing
    ///
    /// Drops bubbles past their lifetime and bubbles whose sender is no
    /// longer in the roster.
    pub fn prune_bubbles(&mut self, now: u64) {
        self.bubbles.sweep(now);
        let roster = &self.roster;
        self.bubbles.retain(|key| match key {
            PlayerKey::Local => true,
            PlayerKey::Remote(id) => roster.get(id).is_some(),
        });
    }

    /// Where a player's bubble is drawn: the player's current position
    pub fn anchor(&self, key: &PlayerKey) -> Option<Position> {
        match key {
            PlayerKey::Local => Some(self.local.position),
            PlayerKey::Remote(id) => self.roster.get(id).map(|player| player.position),
        }
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            username: shared::DEFAULT_USERNAME.to_string(),
            user_id: None,
            color: DEFAULT_COLOR.to_string(),
            avatar_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Direction;
    use assert_approx_eq::assert_approx_eq;
    use shared::{PlayerSession, PlayerUpdate};

    fn state() -> ClientState<u32> {
        ClientState::new(
            Profile {
                username: "Bo".to_string(),
                ..Default::default()
            },
            "http://localhost:3000",
        )
    }

    fn no_upload(_: &Image) -> u32 {
        0
    }

    fn server(state: &mut ClientState<u32>, event: ServerEvent, now: u64) -> Vec<Command> {
        state.handle_network_event(NetworkEvent::Server(event), now, no_upload)
    }

    fn session(id: &str, name: &str, x: f32, y: f32) -> PlayerSession {
        PlayerSession {
            id: ConnectionId::new(id),
            user_id: None,
            username: name.to_string(),
            position: Position::new(x, y),
            color: DEFAULT_COLOR.to_string(),
            avatar: None,
            radius: DEFAULT_RADIUS,
        }
    }

    fn chat(from: &str, name: &str, message: &str) -> ServerEvent {
        ServerEvent::ChatMessage(ChatBroadcast {
            player_id: ConnectionId::new(from),
            username: name.to_string(),
            message: message.to_string(),
            x: 10.0,
            y: 0.0,
            timestamp: 0,
        })
    }

    fn connected(state: &mut ClientState<u32>, id: &str) {
        server(state, ServerEvent::Connected(ConnectionId::new(id)), 0);
    }

    #[test]
    fn test_connected_sends_join() {
        let mut state = state();
        state.local.position = Position::new(100.0, 0.0);
        let commands = server(&mut state, ServerEvent::Connected(ConnectionId::new("bo")), 0);

        assert!(state.is_connected());
        match &commands[..] {
            [Command::Send(ClientEvent::JoinGame(join))] => {
                assert_eq!(join.username.as_deref(), Some("Bo"));
                assert_eq!(join.x, Some(100.0));
                assert_eq!(join.color.as_deref(), Some(DEFAULT_COLOR));
            }
            other => panic!("expected a join, got {:?}", other),
        }
    }

    #[test]
    fn test_nothing_is_sent_before_connecting() {
        let mut state = state();
        let input = FrameInput {
            chat_message: Some("hi".to_string()),
            ..Default::default()
        };
        assert!(state.update(&input, 0.016, 1000).is_empty());
    }

    #[test]
    fn test_roster_flow_for_remote_player() {
        let mut state = state();
        connected(&mut state, "bo");

        server(
            &mut state,
            ServerEvent::PlayersUpdate(vec![session("ann", "Ann", 0.0, 0.0), session("bo", "Bo", 100.0, 0.0)]),
            1,
        );
        assert_eq!(state.roster.len(), 1);

        server(
            &mut state,
            ServerEvent::PlayerUpdate(PlayerUpdate {
                player: session("ann", "Ann", 10.0, 0.0),
                timestamp: 2,
            }),
            2,
        );
        let ann = state.roster.get(&ConnectionId::new("ann")).unwrap();
        assert_eq!(ann.position, Position::new(10.0, 0.0));

        server(&mut state, ServerEvent::PlayerDisconnect(ConnectionId::new("ann")), 3);
        assert!(state.roster.is_empty());
    }

    #[test]
    fn test_remote_avatar_is_requested_once_and_evicted_on_leave() {
        let mut state = state();
        connected(&mut state, "bo");

        let ann = PlayerSession {
            avatar: Some("/uploads/ann.png".to_string()),
            ..session("ann", "Ann", 0.0, 0.0)
        };
        let commands = server(&mut state, ServerEvent::PlayersUpdate(vec![ann.clone()]), 1);
        assert_eq!(
            commands,
            vec![Command::LoadAvatar {
                key: PlayerKey::Remote(ConnectionId::new("ann")),
                url: "http://localhost:3000/uploads/ann.png".to_string(),
            }]
        );

        let again = server(
            &mut state,
            ServerEvent::PlayerUpdate(PlayerUpdate {
                player: ann,
                timestamp: 2,
            }),
            2,
        );
        assert!(again.is_empty());

        server(&mut state, ServerEvent::PlayerDisconnect(ConnectionId::new("ann")), 3);
        assert!(state.avatars.slot(&PlayerKey::Remote(ConnectionId::new("ann"))).is_none());
    }

    #[test]
    fn test_avatar_completion_and_failure() {
        let mut state = state();
        let key = PlayerKey::Remote(ConnectionId::new("ann"));
        state.avatars.request(key.clone());

        let image = Image::gen_image_color(2, 2, macroquad::color::WHITE);
        state.handle_network_event(
            NetworkEvent::AvatarLoaded {
                key: key.clone(),
                image,
            },
            0,
            |img| img.width() as u32,
        );
        assert_eq!(state.avatars.get(&key), Some(&2));

        let other = PlayerKey::Remote(ConnectionId::new("cy"));
        state.avatars.request(other.clone());
        state.handle_network_event(
            NetworkEvent::AvatarFailed {
                key: other.clone(),
                reason: "404".to_string(),
            },
            0,
            no_upload,
        );
        assert_eq!(state.avatars.get(&other), None);
        assert!(!state.avatars.request(other));
    }

    #[test]
    fn test_unwanted_avatar_is_not_uploaded() {
        let mut state = state();
        let image = Image::gen_image_color(1, 1, macroquad::color::WHITE);
        state.handle_network_event(
            NetworkEvent::AvatarLoaded {
                key: PlayerKey::Remote(ConnectionId::new("gone")),
                image,
            },
            0,
            |_| panic!("should not upload"),
        );
        assert!(state.avatars.is_empty());
    }

    #[test]
    fn test_local_avatar_loads_under_local_key() {
        let mut state: ClientState<u32> = ClientState::new(
            Profile {
                avatar_url: Some("me.png".to_string()),
                ..Default::default()
            },
            "http://h:1",
        );
        assert_eq!(
            state.start(),
            vec![Command::LoadAvatar {
                key: PlayerKey::Local,
                url: "http://h:1/me.png".to_string(),
            }]
        );
        assert!(state.start().is_empty());
    }

    #[test]
    fn test_remote_chat_creates_log_line_and_bubble() {
        let mut state = state();
        connected(&mut state, "bo");
        server(&mut state, ServerEvent::PlayersUpdate(vec![session("ann", "Ann", 10.0, 0.0)]), 0);

        let commands = server(&mut state, chat("ann", "Ann", "hi"), 1000);

        let key = PlayerKey::Remote(ConnectionId::new("ann"));
        assert_eq!(
            commands,
            vec![Command::ScheduleBubbleExpiry {
                key: key.clone(),
                timestamp: 1000,
            }]
        );
        let line = state.chat_log.iter().last().unwrap();
        assert_eq!(line.text(), "Ann: hi");
        assert!(!line.own);
        assert_eq!(state.anchor(&key), Some(Position::new(10.0, 0.0)));

        state.prune_bubbles(1000 + 4999);
        assert!(state.bubbles.get(&key).is_some());
        state.prune_bubbles(1000 + 5001);
        assert!(state.bubbles.get(&key).is_none());
    }

    #[test]
    fn test_own_chat_uses_local_key() {
        let mut state = state();
        connected(&mut state, "bo");
        server(&mut state, chat("bo", "Bo", "me"), 5);

        assert!(state.bubbles.get(&PlayerKey::Local).is_some());
        assert!(state.chat_log.iter().last().unwrap().own);
    }

    #[test]
    fn test_bubble_of_departed_sender_is_pruned() {
        let mut state = state();
        connected(&mut state, "bo");
        // Chat from someone never seen in the roster
        server(&mut state, chat("ghost", "Ghost", "boo"), 0);
        assert_eq!(state.bubbles.len(), 1);

        state.prune_bubbles(1);
        assert!(state.bubbles.is_empty());
    }

    #[test]
    fn test_backstop_timer_only_removes_matching_bubble() {
        let mut state = state();
        connected(&mut state, "bo");
        server(&mut state, chat("bo", "Bo", "first"), 0);
        server(&mut state, chat("bo", "Bo", "second"), 3000);

        state.handle_network_event(
            NetworkEvent::BubbleExpired {
                key: PlayerKey::Local,
                timestamp: 0,
            },
            5000,
            no_upload,
        );
        assert_eq!(state.bubbles.get(&PlayerKey::Local).unwrap().message, "second");
    }

    #[test]
    fn test_update_moves_and_throttles() {
        let mut state = state();
        connected(&mut state, "bo");

        let input = FrameInput {
            direction: Direction {
                right: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let commands = state.update(&input, 0.1, 1000);
        assert_approx_eq!(state.local.position.x, 30.0);
        assert!(state.local.moving);
        assert_eq!(
            commands,
            vec![Command::Send(ClientEvent::PlayerMove(MoveRequest { x: state.local.position.x, y: 0.0 }))]
        );

        // Standing still within the interval sends nothing
        let idle = state.update(&FrameInput::default(), 0.001, 1001);
        assert!(idle.is_empty());
        assert!(!state.local.moving);
    }

    #[test]
    fn test_chat_message_is_sent_without_local_echo() {
        let mut state = state();
        connected(&mut state, "bo");

        let input = FrameInput {
            chat_message: Some("hello".to_string()),
            ..Default::default()
        };
        let commands = state.update(&input, 0.0, 0);
        assert!(commands.contains(&Command::Send(ClientEvent::ChatMessage(ChatRequest {
            message: "hello".to_string(),
        }))));
        assert!(state.chat_log.is_empty());
        assert!(state.bubbles.is_empty());
    }

    #[test]
    fn test_zoom_input_is_clamped() {
        let mut state = state();
        for _ in 0..30 {
            state.update(
                &FrameInput {
                    zoom_delta: 0.2,
                    ..Default::default()
                },
                0.0,
                0,
            );
        }
        assert_approx_eq!(state.zoom.level(), crate::camera::MAX_ZOOM);

        state.update(
            &FrameInput {
                reset_zoom: true,
                ..Default::default()
            },
            0.0,
            0,
        );
        assert_approx_eq!(state.zoom.level(), 1.0);
    }

    #[test]
    fn test_disconnect_clears_remote_state() {
        let mut state = state();
        connected(&mut state, "bo");
        server(&mut state, ServerEvent::PlayersUpdate(vec![session("ann", "Ann", 0.0, 0.0)]), 0);
        server(&mut state, chat("ann", "Ann", "bye"), 0);
        state.avatars.request(PlayerKey::Local);
        state.avatars.complete(&PlayerKey::Local, 7);
        let ann = PlayerKey::Remote(ConnectionId::new("ann"));
        state.avatars.request(ann.clone());
        state.avatars.complete(&ann, 9);
        state.avatars.request(PlayerKey::Remote(ConnectionId::new("cy")));

        state.handle_network_event(
            NetworkEvent::Disconnected {
                reason: "closed".to_string(),
            },
            1,
            no_upload,
        );
        assert!(!state.is_connected());
        assert_eq!(state.last_error(), Some("closed"));
        assert!(state.roster.is_empty());
        assert!(state.bubbles.is_empty());
        assert_eq!(state.avatars.len(), 1);
        assert_eq!(state.avatars.get(&PlayerKey::Local), Some(&7));
        assert!(state.avatars.slot(&ann).is_none());
    }
}
