use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const DEFAULT_COLOR: &str = "#6366f1";
pub const DEFAULT_RADIUS: f32 = 30.0;
pub const DEFAULT_USERNAME: &str = "Player";
pub const CONNECTION_ID_LEN: usize = 20;

/// Transport-assigned identity of one live connection. Not stable across reconnects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// World coordinates. Unbounded, no world edges.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn manhattan_distance(&self, other: &Position) -> f32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSession {
    pub id: ConnectionId,
    pub user_id: Option<String>,
    pub username: String,
    #[serde(flatten)]
    pub position: Position,
    pub color: String,
    pub avatar: Option<String>,
    pub radius: f32,
}

/// A single player's state as broadcast to everyone but its owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerUpdate {
    #[serde(flatten)]
    pub player: PlayerSession,
    pub timestamp: u64,
}

/// Join payload as sent by clients. Every field is optional and tolerant of
/// the wrong JSON type; missing or falsy values fall back to defaults in
/// [`JoinRequest::into_session`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    #[serde(default, deserialize_with = "lenient::string", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient::string", skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "lenient::number", skip_serializing_if = "Option::is_none")]
    pub x: Option<f32>,
    #[serde(default, deserialize_with = "lenient::number", skip_serializing_if = "Option::is_none")]
    pub y: Option<f32>,
    #[serde(default, deserialize_with = "lenient::string", skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, deserialize_with = "lenient::string", skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, deserialize_with = "lenient::number", skip_serializing_if = "Option::is_none")]
    pub radius: Option<f32>,
}

impl JoinRequest {
    pub fn into_session(self, id: ConnectionId) -> PlayerSession {
        PlayerSession {
            id,
            user_id: self.id.filter(|s| !s.is_empty()),
            username: self
                .username
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_USERNAME.to_string()),
            position: Position::new(self.x.unwrap_or(0.0), self.y.unwrap_or(0.0)),
            color: self
                .color
                .filter(|c| is_hex_color(c))
                .unwrap_or_else(|| DEFAULT_COLOR.to_string()),
            avatar: self.avatar.filter(|a| !a.is_empty()),
            radius: self
                .radius
                .filter(|r| *r > 0.0)
                .unwrap_or(DEFAULT_RADIUS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoveRequest {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatBroadcast {
    pub player_id: ConnectionId,
    pub username: String,
    pub message: String,
    pub x: f32,
    pub y: f32,
    pub timestamp: u64,
}

/// Events a client sends to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    JoinGame(#[serde(deserialize_with = "lenient::join_request")] JoinRequest),
    PlayerMove(MoveRequest),
    ChatMessage(ChatRequest),
}

/// Events the server sends to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Unicast on accept so the client learns its own connection id.
    Connected(ConnectionId),
    /// Full roster snapshot, unicast to a client right after its join.
    PlayersUpdate(Vec<PlayerSession>),
    /// Single-player delta, broadcast to everyone except the player itself.
    PlayerUpdate(PlayerUpdate),
    ChatMessage(ChatBroadcast),
    PlayerDisconnect(ConnectionId),
}

/// JSON text framing shared by both directions: `{"event": ..., "data": ...}`.
pub trait WireEvent: Serialize + DeserializeOwned {
    fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

impl WireEvent for ClientEvent {}
impl WireEvent for ServerEvent {}

/// Parses `#rgb` or `#rrggbb` into its components.
pub fn parse_hex_color(color: &str) -> Option<(u8, u8, u8)> {
    let hex = color.strip_prefix('#')?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    match hex.len() {
        3 => {
            let channel = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
            Some((channel(0)?, channel(1)?, channel(2)?))
        }
        6 => {
            let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
            Some((channel(0)?, channel(2)?, channel(4)?))
        }
        _ => None,
    }
}

pub fn is_hex_color(color: &str) -> bool {
    parse_hex_color(color).is_some()
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

mod lenient {
    use super::JoinRequest;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::String(s) => Some(s),
            _ => None,
        })
    }

    pub fn number<'de, D>(deserializer: D) -> Result<Option<f32>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(value
            .as_f64()
            .map(|v| v as f32)
            .filter(|v| v.is_finite()))
    }

    // A non-object join payload still joins, with every field defaulted.
    pub fn join_request<'de, D>(deserializer: D) -> Result<JoinRequest, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(serde_json::from_value(value).unwrap_or_default())
    }
}
