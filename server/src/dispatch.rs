//! Broadcast protocol: turns one inbound client event into registry
//! mutations plus the outbound events they cause
//!
//! A joining client gets the full roster exactly once; everyone else only
//! gets a single-player delta. Moves fan out to everyone but the mover,
//! chat fans out to everyone including the sender, and a disconnect is
//! announced to every remaining connection.

use crate::registry::SessionRegistry;
use log::{debug, info};
use shared::{ChatBroadcast, ClientEvent, ConnectionId, PlayerUpdate, ServerEvent};

/// An outbound event together with its fan-out rule
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Unicast {
        to: ConnectionId,
        event: ServerEvent,
    },
    Broadcast {
        event: ServerEvent,
        exclude: Option<ConnectionId>,
    },
}

/// Applies a client event to the registry and returns what must be sent
///
/// Events from connections without a session (other than the join itself)
/// produce nothing.
pub fn handle_client_event(
    registry: &mut SessionRegistry,
    from: &ConnectionId,
    event: ClientEvent,
    now: u64,
) -> Vec<Dispatch> {
    match event {
        ClientEvent::JoinGame(request) => {
            let player = registry.join(from, request);
            vec![
                Dispatch::Unicast {
                    to: from.clone(),
                    event: ServerEvent::PlayersUpdate(registry.all()),
                },
                Dispatch::Broadcast {
                    event: ServerEvent::PlayerUpdate(PlayerUpdate {
                        player,
                        timestamp: now,
                    }),
                    exclude: Some(from.clone()),
                },
            ]
        }

        ClientEvent::PlayerMove(request) => match registry.apply_move(from, request) {
            Some(player) => vec![Dispatch::Broadcast {
                event: ServerEvent::PlayerUpdate(PlayerUpdate {
                    player: player.clone(),
                    timestamp: now,
                }),
                exclude: Some(from.clone()),
            }],
            None => {
                debug!("Dropping move from {}", from);
                Vec::new()
            }
        },

        ClientEvent::ChatMessage(request) => {
            let Some(player) = registry.get(from) else {
                debug!("Dropping chat from {} without a session", from);
                return Vec::new();
            };

            let message = request.message.trim();
            if message.is_empty() {
                return Vec::new();
            }

            info!("Chat [{}]: {}", player.username, message);
            vec![Dispatch::Broadcast {
                event: ServerEvent::ChatMessage(ChatBroadcast {
                    player_id: from.clone(),
                    username: player.username.clone(),
                    message: message.to_string(),
                    x: player.position.x,
                    y: player.position.y,
                    timestamp: now,
                }),
                exclude: None,
            }]
        }
    }
}

/// Removes the connection's session and announces the departure
///
/// The announcement goes out even if the connection never joined, so
/// clients can treat it as idempotent.
pub fn handle_disconnect(registry: &mut SessionRegistry, id: &ConnectionId) -> Vec<Dispatch> {
    registry.remove(id);
    vec![Dispatch::Broadcast {
        event: ServerEvent::PlayerDisconnect(id.clone()),
        exclude: None,
    }]
}
