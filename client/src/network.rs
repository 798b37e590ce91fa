//! Background network thread
//!
//! macroquad owns the main thread, so the websocket and avatar downloads run
//! on a tokio runtime in a separate thread. The render loop talks to it
//! through two unbounded channels: [`Command`]s go in, [`NetworkEvent`]s come
//! out and are drained at the start of every frame.

use crate::avatar::fetch_avatar;
use crate::chat::BUBBLE_LIFETIME_MS;
use crate::roster::PlayerKey;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use macroquad::texture::Image;
use shared::{ClientEvent, ServerEvent, WireEvent};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

/// Requests from the render loop to the network thread
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Send(ClientEvent),
    LoadAvatar { key: PlayerKey, url: String },
    /// Arms the backstop timer for a bubble
    ScheduleBubbleExpiry { key: PlayerKey, timestamp: u64 },
}

/// Everything the network thread reports back
#[derive(Debug)]
pub enum NetworkEvent {
    Server(ServerEvent),
    Disconnected { reason: String },
    AvatarLoaded { key: PlayerKey, image: Image },
    AvatarFailed { key: PlayerKey, reason: String },
    BubbleExpired { key: PlayerKey, timestamp: u64 },
}

pub struct NetworkHandle {
    commands: mpsc::UnboundedSender<Command>,
    events: mpsc::UnboundedReceiver<NetworkEvent>,
}

impl NetworkHandle {
    /// Starts the network thread and begins connecting to `server_url`
    pub fn spawn(server_url: String) -> Result<Self, Box<dyn std::error::Error>> {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        std::thread::Builder::new()
            .name("network".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_multi_thread()
                    .worker_threads(2)
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        error!("Failed to start network runtime: {}", e);
                        let _ = event_tx.send(NetworkEvent::Disconnected {
                            reason: e.to_string(),
                        });
                        return;
                    }
                };
                runtime.block_on(run(server_url, command_rx, event_tx));
            })?;

        Ok(Self {
            commands: command_tx,
            events: event_rx,
        })
    }

    pub fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("Network thread has stopped, dropping command");
        }
    }

    /// Everything that arrived since the last call, in arrival order
    pub fn drain(&mut self) -> Vec<NetworkEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Reports `BubbleExpired` once a bubble has lived its full lifetime
fn schedule_bubble_expiry(
    events: &mpsc::UnboundedSender<NetworkEvent>,
    key: PlayerKey,
    timestamp: u64,
) -> JoinHandle<()> {
    let events = events.clone();
    tokio::spawn(async move {
        sleep(Duration::from_millis(BUBBLE_LIFETIME_MS)).await;
        let _ = events.send(NetworkEvent::BubbleExpired { key, timestamp });
    })
}

async fn run(
    server_url: String,
    mut commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<NetworkEvent>,
) {
    info!("Connecting to {}", server_url);
    let socket = match connect_async(server_url.as_str()).await {
        Ok((socket, _)) => socket,
        Err(e) => {
            error!("Could not connect to {}: {}", server_url, e);
            let _ = events.send(NetworkEvent::Disconnected {
                reason: e.to_string(),
            });
            return;
        }
    };
    info!("Connected to {}", server_url);

    let (mut sink, mut stream) = socket.split();
    let http = reqwest::Client::new();

    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => match ServerEvent::decode(&text) {
                    Ok(event) => {
                        if events.send(NetworkEvent::Server(event)).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("Ignoring malformed frame: {}", e),
                },
                Some(Ok(Message::Close(_))) | None => {
                    let _ = events.send(NetworkEvent::Disconnected {
                        reason: "connection closed by server".to_string(),
                    });
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!("Websocket error: {}", e);
                    let _ = events.send(NetworkEvent::Disconnected {
                        reason: e.to_string(),
                    });
                    break;
                }
            },

            command = commands.recv() => match command {
                Some(Command::Send(event)) => {
                    let text = match event.encode() {
                        Ok(text) => text,
                        Err(e) => {
                            error!("Failed to encode event: {}", e);
                            continue;
                        }
                    };
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        error!("Failed to send: {}", e);
                        let _ = events.send(NetworkEvent::Disconnected {
                            reason: e.to_string(),
                        });
                        break;
                    }
                }
                Some(Command::LoadAvatar { key, url }) => {
                    let http = http.clone();
                    let events = events.clone();
                    tokio::spawn(async move {
                        let event = match fetch_avatar(&http, &url).await {
                            Ok(image) => NetworkEvent::AvatarLoaded { key, image },
                            Err(e) => NetworkEvent::AvatarFailed {
                                key,
                                reason: format!("{}: {}", url, e),
                            },
                        };
                        let _ = events.send(event);
                    });
                }
                Some(Command::ScheduleBubbleExpiry { key, timestamp }) => {
                    schedule_bubble_expiry(&events, key, timestamp);
                }
                None => {
                    // Render loop is gone
                    let _ = sink.close().await;
                    break;
                }
            },
        }
    }

    info!("Network thread stopping");
}
