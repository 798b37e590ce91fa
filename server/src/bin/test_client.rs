//! Headless client for exercising a running server without a window.
//!
//! Joins under the given name, walks in a circle at the client's send rate,
//! says one line of chat and logs everything the server sends back.

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use log::{info, warn};
use shared::{ChatRequest, ClientEvent, JoinRequest, MoveRequest, ServerEvent, WireEvent};
use std::time::Duration;
use tokio::time::{interval, Instant};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server websocket URL
    #[arg(short, long, default_value = "ws://127.0.0.1:3000")]
    server: String,

    /// Display name to join with
    #[arg(short, long, default_value = "bot")]
    username: String,

    /// Radius of the walked circle in world units
    #[arg(short, long, default_value = "150")]
    radius: f32,

    /// How long to stay connected, in seconds
    #[arg(short, long, default_value = "10")]
    duration: u64,
}

fn log_event(event: &ServerEvent) {
    match event {
        ServerEvent::Connected(id) => info!("Connected as {}", id),
        ServerEvent::PlayersUpdate(players) => info!("Roster: {} players", players.len()),
        ServerEvent::PlayerUpdate(update) => info!(
            "{} at ({:.1}, {:.1})",
            update.player.username, update.player.position.x, update.player.position.y
        ),
        ServerEvent::ChatMessage(chat) => info!("{}: {}", chat.username, chat.message),
        ServerEvent::PlayerDisconnect(id) => info!("{} left", id),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let (socket, _) = connect_async(args.server.as_str()).await?;
    let (mut sink, mut stream) = socket.split();

    let join = ClientEvent::JoinGame(JoinRequest {
        username: Some(args.username.clone()),
        x: Some(args.radius),
        y: Some(0.0),
        ..Default::default()
    });
    sink.send(Message::Text(join.encode()?)).await?;

    let started = Instant::now();
    let deadline = started + Duration::from_secs(args.duration);
    let mut ticker = interval(Duration::from_millis(33));
    let mut said_hello = false;

    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => match ServerEvent::decode(&text) {
                    Ok(event) => log_event(&event),
                    Err(e) => warn!("Undecodable frame: {}", e),
                },
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => {
                    info!("Server closed the connection");
                    return Ok(());
                }
            },

            _ = ticker.tick() => {
                let now = Instant::now();
                if now >= deadline {
                    break;
                }

                let angle = now.duration_since(started).as_secs_f32();
                let step = ClientEvent::PlayerMove(MoveRequest {
                    x: args.radius * angle.cos(),
                    y: args.radius * angle.sin(),
                });
                sink.send(Message::Text(step.encode()?)).await?;

                if !said_hello && angle > 1.0 {
                    said_hello = true;
                    let chat = ClientEvent::ChatMessage(ChatRequest {
                        message: format!("hello from {}", args.username),
                    });
                    sink.send(Message::Text(chat.encode()?)).await?;
                }
            },
        }
    }

    sink.close().await?;
    Ok(())
}
