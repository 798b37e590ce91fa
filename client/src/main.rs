use clap::Parser;
use client::avatar::asset_base_from_server;
use client::camera::Viewport;
use client::game::{ClientState, Profile};
use client::input::InputManager;
use client::network::NetworkHandle;
use client::rendering::Renderer;
use log::{error, info};
use macroquad::prelude::*;
use shared::{now_millis, DEFAULT_COLOR, DEFAULT_USERNAME};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server websocket URL
    #[arg(short = 's', long, default_value = "ws://127.0.0.1:3000")]
    server: String,

    /// Display name shown to other players
    #[arg(short = 'u', long, default_value = DEFAULT_USERNAME)]
    username: String,

    /// Opaque account id forwarded to the server
    #[arg(long)]
    user_id: Option<String>,

    /// Player color as #rrggbb
    #[arg(short = 'c', long, default_value = DEFAULT_COLOR)]
    color: String,

    /// Avatar image URL, absolute or relative to the asset base
    #[arg(short = 'a', long)]
    avatar_url: Option<String>,

    /// Base URL for relative avatar URLs (defaults to the server's http origin)
    #[arg(long)]
    asset_base: Option<String>,

    /// Window width
    #[arg(short = 'w', long, default_value = "1280")]
    width: i32,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "720")]
    height: i32,
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let asset_base = args
        .asset_base
        .clone()
        .unwrap_or_else(|| asset_base_from_server(&args.server));

    let profile = Profile {
        username: args.username,
        user_id: args.user_id,
        color: args.color,
        avatar_url: args.avatar_url,
    };

    let mut state: ClientState<Texture2D> = ClientState::new(profile, asset_base);
    let mut network = NetworkHandle::spawn(args.server)?;
    let mut input = InputManager::new();
    let mut renderer = Renderer::new();

    for command in state.start() {
        network.send(command);
    }

    loop {
        let now = now_millis();

        for event in network.drain() {
            for command in state.handle_network_event(event, now, Texture2D::from_image) {
                network.send(command);
            }
        }

        let frame = input.update();
        if frame.toggle_minimap {
            renderer.minimap.toggle_visibility();
        }
        for command in state.update(&frame, get_frame_time(), now) {
            network.send(command);
        }

        state.prune_bubbles(now);
        let viewport = Viewport::new(screen_width(), screen_height());
        renderer.render(&state, input.composer(), viewport, now);

        next_frame().await;
    }
}

fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {}", args.server);
    info!("Controls: WASD/arrows to move, +/- or wheel to zoom, 0 to reset zoom");
    info!("Press Enter to chat, M to toggle the minimap");

    let conf = Conf {
        window_title: format!("Plaza - {}", args.username),
        window_width: args.width,
        window_height: args.height,
        high_dpi: true,
        ..Default::default()
    };

    macroquad::Window::from_config(conf, async move {
        if let Err(e) = run(args).await {
            error!("Client error: {}", e);
        }
    });
}
