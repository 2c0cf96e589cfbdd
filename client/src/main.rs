use clap::Parser;
use client::app::{App, AppConfig};
use client::rendering::HUD_HEIGHT;
use log::info;
use macroquad::window::Conf;
use shared::{VISUAL_HEIGHT, VISUAL_WIDTH};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Player store address to connect to
    #[arg(short = 's', long, env = "PIXELVERSE_STORE_ADDR", default_value = "127.0.0.1:8080")]
    store: String,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long, env = "PIXELVERSE_FAKE_PING", default_value = "0")]
    fake_ping: u64,

    /// Join immediately under this name instead of showing the form
    #[arg(short = 'n', long, env = "PIXELVERSE_PLAYER_NAME")]
    name: Option<String>,
}

fn window_conf() -> Conf {
    Conf {
        window_title: "Real-time Pixel Game".to_owned(),
        window_width: VISUAL_WIDTH,
        window_height: VISUAL_HEIGHT + HUD_HEIGHT,
        window_resizable: false,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Player store: {}", args.store);
    info!("Controls: W, A, S, D to move, Escape to leave");

    let mut app = App::new(AppConfig {
        store_addr: args.store,
        fake_ping_ms: args.fake_ping,
        player_name: args.name,
    });
    app.run().await;
}
