use clap::Parser;
use log::info;
use server::network::{Server, ServerConfig};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, env = "PIXELVERSE_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, env = "PIXELVERSE_PORT", default_value = "8080")]
    port: u16,

    /// Seconds without a heartbeat before a subscriber is dropped
    #[arg(long, env = "PIXELVERSE_SUBSCRIBER_TIMEOUT_SECS", default_value = "10")]
    subscriber_timeout_secs: u64,

    /// Fraction of position updates to reject, for exercising client reverts
    #[arg(long, env = "PIXELVERSE_UPDATE_FAILURE_RATE", default_value = "0.0")]
    update_failure_rate: f64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    if !(0.0..=1.0).contains(&args.update_failure_rate) {
        return Err("--update-failure-rate must be between 0 and 1".into());
    }

    let address = format!("{}:{}", args.host, args.port);
    let config = ServerConfig {
        subscriber_timeout: Duration::from_secs(args.subscriber_timeout_secs),
        update_failure_rate: args.update_failure_rate,
    };

    info!("Starting player store...");
    if config.update_failure_rate > 0.0 {
        info!(
            "Rejecting {:.0}% of position updates",
            config.update_failure_rate * 100.0
        );
    }

    let mut server = Server::new(&address, config).await?;
    server.run().await?;

    Ok(())
}
