use clap::Parser;
use log::{error, info};
use server::config::{GameConfig, WorldConfig};
use server::network::Server;
use std::time::Duration;

/// Main-method of the application.
/// Parses command-line arguments, then runs the sync server until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Server IP address to bind to
        #[clap(short = 'H', long, env = "WS_HOST", default_value = "0.0.0.0")]
        host: String,
        /// Port for the realtime WebSocket service
        #[clap(short, long, env = "WS_PORT", default_value = "8080")]
        port: u16,
        /// Public WebSocket URL handed to browsers by the web front end
        #[clap(long, env = "WEBSOCKET_URL")]
        public_url: Option<String>,
        /// Broadcast tick in milliseconds
        #[clap(short, long, env = "TICK_MS", default_value_t = shared::TICK_MS)]
        tick_ms: u64,
        /// Seconds without an update before a player is evicted
        #[clap(long, env = "LIVENESS_TIMEOUT_SECS", default_value_t = shared::LIVENESS_TIMEOUT_SECS)]
        liveness_timeout: u64,
        /// Radius around a player's worldX included in their snapshot
        #[clap(long, env = "RENDER_DISTANCE", default_value_t = shared::RENDER_DISTANCE)]
        render_distance: f32,
        /// Number of leaderboard entries
        #[clap(long, env = "LEADERBOARD_SIZE", default_value_t = shared::LEADERBOARD_SIZE)]
        leaderboard_size: usize,
        /// Maximum peers per snapshot
        #[clap(long, env = "MAX_RENDERED_PEERS", default_value_t = shared::MAX_RENDERED_PEERS)]
        max_rendered_peers: usize,
        /// Fixed seed for course generation
        #[clap(long, env = "WORLD_SEED")]
        seed: Option<u64>,
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Parse command line arguments
    let args = Args::parse();

    let config = GameConfig {
        world: WorldConfig {
            render_distance: args.render_distance,
            seed: args.seed,
            ..WorldConfig::default()
        },
        tick_interval: Duration::from_millis(args.tick_ms),
        liveness_timeout: Duration::from_secs(args.liveness_timeout),
        leaderboard_size: args.leaderboard_size,
        max_rendered_peers: args.max_rendered_peers,
        ..GameConfig::default()
    };

    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::bind(&address, config).await?;
    if let Some(url) = &args.public_url {
        info!("Clients connect through {}", url);
    }

    // Handle shutdown gracefully
    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped with error: {}", e);
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
