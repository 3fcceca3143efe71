//! Load-test bots: each one registers, then flies to the right reporting its
//! position every 50 ms until the run ends.

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use log::{info, warn};
use shared::{ClientMessage, ServerMessage, CLIENT_UPDATE_INTERVAL_MS, SPAWN_X, SPAWN_Y};
use std::time::Duration;
use tokio::time::{interval, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// WebSocket URL of the server
    #[clap(short, long, default_value = "ws://127.0.0.1:8080")]
    url: String,
    /// Number of bots to spawn
    #[clap(short, long, default_value = "4")]
    bots: usize,
    /// Horizontal speed in world units per second
    #[clap(short, long, default_value = "120")]
    speed: f32,
    /// How long each bot stays connected, in seconds
    #[clap(short, long, default_value = "30")]
    duration: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut handles = Vec::new();
    for index in 0..args.bots {
        let url = args.url.clone();
        let speed = args.speed;
        let duration = Duration::from_secs(args.duration);
        handles.push(tokio::spawn(async move {
            if let Err(e) = run_bot(index, &url, speed, duration).await {
                warn!("Bot {} stopped: {}", index, e);
            }
        }));
    }

    for handle in handles {
        handle.await?;
    }
    info!("All bots finished");
    Ok(())
}

async fn run_bot(
    index: usize,
    url: &str,
    speed: f32,
    duration: Duration,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let (ws_stream, _) = connect_async(url).await?;
    let (mut write, mut read) = ws_stream.split();

    let init = ClientMessage::Init {
        name: format!("bot-{}", index),
        x: SPAWN_X,
        y: SPAWN_Y,
        score: 0,
        is_dead: false,
    };
    write.send(Message::text(shared::encode(&init)?)).await?;

    let mut player_id: Option<String> = None;
    let mut x = SPAWN_X;
    let mut score = 0;
    let mut states = 0u64;
    let started = Instant::now();
    let mut pacing = interval(Duration::from_millis(CLIENT_UPDATE_INTERVAL_MS));

    while started.elapsed() < duration {
        tokio::select! {
            frame = read.next() => {
                let Some(frame) = frame else { break };
                let Message::Text(text) = frame? else { continue };
                match shared::decode_server(&text)? {
                    ServerMessage::Init { player_id: id, game_state, .. } => {
                        info!("Bot {} registered as {} ({} pipes)", index, id, game_state.pipes.len());
                        player_id = Some(id);
                    }
                    ServerMessage::State { players, game_state, top_players } => {
                        states += 1;
                        score = game_state
                            .pipes
                            .iter()
                            .filter(|pipe| pipe.x + pipe.width < x)
                            .map(|pipe| pipe.id + 1)
                            .max()
                            .unwrap_or(score);
                        if states % 100 == 0 {
                            info!(
                                "Bot {}: x={:.0} sees {} players, {} pipes, leader {:?}",
                                index,
                                x,
                                players.len(),
                                game_state.pipes.len(),
                                top_players.first().map(|entry| &entry.name)
                            );
                        }
                    }
                }
            },
            _ = pacing.tick() => {
                if player_id.is_none() {
                    continue;
                }
                x += speed * CLIENT_UPDATE_INTERVAL_MS as f32 / 1000.0;
                let update = ClientMessage::Update {
                    player_id: player_id.clone(),
                    x,
                    y: SPAWN_Y + (x / 100.0).sin() * 40.0,
                    score,
                    is_dead: false,
                };
                write.send(Message::text(shared::encode(&update)?)).await?;
            },
        }
    }

    write.send(Message::Close(None)).await?;
    info!("Bot {} done after {} snapshots", index, states);
    Ok(())
}
