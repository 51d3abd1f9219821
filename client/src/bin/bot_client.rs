//! Headless player: queues for a rated game and plays it with the search
//! opponent, then optionally queues again.

use clap::Parser;
use client::game::ClientGameState;
use client::network::{random_player_id, Client};
use client::rendering::{render_room, status_line};
use log::{info, warn};
use shared::ai::compute_move;
use shared::{BotLevel, Cell, Identity, QueueStatus};
use std::time::Duration;
use tokio::time::sleep;

#[derive(Parser, Debug)]
#[command(author, version, about = "Plays rated games with the built-in AI", long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Account name to queue under
    #[arg(short = 'n', long)]
    name: String,

    /// Search strength, 1 to 5
    #[arg(short = 'L', long, default_value = "4")]
    level: u8,

    /// Number of games to play
    #[arg(short = 'g', long, default_value = "1")]
    games: u32,
}

async fn find_game(client: &Client) -> Result<String, Box<dyn std::error::Error>> {
    let mut status = client.join_matchmaking().await?;
    loop {
        match status {
            QueueStatus::Matched { code } => return Ok(code),
            QueueStatus::Waiting {
                ticket,
                min_rating,
                max_rating,
                ..
            } => {
                info!("Waiting for an opponent rated {}..{}", min_rating, max_rating);
                status = client.poll_matchmaking(&ticket).await?;
            }
        }
    }
}

async fn play_game(
    client: &Client,
    code: &str,
    level: BotLevel,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut state = ClientGameState::new();
    state.apply(client.read_room(code, None, false).await?);

    while let Some(room) = state.room() {
        if room.status.is_over() {
            println!("{}", render_room(room));
            return Ok(());
        }

        if room.can_play {
            let me = room.seat.map(Cell::from_seat).unwrap_or(room.next_player);
            let Some(column) = compute_move(&room.board, me, level) else {
                warn!("No legal column left in {}", code);
                return Ok(());
            };
            info!("Playing column {}", column + 1);
            match client.play(code, column).await {
                Ok(room) => {
                    state.apply(room);
                }
                Err(e) => {
                    warn!("Move rejected: {}", e);
                    sleep(Duration::from_millis(200)).await;
                    state.apply(client.read_room(code, None, false).await?);
                }
            }
        } else {
            info!("{}", status_line(room));
            let room = client.read_room(code, state.revision(), true).await?;
            state.apply(room);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();
    let level = BotLevel::new(args.level);
    let identity = Identity::with_account(random_player_id(), args.name.as_str());
    let client = Client::new(args.server, identity);

    for game in 1..=args.games {
        info!("Game {} of {}: queueing as {}", game, args.games, args.name);
        let code = find_game(&client).await?;
        info!("Matched into room {}", code);
        play_game(&client, &code, level).await?;
    }

    let profile = client.profile(&args.name).await?;
    println!(
        "{}: rating {} after {} games ({}W {}L)",
        profile.name, profile.rating, profile.games, profile.wins, profile.losses
    );
    Ok(())
}
