use clap::Parser;
use client::game::ClientGameState;
use client::input::{parse_command, Command, HELP};
use client::network::{random_player_id, Client, ClientError, QueueWatch};
use client::rendering::render_room;
use log::{debug, info};
use shared::{ChallengeStatus, Identity, QueueStatus};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Account name; play as a guest when omitted
    #[arg(short = 'n', long)]
    name: Option<String>,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    fake_ping: u64,
}

fn show_queue(state: &mut ClientGameState, status: QueueStatus) -> Option<String> {
    match status {
        QueueStatus::Waiting {
            ticket,
            rating,
            min_rating,
            max_rating,
        } => {
            println!(
                "Searching as {} for {}..{} (ticket {})",
                rating, min_rating, max_rating, ticket
            );
            state.ticket = Some(ticket);
            None
        }
        QueueStatus::Matched { code } => {
            state.ticket = None;
            Some(code)
        }
    }
}

fn show_challenge(state: &mut ClientGameState, status: ChallengeStatus) -> Option<String> {
    match status {
        ChallengeStatus::Pending { ticket, target } => {
            println!("Waiting for {} to answer (ticket {})", target, ticket);
            state.challenge = Some(ticket);
            None
        }
        ChallengeStatus::Accepted { code } => {
            state.challenge = None;
            Some(code)
        }
        ChallengeStatus::Declined => {
            println!("Challenge declined");
            state.challenge = None;
            None
        }
    }
}

async fn enter_room(
    client: &Client,
    state: &mut ClientGameState,
    code: Option<String>,
) -> Result<(), ClientError> {
    if let Some(code) = code {
        let room = client.read_room(&code, None, false).await?;
        if state.apply(room) {
            render(state);
        }
    }
    Ok(())
}

async fn next_queue_status(watch: &mut Option<QueueWatch>) -> Result<QueueStatus, ClientError> {
    match watch {
        Some(watch) => watch.finished().await,
        None => std::future::pending().await,
    }
}

fn render(state: &ClientGameState) {
    if let Some(room) = state.room() {
        println!("\n{}", render_room(room));
    }
}

/// Runs one command. Returns false when the player asked to quit.
async fn execute(
    client: &Client,
    state: &mut ClientGameState,
    command: Command,
) -> Result<bool, ClientError> {
    let current = state.code().map(str::to_string);
    let in_room = || current.clone().ok_or(ClientError::NoRoom);

    match command {
        Command::Quit => return Ok(false),
        Command::Help => println!("{}", HELP),
        Command::Show => render(state),

        Command::Create => {
            state.apply(client.create_room().await?);
            render(state);
        }
        Command::Join(code) => {
            state.apply(client.join_room(&code).await?);
            render(state);
        }
        Command::Train(level) => {
            state.apply(client.start_training(level).await?);
            render(state);
        }
        Command::Play(column) => {
            state.apply(client.play(&in_room()?, column).await?);
            render(state);
        }
        Command::Wait => {
            let room = client.read_room(&in_room()?, state.revision(), true).await?;
            if !state.apply(room) {
                println!("No change");
            }
            render(state);
        }
        Command::Rematch => {
            state.apply(client.rematch(&in_room()?).await?);
            render(state);
        }

        Command::Queue => {
            let status = client.join_matchmaking().await?;
            let code = show_queue(state, status);
            enter_room(client, state, code).await?;
        }
        Command::Leave => match state.ticket.take() {
            Some(ticket) => {
                client.leave_matchmaking(&ticket).await?;
                println!("Left the queue");
            }
            None => println!("Not queued"),
        },

        Command::Challenge(target) => {
            let status = client.send_challenge(&target).await?;
            let code = show_challenge(state, status);
            enter_room(client, state, code).await?;
        }
        Command::Invites => {
            let invites = client.list_invites().await?;
            if invites.is_empty() {
                println!("No pending invites");
            }
            for invite in invites {
                println!("{}  from {} ({}s ago)", invite.ticket, invite.from, invite.age_secs);
            }
        }
        Command::Accept(ticket) => {
            state.apply(client.accept_challenge(&ticket).await?);
            render(state);
        }
        Command::Decline(ticket) => {
            client.decline_challenge(&ticket).await?;
            println!("Declined");
        }
        Command::Cancel => match state.challenge.take() {
            Some(ticket) => {
                client.cancel_challenge(&ticket).await?;
                println!("Challenge cancelled");
            }
            None => println!("No outgoing challenge"),
        },

        Command::Top(query) => {
            for (rank, row) in client.leaderboard(&query).await?.iter().enumerate() {
                println!(
                    "{:>3}. {:<16} {:>5}  {}W {}L {}G",
                    rank + 1,
                    row.name,
                    row.rating,
                    row.wins,
                    row.losses,
                    row.games
                );
            }
        }
        Command::Profile(name) => {
            let row = client.profile(&name).await?;
            println!(
                "{}: rating {}, {} games, {} wins, {} losses",
                row.name, row.rating, row.games, row.wins, row.losses
            );
        }
    }
    Ok(true)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let player_id = random_player_id();
    let identity = match &args.name {
        Some(name) => Identity::with_account(player_id, name.as_str()),
        None => Identity::guest(player_id),
    };

    info!("Starting client as {}", identity.display_name());
    info!("Connecting to: {}", args.server);
    if args.fake_ping > 0 {
        info!("Simulating {}ms latency", args.fake_ping);
    }
    println!("{}", HELP);

    let client = Client::new(args.server, identity).with_fake_ping(args.fake_ping);
    let mut state = ClientGameState::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut queue_watch: Option<QueueWatch> = None;

    loop {
        // The queue poll runs on its own task and survives typed commands.
        // Room and challenge waits are dropped by typing, which the server
        // sees as a cancelled request.
        if queue_watch.as_ref().map(QueueWatch::ticket) != state.ticket.as_deref() {
            queue_watch = state
                .ticket
                .as_deref()
                .map(|ticket| QueueWatch::spawn(&client, ticket));
        }

        let code = state.code().unwrap_or_default().to_string();
        let since = state.revision();
        let challenge = state.challenge.clone().unwrap_or_default();
        let watching = state.waiting_on_opponent();
        let queued = queue_watch.is_some();
        let challenging = state.challenge.is_some();

        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let command = match parse_command(&line) {
                    Ok(Some(command)) => command,
                    Ok(None) => continue,
                    Err(e) => {
                        println!("{}", e);
                        continue;
                    }
                };
                match execute(&client, &mut state, command).await {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => println!("Error: {}", e),
                }
            }
            room = client.read_room(&code, since, true), if watching => {
                match room {
                    Ok(room) => {
                        if state.apply(room) {
                            render(&state);
                        }
                    }
                    Err(e) => {
                        println!("Lost the room: {}", e);
                        state.leave_room();
                    }
                }
            }
            status = next_queue_status(&mut queue_watch), if queued => {
                queue_watch = None;
                let code = match status {
                    Ok(status) => show_queue(&mut state, status),
                    Err(e) => {
                        println!("Queue error: {}", e);
                        state.ticket = None;
                        None
                    }
                };
                if let Err(e) = enter_room(&client, &mut state, code).await {
                    println!("Error: {}", e);
                }
            }
            status = client.poll_challenge(&challenge), if challenging => {
                let code = match status {
                    Ok(status) => show_challenge(&mut state, status),
                    Err(e) => {
                        println!("Challenge error: {}", e);
                        state.challenge = None;
                        None
                    }
                };
                if let Err(e) = enter_room(&client, &mut state, code).await {
                    println!("Error: {}", e);
                }
            }
        }
    }

    debug!("Client exiting");
    Ok(())
}
