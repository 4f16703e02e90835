//! Terminal client for the live quiz game.
//!
//! Host screens:
//! - `countdown`: shows the question countdown and moves on when everybody answered
//! - `participants`: keeps the participant list of the waiting room current,
//!   or removes one participant with `participants remove --alias <alias>`
//!
//! Participant screens:
//! - `play`: joins a game, waits for each question and submits answers read from stdin
//!
//! Run with:
//! ```not_rust
//! cargo run --bin quizsync-client -- --session-cookie <id> countdown --duration 20
//! cargo run --bin quizsync-client -- --session-cookie <id> participants
//! cargo run --bin quizsync-client -- --session-cookie <id> participants remove --alias bob
//! cargo run --bin quizsync-client -- play --game 123456 --alias bob
//! ```

use std::{sync::Arc, time::Duration};

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use quizsync_client::{
    ClientConfig, ClientError, GameService, SessionContext,
    api::{GameState, OpaqueId},
    config::DEFAULT_BASE_URL,
    countdown::CountdownSynchronizer,
    display::TerminalDisplay,
    formatter::ScreenFormatter,
    refresher::ParticipantRefresher,
    router::{Route, ServerNavigator},
    views::QuizClient,
};
use quizsync_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "quizsync-client")]
#[command(about = "Polling client for a live quiz game", long_about = None)]
struct Args {
    /// Game server URL
    #[arg(short = 'u', long, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Host session cookie, required by the countdown and participants screens
    #[arg(short = 's', long)]
    session_cookie: Option<String>,

    /// Failed reads in a row tolerated by the pollers
    #[arg(long, default_value_t = 5)]
    max_failures: u32,

    /// Request timeout in milliseconds; a slower request counts as a failed read
    #[arg(long, default_value_t = 10_000)]
    request_timeout_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Count down the current question
    Countdown {
        /// Seconds available to answer
        #[arg(short = 'd', long)]
        duration: u32,

        /// Tick period in milliseconds
        #[arg(long, default_value_t = 1000)]
        tick_ms: u64,
    },
    /// Keep the participant list current until Ctrl+C
    Participants {
        #[command(subcommand)]
        action: Option<ParticipantsAction>,

        /// Delay between reads in milliseconds
        #[arg(long, default_value_t = 2000)]
        refresh_ms: u64,
    },
    /// Join a game and answer its questions
    Play {
        /// Public id of the game
        #[arg(short = 'g', long)]
        game: OpaqueId,

        /// Alias shown to the other participants
        #[arg(short = 'a', long)]
        alias: String,
    },
    /// Show the state of a game
    Game {
        /// Public id of the game
        #[arg(short = 'g', long)]
        game: OpaqueId,
    },
    /// Resolve a client route path to its view
    Route {
        /// Path such as `/`, `/guess` or `/waiting`
        path: String,
    },
}

#[derive(Subcommand, Debug)]
enum ParticipantsAction {
    /// Remove a participant from the game
    Remove {
        /// Alias of the participant to remove
        #[arg(short = 'a', long)]
        alias: String,
    },
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Ctrl+C received, stopping");
}

async fn play(
    service: Arc<dyn GameService>,
    config: &ClientConfig,
    game: OpaqueId,
    alias: String,
) -> Result<(), ClientError> {
    let mut client = QuizClient::new(service, SessionContext::new())
        .with_waiting_policy(config.waiting_policy());
    let participant = client.join(&game, &alias).await?;
    print!("{}", ScreenFormatter::format_joined(&participant));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        println!("Waiting for the next question...");
        if client.wait_for_question().await? == GameState::Leaderboard {
            println!("The game is over.");
            return Ok(());
        }

        println!("Answer index (0-3):");
        let Ok(Some(line)) = lines.next_line().await else {
            tracing::info!("Input closed");
            return Ok(());
        };

        match line.trim().parse::<u8>() {
            Ok(answer) => match client.guess(answer).await {
                Ok(()) => println!("Answer sent."),
                Err(ClientError::Rejected(reason)) => println!("Answer rejected: {}", reason),
                Err(e) => return Err(e),
            },
            Err(_) => println!("'{}' is not an answer index", line.trim()),
        }
    }
}

async fn run(args: Args) -> Result<(), ClientError> {
    let config = ClientConfig {
        base_url: args.base_url,
        session_cookie: args.session_cookie,
        max_consecutive_failures: args.max_failures,
        request_timeout: Duration::from_millis(args.request_timeout_ms),
        ..Default::default()
    };
    let service: Arc<dyn GameService> = Arc::new(config.build_service()?);
    let display = Arc::new(TerminalDisplay::default());

    match args.command {
        Command::Countdown { duration, tick_ms } => {
            let navigator = Arc::new(ServerNavigator::new(service.clone(), display.clone()));
            let cause = CountdownSynchronizer::new(service, display, navigator, duration)
                .with_tick(Duration::from_millis(tick_ms))
                .with_max_consecutive_failures(config.max_consecutive_failures)
                .run()
                .await;
            tracing::info!("Countdown finished: {:?}", cause);
            Ok(())
        }
        Command::Participants {
            action: Some(ParticipantsAction::Remove { alias }),
            ..
        } => {
            service.remove_participant(&alias).await?;
            println!("Removed '{}'", alias);
            Ok(())
        }
        Command::Participants {
            action: None,
            refresh_ms,
        } => {
            let policy = config.retry_policy(Duration::from_millis(refresh_ms));
            ParticipantRefresher::new(service, display)
                .with_policy(policy)
                .run_until(shutdown_signal())
                .await
        }
        Command::Play { game, alias } => play(service, &config, game, alias).await,
        Command::Game { game } => {
            let summary = service.fetch_game(&game).await?;
            print!("{}", ScreenFormatter::format_game(&summary));
            Ok(())
        }
        Command::Route { path } => {
            match Route::from_path(&path) {
                Some(route) => println!("{} -> {}", route.path(), route.name()),
                None => println!("{} -> (no view)", path),
            }
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();

    if let Err(e) = run(args).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
