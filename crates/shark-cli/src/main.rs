use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use dialoguer::{Confirm, Input, MultiSelect};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use shark_app::chat::{ChatSession, SendOutcome};
use shark_app::{dashboard, geo, matches, profile};
use shark_coach::review::{AskOutcome, ReviewSession};
use shark_coach::{CoachHandle, CoachSettings, CoachUpdate};
use shark_core::config::Config;
use shark_core::types::{GameType, MatchEvent, MatchKind, PlayerProfile};
use shark_gemini::{GeminiClient, GeminiLive, LiveConnector, TextClient};
use shark_media::capture::{CaptureConstraints, CaptureController, SyntheticSource};
use shark_media::frame::FrameSource;
use shark_media::recorder::Recorder;
use shark_media::scheduler::SilentSink;

#[derive(Parser)]
#[command(
    name = "shark-county",
    about = "Billiards companion: dashboard, match finder, and an AI coach in your corner",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show player stats, the weekly trend, and your invite link
    Dashboard,

    /// Scan for nearby matches and AI-suggested venues
    Find {
        /// Scan radius in miles (default from config)
        #[arg(long)]
        radius: Option<f64>,
    },

    /// Talk to Shark Bot (one-shot or interactive)
    Chat {
        /// Message to send (omit for interactive mode)
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Run a live coaching session against the camera
    Coach {
        /// Stop after this many seconds (omit to run until Ctrl-C)
        #[arg(long)]
        duration: Option<u64>,
    },

    /// Ask the AI about the table in front of the camera
    Review {
        /// Question to ask (omit for interactive mode)
        #[arg(short, long)]
        question: Option<String>,
    },

    /// View or edit the player profile
    Profile {
        #[command(subcommand)]
        action: Option<ProfileAction>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ProfileAction {
    /// Show the current profile
    Show,
    /// Set the player name
    Name { name: String },
    /// Set the skill level (1-10)
    Skill { level: u8 },
    /// Toggle a preferred game (e.g. "9-Ball")
    Game { game: String },
    /// Toggle pro status
    Pro,
    /// Record a match result ("win" or "loss")
    Result { outcome: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Show the config file path
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .as_deref()
        .map(PathBuf::from)
        .unwrap_or_else(Config::config_path);
    let mut config = Config::load(&config_path)?;

    init_logging(&config, cli.verbose);

    match cli.command {
        Commands::Dashboard => run_dashboard(&config),
        Commands::Find { radius } => run_find(&config, radius).await?,
        Commands::Chat { message } => run_chat(&config, message).await?,
        Commands::Coach { duration } => run_coach(&config, duration).await?,
        Commands::Review { question } => run_review(&config, question).await?,
        Commands::Profile { action } => run_profile(&mut config, &config_path, action)?,
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                println!("{}", serde_json::to_string_pretty(&config)?);
                let (warnings, errors) = config.validate();
                for warning in &warnings {
                    println!("warning: {warning}");
                }
                for error in &errors {
                    println!("error: {error}");
                }
            }
            ConfigAction::Path => println!("{}", config_path.display()),
        },
    }

    Ok(())
}

fn init_logging(config: &Config, verbose: bool) {
    let logging = config.logging.clone().unwrap_or_default();

    let mut filter = if verbose {
        "debug".to_string()
    } else {
        logging.level.clone().unwrap_or_else(|| "info".to_string())
    };
    for directive in &logging.filters {
        filter.push(',');
        filter.push_str(directive);
    }

    let builder = tracing_subscriber::fmt().with_env_filter(
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&filter)),
    );

    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn require_api_key(config: &Config) -> anyhow::Result<String> {
    config.gemini_api_key().ok_or_else(|| {
        anyhow::anyhow!("No Gemini API key configured (set gemini.api_key or gemini.api_key_env)")
    })
}

fn run_dashboard(config: &Config) {
    let player = config.profile();
    print_profile(&player);

    println!();
    println!("Matches this week:");
    for (day, count) in dashboard::WEEKLY_TREND {
        println!("  {day}  {count:<2} {}", "#".repeat(count as usize));
    }

    println!();
    println!("Invite link: {}", dashboard::invite_link(&player));
}

async fn run_find(config: &Config, radius: Option<f64>) -> anyhow::Result<()> {
    let radius = radius
        .unwrap_or_else(|| config.radius_miles())
        .clamp(matches::MIN_RADIUS_MILES, matches::MAX_RADIUS_MILES);

    let locator = geo::from_config(config);
    let location = geo::locate_or_none(locator.as_ref()).await;

    let events = matches::events_within(&matches::seeded_events(), radius);
    println!("Listings within {radius} miles:");
    if events.is_empty() {
        println!("  (none)");
    }
    for event in &events {
        print_event(event);
    }

    let Some(coordinates) = location else {
        println!();
        println!("Location unknown; skipping venue suggestions.");
        return Ok(());
    };
    let Some(api_key) = config.gemini_api_key() else {
        println!();
        println!("No Gemini API key configured; skipping venue suggestions.");
        return Ok(());
    };

    let client = GeminiClient::new(config.gemini_base_url().as_deref(), api_key);
    let venues = matches::suggest_venues(&client, &config.text_model(), coordinates, radius).await;

    println!();
    println!("Suggested venues near {coordinates}:");
    if venues.is_empty() {
        println!("  (none found)");
    }
    for venue in &venues {
        println!("  - {} ({})", venue.title, venue.uri);
    }

    Ok(())
}

fn print_event(event: &MatchEvent) {
    let kind = match event.kind {
        MatchKind::Tournament => "tournament",
        MatchKind::Match => "match",
    };
    let sponsored = if event.is_sponsored { " [sponsored]" } else { "" };
    println!(
        "  {} ({kind}, {}, {:.1} mi){sponsored}",
        event.title, event.game_type, event.distance_miles
    );
    println!(
        "    {} at {}, hosted by {}",
        event.start_time, event.location_name, event.organizer
    );
    println!("    {}", event.description);
}

async fn run_chat(config: &Config, message: Option<String>) -> anyhow::Result<()> {
    let api_key = require_api_key(config)?;
    let client: Arc<dyn TextClient> = Arc::new(GeminiClient::new(
        config.gemini_base_url().as_deref(),
        api_key,
    ));

    let locator = geo::from_config(config);
    let location = geo::locate_or_none(locator.as_ref()).await;

    let session = ChatSession::new(
        client,
        config.text_model(),
        config.profile().skill_level,
        location,
    );

    if let Some(text) = message {
        match session.send(&text).await {
            SendOutcome::Sent => print_chat_reply(&session),
            SendOutcome::RejectedEmpty => anyhow::bail!("Message is empty"),
            SendOutcome::RejectedBusy => {}
        }
        return Ok(());
    }

    if let Some(greeting) = session.messages().first() {
        println!("shark-bot: {}", greeting.text);
    }
    loop {
        // Empty line exits
        let line: String = Input::new()
            .with_prompt("you")
            .allow_empty(true)
            .interact_text()?;
        if line.trim().is_empty() {
            break;
        }
        if session.send(&line).await == SendOutcome::Sent {
            print_chat_reply(&session);
        }
    }

    Ok(())
}

fn print_chat_reply(session: &ChatSession) {
    let messages = session.messages();
    let Some(reply) = messages.last() else { return };
    println!("shark-bot: {}", reply.text);
    for link in &reply.links {
        println!("  - {} ({})", link.title, link.uri);
    }
}

async fn run_coach(config: &Config, duration: Option<u64>) -> anyhow::Result<()> {
    let api_key = require_api_key(config)?;

    let mut controller = CaptureController::new(Arc::new(SyntheticSource::default()));
    controller.start(&CaptureConstraints::default()).await?;

    let mut recorder = Recorder::new();
    let (frames, capture_closed, mut chunks) = {
        let stream = controller
            .stream()
            .ok_or_else(|| anyhow::anyhow!("capture not active"))?;
        recorder.start(Some(stream))?;
        (stream.frames(), stream.closed(), stream.take_chunks())
    };

    let connector: Arc<dyn LiveConnector> = Arc::new(GeminiLive::new(None, api_key));
    let settings = CoachSettings {
        model: config.live_model(),
        voice: config.voice(),
        skill_level: config.profile().skill_level,
    };

    let (handle, mut updates) = start_coach(connector, settings, frames, capture_closed);

    println!("Coaching session running. Ctrl-C to stop.");

    let deadline = duration.map(|secs| tokio::time::Instant::now() + Duration::from_secs(secs));
    let mut drain = tokio::time::interval(Duration::from_millis(500));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
            _ = wait_for(deadline) => break,
            _ = drain.tick() => {
                if let Some(rx) = chunks.as_mut() {
                    recorder.drain_chunks(rx);
                }
            }
            update = updates.recv() => match update {
                Some(CoachUpdate::Opened) => println!("Coach is on the table."),
                Some(CoachUpdate::Transcript(lines)) => {
                    if let Some(line) = lines.last() {
                        println!("coach: {line}");
                    }
                }
                Some(CoachUpdate::Closed) | None => break,
            },
        }
    }

    handle.stop();
    controller.stop();

    if let Some(rx) = chunks.as_mut() {
        recorder.drain_chunks(rx);
    }
    if let Some(artifact) = recorder.stop() {
        let path = artifact.write_temp().await?;
        println!("Session recording: {}", path.display());
    }

    Ok(())
}

/// Start the coach with real audio output when available, silently otherwise.
fn start_coach(
    connector: Arc<dyn LiveConnector>,
    settings: CoachSettings,
    frames: Arc<dyn FrameSource>,
    capture_closed: CancellationToken,
) -> (CoachHandle, mpsc::UnboundedReceiver<CoachUpdate>) {
    #[cfg(feature = "cpal-audio")]
    {
        match shark_media::sink_cpal::CpalSink::new() {
            Ok(sink) => {
                return shark_coach::session::start(
                    connector,
                    settings,
                    frames,
                    capture_closed,
                    sink,
                );
            }
            Err(e) => {
                tracing::warn!(%e, "Audio output unavailable, running without playback");
            }
        }
    }
    shark_coach::session::start(connector, settings, frames, capture_closed, SilentSink::new())
}

async fn wait_for(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn run_review(config: &Config, question: Option<String>) -> anyhow::Result<()> {
    let api_key = require_api_key(config)?;
    let client: Arc<dyn TextClient> = Arc::new(GeminiClient::new(
        config.gemini_base_url().as_deref(),
        api_key,
    ));

    let mut controller = CaptureController::new(Arc::new(SyntheticSource::default()));
    controller.start(&CaptureConstraints::default()).await?;
    let frames = controller
        .stream()
        .ok_or_else(|| anyhow::anyhow!("capture not active"))?
        .frames();

    let review = ReviewSession::new(
        client,
        frames,
        config.text_model(),
        config.profile().skill_level,
    );

    if let Some(q) = question {
        match review.ask(&q).await {
            AskOutcome::Answered => print_review_reply(&review),
            AskOutcome::RejectedEmpty => anyhow::bail!("Question is empty"),
            AskOutcome::RejectedBusy => {}
        }
    } else {
        loop {
            // Empty line exits
            let q: String = Input::new()
                .with_prompt("ask")
                .allow_empty(true)
                .interact_text()?;
            if q.trim().is_empty() {
                break;
            }
            if review.ask(&q).await == AskOutcome::Answered {
                print_review_reply(&review);
            }
        }
    }

    controller.stop();
    Ok(())
}

fn print_review_reply(review: &ReviewSession) {
    let messages = review.messages();
    let Some(reply) = messages.last() else { return };
    println!("coach: {}", reply.text);
}

fn run_profile(
    config: &mut Config,
    config_path: &Path,
    action: Option<ProfileAction>,
) -> anyhow::Result<()> {
    let mut player = config.profile();

    let Some(action) = action else {
        return edit_profile_interactive(config, config_path, player);
    };

    match action {
        ProfileAction::Show => {
            print_profile(&player);
            return Ok(());
        }
        ProfileAction::Name { name } => profile::rename(&mut player, &name),
        ProfileAction::Skill { level } => profile::set_skill(&mut player, level),
        ProfileAction::Game { game } => {
            let Some(game) = GameType::parse(&game) else {
                anyhow::bail!(
                    "Unknown game {game:?}, expected one of: {}",
                    game_labels().join(", ")
                );
            };
            profile::toggle_game(&mut player, game);
        }
        ProfileAction::Pro => profile::toggle_pro(&mut player),
        ProfileAction::Result { outcome } => {
            let won = match outcome.to_lowercase().as_str() {
                "win" | "w" => true,
                "loss" | "l" => false,
                other => anyhow::bail!("Expected win or loss, got {other:?}"),
            };
            profile::record_result(&mut player, won);
        }
    }

    print_profile(&player);
    profile::save_profile(config, config_path, player)?;
    println!("Saved to {}", config_path.display());
    Ok(())
}

fn edit_profile_interactive(
    config: &mut Config,
    config_path: &Path,
    mut player: PlayerProfile,
) -> anyhow::Result<()> {
    let name: String = Input::new()
        .with_prompt("Name")
        .default(player.name.clone())
        .interact_text()?;
    profile::rename(&mut player, &name);

    let level: u8 = Input::new()
        .with_prompt("Skill level (1-10)")
        .default(player.skill_level)
        .interact_text()?;
    profile::set_skill(&mut player, level);

    let labels = game_labels();
    let defaults: Vec<bool> = GameType::ALL
        .iter()
        .map(|g| player.preferred_games.contains(g))
        .collect();
    let picked = MultiSelect::new()
        .with_prompt("Preferred games")
        .items(&labels)
        .defaults(&defaults)
        .interact()?;
    player.preferred_games = picked.into_iter().map(|i| GameType::ALL[i]).collect();

    player.is_pro = Confirm::new()
        .with_prompt("Pro player?")
        .default(player.is_pro)
        .interact()?;

    print_profile(&player);
    profile::save_profile(config, config_path, player)?;
    println!("Saved to {}", config_path.display());
    Ok(())
}

fn print_profile(player: &PlayerProfile) {
    let pro = if player.is_pro { " (pro)" } else { "" };
    println!("{}{pro}", player.name);
    println!("  Skill: {}/10", player.skill_level);
    let games: Vec<&str> = player.preferred_games.iter().map(|g| g.label()).collect();
    println!("  Games: {}", games.join(", "));
    println!(
        "  Record: {}W / {}L ({}% win rate)",
        player.wins,
        player.losses,
        dashboard::win_rate(player)
    );
}

fn game_labels() -> Vec<&'static str> {
    GameType::ALL.iter().map(|g| g.label()).collect()
}
