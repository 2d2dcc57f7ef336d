use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use clap::{Parser, Subcommand};
use inquire::Text;
use tokio::sync::Mutex;

use crate::clients::workiq_client::question_for;
use crate::config::Settings;
use crate::events::queue::UpdateBus;
use crate::models::meeting::{Meeting, MeetingStatus};
use crate::runtime::Companion;
use crate::service::fetch_service::{FetchService, MeetingDataClient};
use crate::service::focus_service::DndController;
use crate::service::meeting_cache::{LookupWindow, MeetingCache};
use crate::service::notification_service::MeetingNotifier;
use crate::service::response_parser::ResponseParser;

#[derive(Parser)]
#[command(name = "meetingMate", about = "Meeting companion for Work IQ")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the background refresh and notification loops.
    Watch,
    /// Fetch and print one lookup window.
    Meetings {
        #[arg(default_value = "today")]
        window: String,
    },
    /// Print the next upcoming meeting.
    Next,
    /// Send a free-form question to Work IQ and print the raw answer.
    Ask,
    /// Start a focus session from the terminal.
    Focus {
        #[arg(default_value_t = 25)]
        minutes: i64,
        reason: Option<String>,
    },
}

// Terminal-facing collaborators for when no host UI is attached.
pub struct ConsoleNotifier;

#[async_trait]
impl MeetingNotifier for ConsoleNotifier {
    async fn notify(&self, message: &str, join_url: Option<&str>) -> Result<(), String> {
        match join_url {
            Some(url) => println!("[notification] {} (join: {})", message, url),
            None => println!("[notification] {}", message),
        }
        Ok(())
    }
}

pub struct LogDnd;

#[async_trait]
impl DndController for LogDnd {
    async fn suppress(&self) -> Result<(), String> {
        log::info!("Do-not-disturb enabled");
        Ok(())
    }

    async fn restore(&self) -> Result<(), String> {
        log::info!("Do-not-disturb restored");
        Ok(())
    }
}

pub async fn cli(settings: Settings, client: Arc<dyn MeetingDataClient>) {
    // Fine to panic here
    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Watch) {
        Commands::Watch => watch(settings, client).await,
        Commands::Meetings { window } => {
            let window = parse_window(&window);
            print_window(settings, client, window).await;
        }
        Commands::Next => print_next(settings, client).await,
        Commands::Ask => ask(client).await,
        Commands::Focus { minutes, reason } => focus(settings, minutes, reason).await,
    }
}

fn parse_window(value: &str) -> LookupWindow {
    match value.to_lowercase().as_str() {
        "tomorrow" => LookupWindow::Tomorrow,
        "week" => LookupWindow::Week,
        _ => LookupWindow::Today,
    }
}

fn one_shot_fetch(settings: &Settings, client: Arc<dyn MeetingDataClient>) -> FetchService {
    FetchService::new(
        Arc::new(Mutex::new(MeetingCache::new())),
        client,
        ResponseParser::new(settings.timezone),
        UpdateBus::new(4),
    )
}

async fn watch(settings: Settings, client: Arc<dyn MeetingDataClient>) {
    let companion = Companion::start(
        settings,
        client,
        Arc::new(ConsoleNotifier),
        Arc::new(LogDnd),
    );
    println!("Watching for meetings. Press Ctrl-C to stop.");
    if let Err(error) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", error);
    }
    companion.shutdown().await;
}

async fn print_window(settings: Settings, client: Arc<dyn MeetingDataClient>, window: LookupWindow) {
    let fetch = one_shot_fetch(&settings, client);
    match fetch.fetch(window, Utc::now()).await {
        Ok(meetings) if meetings.is_empty() => {
            println!("No meetings {}", window.label());
        }
        Ok(meetings) => {
            for meeting in &meetings {
                println!("{}", render_meeting(meeting, &settings));
            }
        }
        Err(error) => println!("Could not fetch meetings: {}", error),
    }
}

async fn print_next(settings: Settings, client: Arc<dyn MeetingDataClient>) {
    let fetch = one_shot_fetch(&settings, client);
    let now = Utc::now();
    match fetch.fetch(LookupWindow::Today, now).await {
        Ok(meetings) => {
            let next = meetings
                .iter()
                .find(|m| m.status == MeetingStatus::Upcoming);
            match next {
                Some(meeting) => println!(
                    "Next: {} (in {} minutes)",
                    render_meeting(meeting, &settings),
                    meeting.minutes_until_start(now)
                ),
                None => println!("No more meetings today"),
            }
        }
        Err(error) => println!("Could not fetch meetings: {}", error),
    }
}

async fn ask(client: Arc<dyn MeetingDataClient>) {
    let question = match Text::new("Ask Work IQ about your calendar.").prompt() {
        Ok(question) if !question.trim().is_empty() => question,
        _ => {
            println!("No question supplied. Example: {}", question_for(LookupWindow::Today));
            return;
        }
    };
    match client.ask(&question).await {
        Ok(answer) => println!("{}", answer),
        Err(error) => println!("Work IQ query failed: {}", error),
    }
}

async fn focus(settings: Settings, minutes: i64, reason: Option<String>) {
    let focus = crate::service::focus_service::FocusService::new(
        Arc::new(LogDnd),
        settings.focus_minutes,
        false,
    );
    let session = focus.start(minutes, reason).await;
    println!(
        "Focus session started for {} minutes. Press Ctrl-C to stop early.",
        session.planned_duration_minutes
    );
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = tokio::time::sleep(std::time::Duration::from_secs(
            (session.planned_duration_minutes.max(0) as u64) * 60,
        )) => {}
    }
    focus.stop().await;
    println!("Focus session finished.");
}

fn render_meeting(meeting: &Meeting, settings: &Settings) -> String {
    let start = meeting.start_time.with_timezone(&settings.timezone);
    let end = meeting.end_time.with_timezone(&settings.timezone);
    let mut line = format!(
        "{} - {}  {}",
        start.format("%H:%M"),
        end.format("%H:%M"),
        meeting.title
    );
    if meeting.is_online() {
        line.push_str(" (online)");
    }
    line
}
