use clap::Args;
use colored::{ColoredString, Colorize};
use log::{debug, error};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Instant;
use text_io::read;
use thiserror::Error;

use crate::libcquizy::card::{DeviceClass, InputEvent, Key, EXIT_DURATION_MS};
use crate::libcquizy::client::{ApiClient, ClientError, ListSource, DEFAULT_API_URL};
use crate::libcquizy::session::StudySession;
use crate::libcquizy::storage::LocalStorage;
use crate::libcquizy::theme::Theme;

#[derive(Args, Debug, Clone)]
pub struct StudyArgs {
    /// Base URL of the question API
    #[arg(long, env = "CQUIZY_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// File holding bookmarks, position, timer and theme between runs
    #[arg(long, value_name = "FILE", env = "CQUIZY_STORAGE", default_value = "cquizy-storage.json")]
    pub storage: PathBuf,

    /// Read from the public listing (no session needed)
    #[arg(long)]
    pub public: bool,

    /// Only study questions from this category
    #[arg(long)]
    pub category: Option<String>,

    /// Behave like a touch device: enables the `swipe` command
    #[arg(long)]
    pub touch: bool,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Cannot reach the question API: {0}")]
    Client(#[from] ClientError),
    #[error("Input task failed: {0}")]
    Input(#[from] tokio::task::JoinError),
}

#[derive(Debug, PartialEq)]
enum Command {
    Input(Vec<InputEvent>),
    Shuffle,
    Search(String),
    Review,
    Timer,
    ResetTimer,
    Theme,
    Reload,
    Help,
    Quit,
    Unknown(String),
}

impl Command {
    /// `now_ms` stamps generated input events; keyboard navigation is
    /// followed by a tick that completes the exit animation right away.
    fn from_str(input: &str, now_ms: u64) -> Command {
        let key = |key: Key| InputEvent::Key {
            key,
            in_text_input: false,
            at_ms: now_ms,
        };
        let done = InputEvent::Tick {
            now_ms: now_ms + EXIT_DURATION_MS,
        };

        match input.trim() {
            "" | "f" | "flip" => Command::Input(vec![key(Key::Space)]),
            "n" | "l" | "next" => Command::Input(vec![key(Key::ArrowRight), done]),
            "p" | "h" | "prev" => Command::Input(vec![key(Key::ArrowLeft), done]),
            "b" | "bookmark" => Command::Input(vec![key(Key::Char('b'))]),
            "s" | "shuffle" => Command::Shuffle,
            "r" | "review" => Command::Review,
            "t" | "timer" => Command::Timer,
            "tr" => Command::ResetTimer,
            "theme" => Command::Theme,
            "reload" => Command::Reload,
            "?" | "help" => Command::Help,
            "q" | "quit" => Command::Quit,
            other => {
                if let Some(term) = other.strip_prefix('/') {
                    return Command::Search(term.trim().to_string());
                }
                match other.strip_prefix("swipe").map(|dx| dx.trim().parse::<f64>()) {
                    Some(Ok(dx)) => Command::Input(swipe(dx, now_ms)),
                    _ => Command::Unknown(other.to_string()),
                }
            }
        }
    }
}

/// A quick horizontal drag of `dx` pixels over 200ms.
fn swipe(dx: f64, now_ms: u64) -> Vec<InputEvent> {
    let end = now_ms + 200;
    vec![
        InputEvent::TouchStart {
            x: 200.0,
            y: 300.0,
            at_ms: now_ms,
        },
        InputEvent::TouchMove {
            x: 200.0 + dx,
            y: 300.0,
        },
        InputEvent::TouchEnd { at_ms: end },
        InputEvent::Tick {
            now_ms: end + EXIT_DURATION_MS,
        },
    ]
}

fn paint(text: &str, theme: Theme) -> ColoredString {
    match theme {
        Theme::Dark => text.white().on_black(),
        Theme::Light => text.black().on_white(),
    }
}

fn progress_bar(progress: f64) -> String {
    let width = 30;
    let filled = ((progress * width as f64).round() as usize).min(width);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

fn render(session: &mut StudySession) {
    if let Some(notice) = session.take_notice() {
        println!("{}", notice.yellow());
    }
    if session.is_loading() {
        println!("{}", "Loading questions...".cyan());
        return;
    }
    if let Some(err) = session.error() {
        println!("{}", err.bright_red());
        return;
    }

    let theme = session.theme();
    let deck = session.deck();
    let Some(question) = deck.current() else {
        println!("{}", "Nothing to show. Clear the search with '/'.".yellow());
        return;
    };

    let mode = if session.is_reviewing_bookmarks() {
        " (bookmarks)"
    } else {
        ""
    };
    let star = if session.current_is_bookmarked() { "★" } else { "☆" };
    println!(
        "{} {} {}{}  {}",
        progress_bar(deck.progress()).cyan(),
        deck.position_label().cyan(),
        star.yellow(),
        mode.yellow(),
        session.timer().format().dimmed()
    );
    println!(
        "{}",
        format!("#{} {}", question.question_number, question.category).bold()
    );

    if session.card().is_flipped() {
        println!("{}", paint(&format!(" {} ", question.answer), theme).bold());
        println!("{}", question.context.italic());
    } else {
        println!("{}", paint(&format!(" {} ", question.question), theme).bold());
    }
}

fn print_help(device: DeviceClass) {
    println!("{}", "Commands:".cyan());
    println!("  enter/f  flip the card         n/p   next / previous");
    println!("  b        toggle bookmark       r     review bookmarks");
    println!("  s        shuffle               /txt  search (/ alone clears)");
    println!("  t        start/pause timer     tr    reset timer");
    println!("  theme    toggle theme          reload fetch again");
    if device == DeviceClass::Touch {
        println!("  swipe N  drag the card N px (negative = next)");
    }
    println!("  q        quit");
}

async fn load(session: &mut StudySession, client: &ApiClient, args: &StudyArgs) {
    let source = if args.public {
        ListSource::Public
    } else {
        ListSource::Protected
    };
    let ticket = session.begin_load();
    let result = client.list_questions(source, args.category.as_deref()).await;
    session.finish_load(ticket, result);
}

async fn prompt() -> Result<String, CliError> {
    let line = tokio::task::spawn_blocking(|| {
        let line: String = read!("{}\n");
        line
    })
    .await?;
    Ok(line)
}

pub async fn study_loop(args: StudyArgs) -> Result<(), CliError> {
    let client = ApiClient::new(&args.api_url)?;
    let device = if args.touch {
        DeviceClass::Touch
    } else {
        DeviceClass::Pointer
    };
    let mut session = StudySession::new(LocalStorage::open(&args.storage), device);
    let started = Instant::now();
    let mut last_tick = Instant::now();

    println!(
        "{}",
        format!("==========> CQuizy ({}) <==========", args.api_url).cyan()
    );
    load(&mut session, &client, &args).await;

    loop {
        session.advance_timer(last_tick.elapsed());
        last_tick = Instant::now();

        render(&mut session);
        print!("{} ", ">".cyan());
        if let Err(err) = io::stdout().flush() {
            debug!("[Client] Could not flush stdout: {}", err);
        }
        let line = prompt().await?;

        session.advance_timer(last_tick.elapsed());
        last_tick = Instant::now();
        let now_ms = started.elapsed().as_millis() as u64;

        let command = Command::from_str(&line, now_ms);
        debug!("[Client] Command: {:?}", command);
        match command {
            Command::Input(events) => {
                for event in events {
                    if let Some(action) = session.handle_input(event) {
                        debug!("[Client] Card action: {:?}", action);
                    }
                }
            }
            Command::Shuffle => session.shuffle(),
            Command::Search(term) => session.search(&term),
            Command::Review => {
                session.toggle_review_mode();
            }
            Command::Timer => {
                let active = session.toggle_timer();
                println!("{}", if active { "Timer running" } else { "Timer paused" }.cyan());
            }
            Command::ResetTimer => session.reset_timer(),
            Command::Theme => {
                let theme = session.toggle_theme();
                println!("{}", format!("Theme: {}", theme.as_str()).cyan());
            }
            Command::Reload => load(&mut session, &client, &args).await,
            Command::Help => print_help(session.card().device()),
            Command::Quit => {
                session.pause_timer();
                let stats = session.stats();
                println!(
                    "{}",
                    format!(
                        "Viewed {} cards, flipped {} times. See you next time!",
                        stats.cards_viewed, stats.flips
                    )
                    .cyan()
                );
                return Ok(());
            }
            Command::Unknown(input) => {
                error!("[Client] Unknown command {:?}", input);
                println!("{}", format!("Unknown command {:?}, try '?'", input).bright_red());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigation_commands_complete_the_exit() {
        let Command::Input(events) = Command::from_str("n", 1000) else {
            panic!("expected input");
        };
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1],
            InputEvent::Tick {
                now_ms: 1000 + EXIT_DURATION_MS
            }
        );
    }

    #[test]
    fn test_search_and_swipe_parsing() {
        assert_eq!(
            Command::from_str("/ battery ", 0),
            Command::Search("battery".to_string())
        );
        assert_eq!(Command::from_str("/", 0), Command::Search(String::new()));
        assert!(matches!(Command::from_str("swipe -120", 0), Command::Input(events) if events.len() == 4));
        assert_eq!(
            Command::from_str("swipe far", 0),
            Command::Unknown("swipe far".to_string())
        );
    }

    #[test]
    fn test_empty_line_flips() {
        assert!(matches!(
            Command::from_str("", 5),
            Command::Input(events) if events == vec![InputEvent::Key { key: Key::Space, in_text_input: false, at_ms: 5 }]
        ));
    }

    #[test]
    fn test_progress_bar() {
        assert_eq!(progress_bar(0.0), format!("[{}]", "-".repeat(30)));
        assert_eq!(progress_bar(1.0), format!("[{}]", "#".repeat(30)));
    }
}
