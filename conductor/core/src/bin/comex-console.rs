//! Comex Console
//!
//! Line-oriented chat client for the Conductor. Replies stream to stdout as
//! they arrive; logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! GEMINI_API_KEY=... comex-console
//!
//! # Start in the customs-law mode with verbose logging
//! COMEX_MODE=legal RUST_LOG=comex_conductor=debug comex-console
//! ```
//!
//! # Commands
//!
//! - `/mode <id>`: Switch mode (`general`, `ncm`, `legal`, `docs`)
//! - `/modes`: List modes
//! - `/s <n>`: Send suggested query `n`
//! - `/quit`: Exit
//!
//! Any other line is sent as a message.
//!
//! # Environment Variables
//!
//! - `GEMINI_API_KEY` (or `API_KEY`): Provider API key (required)
//! - `COMEX_MODE`: Initial mode (default: general)
//! - `COMEX_CONFIG`: Config file path
//! - `COMEX_GEMINI_BASE_URL`: Provider base URL
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)

use std::io::Write;

use anyhow::Context as _;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info};

use comex_conductor::{
    all_modes, get_mode, ChatBackend, Conductor, ConductorError, ConductorMessage, Config, GeminiBackend,
    GroundingReference, MessageStatus, Mode, ModeId, Sender, SurfaceEvent, STREAM_ERROR_TEXT,
};

/// A parsed input line
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Quit,
    Modes,
    Mode(String),
    Suggestion(String),
    Message(String),
}

impl Command {
    fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        match trimmed.split_once(char::is_whitespace) {
            _ if trimmed == "/quit" => Self::Quit,
            _ if trimmed == "/modes" => Self::Modes,
            Some(("/mode", arg)) => Self::Mode(arg.trim().to_string()),
            Some(("/s", arg)) => Self::Suggestion(arg.trim().to_string()),
            _ => Self::Message(line.to_string()),
        }
    }
}

/// What woke the main loop
enum Input {
    Line(Option<String>),
    Stepped(Result<bool, ConductorError>),
    Interrupted,
}

/// Prints conductor notifications as a transcript
#[derive(Default)]
struct ConsoleView {
    /// Citations of the reply being streamed
    sources: Vec<GroundingReference>,
}

impl ConsoleView {
    fn render(&mut self, message: ConductorMessage) {
        let mut out = std::io::stdout().lock();
        let _ = match message {
            ConductorMessage::ModeChanged { mode, .. } => {
                writeln!(out, "\n== {} ==", get_mode(mode).name)
            }
            ConductorMessage::MessageAppended { message } => match (message.sender, message.status) {
                (Sender::Bot, MessageStatus::Pending) => {
                    self.sources.clear();
                    write!(out, "\nComexGlobal AI: ")
                }
                (Sender::Bot, _) => writeln!(out, "\nComexGlobal AI: {}", message.text),
                (Sender::System, _) => writeln!(out, "[info] {}", message.text),
                (Sender::User, _) => Ok(()),
            },
            ConductorMessage::TextDelta { text, .. } => write!(out, "{text}"),
            ConductorMessage::Grounding { references, .. } => {
                self.sources.extend(references);
                Ok(())
            }
            ConductorMessage::StreamEnd { .. } => {
                let _ = writeln!(out);
                if !self.sources.is_empty() {
                    let _ = writeln!(out, "Fontes:");
                }
                for (n, source) in self.sources.drain(..).enumerate() {
                    let _ = writeln!(out, "  [{}] {} — {}", n + 1, source.display_title(), source.uri);
                }
                Ok(())
            }
            ConductorMessage::StreamError { .. } => writeln!(out, "\n{STREAM_ERROR_TEXT}"),
            ConductorMessage::InputRejected { reason } => writeln!(out, "! {reason}"),
            ConductorMessage::Loading { .. } => Ok(()),
        };
        let _ = out.flush();
    }

    fn drain(&mut self, updates: &mut mpsc::UnboundedReceiver<ConductorMessage>) {
        while let Ok(message) = updates.try_recv() {
            self.render(message);
        }
    }
}

fn mode_line(mode: &Mode, active: Option<ModeId>) -> String {
    let marker = if Some(mode.id) == active { '*' } else { ' ' };
    let search = if mode.uses_search() { " [busca web]" } else { "" };
    format!(
        "{marker} {:<8} {} - {}{search}",
        mode.id.as_str(),
        mode.name,
        mode.description
    )
}

fn print_modes(active: Option<ModeId>) {
    for mode in all_modes() {
        println!("{}", mode_line(mode, active));
    }
}

fn print_suggestions<B: ChatBackend>(conductor: &Conductor<B>) {
    let suggestions = conductor.suggestions();
    if suggestions.is_empty() {
        return;
    }
    println!("\nSugestões:");
    for (n, query) in suggestions.iter().enumerate() {
        println!("  /s {}  {query}", n + 1);
    }
}

async fn dispatch<B: ChatBackend>(conductor: &mut Conductor<B>, event: SurfaceEvent) {
    if let Err(e) = conductor.handle_event(event).await {
        error!(error = %e, "Event failed");
        eprintln!("error: {e}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("comex_conductor=info".parse()?),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;
    let backend = GeminiBackend::new(&config.backend)?;
    info!(
        base_url = %config.backend.base_url,
        mode = %config.conductor.initial_mode,
        "Starting Comex console"
    );

    let mut conductor = Conductor::new(backend, config.conductor.clone());
    let mut updates = conductor.subscribe();
    let mut view = ConsoleView::default();

    dispatch(
        &mut conductor,
        SurfaceEvent::ModeSelected {
            mode: config.conductor.initial_mode,
        },
    )
    .await;
    view.drain(&mut updates);
    print_suggestions(&conductor);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let input = tokio::select! {
            line = lines.next_line() => Input::Line(line?),
            stepped = conductor.step(), if conductor.is_streaming() => Input::Stepped(stepped),
            _ = tokio::signal::ctrl_c() => Input::Interrupted,
        };

        match input {
            Input::Line(None) => break,
            Input::Interrupted => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
            Input::Stepped(Err(e)) => error!(error = %e, "Failed to apply reply"),
            Input::Stepped(Ok(_)) => {}
            Input::Line(Some(line)) => match Command::parse(&line) {
                Command::Quit => break,
                Command::Modes => print_modes(conductor.mode()),
                Command::Mode(arg) => match arg.parse::<ModeId>() {
                    Ok(mode) => {
                        dispatch(&mut conductor, SurfaceEvent::ModeSelected { mode }).await;
                        view.drain(&mut updates);
                        print_suggestions(&conductor);
                    }
                    Err(e) => println!("! {e}"),
                },
                Command::Suggestion(arg) => match arg.parse::<usize>() {
                    Ok(n) if n >= 1 => {
                        let event = SurfaceEvent::SuggestionSelected { index: n - 1 };
                        dispatch(&mut conductor, event).await;
                    }
                    _ => println!("! usage: /s <n>"),
                },
                Command::Message(text) => {
                    dispatch(&mut conductor, SurfaceEvent::UserMessage { content: text }).await;
                }
            },
        }
        view.drain(&mut updates);
    }

    Ok(())
}
