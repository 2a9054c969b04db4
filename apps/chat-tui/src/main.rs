//! Terminal chat front end for the videogames assistant.
//!
//! Run with: cargo run -p videogames-assistant-chat
//!
//! Talks to the agent runtime at `AGENT_RUNTIME_URL`. Logs go to
//! `videogames-assistant-chat.log` in the temp directory.

use std::{
    fs::File,
    io,
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::Context;
use assistant_core::ServiceConfig;
use assistant_runner::{AdkClient, MessageRelay, RelayConfig};
use assistant_session::{RetentionPolicy, SessionStore};
use assistant_transport::{
    ChatState,
    tui::{
        ChatAction, TranscriptScroll, key_to_action, transcript_lines, transcript_paragraph,
        truncate_id,
    },
};
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const LOG_FILE: &str = "videogames-assistant-chat.log";
const PAGE: u16 = 10;
const SPINNER: [&str; 4] = ["|", "/", "-", "\\"];

type Chat = ChatState<AdkClient, AdkClient>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging()?;

    let config = ServiceConfig::from_env()?;
    let client = AdkClient::new(&config.runtime_url, config.app_name.clone())?;
    let policy = config
        .session_capacity
        .map_or_else(RetentionPolicy::unbounded, RetentionPolicy::bounded);
    let store = Arc::new(SessionStore::with_policy(
        client.clone(),
        config.app_name.clone(),
        policy,
    ));
    let relay = MessageRelay::with_config(
        store,
        Arc::new(client),
        RelayConfig {
            idle_timeout: config.relay_idle_timeout,
        },
    );
    let chat = ChatState::new(relay);
    tracing::info!(
        user_id = chat.user_id(),
        session_id = chat.session_id(),
        runtime = %config.runtime_url,
        "Chat started"
    );

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, App::new(chat)).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(e) = &result {
        tracing::error!("Chat exited with error: {e}");
    }
    result
}

fn init_logging() -> anyhow::Result<()> {
    let path = std::env::temp_dir().join(LOG_FILE);
    let file = File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
    Ok(())
}

struct App {
    chat: Chat,
    input: String,
    scroll: TranscriptScroll,
    tick: usize,
}

impl App {
    fn new(chat: Chat) -> Self {
        Self {
            chat,
            input: String::new(),
            scroll: TranscriptScroll::default(),
            tick: 0,
        }
    }

    fn submit(&mut self) {
        if self.chat.start_turn(&self.input) {
            self.input.clear();
            self.scroll.follow();
        }
    }

    fn new_conversation(&mut self) {
        if self.chat.reset() {
            self.scroll = TranscriptScroll::default();
        }
    }
}

async fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, mut app: App) -> anyhow::Result<()> {
    loop {
        if app.chat.poll_turn().await.is_some() {
            app.scroll.follow();
        }
        app.tick = app.tick.wrapping_add(1);

        terminal.draw(|f| ui(f, &mut app))?;

        if !event::poll(Duration::from_millis(50))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match key_to_action(&key) {
            Some(ChatAction::Quit) => {
                app.chat.abort_turn();
                return Ok(());
            }
            Some(ChatAction::Input(c)) => app.input.push(c),
            Some(ChatAction::Backspace) => {
                app.input.pop();
            }
            Some(ChatAction::Submit) => app.submit(),
            Some(ChatAction::NewConversation) => app.new_conversation(),
            Some(ChatAction::Cancel) => {
                app.chat.cancel_turn();
            }
            Some(ChatAction::ScrollUp) => app.scroll.scroll_up(1),
            Some(ChatAction::ScrollDown) => app.scroll.scroll_down(1),
            Some(ChatAction::PageUp) => app.scroll.scroll_up(PAGE),
            Some(ChatAction::PageDown) => app.scroll.scroll_down(PAGE),
            None => {}
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // Header
            Constraint::Min(3),    // Transcript
            Constraint::Length(3), // Input
            Constraint::Length(1), // Status
        ])
        .split(f.area());

    let header = Paragraph::new(vec![
        Line::from(Span::styled(
            "AI Video Games Assistant",
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            "Your expert companion for all things gaming",
            Style::default().fg(Color::DarkGray),
        )),
    ]);
    f.render_widget(header, chunks[0]);

    // Transcript, measured inside the borders
    let lines = transcript_lines(app.chat.messages(), |index| app.chat.is_failed(index));
    let (transcript, rows) = transcript_paragraph(lines, chunks[1].width.saturating_sub(2));
    let offset = app.scroll.resolve(rows, chunks[1].height.saturating_sub(2));
    let transcript = transcript
        .block(Block::default().borders(Borders::ALL).title("Conversation"))
        .scroll((offset, 0));
    f.render_widget(transcript, chunks[1]);

    // Input
    let input = Paragraph::new(app.input.as_str())
        .style(Style::default().fg(Color::Yellow))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Ask about video games..."),
        );
    f.render_widget(input, chunks[2]);

    let cursor = u16::try_from(app.input.chars().count()).unwrap_or(u16::MAX);
    f.set_cursor_position((
        chunks[2].x.saturating_add(cursor).saturating_add(1),
        chunks[2].y + 1,
    ));

    // Status bar
    let (status, status_style) = if app.chat.is_pending() {
        (
            format!("{} Thinking...", SPINNER[app.tick / 4 % SPINNER.len()]),
            Style::default().fg(Color::Yellow),
        )
    } else if app.chat.last_turn_failed() {
        ("Last reply failed".to_string(), Style::default().fg(Color::Red))
    } else {
        (
            format!(
                "User: {} | Session: {}",
                truncate_id(app.chat.user_id()),
                truncate_id(app.chat.session_id())
            ),
            Style::default().fg(Color::Green),
        )
    };

    let key_style = Style::default().fg(Color::Yellow);
    let status = Paragraph::new(Line::from(vec![
        Span::raw(" "),
        Span::styled(status, status_style),
        Span::raw(" | "),
        Span::styled("Enter", key_style),
        Span::raw(" send | "),
        Span::styled("Ctrl+N", key_style),
        Span::raw(" new | "),
        Span::styled("Esc", key_style),
        Span::raw(" cancel | "),
        Span::styled("Ctrl+C", key_style),
        Span::raw(" quit "),
    ]));
    f.render_widget(status, chunks[3]);
}
