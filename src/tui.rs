//! Terminal front end: draws the conversation with crossterm and feeds key
//! presses and transport events into the [`Session`] from a single loop.

use std::{
    io::{self, Stdout, Write},
    path::Path,
    sync::mpsc::Receiver,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use crossterm::{
    cursor::MoveTo,
    event::{poll, read, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    style::{Color, Colors, Print, SetColors},
    terminal::{self, disable_raw_mode, enable_raw_mode, Clear, ClearType},
    QueueableCommand,
};
use log::{info, warn};

use crate::config::Config;
use crate::error::ChatError;
use crate::render::{ChatLine, ConnectionStatus, Renderer};
use crate::session::Session;
use crate::state::Recipient;
use crate::transport::{Transport, TransportEvent, WsTransport};

const REFRESH_RATE: u64 = 5;
const FRAME_DELAY: u64 = 1000 / REFRESH_RATE;
const MAX_LINES: usize = 1000;

/// What the user typed on the input line.
#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    Message(String),
    Name(String),
    To(Recipient),
    Quit,
    Unknown(String),
}

impl Input {
    pub fn parse(line: &str) -> Input {
        let Some(command) = line.strip_prefix('/') else {
            return Input::Message(line.to_string());
        };
        let (name, argument) = match command.split_once(' ') {
            Some((name, argument)) => (name, argument.trim()),
            None => (command, ""),
        };
        match name {
            "name" => Input::Name(argument.to_string()),
            "to" => Input::To(Recipient::parse(argument)),
            "quit" => Input::Quit,
            _ => Input::Unknown(name.to_string()),
        }
    }
}

/// Single-line editor with a cursor.
#[derive(Debug, Default)]
pub struct Editor {
    chars: Vec<char>,
    cursor: usize,
}

impl Editor {
    pub fn text(&self) -> String {
        self.chars.iter().collect()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn insert(&mut self, chr: char) {
        self.chars.insert(self.cursor, chr);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        self.chars.remove(self.cursor);
        true
    }

    pub fn left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.chars.len());
    }

    pub fn take(&mut self) -> String {
        self.cursor = 0;
        self.chars.drain(..).collect()
    }

    pub fn set(&mut self, text: &str) {
        self.chars = text.chars().collect();
        self.cursor = self.chars.len();
    }
}

/// Everything the screen shows, kept up to date by the session.
#[derive(Debug)]
pub struct ChatView {
    status: ConnectionStatus,
    username: String,
    peers: Vec<String>,
    selection: Recipient,
    typing: Option<String>,
    lines: Vec<String>,
}

impl Default for ChatView {
    fn default() -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            username: String::new(),
            peers: vec![],
            selection: Recipient::Public,
            typing: None,
            lines: vec![],
        }
    }
}

impl ChatView {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn notice(&mut self, text: impl Into<String>) {
        self.lines.push(text.into());
        if self.lines.len() > MAX_LINES {
            let excess = self.lines.len() - MAX_LINES;
            self.lines.drain(..excess);
        }
    }

    pub fn recipient_label(&self) -> String {
        match &self.selection {
            Recipient::Public => "public".to_string(),
            Recipient::Peer(name) => name.clone(),
        }
    }

    pub fn typing_label(&self) -> String {
        match &self.typing {
            Some(sender) => format!("{sender} is typing…"),
            None => String::new(),
        }
    }

    /// The last `height` screen rows of the conversation, each line wrapped
    /// at `width` characters.
    pub fn rows(&self, width: usize, height: usize) -> Vec<String> {
        let width = width.max(1);
        let mut rows: Vec<String> = vec![];
        for line in &self.lines {
            let chars = line.chars().collect::<Vec<_>>();
            if chars.is_empty() {
                rows.push(String::new());
            }
            rows.extend(chars.chunks(width).map(|chunk| chunk.iter().collect()));
        }
        let skip = rows.len().saturating_sub(height);
        rows.split_off(skip)
    }
}

impl Renderer for ChatView {
    fn status_changed(&mut self, status: ConnectionStatus) {
        self.status = status;
    }

    fn peers_changed(&mut self, peers: &[String], _recipients: &[&str], selection: &Recipient) {
        self.peers = peers.to_vec();
        self.selection = selection.clone();
    }

    fn selection_changed(&mut self, selection: &Recipient) {
        self.selection = selection.clone();
    }

    fn identity_changed(&mut self, identity: &str) {
        self.username = identity.to_string();
    }

    fn typing_shown(&mut self, sender: &str) {
        self.typing = Some(sender.to_string());
    }

    fn typing_hidden(&mut self) {
        self.typing = None;
    }

    fn append(&mut self, line: ChatLine) {
        self.notice(line.to_string());
    }

    fn report(&mut self, error: &ChatError) {
        self.notice(format!("[!] {error}"));
    }
}

/// Connects to the configured server and runs the terminal UI until the user
/// quits.
pub fn start(mut config: Config, config_path: &Path) -> Result<()> {
    let (transport, events) = WsTransport::open(&config.server_url, config.reconnect_interval())
        .context("starting the transport thread")?;
    let mut session = Session::new(transport, ChatView::default(), config.typing_timeout());
    if !config.username.trim().is_empty() {
        let _ = session.set_identity(&config.username);
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, Clear(ClearType::All))?;

    let result = run(&mut session, &events, &mut config, config_path, &mut stdout);

    session.shutdown();
    disable_raw_mode()?;
    clearscreen::clear()?;
    result
}

fn run<T: Transport>(
    session: &mut Session<T, ChatView>,
    events: &Receiver<TransportEvent>,
    config: &mut Config,
    config_path: &Path,
    stdout: &mut Stdout,
) -> Result<()> {
    let mut editor = Editor::default();

    loop {
        for event in events.try_iter() {
            session.handle_transport(event, Instant::now());
        }
        session.tick(Instant::now());

        draw(stdout, session.renderer(), &editor)?;

        if !poll(Duration::from_millis(FRAME_DELAY))? {
            continue;
        }
        let Event::Key(key) = read()? else {
            continue;
        };
        if key.kind == KeyEventKind::Release {
            continue;
        }
        if !handle_key(key, session, &mut editor, config, config_path)? {
            info!("Quitting");
            return Ok(());
        }
    }
}

/// Returns `false` when the user asked to quit.
fn handle_key<T: Transport>(
    key: KeyEvent,
    session: &mut Session<T, ChatView>,
    editor: &mut Editor,
    config: &mut Config,
    config_path: &Path,
) -> Result<bool> {
    match key.code {
        KeyCode::Esc => return Ok(false),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Ok(false),
        KeyCode::Tab => session.cycle_recipient(),
        KeyCode::Left => editor.left(),
        KeyCode::Right => editor.right(),
        KeyCode::Backspace => {
            if editor.backspace() {
                let _ = session.composing();
            }
        }
        KeyCode::Char(chr) => {
            editor.insert(chr);
            let _ = session.composing();
        }
        KeyCode::Enter => match Input::parse(&editor.take()) {
            Input::Message(text) => {
                // keep the draft when it could not be sent
                if session.submit(&text).is_err() {
                    editor.set(&text);
                }
            }
            Input::Name(name) => {
                if session.set_identity(&name).is_ok() {
                    config.username = name;
                    if let Err(e) = config.save(config_path) {
                        warn!("Could not save config: {:#}", e);
                        session.renderer_mut().notice(format!("[!] {e}"));
                    }
                }
            }
            Input::To(recipient) => {
                let _ = session.select_recipient(recipient);
            }
            Input::Quit => return Ok(false),
            Input::Unknown(command) => session
                .renderer_mut()
                .notice(format!("[!] unknown command /{command} (try /name, /to, /quit)")),
        },
        _ => {}
    }
    Ok(true)
}

fn draw(stdout: &mut Stdout, view: &ChatView, editor: &Editor) -> Result<()> {
    let (width, height) = terminal::size()?;
    let (cols, rows) = (width as usize, height as usize);
    if rows < 5 || cols < 10 {
        return Ok(());
    }

    // Top information bar
    let (badge, colors) = match view.status {
        ConnectionStatus::Connected => (" Connected ", Colors::new(Color::Black, Color::Green)),
        ConnectionStatus::Connecting => (" Connecting ", Colors::new(Color::Black, Color::Yellow)),
        ConnectionStatus::Disconnected => (" Not connected ", Colors::new(Color::Black, Color::Red)),
    };
    let info = format!(
        " wschat | username: {} | to: {} ",
        if view.username.is_empty() { "-" } else { view.username.as_str() },
        view.recipient_label()
    );
    stdout
        .queue(MoveTo(0, 0))?
        .queue(SetColors(colors))?
        .queue(Print(badge))?
        .queue(SetColors(Colors::new(Color::Black, Color::White)))?
        .queue(Print(fit(&info, cols.saturating_sub(badge.chars().count()))))?
        .queue(SetColors(Colors::new(Color::Reset, Color::Reset)))?;

    let online = format!("online: {}", view.peers.join(", "));
    stdout.queue(MoveTo(0, 1))?.queue(Print(fit(&online, cols)))?;

    // Messages, newest at the bottom
    let area = rows - 5;
    let messages = view.rows(cols, area);
    let blank = area - messages.len();
    for i in 0..area {
        let text = if i < blank { "" } else { messages[i - blank].as_str() };
        stdout
            .queue(MoveTo(0, (2 + i) as u16))?
            .queue(Print(fit(text, cols)))?;
    }

    let editor_text = format!("> {}", editor.text());
    stdout
        .queue(MoveTo(0, height - 3))?
        .queue(Print(fit(&view.typing_label(), cols)))?
        .queue(MoveTo(0, height - 2))?
        .queue(Print("╸".repeat(cols)))?
        .queue(MoveTo(0, height - 1))?
        .queue(Print(fit(&editor_text, cols)))?
        .queue(MoveTo(((2 + editor.cursor()).min(cols - 1)) as u16, height - 1))?;

    stdout.flush()?;
    Ok(())
}

/// Truncates or pads `text` to exactly `width` characters.
fn fit(text: &str, width: usize) -> String {
    let mut line = text.chars().take(width).collect::<String>();
    let len = line.chars().count();
    line.push_str(&" ".repeat(width - len));
    line
}
