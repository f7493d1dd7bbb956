//! # p2048 CLI
//!
//! Terminal front-end: renders the board, reads single keys in raw mode and
//! keeps the game, best score and preferences in a JSON state file.

mod file_store;

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use p2048_core::{
    Direction, GridSize, MoveReport, Notifier, NotifyError, Preferences, RenderSnapshot,
    SeededRandom, Session, SessionEvent, Theme,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::file_store::FileStore;

#[derive(Parser, Debug)]
#[command(name = "p2048")]
#[command(author, version, about = "Play p2048 in the terminal")]
struct Args {
    /// File holding the saved game, best score and preferences
    #[arg(long, default_value = "p2048-state.json")]
    state_file: PathBuf,

    /// Random seed for tile placement (default: derived from the clock)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Board size; saved as a preference and starts a new game
    #[arg(long, value_parser = clap::value_parser!(u8).range(2..=8))]
    size: Option<u8>,

    /// Colour theme; saved as a preference
    #[arg(long, value_enum)]
    theme: Option<ThemeArg>,

    /// Ring the terminal bell on merges and game over; saved as a preference
    #[arg(long)]
    sound: Option<bool>,

    /// Start a new game instead of resuming the saved one
    #[arg(short, long)]
    new: bool,

    /// Erase the saved game, best score and preferences before playing
    #[arg(long)]
    reset: bool,

    /// Log filter for stderr, e.g. "p2048_core=debug"
    #[arg(long, default_value = "warn")]
    log: String,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ThemeArg {
    Auto,
    Dark,
    Light,
}

impl From<ThemeArg> for Theme {
    fn from(arg: ThemeArg) -> Theme {
        match arg {
            ThemeArg::Auto => Theme::Auto,
            ThemeArg::Dark => Theme::Dark,
            ThemeArg::Light => Theme::Light,
        }
    }
}

impl Args {
    /// Preferences with any command-line overrides applied, or `None` when
    /// nothing was overridden.
    fn preference_overrides(&self, current: Preferences) -> Option<Preferences> {
        if self.size.is_none() && self.theme.is_none() && self.sound.is_none() {
            return None;
        }
        Some(Preferences {
            size: self
                .size
                .map_or(current.size, |n| GridSize::clamped(usize::from(n))),
            theme: self.theme.map_or(current.theme, Theme::from),
            sound: self.sound.unwrap_or(current.sound),
        })
    }
}

/// Rings the terminal bell. Failures are reported to the session, which
/// drops them.
struct Bell {
    enabled: bool,
}

impl Notifier for Bell {
    fn notify(&mut self, event: &SessionEvent) -> Result<(), NotifyError> {
        if !self.enabled || matches!(event, SessionEvent::Moved { .. }) {
            return Ok(());
        }
        let mut out = io::stdout();
        out.write_all(b"\x07")
            .and_then(|()| out.flush())
            .map_err(|err| NotifyError(err.to_string()))
    }
}

type TermSession = Session<FileStore, SeededRandom, Bell>;

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(args.log.clone()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let store = FileStore::open(&args.state_file)
        .with_context(|| format!("opening state file {}", args.state_file.display()))?;
    tracing::debug!(path = %store.path().display(), "state file opened");

    let seed = args.seed.unwrap_or_else(clock_seed);
    let mut session = Session::open(store, SeededRandom::new(seed)).with_notifier(Bell { enabled: false });

    if args.reset {
        session.hard_reset();
    }
    match args.preference_overrides(session.preferences()) {
        Some(prefs) => session.apply_preferences(&prefs),
        None if !args.reset => session.start(args.new),
        None => {}
    }
    session.notifier_mut().enabled = session.preferences().sound;

    run_interactive(&mut session)
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(42)
}

/// Run interactive mode where the player uses the keyboard.
fn run_interactive(session: &mut TermSession) -> Result<()> {
    enable_raw_mode();
    let result = play(session);
    disable_raw_mode();
    println!("\nGoodbye!");
    result
}

fn play(session: &mut TermSession) -> Result<()> {
    let mut stdin = io::stdin();
    let mut buffer = [0u8; 3];
    redraw(session, None)?;

    loop {
        let bytes_read = stdin.read(&mut buffer).context("reading keyboard input")?;
        if bytes_read == 0 {
            return Ok(());
        }

        let mut gained = None;
        match parse_input(&buffer[..bytes_read]) {
            InputAction::Move(dir) => {
                if let MoveReport::Moved { score_delta, .. } = session.apply_move(dir) {
                    gained = Some(score_delta).filter(|&d| d > 0);
                }
            }
            InputAction::Undo => {
                session.undo();
            }
            InputAction::NewGame => session.start(true),
            InputAction::Resize(step) => {
                let mut prefs = session.preferences();
                let target = prefs.size.get().saturating_add_signed(step);
                prefs.size = GridSize::clamped(target);
                if prefs.size != session.size() {
                    session.apply_preferences(&prefs);
                }
            }
            InputAction::Quit => return Ok(()),
            InputAction::None => continue,
        }
        redraw(session, gained)?;
    }
}

fn redraw(session: &TermSession, gained: Option<u64>) -> Result<()> {
    let theme = session.preferences().theme;
    let mut out = io::stdout().lock();
    write!(out, "\x1b[2J\x1b[H")?; // clear screen
    write!(out, "{}", render(&session.snapshot(), theme, gained))?;
    out.flush()?;
    Ok(())
}

const CONTROLS: &str =
    "Arrows / WASD / HJKL move | U undo | N new game | +/- size | Q quit";

/// Render a snapshot as terminal text.
fn render(snapshot: &RenderSnapshot, theme: Theme, gained: Option<u64>) -> String {
    let (tile_on, tile_off) = match theme {
        Theme::Auto => ("", ""),
        Theme::Dark => ("\x1b[1;33m", "\x1b[0m"),
        Theme::Light => ("\x1b[1;34m", "\x1b[0m"),
    };
    let widest = snapshot
        .rows
        .iter()
        .flatten()
        .map(|v| v.to_string().len())
        .max()
        .unwrap_or(1);
    let width = widest.max(4) + 2;
    let rule = format!("+{}", format!("{}+", "-".repeat(width)).repeat(snapshot.size));

    let mut text = String::new();
    text.push_str("=== p2048 ===\n");
    text.push_str(&format!(
        "Score: {}   Best: {}\n\n",
        snapshot.score, snapshot.best
    ));
    text.push_str(&rule);
    text.push('\n');
    for row in &snapshot.rows {
        text.push('|');
        for &val in row {
            if val == 0 {
                text.push_str(&" ".repeat(width));
            } else {
                text.push_str(&format!("{tile_on}{:^width$}{tile_off}", val));
            }
            text.push('|');
        }
        text.push('\n');
        text.push_str(&rule);
        text.push('\n');
    }
    if let Some(points) = gained {
        text.push_str(&format!("  +{points} points!\n"));
    }
    if let Some(notice) = &snapshot.terminal {
        text.push_str(&format!(
            "\n  *** {} ***\n  {}\n  Press U to undo or N for a new game\n",
            notice.title, notice.description
        ));
    }
    text.push('\n');
    text.push_str(CONTROLS);
    text.push('\n');
    text
}

#[derive(Debug, PartialEq, Eq)]
enum InputAction {
    Move(Direction),
    Undo,
    NewGame,
    Resize(isize),
    Quit,
    None,
}

fn parse_input(bytes: &[u8]) -> InputAction {
    let key = match bytes {
        // Arrow keys (escape sequences)
        [27, 91, 65] => "ArrowUp",
        [27, 91, 66] => "ArrowDown",
        [27, 91, 67] => "ArrowRight",
        [27, 91, 68] => "ArrowLeft",

        // Control keys
        [b'q'] | [b'Q'] | [3] | [27] => return InputAction::Quit, // q, Q, Ctrl+C, Esc
        [b'u'] | [b'U'] => return InputAction::Undo,
        [b'n'] | [b'N'] | [b'r'] | [b'R'] => return InputAction::NewGame,
        [b'+'] | [b'='] => return InputAction::Resize(1),
        [b'-'] | [b'_'] => return InputAction::Resize(-1),

        [byte] if byte.is_ascii_alphabetic() => {
            return Direction::from_key(&char::from(*byte).to_string())
                .map_or(InputAction::None, InputAction::Move)
        }
        _ => return InputAction::None,
    };
    Direction::from_key(key).map_or(InputAction::None, InputAction::Move)
}

// Platform-specific terminal raw mode handling
#[cfg(unix)]
fn enable_raw_mode() {
    use std::os::unix::io::AsRawFd;
    unsafe {
        let fd = io::stdin().as_raw_fd();
        let mut termios: libc::termios = std::mem::zeroed();
        libc::tcgetattr(fd, &mut termios);
        termios.c_lflag &= !(libc::ICANON | libc::ECHO);
        termios.c_cc[libc::VMIN] = 1;
        termios.c_cc[libc::VTIME] = 0;
        libc::tcsetattr(fd, libc::TCSANOW, &termios);
    }
}

#[cfg(unix)]
fn disable_raw_mode() {
    use std::os::unix::io::AsRawFd;
    unsafe {
        let fd = io::stdin().as_raw_fd();
        let mut termios: libc::termios = std::mem::zeroed();
        libc::tcgetattr(fd, &mut termios);
        termios.c_lflag |= libc::ICANON | libc::ECHO;
        libc::tcsetattr(fd, libc::TCSANOW, &termios);
    }
}

#[cfg(not(unix))]
fn enable_raw_mode() {
    // Without raw mode each key needs Enter
}

#[cfg(not(unix))]
fn disable_raw_mode() {}
