use std::io::Write;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::app::{App, Command, CommandOutcome};
use crate::news::{CATEGORIES, SOURCES};
use crate::surface::{Palette, Pane, Surface};

const RESET: &str = "\x1b[0m";

/// One terminal region. The prompt pane is plain text and refuses colors.
pub struct ConsolePane {
    name: &'static str,
    colorable: bool,
    palette: Option<Palette>,
}

impl ConsolePane {
    fn new(name: &'static str, colorable: bool) -> Self {
        Self {
            name,
            colorable,
            palette: None,
        }
    }

    pub fn palette(&self) -> Option<Palette> {
        self.palette
    }

    fn paint(&self, text: &str) -> String {
        match self.palette {
            Some(p) => format!("{}{}{}{}", ansi_bg(p.bg), ansi_fg(p.fg), text, RESET),
            None => text.to_string(),
        }
    }
}

impl Pane for ConsolePane {
    fn name(&self) -> &str {
        self.name
    }

    fn recolor(&mut self, palette: Palette) -> Result<()> {
        if !self.colorable {
            anyhow::bail!("pane '{}' does not support colors", self.name);
        }
        self.palette = Some(palette);
        Ok(())
    }
}

/// Line-oriented surface writing to any `Write` (stdout in the binary).
pub struct ConsoleSurface<W: Write> {
    out: W,
    header: ConsolePane,
    list: ConsolePane,
    status: ConsolePane,
    prompt: ConsolePane,
    header_text: String,
    rows: Vec<String>,
    selection: Option<usize>,
}

impl<W: Write> ConsoleSurface<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            header: ConsolePane::new("header", true),
            list: ConsolePane::new("list", true),
            status: ConsolePane::new("status", true),
            prompt: ConsolePane::new("prompt", false),
            header_text: String::new(),
            rows: Vec::new(),
            selection: None,
        }
    }

    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Print the input prompt.
    pub fn prompt(&mut self) {
        let line = self.prompt.paint("techpulse> ");
        let _ = write!(self.out, "{}", line);
        let _ = self.out.flush();
    }

    pub fn show_help(&mut self) {
        let _ = writeln!(self.out, "{}", help_text());
    }

    pub fn show_bookmarks(&mut self, lines: &[String]) {
        if lines.is_empty() {
            let _ = writeln!(self.out, "{}", self.status.paint("No bookmarks yet."));
            return;
        }
        for line in lines {
            let _ = writeln!(self.out, "{}", self.list.paint(line));
        }
    }

    fn draw_list(&mut self) {
        let _ = writeln!(self.out, "{}", self.header.paint(&self.header_text));
        if self.rows.is_empty() {
            let _ = writeln!(self.out, "{}", self.list.paint("(no headlines)"));
        }
        for (i, title) in self.rows.iter().enumerate() {
            let marker = if self.selection == Some(i) { '>' } else { ' ' };
            let line = format!("{}{:>3}  {}", marker, i, title);
            let _ = writeln!(self.out, "{}", self.list.paint(&line));
        }
        let _ = self.out.flush();
    }
}

impl<W: Write> Surface for ConsoleSurface<W> {
    fn set_rows(&mut self, rows: Vec<String>) {
        self.rows = rows;
        self.selection = None;
        self.draw_list();
    }

    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn selection(&self) -> Option<usize> {
        self.selection
    }

    fn select(&mut self, row: usize) -> bool {
        if row >= self.rows.len() {
            return false;
        }
        self.selection = Some(row);
        true
    }

    fn set_header(&mut self, text: String) {
        self.header_text = text;
    }

    fn notify(&mut self, title: &str, message: &str) {
        let line = format!("[{}] {}", title, message);
        let _ = writeln!(self.out, "{}", self.status.paint(&line));
        let _ = self.out.flush();
    }

    fn panes_mut(&mut self) -> Vec<&mut dyn Pane> {
        vec![
            &mut self.header as &mut dyn Pane,
            &mut self.list,
            &mut self.status,
            &mut self.prompt,
        ]
    }

    fn redraw(&mut self) {
        self.draw_list();
    }
}

/// Parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    Command(Command),
    Help,
    Quit,
    Empty,
}

/// Parse one input line. Unknown commands and bad row numbers are reported as `Err`.
pub fn parse_line(line: &str) -> Result<ConsoleInput, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(ConsoleInput::Empty);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((w, r)) => (w, r.trim()),
        None => (line, ""),
    };

    let input = match word.to_ascii_lowercase().as_str() {
        "fetch" | "refresh" | "r" => ConsoleInput::Command(Command::Fetch),
        "search" | "s" => ConsoleInput::Command(Command::Search(rest.to_string())),
        "category" | "c" => {
            if rest.is_empty() {
                return Err(format!("usage: category <{}>", CATEGORIES.join("|")));
            }
            ConsoleInput::Command(Command::SetCategory(rest.to_string()))
        }
        "source" => ConsoleInput::Command(Command::SetSource(rest.to_string())),
        "select" => ConsoleInput::Command(Command::Select(parse_row(rest)?.ok_or("usage: select <n>")?)),
        "open" | "o" => ConsoleInput::Command(Command::Open(parse_row(rest)?)),
        "bookmark" | "b" => ConsoleInput::Command(Command::Bookmark(parse_row(rest)?)),
        "bookmarks" => ConsoleInput::Command(Command::ListBookmarks),
        "dark" | "theme" => ConsoleInput::Command(Command::ToggleTheme),
        "help" | "h" | "?" => ConsoleInput::Help,
        "quit" | "exit" | "q" => ConsoleInput::Quit,
        other => return Err(format!("unknown command '{}' (try 'help')", other)),
    };
    Ok(input)
}

fn parse_row(raw: &str) -> Result<Option<usize>, String> {
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<usize>()
        .map(Some)
        .map_err(|_| format!("'{}' is not a row number", raw))
}

pub fn help_text() -> String {
    let sources: Vec<&str> = SOURCES.iter().filter(|s| !s.is_empty()).copied().collect();
    format!(
        "Commands:\n\
         \x20 fetch | refresh        reload headlines with the current filters\n\
         \x20 search [text]          set the search text and reload\n\
         \x20 category <name>        set the category ({})\n\
         \x20 source [name]          set the source ({}; empty for any)\n\
         \x20 select <n>             select row n\n\
         \x20 open [n]               open the selected (or n-th) article in the browser\n\
         \x20 bookmark [n]           bookmark the selected (or n-th) article\n\
         \x20 bookmarks              list saved bookmarks\n\
         \x20 dark                   toggle dark mode\n\
         \x20 quit                   exit",
        CATEGORIES.join(", "),
        sources.join(", ")
    )
}

/// Run the interactive loop until `quit` or end of input.
///
/// Headlines are fetched once at startup, then again `refresh_every` after each
/// timer-driven fetch completes. Fetches are awaited inline, so input waits
/// while one is in flight.
pub async fn run<W: Write>(app: &mut App<ConsoleSurface<W>>, refresh_every: Duration) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let outcome = app.handle(Command::Fetch).await;
    report(app, outcome);
    let mut next_refresh = Instant::now() + refresh_every;
    app.surface_mut().prompt();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line.context("failed to read from stdin")? {
                    Some(line) => line,
                    None => {
                        info!("input closed, exiting");
                        break;
                    }
                };
                match parse_line(&line) {
                    Ok(ConsoleInput::Quit) => break,
                    Ok(ConsoleInput::Help) => app.surface_mut().show_help(),
                    Ok(ConsoleInput::Empty) => {}
                    Ok(ConsoleInput::Command(command)) => {
                        let outcome = app.handle(command).await;
                        report(app, outcome);
                    }
                    Err(message) => app.surface_mut().notify("Error", &message),
                }
            }
            _ = tokio::time::sleep_until(next_refresh) => {
                info!("auto refresh");
                let outcome = app.handle(Command::Fetch).await;
                report(app, outcome);
                next_refresh = Instant::now() + refresh_every;
            }
        }
        app.surface_mut().prompt();
    }

    info!("techpulse: event loop finished");
    Ok(())
}

/// Surface what a command did; errors are logged and the previous state is kept.
fn report<W: Write>(app: &mut App<ConsoleSurface<W>>, outcome: Result<CommandOutcome>) {
    let surface = app.surface_mut();
    match outcome {
        Ok(CommandOutcome::Fetched(count)) => {
            surface.notify("Fetched", &format!("{} headlines", count));
        }
        Ok(CommandOutcome::FiltersUpdated) => surface.notify("Filters", "updated; run 'fetch' to reload"),
        Ok(CommandOutcome::Selected(row)) => surface.notify("Selected", &format!("row {}", row)),
        Ok(CommandOutcome::NoSuchRow(row)) => surface.notify("Error", &format!("no row {}", row)),
        Ok(CommandOutcome::NoSelection) => {}
        Ok(CommandOutcome::Opened(url)) => surface.notify("Opened", &url),
        Ok(CommandOutcome::Bookmarked(_)) => {}
        Ok(CommandOutcome::Bookmarks(bookmarks)) => {
            let lines: Vec<String> = bookmarks
                .iter()
                .map(|b| format!("{}  <{}>", b.title, b.url))
                .collect();
            surface.show_bookmarks(&lines);
        }
        Ok(CommandOutcome::ThemeChanged { dark, .. }) => {
            surface.notify("Theme", if dark { "dark" } else { "light" });
        }
        Err(e) => {
            error!("command failed: {:#}", e);
            surface.notify("Error", &format!("{:#}", e));
        }
    }
}

fn ansi_bg(color: &str) -> String {
    match rgb(color) {
        Some((r, g, b)) => format!("\x1b[48;2;{};{};{}m", r, g, b),
        None => {
            warn!(%color, "unknown background color");
            String::new()
        }
    }
}

fn ansi_fg(color: &str) -> String {
    match rgb(color) {
        Some((r, g, b)) => format!("\x1b[38;2;{};{};{}m", r, g, b),
        None => {
            warn!(%color, "unknown foreground color");
            String::new()
        }
    }
}

/// `#rrggbb` or one of the two named colors the palettes use.
fn rgb(color: &str) -> Option<(u8, u8, u8)> {
    match color {
        "white" => Some((255, 255, 255)),
        "black" => Some((0, 0, 0)),
        hex if hex.len() == 7 && hex.is_ascii() && hex.starts_with('#') => {
            let r = u8::from_str_radix(&hex[1..3], 16).ok()?;
            let g = u8::from_str_radix(&hex[3..5], 16).ok()?;
            let b = u8::from_str_radix(&hex[5..7], 16).ok()?;
            Some((r, g, b))
        }
        _ => None,
    }
}
