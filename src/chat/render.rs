//! Output rendering for the chat application.
//!
//! The streamed reply is shown as a two-column grid: the `Clix >` label on the left
//! and the markdown-formatted reply on the right. Each redraw moves the cursor back
//! over the previous draw and repaints it, so the reply grows in place.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossterm::cursor::MoveToPreviousLine;
use crossterm::queue;
use crossterm::terminal::{self, Clear, ClearType};
use futures::StreamExt;
use tokio::time::MissedTickBehavior;

use crate::chat::markdown::{markdown_lines, paint, wrap_line};
use crate::client::FragmentStream;
use crate::error::{Error, Result};
use crate::observability::{RENDER_REDRAWS, RENDER_TTFF};

/// Label shown in the first column of the reply grid.
pub const LABEL: &str = "Clix >";

/// Default minimum time between two redraws (10 per second).
pub const REDRAW_INTERVAL: Duration = Duration::from_millis(100);

/// Terminal size used when the real size cannot be determined.
const FALLBACK_SIZE: (u16, u16) = (80, 24);

const ANSI_BOLD: &str = "\x1b[1m";
const ANSI_RED: &str = "\x1b[31m";
const ANSI_GREEN: &str = "\x1b[32m";
const ANSI_YELLOW: &str = "\x1b[33m";
const ANSI_BLUE: &str = "\x1b[34m";
const ANSI_RESET: &str = "\x1b[0m";

/// Color of a one-line notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    /// Neutral status, e.g. the greeting.
    Info,
    /// Something was kept or restored.
    Success,
    /// Something will be lost.
    Warning,
    /// Something was removed.
    Danger,
    /// Secondary detail.
    Muted,
}

impl Tone {
    fn ansi(&self) -> &'static str {
        match self {
            Tone::Info => "\x1b[1;36m",
            Tone::Success => "\x1b[1;32m",
            Tone::Warning => ANSI_YELLOW,
            Tone::Danger => "\x1b[1;31m",
            Tone::Muted => "\x1b[2;32m",
        }
    }
}

/// Trait for rendering chat output.
pub trait Renderer: Send {
    /// Shows the empty reply grid before the first fragment arrives.
    fn start_response(&mut self) -> io::Result<()>;

    /// Repaints the in-progress reply in place.
    fn update_response(&mut self, text: &str) -> io::Result<()>;

    /// Paints the complete reply and moves below it.
    fn finish_response(&mut self, text: &str) -> io::Result<()>;

    /// Leaves whatever was drawn on screen and moves below it.
    fn abandon_response(&mut self) -> io::Result<()>;

    /// Print a one-line notice.
    fn print_notice(&mut self, tone: Tone, notice: &str);

    /// Print an error message.
    fn print_error(&mut self, error: &str);
}

/// Renderer that repaints the reply in place on a terminal.
pub struct LiveRenderer<W: Write + Send> {
    out: W,
    use_color: bool,
    size: Option<(u16, u16)>,
    drawn_rows: usize,
    redraws: usize,
}

impl LiveRenderer<io::Stdout> {
    /// Creates a renderer on stdout.
    pub fn stdout(use_color: bool) -> Self {
        Self::new(io::stdout(), use_color)
    }
}

impl<W: Write + Send> LiveRenderer<W> {
    /// Creates a renderer writing to `out`, sized from the controlling terminal.
    pub fn new(out: W, use_color: bool) -> Self {
        Self {
            out,
            use_color,
            size: None,
            drawn_rows: 0,
            redraws: 0,
        }
    }

    /// Uses a fixed `(columns, rows)` size instead of querying the terminal.
    pub fn with_size(mut self, columns: u16, rows: u16) -> Self {
        self.size = Some((columns, rows));
        self
    }

    /// Number of in-place redraws performed so far.
    pub fn redraws(&self) -> usize {
        self.redraws
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn dimensions(&self) -> (usize, usize) {
        let (columns, rows) = self
            .size
            .unwrap_or_else(|| terminal::size().unwrap_or(FALLBACK_SIZE));
        (columns.max(1) as usize, rows.max(2) as usize)
    }

    /// Lays out `text` as grid rows, each already painted.
    fn layout(&self, text: &str) -> Vec<String> {
        let (columns, _) = self.dimensions();
        let label_width = LABEL.chars().count() + 1;
        // One spare column keeps the cursor from wrapping at the right edge.
        let content_width = columns.saturating_sub(label_width + 1).max(1);

        let label = if self.use_color {
            format!("{ANSI_BOLD}{ANSI_BLUE}{LABEL}{ANSI_RESET} ")
        } else {
            format!("{LABEL} ")
        };
        let gutter = " ".repeat(label_width);

        let mut rows = Vec::new();
        for line in markdown_lines(text) {
            for row in wrap_line(&line, content_width) {
                let prefix = if rows.is_empty() { &label } else { &gutter };
                rows.push(format!("{prefix}{}", paint(&row, self.use_color)));
            }
        }
        if rows.is_empty() {
            rows.push(label);
        }
        rows
    }

    fn clear_previous(&mut self) -> io::Result<()> {
        if self.drawn_rows > 0 {
            let up = u16::try_from(self.drawn_rows).unwrap_or(u16::MAX);
            queue!(
                self.out,
                MoveToPreviousLine(up),
                Clear(ClearType::FromCursorDown)
            )?;
        }
        self.drawn_rows = 0;
        Ok(())
    }

    fn write_rows(&mut self, rows: &[String]) -> io::Result<()> {
        for row in rows {
            write!(self.out, "{row}\r\n")?;
        }
        Ok(())
    }
}

impl<W: Write + Send> Renderer for LiveRenderer<W> {
    fn start_response(&mut self) -> io::Result<()> {
        self.drawn_rows = 0;
        self.update_response("")
    }

    fn update_response(&mut self, text: &str) -> io::Result<()> {
        let (_, height) = self.dimensions();
        let rows = self.layout(text);
        // Rows scrolled off the top can no longer be reached, so only the tail that
        // fits on screen is drawn while the reply is still growing.
        let visible = &rows[rows.len().saturating_sub(height - 1)..];
        self.clear_previous()?;
        self.write_rows(visible)?;
        self.drawn_rows = visible.len();
        self.redraws += 1;
        RENDER_REDRAWS.click();
        self.out.flush()
    }

    fn finish_response(&mut self, text: &str) -> io::Result<()> {
        let rows = self.layout(text);
        self.clear_previous()?;
        self.write_rows(&rows)?;
        write!(self.out, "\r\n")?;
        self.out.flush()
    }

    fn abandon_response(&mut self) -> io::Result<()> {
        self.drawn_rows = 0;
        write!(self.out, "\r\n")?;
        self.out.flush()
    }

    fn print_notice(&mut self, tone: Tone, notice: &str) {
        let _ = if self.use_color {
            writeln!(self.out, "{}{notice}{ANSI_RESET}", tone.ansi())
        } else {
            writeln!(self.out, "{notice}")
        };
        let _ = self.out.flush();
    }

    fn print_error(&mut self, error: &str) {
        let _ = if self.use_color {
            writeln!(self.out, "{ANSI_BOLD}{ANSI_RED}Error:{ANSI_RESET} {error}")
        } else {
            writeln!(self.out, "Error: {error}")
        };
        let _ = self.out.flush();
    }
}

/// Drives a fragment stream through a renderer and returns the full reply.
///
/// Fragments are accumulated as they arrive; the view is repainted at most once per
/// `interval`, so bursts of fragments are coalesced into the next repaint. A final
/// repaint always shows the complete text. When `interrupted` is observed the turn
/// ends with [`Error::Abort`].
pub async fn render_stream(
    mut fragments: FragmentStream,
    renderer: &mut dyn Renderer,
    interrupted: &AtomicBool,
    interval: Duration,
) -> Result<String> {
    let mut text = String::new();
    let mut dirty = false;
    let start = Instant::now();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    renderer.start_response()?;
    loop {
        tokio::select! {
            fragment = fragments.next() => match fragment {
                Some(Ok(fragment)) => {
                    if text.is_empty() {
                        RENDER_TTFF.add(start.elapsed().as_secs_f64());
                    }
                    text.push_str(&fragment);
                    dirty = true;
                }
                Some(Err(err)) => {
                    renderer.abandon_response()?;
                    return Err(err);
                }
                None => break,
            },
            _ = ticker.tick() => {
                if interrupted.load(Ordering::Relaxed) {
                    renderer.abandon_response()?;
                    return Err(Error::abort("interrupted by user"));
                }
                if dirty {
                    renderer.update_response(&text)?;
                    dirty = false;
                }
            }
        }
    }
    if interrupted.load(Ordering::Relaxed) {
        renderer.abandon_response()?;
        return Err(Error::abort("interrupted by user"));
    }
    renderer.finish_response(&text)?;
    Ok(text)
}

/// Formats the input prompt.
pub fn prompt(use_color: bool) -> String {
    if use_color {
        format!("{ANSI_BOLD}{ANSI_GREEN}You >{ANSI_RESET} ")
    } else {
        "You > ".to_string()
    }
}
