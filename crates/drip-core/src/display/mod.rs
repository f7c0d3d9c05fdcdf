//! Presentation surface for a streaming answer.
//!
//! The session only talks to [`Display`]: it hands over the cumulative
//! markdown text, never a diff, and signals completion once.
//! [`TerminalDisplay`] renders that onto a terminal.

pub mod testing;

use std::io::Write;

use crate::style::{visible_width, Style};

/// How the finished answer should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStyle {
    /// A normal answer.
    Normal,
    /// Low-emphasis notice (empty result).
    Notice,
    /// The text is an error notice.
    Error,
}

/// The surface a session renders into.
pub trait Display {
    /// Show the header and a waiting indicator before any text arrives.
    fn show_placeholder(&mut self, header: &str);

    /// Replace the shown text with `markdown`. Repeating the same text must
    /// not change what is shown.
    fn update_streaming_content(&mut self, markdown: &str);

    /// The stream is over; enable whatever comes after it.
    fn signal_stream_complete(&mut self, style: CompletionStyle);

    /// False once the viewer has gone away.
    fn is_active(&self) -> bool;

    /// Approximate scroll position, 0.0 top to 1.0 bottom.
    fn scroll_ratio(&self) -> f32;

    fn set_scroll_ratio(&mut self, ratio: f32);
}

const PLACEHOLDER: &str = "…";

/// Terminal rendering.
///
/// On a TTY, text that extends what is already shown is written as a
/// suffix; anything else erases the previous output and redraws it. A
/// terminal always follows its output, so the scroll ratio stays pinned
/// unless the caller moves it. Off a TTY nothing can be redrawn, so only
/// the final text is written.
pub struct TerminalDisplay<W: Write> {
    writer: W,
    style: Style,
    is_tty: bool,
    term_width: u16,
    /// Exactly what is on screen since the last redraw.
    shown: String,
    /// Latest text, for non-TTY output.
    latest: String,
    active: bool,
    scroll_ratio: f32,
}

impl<W: Write> TerminalDisplay<W> {
    pub fn new(writer: W, style: Style, is_tty: bool) -> Self {
        let term_width = if is_tty {
            crossterm::terminal::size().map(|(w, _)| w).unwrap_or(80)
        } else {
            80
        };
        Self::new_with_width(writer, style, is_tty, term_width)
    }

    pub fn new_with_width(writer: W, style: Style, is_tty: bool, width: u16) -> Self {
        Self {
            writer,
            style,
            is_tty,
            term_width: width.max(1),
            shown: String::new(),
            latest: String::new(),
            active: false,
            scroll_ratio: 1.0,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Print a one-line dim notice below the answer (e.g. "cancelled").
    pub fn emit_notice(&mut self, text: &str) {
        self.finish_line();
        let _ = writeln!(
            self.writer,
            "{}{}{}",
            self.style.dim_start(),
            text,
            self.style.reset()
        );
        let _ = self.writer.flush();
    }

    fn draw(&mut self, text: &str) {
        if let Some(suffix) = text.strip_prefix(self.shown.as_str()) {
            let _ = write!(self.writer, "{suffix}");
        } else {
            self.erase();
            let _ = write!(self.writer, "{text}");
        }
        self.shown.clear();
        self.shown.push_str(text);
        let _ = self.writer.flush();
    }

    fn erase(&mut self) {
        let rows = rows_above_cursor(&self.shown, self.term_width);
        if rows > 0 {
            // Cursor to column 0, `rows` lines up.
            let _ = write!(self.writer, "\x1b[{rows}F");
        } else {
            let _ = write!(self.writer, "\r");
        }
        let _ = write!(self.writer, "\x1b[J");
    }

    fn finish_line(&mut self) {
        if !self.shown.is_empty() && !self.shown.ends_with('\n') {
            let _ = writeln!(self.writer);
            self.shown.push('\n');
        }
    }
}

impl<W: Write> Display for TerminalDisplay<W> {
    fn show_placeholder(&mut self, header: &str) {
        self.active = true;
        if !self.is_tty {
            return;
        }
        let placeholder = crate::compose::with_header(header, PLACEHOLDER);
        let _ = write!(
            self.writer,
            "{}{}{}",
            self.style.dim_start(),
            placeholder,
            self.style.reset()
        );
        self.shown = placeholder;
        let _ = self.writer.flush();
    }

    fn update_streaming_content(&mut self, markdown: &str) {
        if self.is_tty {
            if markdown != self.shown {
                self.draw(markdown);
            }
        } else {
            self.latest.clear();
            self.latest.push_str(markdown);
        }
    }

    fn signal_stream_complete(&mut self, style: CompletionStyle) {
        if !self.is_tty {
            let _ = write!(self.writer, "{}", self.latest);
            self.shown = std::mem::take(&mut self.latest);
        }
        self.finish_line();
        if style == CompletionStyle::Error {
            let _ = writeln!(
                self.writer,
                "{}[drip] stream failed{}",
                self.style.red_start(),
                self.style.reset()
            );
        }
        let _ = self.writer.flush();
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn scroll_ratio(&self) -> f32 {
        self.scroll_ratio
    }

    fn set_scroll_ratio(&mut self, ratio: f32) {
        self.scroll_ratio = ratio.clamp(0.0, 1.0);
    }
}

/// How many rows the cursor sits below the first row of `text` once it
/// has been written at column 0 of a terminal `width` columns wide.
fn rows_above_cursor(text: &str, width: u16) -> u16 {
    let width = usize::from(width.max(1));
    let mut rows = 0usize;
    let mut segments = text.split('\n').peekable();
    while let Some(segment) = segments.next() {
        let wraps = visible_width(segment).saturating_sub(1) / width;
        rows += wraps;
        if segments.peek().is_some() {
            rows += 1;
        }
    }
    u16::try_from(rows).unwrap_or(u16::MAX)
}
