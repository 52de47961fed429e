//! Console presentation
//!
//! Banners for the session lifecycle plus inline highlights. With ANSI
//! disabled every helper produces the same text without escape codes.

use colored::{ColoredString, Colorize};
use std::io::Write;

/// Horizontal ellipsis, for "working…" style lines
pub const HELLIP: char = '…';

/// Kinds of console highlighting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Highlight {
    Url,
    Start,
    Section,
    Complete,
    Error,
    Summary,
    Info,
}

impl Highlight {
    fn marker(&self) -> &'static str {
        match self {
            Self::Url | Self::Info => "",
            Self::Start => "🏁",
            Self::Section => "🟣",
            Self::Complete => "🎉",
            Self::Error => "❌",
            Self::Summary => "📊",
        }
    }

    fn paint(&self, text: &str) -> ColoredString {
        match self {
            Self::Url => text.blue().underline(),
            Self::Start => text.bright_blue().bold(),
            Self::Section => text.magenta().bold(),
            Self::Complete => text.green().bold(),
            Self::Error => text.red().bold(),
            Self::Summary => text.cyan().bold(),
            Self::Info => text.dimmed(),
        }
    }
}

/// Text styling that honours the `ansiDisabled` setting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Style {
    ansi: bool,
}

impl Style {
    pub fn new(ansi: bool) -> Self {
        Self { ansi }
    }

    pub fn plain() -> Self {
        Self::new(false)
    }

    /// Style `text` as `kind`
    pub fn apply(&self, kind: Highlight, text: &str) -> String {
        if self.ansi {
            kind.paint(text).to_string()
        } else {
            text.to_string()
        }
    }

    /// Marker and styled message for a lifecycle banner
    pub fn banner(&self, kind: Highlight, message: &str) -> String {
        let marker = kind.marker();
        let text = self.apply(kind, message);
        if marker.is_empty() {
            text
        } else {
            format!("{} {}", marker, text)
        }
    }
}

/// Operator console: a [`Style`] and where lines are written
pub struct Console {
    style: Style,
    out: Box<dyn Write + Send>,
}

impl Console {
    /// Console writing to stdout
    pub fn stdout(style: Style) -> Self {
        Self::with_writer(style, Box::new(std::io::stdout()))
    }

    pub fn with_writer(style: Style, out: Box<dyn Write + Send>) -> Self {
        Self { style, out }
    }

    pub fn style(&self) -> Style {
        self.style
    }

    /// Write one line; console write failures are not worth failing a script over
    pub fn line(&mut self, text: &str) {
        let _ = writeln!(self.out, "{}", text);
        let _ = self.out.flush();
    }

    pub fn blank(&mut self) {
        self.line("");
    }

    pub fn banner(&mut self, kind: Highlight, message: &str) {
        let text = self.style.banner(kind, message);
        match kind {
            Highlight::Start | Highlight::Section | Highlight::Summary => {
                self.blank();
                self.line(&text);
            }
            Highlight::Complete | Highlight::Error => {
                self.line(&text);
                self.blank();
            }
            Highlight::Url | Highlight::Info => self.line(&text),
        }
    }
}
