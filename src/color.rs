use crossterm::style::{Color, Stylize};
use parking_lot::Mutex;
use std::fmt;
use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::ConfigError;

/// Colors handed out to tails in rotation.
pub const PALETTE: [Color; 5] = [
    Color::Blue,
    Color::Cyan,
    Color::Yellow,
    Color::Red,
    Color::Magenta,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    /// Color the whole line.
    Line,
    /// Color only the `namespace/pod/container` label.
    Pod,
    Off,
}

impl FromStr for ColorMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "line" | "" => Ok(ColorMode::Line),
            "pod" => Ok(ColorMode::Pod),
            "off" => Ok(ColorMode::Off),
            other => Err(ConfigError::InvalidColorMode(other.to_string())),
        }
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ColorMode::Line => "line",
            ColorMode::Pod => "pod",
            ColorMode::Off => "off",
        };
        f.write_str(s)
    }
}

/// Destination for rendered log lines.
pub trait LineSink: Send + Sync {
    fn write_line(&self, line: &str);
}

pub struct StdoutSink;

impl LineSink for StdoutSink {
    fn write_line(&self, line: &str) {
        let mut out = std::io::stdout().lock();
        // Ignore write errors such as a closed pipe.
        let _ = writeln!(out, "{}", line);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    Plain,
    Line(Color),
    Label(Color),
}

/// Presentation function bound to one tail.
#[derive(Clone)]
pub struct Printer {
    style: Style,
    sink: Arc<dyn LineSink>,
}

impl Printer {
    pub fn render(&self, label: &str, line: &str) -> String {
        match self.style {
            Style::Plain => format!("{} {}", label, line),
            Style::Line(color) => format!("{} {}", label, line).with(color).to_string(),
            Style::Label(color) => format!("{} {}", label.with(color), line),
        }
    }

    pub fn print(&self, label: &str, line: &str) {
        self.sink.write_line(&self.render(label, line));
    }

    #[cfg(test)]
    pub fn color(&self) -> Option<Color> {
        match self.style {
            Style::Plain => None,
            Style::Line(color) | Style::Label(color) => Some(color),
        }
    }
}

/// Round-robin allocator of printers, one per started tail.
pub struct ColorAssigner {
    styles: Vec<Style>,
    cursor: Mutex<usize>,
    sink: Arc<dyn LineSink>,
}

impl ColorAssigner {
    pub fn new(mode: ColorMode, sink: Arc<dyn LineSink>) -> Self {
        let styles = match mode {
            ColorMode::Off => vec![Style::Plain],
            ColorMode::Line => PALETTE.iter().copied().map(Style::Line).collect(),
            ColorMode::Pod => PALETTE.iter().copied().map(Style::Label).collect(),
        };
        Self {
            styles,
            cursor: Mutex::new(0),
            sink,
        }
    }

    /// Hand out the next printer in rotation. Safe to call from many tasks.
    pub fn next_printer(&self) -> Printer {
        let style = {
            let mut cursor = self.cursor.lock();
            let style = self.styles[*cursor];
            *cursor = (*cursor + 1) % self.styles.len();
            style
        };
        Printer {
            style,
            sink: self.sink.clone(),
        }
    }
}
