//! Per-environment output.
//!
//! Every worker writes through its own [`OutputSink`]. [`LabeledSink`]
//! prefixes each line with a colored environment label and writes whole
//! lines under the stdout lock, so parallel environments interleave by line
//! and never mid-line.

use colored::{Color, Colorize};
use std::io::Write;
#[cfg(test)]
use std::sync::{Arc, Mutex, PoisonError};

/// Destination for the output of one environment.
pub trait OutputSink: Send {
    /// Write one message; embedded newlines produce several lines.
    fn line(&mut self, message: &str);
}

const PALETTE: [Color; 6] = [
    Color::Cyan,
    Color::Magenta,
    Color::Yellow,
    Color::Blue,
    Color::Green,
    Color::BrightRed,
];

/// Stdout sink with a colored `[ label ]` prefix.
pub struct LabeledSink {
    prefix: String,
}

impl LabeledSink {
    /// `slot` picks the label color, cycling through a fixed palette.
    pub fn new(label: &str, slot: usize) -> Self {
        let color = PALETTE[slot % PALETTE.len()];
        Self {
            prefix: format!("[ {} ]", label.color(color).bold()),
        }
    }
}

impl OutputSink for LabeledSink {
    fn line(&mut self, message: &str) {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        for line in split_lines(message) {
            // A closed stdout only loses output.
            let _ = writeln!(out, "{} {line}", self.prefix);
        }
        let _ = out.flush();
    }
}

/// Sink that keeps lines in memory. Clones share the same buffer.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

#[cfg(test)]
impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }
}

#[cfg(test)]
impl OutputSink for MemorySink {
    fn line(&mut self, message: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(split_lines(message).map(str::to_string));
    }
}

fn split_lines(message: &str) -> impl Iterator<Item = &str> {
    let message = message.strip_suffix('\n').unwrap_or(message);
    message.split('\n')
}
