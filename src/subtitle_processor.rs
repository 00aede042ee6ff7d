use std::fmt;

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

// @module: SRT parsing and composition

// @const: SRT timing line, tolerating `.` as millisecond separator and
// trailing position hints
static TIMESTAMP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+):(\d{2}):(\d{2})[,.](\d{3})\s*-->\s*(\d+):(\d{2}):(\d{2})[,.](\d{3})").unwrap()
});

// @struct: Single subtitle entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleEntry {
    // @field: Sequence number as written in the source
    pub seq_num: usize,

    // @field: Start time in ms
    pub start_time_ms: u64,

    // @field: End time in ms
    pub end_time_ms: u64,

    // @field: Subtitle text, lines joined with '\n'
    pub text: String,

    // @field: Timing line as written in the source, position hints included
    pub timing_line: Option<String>,
}

impl SubtitleEntry {
    pub fn new(seq_num: usize, start_time_ms: u64, end_time_ms: u64, text: String) -> Self {
        SubtitleEntry {
            seq_num,
            start_time_ms,
            end_time_ms,
            text,
            timing_line: None,
        }
    }

    /// Keep `timing_line` verbatim on compose while it still matches the times
    pub fn with_timing_line(mut self, timing_line: impl Into<String>) -> Self {
        self.timing_line = Some(timing_line.into());
        self
    }

    /// Convert start time to formatted SRT timestamp
    pub fn format_start_time(&self) -> String {
        Self::format_timestamp(self.start_time_ms)
    }

    /// Convert end time to formatted SRT timestamp
    pub fn format_end_time(&self) -> String {
        Self::format_timestamp(self.end_time_ms)
    }

    /// Format a timestamp in milliseconds to SRT format (HH:MM:SS,mmm)
    pub fn format_timestamp(ms: u64) -> String {
        let hours = ms / 3_600_000;
        let minutes = (ms % 3_600_000) / 60_000;
        let seconds = (ms % 60_000) / 1_000;
        let millis = ms % 1_000;

        format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
    }

    fn parse_timing(line: &str) -> Option<(u64, u64)> {
        let caps = TIMESTAMP_REGEX.captures(line)?;
        let field = |idx: usize| -> Option<u64> { caps.get(idx)?.as_str().parse().ok() };
        let to_ms = |start: usize| -> Option<u64> {
            Some(
                field(start)? * 3_600_000
                    + field(start + 1)? * 60_000
                    + field(start + 2)? * 1_000
                    + field(start + 3)?,
            )
        };
        Some((to_ms(1)?, to_ms(5)?))
    }
}

impl fmt::Display for SubtitleEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.seq_num)?;
        match self.timing_line.as_deref() {
            Some(raw) if Self::parse_timing(raw) == Some((self.start_time_ms, self.end_time_ms)) => {
                writeln!(f, "{}", raw)?
            }
            _ => writeln!(f, "{} --> {}", self.format_start_time(), self.format_end_time())?,
        }
        writeln!(f, "{}", self.text)?;
        writeln!(f)
    }
}

/// Ordered subtitle entries of one SRT document
///
/// Parsing keeps entries in document order with their original numbering and
/// timing, so `compose` after `parse` reproduces the document structure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubtitleCollection {
    /// List of subtitle entries
    pub entries: Vec<SubtitleEntry>,
}

impl SubtitleCollection {
    pub fn new(entries: Vec<SubtitleEntry>) -> Self {
        SubtitleCollection { entries }
    }

    /// Parse SRT content. Malformed blocks are skipped with a warning; a
    /// document without any valid block yields an empty collection.
    pub fn parse(content: &str) -> Self {
        let content = content.trim_start_matches('\u{feff}');
        let mut entries = Vec::new();

        let mut seq_num: Option<usize> = None;
        let mut timing: Option<(u64, u64, &str)> = None;
        let mut text_lines: Vec<&str> = Vec::new();

        let mut flush = |seq_num: &mut Option<usize>,
                         timing: &mut Option<(u64, u64, &str)>,
                         text_lines: &mut Vec<&str>| {
            if let (Some(seq), Some((start, end, raw))) = (*seq_num, *timing) {
                entries.push(
                    SubtitleEntry::new(seq, start, end, text_lines.join("\n")).with_timing_line(raw),
                );
            } else if seq_num.is_some() || !text_lines.is_empty() {
                warn!("Skipping incomplete subtitle block (sequence {:?})", seq_num);
            }
            *seq_num = None;
            *timing = None;
            text_lines.clear();
        };

        for (line_no, raw) in content.lines().enumerate() {
            let line = raw.trim_end();

            if line.trim().is_empty() {
                if timing.is_some() || seq_num.is_some() {
                    flush(&mut seq_num, &mut timing, &mut text_lines);
                }
                continue;
            }

            if timing.is_some() {
                text_lines.push(line);
                continue;
            }

            if seq_num.is_none() {
                match line.trim().parse::<usize>() {
                    Ok(num) => seq_num = Some(num),
                    Err(_) => debug!("Ignoring stray line {}: {}", line_no + 1, line),
                }
                continue;
            }

            match SubtitleEntry::parse_timing(line.trim()) {
                Some((start, end)) => timing = Some((start, end, line.trim())),
                None => {
                    warn!("Expected timing at line {}, found: {}", line_no + 1, line);
                    seq_num = None;
                }
            }
        }
        flush(&mut seq_num, &mut timing, &mut text_lines);

        SubtitleCollection { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compose the entries back into SRT text
    pub fn compose(&self) -> String {
        self.entries.iter().map(|entry| entry.to_string()).collect()
    }
}

impl fmt::Display for SubtitleCollection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.compose())
    }
}
