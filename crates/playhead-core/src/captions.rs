//! Timed text parsing - SubRip records into [`TimedChunk`]s
//!
//! The parser is total: it never fails. Records whose header cannot be
//! recognised are skipped, and timestamp components that do not parse as
//! numbers count as zero. A record's text ends at the first blank line;
//! anything after it up to the next recognised header is dropped.
//!
//! # Example
//!
//! ```rust
//! use playhead_core::captions::TimedTextParser;
//!
//! let srt = "1\n00:00:01,000 --> 00:00:04,000\nHello, world!\n\n\
//!            2\n00:00:05,000 --> 00:00:08,000\nThis is a subtitle.\n";
//!
//! let chunks = TimedTextParser::parse(srt);
//! assert_eq!(chunks.len(), 2);
//! assert_eq!(chunks[0].start_ms, 1000);
//! assert_eq!(chunks[1].text, "This is a subtitle.");
//! ```

use crate::types::TimedChunk;
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

/// Record header: index line followed by a `start --> end` timing line
fn record_header() -> &'static Regex {
    static HEADER: OnceLock<Regex> = OnceLock::new();
    HEADER.get_or_init(|| {
        Regex::new(
            r"(?m)^[ \t]*(\d+)[ \t]*\n(\d{2}:\d{2}:\d{2},\d{3})[ \t]*-->[ \t]*(\d{2}:\d{2}:\d{2},\d{3})[^\n]*$",
        )
        .expect("record header pattern is valid")
    })
}

/// Blank line terminating a record's text
fn blank_line() -> &'static Regex {
    static BLANK: OnceLock<Regex> = OnceLock::new();
    BLANK.get_or_init(|| Regex::new(r"\n[ \t]*\n").expect("blank line pattern is valid"))
}

/// SubRip parser producing chunks in source order
pub struct TimedTextParser;

impl TimedTextParser {
    /// Parse a payload into timed chunks.
    ///
    /// Chunks are emitted in source order and are not re-sorted, so
    /// consumers must not assume ascending start times for malformed input.
    pub fn parse(payload: &str) -> Vec<TimedChunk> {
        let normalized = normalize(payload);
        let headers: Vec<_> = record_header().captures_iter(&normalized).collect();

        let mut chunks = Vec::with_capacity(headers.len());
        for (i, caps) in headers.iter().enumerate() {
            let (Some(whole), Some(index), Some(start), Some(end)) =
                (caps.get(0), caps.get(1), caps.get(2), caps.get(3))
            else {
                continue;
            };

            let body_end = headers
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map(|m| m.start())
                .unwrap_or(normalized.len());
            let body = &normalized[whole.end()..body_end];
            let text = blank_line().split(body).next().unwrap_or_default().trim();

            chunks.push(TimedChunk {
                sequence_index: index.as_str().parse().unwrap_or(0),
                start_ms: timestamp_to_ms(start.as_str()),
                end_ms: timestamp_to_ms(end.as_str()),
                text: text.to_string(),
            });
        }

        debug!(chunks = chunks.len(), bytes = payload.len(), "Parsed timed text");
        chunks
    }

    /// Strip inline markup (`<i>`, `<b>`, `<font color=..>`) from chunk text
    pub fn strip_tags(text: &str) -> String {
        let mut result = String::with_capacity(text.len());
        let mut in_tag = false;

        for ch in text.chars() {
            match ch {
                '<' => in_tag = true,
                '>' => in_tag = false,
                _ if !in_tag => result.push(ch),
                _ => {}
            }
        }

        result
    }
}

/// Unify line endings and drop a leading byte order mark
fn normalize(payload: &str) -> String {
    payload
        .trim_start_matches('\u{feff}')
        .replace("\r\n", "\n")
        .replace('\r', "\n")
}

/// Convert `HH:MM:SS,mmm` to milliseconds.
///
/// Each component that fails to parse contributes zero, so `"bad"` yields 0.
/// Values too large for `u64` saturate at `u64::MAX`.
pub fn timestamp_to_ms(ts: &str) -> u64 {
    let mut parts = ts.trim().splitn(3, ':');
    let hours = component(parts.next());
    let minutes = component(parts.next());
    let (seconds, millis) = match parts.next() {
        Some(rest) => match rest.split_once(',') {
            Some((s, ms)) => (component(Some(s)), component(Some(ms))),
            None => (component(Some(rest)), 0),
        },
        None => (0, 0),
    };

    hours
        .saturating_mul(3_600_000)
        .saturating_add(minutes.saturating_mul(60_000))
        .saturating_add(seconds.saturating_mul(1_000))
        .saturating_add(millis)
}

fn component(part: Option<&str>) -> u64 {
    part.and_then(|p| p.trim().parse().ok()).unwrap_or(0)
}

/// Render milliseconds as `HH:MM:SS,mmm`
pub fn format_timestamp(ms: u64) -> String {
    format!(
        "{:02}:{:02}:{:02},{:03}",
        ms / 3_600_000,
        (ms / 60_000) % 60,
        (ms / 1_000) % 60,
        ms % 1_000
    )
}

/// Convert a SubRip payload to WebVTT for native text tracks
pub fn srt_to_vtt(srt: &str) -> String {
    let mut vtt = String::from("WEBVTT\n\n");

    for line in normalize(srt).lines() {
        if line.contains("-->") {
            vtt.push_str(&line.replace(',', "."));
        } else {
            vtt.push_str(line);
        }
        vtt.push('\n');
    }

    vtt
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "1\n00:00:01,000 --> 00:00:04,000\nHello, world!\n\n\
                          2\n00:00:05,000 --> 00:00:08,000\nThis is\na subtitle.\n";

    #[test]
    fn test_parse_srt() {
        let chunks = TimedTextParser::parse(SAMPLE);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], TimedChunk::new(1, 1000, 4000, "Hello, world!"));
        assert_eq!(chunks[1].text, "This is\na subtitle.");
    }

    #[test]
    fn test_parse_is_idempotent() {
        assert_eq!(TimedTextParser::parse(SAMPLE), TimedTextParser::parse(SAMPLE));
    }

    #[test]
    fn test_crlf_payload() {
        let crlf = SAMPLE.replace('\n', "\r\n");
        assert_eq!(TimedTextParser::parse(&crlf), TimedTextParser::parse(SAMPLE));
    }

    #[test]
    fn test_bom_is_ignored() {
        let with_bom = format!("\u{feff}{}", SAMPLE);
        assert_eq!(TimedTextParser::parse(&with_bom).len(), 2);
    }

    #[test]
    fn test_timestamp_to_ms() {
        assert_eq!(timestamp_to_ms("00:01:02,345"), 62_345);
        assert_eq!(timestamp_to_ms("01:00:00,000"), 3_600_000);
        assert_eq!(timestamp_to_ms("bad"), 0);
        assert_eq!(timestamp_to_ms("00:xx:05,500"), 5_500);
    }

    #[test]
    fn test_timestamp_overflow_saturates() {
        assert_eq!(timestamp_to_ms("99999999999999:00:00,000"), u64::MAX);
        assert_eq!(timestamp_to_ms("00:00:18446744073709551,999"), u64::MAX);
        // Components beyond u64 do not parse and count as zero
        assert_eq!(timestamp_to_ms("99999999999999999999999:00:01,000"), 1_000);
    }

    #[test]
    fn test_malformed_records_are_skipped() {
        let payload = "garbage before\n\n\
                       1\n00:00:01,000 -> 00:00:02,000\nbroken arrow\n\n\
                       2\n00:00:03,000 --> 00:00:04,000\nkept\n\n\
                       3\n0:00:05,000 --> 00:00:06,000\nshort hours\n";
        let chunks = TimedTextParser::parse(payload);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].sequence_index, 2);
        assert_eq!(chunks[0].text, "kept");
    }

    #[test]
    fn test_text_ends_at_blank_line() {
        let payload = "1\n00:00:01,000 --> 00:00:02,000\nkept\n\n\
                       2\n0:00:05,000 --> 00:00:06,000\nmalformed\n\n\
                       3\n00:00:07,000 --> 00:00:08,000\n\n\
                       4\n00:00:09,000 --> 00:00:10,000\nline one\nline two\n \ntrailing junk\n";
        let chunks = TimedTextParser::parse(payload);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text, "kept");
        assert_eq!(chunks[1].text, "");
        assert_eq!(chunks[2].text, "line one\nline two");
    }

    #[test]
    fn test_source_order_is_preserved() {
        let payload = "7\n00:00:09,000 --> 00:00:10,000\nlate\n\n\
                       3\n00:00:01,000 --> 00:00:02,000\nearly\n";
        let chunks = TimedTextParser::parse(payload);
        assert_eq!(chunks[0].text, "late");
        assert_eq!(chunks[1].sequence_index, 3);
    }

    #[test]
    fn test_empty_payload() {
        assert!(TimedTextParser::parse("").is_empty());
        assert!(TimedTextParser::parse("\n\n  \n").is_empty());
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(62_345), "00:01:02,345");
        assert_eq!(format_timestamp(3_600_000), "01:00:00,000");
    }

    #[test]
    fn test_strip_tags() {
        let text = "<i>Hello</i>, <font color=\"#fff\">world</font>!";
        assert_eq!(TimedTextParser::strip_tags(text), "Hello, world!");
    }

    #[test]
    fn test_srt_to_vtt() {
        let vtt = srt_to_vtt("1\r\n00:00:00,000 --> 00:00:04,000\r\nHello, there!");
        assert!(vtt.starts_with("WEBVTT"));
        assert!(vtt.contains("00:00:00.000 --> 00:00:04.000"));
        assert!(vtt.contains("Hello, there!"));
    }
}
