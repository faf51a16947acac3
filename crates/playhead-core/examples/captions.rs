//! Subtitle parsing example
//!
//! Parses an SRT payload and walks a simulated playback clock over it.
//!
//! Run with: cargo run -p playhead-core --example captions

use playhead_core::captions::{format_timestamp, srt_to_vtt, TimedTextParser};
use playhead_core::cursor::SubtitleCursor;

fn main() {
    println!("Playhead Core - Subtitle Parsing Example");
    println!("========================================\n");

    let srt = "1
00:00:01,000 --> 00:00:03,000
Welcome back.

2
00:00:03,500 --> 00:00:06,000
<i>Previously...</i>

7
00:00:08,000 --> 00:00:10,500
Records may skip numbers
and span lines.
";

    let chunks = TimedTextParser::parse(srt);
    println!("Found {} chunks:\n", chunks.len());
    for chunk in &chunks {
        println!(
            "#{:<3} {} --> {}  {:?}",
            chunk.sequence_index,
            format_timestamp(chunk.start_ms),
            format_timestamp(chunk.end_ms),
            TimedTextParser::strip_tags(&chunk.text)
        );
    }

    println!("\nPlayback:");
    let mut cursor = SubtitleCursor::new(chunks);
    for t in (0..=11_000).step_by(500) {
        if cursor.seek(t) {
            match cursor.active_text() {
                Some(text) => println!("  {:>6}ms  show {:?}", t, text),
                None => println!("  {:>6}ms  hide", t),
            }
        }
    }

    println!("\nAs WebVTT:\n{}", srt_to_vtt(srt));
}
