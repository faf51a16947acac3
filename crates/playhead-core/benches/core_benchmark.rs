//! Benchmark tests for playhead-core operations
//!
//! Run with: cargo bench -p playhead-core

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use playhead_core::captions::{srt_to_vtt, timestamp_to_ms, TimedTextParser};
use playhead_core::cursor::SubtitleCursor;
#[cfg(feature = "hls")]
use playhead_core::manifest::parse_quality_levels;

// ============================================================================
// Helpers
// ============================================================================

/// Generate an SRT payload with N records, 2s each with a 500ms gap
fn generate_srt(record_count: usize) -> String {
    let mut srt = String::new();
    for i in 0..record_count {
        let start = i as u64 * 2500;
        let end = start + 2000;
        srt.push_str(&format!(
            "{}\n{} --> {}\nLine {} of the feature\nsecond line\n\n",
            i + 1,
            playhead_core::captions::format_timestamp(start),
            playhead_core::captions::format_timestamp(end),
            i
        ));
    }
    srt
}

/// Generate an HLS master playlist string with N variants
#[cfg(feature = "hls")]
fn generate_hls_master(variant_count: usize) -> String {
    let mut m3u8 = String::from("#EXTM3U\n");
    let bandwidths = [400_000u64, 800_000, 1_400_000, 2_800_000, 5_000_000, 7_500_000, 15_000_000];
    let resolutions = ["426x240", "640x360", "854x480", "1280x720", "1920x1080", "1920x1080", "3840x2160"];
    let codecs = "avc1.640028,mp4a.40.2";

    for i in 0..variant_count {
        let idx = i % bandwidths.len();
        m3u8.push_str(&format!(
            "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={},CODECS=\"{}\"\n",
            bandwidths[idx], resolutions[idx], codecs
        ));
        m3u8.push_str(&format!("variant_{}/playlist.m3u8\n", i));
    }

    m3u8
}

// ============================================================================
// Parsing Benchmarks
// ============================================================================

fn bench_srt_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("SRT Parsing");

    for count in [10usize, 100, 1000, 5000] {
        let payload = generate_srt(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &payload, |b, payload| {
            b.iter(|| TimedTextParser::parse(black_box(payload)))
        });
    }

    group.finish();
}

fn bench_timestamp_conversion(c: &mut Criterion) {
    let mut group = c.benchmark_group("Timestamp Conversion");

    group.bench_function("timestamp_to_ms", |b| {
        b.iter(|| timestamp_to_ms(black_box("01:23:45,678")))
    });

    let payload = generate_srt(500);
    group.bench_function("srt_to_vtt_500", |b| {
        b.iter(|| srt_to_vtt(black_box(&payload)))
    });

    group.finish();
}

// ============================================================================
// Cursor Benchmarks
// ============================================================================

fn bench_cursor_seek(c: &mut Criterion) {
    let mut group = c.benchmark_group("Cursor Seek");

    for count in [100usize, 1000, 5000] {
        let chunks = TimedTextParser::parse(&generate_srt(count));
        let last_ms = count as u64 * 2500;

        group.bench_with_input(BenchmarkId::new("playback_tick", count), &chunks, |b, chunks| {
            let mut cursor = SubtitleCursor::new(chunks.clone());
            let mut t = 0u64;
            b.iter(|| {
                t = (t + 250) % last_ms;
                cursor.seek(black_box(t))
            })
        });

        group.bench_with_input(BenchmarkId::new("seek_to_end", count), &chunks, |b, chunks| {
            let mut cursor = SubtitleCursor::new(chunks.clone());
            b.iter(|| cursor.seek(black_box(last_ms)))
        });
    }

    group.finish();
}

// ============================================================================
// Manifest Benchmarks
// ============================================================================

#[cfg(feature = "hls")]
fn bench_hls_master_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("HLS Master Parsing");

    for count in [3usize, 7, 20] {
        let master = generate_hls_master(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &master, |b, master| {
            b.iter(|| parse_quality_levels(black_box(master)))
        });
    }

    group.finish();
}

#[cfg(not(feature = "hls"))]
fn bench_hls_master_parsing(_c: &mut Criterion) {}

criterion_group!(
    benches,
    bench_srt_parsing,
    bench_timestamp_conversion,
    bench_cursor_seek,
    bench_hls_master_parsing,
);
criterion_main!(benches);
