//! CLI command implementations

use crate::output::print_json;
use anyhow::Context;
use playhead_core::captions::{format_timestamp, srt_to_vtt, timestamp_to_ms, TimedTextParser};
use playhead_core::manifest;
use playhead_core::{
    BackendEvent, DiagnosticEmitter, EngineConfig, HttpSubtitleFetcher, MediaId, RecordingBackend,
    SessionId, StreamingSessionController, SubtitleCursor, SubtitleFetcher, TimedChunk,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Load the engine configuration, applying the server override
pub fn load_config(path: Option<&Path>, server: Option<&str>) -> anyhow::Result<EngineConfig> {
    let mut config = match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            EngineConfig::from_json(&json)?
        }
        None => EngineConfig::default(),
    };

    if let Some(server) = server {
        config.server_url = Url::parse(server).with_context(|| format!("invalid server URL {}", server))?;
    }
    config.validate()?;
    Ok(config)
}

/// Parse a playback time given in milliseconds or `HH:MM:SS,mmm`
pub fn parse_time(value: &str) -> anyhow::Result<u64> {
    if value.contains(':') {
        Ok(timestamp_to_ms(value))
    } else {
        value
            .trim()
            .parse()
            .with_context(|| format!("invalid time {:?}", value))
    }
}

fn read_chunks(input: &Path) -> anyhow::Result<(String, Vec<TimedChunk>)> {
    let payload = std::fs::read_to_string(input)
        .with_context(|| format!("reading {}", input.display()))?;
    let chunks = TimedTextParser::parse(&payload);
    Ok((payload, chunks))
}

fn print_chunks(chunks: &[TimedChunk]) {
    for chunk in chunks {
        println!(
            "#{:<4} {} --> {}  {}",
            chunk.sequence_index,
            format_timestamp(chunk.start_ms),
            format_timestamp(chunk.end_ms),
            chunk.text.replace('\n', " / ")
        );
    }
}

/// Parse an SRT file
pub fn parse(input: &Path, vtt: bool, strip_tags: bool, format: &str) -> anyhow::Result<()> {
    let (payload, mut chunks) = read_chunks(input)?;

    if vtt {
        print!("{}", srt_to_vtt(&payload));
        return Ok(());
    }

    if strip_tags {
        for chunk in &mut chunks {
            chunk.text = TimedTextParser::strip_tags(&chunk.text);
        }
    }

    if print_json(&chunks, format)? {
        return Ok(());
    }

    println!("Parsed {}: {} chunks", input.display(), chunks.len());
    print_chunks(&chunks);
    Ok(())
}

#[derive(Serialize)]
struct CueReport<'a> {
    time_ms: u64,
    index: Option<usize>,
    chunk: Option<&'a TimedChunk>,
}

/// Show the chunk active at a time
pub fn cue(input: &Path, time: &str, format: &str) -> anyhow::Result<()> {
    let time_ms = parse_time(time)?;
    let (_, chunks) = read_chunks(input)?;

    let mut cursor = SubtitleCursor::new(chunks);
    cursor.seek(time_ms);

    let report = CueReport {
        time_ms,
        index: cursor.active_index(),
        chunk: cursor.active_chunk(),
    };
    if print_json(&report, format)? {
        return Ok(());
    }

    match report.chunk {
        Some(chunk) => println!(
            "[{}] #{} {}",
            format_timestamp(time_ms),
            chunk.sequence_index,
            chunk.text
        ),
        None => println!("[{}] (no subtitle)", format_timestamp(time_ms)),
    }
    Ok(())
}

#[derive(Serialize)]
struct Transition {
    time_ms: u64,
    text: Option<String>,
}

/// Walk a clock over an SRT file, printing every change of displayed text
pub fn simulate(
    input: &Path,
    step: u64,
    from: &str,
    to: Option<&str>,
    format: &str,
) -> anyhow::Result<()> {
    anyhow::ensure!(step > 0, "step must be > 0");

    let (_, chunks) = read_chunks(input)?;
    let from_ms = parse_time(from)?;
    let to_ms = match to {
        Some(to) => parse_time(to)?,
        None => chunks.iter().map(|c| c.end_ms).max().unwrap_or(0),
    };

    let mut cursor = SubtitleCursor::new(chunks);
    let mut transitions = Vec::new();
    let mut t = from_ms;
    while t <= to_ms {
        if cursor.seek(t) {
            transitions.push(Transition {
                time_ms: t,
                text: cursor.active_text().map(str::to_string),
            });
        }
        match t.checked_add(step) {
            Some(next) => t = next,
            None => break,
        }
    }

    if print_json(&transitions, format)? {
        return Ok(());
    }

    println!(
        "Simulating {} -> {} every {}ms",
        format_timestamp(from_ms),
        format_timestamp(to_ms),
        step
    );
    for transition in &transitions {
        match &transition.text {
            Some(text) => println!("  {}  show {}", format_timestamp(transition.time_ms), text.replace('\n', " / ")),
            None => println!("  {}  hide", format_timestamp(transition.time_ms)),
        }
    }
    println!("\n{} transitions", transitions.len());
    Ok(())
}

/// Which subtitle to fetch
pub enum FetchSource {
    Container { media: String, track: usize },
    External(String),
}

/// Fetch a subtitle payload from the media server
pub async fn fetch(
    config: EngineConfig,
    source: FetchSource,
    at: Option<&str>,
    format: &str,
) -> anyhow::Result<()> {
    let fetcher = HttpSubtitleFetcher::new(&config)?;
    let request = async {
        match &source {
            FetchSource::Container { media, track } => {
                fetcher
                    .fetch_container_subtitle(&MediaId::new(media.as_str()), *track)
                    .await
            }
            FetchSource::External(id) => fetcher.fetch_external_subtitle(id).await,
        }
    };

    let payload = match config.subtitle_fetch_timeout_ms {
        Some(ms) => tokio::time::timeout(Duration::from_millis(ms), request)
            .await
            .context("subtitle fetch timed out")??,
        None => request.await?,
    };
    let chunks = TimedTextParser::parse(&payload);

    if let Some(at) = at {
        let time_ms = parse_time(at)?;
        let mut cursor = SubtitleCursor::new(chunks);
        cursor.seek(time_ms);
        if print_json(&cursor.active_chunk(), format)? {
            return Ok(());
        }
        println!(
            "[{}] {}",
            format_timestamp(time_ms),
            cursor.active_text().unwrap_or("(no subtitle)")
        );
        return Ok(());
    }

    if print_json(&chunks, format)? {
        return Ok(());
    }
    println!("Fetched {} bytes, {} chunks", payload.len(), chunks.len());
    print_chunks(&chunks);
    Ok(())
}

/// List quality levels of a master playlist
pub async fn levels(config: &EngineConfig, manifest_ref: &str, format: &str) -> anyhow::Result<()> {
    let levels = match Url::parse(manifest_ref) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {
            let client = reqwest::Client::builder()
                .timeout(Duration::from_millis(config.request_timeout_ms))
                .build()?;
            manifest::load_quality_levels(&client, &url).await?
        }
        _ => {
            let content = std::fs::read_to_string(manifest_ref)
                .with_context(|| format!("reading {}", manifest_ref))?;
            manifest::parse_quality_levels(&content)?
        }
    };

    if print_json(&levels, format)? {
        return Ok(());
    }

    println!("Quality levels: {}", levels.len());
    for (i, level) in levels.iter().enumerate() {
        let codecs = [
            level.video_codec.map(|c| c.to_string()),
            level.audio_codec.map(|c| c.to_string()),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(", ");
        println!("  {}. {:<20} {:<22} {}", i + 1, level.display_name(), codecs, level.uri);
    }
    Ok(())
}

#[derive(Serialize)]
struct ReplayStep {
    event: &'static str,
    state: String,
    action: Option<String>,
}

/// Feed recorded backend events through a session controller
pub fn replay(
    config: &EngineConfig,
    events_path: &Path,
    max_recoveries: Option<u32>,
    format: &str,
) -> anyhow::Result<()> {
    let json = std::fs::read_to_string(events_path)
        .with_context(|| format!("reading {}", events_path.display()))?;
    let events: Vec<BackendEvent> = serde_json::from_str(&json)
        .with_context(|| format!("parsing events in {}", events_path.display()))?;

    let diagnostics = Arc::new(DiagnosticEmitter::new(SessionId::new(), config.diagnostics_buffer));
    let backend = RecordingBackend::new();
    let mut controller = StreamingSessionController::new(backend.clone(), diagnostics.clone())
        .with_max_recoveries(max_recoveries.or(config.max_fatal_recoveries));
    controller.attach()?;

    let steps: Vec<ReplayStep> = events
        .into_iter()
        .map(|event| {
            let name = event.name();
            let action = controller.handle_event(event);
            ReplayStep {
                event: name,
                state: controller.state().to_string(),
                action: action.map(|a| a.to_string()),
            }
        })
        .collect();

    let report = serde_json::json!({
        "steps": steps,
        "final_state": controller.state(),
        "commands": backend.commands(),
        "diagnostics": diagnostics.records(),
    });
    if print_json(&report, format)? {
        return Ok(());
    }

    println!("Replaying {} events", steps.len());
    for (i, step) in steps.iter().enumerate() {
        match &step.action {
            Some(action) => println!("  {:>3}. {:<20} -> {:<12} [{}]", i + 1, step.event, step.state, action),
            None => println!("  {:>3}. {:<20} -> {}", i + 1, step.event, step.state),
        }
    }
    println!("\nFinal state: {}", controller.state());
    println!("Recoveries: {}", controller.recovery_attempts());
    println!("Diagnostics: {}", diagnostics.records().len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("1500").unwrap(), 1500);
        assert_eq!(parse_time("00:01:02,345").unwrap(), 62_345);
        assert!(parse_time("soon").is_err());
        assert_eq!(parse_time("99999999999999:00:00,000").unwrap(), u64::MAX);
    }

    #[test]
    fn test_simulate_up_to_max_time() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "1\n00:00:01,000 --> 00:00:02,000\nhello\n").unwrap();

        let to = u64::MAX.to_string();
        let from = (u64::MAX - 5).to_string();
        simulate(file.path(), 3, &from, Some(to.as_str()), "json").unwrap();
    }

    #[test]
    fn test_load_config_with_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"request_timeout_ms": 2500, "max_fatal_recoveries": 3}}"#).unwrap();

        let config = load_config(Some(file.path()), Some("http://media.local:9000/")).unwrap();
        assert_eq!(config.request_timeout_ms, 2500);
        assert_eq!(config.max_fatal_recoveries, Some(3));
        assert_eq!(config.server_url.as_str(), "http://media.local:9000/");
    }

    #[test]
    fn test_load_config_rejects_zero_timeout() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"request_timeout_ms": 0}}"#).unwrap();
        assert!(load_config(Some(file.path()), None).is_err());
    }

    #[test]
    fn test_replay_events_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"type": "manifest_parsed", "levels": []}},
                {{"type": "error", "fatal": true, "kind": "network", "details": "timeout"}},
                {{"type": "error", "fatal": true, "kind": "other"}}
            ]"#
        )
        .unwrap();

        replay(&EngineConfig::default(), file.path(), None, "json").unwrap();
    }
}
