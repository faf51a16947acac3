//! Core types for Playhead

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

/// Unique identifier for a playback attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Media item identifier as assigned by the media server
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaId(pub String);

impl MediaId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MediaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Video codec types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    H264,
    H265,
    Vp9,
    Av1,
}

impl VideoCodec {
    /// Detect the video codec from an RFC 6381 codecs string
    pub fn from_codecs(codecs: &str) -> Option<Self> {
        let codecs = codecs.to_lowercase();
        if codecs.contains("avc1") || codecs.contains("avc3") {
            Some(VideoCodec::H264)
        } else if codecs.contains("hvc1") || codecs.contains("hev1") {
            Some(VideoCodec::H265)
        } else if codecs.contains("vp09") || codecs.contains("vp9") {
            Some(VideoCodec::Vp9)
        } else if codecs.contains("av01") {
            Some(VideoCodec::Av1)
        } else {
            None
        }
    }
}

impl std::fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VideoCodec::H264 => write!(f, "H.264/AVC"),
            VideoCodec::H265 => write!(f, "H.265/HEVC"),
            VideoCodec::Vp9 => write!(f, "VP9"),
            VideoCodec::Av1 => write!(f, "AV1"),
        }
    }
}

/// Audio codec types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    Aac,
    Ac3,
    Eac3,
    Opus,
    Flac,
}

impl AudioCodec {
    /// Detect the audio codec from an RFC 6381 codecs string
    pub fn from_codecs(codecs: &str) -> Option<Self> {
        let codecs = codecs.to_lowercase();
        if codecs.contains("mp4a.40") {
            Some(AudioCodec::Aac)
        } else if codecs.contains("ec-3") || codecs.contains("ec3") {
            Some(AudioCodec::Eac3)
        } else if codecs.contains("ac-3") || codecs.contains("ac3") {
            Some(AudioCodec::Ac3)
        } else if codecs.contains("opus") {
            Some(AudioCodec::Opus)
        } else if codecs.contains("flac") {
            Some(AudioCodec::Flac)
        } else {
            None
        }
    }
}

impl std::fmt::Display for AudioCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioCodec::Aac => write!(f, "AAC"),
            AudioCodec::Ac3 => write!(f, "AC-3"),
            AudioCodec::Eac3 => write!(f, "E-AC-3"),
            AudioCodec::Opus => write!(f, "Opus"),
            AudioCodec::Flac => write!(f, "FLAC"),
        }
    }
}

/// Video resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns quality tier name
    pub fn quality_name(&self) -> &'static str {
        match self.height {
            0..=240 => "240p",
            241..=360 => "360p",
            361..=480 => "480p",
            481..=720 => "720p",
            721..=1080 => "1080p",
            1081..=1440 => "1440p",
            _ => "4K",
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

// =============================================================================
// Track Descriptors
// =============================================================================

/// Kind of selectable track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
    Subtitle,
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackKind::Video => write!(f, "video"),
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Subtitle => write!(f, "subtitle"),
        }
    }
}

/// Audio track embedded in the media container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioTrack {
    /// Stream identifier within the container
    pub id: String,
    /// BCP-47 or ISO 639-2 language code
    pub language: String,
    /// Human-readable label
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub codec: Option<AudioCodec>,
    /// Channel layout as reported by the server ("stereo", "5.1", ...)
    #[serde(default)]
    pub channel_layout: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

impl AudioTrack {
    pub fn new(id: impl Into<String>, language: impl Into<String>) -> Self {
        let language = language.into();
        Self {
            id: id.into(),
            label: language.clone(),
            language,
            codec: None,
            channel_layout: None,
            is_default: false,
        }
    }

    pub fn with_default(mut self, is_default: bool) -> Self {
        self.is_default = is_default;
        self
    }
}

/// Video track embedded in the media container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoTrack {
    pub id: String,
    #[serde(default)]
    pub codec: Option<VideoCodec>,
    #[serde(default)]
    pub resolution: Option<Resolution>,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub is_default: bool,
}

impl VideoTrack {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            codec: None,
            resolution: None,
            label: String::new(),
            is_default: false,
        }
    }
}

/// Subtitle payload format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleFormat {
    Srt,
    WebVtt,
    Ass,
    /// Bitmap formats (PGS, VobSub) that cannot be rendered as text
    Bitmap,
}

impl SubtitleFormat {
    /// Whether the payload is timed text the parser can consume
    pub fn is_text(&self) -> bool {
        !matches!(self, SubtitleFormat::Bitmap)
    }
}

/// Subtitle track embedded in the media container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    pub id: String,
    pub language: String,
    #[serde(default)]
    pub label: String,
    pub format: SubtitleFormat,
    #[serde(default)]
    pub is_default: bool,
    /// Forced subtitles (foreign language parts only)
    #[serde(default)]
    pub is_forced: bool,
}

impl SubtitleTrack {
    pub fn new(id: impl Into<String>, language: impl Into<String>, format: SubtitleFormat) -> Self {
        let language = language.into();
        Self {
            id: id.into(),
            label: language.clone(),
            language,
            format,
            is_default: false,
            is_forced: false,
        }
    }
}

/// Immutable per-media list of selectable tracks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackCatalog {
    pub media_id: MediaId,
    #[serde(default)]
    pub video: Vec<VideoTrack>,
    #[serde(default)]
    pub audio: Vec<AudioTrack>,
    #[serde(default)]
    pub subtitles: Vec<SubtitleTrack>,
}

impl TrackCatalog {
    /// Create an empty catalog for a media item
    pub fn new(media_id: MediaId) -> Self {
        Self {
            media_id,
            video: Vec::new(),
            audio: Vec::new(),
            subtitles: Vec::new(),
        }
    }

    /// Number of tracks of the given kind
    pub fn len(&self, kind: TrackKind) -> usize {
        match kind {
            TrackKind::Video => self.video.len(),
            TrackKind::Audio => self.audio.len(),
            TrackKind::Subtitle => self.subtitles.len(),
        }
    }

    /// Whether the catalog holds no tracks at all
    pub fn is_empty(&self) -> bool {
        self.video.is_empty() && self.audio.is_empty() && self.subtitles.is_empty()
    }

    /// Index of the default track of a kind: the first flagged default,
    /// else the first track
    pub fn default_index(&self, kind: TrackKind) -> Option<usize> {
        let flags: Vec<bool> = match kind {
            TrackKind::Video => self.video.iter().map(|t| t.is_default).collect(),
            TrackKind::Audio => self.audio.iter().map(|t| t.is_default).collect(),
            TrackKind::Subtitle => self.subtitles.iter().map(|t| t.is_default).collect(),
        };
        flags
            .iter()
            .position(|d| *d)
            .or(if flags.is_empty() { None } else { Some(0) })
    }

    /// Parse a catalog from the media server's JSON representation
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// A quality level advertised by the streaming backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityLevel {
    /// Bandwidth in bits per second
    pub bandwidth: u64,
    pub resolution: Option<Resolution>,
    pub video_codec: Option<VideoCodec>,
    pub audio_codec: Option<AudioCodec>,
    pub frame_rate: Option<f64>,
    /// Variant playlist URI as written in the manifest
    pub uri: String,
}

impl QualityLevel {
    /// Display name, e.g. "1080p (5000 kbps)"
    pub fn display_name(&self) -> String {
        match self.resolution {
            Some(r) => format!("{} ({} kbps)", r.quality_name(), self.bandwidth / 1000),
            None => format!("{} kbps", self.bandwidth / 1000),
        }
    }
}

// =============================================================================
// Timed Text
// =============================================================================

/// One timed subtitle record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedChunk {
    /// Record index as written in the source, may have gaps
    pub sequence_index: u32,
    /// Start offset in milliseconds
    pub start_ms: u64,
    /// End offset in milliseconds
    pub end_ms: u64,
    /// Display text, trimmed
    pub text: String,
}

impl TimedChunk {
    pub fn new(sequence_index: u32, start_ms: u64, end_ms: u64, text: impl Into<String>) -> Self {
        Self {
            sequence_index,
            start_ms,
            end_ms,
            text: text.into(),
        }
    }

    /// Duration of this chunk in milliseconds
    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }

    /// Check if the chunk should be displayed at a given time
    pub fn is_active_at(&self, time_ms: u64) -> bool {
        time_ms >= self.start_ms && time_ms < self.end_ms
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Base URL of the media server
    pub server_url: Url,
    /// HTTP request timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Give up on a subtitle fetch after this long (None = wait indefinitely)
    pub subtitle_fetch_timeout_ms: Option<u64>,
    /// Terminate the session after this many fatal recoveries (None = unbounded)
    pub max_fatal_recoveries: Option<u32>,
    /// Number of diagnostic records retained in memory
    pub diagnostics_buffer: usize,
    /// Cache fetched subtitle payloads for the lifetime of the engine
    pub cache_subtitles: bool,
}

impl EngineConfig {
    /// Load configuration from a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot operate with
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_ms == 0 {
            return Err(Error::InvalidConfig("request_timeout_ms must be > 0".into()));
        }
        if self.subtitle_fetch_timeout_ms == Some(0) {
            return Err(Error::InvalidConfig(
                "subtitle_fetch_timeout_ms must be > 0".into(),
            ));
        }
        if self.diagnostics_buffer == 0 {
            return Err(Error::InvalidConfig("diagnostics_buffer must be > 0".into()));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            server_url: Url::parse("http://127.0.0.1:8080/").expect("static URL is valid"),
            request_timeout_ms: 10_000,
            subtitle_fetch_timeout_ms: None,
            max_fatal_recoveries: None,
            diagnostics_buffer: 256,
            cache_subtitles: true,
        }
    }
}
