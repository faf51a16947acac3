//! Playhead Core - Playback session engine
//!
//! This crate provides the pieces a media client needs around a streaming
//! backend:
//! - Timed-text (SRT) parsing into subtitle chunks
//! - Subtitle cursor synchronized to the playback clock
//! - Track catalog and validated track selection state
//! - Subtitle source resolution (container, external, imported)
//! - Streaming session lifecycle and fatal error recovery
//! - Diagnostic event emission
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        PlaybackEngine                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │  Selection   │─▶│   Subtitle   │─▶│  TimedText   │           │
//! │  │    Store     │  │   Resolver   │  │   Parser     │           │
//! │  └──────────────┘  └──────┬───────┘  └──────┬───────┘           │
//! │                           │                 │                   │
//! │                    ┌──────┴──────┐   ┌──────┴──────┐            │
//! │                    │  Subtitle   │   │  Subtitle   │            │
//! │                    │  Fetcher    │   │   Cursor    │            │
//! │                    └─────────────┘   └─────────────┘            │
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐                             │
//! │  │  Streaming   │  │  Diagnostic  │                             │
//! │  │  Controller  │  │   Emitter    │                             │
//! │  └──────────────┘  └──────────────┘                             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod types;
pub mod captions;
pub mod cursor;
pub mod tracks;
pub mod fetch;
pub mod resolver;
pub mod streaming;
pub mod diagnostics;
pub mod manifest;
pub mod engine;

pub use error::{Error, Result};
pub use types::*;
pub use captions::TimedTextParser;
pub use cursor::SubtitleCursor;
pub use tracks::{Selection, SelectionCommand, SelectionStore, SubtitleSelection, TrackMirror};
pub use fetch::{HttpSubtitleFetcher, SubtitleFetcher};
pub use resolver::{SubtitleKey, SubtitleResolver};
pub use streaming::{
    BackendEvent, RecordingBackend, RecoveryAction, SessionState, StreamError, StreamErrorKind,
    StreamingBackend, StreamingSessionController,
};
pub use diagnostics::{Diagnostic, DiagnosticEmitter, DiagnosticRecord};
pub use engine::{PlaybackEngine, Resolution as SubtitleResolution};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log library initialization
pub fn init() {
    tracing::info!(version = VERSION, "Playhead Core initialized");
}
