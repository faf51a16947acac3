//! Track catalog and selection state
//!
//! [`SelectionStore`] owns the catalog for one media item together with the
//! single current [`Selection`]. All mutations go through
//! [`SelectionStore::apply`], which validates the command against the
//! catalog, publishes the new selection to subscribers, and returns it.
//! Rejected commands leave the selection untouched.

use crate::diagnostics::{Diagnostic, DiagnosticEmitter};
use crate::error::{Error, Result};
use crate::types::{TrackCatalog, TrackKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Where the selected subtitles come from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "source", content = "value", rename_all = "snake_case")]
pub enum SubtitleSelection {
    /// Subtitle stream embedded in the media container, by catalog index
    Container(usize),
    /// Subtitle file provided by the server's subtitle search, by id
    External(String),
    /// Raw payload imported by the viewer
    Imported(String),
}

impl SubtitleSelection {
    /// Short label for logs; never includes imported payloads
    pub fn label(&self) -> String {
        match self {
            SubtitleSelection::Container(index) => format!("container:{}", index),
            SubtitleSelection::External(id) => format!("external:{}", id),
            SubtitleSelection::Imported(text) => format!("imported:{}b", text.len()),
        }
    }
}

/// The currently chosen track per kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub video: Option<usize>,
    pub audio: Option<usize>,
    pub subtitles: Option<SubtitleSelection>,
    /// Incremented once per successful mutation
    pub revision: u64,
}

/// A single selection mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionCommand {
    SelectVideo(usize),
    SelectAudio(usize),
    SelectSubtitles(SubtitleSelection),
    UnsetVideo,
    UnsetAudio,
    UnsetSubtitles,
}

impl SelectionCommand {
    /// The track kind this command changes
    pub fn kind(&self) -> TrackKind {
        match self {
            SelectionCommand::SelectVideo(_) | SelectionCommand::UnsetVideo => TrackKind::Video,
            SelectionCommand::SelectAudio(_) | SelectionCommand::UnsetAudio => TrackKind::Audio,
            SelectionCommand::SelectSubtitles(_) | SelectionCommand::UnsetSubtitles => {
                TrackKind::Subtitle
            }
        }
    }

    /// Catalog index this command must be validated against, if any
    fn catalog_index(&self) -> Option<usize> {
        match self {
            SelectionCommand::SelectVideo(i)
            | SelectionCommand::SelectAudio(i)
            | SelectionCommand::SelectSubtitles(SubtitleSelection::Container(i)) => Some(*i),
            _ => None,
        }
    }
}

/// Side-effecting adapter run after each successful selection change,
/// e.g. to mirror the selection into native media element track lists
pub trait TrackMirror: Send + Sync {
    fn mirror(&self, catalog: &TrackCatalog, selection: &Selection);
}

/// Catalog plus selection for one media item
pub struct SelectionStore {
    catalog: TrackCatalog,
    tx: watch::Sender<Selection>,
    diagnostics: Arc<DiagnosticEmitter>,
    mirror: Option<Box<dyn TrackMirror>>,
}

impl SelectionStore {
    /// Create a store with nothing selected
    pub fn new(catalog: TrackCatalog, diagnostics: Arc<DiagnosticEmitter>) -> Self {
        let (tx, _) = watch::channel(Selection::default());
        Self {
            catalog,
            tx,
            diagnostics,
            mirror: None,
        }
    }

    /// Create a store with the catalog's default video and audio tracks selected
    pub fn with_defaults(catalog: TrackCatalog, diagnostics: Arc<DiagnosticEmitter>) -> Self {
        let initial = Selection {
            video: catalog.default_index(TrackKind::Video),
            audio: catalog.default_index(TrackKind::Audio),
            subtitles: None,
            revision: 0,
        };
        let store = Self::new(catalog, diagnostics);
        store.tx.send_replace(initial);
        store
    }

    /// Attach a mirror adapter
    pub fn with_mirror(mut self, mirror: Box<dyn TrackMirror>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    pub fn catalog(&self) -> &TrackCatalog {
        &self.catalog
    }

    /// Replace the catalog, keeping the selection as is.
    ///
    /// Indices may now point past the end of the new catalog; consumers
    /// resolve such stale entries to nothing.
    pub fn set_catalog(&mut self, catalog: TrackCatalog) {
        info!(
            media_id = %catalog.media_id,
            video = catalog.video.len(),
            audio = catalog.audio.len(),
            subtitles = catalog.subtitles.len(),
            "Catalog replaced"
        );
        self.catalog = catalog;
    }

    /// Snapshot of the current selection
    pub fn current(&self) -> Selection {
        self.tx.borrow().clone()
    }

    /// Subscribe to selection changes
    pub fn subscribe(&self) -> watch::Receiver<Selection> {
        self.tx.subscribe()
    }

    /// Validate and apply a command, returning the new selection
    pub fn apply(&self, command: SelectionCommand) -> Result<Selection> {
        let kind = command.kind();

        if let Some(index) = command.catalog_index() {
            let len = self.catalog.len(kind);
            if index >= len {
                warn!(%kind, index, len, "Rejected out-of-bounds track selection");
                self.diagnostics
                    .emit(Diagnostic::ValidationRejected { kind, index, len });
                return Err(Error::TrackIndexOutOfBounds { kind, index, len });
            }
        }

        let mut next = self.current();
        match command {
            SelectionCommand::SelectVideo(i) => next.video = Some(i),
            SelectionCommand::SelectAudio(i) => next.audio = Some(i),
            SelectionCommand::SelectSubtitles(sub) => next.subtitles = Some(sub),
            SelectionCommand::UnsetVideo => next.video = None,
            SelectionCommand::UnsetAudio => next.audio = None,
            SelectionCommand::UnsetSubtitles => next.subtitles = None,
        }
        next.revision += 1;

        info!(
            %kind,
            revision = next.revision,
            video = ?next.video,
            audio = ?next.audio,
            subtitles = ?next.subtitles.as_ref().map(|s| s.label()),
            "Selection changed"
        );

        self.tx.send_replace(next.clone());
        if let Some(ref mirror) = self.mirror {
            mirror.mirror(&self.catalog, &next);
        }

        Ok(next)
    }

    pub fn select_audio(&self, index: usize) -> Result<Selection> {
        self.apply(SelectionCommand::SelectAudio(index))
    }

    pub fn select_video(&self, index: usize) -> Result<Selection> {
        self.apply(SelectionCommand::SelectVideo(index))
    }

    pub fn select_subtitles_container(&self, index: usize) -> Result<Selection> {
        self.apply(SelectionCommand::SelectSubtitles(SubtitleSelection::Container(index)))
    }

    pub fn select_subtitles_external(&self, id: impl Into<String>) -> Result<Selection> {
        self.apply(SelectionCommand::SelectSubtitles(SubtitleSelection::External(id.into())))
    }

    pub fn select_subtitles_imported(&self, text: impl Into<String>) -> Result<Selection> {
        self.apply(SelectionCommand::SelectSubtitles(SubtitleSelection::Imported(text.into())))
    }

    pub fn unset_subtitles(&self) -> Result<Selection> {
        self.apply(SelectionCommand::UnsetSubtitles)
    }

    pub fn unset_audio(&self) -> Result<Selection> {
        self.apply(SelectionCommand::UnsetAudio)
    }

    pub fn unset_video(&self) -> Result<Selection> {
        self.apply(SelectionCommand::UnsetVideo)
    }
}
