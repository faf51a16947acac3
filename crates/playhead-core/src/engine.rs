//! Playback engine - per-attachment wiring of the subtitle pipeline
//!
//! ```text
//!  select_* ──▶ SelectionStore ──▶ SubtitleResolver (spawned) ──┐
//!                     │                                         │ mpsc
//!                     ▼                                         ▼
//!              watch::Receiver                   poll_resolutions / next_resolution
//!                                                               │
//!  tick(ms) ───────────────────────────────▶ SubtitleCursor ◀──┘
//! ```
//!
//! Resolutions complete out of order. Each one carries the generation of the
//! subtitle change that started it and is applied only if no later change
//! happened, so a slow fetch can never overwrite subtitles chosen after it.
//! Re-resolving the same selection (after a catalog swap) starts a new
//! generation too.
//!
//! The engine must be created inside a tokio runtime. Resolutions are spawned
//! on that runtime, so the selection mutators may be called from any thread.

use crate::captions::TimedTextParser;
use crate::cursor::SubtitleCursor;
use crate::diagnostics::{Diagnostic, DiagnosticEmitter};
use crate::error::{Error, Result};
use crate::fetch::SubtitleFetcher;
use crate::resolver::{SubtitleKey, SubtitleResolver};
use crate::streaming::{StreamingBackend, StreamingSessionController};
use crate::tracks::{Selection, SelectionCommand, SelectionStore, SubtitleSelection, TrackMirror};
use crate::types::{EngineConfig, SessionId, TimedChunk, TrackCatalog, TrackKind};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument};

/// Outcome of one background subtitle resolution
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Selection the resolution was started for
    pub selection: SubtitleSelection,
    /// Subtitle change counter at the time the resolution started
    pub generation: u64,
    /// Resolved payload, `None` if nothing can be shown
    pub payload: Option<String>,
}

/// Engine for one media attachment
pub struct PlaybackEngine<F: SubtitleFetcher + 'static> {
    id: SessionId,
    config: EngineConfig,
    store: SelectionStore,
    resolver: Arc<SubtitleResolver<F>>,
    diagnostics: Arc<DiagnosticEmitter>,
    cursor: SubtitleCursor,
    /// Subtitle selection the cursor is (or will be) showing
    wanted: Option<SubtitleSelection>,
    /// Bumped on every subtitle change; only the latest is applied
    generation: u64,
    runtime: Handle,
    resolved_tx: mpsc::UnboundedSender<Resolution>,
    resolved_rx: mpsc::UnboundedReceiver<Resolution>,
    /// Resolutions spawned but not yet received
    pending: usize,
    clock_ms: Option<u64>,
}

impl<F: SubtitleFetcher + 'static> PlaybackEngine<F> {
    /// Create an engine for a media item.
    ///
    /// Fails with [`Error::RuntimeUnavailable`] outside a tokio runtime.
    pub fn new(catalog: TrackCatalog, fetcher: F, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| Error::RuntimeUnavailable)?;

        let id = SessionId::new();
        let diagnostics = Arc::new(DiagnosticEmitter::new(id, config.diagnostics_buffer));
        let store = SelectionStore::with_defaults(catalog, diagnostics.clone());
        let resolver = SubtitleResolver::new(fetcher, diagnostics.clone())
            .with_cache(config.cache_subtitles)
            .with_fetch_timeout(config.subtitle_fetch_timeout_ms.map(Duration::from_millis));
        let (resolved_tx, resolved_rx) = mpsc::unbounded_channel();

        info!(session_id = %id, media_id = %store.catalog().media_id, "Playback engine created");

        Ok(Self {
            id,
            config,
            store,
            resolver: Arc::new(resolver),
            diagnostics,
            cursor: SubtitleCursor::default(),
            wanted: None,
            generation: 0,
            runtime,
            resolved_tx,
            resolved_rx,
            pending: 0,
            clock_ms: None,
        })
    }

    /// Attach a mirror adapter to the selection store
    pub fn with_mirror(mut self, mirror: Box<dyn TrackMirror>) -> Self {
        self.store = self.store.with_mirror(mirror);
        self
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &TrackCatalog {
        self.store.catalog()
    }

    /// Snapshot of the current selection
    pub fn selection(&self) -> Selection {
        self.store.current()
    }

    /// Subscribe to selection changes
    pub fn subscribe_selection(&self) -> watch::Receiver<Selection> {
        self.store.subscribe()
    }

    pub fn diagnostics(&self) -> &Arc<DiagnosticEmitter> {
        &self.diagnostics
    }

    pub fn resolver(&self) -> &SubtitleResolver<F> {
        &self.resolver
    }

    /// Create a streaming controller sharing this engine's diagnostics
    pub fn streaming_controller<B: StreamingBackend>(
        &self,
        backend: B,
    ) -> StreamingSessionController<B> {
        StreamingSessionController::new(backend, self.diagnostics.clone())
            .with_max_recoveries(self.config.max_fatal_recoveries)
    }

    // =========================================================================
    // Selection
    // =========================================================================

    /// Apply a selection command; subtitle changes start a resolution
    pub fn apply(&mut self, command: SelectionCommand) -> Result<Selection> {
        let kind = command.kind();
        let selection = self.store.apply(command)?;
        if kind == TrackKind::Subtitle {
            self.subtitles_changed(selection.subtitles.clone());
        }
        Ok(selection)
    }

    pub fn select_audio(&mut self, index: usize) -> Result<Selection> {
        self.apply(SelectionCommand::SelectAudio(index))
    }

    pub fn select_video(&mut self, index: usize) -> Result<Selection> {
        self.apply(SelectionCommand::SelectVideo(index))
    }

    pub fn select_subtitles_container(&mut self, index: usize) -> Result<Selection> {
        self.apply(SelectionCommand::SelectSubtitles(SubtitleSelection::Container(index)))
    }

    pub fn select_subtitles_external(&mut self, id: impl Into<String>) -> Result<Selection> {
        self.apply(SelectionCommand::SelectSubtitles(SubtitleSelection::External(id.into())))
    }

    pub fn select_subtitles_imported(&mut self, text: impl Into<String>) -> Result<Selection> {
        self.apply(SelectionCommand::SelectSubtitles(SubtitleSelection::Imported(text.into())))
    }

    pub fn unset_subtitles(&mut self) -> Result<Selection> {
        self.apply(SelectionCommand::UnsetSubtitles)
    }

    /// Replace the catalog; container subtitles are re-resolved against it
    pub fn set_catalog(&mut self, catalog: TrackCatalog) {
        self.resolver.invalidate_container_payloads();
        self.store.set_catalog(catalog);
        if let Some(selection @ SubtitleSelection::Container(_)) = self.wanted.clone() {
            self.subtitles_changed(Some(selection));
        }
    }

    #[instrument(skip_all, fields(session_id = %self.id))]
    fn subtitles_changed(&mut self, selection: Option<SubtitleSelection>) {
        self.cursor.clear();
        self.wanted = selection.clone();
        self.generation += 1;

        let Some(selection) = selection else {
            debug!("Subtitles off");
            return;
        };

        if let Some(payload) = self.resolver.resolve_local(self.store.catalog(), &selection) {
            debug!(selection = %selection.label(), "Subtitles resolved without fetch");
            self.install(&payload);
            return;
        }

        let resolver = self.resolver.clone();
        let catalog = self.store.catalog().clone();
        let tx = self.resolved_tx.clone();
        let generation = self.generation;
        self.pending += 1;

        debug!(selection = %selection.label(), generation, "Spawning subtitle resolution");
        self.runtime.spawn(async move {
            let payload = resolver.resolve(&catalog, &selection).await;
            // Receiver lives as long as the engine
            let _ = tx.send(Resolution {
                selection,
                generation,
                payload,
            });
        });
    }

    // =========================================================================
    // Resolution delivery
    // =========================================================================

    /// Apply every resolution that has already completed.
    ///
    /// Returns the number applied; stale ones are discarded and not counted.
    pub fn poll_resolutions(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(resolution) = self.resolved_rx.try_recv() {
            if self.deliver(resolution) {
                applied += 1;
            }
        }
        applied
    }

    /// Wait for the next resolution and apply it.
    ///
    /// Returns `None` when nothing is pending, otherwise whether the
    /// resolution was applied (false if it was stale).
    pub async fn next_resolution(&mut self) -> Option<bool> {
        if self.pending == 0 {
            return None;
        }
        let resolution = self.resolved_rx.recv().await?;
        Some(self.deliver(resolution))
    }

    /// Resolutions spawned and not yet delivered
    pub fn pending_resolutions(&self) -> usize {
        self.pending
    }

    fn deliver(&mut self, resolution: Resolution) -> bool {
        self.pending = self.pending.saturating_sub(1);

        if resolution.generation != self.generation {
            let key = SubtitleKey::for_selection(&self.store.catalog().media_id, &resolution.selection);
            debug!(key = %key, generation = resolution.generation, "Discarding stale subtitle resolution");
            self.diagnostics.emit(Diagnostic::StaleResolutionDiscarded {
                key: key.to_string(),
            });
            return false;
        }

        match resolution.payload {
            Some(payload) => self.install(&payload),
            None => self.cursor.clear(),
        }
        true
    }

    fn install(&mut self, payload: &str) {
        let chunks = TimedTextParser::parse(payload);
        info!(chunks = chunks.len(), "Subtitles loaded");
        self.cursor.reset(chunks);
        if let Some(time_ms) = self.clock_ms {
            self.cursor.seek(time_ms);
        }
    }

    // =========================================================================
    // Clock
    // =========================================================================

    /// Advance (or seek) the playback clock.
    ///
    /// Returns true when the displayed subtitle text changed.
    pub fn tick(&mut self, time_ms: u64) -> bool {
        self.clock_ms = Some(time_ms);
        self.cursor.seek(time_ms)
    }

    /// Last clock value passed to [`tick`](Self::tick)
    pub fn clock_ms(&self) -> Option<u64> {
        self.clock_ms
    }

    /// Subtitle text to render now
    pub fn active_text(&self) -> Option<&str> {
        self.cursor.active_text()
    }

    pub fn active_chunk(&self) -> Option<&TimedChunk> {
        self.cursor.active_chunk()
    }

    /// Chunks of the subtitles currently loaded
    pub fn chunks(&self) -> &[TimedChunk] {
        self.cursor.chunks()
    }
}
