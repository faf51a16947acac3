//! Subtitle source resolution
//!
//! Turns a [`SubtitleSelection`] into a raw payload. Failures never escape:
//! a missing track, a failed fetch or a timeout all resolve to `None`, are
//! logged, and are recorded as [`Diagnostic::SubtitleUnavailable`].

use crate::diagnostics::{Diagnostic, DiagnosticEmitter};
use crate::error::{Error, Result};
use crate::fetch::SubtitleFetcher;
use crate::tracks::SubtitleSelection;
use crate::types::{MediaId, TrackCatalog};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Cache key identifying a subtitle payload
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SubtitleKey {
    Container { media_id: MediaId, track_index: usize },
    External { id: String },
    Imported { digest: u64 },
}

impl SubtitleKey {
    /// Key for a selection within a media item
    pub fn for_selection(media_id: &MediaId, selection: &SubtitleSelection) -> Self {
        match selection {
            SubtitleSelection::Container(track_index) => SubtitleKey::Container {
                media_id: media_id.clone(),
                track_index: *track_index,
            },
            SubtitleSelection::External(id) => SubtitleKey::External { id: id.clone() },
            SubtitleSelection::Imported(text) => {
                let mut hasher = DefaultHasher::new();
                text.hash(&mut hasher);
                SubtitleKey::Imported {
                    digest: hasher.finish(),
                }
            }
        }
    }
}

impl std::fmt::Display for SubtitleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubtitleKey::Container {
                media_id,
                track_index,
            } => write!(f, "container:{}:{}", media_id, track_index),
            SubtitleKey::External { id } => write!(f, "external:{}", id),
            SubtitleKey::Imported { digest } => write!(f, "imported:{:016x}", digest),
        }
    }
}

/// Resolves subtitle selections to payloads through a [`SubtitleFetcher`]
pub struct SubtitleResolver<F> {
    fetcher: F,
    cache: Mutex<HashMap<SubtitleKey, Arc<str>>>,
    cache_enabled: bool,
    /// Bumped when container payloads are invalidated
    container_epoch: AtomicU64,
    fetch_timeout: Option<Duration>,
    diagnostics: Arc<DiagnosticEmitter>,
}

impl<F: SubtitleFetcher> SubtitleResolver<F> {
    pub fn new(fetcher: F, diagnostics: Arc<DiagnosticEmitter>) -> Self {
        Self {
            fetcher,
            cache: Mutex::new(HashMap::new()),
            cache_enabled: true,
            container_epoch: AtomicU64::new(0),
            fetch_timeout: None,
            diagnostics,
        }
    }

    /// Give up on fetches after `timeout`
    pub fn with_fetch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Enable or disable payload caching
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Forget cached container payloads, e.g. when the catalog is replaced.
    ///
    /// Container fetches still in flight will not populate the cache.
    pub fn invalidate_container_payloads(&self) {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.retain(|key, _| !matches!(key, SubtitleKey::Container { .. }));
        self.container_epoch.fetch_add(1, Ordering::SeqCst);
        debug!(remaining = cache.len(), "Container subtitle payloads invalidated");
    }

    /// Resolve without I/O: imported payloads and cache hits.
    ///
    /// Returns `None` when [`resolve`](Self::resolve) has to run, including
    /// for container indices the catalog no longer has.
    pub fn resolve_local(&self, catalog: &TrackCatalog, selection: &SubtitleSelection) -> Option<String> {
        match selection {
            SubtitleSelection::Imported(text) => Some(text.clone()),
            SubtitleSelection::Container(index) if *index >= catalog.subtitles.len() => None,
            _ => self
                .cached(&SubtitleKey::for_selection(&catalog.media_id, selection))
                .map(|payload| payload.to_string()),
        }
    }

    /// Resolve a selection to its payload, or `None` if nothing can be shown
    #[instrument(skip_all, fields(media_id = %catalog.media_id, selection = %selection.label()))]
    pub async fn resolve(
        &self,
        catalog: &TrackCatalog,
        selection: &SubtitleSelection,
    ) -> Option<String> {
        let key = SubtitleKey::for_selection(&catalog.media_id, selection);

        match selection {
            SubtitleSelection::Imported(text) => return Some(text.clone()),
            SubtitleSelection::Container(track_index) => match catalog.subtitles.get(*track_index) {
                None => {
                    self.unavailable(&key, "track no longer in catalog");
                    return None;
                }
                Some(track) if !track.format.is_text() => {
                    self.unavailable(&key, "bitmap subtitles cannot be rendered as text");
                    return None;
                }
                Some(_) => {}
            },
            SubtitleSelection::External(_) => {}
        }

        if let Some(payload) = self.cached(&key) {
            debug!(key = %key, "Subtitle cache hit");
            return Some(payload.to_string());
        }

        let epoch = self.container_epoch.load(Ordering::SeqCst);
        match self.fetch(&key).await {
            Ok(payload) => {
                if self.cache_enabled {
                    let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
                    let invalidated = matches!(key, SubtitleKey::Container { .. })
                        && self.container_epoch.load(Ordering::SeqCst) != epoch;
                    if !invalidated {
                        cache.insert(key, Arc::from(payload.as_str()));
                    }
                }
                Some(payload)
            }
            Err(e) => {
                self.unavailable(&key, &e.to_string());
                None
            }
        }
    }

    async fn fetch(&self, key: &SubtitleKey) -> Result<String> {
        let request = async {
            match key {
                SubtitleKey::Container {
                    media_id,
                    track_index,
                } => {
                    self.fetcher
                        .fetch_container_subtitle(media_id, *track_index)
                        .await
                }
                SubtitleKey::External { id } => self.fetcher.fetch_external_subtitle(id).await,
                SubtitleKey::Imported { .. } => {
                    Err(Error::fetch("imported subtitles are never fetched"))
                }
            }
        };

        match self.fetch_timeout {
            Some(timeout) => tokio::time::timeout(timeout, request)
                .await
                .unwrap_or(Err(Error::SubtitleTimeout {
                    timeout_ms: timeout.as_millis() as u64,
                })),
            None => request.await,
        }
    }

    fn cached(&self, key: &SubtitleKey) -> Option<Arc<str>> {
        if !self.cache_enabled {
            return None;
        }
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    fn unavailable(&self, key: &SubtitleKey, reason: &str) {
        warn!(key = %key, reason, "Subtitles unavailable");
        self.diagnostics.emit(Diagnostic::SubtitleUnavailable {
            key: key.to_string(),
            reason: reason.to_string(),
        });
    }
}
