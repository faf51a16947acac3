//! Streaming session controller
//!
//! Consumes events from an adaptive streaming backend, tracks the session
//! lifecycle and answers fatal errors with a recovery command:
//!
//! | fatal error kind | action                  | next state   |
//! |------------------|-------------------------|--------------|
//! | media            | `recover_media_error()` | Recovering   |
//! | network          | `restart_load()`        | Recovering   |
//! | anything else    | `destroy()`             | Terminated   |
//!
//! Non-fatal errors are logged and leave the state alone. Terminated is
//! absorbing: later events are ignored and no command is ever issued again.

use crate::diagnostics::{Diagnostic, DiagnosticEmitter};
use crate::error::{Error, Result};
use crate::types::QualityLevel;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

/// Error category reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamErrorKind {
    Network,
    Media,
    #[serde(other)]
    Other,
}

impl std::fmt::Display for StreamErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamErrorKind::Network => write!(f, "network"),
            StreamErrorKind::Media => write!(f, "media"),
            StreamErrorKind::Other => write!(f, "other"),
        }
    }
}

/// Command issued to the backend in response to a fatal error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    RecoverMediaError,
    RestartLoad,
    Destroy,
}

impl RecoveryAction {
    /// Action for a fatal error of the given kind
    pub fn for_fatal(kind: StreamErrorKind) -> Self {
        match kind {
            StreamErrorKind::Media => RecoveryAction::RecoverMediaError,
            StreamErrorKind::Network => RecoveryAction::RestartLoad,
            StreamErrorKind::Other => RecoveryAction::Destroy,
        }
    }
}

impl std::fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecoveryAction::RecoverMediaError => write!(f, "recover_media_error"),
            RecoveryAction::RestartLoad => write!(f, "restart_load"),
            RecoveryAction::Destroy => write!(f, "destroy"),
        }
    }
}

/// Error reported by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamError {
    pub kind: StreamErrorKind,
    pub fatal: bool,
    pub details: String,
}

/// Events emitted by the streaming backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendEvent {
    /// Backend is bound to the media element (again)
    MediaAttached,
    /// Master manifest loaded
    ManifestParsed { levels: Vec<QualityLevel> },
    /// Playback stalled waiting for data
    BufferStalled,
    /// Enough data buffered to continue
    BufferResumed,
    /// Last segment appended
    BufferEos,
    /// Back buffer eviction point reached
    BackBufferReached,
    Error {
        fatal: bool,
        kind: StreamErrorKind,
        #[serde(default)]
        details: String,
    },
}

impl BackendEvent {
    /// Event name as used on the wire
    pub fn name(&self) -> &'static str {
        match self {
            BackendEvent::MediaAttached => "media_attached",
            BackendEvent::ManifestParsed { .. } => "manifest_parsed",
            BackendEvent::BufferStalled => "buffer_stalled",
            BackendEvent::BufferResumed => "buffer_resumed",
            BackendEvent::BufferEos => "buffer_eos",
            BackendEvent::BackBufferReached => "back_buffer_reached",
            BackendEvent::Error { .. } => "error",
        }
    }
}

/// Commands the controller may issue to a backend
pub trait StreamingBackend: Send {
    fn recover_media_error(&mut self);
    fn restart_load(&mut self);
    fn destroy(&mut self);
}

/// Streaming session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Created, backend not yet attached
    Initializing,
    /// Attached to the media element, manifest pending
    Attached,
    Buffering,
    Playing,
    /// Transient: a fatal error is being classified
    Error,
    /// Recovery command issued, waiting for the backend
    Recovering,
    /// Backend destroyed
    Terminated,
}

impl SessionState {
    /// Check if transition to target state is valid
    pub fn can_transition_to(&self, target: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, target),
            // From Initializing
            (Initializing, Attached) | (Initializing, Error) | (Initializing, Terminated) |
            // From Attached
            (Attached, Playing) | (Attached, Buffering) | (Attached, Error) | (Attached, Terminated) |
            // From Buffering
            (Buffering, Playing) | (Buffering, Error) | (Buffering, Terminated) |
            // From Playing
            (Playing, Buffering) | (Playing, Error) | (Playing, Terminated) |
            // From Error
            (Error, Recovering) | (Error, Terminated) |
            // From Recovering
            (Recovering, Attached) | (Recovering, Error) | (Recovering, Terminated)
        )
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self, SessionState::Terminated)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Initializing => write!(f, "initializing"),
            SessionState::Attached => write!(f, "attached"),
            SessionState::Buffering => write!(f, "buffering"),
            SessionState::Playing => write!(f, "playing"),
            SessionState::Error => write!(f, "error"),
            SessionState::Recovering => write!(f, "recovering"),
            SessionState::Terminated => write!(f, "terminated"),
        }
    }
}

/// Drives one streaming backend through its lifecycle
pub struct StreamingSessionController<B: StreamingBackend> {
    backend: B,
    state: SessionState,
    /// State change broadcaster
    state_tx: watch::Sender<SessionState>,
    levels: Vec<QualityLevel>,
    last_error: Option<StreamError>,
    /// Recovery commands issued so far
    recoveries: u32,
    /// Terminate instead of recovering once this many recoveries were issued
    max_recoveries: Option<u32>,
    diagnostics: Arc<DiagnosticEmitter>,
}

impl<B: StreamingBackend> StreamingSessionController<B> {
    /// Create a controller for a freshly created backend
    pub fn new(backend: B, diagnostics: Arc<DiagnosticEmitter>) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Initializing);
        Self {
            backend,
            state: SessionState::Initializing,
            state_tx,
            levels: Vec::new(),
            last_error: None,
            recoveries: 0,
            max_recoveries: None,
            diagnostics,
        }
    }

    /// Limit the number of fatal recoveries before the session is terminated
    pub fn with_max_recoveries(mut self, max: Option<u32>) -> Self {
        self.max_recoveries = max;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Subscribe to state changes
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Quality levels from the latest parsed manifest
    pub fn levels(&self) -> &[QualityLevel] {
        &self.levels
    }

    pub fn last_error(&self) -> Option<&StreamError> {
        self.last_error.as_ref()
    }

    pub fn recovery_attempts(&self) -> u32 {
        self.recoveries
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Transition to new state
    fn set_state(&mut self, new_state: SessionState) -> Result<()> {
        let current = self.state;

        if !current.can_transition_to(new_state) {
            return Err(Error::InvalidStateTransition {
                from: current.to_string(),
                to: new_state.to_string(),
            });
        }

        self.state = new_state;
        self.state_tx.send_replace(new_state);

        info!(from = %current, to = %new_state, "State transition");
        Ok(())
    }

    /// Apply a transition triggered by a backend event, ignoring ones that
    /// do not apply in the current state
    fn follow(&mut self, new_state: SessionState) {
        if self.state == new_state {
            return;
        }
        if let Err(e) = self.set_state(new_state) {
            debug!(error = %e, "Ignoring event transition");
        }
    }

    /// Mark the backend as attached to the media element
    pub fn attach(&mut self) -> Result<()> {
        if self.state.is_terminated() {
            return Err(Error::SessionTerminated);
        }
        self.set_state(SessionState::Attached)
    }

    /// Destroy the backend and end the session; no-op once terminated
    pub fn destroy(&mut self) {
        self.terminate("destroyed by owner");
    }

    /// Process one backend event.
    ///
    /// Returns the recovery command issued to the backend, if any.
    #[instrument(skip(self, event), fields(state = %self.state))]
    pub fn handle_event(&mut self, event: BackendEvent) -> Option<RecoveryAction> {
        if self.state.is_terminated() {
            debug!(?event, "Session terminated; event ignored");
            return None;
        }

        match event {
            BackendEvent::MediaAttached => {
                self.follow(SessionState::Attached);
                None
            }
            BackendEvent::ManifestParsed { levels } => {
                info!(levels = levels.len(), "Manifest parsed");
                self.diagnostics.emit(Diagnostic::QualityLevelsUpdated {
                    count: levels.len(),
                });
                self.levels = levels;

                if self.state == SessionState::Recovering {
                    self.follow(SessionState::Attached);
                }
                if self.state == SessionState::Attached {
                    self.follow(SessionState::Playing);
                }
                None
            }
            BackendEvent::BufferStalled => {
                if self.state == SessionState::Playing {
                    self.follow(SessionState::Buffering);
                }
                None
            }
            BackendEvent::BufferResumed => {
                if matches!(self.state, SessionState::Buffering | SessionState::Attached) {
                    self.follow(SessionState::Playing);
                }
                None
            }
            BackendEvent::BufferEos => {
                debug!("End of stream buffered");
                None
            }
            BackendEvent::BackBufferReached => {
                debug!("Back buffer reached");
                None
            }
            BackendEvent::Error {
                fatal,
                kind,
                details,
            } => self.handle_error(StreamError {
                kind,
                fatal,
                details,
            }),
        }
    }

    fn handle_error(&mut self, err: StreamError) -> Option<RecoveryAction> {
        self.diagnostics.emit(Diagnostic::StreamingFault {
            kind: err.kind,
            fatal: err.fatal,
            details: err.details.clone(),
        });

        if !err.fatal {
            warn!(kind = %err.kind, details = %err.details, "Non-fatal streaming error");
            self.last_error = Some(err);
            return None;
        }

        error!(kind = %err.kind, details = %err.details, "Fatal streaming error");
        let kind = err.kind;
        self.last_error = Some(err);
        self.follow(SessionState::Error);

        let mut action = RecoveryAction::for_fatal(kind);
        if action != RecoveryAction::Destroy
            && self.max_recoveries.is_some_and(|max| self.recoveries >= max)
        {
            warn!(attempts = self.recoveries, "Recovery limit reached");
            action = RecoveryAction::Destroy;
        }

        match action {
            RecoveryAction::RecoverMediaError => self.backend.recover_media_error(),
            RecoveryAction::RestartLoad => self.backend.restart_load(),
            RecoveryAction::Destroy => {
                let reason = match kind {
                    StreamErrorKind::Other => format!("unrecoverable {} error", kind),
                    _ => "recovery limit reached".to_string(),
                };
                self.terminate(&reason);
                return Some(action);
            }
        }

        self.recoveries += 1;
        info!(%action, attempt = self.recoveries, "Recovery issued");
        self.diagnostics.emit(Diagnostic::RecoveryIssued {
            action,
            attempt: self.recoveries,
        });
        self.follow(SessionState::Recovering);
        Some(action)
    }

    fn terminate(&mut self, reason: &str) {
        if self.state.is_terminated() {
            return;
        }
        self.backend.destroy();
        self.follow(SessionState::Terminated);
        info!(reason, "Streaming session terminated");
        self.diagnostics.emit(Diagnostic::SessionTerminated {
            reason: reason.to_string(),
        });
    }
}

impl<B: StreamingBackend> Drop for StreamingSessionController<B> {
    fn drop(&mut self) {
        self.terminate("controller dropped");
    }
}

/// Backend that records the commands it receives
#[derive(Debug, Clone, Default)]
pub struct RecordingBackend {
    commands: Arc<std::sync::Mutex<Vec<RecoveryAction>>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands received so far, shared with every clone
    pub fn commands(&self) -> Vec<RecoveryAction> {
        self.commands
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn record(&self, action: RecoveryAction) {
        self.commands
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(action);
    }
}

impl StreamingBackend for RecordingBackend {
    fn recover_media_error(&mut self) {
        self.record(RecoveryAction::RecoverMediaError);
    }

    fn restart_load(&mut self) {
        self.record(RecoveryAction::RestartLoad);
    }

    fn destroy(&mut self) {
        self.record(RecoveryAction::Destroy);
    }
}
