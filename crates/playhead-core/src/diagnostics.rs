//! Diagnostic event emission
//!
//! Failures in the engine rarely surface as errors to the viewer: subtitles
//! silently fail to appear, invalid selections are rejected in place, and
//! fatal streaming faults end in recovery or termination. Each of these is
//! recorded here so it stays observable:
//! - Validation rejections
//! - Subtitle resolution failures and stale discards
//! - Streaming faults and the recovery actions they triggered

use crate::streaming::{RecoveryAction, StreamErrorKind};
use crate::types::{SessionId, TrackKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Diagnostic event types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A selection referenced a track outside the catalog
    ValidationRejected {
        kind: TrackKind,
        index: usize,
        len: usize,
    },

    /// Subtitle payload could not be produced for the current selection
    SubtitleUnavailable {
        key: String,
        reason: String,
    },

    /// A resolution finished after its selection was superseded
    StaleResolutionDiscarded {
        key: String,
    },

    /// Backend reported an error
    StreamingFault {
        kind: StreamErrorKind,
        fatal: bool,
        details: String,
    },

    /// A recovery command was sent to the backend
    RecoveryIssued {
        action: RecoveryAction,
        attempt: u32,
    },

    /// Playback session ended for good
    SessionTerminated {
        reason: String,
    },

    /// Backend advertised a new set of quality levels
    QualityLevelsUpdated {
        count: usize,
    },
}

/// Diagnostic event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticRecord {
    /// Unique event ID
    pub id: Uuid,
    /// Session ID
    pub session_id: SessionId,
    /// Timestamp
    pub timestamp: DateTime<Utc>,
    /// Sequence number, starting at 1
    pub sequence: u64,
    /// The event
    #[serde(flatten)]
    pub event: Diagnostic,
}

struct Ledger {
    sequence: u64,
    buffer: VecDeque<DiagnosticRecord>,
}

/// Diagnostic emitter shared by every component of one playback attachment
pub struct DiagnosticEmitter {
    session_id: SessionId,
    ledger: Mutex<Ledger>,
    /// Maximum number of records retained; oldest are dropped first
    capacity: usize,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<DiagnosticRecord>>>,
}

impl DiagnosticEmitter {
    /// Create an emitter retaining at most `capacity` records
    pub fn new(session_id: SessionId, capacity: usize) -> Self {
        Self {
            session_id,
            ledger: Mutex::new(Ledger {
                sequence: 0,
                buffer: VecDeque::with_capacity(capacity.min(1024)),
            }),
            capacity: capacity.max(1),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Record a diagnostic event
    pub fn emit(&self, event: Diagnostic) {
        let record = {
            let mut ledger = self.ledger.lock().unwrap_or_else(|e| e.into_inner());
            ledger.sequence += 1;

            let record = DiagnosticRecord {
                id: Uuid::new_v4(),
                session_id: self.session_id,
                timestamp: Utc::now(),
                sequence: ledger.sequence,
                event,
            };

            if ledger.buffer.len() >= self.capacity {
                ledger.buffer.pop_front();
            }
            ledger.buffer.push_back(record.clone());
            record
        };

        debug!(
            sequence = record.sequence,
            event = ?record.event,
            "Diagnostic"
        );

        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.retain(|tx| tx.send(record.clone()).is_ok());
    }

    /// Receive every record emitted from now on
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<DiagnosticRecord> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        rx
    }

    /// Get all retained records
    pub fn records(&self) -> Vec<DiagnosticRecord> {
        let ledger = self.ledger.lock().unwrap_or_else(|e| e.into_inner());
        ledger.buffer.iter().cloned().collect()
    }

    /// Take all retained records, leaving the buffer empty
    pub fn drain(&self) -> Vec<DiagnosticRecord> {
        let mut ledger = self.ledger.lock().unwrap_or_else(|e| e.into_inner());
        ledger.buffer.drain(..).collect()
    }

    /// Retained events without metadata, oldest first
    pub fn events(&self) -> Vec<Diagnostic> {
        let ledger = self.ledger.lock().unwrap_or_else(|e| e.into_inner());
        ledger.buffer.iter().map(|r| r.event.clone()).collect()
    }
}

impl Default for DiagnosticEmitter {
    fn default() -> Self {
        Self::new(SessionId::new(), 256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_assigns_sequence() {
        let emitter = DiagnosticEmitter::default();
        emitter.emit(Diagnostic::QualityLevelsUpdated { count: 3 });
        emitter.emit(Diagnostic::SessionTerminated {
            reason: "navigation".into(),
        });

        let records = emitter.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].sequence, 1);
        assert_eq!(records[1].sequence, 2);
        assert_eq!(records[0].session_id, emitter.session_id());
    }

    #[test]
    fn test_buffer_is_bounded() {
        let emitter = DiagnosticEmitter::new(SessionId::new(), 2);
        for count in 0..5 {
            emitter.emit(Diagnostic::QualityLevelsUpdated { count });
        }

        let events = emitter.events();
        assert_eq!(
            events,
            vec![
                Diagnostic::QualityLevelsUpdated { count: 3 },
                Diagnostic::QualityLevelsUpdated { count: 4 },
            ]
        );
        assert_eq!(emitter.drain().len(), 2);
        assert!(emitter.records().is_empty());
    }

    #[test]
    fn test_record_serialization() {
        let emitter = DiagnosticEmitter::default();
        emitter.emit(Diagnostic::ValidationRejected {
            kind: TrackKind::Audio,
            index: 4,
            len: 4,
        });

        let json = serde_json::to_value(&emitter.records()[0]).unwrap();
        assert_eq!(json["event"], "validation_rejected");
        assert_eq!(json["kind"], "audio");
        assert_eq!(json["sequence"], 1);
    }

    #[tokio::test]
    async fn test_subscriber_receives_records() {
        let emitter = DiagnosticEmitter::default();
        let mut rx = emitter.subscribe();

        emitter.emit(Diagnostic::StaleResolutionDiscarded {
            key: "external:5".into(),
        });

        let record = rx.recv().await.unwrap();
        assert_eq!(
            record.event,
            Diagnostic::StaleResolutionDiscarded {
                key: "external:5".into()
            }
        );
    }
}
