//! Integration tests for Playhead Core

use mockito::Server;
use playhead_core::{
    BackendEvent, Diagnostic, EngineConfig, Error, HttpSubtitleFetcher, MediaId,
    PlaybackEngine, RecordingBackend, RecoveryAction, Resolution, SessionState,
    StreamErrorKind, SubtitleFetcher, SubtitleFormat, SubtitleTrack, TimedTextParser,
    TrackCatalog,
};
use tokio_test::{assert_err, assert_ok};
use url::Url;

const EPISODE_SRT: &str = "1\r\n00:00:00,000 --> 00:00:01,000\r\nA\r\n\r\n\
                           2\r\n00:00:01,500 --> 00:00:02,500\r\nB\r\n";

fn config_for(server: &Server) -> EngineConfig {
    EngineConfig {
        server_url: Url::parse(&server.url()).unwrap(),
        ..Default::default()
    }
}

fn catalog() -> TrackCatalog {
    TrackCatalog::from_json(
        r#"{
            "media_id": "episode-7",
            "video": [{"id": "v0", "codec": "h264", "resolution": {"width": 1920, "height": 1080}, "is_default": true}],
            "audio": [
                {"id": "a0", "language": "eng", "label": "English", "codec": "aac", "channel_layout": "5.1", "is_default": true},
                {"id": "a1", "language": "jpn", "label": "Japanese", "codec": "aac", "channel_layout": "stereo", "is_default": false}
            ],
            "subtitles": [
                {"id": "s0", "language": "eng", "label": "English", "format": "srt", "is_default": false, "is_forced": false}
            ]
        }"#,
    )
    .unwrap()
}

// =============================================================================
// HTTP Fetcher Tests
// =============================================================================

#[tokio::test]
async fn test_fetch_container_subtitle() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/media/episode-7/subtitles/0")
        .with_status(200)
        .with_header("content-type", "application/x-subrip")
        .with_body(EPISODE_SRT)
        .create_async()
        .await;

    let fetcher = HttpSubtitleFetcher::new(&config_for(&server)).unwrap();
    let payload = fetcher
        .fetch_container_subtitle(&MediaId::new("episode-7"), 0)
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(TimedTextParser::parse(&payload).len(), 2);
}

#[tokio::test]
async fn test_fetch_external_subtitle_not_found() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/subtitles/missing")
        .with_status(404)
        .create_async()
        .await;

    let fetcher = HttpSubtitleFetcher::new(&config_for(&server)).unwrap();
    let err = fetcher.fetch_external_subtitle("missing").await.unwrap_err();

    mock.assert_async().await;
    assert!(matches!(err, Error::SubtitleFetch(_)));
    assert!(err.is_recoverable());
}

// =============================================================================
// Engine Tests
// =============================================================================

#[tokio::test]
async fn test_engine_container_subtitles_over_http() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/media/episode-7/subtitles/0")
        .with_status(200)
        .with_body(EPISODE_SRT)
        .expect(1)
        .create_async()
        .await;

    let config = config_for(&server);
    let fetcher = HttpSubtitleFetcher::new(&config).unwrap();
    let mut engine = PlaybackEngine::new(catalog(), fetcher, config).unwrap();

    assert_eq!(engine.selection().audio, Some(0));
    assert_eq!(engine.selection().video, Some(0));

    engine.select_subtitles_container(0).unwrap();
    assert_eq!(engine.next_resolution().await, Some(true));

    engine.tick(500);
    assert_eq!(engine.active_text(), Some("A"));
    engine.tick(1200);
    assert_eq!(engine.active_text(), None);
    engine.tick(2000);
    assert_eq!(engine.active_text(), Some("B"));

    // Second selection of the same track is served from cache
    engine.unset_subtitles().unwrap();
    engine.select_subtitles_container(0).unwrap();
    assert_eq!(engine.pending_resolutions(), 0);
    assert_eq!(engine.active_text(), Some("B"));

    mock.assert_async().await;
}

#[tokio::test]
async fn test_engine_fetch_failure_degrades_to_no_subtitles() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/subtitles/42")
        .with_status(500)
        .create_async()
        .await;

    let config = config_for(&server);
    let fetcher = HttpSubtitleFetcher::new(&config).unwrap();
    let mut engine = PlaybackEngine::new(catalog(), fetcher, config).unwrap();

    engine.select_subtitles_external("42").unwrap();
    assert_eq!(engine.next_resolution().await, Some(true));
    engine.tick(500);
    assert_eq!(engine.active_text(), None);

    let events = engine.diagnostics().events();
    assert!(events
        .iter()
        .any(|e| matches!(e, Diagnostic::SubtitleUnavailable { key, .. } if key == "external:42")));
}

#[tokio::test]
async fn test_engine_rejects_out_of_bounds_audio() {
    let server = Server::new_async().await;
    let config = config_for(&server);
    let fetcher = HttpSubtitleFetcher::new(&config).unwrap();
    let mut engine = PlaybackEngine::new(catalog(), fetcher, config).unwrap();

    assert_ok!(engine.select_audio(1));
    let rx = engine.subscribe_selection();
    let revision = rx.borrow().revision;

    let err = assert_err!(engine.select_audio(2));
    assert_eq!(err.error_code(), "TRACK_OUT_OF_BOUNDS");
    assert_eq!(engine.selection().audio, Some(1));
    assert_eq!(rx.borrow().revision, revision);
    assert!(matches!(
        engine.diagnostics().events().last(),
        Some(Diagnostic::ValidationRejected { index: 2, len: 2, .. })
    ));
}

#[tokio::test]
async fn test_engine_catalog_from_server_shape() {
    let catalog = catalog();
    assert_eq!(catalog.subtitles[0].format, SubtitleFormat::Srt);
    assert_eq!(
        catalog.subtitles[0],
        SubtitleTrack {
            label: "English".into(),
            ..SubtitleTrack::new("s0", "eng", SubtitleFormat::Srt)
        }
    );
}

// =============================================================================
// Streaming Session Tests
// =============================================================================

#[tokio::test]
async fn test_streaming_session_recovers_then_terminates() {
    let server = Server::new_async().await;
    let config = EngineConfig {
        max_fatal_recoveries: Some(2),
        ..config_for(&server)
    };
    let fetcher = HttpSubtitleFetcher::new(&config).unwrap();
    let engine = PlaybackEngine::new(catalog(), fetcher, config).unwrap();

    let backend = RecordingBackend::new();
    let mut session = engine.streaming_controller(backend.clone());
    let state = session.subscribe_state();

    assert_ok!(session.attach());
    session.handle_event(BackendEvent::ManifestParsed { levels: vec![] });
    assert_eq!(*state.borrow(), SessionState::Playing);

    let network = BackendEvent::Error {
        fatal: true,
        kind: StreamErrorKind::Network,
        details: "manifest load timeout".into(),
    };
    let media = BackendEvent::Error {
        fatal: true,
        kind: StreamErrorKind::Media,
        details: "buffer append error".into(),
    };

    session.handle_event(network.clone());
    session.handle_event(BackendEvent::MediaAttached);
    session.handle_event(media);
    session.handle_event(network);

    assert_eq!(*state.borrow(), SessionState::Terminated);
    assert_eq!(
        backend.commands(),
        vec![
            RecoveryAction::RestartLoad,
            RecoveryAction::RecoverMediaError,
            RecoveryAction::Destroy,
        ]
    );

    let terminated = engine
        .diagnostics()
        .events()
        .into_iter()
        .filter(|e| matches!(e, Diagnostic::SessionTerminated { .. }))
        .count();
    assert_eq!(terminated, 1);
}

#[test]
fn test_resolution_quality_name() {
    assert_eq!(Resolution::new(1280, 720).quality_name(), "720p");
    assert_eq!(Resolution::new(1920, 1080).quality_name(), "1080p");
}
