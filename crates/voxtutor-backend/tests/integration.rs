use std::sync::Arc;
use std::time::Duration;
use voxtutor_audio::{decode, encode, PLAYBACK_SAMPLE_RATE};
use voxtutor_backend::{
    BackendRegistry, LessonGenerator, LiveConnector, LiveEvent, SpeechSynthesizer, TutorBackend,
};
use voxtutor_core::{Language, LessonRequest};

async fn null_backend(config: &str) -> Arc<dyn TutorBackend> {
    let registry = BackendRegistry::new();
    let value: toml::Value = toml::from_str(config).unwrap();
    Arc::from(registry.build("null", value).await.unwrap())
}

#[tokio::test]
async fn test_lesson_text_then_speech() {
    let backend = null_backend("").await;
    let request = LessonRequest {
        language: Language::English,
        unit_title: "Atomic Structure".to_string(),
        topic_title: "Quantum Numbers".to_string(),
        part: 2,
    };
    let text = backend.explain_lesson(&request).await;
    assert!(text.contains("Quantum Numbers"));

    let audio = backend.synthesize(&text, request.language).await.unwrap();
    let buffer = decode(&audio, PLAYBACK_SAMPLE_RATE).unwrap();
    assert!(!buffer.is_empty());
    assert!(buffer.duration() <= 3.0);
}

#[tokio::test]
async fn test_live_round_trip_through_trait_object() {
    let backend = null_backend("echo_every = 1\n").await;
    let mut conn = backend.connect_live(Language::Arabic).await.unwrap();
    let mut events = conn.take_event_receiver().unwrap();

    let first = tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .unwrap();
    assert_eq!(first, Some(LiveEvent::Opened));

    conn.send_realtime_input(encode(&[0.0; 4096])).unwrap();
    let reply = tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .unwrap();
    match reply {
        Some(LiveEvent::AudioChunk(chunk)) => {
            let buffer = decode(&chunk, PLAYBACK_SAMPLE_RATE).unwrap();
            assert_eq!(buffer.len(), 6000);
        }
        other => panic!("expected AudioChunk, got {other:?}"),
    }

    conn.shutdown().await;
    let last = tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .unwrap();
    assert_eq!(last, Some(LiveEvent::Closed));
}

#[tokio::test]
async fn test_dropping_connection_ends_null_session() {
    let backend = null_backend("").await;
    let mut conn = backend.connect_live(Language::English).await.unwrap();
    let mut events = conn.take_event_receiver().unwrap();
    drop(conn);

    // Opened, then Closed once the command channel is gone
    let mut seen = Vec::new();
    while let Ok(Some(event)) = tokio::time::timeout(Duration::from_secs(2), events.recv()).await {
        seen.push(event);
    }
    assert_eq!(seen, vec![LiveEvent::Opened, LiveEvent::Closed]);
}
