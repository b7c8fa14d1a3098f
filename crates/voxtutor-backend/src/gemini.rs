use crate::backend_trait::{LessonGenerator, LiveConnector, SpeechSynthesizer, TutorBackend};
use crate::live::{LiveCommand, LiveConnection, LiveEvent, LiveTransport};
use crate::prompt;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;
use voxtutor_audio::{pcm_mime_type, CAPTURE_SAMPLE_RATE};
use voxtutor_core::{
    BackendError, Diagram, EncodedAudioChunk, GeminiConfig, Language, LessonRequest,
    TransportError,
};

pub struct GeminiBackend {
    config: Option<GeminiConfig>,
    http: reqwest::Client,
}

impl GeminiBackend {
    pub fn new() -> Self {
        Self {
            config: None,
            http: reqwest::Client::new(),
        }
    }

    fn config(&self) -> Result<&GeminiConfig, BackendError> {
        self.config
            .as_ref()
            .ok_or_else(|| BackendError::InitializationFailed("gemini backend not initialized".to_string()))
    }

    async fn generate_content(&self, model: &str, body: Value) -> Result<Value, BackendError> {
        let cfg = self.config()?;
        let url = format!("{}/models/{}:generateContent", cfg.api_base, model);

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &cfg.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(BackendError::RequestFailed(format!("HTTP {status}: {text}")));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }

    async fn generate_text(&self, model: &str, input: String) -> Result<Option<String>, BackendError> {
        let response = self.generate_content(model, text_request(&input)).await?;
        Ok(response_text(&response))
    }
}

impl Default for GeminiBackend {
    fn default() -> Self {
        Self::new()
    }
}

// ── Request/response shapes ───────────────────────────────────

fn text_request(prompt: &str) -> Value {
    json!({ "contents": [{ "parts": [{ "text": prompt }] }] })
}

fn image_request(prompt: &str) -> Value {
    json!({
        "contents": [{ "parts": [{ "text": prompt }] }],
        "generationConfig": { "imageConfig": { "aspectRatio": "16:9" } }
    })
}

fn speech_request(instruction: &str, voice: &str) -> Value {
    json!({
        "contents": [{ "parts": [{ "text": instruction }] }],
        "generationConfig": {
            "responseModalities": ["AUDIO"],
            "speechConfig": {
                "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": voice } }
            }
        }
    })
}

fn first_candidate_parts(response: &Value) -> &[Value] {
    response
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .map(|p| p.as_slice())
        .unwrap_or(&[])
}

/// Concatenated text parts of the first candidate; `None` when there are none.
fn response_text(response: &Value) -> Option<String> {
    let text: String = first_candidate_parts(response)
        .iter()
        .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
        .collect();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// First inline blob of the first candidate.
fn response_inline_data(response: &Value) -> Option<&str> {
    first_candidate_parts(response)
        .iter()
        .find_map(|part| part.pointer("/inlineData/data").and_then(|d| d.as_str()))
}

fn live_setup_message(cfg: &GeminiConfig, language: Language) -> Value {
    json!({
        "setup": {
            "model": format!("models/{}", cfg.live_model),
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": cfg.live_voice } }
                }
            },
            "systemInstruction": {
                "parts": [{ "text": prompt::live_system_instruction(language) }]
            }
        }
    })
}

fn realtime_input_message(chunk: &EncodedAudioChunk) -> Value {
    json!({
        "realtimeInput": {
            "mediaChunks": [{
                "mimeType": pcm_mime_type(CAPTURE_SAMPLE_RATE),
                "data": chunk.as_str()
            }]
        }
    })
}

/// Translate one server message into live events, in arrival order.
pub fn parse_server_message(message: &Value) -> Vec<LiveEvent> {
    let mut events = Vec::new();

    if message.get("setupComplete").is_some() {
        events.push(LiveEvent::Opened);
    }

    if let Some(content) = message.get("serverContent") {
        let parts = content
            .pointer("/modelTurn/parts")
            .and_then(|p| p.as_array())
            .map(|p| p.as_slice())
            .unwrap_or(&[]);
        for part in parts {
            if let Some(data) = part.pointer("/inlineData/data").and_then(|d| d.as_str()) {
                events.push(LiveEvent::AudioChunk(EncodedAudioChunk::from(data)));
            } else if let Some(text) = part.get("text").and_then(|t| t.as_str()) {
                events.push(LiveEvent::Text(text.to_string()));
            }
        }
        if content
            .get("interrupted")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
        {
            events.push(LiveEvent::Interrupted);
        }
    }

    events
}

// ── Trait impls ───────────────────────────────────────────────

#[async_trait]
impl LessonGenerator for GeminiBackend {
    async fn explain_lesson(&self, request: &LessonRequest) -> String {
        let language = request.language;
        let model = match self.config() {
            Ok(cfg) => cfg.text_model.clone(),
            Err(e) => {
                tracing::error!("lesson generation failed: {e}");
                return prompt::lesson_failed(language).to_string();
            }
        };
        let p = prompt::lesson(language, &request.unit_title, &request.topic_title, request.part);
        match self.generate_text(&model, p).await {
            Ok(Some(text)) => text,
            Ok(None) => prompt::lesson_empty(language).to_string(),
            Err(e) => {
                tracing::error!("lesson generation failed: {e}");
                prompt::lesson_failed(language).to_string()
            }
        }
    }

    async fn generate_test(&self, language: Language, unit_title: &str, topic_title: &str) -> String {
        let model = match self.config() {
            Ok(cfg) => cfg.test_model.clone(),
            Err(e) => {
                tracing::error!("test generation failed: {e}");
                return prompt::test_failed(language).to_string();
            }
        };
        match self.generate_text(&model, prompt::test(language, unit_title, topic_title)).await {
            Ok(Some(text)) => text,
            Ok(None) => prompt::test_empty(language).to_string(),
            Err(e) => {
                tracing::error!("test generation failed: {e}");
                prompt::test_failed(language).to_string()
            }
        }
    }

    async fn generate_diagram(
        &self,
        language: Language,
        topic_title: &str,
    ) -> Result<Diagram, BackendError> {
        let cfg = self.config()?;

        let image = self
            .generate_content(&cfg.image_model, image_request(&prompt::diagram_image(topic_title)))
            .await?;
        let image_url = response_inline_data(&image)
            .map(|data| format!("data:image/png;base64,{data}"))
            .unwrap_or_default();

        let explanation = self
            .generate_text(&cfg.text_model, prompt::diagram_explanation(language, topic_title))
            .await?
            .unwrap_or_default();

        Ok(Diagram {
            image_url,
            explanation,
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for GeminiBackend {
    async fn synthesize(&self, text: &str, language: Language) -> Option<EncodedAudioChunk> {
        let cfg = match self.config() {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::error!("speech synthesis failed: {e}");
                return None;
            }
        };
        let body = speech_request(&prompt::speech(language, text), &cfg.tts_voice);
        match self.generate_content(&cfg.tts_model, body).await {
            Ok(response) => {
                let data = response
                    .pointer("/candidates/0/content/parts/0/inlineData/data")
                    .and_then(|d| d.as_str())
                    .map(EncodedAudioChunk::from);
                if data.is_none() {
                    tracing::warn!("speech response carried no audio");
                }
                data
            }
            Err(e) => {
                tracing::error!("speech synthesis failed: {e}");
                None
            }
        }
    }
}

#[async_trait]
impl LiveConnector for GeminiBackend {
    async fn connect_live(&self, language: Language) -> Result<LiveConnection, TransportError> {
        let cfg = self
            .config()
            .map_err(|e| TransportError::Connection(e.to_string()))?;
        let url = format!("{}?key={}", cfg.live_url, cfg.api_key);

        let (ws, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;
        let (mut sink, stream) = ws.split();

        sink.send(Message::Text(live_setup_message(cfg, language).to_string()))
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;
        tracing::info!(model = %cfg.live_model, language = language.code(), "live setup sent");

        let (connection, transport) = LiveConnection::pair();
        let task = tokio::spawn(run_live_socket(sink, stream, transport));
        Ok(connection.with_task(task))
    }
}

async fn run_live_socket<S, R>(mut sink: S, mut stream: R, mut transport: LiveTransport)
where
    S: futures_util::Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
    R: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        tokio::select! {
            command = transport.commands.recv() => {
                match command {
                    Some(LiveCommand::Audio(chunk)) => {
                        let msg = Message::Text(realtime_input_message(&chunk).to_string());
                        if let Err(e) = sink.send(msg).await {
                            tracing::error!("live send failed: {e}");
                            transport.emit(LiveEvent::Error(TransportError::Connection(e.to_string())));
                            break;
                        }
                    }
                    Some(LiveCommand::Close) | None => {
                        let _ = sink.send(Message::Close(None)).await;
                        transport.emit(LiveEvent::Closed);
                        break;
                    }
                }
            }
            message = stream.next() => {
                let value = match message {
                    Some(Ok(Message::Text(text))) => serde_json::from_str::<Value>(&text),
                    Some(Ok(Message::Binary(bytes))) => serde_json::from_slice::<Value>(&bytes),
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::info!("live socket closed by server");
                        transport.emit(LiveEvent::Closed);
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        tracing::error!("live socket error: {e}");
                        transport.emit(LiveEvent::Error(TransportError::Connection(e.to_string())));
                        break;
                    }
                };
                match value {
                    Ok(value) => {
                        for event in parse_server_message(&value) {
                            transport.emit(event);
                        }
                    }
                    Err(e) => tracing::warn!("unparseable live message: {e}"),
                }
            }
        }
    }
}

#[async_trait]
impl TutorBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn initialize(&mut self, config: toml::Value) -> Result<(), BackendError> {
        let cfg: GeminiConfig = config
            .try_into()
            .map_err(|e: toml::de::Error| BackendError::InitializationFailed(e.to_string()))?;
        if cfg.api_key.trim().is_empty() {
            return Err(BackendError::InitializationFailed(
                "missing 'api_key' in config".to_string(),
            ));
        }
        tracing::info!(text_model = %cfg.text_model, tts_model = %cfg.tts_model, "GeminiBackend initialized");
        self.config = Some(cfg);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_table(s: &str) -> toml::Value {
        toml::from_str(s).unwrap()
    }

    #[tokio::test]
    async fn test_initialize_requires_api_key() {
        let mut backend = GeminiBackend::new();
        let result = backend.initialize(init_table("api_key = \"\"\n")).await;
        assert!(matches!(result, Err(BackendError::InitializationFailed(_))));

        let result = backend.initialize(init_table("text_model = \"x\"\n")).await;
        assert!(matches!(result, Err(BackendError::InitializationFailed(_))));
    }

    #[tokio::test]
    async fn test_initialize_applies_defaults() {
        let mut backend = GeminiBackend::new();
        backend.initialize(init_table("api_key = \"k\"\n")).await.unwrap();
        let cfg = backend.config().unwrap();
        assert_eq!(cfg.tts_voice, "Kore");
        assert_eq!(cfg.live_voice, "Zephyr");
        assert_eq!(cfg.tts_model, "gemini-2.5-flash-preview-tts");
    }

    #[tokio::test]
    async fn test_uninitialized_backend_degrades() {
        let backend = GeminiBackend::new();
        let request = LessonRequest {
            language: Language::English,
            unit_title: "u".to_string(),
            topic_title: "t".to_string(),
            part: 1,
        };
        assert_eq!(
            backend.explain_lesson(&request).await,
            prompt::lesson_failed(Language::English)
        );
        assert_eq!(
            backend.generate_test(Language::Arabic, "u", "t").await,
            prompt::test_failed(Language::Arabic)
        );
        assert!(backend.synthesize("hi", Language::English).await.is_none());
        assert!(backend.generate_diagram(Language::English, "t").await.is_err());
        assert!(matches!(
            backend.connect_live(Language::English).await,
            Err(TransportError::Connection(_))
        ));
    }

    #[test]
    fn test_response_text_concatenates_parts() {
        let response = json!({
            "candidates": [{ "content": { "parts": [{ "text": "Hello " }, { "text": "world" }] } }]
        });
        assert_eq!(response_text(&response), Some("Hello world".to_string()));
        assert_eq!(response_text(&json!({ "candidates": [] })), None);
    }

    #[test]
    fn test_response_inline_data_finds_blob() {
        let response = json!({
            "candidates": [{ "content": { "parts": [
                { "text": "caption" },
                { "inlineData": { "mimeType": "image/png", "data": "iVBOR" } }
            ] } }]
        });
        assert_eq!(response_inline_data(&response), Some("iVBOR"));
    }

    #[test]
    fn test_speech_request_shape() {
        let body = speech_request("say hi", "Kore");
        assert_eq!(
            body.pointer("/generationConfig/speechConfig/voiceConfig/prebuiltVoiceConfig/voiceName"),
            Some(&json!("Kore"))
        );
        assert_eq!(body.pointer("/contents/0/parts/0/text"), Some(&json!("say hi")));
    }

    #[test]
    fn test_realtime_input_uses_capture_mime() {
        let msg = realtime_input_message(&EncodedAudioChunk::from("AEAAwA=="));
        assert_eq!(
            msg.pointer("/realtimeInput/mediaChunks/0/mimeType"),
            Some(&json!("audio/pcm;rate=16000"))
        );
        assert_eq!(
            msg.pointer("/realtimeInput/mediaChunks/0/data"),
            Some(&json!("AEAAwA=="))
        );
    }

    #[test]
    fn test_setup_message_names_model_and_voice() {
        let cfg: GeminiConfig = init_table("api_key = \"k\"\n").try_into().unwrap();
        let msg = live_setup_message(&cfg, Language::English);
        assert_eq!(
            msg.pointer("/setup/model"),
            Some(&json!("models/gemini-2.5-flash-native-audio-preview-09-2025"))
        );
        assert_eq!(
            msg.pointer("/setup/generationConfig/speechConfig/voiceConfig/prebuiltVoiceConfig/voiceName"),
            Some(&json!("Zephyr"))
        );
    }

    #[test]
    fn test_parse_setup_complete() {
        assert_eq!(
            parse_server_message(&json!({ "setupComplete": {} })),
            vec![LiveEvent::Opened]
        );
    }

    #[test]
    fn test_parse_audio_then_interrupted() {
        let msg = json!({
            "serverContent": {
                "modelTurn": { "parts": [
                    { "inlineData": { "mimeType": "audio/pcm;rate=24000", "data": "AEAAwA==" } },
                    { "text": "hi" }
                ] },
                "interrupted": true
            }
        });
        assert_eq!(
            parse_server_message(&msg),
            vec![
                LiveEvent::AudioChunk(EncodedAudioChunk::from("AEAAwA==")),
                LiveEvent::Text("hi".to_string()),
                LiveEvent::Interrupted,
            ]
        );
    }

    #[test]
    fn test_parse_ignores_unrelated_messages() {
        assert!(parse_server_message(&json!({ "serverContent": { "turnComplete": true } })).is_empty());
        assert!(parse_server_message(&json!({ "goAway": {} })).is_empty());
        assert!(parse_server_message(&json!({ "serverContent": { "interrupted": false } })).is_empty());
    }
}
