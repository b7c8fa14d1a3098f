use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Malformed transport payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("invalid base64 payload: {0}")]
    InvalidBase64(String),

    #[error("PCM payload has odd byte length: {0}")]
    OddByteLength(usize),
}

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("failed to enumerate devices: {0}")]
    DeviceEnumeration(String),

    #[error("failed to build stream: {0}")]
    StreamBuild(String),

    #[error("stream error: {0}")]
    StreamError(String),

    #[error("sample rate mismatch: buffer is {buffer} Hz, output runs at {output} Hz")]
    SampleRateMismatch { buffer: u32, output: u32 },

    #[error("voice queue is full")]
    QueueFull,

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend initialization failed: {0}")]
    InitializationFailed(String),

    #[error("backend not found: {0}")]
    NotFound(String),

    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("unexpected response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Microphone or live-connection failure. Never retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("microphone unavailable: {0}")]
    Microphone(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("connection closed")]
    Closed,
}
