use thiserror::Error;

#[derive(Error, Debug)]
pub enum SynthesisError {
    #[error("voice not found: '{name}', available voices: {available}")]
    VoiceNotFound { name: String, available: String },

    /// The remote response carried something other than raw audio bytes.
    #[error("expected raw audio bytes from Cartesia, got {0} payload")]
    InvalidAudioPayload(&'static str),

    #[error("unknown Cartesia output format: {0}")]
    UnknownOutputFormat(String),

    #[error("missing Cartesia API key, set {0} or synthesizer.api_key")]
    MissingApiKey(&'static str),

    #[error("Cartesia API error, status: {status}, message: {message}")]
    Api { status: u16, message: String },

    #[error("Cartesia stream error: {0}")]
    Stream(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Base64(#[from] base64::DecodeError),

    #[error(transparent)]
    Wav(#[from] hound::Error),
}

pub type Result<T, E = SynthesisError> = std::result::Result<T, E>;
