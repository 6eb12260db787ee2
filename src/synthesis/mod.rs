use crate::media::codecs::CodecType;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

mod cartesia;
mod error;
mod filler;
mod result;
mod synthesizer;

pub use cartesia::CartesiaClient;
pub use error::{Result, SynthesisError};
pub use filler::{FillerAudio, FILLER_AUDIO_EXTENSION, FILLER_PHRASES};
pub use result::{get_message_cutoff_from_voice_speed, ChunkResult, SynthesisResult, WORDS_PER_MINUTE};
pub use synthesizer::{CartesiaSynthesizer, DEFAULT_FILLER_AUDIO_PATH};

pub const SYNTHESIZER_TYPE: &str = "synthesizer_cartesia";
pub const CARTESIA_DEFAULT_VOICE: &str = "Barbershop Man";
pub const CARTESIA_DEFAULT_MODEL_ID: &str = "upbeat-moon";
pub const CARTESIA_DEFAULT_BASE_URL: &str = "https://api.cartesia.ai";
pub const CARTESIA_API_VERSION: &str = "2024-06-10";
pub const CARTESIA_API_KEY_ENV: &str = "CARTESIA_API_KEY";

/// Encoding the audio sink downstream of the synthesizer expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioEncoding {
    #[default]
    Linear16,
    Mulaw,
}

impl AudioEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioEncoding::Linear16 => "linear16",
            AudioEncoding::Mulaw => "mulaw",
        }
    }

    /// The format the provider must produce for a sink expecting this encoding.
    pub fn output_format(&self) -> AudioOutputFormat {
        match self {
            AudioEncoding::Mulaw => AudioOutputFormat::Mulaw8k,
            AudioEncoding::Linear16 => AudioOutputFormat::Pcm,
        }
    }
}

impl fmt::Display for AudioEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw output formats understood by the Cartesia API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AudioOutputFormat {
    #[serde(rename = "fp32")]
    Fp32,
    #[serde(rename = "fp32_16000")]
    Fp32At16k,
    #[serde(rename = "fp32_22050")]
    Fp32At22k,
    #[serde(rename = "fp32_44100")]
    Fp32At44k,
    #[default]
    #[serde(rename = "pcm")]
    Pcm,
    #[serde(rename = "pcm_16000")]
    PcmAt16k,
    #[serde(rename = "pcm_22050")]
    PcmAt22k,
    #[serde(rename = "pcm_44100")]
    PcmAt44k,
    #[serde(rename = "mulaw_8000")]
    Mulaw8k,
    #[serde(rename = "alaw_8000")]
    Alaw8k,
}

impl AudioOutputFormat {
    pub const ALL: [AudioOutputFormat; 10] = [
        AudioOutputFormat::Fp32,
        AudioOutputFormat::Fp32At16k,
        AudioOutputFormat::Fp32At22k,
        AudioOutputFormat::Fp32At44k,
        AudioOutputFormat::Pcm,
        AudioOutputFormat::PcmAt16k,
        AudioOutputFormat::PcmAt22k,
        AudioOutputFormat::PcmAt44k,
        AudioOutputFormat::Mulaw8k,
        AudioOutputFormat::Alaw8k,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AudioOutputFormat::Fp32 => "fp32",
            AudioOutputFormat::Fp32At16k => "fp32_16000",
            AudioOutputFormat::Fp32At22k => "fp32_22050",
            AudioOutputFormat::Fp32At44k => "fp32_44100",
            AudioOutputFormat::Pcm => "pcm",
            AudioOutputFormat::PcmAt16k => "pcm_16000",
            AudioOutputFormat::PcmAt22k => "pcm_22050",
            AudioOutputFormat::PcmAt44k => "pcm_44100",
            AudioOutputFormat::Mulaw8k => "mulaw_8000",
            AudioOutputFormat::Alaw8k => "alaw_8000",
        }
    }

    pub fn sample_rate(&self) -> u32 {
        match self {
            AudioOutputFormat::Fp32At16k | AudioOutputFormat::PcmAt16k => 16000,
            AudioOutputFormat::Fp32At22k | AudioOutputFormat::PcmAt22k => 22050,
            AudioOutputFormat::Fp32
            | AudioOutputFormat::Fp32At44k
            | AudioOutputFormat::Pcm
            | AudioOutputFormat::PcmAt44k => 44100,
            AudioOutputFormat::Mulaw8k | AudioOutputFormat::Alaw8k => 8000,
        }
    }

    pub fn codec(&self) -> CodecType {
        match self {
            AudioOutputFormat::Fp32
            | AudioOutputFormat::Fp32At16k
            | AudioOutputFormat::Fp32At22k
            | AudioOutputFormat::Fp32At44k => CodecType::PcmF32le,
            AudioOutputFormat::Pcm
            | AudioOutputFormat::PcmAt16k
            | AudioOutputFormat::PcmAt22k
            | AudioOutputFormat::PcmAt44k => CodecType::PcmS16le,
            AudioOutputFormat::Mulaw8k => CodecType::PCMU,
            AudioOutputFormat::Alaw8k => CodecType::PCMA,
        }
    }
}

impl fmt::Display for AudioOutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudioOutputFormat {
    type Err = SynthesisError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        AudioOutputFormat::ALL
            .iter()
            .copied()
            .find(|format| format.as_str() == s)
            .ok_or_else(|| SynthesisError::UnknownOutputFormat(s.to_string()))
    }
}

/// Shape in which the remote service hands back audio payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataRepresentation {
    #[default]
    Bytes,
    Array,
    Base64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesizerConfig {
    pub voice_name: String,
    /// Voice id used as is, skipping the voice directory lookup by name.
    pub voice_id: Option<String>,
    pub output_format: AudioOutputFormat,
    pub data_rtype: DataRepresentation,
    pub model_id: String,
    pub api_key: Option<String>,
    pub sampling_rate: u32,
    pub audio_encoding: AudioEncoding,
    pub base_url: String,
    pub api_version: String,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            voice_name: CARTESIA_DEFAULT_VOICE.to_string(),
            voice_id: None,
            output_format: AudioOutputFormat::default(),
            data_rtype: DataRepresentation::default(),
            model_id: CARTESIA_DEFAULT_MODEL_ID.to_string(),
            api_key: None,
            sampling_rate: 16000,
            audio_encoding: AudioEncoding::default(),
            base_url: CARTESIA_DEFAULT_BASE_URL.to_string(),
            api_version: CARTESIA_API_VERSION.to_string(),
        }
    }
}

impl SynthesizerConfig {
    /// The requested encoding decides the format; `output_format` is
    /// overwritten at construction.
    pub fn resolved_output_format(&self) -> AudioOutputFormat {
        self.audio_encoding.output_format()
    }

    /// Voice id when configured, otherwise the voice name.
    pub fn voice_label(&self) -> &str {
        self.voice_id.as_deref().unwrap_or(&self.voice_name)
    }

    /// Configured key, falling back to `CARTESIA_API_KEY`.
    pub fn api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.is_empty())
            .or_else(|| std::env::var(CARTESIA_API_KEY_ENV).ok())
            .filter(|key| !key.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextMessage {
    pub text: String,
}

impl TextMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl From<&str> for TextMessage {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Opaque speaker embedding used by the remote model.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoiceEmbedding(pub Vec<f32>);

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub transcript: String,
    pub voice: VoiceEmbedding,
    pub model_id: String,
    pub data_rtype: DataRepresentation,
    pub output_format: AudioOutputFormat,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AudioPayload {
    Bytes(Bytes),
    Array(Vec<f32>),
    Base64(String),
}

impl AudioPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            AudioPayload::Bytes(_) => "bytes",
            AudioPayload::Array(_) => "array",
            AudioPayload::Base64(_) => "base64",
        }
    }

    /// Flattens the payload to bytes. Arrays become little-endian f32.
    pub fn into_bytes(self) -> Bytes {
        match self {
            AudioPayload::Bytes(bytes) => bytes,
            AudioPayload::Array(samples) => samples
                .iter()
                .flat_map(|sample| sample.to_le_bytes())
                .collect::<Vec<u8>>()
                .into(),
            AudioPayload::Base64(text) => Bytes::from(text),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeneratedAudio {
    pub audio: AudioPayload,
    pub sampling_rate: u32,
}

pub type AudioStream = BoxStream<'static, Result<AudioPayload>>;

/// The remote text-to-speech service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CartesiaApi: Send + Sync {
    /// Voice directory keyed by human readable name.
    async fn get_voices(&self) -> Result<HashMap<String, VoiceInfo>>;

    async fn get_voice_embedding(&self, voice_id: &str) -> Result<VoiceEmbedding>;

    async fn generate(&self, request: GenerateRequest) -> Result<GeneratedAudio>;

    async fn generate_stream(&self, request: GenerateRequest) -> Result<AudioStream>;
}
