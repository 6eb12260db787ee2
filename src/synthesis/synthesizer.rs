use super::{
    result::{SynthesisEvent, SynthesisEventSender},
    AudioPayload, AudioStream, CartesiaApi, CartesiaClient, GenerateRequest, Result,
    SynthesisError, SynthesisResult, SynthesizerConfig, TextMessage, VoiceEmbedding,
    FILLER_AUDIO_EXTENSION, SYNTHESIZER_TYPE,
};
use crate::media::cache::MediaCache;
use bytes::Bytes;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::{select, sync::mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[cfg(not(target_os = "windows"))]
pub const DEFAULT_FILLER_AUDIO_PATH: &str = "/tmp/filler_audio";
#[cfg(target_os = "windows")]
pub const DEFAULT_FILLER_AUDIO_PATH: &str = "./filler_audio";

/// Streams speech for text messages from the Cartesia API.
///
/// Construction resolves the output format and the voice embedding, so a
/// `CartesiaSynthesizer` that exists is always ready to synthesize.
pub struct CartesiaSynthesizer {
    pub(super) config: SynthesizerConfig,
    client: Arc<dyn CartesiaApi>,
    voice: VoiceEmbedding,
    total_chars: AtomicUsize,
    cancel_token: CancellationToken,
    pub(super) filler_cache: MediaCache,
}

impl CartesiaSynthesizer {
    pub async fn new(mut config: SynthesizerConfig, client: Arc<dyn CartesiaApi>) -> Result<Self> {
        config.output_format = config.resolved_output_format();

        let voice_id = match config.voice_id {
            Some(ref voice_id) => voice_id.clone(),
            None => Self::lookup_voice_id(client.as_ref(), &config.voice_name).await?,
        };
        let voice = client.get_voice_embedding(&voice_id).await?;
        info!(
            "cartesia: resolved voice '{}' -> {} ({} dims), output format {}",
            config.voice_label(),
            voice_id,
            voice.0.len(),
            config.output_format
        );

        Ok(Self {
            config,
            client,
            voice,
            total_chars: AtomicUsize::new(0),
            cancel_token: CancellationToken::new(),
            filler_cache: MediaCache::new(DEFAULT_FILLER_AUDIO_PATH, FILLER_AUDIO_EXTENSION),
        })
    }

    async fn lookup_voice_id(client: &dyn CartesiaApi, voice_name: &str) -> Result<String> {
        let voices = client.get_voices().await?;
        match voices.get(voice_name) {
            Some(voice) => Ok(voice.id.clone()),
            None => {
                let mut available: Vec<&str> = voices.keys().map(String::as_str).collect();
                available.sort_unstable();
                Err(SynthesisError::VoiceNotFound {
                    name: voice_name.to_string(),
                    available: available.join(", "),
                })
            }
        }
    }

    /// Build the HTTP client from `config` and resolve the voice.
    pub async fn from_config(config: SynthesizerConfig) -> Result<Self> {
        let client = CartesiaClient::from_config(&config)?;
        Self::new(config, Arc::new(client)).await
    }

    pub fn with_cancel_token(mut self, cancel_token: CancellationToken) -> Self {
        self.cancel_token = cancel_token;
        self
    }

    pub fn with_filler_audio_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.filler_cache = MediaCache::new(path, FILLER_AUDIO_EXTENSION);
        self
    }

    /// Configuration with the output format already resolved.
    pub fn config(&self) -> &SynthesizerConfig {
        &self.config
    }

    pub fn voice(&self) -> &VoiceEmbedding {
        &self.voice
    }

    pub fn total_chars(&self) -> usize {
        self.total_chars.load(Ordering::Relaxed)
    }

    /// Cancels every request started by this synthesizer.
    pub fn cancel_all(&self) {
        self.cancel_token.cancel();
    }

    /// Cache key for these synthesis parameters. Pure, no network access.
    pub fn get_voice_identifier(config: &SynthesizerConfig) -> String {
        [
            SYNTHESIZER_TYPE,
            config.model_id.as_str(),
            config.audio_encoding.as_str(),
            config.resolved_output_format().as_str(),
        ]
        .join(":")
    }

    fn generate_request(&self, text: &str) -> GenerateRequest {
        GenerateRequest {
            transcript: text.to_string(),
            voice: self.voice.clone(),
            model_id: self.config.model_id.clone(),
            data_rtype: self.config.data_rtype,
            output_format: self.config.output_format,
        }
    }

    /// Start streaming speech for `message`.
    ///
    /// Audio is pulled from the remote stream by a spawned task and handed to
    /// the returned [`SynthesisResult`] over an unbounded channel. Cancelling
    /// the result (or the synthesizer) stops the task; the chunk stream then
    /// ends with its usual end marker and [`SynthesisResult::was_cancelled`]
    /// reports it. Dropping the result stops the task at its next send.
    pub async fn create_speech_uncached(
        &self,
        message: &TextMessage,
        chunk_size: usize,
        is_first_text_chunk: bool,
        is_sole_text_chunk: bool,
    ) -> Result<SynthesisResult> {
        let chars = message.text.chars().count();
        self.total_chars.fetch_add(chars, Ordering::Relaxed);
        debug!(
            "cartesia: synthesizing {} chars, chunk_size: {}, first: {}, sole: {}",
            chars,
            chunk_size,
            is_first_text_chunk,
            is_sole_text_chunk
        );

        let token = self.cancel_token.child_token();
        let (tx, rx) = mpsc::unbounded_channel();
        let request = self.generate_request(&message.text);

        let opened = select! {
            biased;
            _ = token.cancelled() => None,
            stream = self.client.generate_stream(request) => Some(stream),
        };
        match opened {
            Some(stream) => {
                tokio::spawn(forward_chunks(stream?, tx, token.clone()));
            }
            None => {
                debug!("cartesia: cancelled before the stream opened");
                tx.send(SynthesisEvent::Finished { cancelled: true }).ok();
            }
        }
        Ok(SynthesisResult::new(rx, token, &message.text))
    }

    /// One non-streaming synthesis call, returning raw audio and its
    /// sample rate.
    pub async fn create_audio(&self, text: &str) -> Result<(Bytes, u32)> {
        let generated = self.client.generate(self.generate_request(text)).await?;
        match generated.audio {
            AudioPayload::Bytes(audio) => Ok((audio, generated.sampling_rate)),
            other => Err(SynthesisError::InvalidAudioPayload(other.kind())),
        }
    }
}

async fn forward_chunks(
    mut stream: AudioStream,
    tx: SynthesisEventSender,
    token: CancellationToken,
) {
    let mut chunks = 0usize;
    let cancelled = loop {
        let item = select! {
            biased;
            _ = token.cancelled() => break true,
            item = stream.next() => item,
        };
        match item {
            Some(Ok(payload)) => {
                chunks += 1;
                if tx.send(SynthesisEvent::AudioChunk(payload.into_bytes())).is_err() {
                    debug!("cartesia: consumer dropped after {} chunks", chunks);
                    return;
                }
            }
            Some(Err(e)) => {
                warn!("cartesia: stream failed after {} chunks: {}", chunks, e);
                if tx.send(SynthesisEvent::Failed(e)).is_err() {
                    return;
                }
                break false;
            }
            None => break false,
        }
    };
    if cancelled {
        info!("cartesia: synthesis cancelled after {} chunks", chunks);
    } else {
        debug!("cartesia: synthesis finished, {} chunks", chunks);
    }
    tx.send(SynthesisEvent::Finished { cancelled }).ok();
}
