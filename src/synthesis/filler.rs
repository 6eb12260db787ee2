use super::{CartesiaSynthesizer, Result, SynthesizerConfig, TextMessage};
use crate::media::{
    cache::{generate_cache_key, MediaCache},
    codecs::decode_raw_audio,
    wav,
};
use bytes::Bytes;
use tracing::{debug, info, warn};

/// Short utterances played to cover response latency.
pub const FILLER_PHRASES: &[&str] = &[
    "Um...",
    "Uh...",
    "Uh-huh...",
    "Mm-hmm...",
    "Hmm...",
    "Okay...",
    "Right...",
    "Let me see...",
];

pub const FILLER_AUDIO_EXTENSION: &str = "wav";

/// Pre-rendered filler phrase, WAV encoded.
#[derive(Debug, Clone)]
pub struct FillerAudio {
    pub message: TextMessage,
    pub audio_data: Bytes,
    pub synthesizer_config: SynthesizerConfig,
    pub is_interruptible: bool,
    pub seconds: f64,
}

impl FillerAudio {
    fn new(message: TextMessage, audio_data: Bytes, synthesizer_config: SynthesizerConfig) -> Self {
        let seconds = wav::wav_duration_seconds(&audio_data).unwrap_or_else(|e| {
            warn!("filler: unreadable audio for '{}': {}", message.text, e);
            0.0
        });
        Self {
            message,
            audio_data,
            synthesizer_config,
            is_interruptible: false,
            seconds,
        }
    }
}

impl CartesiaSynthesizer {
    pub fn filler_cache(&self) -> &MediaCache {
        &self.filler_cache
    }

    pub fn filler_cache_key(&self, phrase: &str) -> String {
        let sample_rate = self.config.sampling_rate.to_string();
        generate_cache_key(&[
            phrase,
            self.config.output_format.as_str(),
            self.config.audio_encoding.as_str(),
            &sample_rate,
            &self.config.model_id,
            self.config.voice_label(),
        ])
    }

    /// Audio for every filler phrase, read from disk when cached and
    /// synthesized then stored otherwise. Cached files are never refreshed.
    pub async fn get_phrase_filler_audios(&self) -> Result<Vec<FillerAudio>> {
        let mut filler_audios = Vec::with_capacity(FILLER_PHRASES.len());
        for phrase in FILLER_PHRASES {
            let key = self.filler_cache_key(phrase);
            let audio_data = match self.filler_cache.retrieve_from_cache(&key).await? {
                Some(data) => {
                    debug!("filler: cache hit for '{}'", phrase);
                    Bytes::from(data)
                }
                None => {
                    let data = self.render_filler(phrase).await?;
                    self.filler_cache.store_in_cache(&key, &data).await?;
                    data
                }
            };
            filler_audios.push(FillerAudio::new(
                TextMessage::new(*phrase),
                audio_data,
                self.config.clone(),
            ));
        }
        Ok(filler_audios)
    }

    /// Remove cached filler audio for the current configuration.
    pub async fn clear_filler_cache(&self) -> Result<()> {
        for phrase in FILLER_PHRASES {
            self.filler_cache
                .delete_from_cache(&self.filler_cache_key(phrase))
                .await?;
        }
        Ok(())
    }

    async fn render_filler(&self, phrase: &str) -> Result<Bytes> {
        let (raw, sample_rate) = self.create_audio(phrase).await?;
        let samples = decode_raw_audio(&raw, self.config.output_format.codec());
        let data = wav::encode_wav(&samples, sample_rate)?;
        info!(
            "filler: rendered '{}' -> {} samples at {}Hz",
            phrase,
            samples.len(),
            sample_rate
        );
        Ok(Bytes::from(data))
    }
}
