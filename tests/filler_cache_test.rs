use async_trait::async_trait;
use bytes::Bytes;
use cartesia_synth::media::{cache::MediaCache, wav};
use cartesia_synth::synthesis::{
    AudioEncoding, AudioPayload, AudioStream, CartesiaApi, CartesiaSynthesizer, ChunkResult,
    GenerateRequest, GeneratedAudio, Result, SynthesizerConfig, TextMessage, VoiceEmbedding, VoiceInfo,
    FILLER_AUDIO_EXTENSION, FILLER_PHRASES,
};
use futures::{stream, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Renders each transcript as one sample per character.
#[derive(Default)]
struct EchoCartesia {
    generate_calls: AtomicUsize,
}

#[async_trait]
impl CartesiaApi for EchoCartesia {
    async fn get_voices(&self) -> Result<HashMap<String, VoiceInfo>> {
        Ok(HashMap::from([(
            "Barbershop Man".to_string(),
            VoiceInfo {
                id: "voice-1".to_string(),
                name: "Barbershop Man".to_string(),
                description: Some("warm".to_string()),
            },
        )]))
    }

    async fn get_voice_embedding(&self, _voice_id: &str) -> Result<VoiceEmbedding> {
        Ok(VoiceEmbedding(vec![0.5; 4]))
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GeneratedAudio> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        let audio: Vec<u8> = request
            .transcript
            .chars()
            .flat_map(|c| (c as i16).to_le_bytes())
            .collect();
        Ok(GeneratedAudio {
            audio: AudioPayload::Bytes(Bytes::from(audio)),
            sampling_rate: request.output_format.sample_rate(),
        })
    }

    async fn generate_stream(&self, request: GenerateRequest) -> Result<AudioStream> {
        let chunks: Vec<Result<AudioPayload>> = request
            .transcript
            .split_whitespace()
            .map(|word| Ok(AudioPayload::Bytes(Bytes::from(word.to_string()))))
            .collect();
        Ok(stream::iter(chunks).boxed())
    }
}

async fn build(dir: &std::path::Path) -> (CartesiaSynthesizer, Arc<EchoCartesia>) {
    let client = Arc::new(EchoCartesia::default());
    let config = SynthesizerConfig {
        api_key: Some("key".to_string()),
        ..Default::default()
    };
    let synthesizer = CartesiaSynthesizer::new(config, client.clone())
        .await
        .unwrap()
        .with_filler_audio_path(dir);
    (synthesizer, client)
}

#[tokio::test]
async fn test_filler_cache_survives_restart() {
    let dir = tempfile::tempdir().unwrap();

    let (first, client) = build(dir.path()).await;
    let rendered = first.get_phrase_filler_audios().await.unwrap();
    assert_eq!(client.generate_calls.load(Ordering::SeqCst), FILLER_PHRASES.len());
    drop(first);

    // a fresh synthesizer with the same settings reads everything from disk
    let (second, client) = build(dir.path()).await;
    let cached = second.get_phrase_filler_audios().await.unwrap();
    assert_eq!(client.generate_calls.load(Ordering::SeqCst), 0);

    for ((a, b), phrase) in rendered.iter().zip(&cached).zip(FILLER_PHRASES) {
        assert_eq!(a.audio_data, b.audio_data);
        assert_eq!(b.message, TextMessage::new(*phrase));
        let (samples, rate) = wav::decode_wav(&b.audio_data).unwrap();
        assert_eq!(rate, 44100);
        assert_eq!(samples.len(), phrase.chars().count());
        assert!(b.seconds > 0.0);
    }

    let cache = MediaCache::new(dir.path(), FILLER_AUDIO_EXTENSION);
    let mut files = std::fs::read_dir(cache.cache_dir())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect::<Vec<_>>();
    files.sort();
    assert_eq!(files.len(), FILLER_PHRASES.len());
    assert!(files
        .iter()
        .all(|p| p.extension().and_then(|e| e.to_str()) == Some(FILLER_AUDIO_EXTENSION)));
}

#[tokio::test]
async fn test_encoding_change_uses_separate_cache_entries() {
    let dir = tempfile::tempdir().unwrap();
    let (linear, linear_client) = build(dir.path()).await;
    linear.get_phrase_filler_audios().await.unwrap();

    let client = Arc::new(EchoCartesia::default());
    let config = SynthesizerConfig {
        api_key: Some("key".to_string()),
        audio_encoding: AudioEncoding::Mulaw,
        ..Default::default()
    };
    let mulaw = CartesiaSynthesizer::new(config, client.clone())
        .await
        .unwrap()
        .with_filler_audio_path(dir.path());
    let fillers = mulaw.get_phrase_filler_audios().await.unwrap();

    assert_eq!(linear_client.generate_calls.load(Ordering::SeqCst), FILLER_PHRASES.len());
    assert_eq!(client.generate_calls.load(Ordering::SeqCst), FILLER_PHRASES.len());
    let (_, rate) = wav::decode_wav(&fillers[0].audio_data).unwrap();
    assert_eq!(rate, 8000);
}

#[tokio::test]
async fn test_streamed_speech_through_public_api() {
    let dir = tempfile::tempdir().unwrap();
    let (synthesizer, _) = build(dir.path()).await;

    let mut result = synthesizer
        .create_speech_uncached(&"one two three".into(), 4096, true, true)
        .await
        .unwrap();
    let chunks: Vec<_> = result
        .chunk_stream()
        .unwrap()
        .map(|item| item.unwrap())
        .collect()
        .await;

    let words: Vec<_> = chunks
        .iter()
        .filter(|c| !c.is_last_chunk)
        .map(|c| String::from_utf8(c.chunk.to_vec()).unwrap())
        .collect();
    assert_eq!(words, vec!["one", "two", "three"]);
    assert_eq!(
        chunks.iter().filter(|c| c.is_last_chunk).count(),
        1,
        "exactly one chunk is flagged last"
    );
    assert_eq!(chunks.last(), Some(&ChunkResult::end_of_stream()));
    assert!(!result.was_cancelled());
    assert_eq!(result.get_message_up_to(1.0), "one two");
    assert_eq!(synthesizer.total_chars(), 13);
}
