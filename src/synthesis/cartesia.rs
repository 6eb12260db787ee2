use super::{
    AudioOutputFormat, AudioPayload, AudioStream, CartesiaApi, DataRepresentation,
    GenerateRequest, GeneratedAudio, Result, SynthesisError, SynthesizerConfig, VoiceEmbedding,
    VoiceInfo, CARTESIA_API_KEY_ENV,
};
use crate::media::codecs::{bytes_to_f32, decode_raw_audio, samples_to_f32, CodecType};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use futures::{stream, Stream, StreamExt};
use reqwest::{header::ACCEPT, Client as HttpClient, Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::debug;
use url::Url;

// https://docs.cartesia.ai/api-reference/tts/bytes
#[derive(Debug, Serialize)]
struct TtsRequest<'a> {
    model_id: &'a str,
    transcript: &'a str,
    voice: TtsVoice<'a>,
    output_format: TtsOutputFormat,
}

#[derive(Debug, Serialize)]
struct TtsVoice<'a> {
    mode: &'static str,
    embedding: &'a [f32],
}

#[derive(Debug, Serialize)]
struct TtsOutputFormat {
    container: &'static str,
    encoding: &'static str,
    sample_rate: u32,
}

impl<'a> TtsRequest<'a> {
    fn new(request: &'a GenerateRequest) -> Self {
        Self {
            model_id: &request.model_id,
            transcript: &request.transcript,
            voice: TtsVoice {
                mode: "embedding",
                embedding: &request.voice.0,
            },
            output_format: TtsOutputFormat {
                container: "raw",
                encoding: wire_encoding(request.output_format.codec()),
                sample_rate: request.output_format.sample_rate(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct SseEvent {
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

fn wire_encoding(codec: CodecType) -> &'static str {
    match codec {
        CodecType::PcmS16le => "pcm_s16le",
        CodecType::PcmF32le => "pcm_f32le",
        CodecType::PCMU => "pcm_mulaw",
        CodecType::PCMA => "pcm_alaw",
    }
}

/// Shape raw audio into the payload the caller asked for.
pub(crate) fn shape_payload(
    raw: Bytes,
    data_rtype: DataRepresentation,
    output_format: AudioOutputFormat,
) -> AudioPayload {
    match data_rtype {
        DataRepresentation::Bytes => AudioPayload::Bytes(raw),
        DataRepresentation::Base64 => AudioPayload::Base64(STANDARD.encode(&raw)),
        DataRepresentation::Array => match output_format.codec() {
            CodecType::PcmF32le => AudioPayload::Array(bytes_to_f32(&raw)),
            codec => AudioPayload::Array(samples_to_f32(&decode_raw_audio(&raw, codec))),
        },
    }
}

/// Splits an event-stream body into `data:` payloads. Events may be split
/// across network chunks; a line is only emitted once its newline arrives.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(&['\r', '\n'][..]);
            if let Some(data) = line.strip_prefix("data:") {
                let data = data.trim_start();
                if !data.is_empty() {
                    events.push(data.to_string());
                }
            }
        }
        events
    }
}

fn parse_sse_event(
    data: &str,
    data_rtype: DataRepresentation,
    output_format: AudioOutputFormat,
) -> Result<(Option<AudioPayload>, bool)> {
    let event: SseEvent = serde_json::from_str(data)?;
    if let Some(error) = event.error {
        return Err(SynthesisError::Stream(error));
    }
    let payload = match event.data.filter(|data| !data.is_empty()) {
        Some(encoded) => Some(match data_rtype {
            DataRepresentation::Base64 => AudioPayload::Base64(encoded),
            _ => shape_payload(
                Bytes::from(STANDARD.decode(encoded.as_bytes())?),
                data_rtype,
                output_format,
            ),
        }),
        None => None,
    };
    Ok((payload, event.done))
}

struct SseState<S> {
    body: S,
    decoder: SseDecoder,
    pending: VecDeque<Result<AudioPayload>>,
    done: bool,
}

/// Turn a raw event-stream body into audio payloads. Ends after the `done`
/// event, the first error, or the end of the body.
pub(crate) fn decode_sse_stream<S, E>(
    body: S,
    data_rtype: DataRepresentation,
    output_format: AudioOutputFormat,
) -> AudioStream
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + Unpin + 'static,
    E: Into<SynthesisError> + Send + 'static,
{
    let state = SseState {
        body,
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        done: false,
    };
    Box::pin(stream::unfold(state, move |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.done {
                return None;
            }
            match state.body.next().await {
                Some(Ok(chunk)) => {
                    for data in state.decoder.push(&chunk) {
                        match parse_sse_event(&data, data_rtype, output_format) {
                            Ok((payload, done)) => {
                                if let Some(payload) = payload {
                                    state.pending.push_back(Ok(payload));
                                }
                                if done {
                                    state.done = true;
                                    break;
                                }
                            }
                            Err(e) => {
                                state.pending.push_back(Err(e));
                                state.done = true;
                                break;
                            }
                        }
                    }
                }
                Some(Err(e)) => {
                    state.pending.push_back(Err(e.into()));
                    state.done = true;
                }
                None => state.done = true,
            }
        }
    }))
}

#[derive(Debug, Clone)]
pub struct CartesiaClient {
    http_client: HttpClient,
    api_key: String,
    base_url: Url,
    api_version: String,
}

impl CartesiaClient {
    pub fn new(api_key: impl Into<String>, base_url: &str, api_version: &str) -> Result<Self> {
        let mut base_url = base_url.to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Ok(Self {
            http_client: HttpClient::new(),
            api_key: api_key.into(),
            base_url: Url::parse(&base_url)?,
            api_version: api_version.to_string(),
        })
    }

    pub fn from_config(config: &SynthesizerConfig) -> Result<Self> {
        let api_key = config
            .api_key()
            .ok_or(SynthesisError::MissingApiKey(CARTESIA_API_KEY_ENV))?;
        Self::new(api_key, &config.base_url, &config.api_version)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http_client
            .request(method, url)
            .header("X-API-Key", &self.api_key)
            .header("Cartesia-Version", &self.api_version)
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(SynthesisError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl CartesiaApi for CartesiaClient {
    async fn get_voices(&self) -> Result<HashMap<String, VoiceInfo>> {
        let url = self.endpoint("voices/")?;
        let response = Self::check(self.request(Method::GET, url).send().await?).await?;
        let voices: Vec<VoiceInfo> = response.json().await?;
        debug!("cartesia: fetched {} voices", voices.len());
        Ok(voices
            .into_iter()
            .map(|voice| (voice.name.clone(), voice))
            .collect())
    }

    async fn get_voice_embedding(&self, voice_id: &str) -> Result<VoiceEmbedding> {
        let url = self.endpoint(&format!("voices/embedding/{}", voice_id))?;
        let response = Self::check(self.request(Method::GET, url).send().await?).await?;
        let body: EmbeddingResponse = response.json().await?;
        Ok(VoiceEmbedding(body.embedding))
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GeneratedAudio> {
        let url = self.endpoint("tts/bytes")?;
        let response = self
            .request(Method::POST, url)
            .json(&TtsRequest::new(&request))
            .send()
            .await?;
        let raw = Self::check(response).await?.bytes().await?;
        debug!(
            "cartesia: generated {} bytes for {} chars",
            raw.len(),
            request.transcript.len()
        );
        Ok(GeneratedAudio {
            audio: shape_payload(raw, request.data_rtype, request.output_format),
            sampling_rate: request.output_format.sample_rate(),
        })
    }

    async fn generate_stream(&self, request: GenerateRequest) -> Result<AudioStream> {
        let url = self.endpoint("tts/sse")?;
        let response = self
            .request(Method::POST, url)
            .header(ACCEPT, "text/event-stream")
            .json(&TtsRequest::new(&request))
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(decode_sse_stream(
            response.bytes_stream().boxed(),
            request.data_rtype,
            request.output_format,
        ))
    }
}
