use super::{Result, SynthesisError};
use bytes::Bytes;
use futures::stream::{self, BoxStream};
use std::fmt;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Speaking rate used to estimate how much of a message was heard.
pub const WORDS_PER_MINUTE: u32 = 150;

/// Events flowing from the synthesis producer to the consumer.
#[derive(Debug)]
pub(crate) enum SynthesisEvent {
    AudioChunk(Bytes),
    Failed(SynthesisError),
    /// End of stream. Always the last event the producer sends.
    Finished { cancelled: bool },
}

pub(crate) type SynthesisEventSender = mpsc::UnboundedSender<SynthesisEvent>;
pub(crate) type SynthesisEventReceiver = mpsc::UnboundedReceiver<SynthesisEvent>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkResult {
    pub chunk: Bytes,
    pub is_last_chunk: bool,
}

impl ChunkResult {
    fn audio(chunk: Bytes) -> Self {
        Self {
            chunk,
            is_last_chunk: false,
        }
    }

    /// Empty chunk closing every chunk stream.
    pub fn end_of_stream() -> Self {
        Self {
            chunk: Bytes::new(),
            is_last_chunk: true,
        }
    }
}

/// Prefix of `text` a listener heard after `seconds` of playback.
pub fn get_message_cutoff_from_voice_speed(
    text: &str,
    seconds: f64,
    words_per_minute: u32,
) -> String {
    if seconds.is_nan() || seconds <= 0.0 {
        return String::new();
    }
    let words_per_second = words_per_minute as f64 / 60.0;
    // float to int casts saturate, so huge values just take every word
    let estimated_words_spoken = (words_per_second * seconds).floor() as usize;
    text.split_whitespace()
        .take(estimated_words_spoken)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Handle on one in-flight synthesis request.
pub struct SynthesisResult {
    receiver: Option<SynthesisEventReceiver>,
    cancel_token: CancellationToken,
    cancelled: Arc<AtomicBool>,
    message: String,
}

impl fmt::Debug for SynthesisResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SynthesisResult")
            .field("message", &self.message)
            .field("streaming", &self.receiver.is_some())
            .field("cancelled", &self.was_cancelled())
            .finish()
    }
}

struct ChunkState {
    receiver: Option<SynthesisEventReceiver>,
    cancelled: Arc<AtomicBool>,
}

impl SynthesisResult {
    pub(crate) fn new(
        receiver: SynthesisEventReceiver,
        cancel_token: CancellationToken,
        message: &str,
    ) -> Self {
        Self {
            receiver: Some(receiver),
            cancel_token,
            cancelled: Arc::new(AtomicBool::new(false)),
            message: message.to_string(),
        }
    }

    /// Takes the chunk stream. It can be taken once. Audio chunks are
    /// yielded as they arrive, and the stream always ends with
    /// [`ChunkResult::end_of_stream`].
    pub fn chunk_stream(&mut self) -> Result<BoxStream<'static, Result<ChunkResult>>> {
        let receiver = self.receiver.take().ok_or_else(|| {
            SynthesisError::Stream("chunk stream already taken".to_string())
        })?;
        let state = ChunkState {
            receiver: Some(receiver),
            cancelled: self.cancelled.clone(),
        };
        Ok(Box::pin(stream::unfold(state, |mut state| async move {
            let receiver = state.receiver.as_mut()?;
            let item = match receiver.recv().await {
                Some(SynthesisEvent::AudioChunk(chunk)) => Ok(ChunkResult::audio(chunk)),
                Some(SynthesisEvent::Failed(e)) => Err(e),
                Some(SynthesisEvent::Finished { cancelled }) => {
                    state.cancelled.store(cancelled, Ordering::Release);
                    state.receiver = None;
                    Ok(ChunkResult::end_of_stream())
                }
                None => {
                    state.receiver = None;
                    Ok(ChunkResult::end_of_stream())
                }
            };
            Some((item, state))
        })))
    }

    /// Text spoken after `seconds` of playback at [`WORDS_PER_MINUTE`].
    pub fn get_message_up_to(&self, seconds: f64) -> String {
        get_message_cutoff_from_voice_speed(&self.message, seconds, WORDS_PER_MINUTE)
    }

    /// Stop the producer. The chunk stream still ends normally.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }

    /// Whether the stream ended because of cancellation. Only meaningful
    /// once the chunk stream has been drained.
    pub fn was_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn result_with(events: Vec<SynthesisEvent>) -> SynthesisResult {
        let (tx, rx) = mpsc::unbounded_channel();
        for event in events {
            tx.send(event).unwrap();
        }
        SynthesisResult::new(rx, CancellationToken::new(), "one two three four five")
    }

    #[test]
    fn test_message_cutoff() {
        let text = "one two three four five";
        assert_eq!(get_message_cutoff_from_voice_speed(text, 0.0, 150), "");
        assert_eq!(get_message_cutoff_from_voice_speed(text, -3.0, 150), "");
        assert_eq!(get_message_cutoff_from_voice_speed(text, f64::NAN, 150), "");
        // 2.5 words per second
        assert_eq!(get_message_cutoff_from_voice_speed(text, 0.4, 150), "one");
        assert_eq!(get_message_cutoff_from_voice_speed(text, 1.0, 150), "one two");
        assert_eq!(get_message_cutoff_from_voice_speed(text, 2.0, 150), text);
        assert_eq!(get_message_cutoff_from_voice_speed(text, f64::INFINITY, 150), text);
    }

    #[test]
    fn test_message_cutoff_is_monotonic_and_bounded() {
        let text = "  so   let me\tcheck on that for you, it should only take a moment ";
        let mut previous = String::new();
        for step in 0..200 {
            let heard = get_message_cutoff_from_voice_speed(text, step as f64 * 0.05, 150);
            assert!(heard.len() >= previous.len());
            assert!(heard.starts_with(&previous));
            assert!(heard.len() <= text.len());
            previous = heard;
        }
        assert_eq!(
            previous,
            text.split_whitespace().collect::<Vec<_>>().join(" ")
        );
    }

    #[tokio::test]
    async fn test_chunk_stream_ends_with_marker() {
        let mut result = result_with(vec![
            SynthesisEvent::AudioChunk(Bytes::from_static(b"a")),
            SynthesisEvent::AudioChunk(Bytes::from_static(b"b")),
            SynthesisEvent::Finished { cancelled: false },
        ]);
        let chunks: Vec<_> = result
            .chunk_stream()
            .unwrap()
            .map(|item| item.unwrap())
            .collect()
            .await;
        assert_eq!(
            chunks,
            vec![
                ChunkResult {
                    chunk: Bytes::from_static(b"a"),
                    is_last_chunk: false
                },
                ChunkResult {
                    chunk: Bytes::from_static(b"b"),
                    is_last_chunk: false
                },
                ChunkResult::end_of_stream(),
            ]
        );
        assert!(!result.was_cancelled());
        assert!(result.chunk_stream().is_err());
    }

    #[tokio::test]
    async fn test_chunk_is_yielded_before_next_arrives() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut result = SynthesisResult::new(rx, CancellationToken::new(), "hi");
        let mut chunks = result.chunk_stream().unwrap();

        tx.send(SynthesisEvent::AudioChunk(Bytes::from_static(b"a")))
            .unwrap();
        // the producer is still open, the chunk must not wait for a successor
        let first = chunks.next().await.unwrap().unwrap();
        assert_eq!(first.chunk, Bytes::from_static(b"a"));
        assert!(!first.is_last_chunk);

        tx.send(SynthesisEvent::Finished { cancelled: false }).unwrap();
        assert_eq!(
            chunks.next().await.unwrap().unwrap(),
            ChunkResult::end_of_stream()
        );
        assert!(chunks.next().await.is_none());
    }

    #[tokio::test]
    async fn test_chunk_stream_keeps_order_on_failure() {
        let mut result = result_with(vec![
            SynthesisEvent::AudioChunk(Bytes::from_static(b"a")),
            SynthesisEvent::Failed(SynthesisError::Stream("boom".to_string())),
            SynthesisEvent::Finished { cancelled: false },
        ]);
        let items: Vec<_> = result.chunk_stream().unwrap().collect().await;
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_ref().unwrap().chunk, Bytes::from_static(b"a"));
        assert!(matches!(items[1], Err(SynthesisError::Stream(_))));
        assert!(items[2].as_ref().unwrap().is_last_chunk);
    }

    #[tokio::test]
    async fn test_chunk_stream_ends_when_producer_goes_away() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(SynthesisEvent::AudioChunk(Bytes::from_static(b"a")))
            .unwrap();
        drop(tx);
        let mut result = SynthesisResult::new(rx, CancellationToken::new(), "hi");
        let items: Vec<_> = result.chunk_stream().unwrap().collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[1].as_ref().unwrap().is_last_chunk);
        assert!(!result.was_cancelled());
        assert_eq!(result.get_message_up_to(10.0), "hi");
    }

    #[tokio::test]
    async fn test_cancelled_marker_is_recorded() {
        let mut result = result_with(vec![SynthesisEvent::Finished { cancelled: true }]);
        let items: Vec<_> = result
            .chunk_stream()
            .unwrap()
            .map(|item| item.unwrap())
            .collect()
            .await;
        assert_eq!(items, vec![ChunkResult::end_of_stream()]);
        assert!(result.was_cancelled());
    }
}
