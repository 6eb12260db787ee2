use crate::{PcmBuf, Sample};
pub mod pcma;
pub mod pcmu;

/// Raw sample encodings the synthesizer can receive.
#[derive(Debug, Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum CodecType {
    PcmS16le,
    PcmF32le,
    PCMU,
    PCMA,
}

pub trait Decoder: Send + Sync {
    /// Decode encoded audio data into PCM samples
    fn decode(&mut self, data: &[u8]) -> PcmBuf;
}

pub fn create_decoder(codec: CodecType) -> Box<dyn Decoder> {
    match codec {
        CodecType::PcmS16le => Box::new(LinearDecoder),
        CodecType::PcmF32le => Box::new(FloatDecoder),
        CodecType::PCMU => Box::new(pcmu::PcmuDecoder::new()),
        CodecType::PCMA => Box::new(pcma::PcmaDecoder::new()),
    }
}

impl CodecType {
    /// Bytes per encoded sample
    pub fn sample_width(&self) -> usize {
        match self {
            CodecType::PcmS16le => 2,
            CodecType::PcmF32le => 4,
            CodecType::PCMU | CodecType::PCMA => 1,
        }
    }
}

struct LinearDecoder;

impl Decoder for LinearDecoder {
    fn decode(&mut self, data: &[u8]) -> PcmBuf {
        bytes_to_samples(data)
    }
}

struct FloatDecoder;

impl Decoder for FloatDecoder {
    fn decode(&mut self, data: &[u8]) -> PcmBuf {
        f32_to_samples(&bytes_to_f32(data))
    }
}

/// Decode a whole raw buffer into 16-bit samples.
pub fn decode_raw_audio(data: &[u8], codec: CodecType) -> PcmBuf {
    create_decoder(codec).decode(data)
}

pub fn samples_to_bytes(samples: &[Sample]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

// trailing odd byte is dropped
pub fn bytes_to_samples(u8_data: &[u8]) -> PcmBuf {
    u8_data
        .chunks_exact(2)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]))
        .collect()
}

pub fn bytes_to_f32(u8_data: &[u8]) -> Vec<f32> {
    u8_data
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

pub fn samples_to_f32(samples: &[Sample]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / 32768.0).collect()
}

pub fn f32_to_samples(samples: &[f32]) -> PcmBuf {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0).round() as Sample)
        .collect()
}
