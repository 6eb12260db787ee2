//! Minimal WAV container helpers built on `hound`.
use crate::{PcmBuf, Sample};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::io::Cursor;

pub fn mono_spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

/// Encode mono 16-bit samples into an in-memory WAV file.
pub fn encode_wav(samples: &[Sample], sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, mono_spec(sample_rate))?;
        for &sample in samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Decode a 16-bit integer WAV file, returning samples and sample rate.
pub fn decode_wav(data: &[u8]) -> Result<(PcmBuf, u32), hound::Error> {
    let mut reader = WavReader::new(Cursor::new(data))?;
    let sample_rate = reader.spec().sample_rate;
    let samples = reader.samples::<i16>().collect::<Result<PcmBuf, _>>()?;
    Ok((samples, sample_rate))
}

pub fn wav_duration_seconds(data: &[u8]) -> Result<f64, hound::Error> {
    let reader = WavReader::new(Cursor::new(data))?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Ok(0.0);
    }
    Ok(reader.duration() as f64 / spec.sample_rate as f64)
}
