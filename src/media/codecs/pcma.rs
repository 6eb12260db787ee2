use super::Decoder;
use crate::PcmBuf;

pub struct PcmaDecoder {}

impl PcmaDecoder {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for PcmaDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for PcmaDecoder {
    fn decode(&mut self, samples: &[u8]) -> PcmBuf {
        samples.iter().map(|sample| decode_a_law(*sample)).collect()
    }
}

// G.711 A-law expansion, even bits inverted on the wire
pub fn decode_a_law(a_law_sample: u8) -> i16 {
    let value = a_law_sample ^ 0x55;
    let exponent = ((value >> 4) & 0x07) as i32;
    let mantissa = (value & 0x0F) as i32;
    let magnitude = if exponent == 0 {
        (mantissa << 4) + 8
    } else {
        ((mantissa << 4) + 0x108) << (exponent - 1)
    };
    if value & 0x80 != 0 {
        magnitude as i16
    } else {
        -magnitude as i16
    }
}
