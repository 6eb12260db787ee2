use super::Decoder;
use crate::PcmBuf;

const BIAS: i32 = 0x84;

pub struct PcmuDecoder {}

impl PcmuDecoder {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for PcmuDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for PcmuDecoder {
    fn decode(&mut self, samples: &[u8]) -> PcmBuf {
        samples.iter().map(|sample| decode_mu_law(*sample)).collect()
    }
}

// G.711 mu-law expansion
pub fn decode_mu_law(mu_law_sample: u8) -> i16 {
    let value = !mu_law_sample;
    let exponent = (value >> 4) & 0x07;
    let mantissa = (value & 0x0F) as i32;
    let magnitude = (((mantissa << 3) + BIAS) << exponent) - BIAS;
    if value & 0x80 != 0 {
        -magnitude as i16
    } else {
        magnitude as i16
    }
}
