pub mod config;
pub mod media;
pub mod synthesis;

pub type Sample = i16;
pub type PcmBuf = Vec<Sample>;
