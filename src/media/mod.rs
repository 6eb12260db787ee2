pub mod cache;
pub mod codecs;
pub mod wav;
