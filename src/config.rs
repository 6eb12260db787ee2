use crate::synthesis::{SynthesizerConfig, DEFAULT_FILLER_AUDIO_PATH};
use anyhow::{Error, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about = "Cartesia text-to-speech synthesizer")]
pub struct Cli {
    #[clap(long)]
    pub conf: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Stream speech for TEXT into a WAV file
    Speak {
        text: String,
        output: PathBuf,
        /// Bytes requested per chunk
        #[clap(long, default_value_t = 8192)]
        chunk_size: usize,
    },
    /// Render the filler phrases into the filler cache
    Fillers {
        /// Drop cached filler audio before rendering
        #[clap(long)]
        refresh: bool,
    },
    /// Print the voice identifier for the configured synthesizer
    VoiceId,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub log_file: Option<String>,
    pub filler_audio_path: String,
    pub synthesizer: SynthesizerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            log_file: None,
            filler_audio_path: DEFAULT_FILLER_AUDIO_PATH.to_string(),
            synthesizer: SynthesizerConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self, Error> {
        let config = toml::from_str(
            &std::fs::read_to_string(path).map_err(|e| anyhow::anyhow!("{}: {}", e, path))?,
        )?;
        Ok(config)
    }
}
