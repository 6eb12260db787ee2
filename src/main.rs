use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use cartesia_synth::{
    config::{Cli, Command, Config},
    media::{codecs::decode_raw_audio, codecs::CodecType, wav::mono_spec},
    synthesis::{CartesiaSynthesizer, DataRepresentation, SynthesizerConfig, TextMessage},
    PcmBuf,
};
use clap::Parser;
use futures::StreamExt;
use std::fs::File;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = match cli.conf {
        Some(ref conf) => Config::load(conf)?,
        None => Config::default(),
    };

    let mut log_fmt = tracing_subscriber::fmt();
    if let Some(ref level) = config.log_level {
        if let Ok(lv) = level.as_str().parse::<LevelFilter>() {
            log_fmt = log_fmt.with_max_level(lv);
        }
    }

    let _guard = if let Some(ref log_file) = config.log_file {
        let file = File::create(log_file).map_err(|e| anyhow!("{}: {}", e, log_file))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        log_fmt.with_writer(non_blocking).try_init().ok();
        Some(guard)
    } else {
        log_fmt.try_init().ok();
        None
    };

    if let Command::VoiceId = cli.command {
        println!(
            "{}",
            CartesiaSynthesizer::get_voice_identifier(&config.synthesizer)
        );
        return Ok(());
    }

    let cancel_token = CancellationToken::new();
    let synthesizer = CartesiaSynthesizer::from_config(config.synthesizer.clone())
        .await?
        .with_cancel_token(cancel_token.clone())
        .with_filler_audio_path(&config.filler_audio_path);

    match cli.command {
        Command::Speak {
            text,
            output,
            chunk_size,
        } => {
            // cancel only; speak keeps draining and writes what arrived
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Received CTRL+C, cancelling synthesis");
                    cancel_token.cancel();
                }
            });
            speak(&synthesizer, &text, &output, chunk_size).await?;
        }
        Command::Fillers { refresh } => {
            if refresh {
                synthesizer.clear_filler_cache().await?;
            }
            for filler in synthesizer.get_phrase_filler_audios().await? {
                println!("{:<16} {:.3}s", filler.message.text, filler.seconds);
            }
            info!(
                "filler audio in {}",
                synthesizer.filler_cache().cache_dir().display()
            );
        }
        Command::VoiceId => {}
    }
    Ok(())
}

async fn speak(
    synthesizer: &CartesiaSynthesizer,
    text: &str,
    output: &Path,
    chunk_size: usize,
) -> Result<bool> {
    let config = synthesizer.config();
    let mut result = synthesizer
        .create_speech_uncached(&TextMessage::new(text), chunk_size, true, true)
        .await?;

    // samples may straddle chunk boundaries, so decode once at the end
    let mut encoded = Vec::new();
    let mut chunks = result.chunk_stream()?;
    while let Some(item) = chunks.next().await {
        let chunk = item?;
        encoded.push(chunk.chunk);
    }
    let cancelled = result.was_cancelled();
    if cancelled {
        warn!("synthesis cancelled, writing partial audio");
    }

    let samples = chunks_to_samples(&encoded, config)?;
    let sample_rate = config.output_format.sample_rate();
    let mut writer = hound::WavWriter::create(output, mono_spec(sample_rate))?;
    for sample in &samples {
        writer.write_sample(*sample)?;
    }
    writer.finalize()?;

    info!(
        "wrote {} samples at {}Hz to {} ({} chars billed so far)",
        samples.len(),
        sample_rate,
        output.display(),
        synthesizer.total_chars()
    );
    Ok(cancelled)
}

fn chunks_to_samples(chunks: &[bytes::Bytes], config: &SynthesizerConfig) -> Result<PcmBuf> {
    let codec = config.output_format.codec();
    match config.data_rtype {
        DataRepresentation::Bytes => Ok(decode_raw_audio(&chunks.concat(), codec)),
        DataRepresentation::Array => Ok(decode_raw_audio(&chunks.concat(), CodecType::PcmF32le)),
        DataRepresentation::Base64 => {
            let mut raw = Vec::new();
            for chunk in chunks {
                raw.extend(STANDARD.decode(chunk)?);
            }
            Ok(decode_raw_audio(&raw, codec))
        }
    }
}
