use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use backchannel::media::filter::read_chunk;
use backchannel::{AudioBridge, BridgeConfig, EgressStrategy};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "doorbell-bridge",
    about = "Bridge a doorbell camera's two-way audio to stdin/stdout",
    long_about = "Captures the camera's audio and writes it to stdout as mono s16le PCM, \
                  and plays mono s16le PCM read from stdin through the camera's \
                  RTSP backchannel. EOF on stdin ends the session."
)]
struct Args {
    /// Camera stream URL, e.g. rtsp://192.168.1.20:554/h264Preview_01_main
    #[arg(long, env = "DOORBELL_URL")]
    url: String,

    #[arg(long, short, env = "DOORBELL_USERNAME", default_value = "admin")]
    username: String,

    #[arg(long, short, env = "DOORBELL_PASSWORD", hide_env_values = true)]
    password: String,

    /// TOML file overriding the default [session] and [audio] settings
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Egress encoder
    #[arg(long, value_enum)]
    strategy: Option<Strategy>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Strategy {
    /// Built-in resampler and G.711 encoder
    Dsp,
    /// One ffmpeg process per chunk
    Filter,
}

impl From<Strategy> for EgressStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Dsp => EgressStrategy::Dsp,
            Strategy::Filter => EgressStrategy::Filter,
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<BridgeConfig> {
    let Some(path) = path else {
        return Ok(BridgeConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
}

/// Copy camera audio from the ingest queue to stdout until the bridge retires.
fn spawn_ingest_writer(bridge: Arc<AudioBridge>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut stdout = io::stdout().lock();
        while bridge.is_connected() {
            let Some(chunk) = bridge.recv_audio(Duration::from_millis(500)) else {
                continue;
            };
            if let Err(e) = stdout.write_all(&chunk).and_then(|()| stdout.flush()) {
                tracing::warn!(error = %e, "stdout closed, no longer forwarding camera audio");
                break;
            }
        }
    })
}

/// Feed `source` into the egress queue until EOF.
///
/// Chunks read while no backchannel is streaming are discarded, and a chunk
/// that finds the queue full for a whole `queue_timeout` is dropped, so the
/// source is always read through to EOF.
fn pump(bridge: &AudioBridge, source: &mut impl Read) -> Result<()> {
    let mut buf = vec![0u8; bridge.config().audio.egress_chunk_bytes];
    let mut discarded: u64 = 0;

    loop {
        let n = read_chunk(&mut *source, &mut buf).context("failed to read stdin")?;
        if n == 0 {
            tracing::info!(discarded, "stdin closed");
            return Ok(());
        }
        if !bridge.is_streaming() {
            discarded += 1;
            continue;
        }
        if let Err(e) = bridge.send_audio(buf[..n].to_vec()) {
            tracing::debug!(error = %e, "dropping stdin chunk");
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(strategy) = args.strategy {
        config.audio.strategy = strategy.into();
    }

    let audio = &config.audio;
    if audio.strategy == EgressStrategy::Filter
        && audio.egress_chunk_bytes != audio.filter_frame_bytes()
    {
        tracing::warn!(
            egress_chunk_bytes = audio.egress_chunk_bytes,
            expected = audio.filter_frame_bytes(),
            "filter strategy only sends 20 ms chunks, set egress_chunk_bytes to match"
        );
    }

    let bridge = Arc::new(
        AudioBridge::new(&args.url, &args.username, &args.password, config)
            .context("failed to create audio bridge")?,
    );

    let live = bridge.start().context("failed to start audio bridge")?;
    if live {
        tracing::info!("backchannel live, reading PCM from stdin");
    } else {
        tracing::warn!("backchannel unavailable, forwarding camera audio only");
    }

    let writer = spawn_ingest_writer(Arc::clone(&bridge));
    let pumped = pump(&bridge, &mut io::stdin().lock());

    bridge.disconnect();
    bridge.cleanup();
    if writer.join().is_err() {
        tracing::error!("ingest writer panicked");
    }

    pumped
}
