//! External `ffmpeg` processes: forward-path capture and the one-shot
//! egress filter.

use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread;

use super::g711::G711;
use super::{FRAME_BYTES, FrameEncoder, G711_RATE};
use crate::config::AudioConfig;
use crate::error::{BridgeError, Result};

/// Egress encoder that pipes each chunk through a fresh child process.
///
/// The child reads the whole chunk on stdin and writes the encoded result on
/// stdout. Only a result of exactly one frame is emitted; anything else is
/// dropped.
#[derive(Debug, Clone)]
pub struct ExternalFilter {
    program: String,
    args: Vec<String>,
}

impl ExternalFilter {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// `ffmpeg` invocation: source-rate s16le in, conditioned 8 kHz G.711 out.
    pub fn ffmpeg(config: &AudioConfig, codec: G711) -> Self {
        let filters = format!(
            "volume={},highpass=f=100,lowpass=f=4000,alimiter=limit={}",
            config.volume_target_ratio,
            config.peak_limiter_threshold / i16::MAX as f64
        );
        let args = [
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            "s16le",
            "-ar",
            &config.source_rate.to_string(),
            "-ac",
            "1",
            "-i",
            "pipe:0",
            "-af",
            &filters,
            "-acodec",
            codec.ffmpeg_codec(),
            "-ar",
            &G711_RATE.to_string(),
            "-ac",
            "1",
            "-f",
            codec.ffmpeg_format(),
            "pipe:1",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        Self::new(config.ffmpeg_path.clone(), args)
    }

    /// Run the child once over `chunk` and return its whole stdout.
    pub fn run(&self, chunk: &[u8]) -> Result<Vec<u8>> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| BridgeError::Filter(format!("spawn {}: {e}", self.program)))?;

        if let Some(mut stdin) = child.stdin.take()
            && let Err(e) = stdin.write_all(chunk)
        {
            drop(stdin);
            // The child may already be gone; either way it must be reaped.
            let _ = child.kill();
            let status = child.wait();
            tracing::debug!(?status, "filter stopped before taking its input");
            return Err(BridgeError::Filter(format!("write to {}: {e}", self.program)));
        }
        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(BridgeError::Filter(format!(
                "{} exited with {}",
                self.program, output.status
            )));
        }
        Ok(output.stdout)
    }
}

impl FrameEncoder for ExternalFilter {
    fn encode(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        match self.run(chunk) {
            Ok(encoded) if encoded.len() == FRAME_BYTES => vec![encoded],
            Ok(encoded) => {
                tracing::debug!(
                    error = %BridgeError::PayloadLength(encoded.len()),
                    "discarding filter output"
                );
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(error = %e, "external filter failed");
                Vec::new()
            }
        }
    }

    fn reset(&mut self) {}

    fn name(&self) -> &'static str {
        "filter"
    }
}

/// Long-running capture of the camera's forward audio as mono s16le PCM.
///
/// Stderr is forwarded to the log. Dropping the handle kills the child.
pub struct CaptureProcess {
    child: Child,
}

impl CaptureProcess {
    /// Start `ffmpeg` reading `url` and return the handle plus its stdout.
    pub fn spawn(url: &str, config: &AudioConfig) -> Result<(Self, ChildStdout)> {
        let filters = format!(
            "volume={},highpass=f=100,lowpass=f=4000,alimiter=limit=0.8",
            config.ingest_volume
        );
        let rate = config.source_rate.to_string();
        let args = [
            "-hide_banner",
            "-loglevel",
            "error",
            "-i",
            url,
            "-vn",
            "-acodec",
            "pcm_s16le",
            "-ar",
            &rate,
            "-ac",
            "1",
            "-af",
            &filters,
            "-f",
            "s16le",
            "pipe:1",
        ];
        Self::spawn_command(&config.ffmpeg_path, &args)
    }

    /// Start an arbitrary capture command whose stdout is the PCM stream.
    pub fn spawn_command(program: &str, args: &[&str]) -> Result<(Self, ChildStdout)> {
        tracing::info!(program, "starting audio capture");
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| BridgeError::Filter(format!("spawn {program}: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BridgeError::Filter("capture stdout unavailable".into()))?;

        if let Some(stderr) = child.stderr.take() {
            thread::spawn(move || {
                for line in BufReader::new(stderr).lines().map_while(std::result::Result::ok) {
                    tracing::warn!(target: "capture", "{}", line);
                }
            });
        }

        tracing::info!(pid = child.id(), "audio capture started");
        Ok((Self { child }, stdout))
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Kill the child and reap it. Its stdout reader then sees EOF.
    pub fn stop(&mut self) {
        match self.child.try_wait() {
            Ok(Some(status)) => tracing::debug!(%status, "capture already exited"),
            _ => {
                if let Err(e) = self.child.kill() {
                    tracing::warn!(error = %e, "failed to kill capture process");
                }
                let _ = self.child.wait();
                tracing::info!("audio capture stopped");
            }
        }
    }
}

impl Drop for CaptureProcess {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Read until `buf` is full or the source reports EOF. Returns bytes read.
pub fn read_chunk(source: &mut dyn Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn read_chunk_fills_until_eof() {
        let mut source = Cursor::new(vec![7u8; 10]);
        let mut buf = [0u8; 4];
        assert_eq!(read_chunk(&mut source, &mut buf).unwrap(), 4);
        assert_eq!(read_chunk(&mut source, &mut buf).unwrap(), 4);
        assert_eq!(read_chunk(&mut source, &mut buf).unwrap(), 2);
        assert_eq!(read_chunk(&mut source, &mut buf).unwrap(), 0);
    }

    #[test]
    fn ffmpeg_arguments() {
        let filter = ExternalFilter::ffmpeg(&AudioConfig::default(), G711::Ulaw);
        assert_eq!(filter.program, "ffmpeg");
        let joined = filter.args.join(" ");
        assert!(joined.contains("-f s16le -ar 24000 -ac 1 -i pipe:0"));
        assert!(joined.contains("volume=0.1,highpass=f=100,lowpass=f=4000,alimiter=limit="));
        assert!(joined.ends_with("-acodec pcm_mulaw -ar 8000 -ac 1 -f mulaw pipe:1"));
    }

    #[cfg(unix)]
    #[test]
    fn emits_only_single_frames() {
        let mut filter = ExternalFilter::new("cat", Vec::new());
        let frames = filter.encode(&[0x55; FRAME_BYTES]);
        assert_eq!(frames, vec![vec![0x55; FRAME_BYTES]]);
        assert!(filter.encode(&[0x55; 100]).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn failing_program_yields_nothing() {
        let mut filter = ExternalFilter::new("false", Vec::new());
        assert!(filter.encode(&[0; FRAME_BYTES]).is_empty());
        assert!(ExternalFilter::new("/nonexistent/filter", Vec::new())
            .run(&[])
            .is_err());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn child_is_reaped_when_it_refuses_input() {
        let pid_file = std::env::temp_dir().join(format!("filter-pid-{}", std::process::id()));
        let script = format!("echo $$ > {}", pid_file.display());
        let filter = ExternalFilter::new("sh", vec!["-c".to_string(), script]);

        // Larger than a pipe buffer, so the write outlives the child.
        let result = filter.run(&vec![0u8; 1 << 20]);
        assert!(matches!(result, Err(BridgeError::Filter(_))));

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        let _ = std::fs::remove_file(&pid_file);
        assert!(!std::path::Path::new(&format!("/proc/{}", pid.trim())).exists());
    }

    #[cfg(unix)]
    #[test]
    fn capture_stdout_reaches_eof_after_stop() {
        let (mut capture, mut stdout) = CaptureProcess::spawn_command("sleep", &["30"]).unwrap();
        capture.stop();
        let mut buf = [0u8; 16];
        assert_eq!(read_chunk(&mut stdout, &mut buf).unwrap(), 0);
    }
}
