use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, RevoiceError};
use crate::progress::PercentGate;
use super::ProgressFn;

/// Number of stderr lines kept as diagnostics for a failed run.
const DIAGNOSTIC_TAIL_LINES: usize = 20;

/// Abstract media processing command representation
#[derive(Debug, Clone)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl MediaCommand {
    /// Create a new media processing command
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    /// Add an argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add input file
    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Add output file
    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Force overwrite output
    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    /// Emit machine-readable progress on stdout instead of the stats line
    pub fn progress_pipe(self) -> Self {
        self.arg("-hide_banner")
            .arg("-nostats")
            .arg("-progress")
            .arg("pipe:1")
    }

    pub fn video_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:v").arg(codec)
    }

    pub fn audio_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:a").arg(codec)
    }

    /// Copy video stream
    pub fn copy_video(self) -> Self {
        self.video_codec("copy")
    }

    /// Disable video
    pub fn no_video(self) -> Self {
        self.arg("-vn")
    }

    /// Set audio sample rate
    pub fn audio_sample_rate(self, rate: u32) -> Self {
        self.arg("-ar").arg(rate.to_string())
    }

    /// Set audio channels
    pub fn audio_channels(self, channels: u32) -> Self {
        self.arg("-ac").arg(channels.to_string())
    }

    /// Select a stream for the output
    pub fn map<S: Into<String>>(self, specifier: S) -> Self {
        self.arg("-map").arg(specifier)
    }

    /// Stop at the end of the shortest input stream
    pub fn shortest(self) -> Self {
        self.arg("-shortest")
    }

    /// Execute the command and return its stdout
    pub async fn execute(&self) -> Result<String> {
        debug!("Executing media processing command: {} {:?}", self.binary_path, self.args);
        debug!("Description: {}", self.description);

        let output = Command::new(&self.binary_path)
            .args(&self.args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| RevoiceError::EngineUnavailable(format!("Failed to execute {}: {}", self.binary_path, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RevoiceError::CodecExecution(format!(
                "{} failed: {}",
                self.description,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Execute the command while following its `-progress pipe:1` output.
    ///
    /// `progress` receives strictly increasing percentages. When `timeout`
    /// elapses the child is killed and `Timeout` is returned.
    pub async fn execute_with_progress(
        &self,
        timeout: Option<Duration>,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<()> {
        debug!("Executing media processing command: {} {:?}", self.binary_path, self.args);
        debug!("Description: {}", self.description);

        let mut child = Command::new(&self.binary_path)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RevoiceError::EngineUnavailable(format!("Failed to execute {}: {}", self.binary_path, e)))?;

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(RevoiceError::CodecExecution(format!(
                "{} failed: output pipes were not captured",
                self.description
            )));
        };

        let duration_us = AtomicU64::new(0);
        let run = async {
            let (diagnostics, (), status) = tokio::join!(
                collect_diagnostics(stderr, &duration_us),
                follow_progress(stdout, &duration_us, progress),
                child.wait(),
            );
            (diagnostics, status)
        };

        let (diagnostics, status) = match timeout {
            Some(limit) => {
                let outcome = tokio::time::timeout(limit, run).await;
                match outcome {
                    Ok(finished) => finished,
                    Err(_) => {
                        if let Err(e) = child.kill().await {
                            debug!("Failed to kill timed out media process: {}", e);
                        }
                        return Err(RevoiceError::Timeout {
                            operation: self.description.clone(),
                            seconds: limit.as_secs(),
                        });
                    }
                }
            }
            None => run.await,
        };

        let status = status
            .map_err(|e| RevoiceError::CodecExecution(format!("{} failed: {}", self.description, e)))?;

        if !status.success() {
            return Err(RevoiceError::CodecExecution(format!(
                "{} failed ({}): {}",
                self.description, status, diagnostics
            )));
        }

        Ok(())
    }
}

/// Drain stderr, remembering the first input duration and the last few lines.
async fn collect_diagnostics<R: AsyncRead + Unpin>(reader: R, duration_us: &AtomicU64) -> String {
    let mut lines = BufReader::new(reader).lines();
    let mut tail: VecDeque<String> = VecDeque::with_capacity(DIAGNOSTIC_TAIL_LINES);

    while let Ok(Some(line)) = lines.next_line().await {
        if duration_us.load(Ordering::Relaxed) == 0 {
            if let Some(us) = parse_duration_line(&line) {
                duration_us.store(us, Ordering::Relaxed);
            }
        }
        if tail.len() == DIAGNOSTIC_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }

    tail.into_iter().collect::<Vec<_>>().join("\n")
}

/// Drain stdout, translating progress records into percentages.
async fn follow_progress<R: AsyncRead + Unpin>(
    reader: R,
    duration_us: &AtomicU64,
    progress: Option<ProgressFn<'_>>,
) {
    let mut lines = BufReader::new(reader).lines();
    let mut gate = PercentGate::new();

    while let Ok(Some(line)) = lines.next_line().await {
        let Some(callback) = progress else {
            continue;
        };
        let percent = match parse_progress_line(&line) {
            Some(ProgressRecord::OutTime(us)) => {
                let total = duration_us.load(Ordering::Relaxed);
                if total == 0 {
                    continue;
                }
                ((us as f64 / total as f64) * 100.0).floor().min(100.0) as u8
            }
            Some(ProgressRecord::End) => 100,
            None => continue,
        };
        if let Some(percent) = gate.admit(percent) {
            callback(percent);
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum ProgressRecord {
    /// Output position in microseconds
    OutTime(u64),
    End,
}

fn parse_progress_line(line: &str) -> Option<ProgressRecord> {
    let (key, value) = line.trim().split_once('=')?;
    match key {
        // out_time_ms is reported in microseconds as well
        "out_time_us" | "out_time_ms" => {
            let us = value.trim().parse::<i64>().ok()?;
            Some(ProgressRecord::OutTime(us.max(0) as u64))
        }
        "progress" if value.trim() == "end" => Some(ProgressRecord::End),
        _ => None,
    }
}

/// Parse `  Duration: 00:01:02.50, start: ...` into microseconds.
fn parse_duration_line(line: &str) -> Option<u64> {
    let rest = line.trim().strip_prefix("Duration:")?;
    let stamp = rest.split(',').next()?.trim();
    let mut parts = stamp.split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    let total = hours * 3600.0 + minutes * 60.0 + seconds;
    (total > 0.0).then(|| (total * 1_000_000.0) as u64)
}

/// Builder for the codec operations the pipeline needs
pub struct MediaCommandBuilder {
    binary_path: String,
}

impl MediaCommandBuilder {
    pub fn new<S: Into<String>>(binary_path: S) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    /// Demux the video and re-encode its audio as mono 16-bit PCM WAV
    pub fn extract_audio<P: AsRef<Path>>(
        &self,
        video_path: P,
        audio_path: P,
        sample_rate: u32,
    ) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Audio extraction")
            .progress_pipe()
            .input(video_path)
            .no_video()
            .audio_codec("pcm_s16le")
            .audio_sample_rate(sample_rate)
            .audio_channels(1)
            .overwrite()
            .output(audio_path)
    }

    /// Keep the original video stream and replace the audio, cut to the shorter stream
    pub fn remux<P: AsRef<Path>>(
        &self,
        video_path: P,
        audio_path: P,
        output_path: P,
    ) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Audio remux")
            .progress_pipe()
            .input(video_path)
            .input(audio_path)
            .copy_video()
            .map("0:v:0")
            .map("1:a:0")
            .shortest()
            .overwrite()
            .output(output_path)
    }

    /// Build version check command
    pub fn version_check(&self) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Version check")
            .arg("-version")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_line() {
        assert_eq!(
            parse_duration_line("  Duration: 00:01:02.50, start: 0.000000, bitrate: 1205 kb/s"),
            Some(62_500_000)
        );
        assert_eq!(parse_duration_line("  Duration: N/A, bitrate: N/A"), None);
        assert_eq!(parse_duration_line("Stream #0:0: Video: h264"), None);
    }

    #[test]
    fn test_parse_progress_line() {
        assert_eq!(parse_progress_line("out_time_us=1500000"), Some(ProgressRecord::OutTime(1_500_000)));
        assert_eq!(parse_progress_line("out_time_ms=-1200"), Some(ProgressRecord::OutTime(0)));
        assert_eq!(parse_progress_line("out_time_us=N/A"), None);
        assert_eq!(parse_progress_line("progress=end"), Some(ProgressRecord::End));
        assert_eq!(parse_progress_line("progress=continue"), None);
        assert_eq!(parse_progress_line("frame=120"), None);
    }

    #[test]
    fn test_extract_audio_arguments() {
        let builder = MediaCommandBuilder::new("ffmpeg");
        let cmd = builder.extract_audio("in.mp4", "out.wav", 24_000);
        let args = cmd.args.join(" ");
        assert!(args.contains("-i in.mp4 -vn -c:a pcm_s16le -ar 24000 -ac 1 -y out.wav"));
        assert!(args.starts_with("-hide_banner -nostats -progress pipe:1"));
    }

    #[test]
    fn test_remux_arguments() {
        let builder = MediaCommandBuilder::new("ffmpeg");
        let cmd = builder.remux("in.mp4", "dub.mp3", "out.mp4");
        assert_eq!(
            cmd.args[4..].join(" "),
            "-i in.mp4 -i dub.mp3 -c:v copy -map 0:v:0 -map 1:a:0 -shortest -y out.mp4"
        );
    }
}
