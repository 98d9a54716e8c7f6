use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::config::CodecConfig;
use crate::error::{Result, RevoiceError};
use super::scratch::ScratchSpace;
use super::{MediaCodec, MediaCommandBuilder, ProgressFn};

/// Size of a canonical WAV header; anything this small carries no samples.
const WAV_HEADER_LEN: usize = 44;

/// A loaded codec engine: a verified ffmpeg binary plus its scratch namespace.
struct Engine {
    scratch: ScratchSpace,
    version: String,
}

/// FFmpeg-backed codec. The engine is loaded at most once, on first use,
/// and stays loaded for the lifetime of the handle.
pub struct FfmpegCodec {
    config: CodecConfig,
    command_builder: MediaCommandBuilder,
    engine: OnceCell<Engine>,
}

impl FfmpegCodec {
    pub fn new(config: CodecConfig) -> Self {
        let command_builder = MediaCommandBuilder::new(&config.binary_path);

        Self {
            config,
            command_builder,
            engine: OnceCell::new(),
        }
    }

    async fn engine(&self) -> Result<&Engine> {
        self.engine
            .get_or_try_init(|| async {
                info!("Loading codec engine from {}", self.config.binary_path);

                let output = self
                    .command_builder
                    .version_check()
                    .execute()
                    .await
                    .map_err(|e| RevoiceError::EngineUnavailable(e.to_string()))?;
                let version = output.lines().next().unwrap_or("Unknown version").to_string();
                let scratch = ScratchSpace::create(self.config.scratch_dir.as_deref())?;

                info!("Codec engine loaded: {}", version);
                Ok(Engine { scratch, version })
            })
            .await
    }
}

#[async_trait]
impl MediaCodec for FfmpegCodec {
    async fn extract_audio(
        &self,
        scope: &str,
        video: &[u8],
        progress: Option<ProgressFn<'_>>,
    ) -> Result<Vec<u8>> {
        let engine = self.engine().await?;
        let mut files = engine.scratch.scope(scope);

        let input = files.write("input.mp4", video).await?;
        let output = files.reserve("output.wav");
        info!("Extracting audio from {} bytes of video", video.len());

        let timeout = Duration::from_secs(self.config.extraction_timeout_secs);
        let command = self
            .command_builder
            .extract_audio(&input, &output, self.config.sample_rate);
        command.execute_with_progress(Some(timeout), progress).await?;

        let audio = files.read(&output).await?;
        if audio.len() <= WAV_HEADER_LEN {
            return Err(RevoiceError::CodecExecution(
                "Audio extraction produced no samples; the video has no usable audio stream".to_string(),
            ));
        }

        info!("Audio extraction completed ({} bytes)", audio.len());
        Ok(audio)
    }

    async fn remux(
        &self,
        scope: &str,
        video: &[u8],
        audio: &[u8],
        progress: Option<ProgressFn<'_>>,
    ) -> Result<Vec<u8>> {
        let engine = self.engine().await?;
        let mut files = engine.scratch.scope(scope);

        let video_path = files.write("input.mp4", video).await?;
        let audio_path = files.write("audio.mp3", audio).await?;
        let output = files.reserve("output.mp4");
        info!("Combining {} bytes of audio with {} bytes of video", audio.len(), video.len());

        let command = self.command_builder.remux(&video_path, &audio_path, &output);
        command.execute_with_progress(None, progress).await?;

        let remuxed = files.read(&output).await?;
        info!("Remux completed ({} bytes)", remuxed.len());
        Ok(remuxed)
    }

    fn list_files(&self) -> Result<Vec<String>> {
        match self.engine.get() {
            Some(engine) => engine.scratch.list(),
            None => Ok(Vec::new()),
        }
    }

    async fn version(&self) -> Result<String> {
        let engine = self.engine().await?;
        debug!("Codec scratch space: {}", engine.scratch.path().display());
        Ok(engine.version.clone())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Common prologue of the fake ffmpeg scripts: answers `-version` and
    /// finds the first input and the output path.
    const PROLOGUE: &str = r#"#!/bin/sh
if [ "$1" = "-version" ]; then
  echo "ffmpeg version 6.1-test Copyright (c) the FFmpeg developers"
  exit 0
fi
first_in=""
prev=""
out=""
for a in "$@"; do
  if [ "$prev" = "-i" ] && [ -z "$first_in" ]; then first_in="$a"; fi
  prev="$a"
  out="$a"
done
"#;

    const COPY_WITH_PROGRESS: &str = r#"
echo "  Duration: 00:00:10.00, start: 0.000000, bitrate: 128 kb/s" >&2
sleep 0.2
echo "out_time_us=2500000"
echo "progress=continue"
echo "out_time_us=2500000"
echo "progress=continue"
echo "out_time_us=7500000"
echo "progress=continue"
echo "out_time_us=10000000"
echo "progress=end"
cat "$first_in" > "$out"
"#;

    const NO_AUDIO_STREAM: &str = r#"
echo "Output file #0 does not contain any stream" >&2
exit 1
"#;

    const PARTIAL_THEN_FAIL: &str = r#"
head -c 16 "$first_in" > "$out"
echo "Could not write header for output file #0 (incorrect codec parameters ?)" >&2
exit 1
"#;

    const HEADER_ONLY: &str = r#"
head -c 44 /dev/zero > "$out"
"#;

    const HANGS: &str = r#"
exec sleep 30
"#;

    fn fake_ffmpeg(dir: &Path, body: &str) -> String {
        let path = dir.join("ffmpeg");
        std::fs::write(&path, format!("{}{}", PROLOGUE, body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().to_string()
    }

    fn codec(dir: &TempDir, body: &str, timeout_secs: u64) -> FfmpegCodec {
        FfmpegCodec::new(CodecConfig {
            binary_path: fake_ffmpeg(dir.path(), body),
            extraction_timeout_secs: timeout_secs,
            sample_rate: 24_000,
            scratch_dir: Some(dir.path().join("scratch")),
        })
    }

    fn fake_video() -> Vec<u8> {
        (0..200u8).collect()
    }

    #[tokio::test]
    async fn test_extract_audio_reports_progress_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let codec = codec(&dir, COPY_WITH_PROGRESS, 30);
        let seen = Mutex::new(Vec::new());
        let record = |p: u8| seen.lock().unwrap().push(p);
        let progress: ProgressFn<'_> = &record;

        let audio = codec.extract_audio("job-a", &fake_video(), Some(progress)).await.unwrap();

        assert_eq!(audio, fake_video());
        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.last(), Some(&100));
        assert!(seen.windows(2).all(|w| w[0] < w[1]), "progress not increasing: {:?}", seen);
        assert!(codec.list_files().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remux_returns_output_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let codec = codec(&dir, COPY_WITH_PROGRESS, 30);

        let remuxed = codec.remux("job-b", &fake_video(), b"mp3 data", None).await.unwrap();

        assert_eq!(remuxed, fake_video());
        assert!(codec.list_files().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_remux_cleans_up() {
        let dir = TempDir::new().unwrap();
        let codec = codec(&dir, PARTIAL_THEN_FAIL, 30);

        let err = codec.remux("job-f", &fake_video(), b"mp3 data", None).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::CodecExecution);
        assert!(err.to_string().contains("Could not write header"));
        assert!(codec.list_files().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_video_without_audio_is_codec_error() {
        let dir = TempDir::new().unwrap();
        let codec = codec(&dir, NO_AUDIO_STREAM, 30);

        let err = codec.extract_audio("job-c", &fake_video(), None).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::CodecExecution);
        assert!(err.to_string().contains("does not contain any stream"));
        assert!(codec.list_files().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_header_only_wav_is_codec_error() {
        let dir = TempDir::new().unwrap();
        let codec = codec(&dir, HEADER_ONLY, 30);

        let err = codec.extract_audio("job-d", &fake_video(), None).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::CodecExecution);
        assert!(codec.list_files().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_extraction_timeout_leaves_no_files() {
        let dir = TempDir::new().unwrap();
        let codec = codec(&dir, HANGS, 1);

        let started = std::time::Instant::now();
        let err = codec.extract_audio("job-e", &fake_video(), None).await.unwrap_err();

        assert!(matches!(err, RevoiceError::Timeout { seconds: 1, .. }));
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(codec.list_files().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_binary_is_engine_unavailable() {
        let codec = FfmpegCodec::new(CodecConfig {
            binary_path: "/nonexistent/revoice/ffmpeg".to_string(),
            extraction_timeout_secs: 30,
            sample_rate: 24_000,
            scratch_dir: None,
        });

        let err = codec.extract_audio("job-f", &fake_video(), None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EngineUnavailable);
        assert!(codec.list_files().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_engine_is_loaded_once_and_shared() {
        let dir = TempDir::new().unwrap();
        let codec = std::sync::Arc::new(codec(&dir, COPY_WITH_PROGRESS, 30));

        let version = codec.version().await.unwrap();
        assert!(version.starts_with("ffmpeg version 6.1-test"));

        let mut handles = Vec::new();
        for i in 0..4 {
            let codec = codec.clone();
            handles.push(tokio::spawn(async move {
                codec.extract_audio(&format!("job-{}", i), &fake_video(), None).await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), fake_video());
        }
        assert!(codec.list_files().unwrap().is_empty());
    }
}
