use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::config::{Config, PipelineConfig};
use crate::error::{Result, RevoiceError};
use crate::job::{Job, JobRequest, JobStage, TranslationOutcome, VideoSource};
use crate::language::{SourceLanguage, TargetLanguage};
use crate::media::{MediaCodec, ProgressFn};
use crate::progress::{LoggingObserver, ProgressObserver, ProgressTracker, band_progress};
use crate::storage::{ArtifactStore, LocalArtifactStore, artifact_name};
use crate::synthesize::{SpeechSynthesizer, SynthesizerFactory};
use crate::transcribe::{SpeechTranscriber, TranscriberFactory};
use crate::translate::{TextTranslator, TranslatorFactory};

// Containers whose usual video codecs can be stream-copied into the MP4 output
const VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "m4v", "mov", "mkv"];

/// Drives jobs through extract, transcribe, translate, synthesize and remux.
pub struct Workflow {
    pipeline: PipelineConfig,
    codec: Arc<dyn MediaCodec>,
    transcriber: Box<dyn SpeechTranscriber>,
    translator: Box<dyn TextTranslator>,
    synthesizer: Box<dyn SpeechSynthesizer>,
    store: Box<dyn ArtifactStore>,
}

/// Outcome of a directory run.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub completed: Vec<(PathBuf, TranslationOutcome)>,
    pub failed: Vec<(PathBuf, String)>,
}

impl Workflow {
    /// Build the workflow from configuration around a shared codec handle.
    pub fn new(config: &Config, codec: Arc<dyn MediaCodec>) -> Result<Self> {
        Ok(Self::with_components(
            config.pipeline.clone(),
            codec,
            TranscriberFactory::create_transcriber(config.transcriber.clone())?,
            TranslatorFactory::create_translator(config.translate.clone())?,
            SynthesizerFactory::create_synthesizer(config.synthesis.clone())?,
            Box::new(LocalArtifactStore::new(config.storage.clone())),
        ))
    }

    pub fn with_components(
        pipeline: PipelineConfig,
        codec: Arc<dyn MediaCodec>,
        transcriber: Box<dyn SpeechTranscriber>,
        translator: Box<dyn TextTranslator>,
        synthesizer: Box<dyn SpeechSynthesizer>,
        store: Box<dyn ArtifactStore>,
    ) -> Self {
        Self {
            pipeline,
            codec,
            transcriber,
            translator,
            synthesizer,
            store,
        }
    }

    /// Verify that every remote service has its credentials.
    pub fn check_availability(&self) -> Result<()> {
        self.transcriber.check_availability()?;
        self.translator.check_availability()?;
        self.synthesizer.check_availability()
    }

    /// Load the input and run a job on it.
    pub async fn translate_source(
        &self,
        source: VideoSource,
        source_language: SourceLanguage,
        target_language: TargetLanguage,
        observer: &dyn ProgressObserver,
    ) -> Result<TranslationOutcome> {
        let video = source.into_bytes().await?;
        self.run(
            JobRequest {
                video,
                source_language,
                target_language,
            },
            observer,
        )
        .await
    }

    /// Run one job to completion. The first failing stage aborts the job and
    /// its error is returned annotated with the stage.
    pub async fn run(&self, request: JobRequest, observer: &dyn ProgressObserver) -> Result<TranslationOutcome> {
        let mut job = Job::new(request);
        let tracker = ProgressTracker::new(observer);
        info!(
            "Starting job {} ({} -> {})",
            job.id, job.source_language, job.target_language
        );

        match self.drive(&mut job, &tracker).await {
            Ok(outcome) => {
                info!("Job {} completed in {:.1}s", job.id, outcome.elapsed_secs);
                Ok(outcome)
            }
            Err(err) => {
                let stage = job.stage();
                job.record_progress(tracker.percent(), tracker.eta_seconds());
                job.fail();
                error!("Job {} failed during {} at {}%: {}", job.id, stage, job.percent(), err);
                if stage == JobStage::Idle {
                    return Err(err);
                }
                // Same percentage as the last event, so the stream never decreases
                tracker.report(job.percent(), JobStage::Failed.description());
                Err(err.in_stage(stage))
            }
        }
    }

    async fn drive(&self, job: &mut Job, tracker: &ProgressTracker<'_>) -> Result<TranslationOutcome> {
        // Credentials are checked before any stage runs
        self.check_availability()?;

        let video = job
            .take_video()
            .ok_or_else(|| RevoiceError::Configuration("Job has no input video".to_string()))?;
        if video.is_empty() {
            return Err(RevoiceError::Configuration("Input video is empty".to_string()));
        }
        if exceeds_size_warning(video.len(), self.pipeline.large_input_warning_mb) {
            warn!(
                "Large video ({:.1} MB); processing may be slow",
                video.len() as f64 / (1024.0 * 1024.0)
            );
        }
        let scope = job.id.to_string();

        // Step 1: Extract audio
        self.enter(job, tracker, JobStage::Extracting)?;
        let audio = {
            let rescale = codec_progress(tracker, JobStage::Extracting);
            let on_progress: ProgressFn<'_> = &rescale;
            self.codec.extract_audio(&scope, &video, Some(on_progress)).await?
        };

        // Step 2: Transcribe
        self.enter(job, tracker, JobStage::Transcribing)?;
        let transcript = self.transcriber.transcribe(&audio, job.source_language).await?;
        drop(audio);
        if transcript.text.is_empty() {
            return Err(RevoiceError::TranscriptionService {
                status: 200,
                body: "transcript is empty".to_string(),
            });
        }

        // Step 3: Translate
        self.enter(job, tracker, JobStage::Translating)?;
        let source_code = match (job.source_language, transcript.language.as_deref()) {
            (SourceLanguage::Auto, Some(detected)) if !detected.trim().is_empty() => detected.trim(),
            (language, _) => language.code(),
        };
        let translated_text = self
            .translator
            .translate(&transcript.text, source_code, job.target_language.code())
            .await?;

        // Step 4: Synthesize
        self.enter(job, tracker, JobStage::Synthesizing)?;
        let dubbed_audio = self
            .synthesizer
            .synthesize(&translated_text, job.target_language.code())
            .await?;

        // Step 5: Remux
        self.enter(job, tracker, JobStage::Remuxing)?;
        let remuxed = {
            let rescale = codec_progress(tracker, JobStage::Remuxing);
            let on_progress: ProgressFn<'_> = &rescale;
            self.codec
                .remux(&scope, &video, &dubbed_audio, Some(on_progress))
                .await?
        };
        drop(video);
        drop(dubbed_audio);

        // Step 6: Hand the video to storage
        self.enter(job, tracker, JobStage::Finalizing)?;
        let artifact = self.store.store(&artifact_name(&job.id), &remuxed).await?;

        job.advance(JobStage::Completed)?;
        tracker.report(100, JobStage::Completed.description());
        job.record_progress(tracker.percent(), tracker.eta_seconds());

        Ok(TranslationOutcome {
            job_id: job.id,
            original_text: transcript.text,
            translated_text,
            detected_language: transcript.language,
            artifact,
            elapsed_secs: job.elapsed().as_secs_f64(),
        })
    }

    fn enter(&self, job: &mut Job, tracker: &ProgressTracker<'_>, stage: JobStage) -> Result<()> {
        job.advance(stage)?;
        tracker.report(stage.band().0, stage.description());
        job.record_progress(tracker.percent(), tracker.eta_seconds());
        match job.eta_seconds() {
            Some(eta) => info!("Job {}: {} ({}%, ~{}s left)", job.id, stage.description(), job.percent(), eta),
            None => info!("Job {}: {} ({}%)", job.id, stage.description(), job.percent()),
        }
        Ok(())
    }

    /// Translate every video under `input_dir`, running up to
    /// `max_concurrent_jobs` jobs at once. Failed jobs are logged and
    /// collected; they do not stop the batch.
    pub async fn process_directory(
        self: Arc<Self>,
        input_dir: &Path,
        source_language: SourceLanguage,
        target_language: TargetLanguage,
    ) -> Result<BatchSummary> {
        info!("Processing directory: {}", input_dir.display());

        if !input_dir.is_dir() {
            return Err(RevoiceError::Configuration(format!(
                "Input path is not a directory: {}",
                input_dir.display()
            )));
        }
        self.check_availability()?;

        let video_files = find_videos(input_dir);
        info!("Found {} video files to process", video_files.len());

        let semaphore = Arc::new(Semaphore::new(self.pipeline.max_concurrent_jobs.max(1)));
        let mut tasks = JoinSet::new();

        for path in video_files {
            let workflow = Arc::clone(&self);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                // The semaphore is never closed
                let _permit = semaphore.acquire_owned().await.ok();
                let observer = LoggingObserver::new(path.display().to_string());
                let result = workflow
                    .translate_source(VideoSource::File(path.clone()), source_language, target_language, &observer)
                    .await;
                (path, result)
            });
        }

        let mut summary = BatchSummary::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((path, Ok(outcome))) => {
                    info!("Successfully processed: {} -> {}", path.display(), outcome.artifact.location);
                    summary.completed.push((path, outcome));
                }
                Ok((path, Err(e))) => {
                    warn!("Failed to process {}: {}", path.display(), e);
                    summary.failed.push((path, e.to_string()));
                }
                Err(e) => warn!("Batch job panicked or was cancelled: {}", e),
            }
        }

        Ok(summary)
    }

    /// Extract the audio track of a video (standalone codec operation)
    pub async fn extract_audio(&self, video: &[u8]) -> Result<Vec<u8>> {
        self.codec.extract_audio("extract", video, None).await
    }

    /// Replace the audio track of a video (standalone codec operation)
    pub async fn remux(&self, video: &[u8], audio: &[u8]) -> Result<Vec<u8>> {
        self.codec.remux("remux", video, audio, None).await
    }
}

/// Progress callback rescaling codec progress into the stage's band.
fn codec_progress<'a>(tracker: &'a ProgressTracker<'_>, stage: JobStage) -> impl Fn(u8) + Send + Sync + 'a {
    let (start, end) = stage.band();
    move |percent| tracker.report(band_progress(start, end - start, percent), stage.description())
}

fn exceeds_size_warning(len: usize, threshold_mb: u64) -> bool {
    len as u64 > threshold_mb.saturating_mul(1024 * 1024)
}

fn find_videos(input_dir: &Path) -> Vec<PathBuf> {
    let mut video_files: Vec<PathBuf> = WalkDir::new(input_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .map(|entry| entry.path().to_path_buf())
        .collect();
    video_files.sort();
    video_files
}
