#![cfg(unix)]

use serde_json::json;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use revoice::config::Config;
use revoice::error::ErrorKind;
use revoice::job::{JobRequest, JobStage, VideoSource};
use revoice::language::{SourceLanguage, TargetLanguage};
use revoice::media::MediaCodecFactory;
use revoice::progress::{NoopObserver, ProgressEvent};
use revoice::workflow::Workflow;

const FAKE_FFMPEG: &str = r#"#!/bin/sh
if [ "$1" = "-version" ]; then
  echo "ffmpeg version 6.1-test"
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
echo "  Duration: 00:00:04.00, start: 0.000000, bitrate: 64 kb/s" >&2
sleep 0.1
echo "out_time_us=1000000"
echo "progress=continue"
echo "out_time_us=4000000"
echo "progress=end"
cat "$first_in" > "$out"
"#;

fn fake_video() -> Vec<u8> {
    (0..=255u8).cycle().take(1024).collect()
}

async fn mock_services(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/audio/transcriptions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": "Добрый день, друзья"})))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "Добрий день, друзі"}}]
        })))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/v1/text-to-speech/[A-Za-z0-9]+$"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ID3 dubbed".to_vec()))
        .expect(1)
        .mount(server)
        .await;
}

fn config(dir: &Path, server: &MockServer) -> Config {
    let binary = dir.join("ffmpeg");
    std::fs::write(&binary, FAKE_FFMPEG).unwrap();
    std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755)).unwrap();

    let mut config = Config::default();
    config.codec.binary_path = binary.to_string_lossy().to_string();
    config.codec.scratch_dir = Some(dir.to_path_buf());
    config.transcriber.endpoint = format!("{}/v1/audio/transcriptions", server.uri());
    config.transcriber.api_key = Some("gateway-key".to_string());
    config.translate.endpoint = format!("{}/v1/chat/completions", server.uri());
    config.translate.api_key = Some("gateway-key".to_string());
    config.synthesis.endpoint = format!("{}/v1/text-to-speech", server.uri());
    config.synthesis.api_key = Some("tts-key".to_string());
    config.storage.output_dir = dir.join("output");
    config
}

#[tokio::test]
async fn test_video_is_translated_end_to_end() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    mock_services(&server).await;

    let config = config(dir.path(), &server);
    let codec = MediaCodecFactory::create_shared(config.codec.clone());
    let workflow = Workflow::new(&config, codec.clone()).unwrap();

    let events = Arc::new(Mutex::new(Vec::<ProgressEvent>::new()));
    let sink = events.clone();
    let observer = move |event: &ProgressEvent| sink.lock().unwrap().push(event.clone());

    let request = JobRequest {
        video: fake_video(),
        source_language: SourceLanguage::Ru,
        target_language: TargetLanguage::Uk,
    };
    let outcome = workflow.run(request, &observer).await.unwrap();

    assert_eq!(outcome.original_text, "Добрый день, друзья");
    assert_eq!(outcome.translated_text, "Добрий день, друзі");

    let saved = std::fs::read(&outcome.artifact.location).unwrap();
    assert_eq!(saved, fake_video());
    assert!(outcome.artifact.name.starts_with("translated-"));
    assert!(outcome.artifact.name.ends_with(".mp4"));

    let events = events.lock().unwrap();
    assert!(events.windows(2).all(|w| w[0].percent <= w[1].percent));
    assert_eq!(events.last().map(|e| e.percent), Some(100));
    assert!(events.iter().all(|e| e.percent < 100 || e.eta_seconds == Some(0)));

    assert!(codec.list_files().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_synthesis_key_makes_no_requests() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = config(dir.path(), &server);
    config.synthesis.api_key = None;
    config.synthesis.api_key_env = "REVOICE_TEST_UNSET_PIPELINE_KEY".to_string();
    let codec = MediaCodecFactory::create_shared(config.codec.clone());
    let workflow = Workflow::new(&config, codec.clone()).unwrap();

    let err = workflow
        .translate_source(
            VideoSource::Bytes(fake_video()),
            SourceLanguage::En,
            TargetLanguage::Uk,
            &NoopObserver,
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(codec.list_files().unwrap().is_empty());
}

#[tokio::test]
async fn test_service_failure_names_the_stage() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/audio/transcriptions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = config(dir.path(), &server);
    let codec = MediaCodecFactory::create_shared(config.codec.clone());
    let workflow = Workflow::new(&config, codec.clone()).unwrap();

    let request = JobRequest {
        video: fake_video(),
        source_language: SourceLanguage::Auto,
        target_language: TargetLanguage::En,
    };
    let err = workflow.run(request, &NoopObserver).await.unwrap_err();

    assert_eq!(err.stage(), Some(JobStage::Transcribing));
    assert_eq!(err.kind(), ErrorKind::TranscriptionService);
    assert!(err.to_string().contains("transcribing"));
    assert!(codec.list_files().unwrap().is_empty());
}

#[tokio::test]
async fn test_batch_processes_directory() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/audio/transcriptions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": "hello"})))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "привіт"}}]
        })))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/v1/text-to-speech/.+$"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mp3".to_vec()))
        .expect(2)
        .mount(&server)
        .await;

    let inputs = dir.path().join("inputs");
    std::fs::create_dir_all(&inputs).unwrap();
    std::fs::write(inputs.join("one.mp4"), fake_video()).unwrap();
    std::fs::write(inputs.join("two.mov"), fake_video()).unwrap();
    std::fs::write(inputs.join("empty.mkv"), b"").unwrap();
    std::fs::write(inputs.join("readme.txt"), b"not a video").unwrap();

    let config = config(dir.path(), &server);
    let codec = MediaCodecFactory::create_shared(config.codec.clone());
    let workflow = Arc::new(Workflow::new(&config, codec).unwrap());

    let summary = workflow
        .process_directory(&inputs, SourceLanguage::En, TargetLanguage::Uk)
        .await
        .unwrap();

    assert_eq!(summary.completed.len(), 2);
    assert_eq!(summary.failed.len(), 1);
    assert!(summary.failed[0].0.ends_with("empty.mkv"));
}
