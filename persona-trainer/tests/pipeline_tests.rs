//! End-to-end training runs against the fake toolkit and voice engines

mod helpers;

use helpers::{
    accept_all, create_test_orchestrator, generate_test_wav, stub_video_analyzer,
    write_text_sample, AudioConfig, FakeToolkit, GatedEngine, RecordingEngine,
};
use persona_common::config::TrainingThresholds;
use persona_common::events::{EventBus, TrainingEvent};
use persona_trainer::models::{JobStatus, PersonaModel, TimeRange, TrainingData, TrainingProgress};
use persona_trainer::services::job_store::JobStore;
use persona_trainer::services::training_orchestrator::{
    ProgressCallback, TrainingOrchestrator, PERSONALITY_FEATURES_FILE, PERSONA_MODEL_FILE,
    VISUAL_FEATURES_FILE, VOICE_FEATURES_FILE,
};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

fn recorder() -> (ProgressCallback, Arc<Mutex<Vec<TrainingProgress>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let callback: ProgressCallback = Arc::new(move |p: &TrainingProgress| {
        sink.lock().unwrap().push(p.clone());
    });
    (callback, seen)
}

fn read_json(path: &Path) -> Value {
    let text = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("{}: {e}", path.display()));
    serde_json::from_str(&text).unwrap()
}

fn read_model(dir: &Path) -> PersonaModel {
    serde_json::from_value(read_json(&dir.join(PERSONA_MODEL_FILE))).unwrap()
}

#[tokio::test]
async fn test_text_only_persona() {
    let root = TempDir::new().unwrap();
    let inputs = TempDir::new().unwrap();
    let (orchestrator, engine) = create_test_orchestrator(root.path());

    let essay = write_text_sample(
        &inputs.path().join("essay.txt"),
        "I write short sentences. Do you? I certainly do!",
    )
    .unwrap();
    let blank = write_text_sample(&inputs.path().join("blank.txt"), "   \n").unwrap();
    let data = TrainingData {
        text: vec![essay, blank, inputs.path().join("missing.txt")],
        ..Default::default()
    };

    let (callback, seen) = recorder();
    assert!(orchestrator.train_persona("writer", data, Some(callback)).await);

    let dir = orchestrator.persona_dir("writer");
    let model = read_model(&dir);
    assert_eq!(model.persona_id, "writer");
    assert_eq!(model.sections(), vec!["personality_model"]);
    let style = &model.personality_model.unwrap().writing_style;
    assert!(style.punctuation_usage >= 2);

    // only the non-blank sample is kept
    assert!(dir.join("text/processed_000.txt").exists());
    assert!(!dir.join("text/processed_001.txt").exists());
    assert!(engine.calls().is_empty());

    // stage start, stage end, synthesis, completion
    let seen = seen.lock().unwrap();
    let percentages: Vec<f64> = seen.iter().map(|p| p.progress_percentage).collect();
    assert_eq!(percentages, vec![0.0, 100.0, 100.0, 100.0]);
    let steps: Vec<&str> = seen.iter().map(|p| p.current_step.as_str()).collect();
    assert_eq!(steps, vec!["text", "text", "synthesis", "completed"]);
    assert_eq!(seen.last().unwrap().status, JobStatus::Completed);

    let progress = orchestrator.training_progress("writer").await.unwrap();
    assert_eq!(progress.status, JobStatus::Completed);
    assert_eq!(progress.details, "Training completed successfully");
}

#[tokio::test]
async fn test_short_audio_reports_duration_issue() {
    let root = TempDir::new().unwrap();
    let inputs = TempDir::new().unwrap();
    let (orchestrator, _engine) = create_test_orchestrator(root.path());

    let clip = generate_test_wav(
        &inputs.path().join("short.wav"),
        &AudioConfig {
            duration_seconds: 3.0,
            ..Default::default()
        },
    )
    .unwrap();
    let data = TrainingData {
        audio: vec![clip.clone()],
        ..Default::default()
    };
    assert!(orchestrator.train_persona("short", data.clone(), None).await);

    let dir = orchestrator.persona_dir("short");
    let log = read_json(&dir.join("audio/audio_analysis.json"));
    assert_eq!(log["total_files"], 1);
    let record = &log["analyses"][0];
    assert_eq!(record["file_path"].as_str(), clip.to_str());
    let issues: Vec<String> =
        serde_json::from_value(record["training_suitability"]["issues"].clone()).unwrap();
    assert!(issues.iter().any(|i| i.contains("Audio too short")), "{issues:?}");
    let score = record["training_suitability"]["score"].as_u64().unwrap();
    assert!(score <= 100);

    // listed as suitable exactly when the score clears the default bar of 40
    let clears_bar = score as f64 >= TrainingThresholds::default().audio_acceptance;
    let suitable = log["suitable_files"].as_array().unwrap();
    assert_eq!(!suitable.is_empty(), clears_bar, "score {score}");
    assert_eq!(dir.join(VOICE_FEATURES_FILE).exists(), clears_bar);

    // a bar just above the score keeps the file out of every voice artifact
    let (orchestrator, engine) = create_test_orchestrator(root.path());
    let orchestrator = orchestrator.with_thresholds(TrainingThresholds {
        audio_acceptance: score as f64 + 1.0,
        ..TrainingThresholds::default()
    });
    assert!(orchestrator.train_persona("short-strict", data, None).await);

    let dir = orchestrator.persona_dir("short-strict");
    let log = read_json(&dir.join("audio/audio_analysis.json"));
    assert_eq!(log["analyses"].as_array().unwrap().len(), 1);
    assert_eq!(log["analyses"][0]["file_path"].as_str(), clip.to_str());
    assert!(log["suitable_files"].as_array().unwrap().is_empty());
    assert!(!dir.join(VOICE_FEATURES_FILE).exists());
    assert!(!dir.join("audio/voice_segments").exists());
    assert!(engine.calls().is_empty());
    assert!(read_model(&dir).voice_model.is_none());
}

#[tokio::test]
async fn test_audio_trains_voice_and_cuts_segments() {
    let root = TempDir::new().unwrap();
    let inputs = TempDir::new().unwrap();
    let (orchestrator, engine) = create_test_orchestrator(root.path());
    let orchestrator = orchestrator.with_thresholds(accept_all());

    let speech = generate_test_wav(
        &inputs.path().join("speech.wav"),
        &AudioConfig::phrases(3, 3.5, 2.5),
    )
    .unwrap();
    let data = TrainingData {
        audio: vec![speech.clone(), inputs.path().join("gone.wav")],
        ..Default::default()
    };
    assert!(orchestrator.train_persona("speaker", data, None).await);

    let dir = orchestrator.persona_dir("speaker");
    assert_eq!(engine.calls(), vec![vec![speech.clone()]]);
    assert!(dir.join(VOICE_FEATURES_FILE).exists());
    assert_eq!(read_model(&dir).sections(), vec!["voice_model"]);

    let log = read_json(&dir.join("audio/audio_analysis.json"));
    assert_eq!(log["total_files"], 2);
    assert_eq!(log["missing_files"].as_array().unwrap().len(), 1);
    assert_eq!(log["suitable_files"].as_array().unwrap().len(), 1);

    let segments = dir.join("audio/voice_segments");
    assert!(segments.join("segment_000.wav").exists());
    assert!(segments.join("segment_002.wav").exists());
    assert!(!segments.join("segment_003.wav").exists());
    let reader = hound::WavReader::open(segments.join("segment_000.wav")).unwrap();
    assert!(reader.duration() as f64 / reader.spec().sample_rate as f64 >= 3.0);
}

#[tokio::test]
async fn test_video_without_audio_track() {
    let root = TempDir::new().unwrap();
    let inputs = TempDir::new().unwrap();
    let toolkit = Arc::new(FakeToolkit::new(45.0));
    let engine = Arc::new(RecordingEngine::default());
    let orchestrator = TrainingOrchestrator::new(root.path(), JobStore::new(), EventBus::new(64))
        .with_video_analyzer(stub_video_analyzer(toolkit.clone()))
        .with_voice_engine(engine.clone());

    let video = inputs.path().join("interview.mp4");
    std::fs::write(&video, b"placeholder container").unwrap();
    let data = TrainingData {
        video: vec![video.clone()],
        ..Default::default()
    };
    assert!(orchestrator.train_persona("silent", data, None).await);

    let dir = orchestrator.persona_dir("silent");
    let model = read_model(&dir);
    assert_eq!(model.sections(), vec!["visual_model"]);
    assert!(dir.join(VISUAL_FEATURES_FILE).exists());
    assert!(!dir.join(VOICE_FEATURES_FILE).exists());
    assert!(engine.calls().is_empty());

    // no voice segments, so fixed 30 s chunks
    assert_eq!(
        toolkit.cuts(),
        vec![TimeRange::new(0.0, 30.0), TimeRange::new(30.0, 45.0)]
    );
    let log = read_json(&dir.join("video/video_analysis.json"));
    // clips are keyed by the video they came from
    let clips = log["clips"].as_object().unwrap();
    assert_eq!(clips.len(), 1);
    let cut = clips[video.to_str().unwrap()].as_array().unwrap();
    assert_eq!(cut.len(), 2);
    assert!(cut[0].as_str().unwrap().contains("clips_000"));
    assert_eq!(log["extracted_audio"]["total_files"], 0);
    let record = &log["analyses"][0];
    assert_eq!(record["basic_info"]["has_audio"], false);
    assert_eq!(record["audio_features"]["status"], "unavailable");
    assert_eq!(record["visual_features"]["status"], "ok");
}

#[tokio::test]
async fn test_clip_audio_joins_voice_training() {
    let root = TempDir::new().unwrap();
    let inputs = TempDir::new().unwrap();
    let soundtrack = generate_test_wav(
        &inputs.path().join("soundtrack.wav"),
        &AudioConfig {
            duration_seconds: 40.0,
            ..Default::default()
        },
    )
    .unwrap();
    let speech = generate_test_wav(&inputs.path().join("speech.wav"), &AudioConfig::default()).unwrap();
    let video = inputs.path().join("talk.mp4");
    std::fs::write(&video, b"placeholder container").unwrap();

    let engine = Arc::new(RecordingEngine::default());
    let orchestrator = TrainingOrchestrator::new(root.path(), JobStore::new(), EventBus::new(64))
        .with_video_analyzer(stub_video_analyzer(
            FakeToolkit::new(45.0).with_soundtrack(&soundtrack),
        ))
        .with_voice_engine(engine.clone())
        .with_thresholds(accept_all());

    let data = TrainingData {
        audio: vec![speech.clone()],
        video: vec![video],
        ..Default::default()
    };
    assert!(orchestrator.train_persona("presenter", data, None).await);

    let calls = engine.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], vec![speech.clone()]);
    // direct uploads first, then clip tracks
    assert_eq!(calls[1][0], speech);
    assert!(calls[1].len() > 1);
    let track = calls[1][1].file_name().unwrap().to_string_lossy().into_owned();
    assert!(track.starts_with("clip_audio_000_training_clip_01"), "{track}");

    let model = read_model(&orchestrator.persona_dir("presenter"));
    assert_eq!(model.sections(), vec!["voice_model", "visual_model"]);
}

#[tokio::test]
async fn test_unsuitable_rerun_removes_stale_voice_features() {
    let root = TempDir::new().unwrap();
    let inputs = TempDir::new().unwrap();
    let speech = generate_test_wav(&inputs.path().join("speech.wav"), &AudioConfig::default()).unwrap();
    let short = generate_test_wav(
        &inputs.path().join("short.wav"),
        &AudioConfig {
            duration_seconds: 3.0,
            ..Default::default()
        },
    )
    .unwrap();

    let (lenient, _) = create_test_orchestrator(root.path());
    let lenient = lenient.with_thresholds(accept_all());
    let first = TrainingData {
        audio: vec![speech],
        ..Default::default()
    };
    assert!(lenient.train_persona("p1", first, None).await);
    let dir = lenient.persona_dir("p1");
    assert!(dir.join(VOICE_FEATURES_FILE).exists());

    // a clip under the minimum duration can never score full marks
    let (strict, engine) = create_test_orchestrator(root.path());
    let strict = strict.with_thresholds(TrainingThresholds {
        audio_acceptance: 100.0,
        ..TrainingThresholds::default()
    });
    let second = TrainingData {
        audio: vec![short],
        ..Default::default()
    };
    assert!(strict.train_persona("p1", second, None).await);
    assert!(engine.calls().is_empty());
    assert!(!dir.join(VOICE_FEATURES_FILE).exists());
    assert!(read_model(&dir).voice_model.is_none());
}

#[tokio::test]
async fn test_concurrent_personas_are_independent() {
    let root = TempDir::new().unwrap();
    let inputs = TempDir::new().unwrap();
    let (orchestrator, _engine) = create_test_orchestrator(root.path());

    let a = write_text_sample(&inputs.path().join("a.txt"), "First persona writes this.").unwrap();
    let b = write_text_sample(&inputs.path().join("b.txt"), "Second persona writes that!").unwrap();
    let data_a = TrainingData {
        text: vec![a],
        ..Default::default()
    };
    let data_b = TrainingData {
        text: vec![b],
        ..Default::default()
    };

    let (done_a, done_b) = tokio::join!(
        orchestrator.train_persona("alpha", data_a, None),
        orchestrator.train_persona("beta", data_b, None),
    );
    assert!(done_a && done_b);

    for id in ["alpha", "beta"] {
        let model = read_model(&orchestrator.persona_dir(id));
        assert_eq!(model.persona_id, id);
        assert_eq!(
            orchestrator.training_progress(id).await.unwrap().status,
            JobStatus::Completed
        );
    }
    let jobs = orchestrator.jobs().list().await;
    assert_eq!(jobs.len(), 2);
    assert_eq!(orchestrator.jobs().active_count().await, 0);
}

#[tokio::test]
async fn test_cancel_stops_at_next_stage() {
    let root = TempDir::new().unwrap();
    let inputs = TempDir::new().unwrap();
    let (engine, entered, release) = GatedEngine::new();
    let bus = EventBus::new(256);
    let mut events = bus.subscribe();
    let orchestrator = TrainingOrchestrator::new(root.path(), JobStore::new(), bus)
        .with_video_analyzer(stub_video_analyzer(FakeToolkit::new(45.0)))
        .with_voice_engine(Arc::new(engine))
        .with_thresholds(accept_all());

    let speech = generate_test_wav(&inputs.path().join("speech.wav"), &AudioConfig::default()).unwrap();
    let essay = write_text_sample(&inputs.path().join("essay.txt"), "Never reached.").unwrap();
    let data = TrainingData {
        audio: vec![speech],
        text: vec![essay],
        ..Default::default()
    };

    let (callback, seen) = recorder();
    let handle = orchestrator
        .submit("p1", data.clone(), Some(callback))
        .await
        .unwrap();

    // voice training is in flight inside the audio stage
    tokio::task::spawn_blocking(move || entered.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(orchestrator.submit("p1", data, None).await.is_none());
    assert!(orchestrator.cancel_training("p1").await);
    release.send(()).unwrap();

    assert!(!handle.await.unwrap());

    // the audio stage finished, nothing after it ran
    let dir = orchestrator.persona_dir("p1");
    let log = read_json(&dir.join("audio/audio_analysis.json"));
    assert_eq!(log["suitable_files"].as_array().unwrap().len(), 1);
    assert!(dir.join(VOICE_FEATURES_FILE).exists());
    assert!(!dir.join(PERSONA_MODEL_FILE).exists());
    assert!(!dir.join("text").exists());
    assert!(!dir.join(PERSONALITY_FEATURES_FILE).exists());

    let progress = orchestrator.training_progress("p1").await.unwrap();
    assert_eq!(progress.status, JobStatus::Cancelled);
    assert!(progress.progress_percentage < 100.0);
    assert!(!orchestrator.cancel_training("p1").await);

    // nothing after the terminal snapshot
    let seen = seen.lock().unwrap();
    assert_eq!(seen.last().unwrap().status, JobStatus::Cancelled);
    assert_eq!(
        seen.iter().filter(|p| p.status.is_terminal()).count(),
        1,
        "{seen:?}"
    );

    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        kinds.push(event.event_type().to_string());
    }
    assert_eq!(kinds.first().map(String::as_str), Some("TrainingStarted"));
    assert_eq!(kinds.last().map(String::as_str), Some("TrainingCancelled"));
}

#[tokio::test]
async fn test_stage_failure_fails_job() {
    let root = TempDir::new().unwrap();
    let inputs = TempDir::new().unwrap();
    let bus = EventBus::new(64);
    let mut events = bus.subscribe();
    let orchestrator = TrainingOrchestrator::new(root.path(), JobStore::new(), bus)
        .with_voice_engine(Arc::new(RecordingEngine::default()));

    // a file where the text output directory should go
    let dir = orchestrator.persona_dir("broken");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("text"), b"in the way").unwrap();

    let essay = write_text_sample(&inputs.path().join("essay.txt"), "Some words.").unwrap();
    let data = TrainingData {
        text: vec![essay],
        ..Default::default()
    };
    let (callback, seen) = recorder();
    assert!(!orchestrator.train_persona("broken", data, Some(callback)).await);

    let progress = orchestrator.training_progress("broken").await.unwrap();
    assert_eq!(progress.status, JobStatus::Failed);
    assert!(progress.details.starts_with("text stage failed"), "{}", progress.details);
    assert!(!dir.join(PERSONA_MODEL_FILE).exists());
    assert_eq!(seen.lock().unwrap().last().unwrap().status, JobStatus::Failed);

    let mut failure = None;
    while let Ok(event) = events.try_recv() {
        if let TrainingEvent::TrainingFailed { error, .. } = event {
            failure = Some(error);
        }
    }
    assert!(failure.unwrap().contains("text stage failed"));
}

#[tokio::test]
async fn test_unknown_persona() {
    let root = TempDir::new().unwrap();
    let (orchestrator, _) = create_test_orchestrator(root.path());
    assert!(orchestrator.training_progress("nobody").await.is_none());
    assert!(!orchestrator.cancel_training("nobody").await);
}
