//! Integration tests for the capture → analyze → apply pipeline.
//!
//! Backends are in-process fakes (or a real client pointed at a closed
//! port), and the camera is a fake device producing a solid-color frame.

use async_trait::async_trait;
use cooking_coach_lib::capture::{
    CameraDevice, CaptureError, FacingMode, ImageSource, MediaCapture, VideoStream,
};
use cooking_coach_lib::llm::{
    AnalysisBackend, AnalysisError, AnalysisRequest, GeminiClient, RelayClient,
};
use cooking_coach_lib::pipeline::{Coach, Origin, TriggerOutcome};
use cooking_coach_lib::speech::{SpeechError, Speaker, UtteranceQueue};
use cooking_coach_lib::workflow::Transition;
use cooking_coach_lib::Stage;
use image::{DynamicImage, Rgb, RgbImage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

struct FakeCamera;
struct FakeStream;

impl CameraDevice for FakeCamera {
    fn name(&self) -> &str {
        "fake"
    }

    fn open(&self, _facing: FacingMode) -> Result<Box<dyn VideoStream>, CaptureError> {
        Ok(Box::new(FakeStream))
    }
}

impl VideoStream for FakeStream {
    fn grab_frame(&mut self) -> Result<DynamicImage, CaptureError> {
        Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb([240, 200, 60]))))
    }

    fn stop(&mut self) {}
}

fn camera() -> MediaCapture {
    MediaCapture::new(Some(Arc::new(FakeCamera)))
}

/// Replies with fixed text per stage and counts calls.
struct Scripted {
    calls: AtomicUsize,
    reply: fn(Stage) -> Result<String, AnalysisError>,
}

#[async_trait]
impl AnalysisBackend for Scripted {
    fn id(&self) -> &str {
        "scripted"
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<String, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(request.image().mime_type(), "image/jpeg");
        (self.reply)(request.stage())
    }
}

/// Blocks inside `analyze` until released.
struct Gated {
    calls: AtomicUsize,
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl AnalysisBackend for Gated {
    fn id(&self) -> &str {
        "gated"
    }

    async fn analyze(&self, _request: &AnalysisRequest) -> Result<String, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        self.release.notified().await;
        Ok(r#"{"feedback":"Keep going"}"#.to_string())
    }
}

#[derive(Default)]
struct Recorder {
    spoken: Mutex<Vec<String>>,
}

#[async_trait]
impl Speaker for Recorder {
    fn id(&self) -> &str {
        "recorder"
    }

    async fn speak(&self, text: &str) -> Result<(), SpeechError> {
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

fn completed(outcome: TriggerOutcome) -> cooking_coach_lib::pipeline::PipelineReport {
    match outcome {
        TriggerOutcome::Completed(report) => report,
        TriggerOutcome::Ignored => panic!("trigger was ignored"),
    }
}

/// A local port with nothing listening on it.
async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/api/analyze-image")
}

#[tokio::test]
async fn transport_failure_yields_placeholder_and_clears_processing() {
    let backend = RelayClient::new(&closed_port_url().await, Duration::from_secs(2));
    let coach = Coach::new(Arc::new(backend), camera());

    let report = completed(coach.capture_and_analyze(ImageSource::Camera).await.unwrap());
    eprintln!("[TEST] origin={:?} transition={:?}", report.origin, report.transition);

    assert_eq!(report.origin, Origin::Placeholder);
    let recipe = report.result.recipe().expect("placeholder recipe");
    assert_eq!(recipe.name.as_deref(), Some("Mediterranean Chicken Stir-Fry"));

    let state = coach.snapshot();
    assert!(!state.is_processing());
    assert_eq!(state.stage(), Stage::Cooking);
    assert!(!coach.is_camera_active().await);
}

#[tokio::test]
async fn error_status_yields_placeholder_for_every_stage() {
    let backend = Arc::new(Scripted {
        calls: AtomicUsize::new(0),
        reply: |_| {
            Err(AnalysisError::Network {
                status: 503,
                body: "overloaded".into(),
            })
        },
    });
    let coach = Coach::new(backend.clone(), camera());

    let ingredients = completed(coach.capture_and_analyze(ImageSource::Camera).await.unwrap());
    assert_eq!(ingredients.stage, Stage::Ingredients);
    let cooking = completed(coach.capture_and_analyze(ImageSource::Camera).await.unwrap());
    assert_eq!(cooking.stage, Stage::Cooking);
    assert_eq!(cooking.transition, Transition::Stayed);
    coach.finish().unwrap();
    let finished = completed(coach.capture_and_analyze(ImageSource::Camera).await.unwrap());
    assert_eq!(finished.stage, Stage::Finished);

    for report in [ingredients, cooking, finished] {
        assert_eq!(report.origin, Origin::Placeholder);
    }
    assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    assert!(!coach.snapshot().is_processing());
}

#[tokio::test]
async fn back_to_back_triggers_make_one_call() {
    let backend = Arc::new(Gated {
        calls: AtomicUsize::new(0),
        entered: Notify::new(),
        release: Notify::new(),
    });
    let coach = Arc::new(Coach::new(backend.clone(), camera()));
    coach.start_camera().await.unwrap();

    let first = tokio::spawn({
        let coach = coach.clone();
        async move { coach.capture_and_analyze(ImageSource::Camera).await }
    });

    backend.entered.notified().await;
    assert!(coach.snapshot().is_processing());

    let second = coach.capture_and_analyze(ImageSource::Camera).await.unwrap();
    assert!(matches!(second, TriggerOutcome::Ignored));

    backend.release.notify_one();
    let first = first.await.unwrap().unwrap();
    assert!(matches!(first, TriggerOutcome::Completed(_)));

    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    assert!(!coach.snapshot().is_processing());
}

#[tokio::test]
async fn missing_credential_is_shown_as_unavailable() {
    let client = GeminiClient::new(
        None,
        "http://127.0.0.1:9",
        "gemini-2.0-flash",
        Duration::from_secs(1),
    );
    let coach = Coach::new(Arc::new(client), camera());

    let report = completed(coach.capture_and_analyze(ImageSource::Camera).await.unwrap());
    assert_eq!(report.origin, Origin::Unavailable);
    assert!(report.result.error().unwrap().contains("API key not configured"));

    let state = coach.snapshot();
    assert_eq!(state.stage(), Stage::Ingredients);
    assert!(state.last_result().and_then(|r| r.error()).is_some());
}

#[tokio::test]
async fn omelette_session_with_voice_and_speech() {
    let backend = Arc::new(Scripted {
        calls: AtomicUsize::new(0),
        reply: |stage| {
            Ok(match stage {
                Stage::Ingredients => "```json\n{\"ingredients\":[\"egg\"],\"recipe\":{\"name\":\"Omelette\",\"steps\":[\"crack egg\",\"cook\"]}}\n```",
                Stage::Cooking => "{\"feedback\":\"The eggs are setting nicely\",\"looksgood\":true}",
                Stage::Finished => "{\"presentation\":{\"score\":4,\"assessment\":\"Neat fold\"},\"compliments\":\"Great!\"}",
            }
            .to_string())
        },
    });
    let speaker = Arc::new(Recorder::default());
    let coach = Coach::new(backend, camera())
        .with_speech(UtteranceQueue::spawn(speaker.clone(), Duration::ZERO));

    let report = completed(coach.capture_and_analyze(ImageSource::Camera).await.unwrap());
    assert_eq!(report.transition, Transition::Entered(Stage::Cooking));
    assert_eq!(coach.snapshot().current_step(), Some("crack egg"));

    coach.handle_voice("next step").await.unwrap();
    assert_eq!(coach.snapshot().current_step(), Some("cook"));
    coach.handle_voice("continue").await.unwrap();
    assert_eq!(coach.snapshot().current_step_index(), 1);
    coach.handle_voice("go back").await.unwrap();
    assert_eq!(coach.snapshot().current_step_index(), 0);

    // Camera closed: first "take photo" opens it, the second captures.
    coach.handle_voice("take photo").await.unwrap();
    assert!(coach.is_camera_active().await);
    coach.handle_voice("take photo").await.unwrap();
    assert!(!coach.is_camera_active().await);
    assert_eq!(coach.snapshot().stage(), Stage::Cooking);

    coach.finish().unwrap();
    coach.capture_and_analyze(ImageSource::Camera).await.unwrap();
    coach.restart().unwrap();
    assert_eq!(coach.snapshot().stage(), Stage::Ingredients);
    assert!(coach.snapshot().recipe().is_none());

    coach.shutdown().await;
    assert_eq!(
        *speaker.spoken.lock().unwrap(),
        vec!["The eggs are setting nicely", "Neat fold"]
    );
}

#[tokio::test]
async fn unreadable_file_is_reported_before_any_call() {
    let backend = Arc::new(Scripted {
        calls: AtomicUsize::new(0),
        reply: |_| Ok("{}".into()),
    });
    let coach = Coach::new(backend.clone(), MediaCapture::new(None));

    let path = std::env::temp_dir().join(format!("cooking-coach-not-an-image-{}.txt", std::process::id()));
    std::fs::write(&path, "definitely not pixels").unwrap();
    let err = coach
        .capture_and_analyze(ImageSource::File(path.clone()))
        .await
        .unwrap_err();
    let _ = std::fs::remove_file(&path);

    assert!(matches!(err, CaptureError::UnsupportedFormat));
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    assert!(!coach.snapshot().is_processing());
}
