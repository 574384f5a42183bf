//! Capture → analyze → normalize → apply.
//!
//! `Coach` is the single owner of the workflow state. Every trigger runs
//! the whole chain sequentially; a trigger that arrives while one is in
//! flight is ignored without touching the network.

use crate::capture::{CaptureError, CapturedImage, ImageSource, MediaCapture};
use crate::llm::{self, AnalysisBackend, AnalysisError, AnalysisRequest, AnalysisResult, ParsePath};
use crate::speech::UtteranceQueue;
use crate::voice::{parse_command, VoiceCommand};
use crate::workflow::{Stage, Transition, TransitionError, WorkflowState};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum CoachError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// Where a displayed result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Parsed (or synthesized) from the model's reply.
    Model(ParsePath),
    /// Sample data shown because the call failed.
    Placeholder,
    /// No credential; the result carries the error.
    Unavailable,
}

#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub stage: Stage,
    pub result: AnalysisResult,
    pub origin: Origin,
    pub transition: Transition,
    pub elapsed_ms: u128,
}

#[derive(Debug, Clone)]
pub enum TriggerOutcome {
    /// Another analysis was already running.
    Ignored,
    Completed(PipelineReport),
}

/// What a voice command ended up doing.
#[derive(Debug, Clone)]
pub enum VoiceReply {
    Unrecognized,
    Navigated { command: VoiceCommand, moved: bool },
    CookingStarted,
    CameraStarted,
    Captured(TriggerOutcome),
}

/// Call the backend under a deadline and normalize its reply.
///
/// The request (and its image) is consumed; nothing outlives the call.
pub async fn run_analysis(
    backend: &dyn AnalysisBackend,
    request: AnalysisRequest,
    timeout: Duration,
) -> Result<(AnalysisResult, ParsePath), AnalysisError> {
    let stage = request.stage();
    let raw = tokio::time::timeout(timeout, backend.analyze(&request))
        .await
        .map_err(|_| AnalysisError::Timeout(timeout))??;
    Ok(llm::normalize_detailed(&raw, stage))
}

/// Clears the processing flag on every exit path.
struct ProcessingGuard<'a> {
    state: &'a Mutex<WorkflowState>,
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        lock(self.state).end_processing();
    }
}

fn lock(state: &Mutex<WorkflowState>) -> MutexGuard<'_, WorkflowState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Coach {
    state: Mutex<WorkflowState>,
    capture: tokio::sync::Mutex<MediaCapture>,
    backend: Arc<dyn AnalysisBackend>,
    speech: Option<UtteranceQueue>,
    timeout: Duration,
}

impl Coach {
    pub fn new(backend: Arc<dyn AnalysisBackend>, capture: MediaCapture) -> Self {
        Self {
            state: Mutex::new(WorkflowState::new()),
            capture: tokio::sync::Mutex::new(capture),
            backend,
            speech: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_speech(mut self, queue: UtteranceQueue) -> Self {
        self.speech = Some(queue);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Copy of the current state, for rendering.
    pub fn snapshot(&self) -> WorkflowState {
        lock(&self.state).clone()
    }

    pub fn backend_id(&self) -> &str {
        self.backend.id()
    }

    /// Acquire an image and run it through the analysis chain.
    ///
    /// Capture errors are returned before any analysis happens. Analysis
    /// errors never surface here: they become placeholder or unavailable
    /// results.
    pub async fn capture_and_analyze(&self, source: ImageSource) -> Result<TriggerOutcome, CaptureError> {
        let stage = {
            let mut state = lock(&self.state);
            if !state.begin_processing() {
                log::info!("[PIPELINE] Analysis already in progress, ignoring trigger");
                return Ok(TriggerOutcome::Ignored);
            }
            state.stage()
        };
        let _processing = ProcessingGuard { state: &self.state };

        let start = std::time::Instant::now();
        let image = self.capture.lock().await.acquire_image(&source).await?;
        log::info!("[PIPELINE] Image acquired in {}ms", start.elapsed().as_millis());

        let report = self.analyze_image(stage, image, start).await;
        log::info!(
            "[PIPELINE] {} analysis complete: {:?}, {:?} ({}ms)",
            report.stage,
            report.origin,
            report.transition,
            report.elapsed_ms
        );
        Ok(TriggerOutcome::Completed(report))
    }

    async fn analyze_image(
        &self,
        stage: Stage,
        image: CapturedImage,
        start: std::time::Instant,
    ) -> PipelineReport {
        let request = AnalysisRequest::new(stage, image);
        let (result, origin) = match run_analysis(self.backend.as_ref(), request, self.timeout).await {
            Ok((result, path)) => (result, Origin::Model(path)),
            Err(e) if e.is_configuration() => {
                log::error!("[PIPELINE] {}", e);
                (AnalysisResult::unavailable(stage, e.to_string()), Origin::Unavailable)
            }
            Err(e) => {
                log::warn!("[PIPELINE] Analysis failed, showing sample result: {}", e);
                (AnalysisResult::placeholder(stage), Origin::Placeholder)
            }
        };

        let transition = lock(&self.state).apply_result(result.clone());

        if origin != Origin::Placeholder && transition != Transition::DiscardedStale {
            if let (Some(queue), Some(text)) = (&self.speech, result.spoken_summary()) {
                queue.push(text);
            }
        }

        PipelineReport {
            stage,
            result,
            origin,
            transition,
            elapsed_ms: start.elapsed().as_millis(),
        }
    }

    pub fn next_step(&self) -> bool {
        lock(&self.state).next_step()
    }

    pub fn previous_step(&self) -> bool {
        lock(&self.state).previous_step()
    }

    pub fn start_cooking(&self) -> Result<(), TransitionError> {
        lock(&self.state).start_cooking()
    }

    pub fn finish(&self) -> Result<(), TransitionError> {
        lock(&self.state).finish()
    }

    pub fn restart(&self) -> Result<(), TransitionError> {
        lock(&self.state).restart()
    }

    pub async fn start_camera(&self) -> Result<(), CaptureError> {
        self.capture.lock().await.start_camera().await
    }

    pub async fn stop_camera(&self) {
        self.capture.lock().await.stop_camera();
    }

    pub async fn is_camera_active(&self) -> bool {
        self.capture.lock().await.is_camera_active()
    }

    /// Act on a recognized transcript.
    ///
    /// "take photo" opens the camera when it is closed and captures when
    /// it is already showing a preview.
    pub async fn handle_voice(&self, transcript: &str) -> Result<VoiceReply, CoachError> {
        let Some(command) = parse_command(transcript) else {
            log::debug!("[PIPELINE] No command in transcript: {:?}", transcript);
            return Ok(VoiceReply::Unrecognized);
        };
        log::info!("[PIPELINE] Voice command: {:?}", command);

        let reply = match command {
            VoiceCommand::NextStep => VoiceReply::Navigated {
                command,
                moved: self.next_step(),
            },
            VoiceCommand::PreviousStep => VoiceReply::Navigated {
                command,
                moved: self.previous_step(),
            },
            VoiceCommand::StartCooking => {
                self.start_cooking()?;
                VoiceReply::CookingStarted
            }
            VoiceCommand::TakePhoto => {
                if self.is_camera_active().await {
                    VoiceReply::Captured(self.capture_and_analyze(ImageSource::Camera).await?)
                } else {
                    self.start_camera().await?;
                    VoiceReply::CameraStarted
                }
            }
        };
        Ok(reply)
    }

    /// Release the camera and let queued speech finish.
    pub async fn shutdown(self) {
        self.capture.lock().await.stop_camera();
        if let Some(queue) = self.speech {
            queue.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Canned(&'static str);

    #[async_trait]
    impl AnalysisBackend for Canned {
        fn id(&self) -> &str {
            "canned"
        }

        async fn analyze(&self, _request: &AnalysisRequest) -> Result<String, AnalysisError> {
            Ok(self.0.to_string())
        }
    }

    struct Slow;

    #[async_trait]
    impl AnalysisBackend for Slow {
        fn id(&self) -> &str {
            "slow"
        }

        async fn analyze(&self, _request: &AnalysisRequest) -> Result<String, AnalysisError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("{}".into())
        }
    }

    fn request(stage: Stage) -> AnalysisRequest {
        AnalysisRequest::new(stage, CapturedImage::new(vec![0xFF, 0xD8, 0xFF], "image/jpeg"))
    }

    #[tokio::test]
    async fn run_analysis_normalizes_reply() {
        let backend = Canned("```json\n{\"feedback\":\"Nice sear\",\"looksgood\":true}\n```");
        let (result, path) = run_analysis(&backend, request(Stage::Cooking), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(path, ParsePath::Direct);
        assert_eq!(result.spoken_summary().as_deref(), Some("Nice sear"));
    }

    #[tokio::test]
    async fn run_analysis_times_out() {
        let err = run_analysis(&Slow, request(Stage::Finished), Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Timeout(d) if d == Duration::from_millis(20)));
        assert_eq!(err.to_string(), "analysis timed out after 20ms");
    }

    #[tokio::test]
    async fn timeout_becomes_placeholder() {
        let coach = Coach::new(Arc::new(Slow), MediaCapture::new(None))
            .with_timeout(Duration::from_millis(20));
        let report = coach
            .analyze_image(
                Stage::Ingredients,
                CapturedImage::new(vec![1], "image/jpeg"),
                std::time::Instant::now(),
            )
            .await;
        assert_eq!(report.origin, Origin::Placeholder);
        assert_eq!(report.transition, Transition::Entered(Stage::Cooking));
    }

    #[tokio::test]
    async fn capture_error_clears_processing_flag() {
        let coach = Coach::new(Arc::new(Canned("{}")), MediaCapture::new(None));
        let err = coach
            .capture_and_analyze(ImageSource::File(Default::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::NoFileSelected));
        assert!(!coach.snapshot().is_processing());
        assert!(coach.snapshot().last_result().is_none());
    }

    #[tokio::test]
    async fn unrecognized_voice_does_nothing() {
        let coach = Coach::new(Arc::new(Canned("{}")), MediaCapture::new(None));
        assert!(matches!(
            coach.handle_voice("what's for dinner").await.unwrap(),
            VoiceReply::Unrecognized
        ));
        assert!(matches!(
            coach.handle_voice("start cooking").await,
            Err(CoachError::Transition(TransitionError::NoRecipe))
        ));
    }
}
