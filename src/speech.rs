//! Spoken feedback: an ordered utterance queue with one consumer.
//!
//! Producers `push` text; a single background task speaks one item at a
//! time through a `Speaker`, pausing briefly between items. Utterances
//! never overlap and play in arrival order. There is no mid-utterance
//! cancellation: `close` lets the queue drain.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Speech synthesizers tried in order, first one on PATH wins.
const SYNTHESIZERS: &[&str] = &["say", "espeak-ng", "espeak"];

#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("{program} exited with {status}")]
    Failed { program: String, status: String },
}

#[async_trait]
pub trait Speaker: Send + Sync {
    fn id(&self) -> &str;

    /// Speak `text`, returning once the utterance has finished.
    async fn speak(&self, text: &str) -> Result<(), SpeechError>;
}

/// Speaks through a command-line synthesizer (`say` on macOS, espeak on Linux).
#[derive(Debug, Clone)]
pub struct CommandSpeaker {
    program: PathBuf,
}

impl CommandSpeaker {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// First synthesizer found on PATH, if any.
    pub fn detect() -> Option<Self> {
        SYNTHESIZERS.iter().find_map(|name| {
            let path = which::which(name).ok()?;
            log::info!("[SPEECH] Using synthesizer: {}", path.display());
            Some(Self::new(path))
        })
    }
}

#[async_trait]
impl Speaker for CommandSpeaker {
    fn id(&self) -> &str {
        "command"
    }

    async fn speak(&self, text: &str) -> Result<(), SpeechError> {
        let program = self.program.display().to_string();
        let status = tokio::process::Command::new(&self.program)
            .arg(text)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|source| SpeechError::Spawn {
                program: program.clone(),
                source,
            })?;
        if !status.success() {
            return Err(SpeechError::Failed {
                program,
                status: status.to_string(),
            });
        }
        Ok(())
    }
}

/// Writes utterances to the log. Used when no synthesizer is installed.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSpeaker;

#[async_trait]
impl Speaker for LogSpeaker {
    fn id(&self) -> &str {
        "log"
    }

    async fn speak(&self, text: &str) -> Result<(), SpeechError> {
        log::info!("[SPEECH] {}", text);
        Ok(())
    }
}

/// The platform synthesizer when one exists, otherwise the log.
pub fn default_speaker() -> Arc<dyn Speaker> {
    match CommandSpeaker::detect() {
        Some(speaker) => Arc::new(speaker),
        None => {
            log::info!("[SPEECH] No synthesizer on PATH, logging utterances instead");
            Arc::new(LogSpeaker)
        }
    }
}

/// Handle to the utterance queue. Must be created inside a tokio runtime.
pub struct UtteranceQueue {
    tx: mpsc::UnboundedSender<String>,
    speaking: Arc<AtomicBool>,
    pending: Arc<AtomicUsize>,
    worker: JoinHandle<()>,
}

impl UtteranceQueue {
    pub fn spawn(speaker: Arc<dyn Speaker>, gap: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let speaking = Arc::new(AtomicBool::new(false));
        let pending = Arc::new(AtomicUsize::new(0));
        let worker = tokio::spawn(consume(
            rx,
            speaker,
            gap,
            speaking.clone(),
            pending.clone(),
        ));
        Self {
            tx,
            speaking,
            pending,
            worker,
        }
    }

    /// Queue `text` for speaking. Blank text is dropped. Returns whether
    /// the text was queued.
    pub fn push(&self, text: impl Into<String>) -> bool {
        let text = text.into();
        if text.trim().is_empty() {
            return false;
        }
        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(text).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            log::warn!("[SPEECH] Queue consumer is gone, dropping utterance");
            return false;
        }
        true
    }

    /// True while an utterance is playing.
    pub fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }

    /// Utterances queued but not yet started.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Stop accepting utterances and wait for the queue to drain.
    pub async fn close(self) {
        drop(self.tx);
        if let Err(e) = self.worker.await {
            log::error!("[SPEECH] Queue consumer panicked: {}", e);
        }
    }
}

async fn consume(
    mut rx: mpsc::UnboundedReceiver<String>,
    speaker: Arc<dyn Speaker>,
    gap: Duration,
    speaking: Arc<AtomicBool>,
    pending: Arc<AtomicUsize>,
) {
    while let Some(text) = rx.recv().await {
        pending.fetch_sub(1, Ordering::SeqCst);
        speaking.store(true, Ordering::SeqCst);
        let start = std::time::Instant::now();
        match speaker.speak(&text).await {
            Ok(()) => log::debug!(
                "[SPEECH] Spoke {} chars via {} in {}ms",
                text.chars().count(),
                speaker.id(),
                start.elapsed().as_millis()
            ),
            Err(e) => log::warn!("[SPEECH] {}", e),
        }
        speaking.store(false, Ordering::SeqCst);

        if pending.load(Ordering::SeqCst) > 0 && !gap.is_zero() {
            tokio::time::sleep(gap).await;
        }
    }
    log::debug!("[SPEECH] Queue closed");
}
