//! Cooking Coach: photograph ingredients or a dish, get a recipe,
//! step-by-step guidance and feedback from a multimodal model.
//!
//! Module map:
//!   - capture/: camera stream + file input → CapturedImage
//!   - llm/: prompts, Gemini + relay backends, normalizer
//!   - workflow.rs: ingredients → cooking → finished state machine
//!   - pipeline.rs: the Coach, capture → analyze → normalize → apply
//!   - speech.rs / voice.rs: spoken feedback queue, voice commands
//!   - relay.rs: HTTP relay that holds the credential
//!   - config.rs: settings file, env overrides, keychain

pub mod capture;
pub mod config;
pub mod llm;
pub mod pipeline;
pub mod relay;
pub mod speech;
pub mod voice;
pub mod workflow;

pub use pipeline::{Coach, TriggerOutcome};
pub use workflow::{Stage, WorkflowState};

/// Load `.env.local` then `.env` from the working directory and start
/// logging. Variables already set win over both files, and `.env.local`
/// wins over `.env`. Safe to call more than once.
pub fn init() {
    for env_file in [".env.local", ".env"] {
        let path = std::path::Path::new(env_file);
        if path.exists() {
            match dotenvy::from_path(path) {
                Ok(_) => eprintln!("[STARTUP] Loaded {}", path.display()),
                Err(e) => eprintln!("[STARTUP] Failed to load {}: {}", path.display(), e),
            }
        }
    }

    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
