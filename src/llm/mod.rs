//! LLM domain: prompt selection, analysis backends, reply normalization.
//!
//! Public API for the analysis half of the pipeline.
//!
//! Backends:
//!   - Google Gemini, called directly (gemini.rs)
//!   - a relay that forwards to Gemini server-side (relay_client.rs)
//!
//! Shared:
//!   - provider.rs: backend trait, request type, errors, resolution
//!   - normalize.rs: fence stripping + JSON recovery + fallbacks
//!   - types.rs: per-stage result shapes

pub mod gemini;
mod lenient;
pub mod normalize;
pub mod prompts;
pub mod provider;
pub mod relay_client;
pub mod types;

pub use gemini::GeminiClient;
pub use normalize::{normalize, normalize_detailed, ParsePath};
pub use prompts::{select_prompt, PromptTemplate};
pub use provider::{resolve_backend, AnalysisBackend, AnalysisError, AnalysisRequest, MISSING_KEY};
pub use relay_client::RelayClient;
pub use types::{AnalysisResult, Recipe};
