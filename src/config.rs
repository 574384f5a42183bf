//! Settings persistence and credential resolution.
//!
//! Settings live in `~/.config/cooking-coach/settings.json` (platform
//! equivalent via `dirs`). A missing or invalid file yields defaults.
//! A few `COACH_*` environment variables override the file so the relay
//! can be configured without one.
//!
//! The Gemini key is never stored in the settings file:
//! 1. GOOGLE_AI_API_KEY env var
//! 2. GEMINI_API_KEY env var
//! 3. OS keychain (service "cooking-coach", user "gemini")

use crate::llm::gemini::{GenerationConfig, DEFAULT_API_BASE};
use crate::llm::prompts;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_DIR: &str = "cooking-coach";
const KEYRING_SERVICE: &str = "cooking-coach";
const KEYRING_USER: &str = "gemini";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to write settings: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),
    #[error("API key is empty")]
    EmptyKey,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub model: String,
    pub api_base: String,
    /// When set, analysis goes through this relay instead of Gemini.
    pub relay_url: Option<String>,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
    pub request_timeout_secs: u64,
    /// Frame file kept current by an external webcam tool.
    pub camera_snapshot: Option<PathBuf>,
    pub jpeg_quality: u8,
    pub speech_enabled: bool,
    /// Pause between spoken utterances.
    pub utterance_gap_ms: u64,
    pub relay_host: String,
    pub relay_port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: prompts::GEMINI_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            relay_url: None,
            temperature: prompts::TEMPERATURE,
            top_k: prompts::TOP_K,
            top_p: prompts::TOP_P,
            max_output_tokens: prompts::MAX_OUTPUT_TOKENS,
            request_timeout_secs: 30,
            camera_snapshot: None,
            jpeg_quality: crate::capture::JPEG_QUALITY,
            speech_enabled: true,
            utterance_gap_ms: 500,
            relay_host: "127.0.0.1".to_string(),
            relay_port: 8888,
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn generation_config(&self) -> GenerationConfig {
        GenerationConfig {
            temperature: self.temperature,
            top_k: self.top_k,
            top_p: self.top_p,
            max_output_tokens: self.max_output_tokens,
        }
    }

    pub fn utterance_gap(&self) -> Duration {
        Duration::from_millis(self.utterance_gap_ms)
    }

    /// Default settings file location.
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("settings.json")
    }

    /// Load from the default location, then apply environment overrides.
    pub fn load() -> Self {
        let mut settings = Self::load_from(&Self::path());
        settings.apply_env(|name| std::env::var(name).ok());
        settings
    }

    /// Read a settings file. Missing or invalid files give defaults.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                log::warn!("[SETTINGS] Ignoring invalid {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) -> Result<(), SettingsError> {
        self.save_to(&Self::path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        log::info!("[SETTINGS] Saved {}", path.display());
        Ok(())
    }

    /// Apply `COACH_*` overrides. Blank values are ignored, as are
    /// timeouts that don't parse.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| var(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(model) = get("COACH_MODEL") {
            self.model = model;
        }
        if let Some(base) = get("COACH_API_BASE") {
            self.api_base = base;
        }
        if let Some(url) = get("COACH_RELAY_URL") {
            self.relay_url = Some(url);
        }
        if let Some(secs) = get("COACH_TIMEOUT_SECS") {
            match secs.parse() {
                Ok(secs) => self.request_timeout_secs = secs,
                Err(_) => log::warn!("[SETTINGS] Ignoring COACH_TIMEOUT_SECS={}", secs),
            }
        }
        if let Some(path) = get("COACH_CAMERA_SNAPSHOT") {
            self.camera_snapshot = Some(PathBuf::from(path));
        }
    }
}

// ── Credentials ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    GoogleAiEnv,
    GeminiEnv,
    Keychain,
}

impl CredentialSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialSource::GoogleAiEnv => "GOOGLE_AI_API_KEY",
            CredentialSource::GeminiEnv => "GEMINI_API_KEY",
            CredentialSource::Keychain => "keychain",
        }
    }
}

#[derive(Clone)]
pub struct Credential {
    pub key: String,
    pub source: CredentialSource,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// Find the Gemini key: environment first, then the OS keychain.
pub fn resolve_credential() -> Option<Credential> {
    resolve_credential_with(|name| std::env::var(name).ok(), keychain_key)
}

fn resolve_credential_with(
    var: impl Fn(&str) -> Option<String>,
    keychain: impl FnOnce() -> Option<String>,
) -> Option<Credential> {
    let from_env = |name: &str, source| {
        var(name)
            .filter(|k| !k.trim().is_empty())
            .map(|key| Credential { key, source })
    };
    from_env("GOOGLE_AI_API_KEY", CredentialSource::GoogleAiEnv)
        .or_else(|| from_env("GEMINI_API_KEY", CredentialSource::GeminiEnv))
        .or_else(|| {
            let key = keychain().filter(|k| !k.is_empty())?;
            log::info!("[SETTINGS] Loaded Gemini key from OS keychain");
            Some(Credential {
                key,
                source: CredentialSource::Keychain,
            })
        })
}

fn keychain_key() -> Option<String> {
    keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER)
        .ok()?
        .get_password()
        .ok()
}

/// Save the Gemini key to the OS keychain.
pub fn save_api_key(api_key: &str) -> Result<(), SettingsError> {
    let api_key = api_key.trim();
    if api_key.is_empty() {
        return Err(SettingsError::EmptyKey);
    }
    keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER)?.set_password(api_key)?;
    log::info!("[SETTINGS] Gemini key saved to OS keychain");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_match_generation_constants() {
        let settings = Settings::default();
        assert_eq!(settings.request_timeout(), Duration::from_secs(30));
        assert_eq!(settings.generation_config(), GenerationConfig::default());
        assert!(settings.relay_url.is_none());
    }

    #[test]
    fn load_missing_file_returns_defaults() {
        let settings = Settings::load_from(Path::new("/nonexistent/cooking-coach/settings.json"));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn save_and_load_roundtrip_fills_missing_fields() {
        let path = std::env::temp_dir()
            .join(format!("cooking-coach-test-{}", std::process::id()))
            .join("settings.json");
        let settings = Settings {
            model: "gemini-test".into(),
            relay_port: 9999,
            ..Settings::default()
        };
        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path), settings);

        std::fs::write(&path, r#"{"model":"partial"}"#).unwrap();
        let partial = Settings::load_from(&path);
        assert_eq!(partial.model, "partial");
        assert_eq!(partial.top_k, 40);

        // Cleanup
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn env_overrides_apply_and_blank_values_are_ignored() {
        let mut settings = Settings::default();
        settings.apply_env(env(&[
            ("COACH_MODEL", "gemini-other"),
            ("COACH_RELAY_URL", "  "),
            ("COACH_TIMEOUT_SECS", "5"),
            ("COACH_CAMERA_SNAPSHOT", "/tmp/frame.jpg"),
        ]));
        assert_eq!(settings.model, "gemini-other");
        assert!(settings.relay_url.is_none());
        assert_eq!(settings.request_timeout_secs, 5);
        assert_eq!(settings.camera_snapshot, Some(PathBuf::from("/tmp/frame.jpg")));

        settings.apply_env(env(&[("COACH_TIMEOUT_SECS", "soon")]));
        assert_eq!(settings.request_timeout_secs, 5);
    }

    #[test]
    fn google_key_wins_over_gemini_key_and_keychain() {
        let both = env(&[("GOOGLE_AI_API_KEY", "g"), ("GEMINI_API_KEY", "m")]);
        let cred = resolve_credential_with(both, || Some("k".into())).unwrap();
        assert_eq!(cred.key, "g");
        assert_eq!(cred.source.as_str(), "GOOGLE_AI_API_KEY");

        let gemini_only = env(&[("GOOGLE_AI_API_KEY", ""), ("GEMINI_API_KEY", "m")]);
        let cred = resolve_credential_with(gemini_only, || None).unwrap();
        assert_eq!(cred.source, CredentialSource::GeminiEnv);
    }

    #[test]
    fn keychain_is_last_resort() {
        let cred = resolve_credential_with(env(&[]), || Some("k".into())).unwrap();
        assert_eq!(cred.source, CredentialSource::Keychain);
        assert!(resolve_credential_with(env(&[]), || Some(String::new())).is_none());
        assert!(resolve_credential_with(env(&[]), || None).is_none());
    }

    #[test]
    fn debug_output_hides_the_key() {
        let cred = Credential {
            key: "secret-key".into(),
            source: CredentialSource::GeminiEnv,
        };
        assert!(!format!("{:?}", cred).contains("secret-key"));
    }

    #[test]
    fn empty_key_is_rejected_before_keychain() {
        assert!(matches!(save_api_key("  "), Err(SettingsError::EmptyKey)));
    }
}
