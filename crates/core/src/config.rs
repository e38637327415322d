use std::env;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Placeholder value shipped in sample `.env` files.
const PLACEHOLDER_API_KEY: &str = "YOUR_API_KEY_HERE";

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_usize(profile: &str, key: &str, default: usize) -> usize {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub unsiloed: UnsiloedConfig,
    pub chunking: ChunkingConfig,
    pub moss: MossConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `MOSS_PROFILE` env var. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("MOSS_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            unsiloed: UnsiloedConfig::from_env_profiled(p),
            chunking: ChunkingConfig::from_env_profiled(p),
            moss: MossConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// The parse API key, or `ConfigMissing` when it is unset or still the
    /// sample placeholder.
    pub fn require_unsiloed_key(&self) -> Result<&str, CoreError> {
        self.unsiloed
            .api_key
            .as_deref()
            .filter(|k| *k != PLACEHOLDER_API_KEY)
            .ok_or_else(|| CoreError::ConfigMissing("UNSILOED_API_KEY".to_string()))
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  unsiloed:  url={}, key={}, poll={}s, max_wait={}s",
            self.unsiloed.base_url,
            if self.unsiloed.api_key.is_some() { "set" } else { "(none)" },
            self.unsiloed.poll_interval_secs,
            self.unsiloed.max_wait_secs
        );
        tracing::info!(
            "  chunking:  max_tokens={}, overlap={}",
            self.chunking.max_tokens_per_chunk,
            self.chunking.overlap_tokens
        );
        tracing::info!(
            "  moss:      index={}, model={}, top_k={}, configured={}",
            self.moss.index_name,
            self.moss.model_id,
            self.moss.top_k,
            self.moss.is_configured()
        );
    }
}

// ── Unsiloed parse API ────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnsiloedConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    /// Seconds between job status checks.
    pub poll_interval_secs: u64,
    /// Upper bound on total time spent waiting for a job.
    pub max_wait_secs: u64,
    /// Per-request HTTP timeout.
    pub request_timeout_secs: u64,
    pub segmentation_method: String,
    pub ocr_mode: String,
    pub ocr_engine: String,
}

impl UnsiloedConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            api_key: profiled_env_opt(p, "UNSILOED_API_KEY"),
            base_url: profiled_env_or(p, "UNSILOED_BASE_URL", "https://prod.visionapi.unsiloed.ai"),
            poll_interval_secs: profiled_env_u64(p, "UNSILOED_POLL_INTERVAL_SECS", 5),
            max_wait_secs: profiled_env_u64(p, "UNSILOED_MAX_WAIT_SECS", 600),
            request_timeout_secs: profiled_env_u64(p, "UNSILOED_REQUEST_TIMEOUT_SECS", 120),
            segmentation_method: profiled_env_or(
                p,
                "UNSILOED_SEGMENTATION_METHOD",
                "Smart Layout Detection",
            ),
            ocr_mode: profiled_env_or(p, "UNSILOED_OCR_MODE", "Process All Content"),
            ocr_engine: profiled_env_or(p, "UNSILOED_OCR_ENGINE", "UnsiloedHawk"),
        }
    }
}

// ── Chunking ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub max_tokens_per_chunk: usize,
    pub overlap_tokens: usize,
}

impl ChunkingConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            max_tokens_per_chunk: profiled_env_usize(p, "CHUNK_MAX_TOKENS", 100),
            overlap_tokens: profiled_env_usize(p, "CHUNK_OVERLAP_TOKENS", 25),
        }
    }
}

// ── Moss index ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MossConfig {
    pub project_id: Option<String>,
    pub project_key: Option<String>,
    pub index_name: String,
    pub model_id: String,
    pub top_k: usize,
}

impl MossConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            project_id: profiled_env_opt(p, "MOSS_PROJECT_ID"),
            project_key: profiled_env_opt(p, "MOSS_PROJECT_KEY"),
            index_name: profiled_env_or(p, "MOSS_INDEX_NAME", "TalkToPdf-index-livekit"),
            model_id: profiled_env_or(p, "MOSS_MODEL_ID", "moss-minilm"),
            top_k: profiled_env_usize(p, "MOSS_TOP_K", 6),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.project_id.is_some() && self.project_key.is_some()
    }
}

// ── Tests ─────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Env-based tests must run serially to avoid interfering with each other.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        let keys = [
            "MOSS_PROFILE",
            "UNSILOED_API_KEY",
            "UNSILOED_BASE_URL",
            "UNSILOED_POLL_INTERVAL_SECS",
            "UNSILOED_MAX_WAIT_SECS",
            "CHUNK_MAX_TOKENS",
            "CHUNK_OVERLAP_TOKENS",
            "MOSS_PROJECT_ID",
            "MOSS_PROJECT_KEY",
            "MOSS_INDEX_NAME",
            "MOSS_TOP_K",
            "TEST_UNSILOED_API_KEY",
            "TEST_CHUNK_MAX_TOKENS",
        ];
        for k in keys {
            env::remove_var(k);
        }
    }

    #[test]
    fn defaults_when_no_env_vars() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        let cfg = Config::for_profile("");

        assert_eq!(cfg.profile_label(), "default");
        assert_eq!(cfg.unsiloed.base_url, "https://prod.visionapi.unsiloed.ai");
        assert_eq!(cfg.unsiloed.poll_interval_secs, 5);
        assert_eq!(cfg.unsiloed.max_wait_secs, 600);
        assert_eq!(cfg.unsiloed.ocr_engine, "UnsiloedHawk");
        assert_eq!(cfg.chunking.max_tokens_per_chunk, 100);
        assert_eq!(cfg.chunking.overlap_tokens, 25);
        assert_eq!(cfg.moss.model_id, "moss-minilm");
        assert_eq!(cfg.moss.top_k, 6);
        assert!(!cfg.moss.is_configured());
    }

    #[test]
    fn profile_prefix_takes_precedence() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        env::set_var("CHUNK_MAX_TOKENS", "200");
        env::set_var("TEST_CHUNK_MAX_TOKENS", "300");
        env::set_var("CHUNK_OVERLAP_TOKENS", "not-a-number");

        let cfg = Config::for_profile("test");
        assert_eq!(cfg.profile, "TEST");
        assert_eq!(cfg.chunking.max_tokens_per_chunk, 300);
        // Unparseable values fall back to the default.
        assert_eq!(cfg.chunking.overlap_tokens, 25);

        let cfg = Config::for_profile("");
        assert_eq!(cfg.chunking.max_tokens_per_chunk, 200);

        clear_env();
    }

    #[test]
    fn missing_api_key_is_config_error() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        let cfg = Config::for_profile("");
        assert!(matches!(
            cfg.require_unsiloed_key(),
            Err(CoreError::ConfigMissing(ref k)) if k == "UNSILOED_API_KEY"
        ));

        env::set_var("UNSILOED_API_KEY", "YOUR_API_KEY_HERE");
        assert!(Config::for_profile("").require_unsiloed_key().is_err());

        env::set_var("UNSILOED_API_KEY", "secret");
        assert_eq!(Config::for_profile("").require_unsiloed_key().unwrap(), "secret");

        clear_env();
    }

    #[test]
    fn empty_value_counts_as_unset() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        env::set_var("UNSILOED_API_KEY", "");
        let cfg = Config::for_profile("");
        assert!(cfg.unsiloed.api_key.is_none());

        clear_env();
    }
}
