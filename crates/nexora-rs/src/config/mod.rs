use std::{env, fs};

use serde::{Deserialize, Serialize};

use crate::errors::{EngineError, Result};
use crate::models::ScanMode;

/// Process-wide configuration: tool binary paths, per-mode timeouts and the
/// adapter concurrency bound. Loaded once at startup and passed around as an
/// `Arc`, never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_url: String,
    /// Explicit binary paths override command-name lookup on PATH.
    pub nmap_path: Option<String>,
    pub zap_path: Option<String>,
    pub arachni_path: Option<String>,
    pub arachni_reporter_path: Option<String>,
    /// Dry-run switch: adapters emit tagged placeholder findings instead of
    /// spawning their tool.
    pub simulate: bool,
    pub quick_timeout_secs: u64,
    pub balanced_timeout_secs: u64,
    pub deep_timeout_secs: u64,
    pub max_concurrent_tools: usize,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let path = env::var("NEXORA_CONFIG").unwrap_or_else(|_| "config.json".to_string());
        let file_cfg: Option<AppConfig> = match fs::read_to_string(&path) {
            Ok(raw) => Some(
                serde_json::from_str(&raw)
                    .map_err(|e| EngineError::Config(format!("failed to parse {path}: {e}")))?,
            ),
            Err(_) => None,
        };

        let mut cfg = file_cfg.unwrap_or_default();

        if let Ok(v) = env::var("NEXORA_DATABASE_URL") {
            cfg.database_url = v;
        }
        if let Ok(v) = env::var("NEXORA_NMAP_PATH") {
            cfg.nmap_path = Some(v);
        }
        if let Ok(v) = env::var("NEXORA_ZAP_PATH") {
            cfg.zap_path = Some(v);
        }
        if let Ok(v) = env::var("NEXORA_ARACHNI_PATH") {
            cfg.arachni_path = Some(v);
        }
        if let Ok(v) = env::var("NEXORA_ARACHNI_REPORTER_PATH") {
            cfg.arachni_reporter_path = Some(v);
        }
        if let Ok(v) = env::var("NEXORA_SIMULATE") {
            cfg.simulate = matches!(v.as_str(), "1" | "true" | "yes");
        }
        if let Ok(v) = env::var("NEXORA_MAX_CONCURRENT_TOOLS") {
            cfg.max_concurrent_tools = v.parse().unwrap_or(cfg.max_concurrent_tools);
        }

        if cfg.max_concurrent_tools == 0 {
            return Err(EngineError::Config(
                "max_concurrent_tools must be at least 1".to_string(),
            ));
        }

        Ok(cfg)
    }

    pub fn timeout_secs(&self, mode: ScanMode) -> u64 {
        match mode {
            ScanMode::Quick => self.quick_timeout_secs,
            ScanMode::Balanced => self.balanced_timeout_secs,
            ScanMode::Deep => self.deep_timeout_secs,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://nexora.db".to_string(),
            nmap_path: None,
            zap_path: None,
            arachni_path: None,
            arachni_reporter_path: None,
            simulate: false,
            quick_timeout_secs: 120,
            balanced_timeout_secs: 600,
            deep_timeout_secs: 1800,
            max_concurrent_tools: 2,
        }
    }
}
