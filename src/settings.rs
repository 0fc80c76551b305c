//! Persisted module settings.
//!
//! Stored as `google_vision_settings.json` in the host's config directory.
//! The API key is the only required value; everything else has a default.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, VisionError};
use crate::retry::RetryConfig;
use crate::types::{ApiCredential, LikelihoodSet, VisionConfig, DEFAULT_ENDPOINT};
use crate::validation::SafeSearchPolicy;

pub const SETTINGS_FILENAME: &str = "google_vision_settings.json";

/// Environment variable that overrides the stored API key.
pub const API_KEY_ENV: &str = "GOOGLE_VISION_API_KEY";

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionSettings {
    pub api_key: String,
    pub endpoint: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// Safe-search likelihoods that reject an upload.
    pub safe_search_thresholds: LikelihoodSet,
}

impl Default for VisionSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: 10,
            max_retries: RetryConfig::default().max_retries,
            safe_search_thresholds: LikelihoodSet::explicit_content(),
        }
    }
}

impl std::fmt::Debug for VisionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisionSettings")
            .field("api_key", &if self.api_key.is_empty() { "" } else { "***" })
            .field("endpoint", &self.endpoint)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("safe_search_thresholds", &self.safe_search_thresholds)
            .finish()
    }
}

impl VisionSettings {
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// Store a new key. The key is required, so blank input is refused.
    pub fn set_api_key(&mut self, api_key: &str) -> Result<()> {
        let trimmed = api_key.trim();
        if trimmed.is_empty() {
            return Err(VisionError::Settings("Google Vision API key is required".into()));
        }
        self.api_key = trimmed.to_string();
        Ok(())
    }

    /// Apply `GOOGLE_VISION_API_KEY` when it is set and non-empty.
    pub fn with_env_override(mut self) -> Self {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                tracing::debug!("Using Google Vision API key from environment");
                self.api_key = key.trim().to_string();
            }
        }
        self
    }

    pub fn to_config(&self) -> VisionConfig {
        VisionConfig {
            api_key: ApiCredential::new(self.api_key.clone()),
            ..Default::default()
        }
        .endpoint(self.endpoint.clone())
        .timeout(Duration::from_secs(self.timeout_secs.max(1)))
        .retry(RetryConfig::default().with_max_retries(self.max_retries))
    }

    pub fn safe_search_policy(&self) -> SafeSearchPolicy {
        SafeSearchPolicy::default().with_thresholds(self.safe_search_thresholds.clone())
    }
}

/// Load settings. A missing file yields defaults and writes them out.
pub fn load(config_dir: &Path) -> Result<VisionSettings> {
    let path = config_dir.join(SETTINGS_FILENAME);

    if path.exists() {
        let contents = fs::read_to_string(&path)
            .map_err(|e| VisionError::Settings(format!("Failed to read settings file: {e}")))?;
        serde_json::from_str(&contents)
            .map_err(|e| VisionError::Settings(format!("Invalid settings JSON: {e}")))
    } else {
        let settings = VisionSettings::default();
        save(config_dir, &settings)?;
        Ok(settings)
    }
}

pub fn save(config_dir: &Path, settings: &VisionSettings) -> Result<()> {
    fs::create_dir_all(config_dir)
        .map_err(|e| VisionError::Settings(format!("Failed to create config dir: {e}")))?;

    let path = config_dir.join(SETTINGS_FILENAME);
    let contents = serde_json::to_string_pretty(settings)?;
    fs::write(&path, contents)
        .map_err(|e| VisionError::Settings(format!("Failed to write settings file: {e}")))?;

    tracing::info!(has_api_key = settings.has_api_key(), "Google Vision settings saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Likelihood;
    use tempfile::TempDir;

    #[test]
    fn load_creates_default_when_missing() {
        let dir = TempDir::new().unwrap();
        let settings = load(dir.path()).unwrap();
        assert!(!settings.has_api_key());
        assert_eq!(settings.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(settings.timeout_secs, 10);
        assert!(dir.path().join(SETTINGS_FILENAME).exists());
    }

    #[test]
    fn save_and_load() {
        let dir = TempDir::new().unwrap();
        let mut settings = VisionSettings::default();
        settings.set_api_key("  my-key ").unwrap();
        settings.safe_search_thresholds =
            LikelihoodSet::new([Likelihood::Possible, Likelihood::Likely, Likelihood::VeryLikely]);

        save(dir.path(), &settings).unwrap();
        let loaded = load(dir.path()).unwrap();
        assert_eq!(loaded, settings);
        assert_eq!(loaded.api_key, "my-key");
    }

    #[test]
    fn blank_key_is_refused() {
        let mut settings = VisionSettings::default();
        assert!(settings.set_api_key("   ").is_err());
        assert!(!settings.has_api_key());
    }

    #[test]
    fn partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(SETTINGS_FILENAME),
            r#"{"api_key": "abc", "safe_search_thresholds": ["VERY_LIKELY"]}"#,
        )
        .unwrap();

        let settings = load(dir.path()).unwrap();
        assert_eq!(settings.api_key, "abc");
        assert_eq!(settings.max_retries, 2);
        assert!(settings.safe_search_policy().thresholds.contains(Likelihood::VeryLikely));
        assert!(!settings.safe_search_policy().thresholds.contains(Likelihood::Likely));
    }

    #[test]
    fn invalid_json_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(SETTINGS_FILENAME), "not json").unwrap();
        let err = load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("Invalid settings JSON"));
    }

    #[test]
    fn to_config_carries_values() {
        let settings = VisionSettings {
            api_key: "k".into(),
            endpoint: "http://localhost:1234/annotate/".into(),
            timeout_secs: 3,
            max_retries: 0,
            ..Default::default()
        };
        let config = settings.to_config();
        assert!(config.is_configured());
        assert_eq!(config.endpoint, "http://localhost:1234/annotate");
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.retry.max_retries, 0);

        assert!(!VisionSettings::default().to_config().is_configured());
    }

    #[test]
    fn env_overrides_stored_key() {
        // Only this test touches the variable.
        std::env::set_var(API_KEY_ENV, "from-env");
        let settings = VisionSettings {
            api_key: "stored".into(),
            ..Default::default()
        }
        .with_env_override();
        std::env::remove_var(API_KEY_ENV);
        assert_eq!(settings.api_key, "from-env");
    }

    #[test]
    fn debug_hides_key() {
        let settings = VisionSettings {
            api_key: "secret".into(),
            ..Default::default()
        };
        assert!(!format!("{settings:?}").contains("secret"));
    }
}
