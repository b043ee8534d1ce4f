use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tracing::warn;
use url::Url;

pub const DEFAULT_GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_IMAGE_MAX_DIMENSION: u32 = 1024;
pub const DEFAULT_IMAGE_JPEG_QUALITY: u8 = 80;

/// Safety threshold profile attached to every generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyProfile {
    /// `BLOCK_ONLY_HIGH`, so ordinary face edits are not filtered.
    Relaxed,
    Standard,
    Permissive,
}

impl SafetyProfile {
    pub fn threshold(self) -> &'static str {
        match self {
            SafetyProfile::Relaxed => "BLOCK_ONLY_HIGH",
            SafetyProfile::Standard => "BLOCK_MEDIUM_AND_ABOVE",
            SafetyProfile::Permissive => "OFF",
        }
    }
}

/// Logging settings. Resolved on their own, before [`Config`], so config
/// warnings and errors reach the log writers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub log_level: String,
    pub log_dir: PathBuf,
}

impl Default for LogSettings {
    fn default() -> Self {
        LogSettings {
            log_level: "info".to_string(),
            log_dir: PathBuf::from("logs"),
        }
    }
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(&|name: &str| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        LogSettings {
            log_level: lookup_string(lookup, "LOG_LEVEL", "info").to_lowercase(),
            log_dir: PathBuf::from(lookup_string(lookup, "LOG_DIR", "logs")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub logging: LogSettings,
    pub gemini_api_key: String,
    pub gemini_image_model: String,
    pub gemini_api_base_url: Url,
    pub gemini_safety_settings: SafetyProfile,
    pub gemini_request_timeout: Duration,
    pub image_max_dimension: u32,
    pub image_jpeg_quality: u8,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            logging: LogSettings::default(),
            gemini_api_key: String::new(),
            gemini_image_model: DEFAULT_GEMINI_IMAGE_MODEL.to_string(),
            gemini_api_base_url: Url::parse(DEFAULT_GEMINI_API_BASE_URL)
                .expect("default Gemini base URL is valid"),
            gemini_safety_settings: SafetyProfile::Relaxed,
            gemini_request_timeout: Duration::from_secs(90),
            image_max_dimension: DEFAULT_IMAGE_MAX_DIMENSION,
            image_jpeg_quality: DEFAULT_IMAGE_JPEG_QUALITY,
        }
    }
}

fn lookup_string<F>(lookup: &F, name: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name).unwrap_or_else(|| default.to_string())
}

fn lookup_u64<F>(lookup: &F, name: &str, default: u64) -> u64
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn lookup_u32<F>(lookup: &F, name: &str, default: u32) -> u32
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .and_then(|value| value.trim().parse::<u32>().ok())
        .unwrap_or(default)
}

fn normalize_gemini_safety_settings(value: &str) -> SafetyProfile {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return SafetyProfile::Relaxed;
    }

    match trimmed.to_lowercase().as_str() {
        "relaxed" | "block_only_high" => SafetyProfile::Relaxed,
        "standard" => SafetyProfile::Standard,
        "permissive" | "off" | "none" => SafetyProfile::Permissive,
        _ => {
            warn!(
                "Unknown GEMINI_SAFETY_SETTINGS value '{}'; defaulting to relaxed.",
                value
            );
            SafetyProfile::Relaxed
        }
    }
}

fn normalize_base_url(value: &str) -> Result<Url> {
    let trimmed = value.trim().trim_end_matches('/');
    let url = Url::parse(trimmed)
        .map_err(|err| anyhow!("Invalid GEMINI_API_BASE_URL '{}': {}", value, err))?;
    if url.cannot_be_a_base() {
        return Err(anyhow!("GEMINI_API_BASE_URL '{}' cannot be a base URL", value));
    }
    Ok(url)
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Resolves configuration from an arbitrary variable source. An empty
    /// credential is accepted here; the generation client rejects it at call time.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let gemini_api_key = lookup("GEMINI_API_KEY")
            .filter(|value| !value.trim().is_empty())
            .or_else(|| lookup("API_KEY"))
            .unwrap_or_default()
            .trim()
            .to_string();

        let quality = lookup_u32(
            &lookup,
            "IMAGE_JPEG_QUALITY",
            u32::from(DEFAULT_IMAGE_JPEG_QUALITY),
        )
        .clamp(1, 100) as u8;

        Ok(Config {
            logging: LogSettings::from_lookup(&lookup),
            gemini_api_key,
            gemini_image_model: lookup_string(
                &lookup,
                "GEMINI_IMAGE_MODEL",
                DEFAULT_GEMINI_IMAGE_MODEL,
            ),
            gemini_api_base_url: normalize_base_url(&lookup_string(
                &lookup,
                "GEMINI_API_BASE_URL",
                DEFAULT_GEMINI_API_BASE_URL,
            ))?,
            gemini_safety_settings: normalize_gemini_safety_settings(&lookup_string(
                &lookup,
                "GEMINI_SAFETY_SETTINGS",
                "relaxed",
            )),
            gemini_request_timeout: Duration::from_secs(
                lookup_u64(&lookup, "GEMINI_REQUEST_TIMEOUT_SECONDS", 90).max(1),
            ),
            image_max_dimension: lookup_u32(
                &lookup,
                "IMAGE_MAX_DIMENSION",
                DEFAULT_IMAGE_MAX_DIMENSION,
            )
            .max(1),
            image_jpeg_quality: quality,
        })
    }

    pub fn has_api_key(&self) -> bool {
        !self.gemini_api_key.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Config::from_lookup(move |name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = config_from(&[]).unwrap();
        assert!(!config.has_api_key());
        assert_eq!(config.gemini_image_model, DEFAULT_GEMINI_IMAGE_MODEL);
        assert_eq!(config.gemini_safety_settings, SafetyProfile::Relaxed);
        assert_eq!(config.image_max_dimension, 1024);
        assert_eq!(config.image_jpeg_quality, 80);
        assert_eq!(config.gemini_request_timeout, Duration::from_secs(90));
    }

    #[test]
    fn falls_back_to_legacy_api_key_variable() {
        let config = config_from(&[("API_KEY", " legacy-key ")]).unwrap();
        assert_eq!(config.gemini_api_key, "legacy-key");

        let config = config_from(&[("API_KEY", "legacy"), ("GEMINI_API_KEY", "primary")]).unwrap();
        assert_eq!(config.gemini_api_key, "primary");
    }

    #[test]
    fn unknown_safety_profile_falls_back_to_relaxed() {
        let config = config_from(&[("GEMINI_SAFETY_SETTINGS", "paranoid")]).unwrap();
        assert_eq!(config.gemini_safety_settings, SafetyProfile::Relaxed);

        let config = config_from(&[("GEMINI_SAFETY_SETTINGS", "Standard")]).unwrap();
        assert_eq!(config.gemini_safety_settings.threshold(), "BLOCK_MEDIUM_AND_ABOVE");
    }

    #[test]
    fn rejects_malformed_base_url() {
        assert!(config_from(&[("GEMINI_API_BASE_URL", "not a url")]).is_err());
    }

    #[test]
    fn log_settings_resolve_even_when_gemini_config_is_invalid() {
        let vars: HashMap<&str, &str> = [
            ("LOG_LEVEL", "DEBUG"),
            ("LOG_DIR", "/tmp/barber-logs"),
            ("GEMINI_API_BASE_URL", "not a url"),
        ]
        .into_iter()
        .collect();
        let lookup = |name: &str| vars.get(name).map(|value| value.to_string());

        assert!(Config::from_lookup(lookup).is_err());
        assert_eq!(
            LogSettings::from_lookup(&lookup),
            LogSettings {
                log_level: "debug".to_string(),
                log_dir: PathBuf::from("/tmp/barber-logs"),
            }
        );
    }

    #[test]
    fn clamps_jpeg_quality() {
        let config = config_from(&[("IMAGE_JPEG_QUALITY", "250")]).unwrap();
        assert_eq!(config.image_jpeg_quality, 100);
    }
}
