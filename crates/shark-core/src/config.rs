//! Configuration loading, validation, and persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::types::{Coordinates, PlayerProfile};

/// Model used for chat, venue search, and review queries.
pub const DEFAULT_TEXT_MODEL: &str = "gemini-3-flash-preview";
/// Model used for the live coaching session.
pub const DEFAULT_LIVE_MODEL: &str = "gemini-2.5-flash-native-audio-preview-09-2025";
/// Prebuilt voice for spoken coaching.
pub const DEFAULT_VOICE: &str = "Charon";

/// Top-level Shark County configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gemini: Option<GeminiConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<PlayerProfile>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub matches: Option<MatchesConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

/// Gemini API configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Override for the text/review model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_model: Option<String>,

    /// Override for the live coaching model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub live_model: Option<String>,

    /// Override for the coach voice.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
}

impl GeminiConfig {
    /// Resolve the API key: check `api_key` first, then `api_key_env`.
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_secret_field(&self.api_key, &self.api_key_env)
    }
}

/// Geolocation configuration.
///
/// Fixed coordinates win over the IP lookup when both are present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,

    /// IP geolocation endpoint (default: http://ip-api.com/json).
    #[serde(default = "default_ip_api_url")]
    pub ip_api_url: String,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            lat: None,
            lng: None,
            ip_api_url: default_ip_api_url(),
        }
    }
}

fn default_ip_api_url() -> String {
    "http://ip-api.com/json".into()
}

impl LocationConfig {
    pub fn fixed_coordinates(&self) -> Option<Coordinates> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Some(Coordinates { lat, lng }),
            _ => None,
        }
    }
}

/// Match finder configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchesConfig {
    /// Default scan radius in miles (default: 10).
    #[serde(default = "default_radius_miles")]
    pub radius_miles: f64,
}

fn default_radius_miles() -> f64 {
    10.0
}

impl Default for MatchesConfig {
    fn default() -> Self {
        Self {
            radius_miles: default_radius_miles(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "plain" (default) or "json".
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log level override (trace/debug/info/warn/error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Per-crate log level overrides (e.g. "shark_coach=debug").
    #[serde(default)]
    pub filters: Vec<String>,
}

fn default_log_format() -> String {
    "plain".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            level: None,
            filters: Vec::new(),
        }
    }
}

/// Resolve a secret: check the direct value first, then the env-var reference.
pub fn resolve_secret_field(direct: &Option<String>, env_var: &Option<String>) -> Option<String> {
    if let Some(val) = direct {
        if !val.is_empty() {
            return Some(val.clone());
        }
    }
    if let Some(env) = env_var {
        if let Ok(val) = std::env::var(env) {
            if !val.is_empty() {
                return Some(val);
            }
        }
    }
    None
}

/// Substitute `${ENV_VAR}` patterns in a string with their environment variable values.
fn substitute_env_vars(input: &str) -> String {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();
    re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_default()
    })
    .into_owned()
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(crate::error::SharkError::Io)?;

        // Substitute ${ENV_VAR} references before parsing
        let substituted = substitute_env_vars(&raw);

        let config: Config = json5::from_str(&substituted)
            .map_err(|e| crate::error::SharkError::Config(e.to_string()))?;

        Ok(config)
    }

    /// Default config file location.
    pub fn config_path() -> PathBuf {
        data_dir().join("config.json")
    }

    /// Resolve the Gemini API key, if configured.
    pub fn gemini_api_key(&self) -> Option<String> {
        self.gemini.as_ref().and_then(|g| g.resolve_api_key())
    }

    pub fn gemini_base_url(&self) -> Option<String> {
        self.gemini.as_ref().and_then(|g| g.base_url.clone())
    }

    pub fn text_model(&self) -> String {
        self.gemini
            .as_ref()
            .and_then(|g| g.text_model.clone())
            .unwrap_or_else(|| DEFAULT_TEXT_MODEL.to_string())
    }

    pub fn live_model(&self) -> String {
        self.gemini
            .as_ref()
            .and_then(|g| g.live_model.clone())
            .unwrap_or_else(|| DEFAULT_LIVE_MODEL.to_string())
    }

    pub fn voice(&self) -> String {
        self.gemini
            .as_ref()
            .and_then(|g| g.voice.clone())
            .unwrap_or_else(|| DEFAULT_VOICE.to_string())
    }

    /// The player profile, falling back to the starter profile.
    pub fn profile(&self) -> PlayerProfile {
        self.profile.clone().unwrap_or_default()
    }

    pub fn radius_miles(&self) -> f64 {
        self.matches
            .as_ref()
            .map(|m| m.radius_miles)
            .unwrap_or_else(default_radius_miles)
    }

    /// Validate config, returning (warnings, errors).
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        if self.gemini_api_key().is_none() {
            warnings.push(
                "No Gemini API key configured (set gemini.api_key or gemini.api_key_env)"
                    .to_string(),
            );
        }

        if let Some(profile) = &self.profile {
            if profile.skill_level < 1 || profile.skill_level > 10 {
                errors.push(format!(
                    "Profile skill level must be 1-10, got {}",
                    profile.skill_level
                ));
            }
            if profile.name.trim().is_empty() {
                errors.push("Profile name cannot be empty".to_string());
            }
        }

        if let Some(location) = &self.location {
            if location.lat.is_some() != location.lng.is_some() {
                errors.push("Location needs both lat and lng, or neither".to_string());
            }
        }

        if let Some(matches) = &self.matches {
            if !(1.0..=50.0).contains(&matches.radius_miles) {
                warnings.push(format!(
                    "Scan radius {} miles is outside the usual 1-50 range",
                    matches.radius_miles
                ));
            }
        }

        (warnings, errors)
    }

    /// Save config to a file, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Base directory for Shark County data: `~/.shark-county/`
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".shark-county")
}
