use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::PathBuf, time::Duration};

use crate::{
    clock::{LocalClock, parse_utc_offset},
    model::Coordinates,
    provider::ProviderId,
};

const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Configuration for a single provider (e.g., API key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LocationConfig {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Place name used for the MET Malaysia lookup, e.g. "Sepang".
    pub place_name: Option<String>,
    /// Fixed offset for "now", e.g. "+08:00". Machine local time when absent.
    pub utc_offset: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: DEFAULT_TIMEOUT_SECS }
    }
}

/// Everything a run needs. Built once at process entry and passed down.
///
/// Example TOML:
/// ```toml
/// [providers.openweather]
/// api_key = "..."
///
/// [location]
/// latitude = 2.99
/// longitude = 101.79
/// place_name = "Sepang"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub location: LocationConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

impl Config {
    /// Config file, then `.env`, then the process environment.
    pub fn load() -> Result<Self> {
        let mut cfg = Self::load_file()?;

        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "loaded .env file"),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e).context("Failed to read .env file"),
        }

        cfg.apply_env(|name| std::env::var(name).ok())?;
        Ok(cfg)
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load_file() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "rainwatch", "rainwatch")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Override fields from environment-style variables. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        for id in ProviderId::all() {
            if let Some(key) = get(id.api_key_env()) {
                self.upsert_provider_api_key(*id, key);
            }
        }

        if let Some(lat) = get("LAT") {
            self.location.latitude =
                Some(lat.parse::<f64>().with_context(|| format!("LAT is not a number: {lat}"))?);
        }
        if let Some(lon) = get("LON") {
            self.location.longitude =
                Some(lon.parse::<f64>().with_context(|| format!("LON is not a number: {lon}"))?);
        }
        if let Some(place) = get("MET_LOCATION") {
            self.location.place_name = Some(place);
        }
        if let Some(offset) = get("UTC_OFFSET") {
            self.location.utc_offset = Some(offset);
        }
        if let Some(token) = get("TELEGRAM_TOKEN") {
            self.telegram.bot_token = Some(token);
        }
        if let Some(chat_id) = get("CHAT_ID") {
            self.telegram.chat_id = Some(chat_id);
        }
        if let Some(secs) = get("HTTP_TIMEOUT_SECS") {
            self.http.timeout_secs = secs
                .parse::<u64>()
                .with_context(|| format!("HTTP_TIMEOUT_SECS is not a whole number: {secs}"))?;
        }

        Ok(())
    }

    pub fn upsert_provider_api_key(&mut self, provider_id: ProviderId, api_key: String) {
        self.providers.insert(provider_id.as_str().to_string(), ProviderConfig { api_key });
    }

    /// Returns API key for a provider, if present.
    pub fn provider_api_key(&self, provider_id: ProviderId) -> Option<&str> {
        self.providers.get(provider_id.as_str()).map(|cfg| cfg.api_key.as_str())
    }

    pub fn is_provider_configured(&self, provider_id: ProviderId) -> bool {
        self.provider_api_key(provider_id).is_some()
    }

    /// `None` when LAT or LON is unset; an error when they are out of range.
    pub fn maybe_coordinates(&self) -> Result<Option<Coordinates>> {
        match (self.location.latitude, self.location.longitude) {
            (Some(latitude), Some(longitude)) => {
                if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
                    return Err(anyhow!("Coordinates out of range: lat={latitude}, lon={longitude}"));
                }
                Ok(Some(Coordinates { latitude, longitude }))
            }
            _ => Ok(None),
        }
    }

    pub fn coordinates(&self) -> Result<Coordinates> {
        match self.maybe_coordinates()? {
            Some(coordinates) => Ok(coordinates),
            None => Err(anyhow!(
                "No coordinates configured.\n\
                 Hint: set LAT and LON in the environment or [location] in {}.",
                Self::config_file_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|_| "the config file".to_string())
            )),
        }
    }

    pub fn clock(&self) -> Result<LocalClock> {
        match self.location.utc_offset.as_deref() {
            Some(offset) => Ok(LocalClock::fixed(parse_utc_offset(offset)?)),
            None => Ok(LocalClock::system()),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderId;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn env_populates_every_setting() {
        let mut cfg = Config::default();
        cfg.apply_env(env(&[
            ("MET_API_KEY", "met"),
            ("WEATHERAPI_KEY", "wa"),
            ("OPENWEATHER_API_KEY", "ow"),
            ("LAT", "2.99"),
            ("LON", "101.79"),
            ("MET_LOCATION", "Sepang"),
            ("TELEGRAM_TOKEN", "123:abc"),
            ("CHAT_ID", "42"),
            ("UTC_OFFSET", "+08:00"),
            ("HTTP_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();

        assert_eq!(cfg.provider_api_key(ProviderId::MetMalaysia), Some("met"));
        assert_eq!(cfg.provider_api_key(ProviderId::WeatherApi), Some("wa"));
        assert_eq!(cfg.provider_api_key(ProviderId::OpenWeather), Some("ow"));
        assert_eq!(cfg.coordinates().unwrap(), Coordinates { latitude: 2.99, longitude: 101.79 });
        assert_eq!(cfg.location.place_name.as_deref(), Some("Sepang"));
        assert_eq!(cfg.telegram.chat_id.as_deref(), Some("42"));
        assert_eq!(cfg.request_timeout(), Duration::from_secs(5));
        assert!(cfg.clock().is_ok());
    }

    #[test]
    fn env_overrides_file_values_but_blank_does_not() {
        let mut cfg: Config = toml::from_str(
            r#"
            [providers.openweather]
            api_key = "from-file"

            [telegram]
            chat_id = "file-chat"
            "#,
        )
        .unwrap();

        cfg.apply_env(env(&[("OPENWEATHER_API_KEY", "from-env"), ("CHAT_ID", "  ")])).unwrap();

        assert_eq!(cfg.provider_api_key(ProviderId::OpenWeather), Some("from-env"));
        assert_eq!(cfg.telegram.chat_id.as_deref(), Some("file-chat"));
    }

    #[test]
    fn missing_keys_stay_unconfigured() {
        let mut cfg = Config::default();
        cfg.apply_env(env(&[("WEATHERAPI_KEY", "wa")])).unwrap();

        assert!(cfg.is_provider_configured(ProviderId::WeatherApi));
        assert!(!cfg.is_provider_configured(ProviderId::OpenWeather));
        assert!(!cfg.is_provider_configured(ProviderId::MetMalaysia));
    }

    #[test]
    fn bad_numbers_are_reported() {
        let mut cfg = Config::default();
        let err = cfg.apply_env(env(&[("LAT", "north")])).unwrap_err();

        assert!(err.to_string().contains("LAT is not a number"));
    }

    #[test]
    fn coordinates_are_required() {
        let cfg = Config::default();
        let err = cfg.coordinates().unwrap_err();

        assert!(err.to_string().contains("No coordinates configured"));
    }

    #[test]
    fn unset_coordinates_are_optional_but_bad_ones_are_not() {
        assert_eq!(Config::default().maybe_coordinates().unwrap(), None);

        let mut cfg = Config::default();
        cfg.apply_env(env(&[("LAT", "2.99")])).unwrap();
        assert_eq!(cfg.maybe_coordinates().unwrap(), None);

        cfg.apply_env(env(&[("LON", "181")])).unwrap();
        assert!(cfg.maybe_coordinates().unwrap_err().to_string().contains("out of range"));
    }

    #[test]
    fn default_timeout_is_ten_seconds() {
        assert_eq!(Config::default().request_timeout(), Duration::from_secs(10));
    }
}
