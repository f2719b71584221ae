use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use std::{fmt::Debug, time::Duration};
use thiserror::Error;

use crate::model::{Coordinates, ForecastWindow, RainEvent};

pub mod met;
pub mod openweather;
pub mod weatherapi;

pub use met::MetMalaysiaProvider;
pub use openweather::{OpenWeatherCurrentProvider, OpenWeatherForecastProvider};
pub use weatherapi::WeatherApiHourlyProvider;

/// Identity of an upstream weather API. Used for credentials and condition tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    MetMalaysia,
    WeatherApi,
    OpenWeather,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::MetMalaysia => "met",
            ProviderId::WeatherApi => "weatherapi",
            ProviderId::OpenWeather => "openweather",
        }
    }

    /// Human-readable name used in log lines and notifications.
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderId::MetMalaysia => "MET Malaysia",
            ProviderId::WeatherApi => "WeatherAPI",
            ProviderId::OpenWeather => "OpenWeatherMap",
        }
    }

    /// Environment variable holding the provider's API key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderId::MetMalaysia => "MET_API_KEY",
            ProviderId::WeatherApi => "WEATHERAPI_KEY",
            ProviderId::OpenWeather => "OPENWEATHER_API_KEY",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::MetMalaysia, ProviderId::WeatherApi, ProviderId::OpenWeather]
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "met" | "metmalaysia" => Ok(ProviderId::MetMalaysia),
            "weatherapi" => Ok(ProviderId::WeatherApi),
            "openweather" => Ok(ProviderId::OpenWeather),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: met, weatherapi, openweather."
            )),
        }
    }
}

/// Everything that can go wrong between asking a provider and getting events back.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request to {provider} failed: {source}")]
    Fetch {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} has no forecast entry matching location '{place}'")]
    NoLocationFound { provider: &'static str, place: String },

    #[error("{provider} is not configured: {setting} is missing")]
    MissingCredential { provider: &'static str, setting: &'static str },

    #[error("{provider} returned no usable data: {reason}")]
    NoData { provider: &'static str, reason: String },
}

impl ProviderError {
    pub(crate) fn no_data(provider: &'static str, reason: impl Into<String>) -> Self {
        Self::NoData { provider, reason: reason.into() }
    }
}

/// Coordinate-based providers report unset LAT/LON at fetch time, like a missing key.
pub(crate) fn require_coordinates(
    coordinates: Option<Coordinates>,
    provider: &'static str,
) -> Result<Coordinates, ProviderError> {
    coordinates.ok_or(ProviderError::MissingCredential { provider, setting: "LAT/LON" })
}

/// Status and body of a single provider call, kept as text until parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into() }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Deserialize the body, mapping non-2xx statuses and bad JSON to `NoData`.
    pub(crate) fn json<T: serde::de::DeserializeOwned>(
        &self,
        provider: &'static str,
    ) -> Result<T, ProviderError> {
        if !self.is_success() {
            return Err(ProviderError::no_data(
                provider,
                format!("status {}: {}", self.status, truncate_body(&self.body)),
            ));
        }

        serde_json::from_str(&self.body)
            .map_err(|e| ProviderError::no_data(provider, format!("malformed JSON: {e}")))
    }
}

#[async_trait]
pub trait ForecastProvider: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    /// Issue the provider's single HTTP request.
    async fn fetch(&self) -> Result<RawResponse, ProviderError>;

    /// Turn a raw response into rain events that fall inside `window`.
    fn parse(
        &self,
        raw: &RawResponse,
        window: &ForecastWindow,
    ) -> Result<Vec<RainEvent>, ProviderError>;

    async fn forecast(&self, window: &ForecastWindow) -> Result<Vec<RainEvent>, ProviderError> {
        let raw = self.fetch().await?;
        self.parse(&raw, window)
    }
}

/// Shared HTTP client with an explicit request timeout.
pub fn http_client(timeout: Duration) -> anyhow::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("rainwatch/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {e}"))
}

pub(crate) async fn send(
    request: RequestBuilder,
    provider: &'static str,
) -> Result<RawResponse, ProviderError> {
    // The URL carries API keys, so it never goes into the error.
    let fetch_error =
        |source: reqwest::Error| ProviderError::Fetch { provider, source: source.without_url() };

    let res = request.send().await.map_err(fetch_error)?;

    let status = res.status().as_u16();
    let body = res.text().await.map_err(fetch_error)?;

    tracing::debug!(provider, status, bytes = body.len(), "received provider response");

    Ok(RawResponse { status, body })
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

/// "light rain" -> "Light Rain".
pub(crate) fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A client whose every request dies at a closed local proxy port.
    pub(crate) fn unreachable_client() -> Client {
        Client::builder()
            .proxy(reqwest::Proxy::all("http://127.0.0.1:1").unwrap())
            .build()
            .unwrap()
    }

    /// Display of `err` and every error in its source chain.
    pub(crate) fn error_chain(err: &dyn std::error::Error) -> String {
        let mut text = err.to_string();
        let mut source = err.source();
        while let Some(e) = source {
            text.push_str(" | ");
            text.push_str(&e.to_string());
            source = e.source();
        }
        text
    }

    #[tokio::test]
    async fn fetch_error_does_not_leak_query_secrets() {
        let request = unreachable_client()
            .get("https://api.example.com/v1/forecast.json")
            .query(&[("key", "SECRETKEY123"), ("q", "1,2")]);

        let err = send(request, "test").await.unwrap_err();

        assert!(matches!(err, ProviderError::Fetch { .. }));
        let text = error_chain(&err);
        assert!(!text.contains("SECRETKEY123"), "{text}");
        assert!(!text.contains("api.example.com"), "{text}");
    }

    #[test]
    fn provider_id_as_str_roundtrip() {
        for id in ProviderId::all() {
            let s = id.as_str();
            let parsed = ProviderId::try_from(s).expect("roundtrip should succeed");
            assert_eq!(*id, parsed);
        }
    }

    #[test]
    fn unknown_provider_error() {
        let err = ProviderId::try_from("doesnotexist").unwrap_err();
        assert!(err.to_string().contains("Unknown provider"));
    }

    #[test]
    fn non_success_status_is_no_data() {
        let raw = RawResponse::new(503, "upstream down");
        let err = raw.json::<serde_json::Value>("test").unwrap_err();

        assert!(matches!(err, ProviderError::NoData { .. }));
        assert!(err.to_string().contains("status 503"));
    }

    #[test]
    fn malformed_json_is_no_data() {
        let raw = RawResponse::new(200, "{\"list\": [");
        let err = raw.json::<serde_json::Value>("test").unwrap_err();

        assert!(matches!(err, ProviderError::NoData { .. }));
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let body = "é".repeat(300);
        let truncated = truncate_body(&body);

        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), 203);
    }

    #[test]
    fn title_case_capitalizes_each_word() {
        assert_eq!(title_case("moderate rain"), "Moderate Rain");
        assert_eq!(title_case(""), "");
    }
}
