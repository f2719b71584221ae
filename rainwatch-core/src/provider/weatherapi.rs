use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use reqwest::Client;
use serde::Deserialize;

use crate::{
    conditions::ConditionTable,
    model::{Coordinates, ForecastWindow, RainEvent},
    provider::{ForecastProvider, ProviderError, ProviderId, RawResponse},
};

const FORECAST_URL: &str = "https://api.weatherapi.com/v1/forecast.json";
const NAME: &str = "WeatherAPI";

/// Hourly entries further ahead than this are ignored.
const LOOKAHEAD_HOURS: i64 = 6;

/// Probability at which an hour counts as rain regardless of its condition text.
pub const ALERT_CHANCE_THRESHOLD: u8 = 60;

/// Short-range hourly forecast used for rain alerts.
#[derive(Debug, Clone)]
pub struct WeatherApiHourlyProvider {
    coordinates: Option<Coordinates>,
    api_key: Option<String>,
    http: Client,
}

impl WeatherApiHourlyProvider {
    pub fn new(coordinates: Option<Coordinates>, api_key: Option<String>, http: Client) -> Self {
        Self { coordinates, api_key, http }
    }
}

#[derive(Debug, Default, Deserialize)]
struct WaCondition {
    #[serde(default)]
    text: String,
    #[serde(default)]
    code: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct WaForecastHour {
    /// Local time at the location, e.g. "2026-10-16 14:00".
    time: String,
    #[serde(default)]
    condition: WaCondition,
    #[serde(default)]
    will_it_rain: u8,
    #[serde(default)]
    chance_of_rain: u8,
}

impl WaForecastHour {
    fn is_rain(&self) -> bool {
        self.will_it_rain == 1
            || self.chance_of_rain >= ALERT_CHANCE_THRESHOLD
            || self.condition.text.to_lowercase().contains("rain")
    }
}

#[derive(Debug, Deserialize)]
struct WaForecastDay {
    #[serde(default)]
    hour: Vec<WaForecastHour>,
}

#[derive(Debug, Deserialize)]
struct WaForecast {
    #[serde(default)]
    forecastday: Vec<WaForecastDay>,
}

#[derive(Debug, Deserialize)]
struct WaForecastResponse {
    forecast: WaForecast,
}

#[async_trait]
impl ForecastProvider for WeatherApiHourlyProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn fetch(&self) -> Result<RawResponse, ProviderError> {
        let key = self.api_key.as_deref().ok_or(ProviderError::MissingCredential {
            provider: NAME,
            setting: ProviderId::WeatherApi.api_key_env(),
        })?;
        let coordinates = super::require_coordinates(self.coordinates, NAME)?;

        // Two days so the look-ahead still works shortly before midnight.
        let request = self.http.get(FORECAST_URL).query(&[
            ("key", key),
            ("q", coordinates.as_query().as_str()),
            ("days", "2"),
            ("aqi", "no"),
            ("alerts", "no"),
        ]);

        super::send(request, NAME).await
    }

    fn parse(
        &self,
        raw: &RawResponse,
        window: &ForecastWindow,
    ) -> Result<Vec<RainEvent>, ProviderError> {
        let parsed: WaForecastResponse = raw.json(NAME)?;

        let hours: Vec<&WaForecastHour> =
            parsed.forecast.forecastday.iter().flat_map(|d| d.hour.iter()).collect();

        if hours.is_empty() {
            return Err(ProviderError::no_data(NAME, "response contained no hourly data"));
        }

        let horizon = window.start + Duration::hours(LOOKAHEAD_HOURS);
        let table = ConditionTable::for_provider(ProviderId::WeatherApi);
        let mut events = Vec::new();

        for hour in hours {
            let Ok(timestamp) = NaiveDateTime::parse_from_str(&hour.time, "%Y-%m-%d %H:%M") else {
                tracing::debug!(time = %hour.time, "skipping WeatherAPI hour with unparseable time");
                continue;
            };

            if timestamp > horizon || !window.contains(timestamp) || !hour.is_rain() {
                continue;
            }

            let icon = match hour.condition.code {
                Some(code) => table.classify(&code.to_string()).icon,
                None => table.classify(&hour.condition.text).icon,
            };

            events.push(RainEvent {
                timestamp,
                label: hour.condition.text.trim().to_string(),
                icon: icon.to_string(),
                probability: Some(hour.chance_of_rain),
            });
        }

        events.sort_by_key(|e| e.timestamp);
        Ok(events)
    }
}
