use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime};
use reqwest::Client;
use serde::Deserialize;

use crate::{
    conditions::ConditionTable,
    model::{Coordinates, ForecastWindow, RainEvent},
    provider::{ForecastProvider, ProviderError, ProviderId, RawResponse, title_case},
};

const FORECAST_URL: &str = "https://api.openweathermap.org/data/2.5/forecast";
const CURRENT_URL: &str = "https://api.openweathermap.org/data/2.5/weather";
const FORECAST_NAME: &str = "OpenWeatherMap forecast";
const CURRENT_NAME: &str = "OpenWeatherMap current";

/// Condition categories (`weather[0].main`) that count as rain.
const RAIN_CATEGORIES: &[&str] = &["rain", "drizzle", "thunderstorm"];

/// Icon used when the response carries no known icon code.
const DEFAULT_ICON: &str = "🌧";

#[derive(Debug, Clone)]
struct OpenWeatherClient {
    coordinates: Option<Coordinates>,
    api_key: Option<String>,
    http: Client,
}

impl OpenWeatherClient {
    async fn get(&self, url: &str, provider: &'static str) -> Result<RawResponse, ProviderError> {
        let key = self.api_key.as_deref().ok_or(ProviderError::MissingCredential {
            provider,
            setting: ProviderId::OpenWeather.api_key_env(),
        })?;
        let coordinates = super::require_coordinates(self.coordinates, provider)?;

        let request = self.http.get(url).query(&[
            ("lat", coordinates.latitude.to_string().as_str()),
            ("lon", coordinates.longitude.to_string().as_str()),
            ("appid", key),
            ("units", "metric"),
        ]);

        super::send(request, provider).await
    }
}

/// 5-day forecast in 3-hour steps. The universal daily fallback.
#[derive(Debug, Clone)]
pub struct OpenWeatherForecastProvider {
    client: OpenWeatherClient,
}

impl OpenWeatherForecastProvider {
    pub fn new(coordinates: Option<Coordinates>, api_key: Option<String>, http: Client) -> Self {
        Self { client: OpenWeatherClient { coordinates, api_key, http } }
    }
}

/// Single snapshot of current conditions. The alert-mode fallback.
#[derive(Debug, Clone)]
pub struct OpenWeatherCurrentProvider {
    client: OpenWeatherClient,
}

impl OpenWeatherCurrentProvider {
    pub fn new(coordinates: Option<Coordinates>, api_key: Option<String>, http: Client) -> Self {
        Self { client: OpenWeatherClient { coordinates, api_key, http } }
    }
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    #[serde(default)]
    main: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    icon: String,
}

impl OwWeather {
    fn is_rain(&self) -> bool {
        let main = self.main.to_lowercase();
        RAIN_CATEGORIES.iter().any(|c| main.contains(c))
    }

    fn label(&self) -> String {
        if self.description.trim().is_empty() {
            title_case(&self.main)
        } else {
            title_case(&self.description)
        }
    }

    fn icon(&self) -> &'static str {
        ConditionTable::for_provider(ProviderId::OpenWeather)
            .lookup(&self.icon)
            .map_or(DEFAULT_ICON, |e| e.icon)
    }
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    #[serde(default)]
    weather: Vec<OwWeather>,
    /// Probability of precipitation, 0.0 to 1.0.
    #[serde(default)]
    pop: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct OwCity {
    /// Shift from UTC in seconds for the requested location.
    #[serde(default)]
    timezone: i64,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    #[serde(default)]
    city: OwCity,
    #[serde(default)]
    list: Vec<OwForecastEntry>,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    #[serde(default)]
    weather: Vec<OwWeather>,
}

/// Unix seconds to wall-clock time at the location.
fn local_time(ts: i64, utc_offset_secs: i64) -> Option<NaiveDateTime> {
    ts.checked_add(utc_offset_secs)
        .and_then(|shifted| DateTime::from_timestamp(shifted, 0))
        .map(|dt| dt.naive_utc())
}

fn pop_percent(pop: f64) -> u8 {
    (pop * 100.0).round().clamp(0.0, 100.0) as u8
}

#[async_trait]
impl ForecastProvider for OpenWeatherForecastProvider {
    fn name(&self) -> &'static str {
        FORECAST_NAME
    }

    async fn fetch(&self) -> Result<RawResponse, ProviderError> {
        self.client.get(FORECAST_URL, FORECAST_NAME).await
    }

    fn parse(
        &self,
        raw: &RawResponse,
        window: &ForecastWindow,
    ) -> Result<Vec<RainEvent>, ProviderError> {
        let parsed: OwForecastResponse = raw.json(FORECAST_NAME)?;

        if parsed.list.is_empty() {
            return Err(ProviderError::no_data(FORECAST_NAME, "forecast list is empty"));
        }

        let mut events = Vec::new();

        for entry in &parsed.list {
            let Some(timestamp) = local_time(entry.dt, parsed.city.timezone) else {
                tracing::debug!(dt = entry.dt, "skipping OpenWeatherMap entry with invalid timestamp");
                continue;
            };
            let Some(weather) = entry.weather.first() else { continue };

            if !window.contains(timestamp) || !weather.is_rain() {
                continue;
            }

            events.push(RainEvent {
                timestamp,
                label: weather.label(),
                icon: weather.icon().to_string(),
                probability: entry.pop.map(pop_percent),
            });
        }

        events.sort_by_key(|e| e.timestamp);
        Ok(events)
    }
}

#[async_trait]
impl ForecastProvider for OpenWeatherCurrentProvider {
    fn name(&self) -> &'static str {
        CURRENT_NAME
    }

    async fn fetch(&self) -> Result<RawResponse, ProviderError> {
        self.client.get(CURRENT_URL, CURRENT_NAME).await
    }

    /// Yields at most one event, stamped at the start of the window.
    fn parse(
        &self,
        raw: &RawResponse,
        window: &ForecastWindow,
    ) -> Result<Vec<RainEvent>, ProviderError> {
        let parsed: OwCurrentResponse = raw.json(CURRENT_NAME)?;

        let weather = parsed
            .weather
            .first()
            .ok_or_else(|| ProviderError::no_data(CURRENT_NAME, "response contained no conditions"))?;

        if !weather.is_rain() {
            return Ok(Vec::new());
        }

        Ok(vec![RainEvent {
            timestamp: window.start,
            label: weather.label(),
            icon: weather.icon().to_string(),
            probability: None,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coords() -> Option<Coordinates> {
        Some(Coordinates { latitude: 2.99, longitude: 101.79 })
    }

    fn daily() -> ForecastWindow {
        let now = NaiveDateTime::parse_from_str("2026-10-16 09:00", "%Y-%m-%d %H:%M").unwrap();
        ForecastWindow::daily(now)
    }

    fn unix(local: &str, offset: i64) -> i64 {
        NaiveDateTime::parse_from_str(local, "%Y-%m-%d %H:%M").unwrap().and_utc().timestamp() - offset
    }

    fn entry(local: &str, main: &str, description: &str, icon: &str, pop: f64) -> String {
        format!(
            r#"{{"dt": {}, "main": {{"temp": 28.0}},
                "weather": [{{"id": 500, "main": "{main}", "description": "{description}", "icon": "{icon}"}}],
                "pop": {pop}}}"#,
            unix(local, 28800)
        )
    }

    fn forecast(entries: &[String]) -> RawResponse {
        RawResponse::new(
            200,
            format!(
                r#"{{"cod": "200", "list": [{}], "city": {{"name": "Sepang", "country": "MY", "timezone": 28800}}}}"#,
                entries.join(",")
            ),
        )
    }

    #[test]
    fn forecast_keeps_rain_categories_in_window() {
        let raw = forecast(&[
            entry("2026-10-16 15:00", "Rain", "light rain", "10d", 0.64),
            entry("2026-10-17 21:00", "Thunderstorm", "thunderstorm with rain", "11n", 0.9),
            entry("2026-10-17 12:00", "Clouds", "broken clouds", "04d", 0.2),
            entry("2026-10-18 03:00", "Rain", "moderate rain", "10n", 1.0),
        ]);

        let provider = OpenWeatherForecastProvider::new(coords(), Some("k".into()), Client::new());
        let events = provider.parse(&raw, &daily()).unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].timestamp.to_string(), "2026-10-16 15:00:00");
        assert_eq!(events[0].label, "Light Rain");
        assert_eq!(events[0].icon, "🌦");
        assert_eq!(events[0].probability, Some(64));
        assert_eq!(events[1].icon, "⛈");
    }

    #[test]
    fn drizzle_counts_and_unknown_icon_uses_default() {
        let raw = forecast(&[entry("2026-10-16 18:00", "Drizzle", "light intensity drizzle", "xx", 0.3)]);

        let provider = OpenWeatherForecastProvider::new(coords(), Some("k".into()), Client::new());
        let events = provider.parse(&raw, &daily()).unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].icon, DEFAULT_ICON);
    }

    #[test]
    fn out_of_range_timestamps_are_skipped() {
        let raw = forecast(&[
            r#"{"dt": 9223372036854775807, "weather": [{"main": "Rain", "description": "light rain", "icon": "10d"}], "pop": 1.0}"#.to_string(),
            r#"{"dt": -9223372036854775808, "weather": [{"main": "Rain", "description": "light rain", "icon": "10d"}], "pop": 1.0}"#.to_string(),
            entry("2026-10-16 15:00", "Rain", "light rain", "10d", 0.64),
        ]);

        let provider = OpenWeatherForecastProvider::new(coords(), Some("k".into()), Client::new());
        let events = provider.parse(&raw, &daily()).unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].timestamp.to_string(), "2026-10-16 15:00:00");
    }

    #[test]
    fn empty_forecast_list_is_no_data() {
        let provider = OpenWeatherForecastProvider::new(coords(), Some("k".into()), Client::new());
        let err = provider.parse(&forecast(&[]), &daily()).unwrap_err();

        assert!(matches!(err, ProviderError::NoData { .. }));
    }

    #[test]
    fn current_rain_becomes_single_event_at_now() {
        let now = NaiveDateTime::parse_from_str("2026-10-16 13:45", "%Y-%m-%d %H:%M").unwrap();
        let window = ForecastWindow::alert(now);
        let raw = RawResponse::new(
            200,
            r#"{"weather": [{"main": "Rain", "description": "moderate rain", "icon": "10d"}], "timezone": 28800}"#,
        );

        let provider = OpenWeatherCurrentProvider::new(coords(), Some("k".into()), Client::new());
        let events = provider.parse(&raw, &window).unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].timestamp, now);
        assert_eq!(events[0].label, "Moderate Rain");
        assert_eq!(events[0].probability, None);
    }

    #[test]
    fn current_dry_conditions_yield_nothing() {
        let now = NaiveDateTime::parse_from_str("2026-10-16 13:45", "%Y-%m-%d %H:%M").unwrap();
        let raw = RawResponse::new(
            200,
            r#"{"weather": [{"main": "Clear", "description": "clear sky", "icon": "01d"}]}"#,
        );

        let provider = OpenWeatherCurrentProvider::new(coords(), Some("k".into()), Client::new());
        assert!(provider.parse(&raw, &ForecastWindow::alert(now)).unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_key_is_reported_without_request() {
        let provider = OpenWeatherForecastProvider::new(coords(), None, Client::new());
        let err = provider.fetch().await.unwrap_err();

        assert!(matches!(err, ProviderError::MissingCredential { setting: "OPENWEATHER_API_KEY", .. }));
    }

    #[tokio::test]
    async fn missing_coordinates_are_reported_without_request() {
        let provider = OpenWeatherCurrentProvider::new(None, Some("k".into()), Client::new());
        let err = provider.fetch().await.unwrap_err();

        assert!(matches!(err, ProviderError::MissingCredential { setting: "LAT/LON", .. }));
    }

    #[tokio::test]
    async fn fetch_error_hides_app_id() {
        let provider = OpenWeatherForecastProvider::new(
            coords(),
            Some("OWSECRET42".into()),
            crate::provider::tests::unreachable_client(),
        );
        let err = provider.fetch().await.unwrap_err();

        assert!(matches!(err, ProviderError::Fetch { .. }));
        let text = crate::provider::tests::error_chain(&err);
        assert!(!text.contains("OWSECRET42"), "{text}");
    }
}
