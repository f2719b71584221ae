use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use reqwest::Client;
use serde::Deserialize;

use crate::{
    conditions::ConditionTable,
    model::{ForecastWindow, RainEvent},
    provider::{ForecastProvider, ProviderError, ProviderId, RawResponse},
};

const FORECAST_URL: &str = "https://api.data.gov.my/weather/forecast";
const NAME: &str = "MET Malaysia";

/// Location id prefixes from most to least specific.
const SPECIFICITY: &[&str] = &["Ds", "Dv", "Tn", "Rc", "St"];

/// Daily forecast from MET Malaysia, looked up by place name.
#[derive(Debug, Clone)]
pub struct MetMalaysiaProvider {
    place: Option<String>,
    api_key: Option<String>,
    http: Client,
}

impl MetMalaysiaProvider {
    pub fn new(place: Option<String>, api_key: Option<String>, http: Client) -> Self {
        Self { place, api_key, http }
    }

    fn place(&self) -> Result<&str, ProviderError> {
        self.place
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .ok_or(ProviderError::MissingCredential { provider: NAME, setting: "MET_LOCATION" })
    }
}

#[derive(Debug, Deserialize)]
struct MetLocation {
    location_id: String,
    location_name: String,
}

#[derive(Debug, Deserialize)]
struct MetEntry {
    location: MetLocation,
    date: String,
    #[serde(default)]
    morning_forecast: Option<String>,
    #[serde(default)]
    afternoon_forecast: Option<String>,
    #[serde(default)]
    night_forecast: Option<String>,
}

impl MetEntry {
    /// The three fixed forecast slots of a day, in local time.
    fn slots(&self) -> [(u32, Option<&str>); 3] {
        [
            (5, self.morning_forecast.as_deref()),
            (14, self.afternoon_forecast.as_deref()),
            (20, self.night_forecast.as_deref()),
        ]
    }
}

fn specificity_rank(location_id: &str) -> usize {
    SPECIFICITY
        .iter()
        .position(|prefix| location_id.starts_with(prefix))
        .unwrap_or(SPECIFICITY.len())
}

/// Pick the most specific location id among entries whose name contains `place`.
fn select_location<'a>(entries: &'a [MetEntry], place: &str) -> Option<&'a str> {
    let needle = place.trim().to_lowercase();

    entries
        .iter()
        .filter(|e| e.location.location_name.to_lowercase().contains(&needle))
        .map(|e| e.location.location_id.as_str())
        .min_by(|a, b| specificity_rank(a).cmp(&specificity_rank(b)).then_with(|| a.cmp(b)))
}

#[async_trait]
impl ForecastProvider for MetMalaysiaProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn fetch(&self) -> Result<RawResponse, ProviderError> {
        let place = self.place()?;

        let mut request = self
            .http
            .get(FORECAST_URL)
            .query(&[("contains", format!("{place}@location__location_name"))]);

        if let Some(key) = self.api_key.as_deref() {
            request = request.header("Authorization", format!("Token {key}"));
        }

        super::send(request, NAME).await
    }

    fn parse(
        &self,
        raw: &RawResponse,
        window: &ForecastWindow,
    ) -> Result<Vec<RainEvent>, ProviderError> {
        let place = self.place()?;

        // Entries are decoded one by one so a single malformed record is skipped.
        let values: Vec<serde_json::Value> = raw.json(NAME)?;
        let entries: Vec<MetEntry> = values
            .into_iter()
            .filter_map(|v| match serde_json::from_value(v) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::debug!(error = %e, "skipping malformed MET entry");
                    None
                }
            })
            .collect();

        if entries.is_empty() {
            return Err(ProviderError::no_data(NAME, "forecast list is empty"));
        }

        let location_id = select_location(&entries, place).ok_or_else(|| {
            ProviderError::NoLocationFound { provider: NAME, place: place.to_string() }
        })?;

        tracing::debug!(location_id, place, "selected MET location");

        let table = ConditionTable::for_provider(ProviderId::MetMalaysia);
        let mut events = Vec::new();

        for entry in entries.iter().filter(|e| e.location.location_id == location_id) {
            let Ok(date) = NaiveDate::parse_from_str(&entry.date, "%Y-%m-%d") else {
                tracing::debug!(date = %entry.date, "skipping MET entry with unparseable date");
                continue;
            };

            for (hour, text) in entry.slots() {
                let Some(text) = text else { continue };
                let Some(time) = NaiveTime::from_hms_opt(hour, 0, 0) else { continue };
                let timestamp = date.and_time(time);

                if !window.contains(timestamp) {
                    continue;
                }

                let condition = table.classify(text);
                if condition.is_rain {
                    events.push(RainEvent {
                        timestamp,
                        label: condition.label,
                        icon: condition.icon.to_string(),
                        probability: None,
                    });
                }
            }
        }

        events.sort_by_key(|e| e.timestamp);
        Ok(events)
    }
}
