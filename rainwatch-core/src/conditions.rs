//! Provider-specific weather codes mapped to a label, an icon and a rain flag.
//!
//! Each provider speaks its own vocabulary: MET Malaysia sends free-text Malay
//! phrases, WeatherAPI numeric condition codes, OpenWeatherMap icon codes such
//! as `10d`. All three go through the same [`ConditionTable`] so a new code only
//! has to be added in one place.

use crate::provider::ProviderId;

/// Keywords that mark an unknown condition as rain-bearing.
const RAIN_KEYWORDS: &[&str] = &["rain", "hujan", "ribut", "drizzle", "thunderstorm"];

const UNKNOWN_RAIN_ICON: &str = "🌧";
const UNKNOWN_DRY_ICON: &str = "🌤";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub label: String,
    pub icon: &'static str,
    pub is_rain: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ConditionEntry {
    pub key: &'static str,
    pub label: &'static str,
    pub icon: &'static str,
    pub is_rain: bool,
}

const fn entry(key: &'static str, label: &'static str, icon: &'static str, is_rain: bool) -> ConditionEntry {
    ConditionEntry { key, label, icon, is_rain }
}

#[derive(Debug, Clone, Copy)]
pub struct ConditionTable {
    pub provider: ProviderId,
    entries: &'static [ConditionEntry],
}

impl ConditionTable {
    pub fn for_provider(provider: ProviderId) -> Self {
        let entries = match provider {
            ProviderId::MetMalaysia => MET_MALAYSIA,
            ProviderId::WeatherApi => WEATHERAPI,
            ProviderId::OpenWeather => OPENWEATHER,
        };
        Self { provider, entries }
    }

    /// Keys are matched trimmed and case-insensitively.
    pub fn lookup(&self, key: &str) -> Option<&'static ConditionEntry> {
        let key = key.trim();
        self.entries.iter().find(|e| e.key.eq_ignore_ascii_case(key))
    }

    /// Never fails: unknown keys fall back to the rain keyword heuristic.
    pub fn classify(&self, key: &str) -> Condition {
        match self.lookup(key) {
            Some(e) => Condition { label: e.label.to_string(), icon: e.icon, is_rain: e.is_rain },
            None => {
                let is_rain = mentions_rain(key);
                tracing::debug!(provider = %self.provider, key, is_rain, "unknown weather condition");
                Condition {
                    label: key.trim().to_string(),
                    icon: if is_rain { UNKNOWN_RAIN_ICON } else { UNKNOWN_DRY_ICON },
                    is_rain,
                }
            }
        }
    }
}

pub fn classify(provider: ProviderId, key: &str) -> Condition {
    ConditionTable::for_provider(provider).classify(key)
}

pub fn mentions_rain(text: &str) -> bool {
    let lower = text.to_lowercase();
    RAIN_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

static MET_MALAYSIA: &[ConditionEntry] = &[
    entry("Tiada hujan", "No rain", "🌤", false),
    entry("Cerah", "Clear", "☀️", false),
    entry("Berawan", "Cloudy", "☁️", false),
    entry("Mendung", "Overcast", "☁️", false),
    entry("Berangin", "Windy", "🌬", false),
    entry("Berjerebu", "Hazy", "🌫", false),
    entry("Hujan", "Rain", "🌧", true),
    entry("Hujan menyeluruh", "Widespread rain", "🌧", true),
    entry("Hujan di beberapa tempat", "Scattered rain", "🌧", true),
    entry("Hujan di satu dua tempat", "Isolated rain", "🌦", true),
    entry("Hujan di satu dua tempat di kawasan pantai", "Isolated rain over coastal areas", "🌦", true),
    entry("Hujan di satu dua tempat di kawasan pedalaman", "Isolated rain over inland areas", "🌦", true),
    entry("Ribut petir", "Thunderstorms", "⛈", true),
    entry("Ribut petir di beberapa tempat", "Scattered thunderstorms", "⛈", true),
    entry("Ribut petir di satu dua tempat", "Isolated thunderstorms", "⛈", true),
    entry("Ribut petir di satu dua tempat di kawasan pantai", "Isolated thunderstorms over coastal areas", "⛈", true),
    entry("Ribut petir di satu dua tempat di kawasan pedalaman", "Isolated thunderstorms over inland areas", "⛈", true),
];

static WEATHERAPI: &[ConditionEntry] = &[
    entry("1000", "Sunny", "☀️", false),
    entry("1003", "Partly cloudy", "⛅", false),
    entry("1006", "Cloudy", "☁️", false),
    entry("1009", "Overcast", "☁️", false),
    entry("1030", "Mist", "🌫", false),
    entry("1063", "Patchy rain possible", "🌦", true),
    entry("1087", "Thundery outbreaks possible", "⛈", true),
    entry("1135", "Fog", "🌫", false),
    entry("1150", "Patchy light drizzle", "🌦", true),
    entry("1153", "Light drizzle", "🌦", true),
    entry("1180", "Patchy light rain", "🌦", true),
    entry("1183", "Light rain", "🌧", true),
    entry("1186", "Moderate rain at times", "🌧", true),
    entry("1189", "Moderate rain", "🌧", true),
    entry("1192", "Heavy rain at times", "🌧", true),
    entry("1195", "Heavy rain", "🌧", true),
    entry("1240", "Light rain shower", "🌦", true),
    entry("1243", "Moderate or heavy rain shower", "🌧", true),
    entry("1246", "Torrential rain shower", "🌧", true),
    entry("1273", "Patchy light rain with thunder", "⛈", true),
    entry("1276", "Moderate or heavy rain with thunder", "⛈", true),
];

static OPENWEATHER: &[ConditionEntry] = &[
    entry("01d", "Clear sky", "☀️", false),
    entry("01n", "Clear sky", "🌙", false),
    entry("02d", "Few clouds", "⛅", false),
    entry("02n", "Few clouds", "☁️", false),
    entry("03d", "Scattered clouds", "☁️", false),
    entry("03n", "Scattered clouds", "☁️", false),
    entry("04d", "Broken clouds", "☁️", false),
    entry("04n", "Broken clouds", "☁️", false),
    entry("09d", "Shower rain", "🌧", true),
    entry("09n", "Shower rain", "🌧", true),
    entry("10d", "Rain", "🌦", true),
    entry("10n", "Rain", "🌧", true),
    entry("11d", "Thunderstorm", "⛈", true),
    entry("11n", "Thunderstorm", "⛈", true),
    entry("13d", "Snow", "🌨", false),
    entry("13n", "Snow", "🌨", false),
    entry("50d", "Mist", "🌫", false),
    entry("50n", "Mist", "🌫", false),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn met_phrases_are_case_insensitive() {
        let c = classify(ProviderId::MetMalaysia, "hujan");
        assert_eq!(c.label, "Rain");
        assert_eq!(c.icon, "🌧");
        assert!(c.is_rain);

        let c = classify(ProviderId::MetMalaysia, "  RIBUT PETIR di beberapa tempat ");
        assert_eq!(c.label, "Scattered thunderstorms");
        assert!(c.is_rain);
    }

    #[test]
    fn no_rain_phrase_is_not_rain_even_though_it_mentions_hujan() {
        let c = classify(ProviderId::MetMalaysia, "Tiada hujan");
        assert!(!c.is_rain);
    }

    #[test]
    fn unknown_code_falls_back_to_keyword_heuristic() {
        let c = classify(ProviderId::MetMalaysia, "Hujan lebat di kawasan tanah tinggi");
        assert!(c.is_rain);
        assert_eq!(c.icon, UNKNOWN_RAIN_ICON);
        assert_eq!(c.label, "Hujan lebat di kawasan tanah tinggi");

        let c = classify(ProviderId::WeatherApi, "Freezing Drizzle");
        assert!(c.is_rain);
    }

    #[test]
    fn unknown_dry_code_does_not_fail() {
        let c = classify(ProviderId::OpenWeather, "99x");
        assert!(!c.is_rain);
        assert_eq!(c.icon, UNKNOWN_DRY_ICON);
    }

    #[test]
    fn tables_are_selected_by_provider() {
        assert_eq!(classify(ProviderId::WeatherApi, "1003").icon, "⛅");
        assert_eq!(classify(ProviderId::OpenWeather, "10d").icon, "🌦");
        assert_eq!(classify(ProviderId::OpenWeather, "10n").icon, "🌧");
        // The same key means nothing to another provider's table.
        assert!(ConditionTable::for_provider(ProviderId::MetMalaysia).lookup("10d").is_none());
    }
}
