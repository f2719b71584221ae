use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

/// Length of the look-ahead used by alert mode.
pub const ALERT_HORIZON_MINUTES: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// `lat,lon` as accepted by WeatherAPI's `q` parameter.
    pub fn as_query(&self) -> String {
        format!("{},{}", self.latitude, self.longitude)
    }
}

/// A forecast entry that has already been classified as rain.
///
/// Timestamps are wall-clock times at the forecast location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RainEvent {
    pub timestamp: NaiveDateTime,
    pub label: String,
    pub icon: String,
    /// Probability of rain in percent, when the provider reports one.
    pub probability: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    #[default]
    Daily,
    Alert,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Daily => "daily",
            Mode::Alert => "alert",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive time span used to filter forecast entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForecastWindow {
    pub mode: Mode,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl ForecastWindow {
    pub fn for_mode(mode: Mode, now: NaiveDateTime) -> Self {
        match mode {
            Mode::Daily => Self::daily(now),
            Mode::Alert => Self::alert(now),
        }
    }

    /// Today 00:00 through tomorrow 23:59:59.
    pub fn daily(now: NaiveDateTime) -> Self {
        let today = now.date();
        let tomorrow = today + Duration::days(1);
        let last_second = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);

        Self {
            mode: Mode::Daily,
            start: today.and_time(NaiveTime::MIN),
            end: tomorrow.and_time(last_second),
        }
    }

    /// Now through now + 30 minutes.
    pub fn alert(now: NaiveDateTime) -> Self {
        Self {
            mode: Mode::Alert,
            start: now,
            end: now + Duration::minutes(ALERT_HORIZON_MINUTES),
        }
    }

    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        self.start <= ts && ts <= self.end
    }

    /// The calendar date the window is anchored on ("today").
    pub fn anchor_date(&self) -> NaiveDate {
        self.start.date()
    }

    pub fn next_date(&self) -> NaiveDate {
        self.anchor_date() + Duration::days(1)
    }
}

/// One outbound message, built once per run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NotificationMessage {
    pub lines: Vec<String>,
}

impl NotificationMessage {
    pub fn new(lines: Vec<String>) -> Self {
        Self { lines }
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}
