use anyhow::{Result, anyhow};
use chrono::{FixedOffset, Local, NaiveDateTime, Utc};

/// Source of "now" as wall-clock time at the forecast location.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocalClock {
    offset: Option<FixedOffset>,
}

impl LocalClock {
    /// The machine's local time zone.
    pub fn system() -> Self {
        Self { offset: None }
    }

    pub fn fixed(offset: FixedOffset) -> Self {
        Self { offset: Some(offset) }
    }

    pub fn now(&self) -> NaiveDateTime {
        match self.offset {
            Some(offset) => Utc::now().with_timezone(&offset).naive_local(),
            None => Local::now().naive_local(),
        }
    }
}

/// Parse `+08:00`, `-0530` or `+8` into a fixed offset.
pub fn parse_utc_offset(value: &str) -> Result<FixedOffset> {
    let invalid = || anyhow!("Invalid UTC offset '{value}'. Expected e.g. +08:00 or -05:30.");

    let value = value.trim();
    let (sign, rest) = match value.chars().next() {
        Some('+') => (1, &value[1..]),
        Some('-') => (-1, &value[1..]),
        _ => return Err(invalid()),
    };

    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h, m),
        None if rest.len() == 4 && rest.is_ascii() => rest.split_at(2),
        None => (rest, "0"),
    };

    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if !(0..=14).contains(&hours) || !(0..60).contains(&minutes) {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_offset_forms() {
        assert_eq!(parse_utc_offset("+08:00").unwrap().local_minus_utc(), 8 * 3600);
        assert_eq!(parse_utc_offset("-0530").unwrap().local_minus_utc(), -(5 * 3600 + 30 * 60));
        assert_eq!(parse_utc_offset("+8").unwrap().local_minus_utc(), 8 * 3600);
    }

    #[test]
    fn rejects_garbage_offsets() {
        assert!(parse_utc_offset("08:00").is_err());
        assert!(parse_utc_offset("+25:00").is_err());
        assert!(parse_utc_offset("+ab").is_err());
    }

    #[test]
    fn fixed_clock_tracks_utc_plus_offset() {
        let offset = parse_utc_offset("+08:00").unwrap();
        let clock = LocalClock::fixed(offset);

        let diff = clock.now() - Utc::now().naive_utc();
        assert!((diff.num_minutes() - 480).abs() <= 1);
    }
}
