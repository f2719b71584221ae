use chrono::NaiveDate;

use crate::model::{ForecastWindow, Mode, RainEvent};

/// Rain events for one calendar day. An empty bucket means "no rain predicted".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayBucket {
    pub date: NaiveDate,
    pub events: Vec<RainEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RainReport {
    Daily { today: DayBucket, tomorrow: DayBucket },
    Alert { events: Vec<RainEvent> },
}

impl RainReport {
    pub fn event_count(&self) -> usize {
        match self {
            RainReport::Daily { today, tomorrow } => today.events.len() + tomorrow.events.len(),
            RainReport::Alert { events } => events.len(),
        }
    }
}

/// Keep events inside `window`, ordered by time, grouped per mode.
pub fn detect(events: &[RainEvent], window: &ForecastWindow) -> RainReport {
    let mut kept: Vec<RainEvent> =
        events.iter().filter(|e| window.contains(e.timestamp)).cloned().collect();
    kept.sort_by_key(|e| e.timestamp);

    match window.mode {
        Mode::Alert => RainReport::Alert { events: kept },
        Mode::Daily => {
            let today = window.anchor_date();
            let tomorrow = window.next_date();
            let (today_events, rest): (Vec<RainEvent>, Vec<RainEvent>) =
                kept.into_iter().partition(|e| e.timestamp.date() == today);

            RainReport::Daily {
                today: DayBucket { date: today, events: today_events },
                tomorrow: DayBucket {
                    date: tomorrow,
                    events: rest.into_iter().filter(|e| e.timestamp.date() == tomorrow).collect(),
                },
            }
        }
    }
}
