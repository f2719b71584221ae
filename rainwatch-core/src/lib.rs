//! Core library for the `rainwatch` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Forecast providers (MET Malaysia, WeatherAPI, OpenWeatherMap) behind one trait
//! - Rain detection, provider fallback and notification delivery
//!
//! It is used by `rainwatch-cli`, but can also be reused by other binaries or services.

pub mod clock;
pub mod conditions;
pub mod config;
pub mod detector;
pub mod fallback;
pub mod model;
pub mod notify;
pub mod pipeline;
pub mod provider;

pub use clock::LocalClock;
pub use config::{Config, ProviderConfig};
pub use detector::{DayBucket, RainReport, detect};
pub use fallback::{FallbackStrategy, Resolution};
pub use model::{Coordinates, ForecastWindow, Mode, NotificationMessage, RainEvent};
pub use notify::{DeliveryError, Notifier, StdoutNotifier, TelegramNotifier};
pub use pipeline::RunOutcome;
pub use provider::{ForecastProvider, ProviderError, ProviderId};
