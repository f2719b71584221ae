//! One run: resolve a forecast, detect rain, format, deliver.

use anyhow::{Result, anyhow};
use reqwest::Client;

use crate::{
    config::Config,
    detector::detect,
    fallback::{FallbackStrategy, Resolution},
    model::{ForecastWindow, Mode},
    notify::{DeliveryError, Notifier, format_degraded, format_report},
    provider::{
        ForecastProvider, MetMalaysiaProvider, OpenWeatherCurrentProvider,
        OpenWeatherForecastProvider, ProviderId, WeatherApiHourlyProvider,
    },
};

#[derive(Debug)]
pub enum RunOutcome {
    Sent { degraded: bool },
    /// Alert mode found no rain. The only run that ends without a message.
    NothingToSend,
    DeliveryFailed(DeliveryError),
}

/// Fails when `mode` cannot run at all with this configuration.
pub fn ensure_ready(mode: Mode, config: &Config) -> Result<()> {
    if mode == Mode::Daily {
        return Ok(());
    }

    if !config.is_provider_configured(ProviderId::WeatherApi) {
        return Err(anyhow!(
            "Alert mode requires a WeatherAPI key.\n\
             Hint: set {} or run `rainwatch configure weatherapi`.",
            ProviderId::WeatherApi.api_key_env()
        ));
    }
    config.coordinates()?;
    Ok(())
}

fn degraded_message(primary: &dyn ForecastProvider, fallback: &dyn ForecastProvider) -> String {
    format!(
        "Both the primary ({}) and fallback ({}) forecasts are unavailable, so no rain check was possible.",
        primary.name(),
        fallback.name()
    )
}

/// Daily: MET Malaysia then the OpenWeatherMap 5-day forecast.
/// Alert: WeatherAPI hourly then OpenWeatherMap current conditions.
///
/// Unset LAT/LON is left to the coordinate-based providers to report, so a
/// MET-only daily run still works. Invalid coordinates fail here.
pub fn strategy_for(mode: Mode, config: &Config, http: &Client) -> Result<FallbackStrategy> {
    let coordinates = config.maybe_coordinates()?;
    let key = |id: ProviderId| config.provider_api_key(id).map(str::to_string);

    let primary: Box<dyn ForecastProvider> = match mode {
        Mode::Daily => Box::new(MetMalaysiaProvider::new(
            config.location.place_name.clone(),
            key(ProviderId::MetMalaysia),
            http.clone(),
        )),
        Mode::Alert => Box::new(WeatherApiHourlyProvider::new(
            coordinates,
            key(ProviderId::WeatherApi),
            http.clone(),
        )),
    };

    let fallback: Box<dyn ForecastProvider> = match mode {
        Mode::Daily => Box::new(OpenWeatherForecastProvider::new(
            coordinates,
            key(ProviderId::OpenWeather),
            http.clone(),
        )),
        Mode::Alert => Box::new(OpenWeatherCurrentProvider::new(
            coordinates,
            key(ProviderId::OpenWeather),
            http.clone(),
        )),
    };

    let message = degraded_message(primary.as_ref(), fallback.as_ref());
    Ok(FallbackStrategy::new(primary, fallback, message))
}

pub async fn run(
    strategy: &FallbackStrategy,
    window: &ForecastWindow,
    notifier: &dyn Notifier,
) -> RunOutcome {
    tracing::info!(
        mode = %window.mode,
        start = %window.start,
        end = %window.end,
        primary = strategy.primary_name(),
        fallback = strategy.fallback_name(),
        "checking for rain"
    );

    let (message, degraded) = match strategy.resolve(window).await {
        Resolution::Degraded { message } => (format_degraded(&message), true),
        Resolution::Resolved { provider, via_fallback, events } => {
            let report = detect(&events, window);
            tracing::info!(provider, via_fallback, rain_events = report.event_count(), "forecast resolved");

            match format_report(&report) {
                Some(message) => (message, false),
                None => {
                    tracing::info!("no rain expected in the alert window, not sending a notification");
                    return RunOutcome::NothingToSend;
                }
            }
        }
    };

    match notifier.deliver(&message).await {
        Ok(()) => RunOutcome::Sent { degraded },
        Err(e) => {
            tracing::warn!(error = %e, "notification delivery failed");
            RunOutcome::DeliveryFailed(e)
        }
    }
}
