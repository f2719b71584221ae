//! Two-step provider fallback shared by both run modes.

use crate::{
    model::{ForecastWindow, RainEvent},
    provider::ForecastProvider,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved { provider: &'static str, via_fallback: bool, events: Vec<RainEvent> },
    /// Both providers failed; `message` is what the user should be told.
    Degraded { message: String },
}

#[derive(Debug)]
pub struct FallbackStrategy {
    primary: Box<dyn ForecastProvider>,
    fallback: Box<dyn ForecastProvider>,
    degraded_message: String,
}

impl FallbackStrategy {
    pub fn new(
        primary: Box<dyn ForecastProvider>,
        fallback: Box<dyn ForecastProvider>,
        degraded_message: impl Into<String>,
    ) -> Self {
        Self { primary, fallback, degraded_message: degraded_message.into() }
    }

    pub fn primary_name(&self) -> &'static str {
        self.primary.name()
    }

    pub fn fallback_name(&self) -> &'static str {
        self.fallback.name()
    }

    /// Ask the primary, then the fallback. A successful answer with zero events is final.
    pub async fn resolve(&self, window: &ForecastWindow) -> Resolution {
        match self.primary.forecast(window).await {
            Ok(events) => {
                tracing::info!(provider = self.primary.name(), events = events.len(), "primary provider answered");
                return Resolution::Resolved { provider: self.primary.name(), via_fallback: false, events };
            }
            Err(e) => {
                tracing::warn!(provider = self.primary.name(), error = %e, "primary provider failed, trying fallback");
            }
        }

        match self.fallback.forecast(window).await {
            Ok(events) => {
                tracing::info!(provider = self.fallback.name(), events = events.len(), "fallback provider answered");
                Resolution::Resolved { provider: self.fallback.name(), via_fallback: true, events }
            }
            Err(e) => {
                tracing::warn!(provider = self.fallback.name(), error = %e, "fallback provider failed");
                Resolution::Degraded { message: self.degraded_message.clone() }
            }
        }
    }
}
