//! Readiness Service
//!
//! Decides whether the three stores hold enough history to train, and which
//! hours the forecast should cover.

use crate::error::Result;
use crate::services::series_service::{add_hours, ReadinessWindow, SeriesKind, TimeSeriesStore};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Readiness of one store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesReadiness {
    pub series: SeriesKind,
    pub friendly_name: String,
    pub minimum_data_required: usize,
    pub window: Option<ReadinessWindow>,
}

/// Per-store readiness plus the resulting forecast window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessReport {
    pub series: Vec<SeriesReadiness>,
    pub hours_prior: u32,
    pub window: Option<ReadinessWindow>,
}

impl ReadinessReport {
    pub fn is_ready(&self) -> bool {
        self.window.is_some()
    }
}

pub struct ReadinessEvaluator;

impl ReadinessEvaluator {
    /// Forecast window for the three stores, or `None` when any is short
    pub fn evaluate(
        load: &TimeSeriesStore,
        historical_weather: &TimeSeriesStore,
        forecast_weather: &TimeSeriesStore,
        hours_prior: u32,
    ) -> Result<Option<ReadinessWindow>> {
        Ok(Self::compute_window(
            load.readiness()?,
            historical_weather.readiness()?,
            forecast_weather.readiness()?,
            hours_prior,
        ))
    }

    /// Same as `evaluate`, keeping each store's own readiness
    pub fn evaluate_report(
        load: &TimeSeriesStore,
        historical_weather: &TimeSeriesStore,
        forecast_weather: &TimeSeriesStore,
        hours_prior: u32,
    ) -> Result<ReadinessReport> {
        let mut series = Vec::with_capacity(3);
        for store in [load, historical_weather, forecast_weather] {
            series.push(SeriesReadiness {
                series: store.kind(),
                friendly_name: store.friendly_name().to_string(),
                minimum_data_required: store.minimum_data_required(),
                window: store.readiness()?,
            });
        }

        let window = Self::compute_window(
            series[0].window,
            series[1].window,
            series[2].window,
            hours_prior,
        );

        Ok(ReadinessReport {
            series,
            hours_prior,
            window,
        })
    }

    /// The historical end `E` is the earlier of the two historical ends.
    /// Forecast weather must reach at least `E + hours_prior`; the window is
    /// then `[E + 1h, E + hours_prior]`.
    pub fn compute_window(
        load: Option<ReadinessWindow>,
        historical_weather: Option<ReadinessWindow>,
        forecast_weather: Option<ReadinessWindow>,
        hours_prior: u32,
    ) -> Option<ReadinessWindow> {
        let (load, historical_weather, forecast_weather) =
            match (load, historical_weather, forecast_weather) {
                (Some(l), Some(h), Some(f)) => (l, h, f),
                _ => return None,
            };

        let historical_end = load.end_date.min(historical_weather.end_date);
        let end_date = add_hours(historical_end, i64::from(hours_prior));

        if forecast_weather.end_date < end_date {
            debug!(
                "Forecast weather ends at {}, needs to reach {}",
                forecast_weather.end_date, end_date
            );
            return None;
        }

        Some(ReadinessWindow {
            start_date: add_hours(historical_end, 1),
            end_date,
        })
    }
}
