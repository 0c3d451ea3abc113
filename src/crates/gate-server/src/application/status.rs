//! StatusPublisher: the periodic status line shown on the gate's display.
//!
//! Every interval the publisher reads the local time, the occupancy count,
//! and the current weather, then publishes (retained) a line such as:
//!
//! ```text
//! 14:05 | LYON 18C NUAGES | P:07/10
//! ```
//!
//! Weather comes from an injected [`WeatherSource`].  The lookup is bounded
//! by a timeout; on any failure the line carries `??` and `OFFLINE` instead.
//! No error ever leaves an iteration: the loop only stops on shutdown.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, NaiveTime};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::application::outbound::{MessagePublisher, PublishError};
use crate::application::record_store::RecordStore;

const PLACEHOLDER_TEMPERATURE: &str = "??";
const PLACEHOLDER_CONDITION: &str = "OFFLINE";

/// Coarse weather category shown on the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherCondition {
    Storm,
    Drizzle,
    Rain,
    Snow,
    Mist,
    Clear,
    Clouds,
    Variable,
}

impl WeatherCondition {
    /// Maps an OpenWeatherMap condition id onto a display category.
    pub fn from_code(code: u32) -> Self {
        match code {
            200..=232 => Self::Storm,
            300..=321 => Self::Drizzle,
            500..=531 => Self::Rain,
            600..=622 => Self::Snow,
            701..=781 => Self::Mist,
            800 => Self::Clear,
            c if c > 800 => Self::Clouds,
            _ => Self::Variable,
        }
    }

    /// Text shown on the gate display, in the installation's French
    /// vocabulary.
    pub fn label(self) -> &'static str {
        match self {
            Self::Storm => "ORAGE",
            Self::Drizzle => "BRUINE",
            Self::Rain => "PLUIE",
            Self::Snow => "NEIGE",
            Self::Mist => "BRUME",
            Self::Clear => "SOLEIL",
            Self::Clouds => "NUAGES",
            Self::Variable => "VARIABLE",
        }
    }
}

/// Current conditions for the configured city.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeatherReport {
    /// Whole degrees Celsius, truncated toward zero.
    pub temperature_c: i32,
    pub condition: WeatherCondition,
}

/// Error from a weather lookup.  Every variant leads to the placeholder.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WeatherError {
    #[error("weather lookup timed out")]
    Timeout,

    #[error("weather request failed: {0}")]
    Http(String),

    #[error("weather service answered HTTP {0}")]
    Status(u16),

    #[error("unexpected weather response: {0}")]
    Decode(String),

    #[error("weather lookups are disabled")]
    Disabled,
}

/// Source of the current weather.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn current(&self) -> Result<WeatherReport, WeatherError>;
}

/// Error from a single status publication.
#[derive(Debug, Error)]
pub enum StatusError {
    #[error("occupancy read failed: {0}")]
    Occupancy(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// Settings for [`StatusPublisher`], taken from the service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSettings {
    pub max_capacity: u32,
    pub city: String,
    pub interval: Duration,
    pub weather_timeout: Duration,
    pub topic: String,
}

/// Free places left, never below zero.
pub fn free_capacity(max_capacity: u32, occupancy: usize) -> u32 {
    let occupancy = u32::try_from(occupancy).unwrap_or(u32::MAX);
    max_capacity.saturating_sub(occupancy)
}

/// Renders the status line.  `weather` of `None` renders the placeholder.
pub fn format_status(
    now: NaiveTime,
    city: &str,
    weather: Option<&WeatherReport>,
    free: u32,
    max_capacity: u32,
) -> String {
    let (temperature, condition) = match weather {
        Some(report) => (report.temperature_c.to_string(), report.condition.label()),
        None => (PLACEHOLDER_TEMPERATURE.to_string(), PLACEHOLDER_CONDITION),
    };
    format!(
        "{} | {} {}C {} | P:{:02}/{}",
        now.format("%H:%M"),
        city.to_uppercase(),
        temperature,
        condition,
        free,
        max_capacity
    )
}

/// Periodically publishes the status line.
pub struct StatusPublisher {
    store: Arc<RecordStore>,
    weather: Arc<dyn WeatherSource>,
    publisher: Arc<dyn MessagePublisher>,
    settings: StatusSettings,
}

impl StatusPublisher {
    pub fn new(
        store: Arc<RecordStore>,
        weather: Arc<dyn WeatherSource>,
        publisher: Arc<dyn MessagePublisher>,
        settings: StatusSettings,
    ) -> Self {
        Self {
            store,
            weather,
            publisher,
            settings,
        }
    }

    /// Builds the status line for `now`.
    ///
    /// The weather lookup is bounded by `weather_timeout`; the store count is
    /// read on the blocking pool so the store lock is never held across an
    /// `.await`.
    ///
    /// # Errors
    ///
    /// Returns [`StatusError::Occupancy`] only if the blocking task panicked.
    pub async fn compose(&self, now: NaiveTime) -> Result<String, StatusError> {
        let lookup = self.weather.current();
        let weather = match tokio::time::timeout(self.settings.weather_timeout, lookup).await {
            Ok(Ok(report)) => Some(report),
            Ok(Err(WeatherError::Disabled)) => None,
            Ok(Err(e)) => {
                warn!(error = %e, "weather unavailable");
                None
            }
            Err(_) => {
                warn!(error = %WeatherError::Timeout, "weather unavailable");
                None
            }
        };

        let store = Arc::clone(&self.store);
        let occupancy = tokio::task::spawn_blocking(move || store.count()).await?;
        let free = free_capacity(self.settings.max_capacity, occupancy);

        Ok(format_status(
            now,
            &self.settings.city,
            weather.as_ref(),
            free,
            self.settings.max_capacity,
        ))
    }

    /// Composes and publishes one status line (retained).
    pub async fn publish_once(&self, now: NaiveTime) -> Result<String, StatusError> {
        let line = self.compose(now).await?;
        self.publisher
            .publish(&self.settings.topic, line.clone(), true)
            .await?;
        debug!(status = %line, "status published");
        Ok(line)
    }

    /// Publishes immediately, then every `interval`, until `shutdown` flips
    /// to `true` or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(interval_secs = self.settings.interval.as_secs(), "status publisher started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.publish_once(Local::now().time()).await {
                        warn!(error = %e, "status publication failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("status publisher stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::memory::MemoryRecordFile;
    use crate::infrastructure::transport::mock::RecordingPublisher;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).expect("valid time")
    }

    fn settings() -> StatusSettings {
        StatusSettings {
            max_capacity: 10,
            city: "Lyon".into(),
            interval: Duration::from_secs(30),
            weather_timeout: Duration::from_millis(50),
            topic: "parking/weather".into(),
        }
    }

    fn store_with(count: usize) -> Arc<RecordStore> {
        let store = RecordStore::open(Box::new(MemoryRecordFile::new())).expect("open store");
        for i in 0..count {
            store.insert(&format!("UID{i}"), "holder").expect("insert");
        }
        Arc::new(store)
    }

    fn sunny() -> MockWeatherSource {
        let mut weather = MockWeatherSource::new();
        weather.expect_current().returning(|| {
            Ok(WeatherReport {
                temperature_c: 18,
                condition: WeatherCondition::Clouds,
            })
        });
        weather
    }

    // ── pure helpers ──────────────────────────────────────────────────────────

    #[test]
    fn test_free_capacity_is_floored_at_zero() {
        assert_eq!(free_capacity(10, 3), 7);
        assert_eq!(free_capacity(10, 10), 0);
        assert_eq!(free_capacity(10, 12), 0);
    }

    #[test]
    fn test_condition_codes_map_to_categories() {
        let cases = [
            (211, WeatherCondition::Storm),
            (301, WeatherCondition::Drizzle),
            (500, WeatherCondition::Rain),
            (601, WeatherCondition::Snow),
            (741, WeatherCondition::Mist),
            (800, WeatherCondition::Clear),
            (804, WeatherCondition::Clouds),
            (100, WeatherCondition::Variable),
            (550, WeatherCondition::Variable),
        ];
        for (code, expected) in cases {
            assert_eq!(WeatherCondition::from_code(code), expected, "code {code}");
        }
    }

    #[test]
    fn test_condition_labels_use_display_vocabulary() {
        let labels: Vec<_> = [211, 301, 500, 601, 741, 800, 804, 100]
            .into_iter()
            .map(|code| WeatherCondition::from_code(code).label())
            .collect();
        assert_eq!(
            labels,
            ["ORAGE", "BRUINE", "PLUIE", "NEIGE", "BRUME", "SOLEIL", "NUAGES", "VARIABLE"]
        );
    }

    #[test]
    fn test_format_status_pads_free_places() {
        let report = WeatherReport {
            temperature_c: -3,
            condition: WeatherCondition::Snow,
        };
        assert_eq!(
            format_status(at(7, 5), "Lyon", Some(&report), 7, 10),
            "07:05 | LYON -3C NEIGE | P:07/10"
        );
    }

    #[test]
    fn test_format_status_without_weather_uses_placeholder() {
        assert_eq!(
            format_status(at(23, 59), "Lyon", None, 0, 10),
            "23:59 | LYON ??C OFFLINE | P:00/10"
        );
    }

    // ── compose / publish ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_compose_reports_free_places_from_store() {
        // Arrange
        let publisher = StatusPublisher::new(
            store_with(3),
            Arc::new(sunny()),
            Arc::new(RecordingPublisher::new()),
            settings(),
        );

        // Act
        let line = publisher.compose(at(14, 5)).await.unwrap();

        // Assert
        assert_eq!(line, "14:05 | LYON 18C NUAGES | P:07/10");
    }

    #[tokio::test]
    async fn test_compose_uses_placeholder_on_weather_error() {
        let mut weather = MockWeatherSource::new();
        weather
            .expect_current()
            .returning(|| Err(WeatherError::Status(401)));
        let publisher = StatusPublisher::new(
            store_with(12),
            Arc::new(weather),
            Arc::new(RecordingPublisher::new()),
            settings(),
        );

        let line = publisher.compose(at(9, 0)).await.unwrap();

        assert_eq!(line, "09:00 | LYON ??C OFFLINE | P:00/10");
    }

    struct StalledWeather;

    #[async_trait]
    impl WeatherSource for StalledWeather {
        async fn current(&self) -> Result<WeatherReport, WeatherError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(WeatherError::Timeout)
        }
    }

    #[tokio::test]
    async fn test_compose_uses_placeholder_when_weather_times_out() {
        let publisher = StatusPublisher::new(
            store_with(0),
            Arc::new(StalledWeather),
            Arc::new(RecordingPublisher::new()),
            settings(),
        );
        let line = publisher.compose(at(12, 30)).await.unwrap();
        assert!(line.contains("??C OFFLINE"), "{line}");
    }

    #[tokio::test]
    async fn test_publish_once_is_retained_on_status_topic() {
        // Arrange
        let recorder = Arc::new(RecordingPublisher::new());
        let publisher =
            StatusPublisher::new(store_with(1), Arc::new(sunny()), recorder.clone(), settings());

        // Act
        publisher.publish_once(at(8, 15)).await.unwrap();

        // Assert
        let published = recorder.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].topic, "parking/weather");
        assert_eq!(published[0].payload, "08:15 | LYON 18C NUAGES | P:09/10");
        assert!(published[0].retain);
    }

    #[tokio::test]
    async fn test_publish_once_surfaces_publish_failure() {
        let publisher = StatusPublisher::new(
            store_with(0),
            Arc::new(sunny()),
            Arc::new(RecordingPublisher::failing()),
            settings(),
        );
        assert!(matches!(
            publisher.publish_once(at(8, 15)).await,
            Err(StatusError::Publish(_))
        ));
    }

    #[tokio::test]
    async fn test_run_publishes_then_stops_on_shutdown() {
        // Arrange
        let recorder = Arc::new(RecordingPublisher::new());
        let publisher =
            StatusPublisher::new(store_with(0), Arc::new(sunny()), recorder.clone(), settings());
        let (tx, rx) = watch::channel(false);

        // Act: the first tick fires immediately
        let handle = tokio::spawn(publisher.run(rx));
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("run loop stops")
            .unwrap();

        // Assert
        assert_eq!(recorder.published().len(), 1);
    }
}
