//! OpenWeatherMap client for the status line.
//!
//! Calls the current-weather endpoint
//! (`/data/2.5/weather?q=<city>&appid=<key>&units=metric`) and keeps only
//! the two values the display needs: the temperature, truncated to whole
//! degrees, and the condition id of the first `weather` entry.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::application::status::{WeatherCondition, WeatherError, WeatherReport, WeatherSource};
use crate::infrastructure::storage::config::WeatherConfig;

const CURRENT_WEATHER_PATH: &str = "/data/2.5/weather";

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    main: MainBlock,
    weather: Vec<ConditionBlock>,
}

#[derive(Debug, Deserialize)]
struct MainBlock {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct ConditionBlock {
    id: u32,
}

/// Extracts a [`WeatherReport`] from a current-weather JSON body.
///
/// # Errors
///
/// Returns [`WeatherError::Decode`] if the body is not JSON, lacks
/// `main.temp`, or has an empty `weather` array.
pub fn parse_report(body: &str) -> Result<WeatherReport, WeatherError> {
    let parsed: CurrentWeather =
        serde_json::from_str(body).map_err(|e| WeatherError::Decode(e.to_string()))?;
    let condition = parsed
        .weather
        .first()
        .ok_or_else(|| WeatherError::Decode("empty `weather` array".to_string()))?;
    Ok(WeatherReport {
        temperature_c: parsed.main.temp.trunc() as i32,
        condition: WeatherCondition::from_code(condition.id),
    })
}

/// [`WeatherSource`] backed by the OpenWeatherMap HTTP API.
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    http: reqwest::Client,
    base_url: String,
    city: String,
    api_key: String,
}

impl OpenWeatherClient {
    /// # Errors
    ///
    /// Returns [`WeatherError::Http`] if the HTTP client cannot be built.
    pub fn new(config: &WeatherConfig) -> Result<Self, WeatherError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| WeatherError::Http(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            city: config.city.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn endpoint(&self) -> Result<reqwest::Url, WeatherError> {
        reqwest::Url::parse_with_params(
            &format!("{}{}", self.base_url, CURRENT_WEATHER_PATH),
            &[
                ("q", self.city.as_str()),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
            ],
        )
        .map_err(|e| WeatherError::Http(e.to_string()))
    }
}

#[async_trait]
impl WeatherSource for OpenWeatherClient {
    async fn current(&self) -> Result<WeatherReport, WeatherError> {
        if self.api_key.is_empty() {
            return Err(WeatherError::Disabled);
        }

        let response = self.http.get(self.endpoint()?).send().await.map_err(|e| {
            if e.is_timeout() {
                WeatherError::Timeout
            } else {
                WeatherError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(WeatherError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| WeatherError::Http(e.to_string()))?;
        let report = parse_report(&body)?;
        debug!(
            temperature_c = report.temperature_c,
            condition = report.condition.label(),
            "weather updated"
        );
        Ok(report)
    }
}

/// [`WeatherSource`] used when no API key is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineWeather;

#[async_trait]
impl WeatherSource for OfflineWeather {
    async fn current(&self) -> Result<WeatherReport, WeatherError> {
        Err(WeatherError::Disabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "coord": {"lon": 4.85, "lat": 45.75},
        "weather": [{"id": 803, "main": "Clouds", "description": "broken clouds"}],
        "main": {"temp": 18.7, "feels_like": 18.1, "humidity": 60},
        "name": "Lyon",
        "cod": 200
    }"#;

    fn config(api_key: &str, base_url: &str) -> WeatherConfig {
        WeatherConfig {
            city: "Lyon".into(),
            api_key: api_key.into(),
            base_url: base_url.into(),
            timeout_secs: 1,
        }
    }

    #[test]
    fn test_parse_report_truncates_temperature() {
        let report = parse_report(SAMPLE).unwrap();
        assert_eq!(report.temperature_c, 18);
        assert_eq!(report.condition, WeatherCondition::Clouds);
    }

    #[test]
    fn test_parse_report_truncates_negative_toward_zero() {
        let body = r#"{"weather":[{"id":601}],"main":{"temp":-2.9}}"#;
        let report = parse_report(body).unwrap();
        assert_eq!(report.temperature_c, -2);
        assert_eq!(report.condition, WeatherCondition::Snow);
    }

    #[test]
    fn test_parse_report_rejects_missing_fields() {
        let bodies = [
            "not json",
            r#"{"main":{"temp":1.0}}"#,
            r#"{"weather":[],"main":{"temp":1.0}}"#,
        ];
        for body in bodies {
            assert!(
                matches!(parse_report(body), Err(WeatherError::Decode(_))),
                "{body}"
            );
        }
    }

    #[test]
    fn test_endpoint_carries_city_key_and_units() {
        let client = OpenWeatherClient::new(&config("abc", "http://weather.test/")).unwrap();
        let url = client.endpoint().unwrap();
        assert_eq!(url.path(), "/data/2.5/weather");
        assert_eq!(url.query(), Some("q=Lyon&appid=abc&units=metric"));
    }

    #[tokio::test]
    async fn test_empty_api_key_disables_lookup() {
        let client = OpenWeatherClient::new(&config("", "http://weather.test")).unwrap();
        assert_eq!(client.current().await, Err(WeatherError::Disabled));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_an_error() {
        // Port 9 (discard) on loopback is not expected to speak HTTP.
        let client = OpenWeatherClient::new(&config("abc", "http://127.0.0.1:9")).unwrap();
        assert!(client.current().await.is_err());
    }

    #[tokio::test]
    async fn test_offline_weather_is_disabled() {
        assert_eq!(OfflineWeather.current().await, Err(WeatherError::Disabled));
    }
}
