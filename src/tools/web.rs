//! Web access tools: weather lookup and raw URL fetch.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Number, Value};
use url::Url;

use super::{failure, ParamType, ParameterSchema, Tool};

/// Maximum number of body characters returned by `http_get`.
pub const HTTP_GET_MAX_CHARS: usize = 1000;

/// Bytes read before `http_get` stops pulling the body. Enough for
/// `HTTP_GET_MAX_CHARS` characters of UTF-8.
const HTTP_GET_MAX_BYTES: usize = HTTP_GET_MAX_CHARS * 4;

/// Base URLs of the open-meteo services.
#[derive(Debug, Clone)]
pub struct WeatherEndpoints {
    pub geocoding_url: String,
    pub forecast_url: String,
}

impl Default for WeatherEndpoints {
    fn default() -> Self {
        Self {
            geocoding_url: "https://geocoding-api.open-meteo.com/v1/search".to_string(),
            forecast_url: "https://api.open-meteo.com/v1/forecast".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Option<Vec<Place>>,
}

#[derive(Debug, Deserialize)]
struct Place {
    latitude: f64,
    longitude: f64,
    name: String,
    #[serde(default)]
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: CurrentConditions,
}

#[derive(Debug, Deserialize)]
struct CurrentConditions {
    temperature_2m: Number,
    relative_humidity_2m: Number,
    weather_code: i64,
    wind_speed_10m: Number,
}

/// Human-readable text for a WMO weather code.
fn describe_weather_code(code: i64) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 | 48 => "Foggy",
        51 => "Light drizzle",
        61 => "Light rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        71 => "Light snow",
        73 => "Moderate snow",
        75 => "Heavy snow",
        80 => "Rain showers",
        95 => "Thunderstorm",
        _ => "Unknown",
    }
}

/// Current weather for a city: geocode first, then fetch the forecast.
pub struct GetWeather {
    client: reqwest::Client,
    endpoints: WeatherEndpoints,
}

impl GetWeather {
    pub fn new(client: reqwest::Client, endpoints: WeatherEndpoints) -> Self {
        Self { client, endpoints }
    }

    async fn geocode(&self, city: &str) -> anyhow::Result<Option<Place>> {
        let url = format!(
            "{}?name={}&count=1&language=en&format=json",
            self.endpoints.geocoding_url,
            urlencoding::encode(city)
        );
        let response: GeocodingResponse = self.client.get(&url).send().await?.json().await?;
        Ok(response.results.and_then(|places| places.into_iter().next()))
    }

    async fn forecast(&self, place: &Place) -> anyhow::Result<CurrentConditions> {
        let url = Url::parse_with_params(
            &self.endpoints.forecast_url,
            &[
                ("latitude", place.latitude.to_string()),
                ("longitude", place.longitude.to_string()),
                (
                    "current",
                    "temperature_2m,relative_humidity_2m,weather_code,wind_speed_10m".to_string(),
                ),
                ("temperature_unit", "celsius".to_string()),
                ("wind_speed_unit", "kmh".to_string()),
            ],
        )?;
        let response: ForecastResponse = self.client.get(url).send().await?.json().await?;
        Ok(response.current)
    }

    async fn lookup(&self, city: &str) -> anyhow::Result<Value> {
        let Some(place) = self.geocode(city).await? else {
            return Ok(failure("City not found"));
        };

        let current = self.forecast(&place).await?;
        let label = match &place.country {
            Some(country) => format!("{}, {}", place.name, country),
            None => place.name.clone(),
        };

        Ok(json!({
            "success": true,
            "weather": {
                "city": label,
                "temperature": current.temperature_2m,
                "condition": describe_weather_code(current.weather_code),
                "humidity": current.relative_humidity_2m,
                "windSpeed": current.wind_speed_10m,
            }
        }))
    }
}

#[async_trait]
impl Tool for GetWeather {
    fn name(&self) -> &str {
        "get_weather"
    }

    fn description(&self) -> &str {
        "Get current weather for a city"
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::object().required("city", ParamType::String, "City name to get weather for")
    }

    async fn execute(&self, args: Value) -> anyhow::Result<Value> {
        let city = args["city"].as_str().unwrap_or_default();
        match self.lookup(city).await {
            Ok(value) => Ok(value),
            Err(e) => Ok(failure(e)),
        }
    }
}

/// Fetch a URL with no host restrictions.
pub struct HttpGet {
    client: reqwest::Client,
}

impl HttpGet {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for HttpGet {
    fn name(&self) -> &str {
        "http_get"
    }

    fn description(&self) -> &str {
        "Make an HTTP GET request to a URL"
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::object().required("url", ParamType::String, "URL to fetch")
    }

    async fn execute(&self, args: Value) -> anyhow::Result<Value> {
        let url = match Url::parse(args["url"].as_str().unwrap_or_default()) {
            Ok(url) => url,
            Err(e) => return Ok(failure(format!("Invalid URL: {}", e))),
        };

        let mut response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => return Ok(failure(e)),
        };
        let status = response.status().as_u16();

        let mut body = Vec::new();
        while body.len() < HTTP_GET_MAX_BYTES {
            match response.chunk().await {
                Ok(Some(chunk)) => body.extend_from_slice(&chunk),
                Ok(None) => break,
                Err(e) => return Ok(failure(e)),
            }
        }

        let data: String = String::from_utf8_lossy(&body)
            .chars()
            .take(HTTP_GET_MAX_CHARS)
            .collect();
        Ok(json!({ "success": true, "status": status, "data": data }))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use std::time::Duration;

    use axum::body::{Body, Bytes};
    use axum::{extract::Query, routing::get, Json, Router};

    use super::*;

    struct FakeMeteo {
        base: String,
        forecast_hits: Arc<AtomicUsize>,
    }

    async fn spawn_fake_meteo() -> FakeMeteo {
        let forecast_hits = Arc::new(AtomicUsize::new(0));
        let hits = Arc::clone(&forecast_hits);

        let app = Router::new()
            .route(
                "/search",
                get(|Query(params): Query<HashMap<String, String>>| async move {
                    let name = params.get("name").cloned().unwrap_or_default();
                    if name == "Tokyo" {
                        Json(json!({
                            "results": [{
                                "latitude": 35.6895,
                                "longitude": 139.69171,
                                "name": "Tokyo",
                                "country": "Japan"
                            }]
                        }))
                    } else {
                        Json(json!({"generationtime_ms": 0.5}))
                    }
                }),
            )
            .route(
                "/forecast",
                get(move |Query(params): Query<HashMap<String, String>>| {
                    let hits = Arc::clone(&hits);
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        assert_eq!(params.get("latitude").map(String::as_str), Some("35.6895"));
                        Json(json!({
                            "current": {
                                "temperature_2m": 15.2,
                                "relative_humidity_2m": 60,
                                "weather_code": 2,
                                "wind_speed_10m": 11.5
                            }
                        }))
                    }
                }),
            )
            .route("/big", get(|| async { "é".repeat(HTTP_GET_MAX_CHARS + 500) }))
            .route(
                "/endless",
                get(|| async {
                    static CHUNK: [u8; 1024] = [b'a'; 1024];
                    Body::from_stream(futures::stream::repeat_with(|| {
                        Ok::<_, std::io::Error>(Bytes::from_static(&CHUNK))
                    }))
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        FakeMeteo {
            base: format!("http://{}", addr),
            forecast_hits,
        }
    }

    fn weather_tool(fake: &FakeMeteo) -> GetWeather {
        GetWeather::new(
            reqwest::Client::new(),
            WeatherEndpoints {
                geocoding_url: format!("{}/search", fake.base),
                forecast_url: format!("{}/forecast", fake.base),
            },
        )
    }

    #[tokio::test]
    async fn unknown_city_skips_the_forecast_call() {
        let fake = spawn_fake_meteo().await;

        let result = weather_tool(&fake)
            .execute(json!({"city": "Atlantis"}))
            .await
            .unwrap();

        assert_eq!(result, json!({"success": false, "error": "City not found"}));
        assert_eq!(fake.forecast_hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn known_city_composes_geocode_and_forecast() {
        let fake = spawn_fake_meteo().await;

        let result = weather_tool(&fake)
            .execute(json!({"city": "Tokyo"}))
            .await
            .unwrap();

        assert_eq!(result["success"], true);
        assert_eq!(result["weather"]["city"], "Tokyo, Japan");
        assert_eq!(result["weather"]["condition"], "Partly cloudy");
        assert_eq!(result["weather"]["temperature"], 15.2);
        assert_eq!(result["weather"]["windSpeed"], 11.5);
        assert_eq!(result["weather"]["humidity"], json!(60));
        assert!(result["weather"]["humidity"].is_u64());
        assert_eq!(fake.forecast_hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unreachable_service_is_a_failure_value() {
        let tool = GetWeather::new(
            reqwest::Client::new(),
            WeatherEndpoints {
                geocoding_url: "http://127.0.0.1:1/search".to_string(),
                forecast_url: "http://127.0.0.1:1/forecast".to_string(),
            },
        );

        let result = tool.execute(json!({"city": "Tokyo"})).await.unwrap();

        assert_eq!(result["success"], false);
        assert!(result["error"].is_string());
    }

    #[tokio::test]
    async fn http_get_truncates_to_character_limit() {
        let fake = spawn_fake_meteo().await;
        let tool = HttpGet::new(reqwest::Client::new());

        let result = tool
            .execute(json!({"url": format!("{}/big", fake.base)}))
            .await
            .unwrap();

        assert_eq!(result["success"], true);
        assert_eq!(result["status"], 200);
        assert_eq!(
            result["data"].as_str().unwrap().chars().count(),
            HTTP_GET_MAX_CHARS
        );
    }

    #[tokio::test]
    async fn http_get_stops_reading_an_endless_body() {
        let fake = spawn_fake_meteo().await;
        let tool = HttpGet::new(reqwest::Client::new());

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            tool.execute(json!({"url": format!("{}/endless", fake.base)})),
        )
        .await
        .expect("http_get kept reading")
        .unwrap();

        assert_eq!(result["success"], true);
        assert_eq!(result["data"], "a".repeat(HTTP_GET_MAX_CHARS));
    }

    #[tokio::test]
    async fn http_get_rejects_malformed_urls() {
        let tool = HttpGet::new(reqwest::Client::new());

        let result = tool.execute(json!({"url": "not a url"})).await.unwrap();

        assert_eq!(result["success"], false);
        assert!(result["error"].as_str().unwrap().starts_with("Invalid URL"));
    }

    #[test]
    fn weather_codes_map_to_text() {
        assert_eq!(describe_weather_code(0), "Clear sky");
        assert_eq!(describe_weather_code(48), "Foggy");
        assert_eq!(describe_weather_code(95), "Thunderstorm");
        assert_eq!(describe_weather_code(42), "Unknown");
    }
}
