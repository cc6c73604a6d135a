//! Integration tests for the OpenWeather client against a mock server

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use weatherfeed::data::{
    City, OpenWeatherClient, OpenWeatherGeocoder, ProviderStatus, WeatherError, WeatherProvider,
};
use weatherfeed::location::{Geocoder, LocationError};

fn current_body() -> serde_json::Value {
    json!({
        "coord": { "lon": -9.1333, "lat": 38.7167 },
        "weather": [
            { "id": 801, "main": "Clouds", "description": "few clouds", "icon": "02d" }
        ],
        "base": "stations",
        "main": {
            "temp": 295.4,
            "feels_like": 295.1,
            "temp_min": 293.9,
            "temp_max": 297.0,
            "pressure": 1016,
            "humidity": 56,
            "sea_level": 1016,
            "grnd_level": 1009
        },
        "visibility": 10000,
        "wind": { "speed": 5.14, "deg": 340 },
        "clouds": { "all": 20 },
        "dt": 1721052000,
        "sys": {
            "type": 2,
            "id": 2002343,
            "country": "PT",
            "sunrise": 1721020680,
            "sunset": 1721073120
        },
        "timezone": 3600,
        "id": 2267057,
        "name": "Lisbon",
        "cod": 200
    })
}

fn sample(dt_txt: &str, temp: f64, main: &str, icon: &str) -> serde_json::Value {
    json!({
        "dt": 0,
        "main": { "temp": temp },
        "weather": [
            { "id": 800, "main": main, "description": main.to_lowercase(), "icon": icon }
        ],
        "dt_txt": dt_txt
    })
}

fn client_for(server: &MockServer) -> OpenWeatherClient {
    OpenWeatherClient::new("test-key").with_base_url(server.uri())
}

#[tokio::test]
async fn test_fetch_current_weather() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/weather"))
        .and(query_param("q", "Lisbon,PT"))
        .and(query_param("appid", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(current_body()))
        .expect(1)
        .mount(&server)
        .await;

    let weather = client_for(&server)
        .fetch_current_weather(&City::new("Lisbon", "PT"))
        .await
        .expect("Failed to fetch weather");

    assert_eq!(weather.name, "Lisbon");
    assert!((weather.main.temp - 295.4).abs() < 0.01);
    assert_eq!(weather.sys.country, "PT");
    let condition = weather.primary_condition().expect("Missing condition");
    assert_eq!(condition.main, "Clouds");
    assert_eq!(condition.icon, "02d");
}

#[tokio::test]
async fn test_fetch_current_weather_without_country() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/weather"))
        .and(query_param("q", "Lisbon"))
        .respond_with(ResponseTemplate::new(200).set_body_json(current_body()))
        .expect(1)
        .mount(&server)
        .await;

    let result = client_for(&server)
        .fetch_current_weather(&City::current_location("Lisbon"))
        .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn test_fetch_forecast_aggregates_days() {
    let server = MockServer::start().await;
    let body = json!({
        "cod": "200",
        "list": [
            sample("2024-07-15 12:00:00", 290.0, "Clear", "01d"),
            sample("2024-07-15 15:00:00", 295.0, "Clouds", "02d"),
            sample("2024-07-15 18:00:00", 288.0, "Clouds", "03d"),
            sample("2024-07-16 00:00:00", 285.0, "Rain", "10n")
        ]
    });
    Mock::given(method("GET"))
        .and(path("/forecast"))
        .and(query_param("q", "Lisbon"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(&server)
        .await;

    let days = client_for(&server)
        .fetch_forecast(&City::new("Lisbon", "PT"))
        .await
        .expect("Failed to fetch forecast");

    assert_eq!(days.len(), 2);
    assert_eq!(days[0].date, "2024-07-15");
    assert!((days[0].min_temp - 288.0).abs() < 0.01);
    assert!((days[0].max_temp - 295.0).abs() < 0.01);
    assert_eq!(days[0].condition, "Clouds");
    assert_eq!(days[0].description, "clear");
    assert_eq!(days[0].icon, "01d");
    assert_eq!(days[1].condition, "Rain");
}

#[tokio::test]
async fn test_fetch_forecast_without_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "cod": "200" })))
        .mount(&server)
        .await;

    let result = client_for(&server)
        .fetch_forecast(&City::new("Lisbon", "PT"))
        .await;

    assert!(matches!(result, Err(WeatherError::MalformedForecast)));
}

#[tokio::test]
async fn test_unauthorized_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/weather"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "cod": 401,
            "message": "Invalid API key. Please see https://openweathermap.org/faq#error401 for more info."
        })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .fetch_current_weather(&City::new("Lisbon", "PT"))
        .await
        .expect_err("Expected an error");

    assert_eq!(err.status(), ProviderStatus::Unauthorized);
    assert_eq!(err.to_string(), "Invalid API key");
    assert_eq!(err.user_message(), "Weather unavailable.");
}

#[tokio::test]
async fn test_not_found_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/weather"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "cod": "404",
            "message": "city not found"
        })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .fetch_current_weather(&City::new("Atlantis", ""))
        .await
        .expect_err("Expected an error");

    assert_eq!(err.status(), ProviderStatus::LocationNotFound);
    assert_eq!(err.to_string(), "City 'Atlantis' not found");
    assert_eq!(err.user_message(), "City not found. Please try again.");
}

#[tokio::test]
async fn test_forecast_not_found_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/forecast"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .fetch_forecast(&City::new("Atlantis", ""))
        .await
        .expect_err("Expected an error");

    assert_eq!(err.to_string(), "Forecast not found");
}

#[tokio::test]
async fn test_rate_limited_response_uses_error_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/weather"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "cod": 429,
            "message": "Your account is temporary blocked due to exceeding of requests limitation"
        })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .fetch_current_weather(&City::new("Lisbon", "PT"))
        .await
        .expect_err("Expected an error");

    assert_eq!(err.status(), ProviderStatus::Other("429".to_string()));
    assert!(err.to_string().contains("temporary blocked"));
    assert_eq!(err.user_message(), "Weather error (429). Please try again.");
}

#[tokio::test]
async fn test_undecodable_success_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .fetch_current_weather(&City::new("Lisbon", "PT"))
        .await
        .expect_err("Expected an error");

    assert!(matches!(err, WeatherError::Parse(_)));
}

#[tokio::test]
async fn test_reverse_geocode() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/reverse"))
        .and(query_param("limit", "1"))
        .and(query_param("appid", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "name": "Vancouver",
                "lat": 49.2827,
                "lon": -123.1207,
                "country": "CA",
                "state": "British Columbia"
            }
        ])))
        .mount(&server)
        .await;

    let geocoder = OpenWeatherGeocoder::new("test-key").with_base_url(server.uri());
    let placemark = geocoder
        .reverse_geocode(49.28, -123.12)
        .await
        .expect("Failed to geocode")
        .expect("Missing placemark");

    assert_eq!(placemark.display_name().as_deref(), Some("Vancouver"));
    assert_eq!(
        placemark.sub_administrative_area.as_deref(),
        Some("British Columbia")
    );
}

#[tokio::test]
async fn test_reverse_geocode_no_results() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/reverse"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let geocoder = OpenWeatherGeocoder::new("test-key").with_base_url(server.uri());
    let placemark = geocoder
        .reverse_geocode(0.0, 0.0)
        .await
        .expect("Failed to geocode");

    assert!(placemark.is_none());
}

#[tokio::test]
async fn test_reverse_geocode_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/reverse"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let geocoder = OpenWeatherGeocoder::new("test-key").with_base_url(server.uri());
    let result = geocoder.reverse_geocode(49.28, -123.12).await;

    assert!(matches!(result, Err(LocationError::Geocode(message)) if message == "HTTP 500"));
}
