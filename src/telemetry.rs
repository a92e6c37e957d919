//! Envoy local API client
//!
//! Fetches `/production.json?details=1` from the gateway with a bearer token
//! and turns the first production entry into a [`TelemetrySample`].

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::{Config, TlsPolicy};
use crate::error::{BridgeError, Result};
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};

/// Path of the production endpoint, relative to the gateway base URL
pub const PRODUCTION_PATH: &str = "/production.json";

/// One reading taken from the gateway
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySample {
    /// `wNow`; may be slightly negative at night
    pub instantaneous_power_w: f64,
    /// `whLifetime`
    pub lifetime_energy_wh: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductionEntry {
    w_now: f64,
    wh_lifetime: f64,
}

/// Parse a production.json body. Only the first `production` element is
/// consulted; later entries (metered readings) may have a different shape.
pub fn parse_production(body: &str) -> Result<TelemetrySample> {
    let root: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| BridgeError::parse(format!("Body is not valid JSON: {}", e)))?;

    let first = root
        .get("production")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| BridgeError::parse("Missing 'production' array"))?
        .first()
        .ok_or_else(|| BridgeError::parse("'production' array is empty"))?;

    let entry = ProductionEntry::deserialize(first)
        .map_err(|e| BridgeError::parse(format!("Invalid production entry: {}", e)))?;

    Ok(TelemetrySample {
        instantaneous_power_w: entry.w_now,
        lifetime_energy_wh: entry.wh_lifetime,
    })
}

/// Anything that can hand the engine a raw production body
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Fetch the raw body of one reading
    async fn fetch(&self) -> Result<String>;

    /// Human readable location, used for `/Mgmt/Connection` and logs
    fn describe(&self) -> String;
}

/// HTTPS client for the Envoy gateway
pub struct EnvoyClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
    logger: StructuredLogger,
}

impl EnvoyClient {
    /// Create a client for `base_url` (scheme and host, no trailing path)
    pub fn new(base_url: &str, token: &str, timeout: Duration, tls: &TlsPolicy) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let logger = get_logger_with_context(
            LogContext::new("envoy").with_field("base_url", base_url.clone()),
        );

        let mut builder = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("enphase-venus/", env!("APP_VERSION")));

        match tls {
            TlsPolicy::AcceptInvalid => {
                logger.warn("TLS certificate verification is disabled for the Envoy connection");
                builder = builder.danger_accept_invalid_certs(true);
            }
            TlsPolicy::SystemRoots => {}
            TlsPolicy::CustomCa { ca_file } => {
                let pem = std::fs::read(ca_file).map_err(|e| {
                    BridgeError::config(format!("Cannot read CA file '{}': {}", ca_file, e))
                })?;
                let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                    BridgeError::config(format!("Invalid CA certificate '{}': {}", ca_file, e))
                })?;
                builder = builder
                    .tls_built_in_root_certs(false)
                    .add_root_certificate(cert);
            }
        }

        let client = builder
            .build()
            .map_err(|e| BridgeError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            token: token.to_string(),
            logger,
        })
    }

    /// Client for `https://{network.ip_address}` using the configured policy
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &format!("https://{}", config.network.ip_address.trim()),
            &config.auth.token,
            config.request_timeout(),
            &config.network.tls,
        )
    }

    pub fn production_url(&self) -> String {
        format!("{}{}", self.base_url, PRODUCTION_PATH)
    }
}

#[async_trait]
impl TelemetrySource for EnvoyClient {
    async fn fetch(&self) -> Result<String> {
        self.logger.trace("Requesting production data");
        let response = self
            .client
            .get(self.production_url())
            .query(&[("details", "1")])
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BridgeError::Http {
                status: status.as_u16(),
            });
        }

        Ok(response.text().await?)
    }

    fn describe(&self) -> String {
        format!("Envoy at {}", self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_production_entry() {
        let body = r#"{
            "production": [
                {"type": "inverters", "activeCount": 12, "readingTime": 1700000000,
                 "wNow": 2500, "whLifetime": 1234567},
                {"type": "eim", "measurementType": "production", "wNow": 2490.2}
            ],
            "consumption": []
        }"#;
        let sample = parse_production(body).unwrap();
        assert_eq!(sample.instantaneous_power_w, 2500.0);
        assert_eq!(sample.lifetime_energy_wh, 1_234_567.0);
    }

    #[test]
    fn negative_power_is_kept_raw() {
        let sample =
            parse_production(r#"{"production":[{"wNow":-3.5,"whLifetime":10}]}"#).unwrap();
        assert_eq!(sample.instantaneous_power_w, -3.5);
    }

    #[test]
    fn missing_production_is_parse_error() {
        let err = parse_production(r#"{"consumption":[]}"#).unwrap_err();
        assert!(err.is_parse_error());
        assert!(err.to_string().contains("production"));
    }

    #[test]
    fn malformed_bodies_are_parse_errors() {
        for body in [
            "",
            "<html>login</html>",
            r#"{"production": {}}"#,
            r#"{"production": []}"#,
            r#"{"production": [{"wNow": 1}]}"#,
            r#"{"production": [{"wNow": "high", "whLifetime": 1}]}"#,
        ] {
            let err = parse_production(body).unwrap_err();
            assert!(err.is_parse_error(), "expected parse error for {:?}", body);
        }
    }

    #[test]
    fn production_url_strips_trailing_slash() {
        let client = EnvoyClient::new(
            "https://192.168.1.50/",
            "tok",
            Duration::from_secs(15),
            &TlsPolicy::AcceptInvalid,
        )
        .unwrap();
        assert_eq!(client.production_url(), "https://192.168.1.50/production.json");
        assert_eq!(client.describe(), "Envoy at https://192.168.1.50");
    }

    #[test]
    fn missing_ca_file_is_config_error() {
        let result = EnvoyClient::new(
            "https://192.168.1.50",
            "tok",
            Duration::from_secs(15),
            &TlsPolicy::CustomCa {
                ca_file: "/nonexistent/envoy-ca.pem".to_string(),
            },
        );
        assert!(matches!(result, Err(BridgeError::Config { .. })));
    }

    #[tokio::test]
    async fn fetch_sends_bearer_token_and_details_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", PRODUCTION_PATH)
            .match_query(mockito::Matcher::UrlEncoded("details".into(), "1".into()))
            .match_header("authorization", "Bearer secret-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"production":[{"wNow":100,"whLifetime":2000}]}"#)
            .create_async()
            .await;

        let client = EnvoyClient::new(
            &server.url(),
            "secret-token",
            Duration::from_secs(5),
            &TlsPolicy::AcceptInvalid,
        )
        .unwrap();
        let body = client.fetch().await.unwrap();
        assert_eq!(parse_production(&body).unwrap().lifetime_energy_wh, 2000.0);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_status_is_http_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", PRODUCTION_PATH)
            .match_query(mockito::Matcher::Any)
            .with_status(401)
            .with_body("Unauthorized")
            .create_async()
            .await;

        let client = EnvoyClient::new(
            &server.url(),
            "expired",
            Duration::from_secs(5),
            &TlsPolicy::AcceptInvalid,
        )
        .unwrap();
        let err = client.fetch().await.unwrap_err();
        assert!(matches!(err, BridgeError::Http { status: 401 }));
        assert!(err.is_fetch_error());
    }
}
