// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Shipping batches of query records to the collector's DNS queries API.

use crate::config::CollectorConfig;
use crate::errors::{ConfigError, ShippingError};
use crate::query::QueryRecord;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::error::Error;
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// Delivers one batch of records in a single request.
#[async_trait]
pub trait QuerySender {
    async fn send(&self, batch: &[QueryRecord]) -> Result<(), ShippingError>;
}

/// HTTP client for `<endpoint>/<collector-id>/dns/queries`.
#[derive(Clone)]
pub struct CollectorApi {
    client: reqwest::Client,
    intake_url: Result<String, ConfigError>,
}

impl CollectorApi {
    #[must_use]
    pub fn new(config: &CollectorConfig) -> Self {
        let client = build_client(
            config.https_proxy.as_deref(),
            Duration::from_secs(config.timeout_secs),
        )
        .unwrap_or_else(|e| {
            error!(
                "Unable to parse proxy configuration: {}, no proxy will be used",
                e
            );
            reqwest::Client::new()
        });

        let intake_url = config.intake_url();
        if let Err(e) = &intake_url {
            error!("{e}, query batches will not be sent");
        }

        CollectorApi { client, intake_url }
    }
}

#[async_trait]
impl QuerySender for CollectorApi {
    async fn send(&self, batch: &[QueryRecord]) -> Result<(), ShippingError> {
        let url = self.intake_url.as_ref().map_err(|e| e.clone())?;

        let body = serde_json::to_vec(batch).map_err(|e| ShippingError::Payload(e.to_string()))?;

        let start = Instant::now();
        let resp = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| ShippingError::Destination(e.status(), e.to_string()))?;
        let elapsed = start.elapsed();

        let status = resp.status();
        if status.is_success() {
            debug!(
                "Collector accepted {} queries in {} ms",
                batch.len(),
                elapsed.as_millis()
            );
            Ok(())
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(ShippingError::Destination(
                Some(status),
                format!("Failed to push to collector: {body:?}"),
            ))
        }
    }
}

pub fn build_client(
    proxy_url: Option<&str>,
    timeout: Duration,
) -> Result<reqwest::Client, Box<dyn Error>> {
    let mut builder = reqwest::Client::builder().timeout(timeout);
    if let Some(proxy) = proxy_url {
        builder = builder.proxy(reqwest::Proxy::https(proxy)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn batch() -> Vec<QueryRecord> {
        vec![
            QueryRecord::new("2021-01-06T14:37:02.228Z", "192.168.0.103", "www.example.com"),
            QueryRecord::new("2021-01-06T14:37:03Z", "192.168.0.104", "www.test.com"),
        ]
    }

    fn config_for(url: String) -> CollectorConfig {
        CollectorConfig {
            endpoint: Some(url),
            api_key: Some("mock-api-key".to_string()),
            collector_id: Some("collector-1".to_string()),
            timeout_secs: 5,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_send_posts_json_batch() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/collector-1/dns/queries")
            .match_query(Matcher::UrlEncoded("key".into(), "mock-api-key".into()))
            .match_header("Content-Type", "application/json")
            .match_body(Matcher::Json(serde_json::json!([
                {"timestamp": "2021-01-06T14:37:02.228Z", "name": "www.example.com", "client_ip": "192.168.0.103"},
                {"timestamp": "2021-01-06T14:37:03Z", "name": "www.test.com", "client_ip": "192.168.0.104"},
            ])))
            .with_status(200)
            .create_async()
            .await;

        let api = CollectorApi::new(&config_for(server.url()));
        api.send(&batch()).await.expect("send should succeed");

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_any_2xx_is_success() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/collector-1/dns/queries")
            .match_query(Matcher::Any)
            .with_status(202)
            .create_async()
            .await;

        let api = CollectorApi::new(&config_for(server.url()));
        assert!(api.send(&batch()).await.is_ok());
    }

    #[tokio::test]
    async fn test_error_status_is_a_destination_failure() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/collector-1/dns/queries")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("Internal Server Error")
            .expect(1)
            .create_async()
            .await;

        let api = CollectorApi::new(&config_for(server.url()));
        match api.send(&batch()).await {
            Err(ShippingError::Destination(Some(status), msg)) => {
                assert_eq!(status.as_u16(), 500);
                assert!(msg.contains("Internal Server Error"));
            }
            other => panic!("expected destination error, got {other:?}"),
        }
        // no retry
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unreachable_collector() {
        let api = CollectorApi::new(&config_for("http://127.0.0.1:1".to_string()));
        assert!(matches!(
            api.send(&batch()).await,
            Err(ShippingError::Destination(None, _))
        ));
    }

    #[tokio::test]
    async fn test_missing_configuration_sends_nothing() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let config = CollectorConfig {
            collector_id: None,
            ..config_for(server.url())
        };
        let api = CollectorApi::new(&config);
        match api.send(&batch()).await {
            Err(ShippingError::Configuration(ConfigError::Missing(missing))) => {
                assert_eq!(missing, vec!["LUMU_COLLECTOR_ID"])
            }
            other => panic!("expected configuration error, got {other:?}"),
        }
        mock.assert_async().await;
    }

    #[test]
    fn test_build_client_rejects_bad_proxy() {
        assert!(build_client(Some("http://[::1"), Duration::from_secs(1)).is_err());
        assert!(build_client(None, Duration::from_secs(1)).is_ok());
    }
}
