// ABOUTME: HTTP sender posting JSON send requests to the configured endpoint.
// ABOUTME: One reqwest client is built up front so connections are reused.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Delivery, Sender};
use crate::config::ApiConfig;
use crate::error::SendError;
use crate::target::Target;

/// JSON body of a send request.
#[derive(Debug, Serialize)]
pub struct SendPayload<'a> {
    pub phone: &'a str,
    pub message: &'a str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<&'a str>,
}

/// JSON body the endpoint returns on HTTP 200.
#[derive(Debug, Deserialize)]
struct SendReply {
    #[serde(default)]
    success: bool,
}

/// Parse a `Retry-After` header given in whole seconds.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let secs = headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()?;
    Some(Duration::from_secs(secs))
}

/// Sender that posts to `base_url + send_path`.
#[derive(Debug, Clone)]
pub struct HttpSender {
    base_url: String,
    send_url: String,
    api_key: Option<String>,
    http: reqwest::Client,
}

impl HttpSender {
    /// Build a sender for the given endpoint.
    ///
    /// # Arguments
    ///
    /// * `api` - Endpoint location and optional API key.
    /// * `timeout` - Applied to every request, connect included.
    pub fn new(api: &ApiConfig, timeout: Duration) -> Result<Self, SendError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(format!("textcast/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            base_url: api.base_url.clone(),
            send_url: api.send_url(),
            api_key: api.api_key.clone(),
            http,
        })
    }

    /// The URL send requests are posted to.
    pub fn send_url(&self) -> &str {
        &self.send_url
    }

    /// Check whether the endpoint's base URL answers 200.
    pub async fn health_check(&self) -> bool {
        match self.http.get(&self.base_url).send().await {
            Ok(response) => response.status() == StatusCode::OK,
            Err(e) => {
                debug!(error = %e, "health check failed");
                false
            }
        }
    }
}

#[async_trait]
impl Sender for HttpSender {
    async fn send(&self, target: &Target) -> Result<Delivery, SendError> {
        let payload = SendPayload {
            phone: target.phone(),
            message: target.message(),
            kind: "text",
            key: self.api_key.as_deref(),
        };

        let response = self
            .http
            .post(&self.send_url)
            .header("Accept", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        match status {
            StatusCode::OK => {
                let body = response.text().await.map_err(classify)?;
                match serde_json::from_str::<SendReply>(&body) {
                    Ok(reply) if reply.success => Ok(Delivery::Accepted),
                    Ok(_) => Ok(Delivery::Rejected(body)),
                    Err(e) => Err(SendError::Decode(format!("{}: {}", e, body))),
                }
            }
            StatusCode::TOO_MANY_REQUESTS => Ok(Delivery::Throttled {
                retry_after: parse_retry_after(response.headers()),
            }),
            other => Ok(Delivery::Status(other.as_u16())),
        }
    }
}

fn classify(e: reqwest::Error) -> SendError {
    if e.is_timeout() {
        SendError::Timeout
    } else if e.is_connect() {
        SendError::Connection(e.to_string())
    } else {
        SendError::Http(e)
    }
}
