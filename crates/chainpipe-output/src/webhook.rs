//! `webhook` sink: HTTP POST of each event's JSON.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use chainpipe_core::Event;

use crate::error::OutputError;
use crate::sink::EventSink;

pub const DEFAULT_URL: &str = "http://localhost:3000";

/// Configuration for [`WebhookSink`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    pub request_timeout: Duration,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.into(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl WebhookConfig {
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}

/// Posts every event as `application/json`. Any non-2xx answer is a failed
/// delivery.
pub struct WebhookSink {
    url: String,
    http: reqwest::Client,
}

impl WebhookSink {
    pub fn new(config: WebhookConfig) -> Result<Self, OutputError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("chainpipe/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| OutputError::Http(e.to_string()))?;
        Ok(Self {
            url: config.url,
            http,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl EventSink for WebhookSink {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn deliver(&self, event: &Event) -> Result<(), OutputError> {
        let resp = self
            .http
            .post(&self.url)
            .json(event)
            .send()
            .await
            .map_err(|e| OutputError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(OutputError::Delivery {
                status: status.as_u16(),
                body,
            });
        }
        tracing::debug!(url = %self.url, kind = %event.kind(), "Event posted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainpipe_core::BlockEvent;
    use mockito::Matcher;

    fn block() -> Event {
        Event::new(
            BlockEvent {
                block_number: 12,
                block_hash: "ab".repeat(32),
                slot_number: 1040,
                block_cbor: None,
            }
            .into(),
        )
    }

    #[test]
    fn default_url() {
        assert_eq!(WebhookConfig::default().url, "http://localhost:3000");
    }

    #[tokio::test]
    async fn posts_event_json() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .match_header("content-type", "application/json")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "type": "chainsync.block",
                "payload": { "slotNumber": 1040, "blockNumber": 12 }
            })))
            .with_status(200)
            .create_async()
            .await;

        let sink = WebhookSink::new(WebhookConfig::url(format!("{}/hook", server.url()))).unwrap();
        sink.deliver(&block()).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_status_is_a_delivery_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(503)
            .with_body("busy")
            .create_async()
            .await;

        let sink = WebhookSink::new(WebhookConfig::url(server.url())).unwrap();
        match sink.deliver(&block()).await {
            Err(OutputError::Delivery { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "busy");
            }
            other => panic!("expected delivery error, got {other:?}"),
        }
    }
}
