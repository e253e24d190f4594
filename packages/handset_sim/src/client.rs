//! HTTP transport to the simulator backend.
//!
//! Each operation is a single request mapped to a typed outcome. No retries
//! happen here; retry policy, if any, belongs to the caller (the engine
//! simply waits for the next poll tick).

use async_trait::async_trait;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::types::{Conversation, Device, DeviceKey, OutboxEntry, ResetReceipt, SendReceipt};

/// The five remote operations the engine needs. `GatewayClient` is the real
/// implementation; tests substitute scripted fakes at this seam.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, device: &DeviceKey, body: &str) -> Result<SendReceipt>;
    async fn fetch_conversation(&self, device: &DeviceKey) -> Result<Conversation>;
    async fn fetch_devices(&self) -> Result<Vec<Device>>;
    async fn fetch_outbox(&self) -> Result<Vec<OutboxEntry>>;
    async fn reset(&self) -> Result<ResetReceipt>;
}

/// Escape set for device keys embedded in a request path. Matches the
/// unreserved marks of `encodeURIComponent`; notably `+` becomes `%2B`.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'!')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

fn encode_segment(raw: &str) -> String {
    utf8_percent_encode(raw, PATH_SEGMENT).to_string()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendRequest<'a> {
    phone_number: &'a DeviceKey,
    body: &'a str,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: String,
}

impl GatewayClient {
    /// Creates a client for the given base path, e.g.
    /// `http://127.0.0.1:8080/api/simulator`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_http_client(reqwest::Client::new(), base_url)
    }

    /// Creates a client reusing an existing `reqwest::Client` (connection
    /// pool sharing).
    pub fn with_http_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Builds a `RequestFailed` from a non-success response, pulling the
    /// server's `message` field out of the body when it parses.
    async fn error_with_body(resp: reqwest::Response) -> SimError {
        let status = resp.status().as_u16();
        let message = resp
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message)
            .unwrap_or_else(|| format!("HTTP {status}"));
        SimError::RequestFailed { status, message }
    }
}

#[async_trait]
impl Transport for GatewayClient {
    async fn send(&self, device: &DeviceKey, body: &str) -> Result<SendReceipt> {
        let request = SendRequest {
            phone_number: device,
            body,
        };
        let resp = self
            .http
            .post(self.url("/send"))
            .json(&request)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Self::error_with_body(resp).await);
        }
        Ok(resp.json().await?)
    }

    async fn fetch_conversation(&self, device: &DeviceKey) -> Result<Conversation> {
        let path = format!("/conversations/{}", encode_segment(device.as_str()));
        let resp = self.http.get(self.url(&path)).send().await?;

        if !resp.status().is_success() {
            return Err(SimError::from_status(resp.status().as_u16()));
        }
        Ok(resp.json().await?)
    }

    async fn fetch_devices(&self) -> Result<Vec<Device>> {
        let resp = self.http.get(self.url("/devices")).send().await?;

        if !resp.status().is_success() {
            return Err(SimError::from_status(resp.status().as_u16()));
        }
        Ok(resp.json().await?)
    }

    async fn fetch_outbox(&self) -> Result<Vec<OutboxEntry>> {
        let resp = self.http.get(self.url("/outbox")).send().await?;

        if !resp.status().is_success() {
            return Err(SimError::from_status(resp.status().as_u16()));
        }
        Ok(resp.json().await?)
    }

    async fn reset(&self) -> Result<ResetReceipt> {
        let resp = self.http.delete(self.url("/reset")).send().await?;

        if !resp.status().is_success() {
            return Err(SimError::from_status(resp.status().as_u16()));
        }
        Ok(resp.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Direction;
    use httpmock::Method::{DELETE, GET, POST};
    use httpmock::MockServer;
    use serde_json::json;

    #[test]
    fn test_encode_segment_escapes_plus() {
        assert_eq!(encode_segment("+249912345678"), "%2B249912345678");
    }

    #[test]
    fn test_encode_segment_keeps_unreserved() {
        assert_eq!(encode_segment("abc-123_x.y~z"), "abc-123_x.y~z");
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = GatewayClient::new("http://localhost:8080/api/simulator/");
        assert_eq!(client.base_url(), "http://localhost:8080/api/simulator");
    }

    #[tokio::test]
    async fn test_send_round_trip() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/send")
                .json_body(json!({"phoneNumber": "+249912345678", "body": "HELP"}));
            then.status(200).json_body(json!({
                "userMessage": {
                    "direction": "INBOUND",
                    "body": "HELP",
                    "timestamp": "2024-01-01T00:00:00Z"
                },
                "systemResponse": {
                    "direction": "OUTBOUND",
                    "body": "Available commands: REG, EMERGENCY, HELP",
                    "timestamp": "2024-01-01T00:00:01Z"
                }
            }));
        });

        let client = GatewayClient::new(server.base_url());
        let receipt = client
            .send(&DeviceKey::from("+249912345678"), "HELP")
            .await
            .unwrap();

        mock.assert();
        assert_eq!(receipt.user_message.direction, Direction::Inbound);
        assert_eq!(receipt.system_response.direction, Direction::Outbound);
    }

    #[tokio::test]
    async fn test_send_surfaces_server_error_message() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/send");
            then.status(422).json_body(json!({"message": "unknown command"}));
        });

        let client = GatewayClient::new(server.base_url());
        let err = client
            .send(&DeviceKey::from("+249912345678"), "XYZZY")
            .await
            .unwrap_err();

        match err {
            SimError::RequestFailed { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(message, "unknown command");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_send_synthesizes_message_for_empty_body() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/send");
            then.status(500);
        });

        let client = GatewayClient::new(server.base_url());
        let err = client
            .send(&DeviceKey::from("+249912345678"), "HELP")
            .await
            .unwrap_err();

        match err {
            SimError::RequestFailed { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "HTTP 500");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_devices() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/devices");
            then.status(200).json_body(json!([
                {"phoneNumber": "+249912345678", "label": "Tester", "messageCount": 3}
            ]));
        });

        let client = GatewayClient::new(server.base_url());
        let devices = client.fetch_devices().await.unwrap();

        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].message_count, 3);
    }

    #[tokio::test]
    async fn test_fetch_conversation_encodes_device_key() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/conversations/%2B249912345678");
            then.status(200).json_body(json!({
                "phoneNumber": "+249912345678",
                "messages": []
            }));
        });

        let client = GatewayClient::new(server.base_url());
        let convo = client
            .fetch_conversation(&DeviceKey::from("+249912345678"))
            .await
            .unwrap();

        mock.assert();
        assert!(convo.messages.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_outbox_failure_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/outbox");
            then.status(503);
        });

        let client = GatewayClient::new(server.base_url());
        let err = client.fetch_outbox().await.unwrap_err();

        assert!(matches!(
            err,
            SimError::RequestFailed { status: 503, .. }
        ));
    }

    #[tokio::test]
    async fn test_reset() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(DELETE).path("/reset");
            then.status(200)
                .json_body(json!({"status": "ok", "message": "simulator cleared"}));
        });

        let client = GatewayClient::new(server.base_url());
        let receipt = client.reset().await.unwrap();

        mock.assert();
        assert_eq!(receipt.status, "ok");
    }
}
