use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

/// Identifier the gateway assigned to an accepted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayReceipt {
    pub message_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway did not answer in time")]
    Timeout,
    #[error("gateway unreachable: {0}")]
    Transport(String),
    #[error("gateway rejected the message with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("gateway response unusable: {0}")]
    InvalidResponse(String),
}

/// Messaging-channel provider that delivers rendered text.
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    async fn send_text(
        &self,
        instance: &str,
        destination: &str,
        text: &str,
    ) -> Result<GatewayReceipt, GatewayError>;
}

const MAX_ERROR_BODY: usize = 200;

/// Gateway client speaking the Evolution API `sendText` call.
#[derive(Debug, Clone)]
pub struct HttpMessagingGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl HttpMessagingGateway {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout,
        }
    }

    fn send_url(&self, instance: &str) -> String {
        format!("{}/message/sendText/{}", self.base_url, instance)
    }
}

#[async_trait]
impl MessagingGateway for HttpMessagingGateway {
    async fn send_text(
        &self,
        instance: &str,
        destination: &str,
        text: &str,
    ) -> Result<GatewayReceipt, GatewayError> {
        let response = self
            .client
            .post(self.send_url(instance))
            .timeout(self.timeout)
            .header("apikey", &self.api_key)
            .json(&json!({ "number": destination, "text": text }))
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    GatewayError::Timeout
                } else {
                    GatewayError::Transport(err.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            body.truncate(
                body.char_indices()
                    .nth(MAX_ERROR_BODY)
                    .map_or(body.len(), |(idx, _)| idx),
            );
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = response.json().await.map_err(|err| {
            if err.is_timeout() {
                GatewayError::Timeout
            } else {
                GatewayError::InvalidResponse(err.to_string())
            }
        })?;

        message_id_from(&payload)
            .map(|message_id| GatewayReceipt { message_id })
            .ok_or_else(|| GatewayError::InvalidResponse("missing message id".to_string()))
    }
}

/// Accepts `{"key": {"id": ..}}` as well as flat `id` / `messageId` fields.
fn message_id_from(payload: &Value) -> Option<String> {
    [
        payload.pointer("/key/id"),
        payload.get("messageId"),
        payload.get("id"),
    ]
    .into_iter()
    .flatten()
    .find_map(|value| match value {
        Value::String(id) if !id.trim().is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    })
}
