//! Generic JSON-over-HTTP provider.

use super::{ProviderCall, ProviderError, ProviderOutput};
use crate::registry::{Endpoint, ModelMetadata};
use crate::types::{ModelRequest, RequestType, Usage};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Posts requests to `endpoint.url` and expects `{content, usage}` back.
///
/// Request body:
///
/// ```json
/// {"request_id": "...", "model": "gpt-4", "prompt": "...", "request_type": "chat", "metadata": {}}
/// ```
#[derive(Debug, Clone)]
pub struct HttpProvider {
    client: Client,
    timeout: Duration,
}

#[derive(Serialize)]
struct CallBody<'a> {
    request_id: &'a str,
    model: &'a str,
    prompt: &'a str,
    request_type: RequestType,
    metadata: &'a HashMap<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct CallReply {
    content: String,
    #[serde(default)]
    usage: WireUsage,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: Option<u32>,
    cost: Option<f64>,
}

impl HttpProvider {
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Configuration(e.to_string()))?;
        Ok(Self { client, timeout })
    }

    /// Use a preconfigured client (for testing).
    pub fn with_client(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    fn classify(&self, e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout(self.timeout.as_millis() as u64)
        } else {
            ProviderError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl ProviderCall for HttpProvider {
    async fn call(
        &self,
        endpoint: &Endpoint,
        model: &ModelMetadata,
        request: &ModelRequest,
    ) -> Result<ProviderOutput, ProviderError> {
        let body = CallBody {
            request_id: &request.id,
            model: &model.id,
            prompt: &request.prompt,
            request_type: request.request_type,
            metadata: &request.metadata,
        };

        let response = self
            .client
            .post(&endpoint.url)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ProviderError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let reply: CallReply = response.json().await.map_err(|e| {
            if e.is_timeout() {
                self.classify(e)
            } else {
                ProviderError::InvalidResponse(format!("Failed to parse provider reply: {}", e))
            }
        })?;

        let usage = reply.usage;
        let total_tokens = usage
            .total_tokens
            .unwrap_or(usage.prompt_tokens + usage.completion_tokens);
        let cost = usage
            .cost
            .unwrap_or_else(|| model.cost_for(usage.prompt_tokens, usage.completion_tokens));

        Ok(ProviderOutput {
            content: reply.content,
            usage: Usage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens,
                cost,
            },
        })
    }
}
