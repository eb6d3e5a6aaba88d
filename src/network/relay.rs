//! Private bundle relay client

use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::info;
use crate::errors::{BotError, BotResult};
use crate::execution::SignedTransaction;
use super::{ApiLimiter, classify_rpc_error, with_timeout};

/// Submits transactions as a bundle to a private block engine. A bundle sent
/// here is never also broadcast to the public mempool.
#[async_trait]
pub trait BundleRelay: Send + Sync {
    async fn send_bundle(&self, transactions: &[SignedTransaction]) -> BotResult<String>;
}

pub struct HttpBundleRelay {
    client: reqwest::Client,
    url: String,
    limiter: ApiLimiter,
    timeout: Duration,
}

impl HttpBundleRelay {
    pub fn new(base_url: &str, limiter: ApiLimiter, timeout: Duration) -> BotResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BotError::network("Failed to build HTTP client", e))?;
        Ok(Self {
            client,
            url: format!("{}/api/v1/bundles", base_url.trim_end_matches('/')),
            limiter,
            timeout,
        })
    }
}

#[async_trait]
impl BundleRelay for HttpBundleRelay {
    async fn send_bundle(&self, transactions: &[SignedTransaction]) -> BotResult<String> {
        self.limiter.until_ready().await;

        let payloads: Vec<&str> = transactions.iter().map(|tx| tx.payload.as_str()).collect();
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "sendBundle",
            "params": [payloads, { "encoding": "base64" }],
        });

        let response: Value = with_timeout(self.timeout, "sendBundle", async {
            let response = self
                .client
                .post(&self.url)
                .json(&body)
                .send()
                .await
                .map_err(|e| BotError::network("sendBundle request failed", e))?;

            match response.status().as_u16() {
                429 => return Err(BotError::RateLimited { service: "relay".to_string() }),
                status if status >= 500 => {
                    return Err(BotError::RpcUnavailable {
                        message: format!("relay returned {}", status),
                    });
                }
                _ => {}
            }

            response.json::<Value>().await.map_err(|e| BotError::DataParsing {
                context: "sendBundle response".to_string(),
                source: e.into(),
            })
        })
        .await?;

        if let Some(error) = response.get("error") {
            let code = error["code"].as_i64().unwrap_or_default();
            let message = error["message"].as_str().unwrap_or("unknown relay error").to_string();
            return Err(classify_rpc_error("sendBundle", code, message));
        }

        let bundle_id = response["result"].as_str().map(str::to_string).ok_or_else(|| BotError::DataParsing {
            context: "sendBundle result".to_string(),
            source: anyhow::anyhow!("missing bundle id"),
        })?;

        info!(bundle_id = %bundle_id, transactions = transactions.len(), "📦 Bundle accepted by relay");
        Ok(bundle_id)
    }
}
