//! HTTP adapter for the tool runtime (`POST {endpoint}/tools/execute`).

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::debug;

use super::error::ToolInvokeError;
use super::interface::{ToolGateway, ToolResponse};
use crate::config::ToolGatewayConfig;

#[derive(Clone)]
pub struct HttpToolGateway {
    url: String,
    timeout_secs: u64,
    http: Client,
}

impl HttpToolGateway {
    pub fn from_config(config: &ToolGatewayConfig) -> Result<Self, ToolInvokeError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| ToolInvokeError::transport(err.to_string()))?;
        Ok(Self {
            url: format!("{}/tools/execute", config.endpoint.trim_end_matches('/')),
            timeout_secs: config.timeout.as_secs(),
            http,
        })
    }

    fn classify(&self, err: reqwest::Error) -> ToolInvokeError {
        if err.is_timeout() {
            ToolInvokeError::Timeout {
                seconds: self.timeout_secs,
            }
        } else {
            ToolInvokeError::transport(err.to_string())
        }
    }
}

#[async_trait]
impl ToolGateway for HttpToolGateway {
    async fn invoke(&self, name: &str, args: Value) -> Result<ToolResponse, ToolInvokeError> {
        debug!(tool = name, url = %self.url, "Invoking tool");
        let response = self
            .http
            .post(&self.url)
            .json(&json!({ "name": name, "args": args }))
            .send()
            .await
            .map_err(|err| self.classify(err))?;

        let status = response.status();
        let body = response.text().await.map_err(|err| self.classify(err))?;
        if !status.is_success() {
            return Err(ToolInvokeError::Status {
                status: status.as_u16(),
                body: crate::text::truncate(&body, 200),
            });
        }
        serde_json::from_str(&body).map_err(|source| ToolInvokeError::InvalidJson { source })
    }
}
