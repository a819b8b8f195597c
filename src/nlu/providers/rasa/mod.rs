//! Rasa client, the secondary NLU engine.
//!
//! One POST of `{text, sender}` to the configured endpoint; the response
//! must be JSON with a `text` field. A non-success status or a missing
//! `text` is an [`EngineError`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::nlu::engine::{EngineError, ReplyEngine};

const SERVICE: &str = "rasa";
const DEFAULT_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone)]
pub struct RasaEngine {
    client: reqwest::Client,
    url: String,
}

impl RasaEngine {
    pub fn new(url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ReplyEngine for RasaEngine {
    async fn reply(&self, message: &str, sender: &str) -> Result<String, EngineError> {
        let response = self
            .client
            .post(&self.url)
            .json(&ParseRequest {
                text: message,
                sender,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Status {
                service: SERVICE,
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ParseResponse = response.json().await?;
        parsed.text.ok_or_else(|| EngineError::Protocol {
            service: SERVICE,
            detail: "missing text field".to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
struct ParseRequest<'a> {
    text: &'a str,
    sender: &'a str,
}

#[derive(Debug, Deserialize)]
struct ParseResponse {
    text: Option<String>,
}
