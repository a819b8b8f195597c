//! Dialogflow ES detectIntent client, the primary NLU engine.
//!
//! Sends each message to
//! `POST {base}/v2/projects/{project}/agent/sessions/{session}:detectIntent`
//! with the caller's subject as the session id, so conversational context
//! lives engine-side and is never shared across callers.
//!
//! A non-success status or a response without `queryResult` is an
//! [`EngineError`], not a fallback: engine outage and low-confidence
//! classification are different things and are handled by different
//! layers. The call is made exactly once; there are no retries.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::DialogflowConfig;
use crate::nlu::engine::{EngineError, IntentEngine, IntentResult};

const SERVICE: &str = "dialogflow";
const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Client for the Dialogflow REST API.
#[derive(Debug, Clone)]
pub struct DialogflowEngine {
    client: reqwest::Client,
    project_id: String,
    api_token: String,
    base_url: String,
    language: String,
}

impl DialogflowEngine {
    pub fn new(config: &DialogflowConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            project_id: config.project_id.clone(),
            api_token: config.api_token.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            language: config.language.clone(),
        })
    }

    fn session_endpoint(&self, session: &str) -> String {
        format!(
            "{}/v2/projects/{}/agent/sessions/{}:detectIntent",
            self.base_url, self.project_id, session
        )
    }
}

#[async_trait]
impl IntentEngine for DialogflowEngine {
    async fn detect_intent(
        &self,
        session: &str,
        message: &str,
    ) -> Result<IntentResult, EngineError> {
        let body = DetectIntentRequest {
            query_input: QueryInput {
                text: TextInput {
                    text: message,
                    language_code: &self.language,
                },
            },
        };

        let response = self
            .client
            .post(self.session_endpoint(session))
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(EngineError::Status {
                service: SERVICE,
                status: status.as_u16(),
                body: truncate(&text, 500),
            });
        }

        let parsed: DetectIntentResponse =
            serde_json::from_str(&text).map_err(|e| EngineError::Protocol {
                service: SERVICE,
                detail: format!("{} - body: {}", e, truncate(&text, 500)),
            })?;

        let result = parsed.query_result.ok_or_else(|| EngineError::Protocol {
            service: SERVICE,
            detail: "missing queryResult".to_string(),
        })?;

        Ok(IntentResult {
            text: result.fulfillment_text,
            intent: result.intent.display_name,
            confidence: result.intent_detection_confidence,
            is_fallback: result.intent.is_fallback,
        })
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        s[..end].to_string()
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DetectIntentRequest<'a> {
    query_input: QueryInput<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryInput<'a> {
    text: TextInput<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TextInput<'a> {
    text: &'a str,
    language_code: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetectIntentResponse {
    query_result: Option<QueryResult>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct QueryResult {
    fulfillment_text: String,
    intent: Intent,
    intent_detection_confidence: f32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Intent {
    display_name: String,
    is_fallback: bool,
}
