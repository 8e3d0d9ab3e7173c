//! Plan generator backed by the Anthropic Messages API.

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::prompts;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::PlannerConfig;
use crate::domain::ports::{PlanGenerator, PlanningRequest, SynthesisRequest};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// Content block in a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: Vec<ContentBlock>,
}

/// System prompt content block.
#[derive(Debug, Clone, Serialize)]
pub struct SystemContentBlock {
    #[serde(rename = "type")]
    pub block_type: &'static str,
    pub text: String,
}

impl SystemContentBlock {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            block_type: "text",
            text: content.into(),
        }
    }
}

/// Request to the Messages API.
#[derive(Debug, Serialize)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<Vec<SystemContentBlock>>,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

#[derive(Debug, Deserialize)]
pub struct MessagesResponse {
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub usage: Usage,
}

/// Anthropic-backed planner.
pub struct AnthropicPlanGenerator {
    config: PlannerConfig,
    client: Client,
}

impl AnthropicPlanGenerator {
    pub fn new(config: PlannerConfig) -> DomainResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                DomainError::PlanGeneration(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self { config, client })
    }

    fn build_request(
        &self,
        system: Option<String>,
        prompt: String,
        temperature: f32,
    ) -> MessagesRequest {
        MessagesRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            system: system.map(|text| vec![SystemContentBlock::text(text)]),
            messages: vec![Message {
                role: MessageRole::User,
                content: vec![ContentBlock::Text { text: prompt }],
            }],
            temperature: Some(temperature),
        }
    }

    /// Send one request and join the text blocks of the reply.
    async fn send(&self, request: &MessagesRequest) -> DomainResult<String> {
        let api_key = self
            .config
            .resolve_api_key()
            .ok_or_else(|| DomainError::PlanGeneration("ANTHROPIC_API_KEY not set".to_string()))?;

        let response = self
            .client
            .post(format!(
                "{}/v1/messages",
                self.config.base_url.trim_end_matches('/')
            ))
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-api-key", &api_key)
            .header("anthropic-version", &self.config.api_version)
            .json(request)
            .send()
            .await
            .map_err(|e| DomainError::PlanGeneration(format!("API request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "Messages API returned an error");
            return Err(DomainError::PlanGeneration(format!(
                "API error {status}: {body}"
            )));
        }

        let result: MessagesResponse = response.json().await.map_err(|e| {
            DomainError::PlanGeneration(format!("Failed to parse response: {e}"))
        })?;

        debug!(
            input_tokens = result.usage.input_tokens,
            output_tokens = result.usage.output_tokens,
            stop_reason = ?result.stop_reason,
            "Messages API call completed"
        );

        let text = result
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        if text.trim().is_empty() {
            return Err(DomainError::PlanGeneration(
                "response contained no text".to_string(),
            ));
        }
        Ok(text)
    }
}

#[async_trait]
impl PlanGenerator for AnthropicPlanGenerator {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    #[instrument(skip(self, request), fields(model = %self.config.model))]
    async fn generate_plan(&self, request: &PlanningRequest) -> DomainResult<String> {
        info!(
            refining = request.current_plan.is_some(),
            tools = request.tool_catalog.len(),
            "Requesting plan"
        );
        let api_request = self.build_request(
            Some(prompts::system_prompt(&request.tool_catalog)),
            prompts::planning_prompt(request),
            self.config.plan_temperature,
        );
        let text = self.send(&api_request).await?;
        debug!(preview = %text.chars().take(500).collect::<String>(), "Raw plan response");
        Ok(text)
    }

    #[instrument(skip(self, request), fields(model = %self.config.model))]
    async fn synthesize(&self, request: &SynthesisRequest) -> DomainResult<String> {
        let api_request = self.build_request(
            None,
            prompts::synthesis_prompt(request),
            self.config.synthesis_temperature,
        );
        self.send(&api_request).await
    }
}
