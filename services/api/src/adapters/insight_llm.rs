//! services/api/src/adapters/insight_llm.rs
//!
//! This module contains the adapter for the admin status-insight LLM.
//! It implements the `InsightService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client, error::OpenAIError,
};
use async_trait::async_trait;
use lending_core::ports::{InsightService, PortError, PortResult};

const SYSTEM_INSTRUCTIONS: &str = "あなたは社内の端末貸出を管理する担当者のアシスタントです。\
貸出状況の数値を受け取り、管理者への短い一言アドバイスを日本語で1〜2文で返してください。";

/// The sentence shown when no insight could be generated.
pub const FALLBACK_INSIGHT: &str = "状況を把握しました。";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `InsightService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiInsightAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiInsightAdapter {
    /// Creates a new `OpenAiInsightAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

//=========================================================================================
// `InsightService` Trait Implementation
//=========================================================================================

#[async_trait]
impl InsightService for OpenAiInsightAdapter {
    async fn generate_status_insight(&self, borrowed: usize, total: usize) -> PortResult<String> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_INSTRUCTIONS)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(format!(
                    "現在の貸出状況（貸出中 {}台 / 全体 {}台）に基づき、管理者への一言アドバイスを生成してください。",
                    borrowed, total
                ))
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .max_tokens(120u32)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| PortError::Unexpected("Insight LLM returned no text content.".to_string()))
    }
}

//=========================================================================================
// Offline Fallback
//=========================================================================================

/// Used when no API key is configured: states the numbers without generation.
#[derive(Clone, Default)]
pub struct StaticInsightAdapter;

#[async_trait]
impl InsightService for StaticInsightAdapter {
    async fn generate_status_insight(&self, borrowed: usize, total: usize) -> PortResult<String> {
        if total == 0 {
            return Ok("登録されている端末はありません。".to_string());
        }
        Ok(format!("貸出中 {}台 / 全体 {}台です。", borrowed, total))
    }
}
