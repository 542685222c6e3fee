//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Mock）实现 LlmClient：complete（非流式）、complete_stream（流式 Token）。
//! 超时由调用方施加，错误一律视为「单次调用失败」，可恢复。

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};

use crate::core::AgentError;
use crate::llm::Message;

/// LLM 客户端 trait：非流式完成与流式完成（返回 Token 流）
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成
    async fn complete(&self, messages: &[Message]) -> Result<String, String>;

    /// 流式完成，返回 Token 流
    async fn complete_stream(
        &self,
        messages: &[Message],
    ) -> Result<Pin<Box<dyn Stream<Item = Result<String, String>> + Send>>, String>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}

/// 发送单条 prompt，拼接流式 token 为完整回复；整个过程受 `limit` 约束
pub async fn chat(llm: &dyn LlmClient, prompt: &str, limit: Duration) -> Result<String, AgentError> {
    let messages = [Message::user(prompt)];
    let collect = async {
        let mut stream = llm
            .complete_stream(&messages)
            .await
            .map_err(AgentError::LlmError)?;
        let mut full = String::new();
        while let Some(token) = stream.next().await {
            full.push_str(&token.map_err(AgentError::LlmError)?);
        }
        Ok::<String, AgentError>(full)
    };
    tokio::time::timeout(limit, collect)
        .await
        .map_err(|_| AgentError::LlmTimeout(limit.as_secs()))?
}
