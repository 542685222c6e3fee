//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 按脚本顺序返回预置回复；可设置为永远重复同一回复、永远失败或人为延迟，并记录收到的 prompt。

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{stream, Stream};

use crate::llm::{LlmClient, Message, Role};

/// Mock 客户端：脚本化回复
#[derive(Debug, Default)]
pub struct MockLlmClient {
    script: Mutex<VecDeque<Result<String, String>>>,
    /// 脚本耗尽后的回复；None 时返回错误
    repeat: Option<Result<String, String>>,
    delay: Option<Duration>,
    prompts: Mutex<Vec<String>>,
}

impl MockLlmClient {
    /// 依次返回给定回复，耗尽后报错
    pub fn scripted<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Mutex::new(responses.into_iter().map(|r| Ok(r.into())).collect()),
            ..Self::default()
        }
    }

    /// 永远返回同一回复
    pub fn repeating(response: impl Into<String>) -> Self {
        Self {
            repeat: Some(Ok(response.into())),
            ..Self::default()
        }
    }

    /// 永远返回错误
    pub fn failing(error: impl Into<String>) -> Self {
        Self {
            repeat: Some(Err(error.into())),
            ..Self::default()
        }
    }

    /// 在脚本末尾追加一次失败
    pub fn then_fail(self, error: impl Into<String>) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Err(error.into()));
        }
        self
    }

    /// 每次调用前等待
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// 已收到的 prompt（最后一条 user 消息），按调用顺序
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, Role::User))
            .map(|m| m.content.clone())
            .unwrap_or_default();
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(last_user);
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match next {
            Some(r) => r,
            None => self
                .repeat
                .clone()
                .unwrap_or_else(|| Err("mock script exhausted".to_string())),
        }
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
    ) -> Result<Pin<Box<dyn Stream<Item = Result<String, String>> + Send>>, String> {
        let content = self.complete(messages).await?;
        Ok(Box::pin(stream::iter(vec![Ok(content)])))
    }
}
