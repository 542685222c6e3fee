//! 可替换的模型句柄
//!
//! 规划器与 ReAct 循环在构造时注入 `ModelHandle`；设置变更后由调用方显式 `reload` / `replace`，
//! 正在进行的调用继续使用旧客户端，之后的调用使用新客户端。

use std::pin::Pin;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use futures_util::Stream;

use crate::config::LlmSection;
use crate::llm::{LlmClient, Message, OpenAiClient};

#[derive(Clone)]
pub struct ModelHandle {
    inner: Arc<RwLock<Arc<dyn LlmClient>>>,
}

impl ModelHandle {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(client)),
        }
    }

    /// 按 [llm] 段创建 OpenAI 兼容客户端
    pub fn from_section(section: &LlmSection) -> Self {
        Self::new(Arc::new(OpenAiClient::from_section(section)))
    }

    /// 当前客户端快照
    pub fn current(&self) -> Arc<dyn LlmClient> {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// 替换底层客户端，所有持有该句柄的组件随之切换
    pub fn replace(&self, client: Arc<dyn LlmClient>) {
        match self.inner.write() {
            Ok(mut guard) => *guard = client,
            Err(poisoned) => *poisoned.into_inner() = client,
        }
    }

    /// 设置变更后重建客户端
    pub fn reload(&self, section: &LlmSection) {
        tracing::info!(model = %section.model, "Reloading model client");
        self.replace(Arc::new(OpenAiClient::from_section(section)));
    }
}

#[async_trait]
impl LlmClient for ModelHandle {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        self.current().complete(messages).await
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
    ) -> Result<Pin<Box<dyn Stream<Item = Result<String, String>> + Send>>, String> {
        self.current().complete_stream(messages).await
    }

    fn token_usage(&self) -> (u64, u64, u64) {
        self.current().token_usage()
    }
}
