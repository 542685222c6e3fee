//! LLM 层：消息、客户端抽象与实现（OpenAI 兼容 / Mock）、可替换句柄

pub mod handle;
pub mod message;
pub mod mock;
pub mod openai;
pub mod traits;

pub use handle::ModelHandle;
pub use message::{Message, Role};
pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, TokenUsage};
pub use traits::{chat, LlmClient};
