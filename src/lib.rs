//! Anvil - Rust 编码助手编排引擎
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）、可替换模型句柄
//! - **observability**: 日志初始化
//! - **react**: ReAct 上下文、思考解析、Think-Act-Observe-Fix 主循环与结果
//! - **task**: 任务模型、执行结果、任务规划器
//! - **tools**: 固定工具集、分发器与工作区实现
//! - **validation**: 动作后的编译校验

pub mod config;
pub mod core;
pub mod llm;
pub mod observability;
pub mod react;
pub mod task;
pub mod tools;
pub mod validation;

pub use react::{ReActLoopController, ReActResult, ReActStatus};
pub use task::{Task, TaskPlanner, TaskResult};
