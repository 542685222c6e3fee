//! Agent 错误类型
//!
//! 规划器与 ReAct 循环内部使用；对外入口（plan_tasks / execute_with_loop）不会把它抛给调用方，
//! 而是转为兜底任务或 ReActResult。

use thiserror::Error;

/// 编排过程中可能出现的错误（模型、解析、工具、路径逃逸）
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("LLM did not answer within {0}s")]
    LlmTimeout(u64),

    #[error("JSON parse error: {0}")]
    JsonParseError(String),

    /// 模型回复中提取不到任何任务
    #[error("No task could be extracted from the model analysis")]
    NoTasksExtracted,

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Missing parameter '{param}' for tool {tool}")]
    MissingParameter { tool: String, param: String },

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("Path escape attempt: {0}")]
    PathEscape(String),
}

pub type Result<T> = std::result::Result<T, AgentError>;
