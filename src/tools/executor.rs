//! 工具分发器
//!
//! 把模型给出的 `(tool, parameters)` 解析为 ToolKind，取出必填参数后调用 DevTools 对应方法。
//! 未知工具、缺参数、工具报错、超时、panic 全部转为失败的 TaskResult，从不向上抛出；
//! 每次调用输出结构化审计日志（JSON）。

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use serde_json::Value;

use crate::core::AgentError;
use crate::task::TaskResult;
use crate::tools::{DevTools, ExecutionEnv, ToolKind};

pub struct ToolDispatcher {
    tools: Arc<dyn DevTools>,
    /// None 表示不限时
    timeout: Option<Duration>,
}

impl ToolDispatcher {
    pub fn new(tools: Arc<dyn DevTools>) -> Self {
        Self {
            tools,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// 执行一次工具调用；结果附带耗时
    pub async fn dispatch(
        &self,
        env: &ExecutionEnv,
        tool_name: &str,
        parameters: &HashMap<String, Value>,
    ) -> TaskResult {
        let start = Instant::now();
        let (outcome, result) = match ToolKind::from_name(tool_name) {
            None => {
                tracing::warn!(tool = %tool_name, "Unknown tool requested");
                (
                    "unknown_tool",
                    TaskResult::failure(AgentError::UnknownTool(tool_name.to_string()).to_string()),
                )
            }
            Some(kind) => self.run(env, kind, parameters).await,
        };

        let elapsed = start.elapsed();
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "ok": result.is_success(),
            "outcome": outcome,
            "duration_ms": elapsed.as_millis() as u64,
            "args_preview": args_preview(parameters),
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        result.with_execution_time(elapsed)
    }

    async fn run(
        &self,
        env: &ExecutionEnv,
        kind: ToolKind,
        parameters: &HashMap<String, Value>,
    ) -> (&'static str, TaskResult) {
        let call = AssertUnwindSafe(self.invoke(env, kind, parameters)).catch_unwind();
        let finished = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(finished) => finished,
                Err(_) => {
                    return (
                        "timeout",
                        TaskResult::failure(AgentError::ToolTimeout(kind.name().to_string()).to_string()),
                    )
                }
            },
            None => call.await,
        };

        match finished {
            Ok(Ok(message)) => ("ok", TaskResult::success(message)),
            Ok(Err(AgentError::ToolExecutionFailed(message))) => ("error", TaskResult::failure(message)),
            Ok(Err(e)) => ("error", TaskResult::failure(e.to_string())),
            Err(panic) => {
                let detail = panic_message(panic.as_ref());
                tracing::error!(tool = %kind, panic = %detail, "Tool panicked");
                (
                    "panic",
                    TaskResult::failure(format!("Tool {} crashed: {}", kind.name(), detail)),
                )
            }
        }
    }

    async fn invoke(
        &self,
        env: &ExecutionEnv,
        kind: ToolKind,
        parameters: &HashMap<String, Value>,
    ) -> Result<String, AgentError> {
        for param in kind.required_params() {
            require(kind, parameters, param)?;
        }
        let get = |key: &str| param_text(parameters, key).unwrap_or_default();

        let outcome = match kind {
            ToolKind::CreateSourceFile => {
                self.tools
                    .create_source_file(env, &get("className"), &get("filePath"), &get("content"))
                    .await
            }
            ToolKind::CreateFile => {
                self.tools
                    .create_file(env, &get("filePath"), &get("content"))
                    .await
            }
            ToolKind::CompileAndCheck => self.tools.compile_and_check(env).await,
            ToolKind::GetDiagnostics => self.tools.get_diagnostics(env).await,
            ToolKind::VcsCommand => {
                self.tools
                    .vcs_command(env, &get("operation"), &get("parameters"))
                    .await
            }
            ToolKind::BuildProject => self.tools.build_project(env, &get("operation")).await,
            ToolKind::AnalyzeCode => {
                let scope = param_text(parameters, "scope")
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| "project".to_string());
                self.tools.analyze_code(env, &get("request"), &scope).await
            }
        };
        outcome.map_err(AgentError::ToolExecutionFailed)
    }
}

fn require(
    kind: ToolKind,
    parameters: &HashMap<String, Value>,
    param: &str,
) -> Result<String, AgentError> {
    param_text(parameters, param).ok_or_else(|| AgentError::MissingParameter {
        tool: kind.name().to_string(),
        param: param.to_string(),
    })
}

/// 字符串原样取出，其它标量转文本；缺失或 null 返回 None
fn param_text(parameters: &HashMap<String, Value>, key: &str) -> Option<String> {
    match parameters.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn args_preview(parameters: &HashMap<String, Value>) -> String {
    let s = serde_json::to_string(parameters).unwrap_or_default();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
