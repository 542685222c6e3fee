//! 编译校验：对改动代码的工具在成功后跑一次编译检查
//!
//! 检查失败时再取诊断信息，保留含 `error:` 或 `ERROR` 的行；一行都没有时把失败文本整体作为唯一错误。

use std::sync::Arc;

use async_trait::async_trait;

use crate::task::TaskResult;
use crate::tools::{DevTools, ExecutionEnv, ToolKind};
use crate::validation::{ValidationResult, Validator};

pub struct CompileValidator {
    tools: Arc<dyn DevTools>,
}

impl CompileValidator {
    pub fn new(tools: Arc<dyn DevTools>) -> Self {
        Self { tools }
    }
}

#[async_trait]
impl Validator for CompileValidator {
    fn requires_compilation_check(&self, tool: ToolKind, previous: &TaskResult) -> bool {
        previous.is_success() && tool.modifies_code()
    }

    async fn auto_validate(
        &self,
        env: &ExecutionEnv,
        tool: ToolKind,
        _previous: &TaskResult,
    ) -> ValidationResult {
        tracing::info!(tool = %tool, "Auto-validating compilation");
        let failure = match self.tools.compile_and_check(env).await {
            Ok(_) => {
                tracing::info!(tool = %tool, "Auto-validation passed");
                return ValidationResult::passed("Code compiles successfully");
            }
            Err(failure) => failure,
        };
        tracing::warn!(tool = %tool, "Auto-validation failed");

        let diagnostics = self.tools.get_diagnostics(env).await;
        let text = match &diagnostics {
            Ok(text) | Err(text) => text.as_str(),
        };
        let mut errors = extract_errors(text);
        if errors.is_empty() {
            errors = extract_errors(&failure);
        }
        if errors.is_empty() {
            errors.push(failure.trim().to_string());
        }

        ValidationResult::failed(format!("Compilation failed after {}", tool), errors)
            .with_diagnostics(text)
    }
}

/// 编译输出中的错误行
pub fn extract_errors(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| line.contains("error:") || line.contains("ERROR"))
        .map(|line| line.trim().to_string())
        .collect()
}
