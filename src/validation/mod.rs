//! 动作后校验
//!
//! ReAct 循环在动作成功后询问 Validator 是否需要编译检查；需要时执行 auto_validate，
//! 失败的校验以错误列表的形式回灌到下一轮思考。

pub mod compile;

use async_trait::async_trait;

use crate::task::TaskResult;
use crate::tools::{ExecutionEnv, ToolKind};

pub use compile::CompileValidator;

/// 校验结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationResult {
    pub success: bool,
    pub message: String,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// 原始诊断输出
    pub diagnostics: Option<String>,
}

impl ValidationResult {
    pub fn passed(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn failed(message: impl Into<String>, errors: Vec<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            errors,
            ..Self::default()
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: impl Into<String>) -> Self {
        self.diagnostics = Some(diagnostics.into());
        self
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// 面向模型的反馈文本
    pub fn feedback(&self, action_message: &str) -> String {
        if self.success {
            return format!("{}\nCode validated - compilation successful", action_message);
        }
        let mut feedback = format!("{}\n\nCompilation validation failed:\n", action_message);
        if self.has_errors() {
            feedback.push_str("Errors to fix:\n");
            for error in &self.errors {
                feedback.push_str(&format!("  - {}\n", error));
            }
        }
        if self.has_warnings() {
            feedback.push_str("Warnings:\n");
            for warning in &self.warnings {
                feedback.push_str(&format!("  - {}\n", warning));
            }
        }
        feedback.push_str("Please fix these issues before continuing.");
        feedback
    }
}

#[async_trait]
pub trait Validator: Send + Sync {
    /// 该工具的这次结果是否需要编译检查
    fn requires_compilation_check(&self, tool: ToolKind, previous: &TaskResult) -> bool;

    async fn auto_validate(
        &self,
        env: &ExecutionEnv,
        tool: ToolKind,
        previous: &TaskResult,
    ) -> ValidationResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feedback_lists_errors_and_warnings() {
        let result = ValidationResult::failed("Compilation failed", vec!["E1".into(), "E2".into()])
            .with_warnings(vec!["W1".into()]);
        let text = result.feedback("Created A.java");
        assert!(text.starts_with("Created A.java"));
        assert!(text.contains("  - E1\n  - E2"));
        assert!(text.contains("  - W1"));
        assert!(result.has_errors() && result.has_warnings());
    }

    #[test]
    fn test_passed_feedback() {
        let text = ValidationResult::passed("ok").feedback("Created A.java");
        assert_eq!(text, "Created A.java\nCode validated - compilation successful");
    }
}
