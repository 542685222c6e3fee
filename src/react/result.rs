//! ReAct 运行结果
//!
//! 只能通过四个具名构造函数在循环退出时创建一次，之后不可变。

use std::fmt;

use serde::Serialize;

use crate::react::ReActContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReActStatus {
    Completed,
    Error,
    MaxIterations,
    Cancelled,
}

impl fmt::Display for ReActStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReActStatus::Completed => "COMPLETED",
            ReActStatus::Error => "ERROR",
            ReActStatus::MaxIterations => "MAX_ITERATIONS",
            ReActStatus::Cancelled => "CANCELLED",
        })
    }
}

#[derive(Debug, Clone)]
pub struct ReActResult {
    context: ReActContext,
    success: bool,
    final_message: Option<String>,
    status: ReActStatus,
    error_message: Option<String>,
}

impl ReActResult {
    pub fn success(context: ReActContext, final_message: impl Into<String>) -> Self {
        Self {
            context,
            success: true,
            final_message: Some(final_message.into()),
            status: ReActStatus::Completed,
            error_message: None,
        }
    }

    pub fn error(context: ReActContext, error_message: impl Into<String>) -> Self {
        Self {
            context,
            success: false,
            final_message: None,
            status: ReActStatus::Error,
            error_message: Some(error_message.into()),
        }
    }

    pub fn max_iterations_reached(context: ReActContext) -> Self {
        let message = format!(
            "⚠️ Max iterations ({}) reached. Task partially completed.",
            context.iteration_count()
        );
        Self {
            context,
            success: false,
            final_message: Some(message.clone()),
            status: ReActStatus::MaxIterations,
            error_message: Some(message),
        }
    }

    pub fn cancelled(context: ReActContext, reason: impl Into<String>) -> Self {
        Self {
            context,
            success: false,
            final_message: None,
            status: ReActStatus::Cancelled,
            error_message: Some(reason.into()),
        }
    }

    pub fn context(&self) -> &ReActContext {
        &self.context
    }

    pub fn into_context(self) -> ReActContext {
        self.context
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn final_message(&self) -> Option<&str> {
        self.final_message.as_deref()
    }

    pub fn status(&self) -> ReActStatus {
        self.status
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// 面向最终用户的简短文本
    pub fn user_message(&self) -> String {
        if self.success {
            return self.final_message.clone().unwrap_or_default();
        }
        let detail = self.error_message.as_deref().unwrap_or("");
        match self.status {
            ReActStatus::Error => format!("❌ An error occurred: {}", detail),
            ReActStatus::MaxIterations => {
                "⚠️ Iteration limit reached. The task is partially completed.".to_string()
            }
            ReActStatus::Cancelled => format!("🛑 Operation cancelled: {}", detail),
            ReActStatus::Completed => "❌ Execution failed".to_string(),
        }
    }

    /// 诊断摘要
    pub fn summary(&self) -> String {
        let mut summary = String::from("=== ReAct Result ===\n");
        summary.push_str(&format!("Status: {}\n", self.status));
        summary.push_str(&format!("Success: {}\n", self.success));
        summary.push_str(&format!("Iterations: {}\n", self.context.iteration_count()));
        summary.push_str(&format!("Actions executed: {}\n", self.context.action_steps().len()));
        if self.success {
            summary.push_str(&format!(
                "Final message: {}\n",
                self.final_message.as_deref().unwrap_or("")
            ));
        } else {
            summary.push_str(&format!(
                "Error: {}\n",
                self.error_message.as_deref().unwrap_or("")
            ));
        }
        if self.context.has_errors() {
            summary.push_str("\nRemaining errors:\n");
            for error in self.context.all_errors() {
                summary.push_str(&format!("  - {}\n", error));
            }
        }
        summary
    }
}
