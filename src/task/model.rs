//! 任务模型：Task、类型、优先级与生命周期
//!
//! Task 由规划器一次性构造完成（id / 描述 / 类型必填），执行方只通过 mark_* 推进状态；
//! 状态一旦进入终态（Completed / Failed / Cancelled）不再改变。
//! 取消标志基于 CancellationToken，可在任意线程触发。

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// 任务类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    /// 分析现有代码（只读）
    CodeAnalysis,
    /// 修改现有代码
    CodeModification,
    /// 创建 / 修改 / 删除文件
    FileOperation,
    /// 编译、测试、构建
    BuildOperation,
    /// 版本控制操作
    GitOperation,
    /// 通过外部工具协议完成的操作
    ExternalToolOperation,
    /// 复合任务
    Composite,
}

impl TaskType {
    pub const ALL: [TaskType; 7] = [
        TaskType::CodeAnalysis,
        TaskType::CodeModification,
        TaskType::FileOperation,
        TaskType::BuildOperation,
        TaskType::GitOperation,
        TaskType::ExternalToolOperation,
        TaskType::Composite,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::CodeAnalysis => "CODE_ANALYSIS",
            TaskType::CodeModification => "CODE_MODIFICATION",
            TaskType::FileOperation => "FILE_OPERATION",
            TaskType::BuildOperation => "BUILD_OPERATION",
            TaskType::GitOperation => "GIT_OPERATION",
            TaskType::ExternalToolOperation => "EXTERNAL_TOOL_OPERATION",
            TaskType::Composite => "COMPOSITE",
        }
    }

    /// 供规划 prompt 使用的一行说明
    pub fn summary(&self) -> &'static str {
        match self {
            TaskType::CodeAnalysis => "Analyze existing code (read-only)",
            TaskType::CodeModification => "Modify existing code",
            TaskType::FileOperation => "Create, modify or delete files (preferred for new files)",
            TaskType::BuildOperation => "Compile, test or build the project",
            TaskType::GitOperation => "Version control operations (commit, diff, log...)",
            TaskType::ExternalToolOperation => "Operations delegated to external tools",
            TaskType::Composite => "Complex tasks spanning several kinds",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = String;

    /// 大小写不敏感；`-` 与空格视同 `_`；接受 MCP_OPERATION 作为 EXTERNAL_TOOL_OPERATION 的别名
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize_enum_token(s);
        if normalized == "MCP_OPERATION" {
            return Ok(TaskType::ExternalToolOperation);
        }
        TaskType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| format!("unknown task type: {s}"))
    }
}

/// 任务优先级：LOW < NORMAL < HIGH < CRITICAL
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPriority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl TaskPriority {
    pub const ALL: [TaskPriority; 4] = [
        TaskPriority::Low,
        TaskPriority::Normal,
        TaskPriority::High,
        TaskPriority::Critical,
    ];

    /// 序数权重（1..=4）
    pub fn weight(&self) -> u8 {
        match self {
            TaskPriority::Low => 1,
            TaskPriority::Normal => 2,
            TaskPriority::High => 3,
            TaskPriority::Critical => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "LOW",
            TaskPriority::Normal => "NORMAL",
            TaskPriority::High => "HIGH",
            TaskPriority::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize_enum_token(s);
        TaskPriority::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| format!("unknown priority: {s}"))
    }
}

fn normalize_enum_token(s: &str) -> String {
    s.trim()
        .chars()
        .map(|c| match c {
            '-' | ' ' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

/// 任务状态：PENDING → RUNNING → {COMPLETED | FAILED | CANCELLED}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

/// 一个可执行的工作单元
///
/// Clone 出的副本共享同一个取消令牌。
#[derive(Debug, Clone)]
pub struct Task {
    id: String,
    description: String,
    task_type: TaskType,
    priority: TaskPriority,
    parameters: HashMap<String, Value>,
    created_at: DateTime<Utc>,

    status: TaskStatus,
    error_message: Option<String>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    cancel_token: CancellationToken,
}

impl Task {
    pub fn new(description: impl Into<String>, task_type: TaskType) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            description: description.into(),
            task_type,
            priority: TaskPriority::Normal,
            parameters: HashMap::new(),
            created_at: Utc::now(),
            status: TaskStatus::Pending,
            error_message: None,
            started_at: None,
            completed_at: None,
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_parameters(mut self, parameters: HashMap<String, Value>) -> Self {
        self.parameters.extend(parameters);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn task_type(&self) -> TaskType {
        self.task_type
    }

    pub fn priority(&self) -> TaskPriority {
        self.priority
    }

    pub fn parameters(&self) -> &HashMap<String, Value> {
        &self.parameters
    }

    /// 类型化读取参数；缺失或类型不符时返回 None
    pub fn parameter<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.parameters
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// 当前状态；未终结的任务被外部取消后视为 Cancelled
    pub fn status(&self) -> TaskStatus {
        if !self.status.is_terminal() && self.cancel_token.is_cancelled() {
            TaskStatus::Cancelled
        } else {
            self.status
        }
    }

    pub fn mark_started(&mut self) {
        if self.transition(TaskStatus::Running) {
            self.started_at = Some(Utc::now());
        }
    }

    pub fn mark_completed(&mut self) {
        if self.transition(TaskStatus::Completed) {
            self.completed_at = Some(Utc::now());
        }
    }

    pub fn mark_failed(&mut self, error_message: impl Into<String>) {
        if self.transition(TaskStatus::Failed) {
            self.error_message = Some(error_message.into());
            self.completed_at = Some(Utc::now());
        }
    }

    /// 请求协作式取消；可在任意线程调用
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// 共享取消令牌，供其它线程 / 任务触发或监听取消
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    fn transition(&mut self, next: TaskStatus) -> bool {
        let current = self.status();
        if current.is_terminal() {
            tracing::debug!(task = %self.id, ?current, ?next, "Ignoring transition out of terminal status");
            self.status = current;
            return false;
        }
        self.status = next;
        true
    }
}
