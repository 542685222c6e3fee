//! 任务执行结果
//!
//! 每次执行恰好产生一个 TaskResult，创建后不可变。ReAct 循环也用它表示单次工具调用的结果。

use std::collections::HashMap;
use std::fmt::Display;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct TaskResult {
    success: bool,
    message: Option<String>,
    error_message: Option<String>,
    data: Option<HashMap<String, Value>>,
    timestamp: DateTime<Utc>,
    execution_time: Option<Duration>,
    task_id: Option<String>,
}

impl TaskResult {
    fn new(success: bool, message: Option<String>, error_message: Option<String>) -> Self {
        Self {
            success,
            message,
            error_message,
            data: None,
            timestamp: Utc::now(),
            execution_time: None,
            task_id: None,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(true, Some(message.into()), None)
    }

    pub fn success_with_data(message: impl Into<String>, data: HashMap<String, Value>) -> Self {
        Self {
            data: Some(data),
            ..Self::success(message)
        }
    }

    pub fn failure(error_message: impl Into<String>) -> Self {
        Self::new(false, None, Some(error_message.into()))
    }

    /// 失败并附带原因："{error_message}: {cause}"
    pub fn failure_with_cause(error_message: impl Into<String>, cause: &dyn Display) -> Self {
        Self::failure(format!("{}: {}", error_message.into(), cause))
    }

    /// 记录来源任务
    pub fn for_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn with_execution_time(mut self, elapsed: Duration) -> Self {
        self.execution_time = Some(elapsed);
        self
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn execution_time(&self) -> Option<Duration> {
        self.execution_time
    }

    pub fn task_id(&self) -> Option<&str> {
        self.task_id.as_deref()
    }

    pub fn has_data(&self) -> bool {
        self.data.as_ref().is_some_and(|d| !d.is_empty())
    }

    /// 类型化读取数据；缺失或类型不符时返回 None，调用方需自行处理
    pub fn data<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .as_ref()?
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// 展示用文本：成功取 message，失败取 error_message，均缺失时给通用文案
    pub fn display_message(&self) -> &str {
        if self.success {
            self.message.as_deref().unwrap_or("Task executed successfully")
        } else {
            self.error_message.as_deref().unwrap_or("Task failed")
        }
    }
}
