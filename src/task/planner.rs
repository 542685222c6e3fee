//! TaskPlanner：把自然语言请求拆成有序任务列表
//!
//! 三级策略：
//! 1. 模型分析：发送带任务分类与 JSON 约定的 prompt，先严格解码，失败再按括号配平 + 正则容错提取；
//! 2. 关键词兜底：模型调用失败、超时或提取不到任务时使用；
//! 3. 通用任务：以上都没有结果时包装原始请求。
//!
//! plan_tasks 永不失败，且至少返回一个任务。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::config::PlannerSection;
use crate::core::{AgentError, Result};
use crate::llm::{chat, LlmClient};
use crate::task::extract::{
    extract_array_body, extract_flat_parameters, extract_json_object, extract_object_body,
    extract_string_field, split_top_level_objects,
};
use crate::task::fallback::{generic_task, plan_by_keywords};
use crate::task::{Task, TaskPriority, TaskType};

const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// 模型给出的单个任务描述（字段均可能缺失或取值非法）
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskSpec {
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub task_type: Option<String>,
    pub priority: Option<String>,
    #[serde(default)]
    pub parameters: Option<HashMap<String, Value>>,
}

impl TaskSpec {
    /// 转为 Task；缺描述时丢弃，类型 / 优先级非法时回退为 COMPOSITE / NORMAL
    fn into_task(self, request: &str) -> Option<Task> {
        let description = match self.description.as_deref().map(str::trim) {
            Some(d) if !d.is_empty() => d.to_string(),
            _ => {
                tracing::warn!(?self, "Task spec without description, skipping");
                return None;
            }
        };

        let task_type = match self.task_type.as_deref().map(str::parse::<TaskType>) {
            Some(Ok(t)) => t,
            other => {
                tracing::warn!(value = ?self.task_type, parsed = ?other, "Invalid task type, using COMPOSITE");
                TaskType::Composite
            }
        };

        let priority = match self.priority.as_deref().map(str::parse::<TaskPriority>) {
            Some(Ok(p)) => p,
            None => TaskPriority::Normal,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Invalid priority, using NORMAL");
                TaskPriority::Normal
            }
        };

        Some(
            Task::new(description, task_type)
                .with_priority(priority)
                .with_parameters(self.parameters.unwrap_or_default())
                .with_parameter("request", request)
                .with_parameter("original_request", request)
                .with_parameter("llm_analyzed", true),
        )
    }
}

/// 规划回复：`{ "tasks": [...], "reasoning": "..." }`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlanAnalysis {
    #[serde(default)]
    pub tasks: Vec<TaskSpec>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

pub struct TaskPlanner {
    llm: Arc<dyn LlmClient>,
    timeout: Duration,
    use_model: bool,
}

impl TaskPlanner {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            use_model: true,
        }
    }

    pub fn from_config(llm: Arc<dyn LlmClient>, config: &PlannerSection) -> Self {
        Self {
            llm,
            timeout: Duration::from_secs(config.timeout_secs),
            use_model: config.use_model,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 规划任务：至少一个，永不失败
    pub async fn plan_tasks(&self, user_request: &str) -> Vec<Task> {
        tracing::debug!(request = %user_request, "Planning tasks");

        if !self.use_model {
            return plan_by_keywords(user_request);
        }

        let mut tasks = match self.plan_with_model(user_request).await {
            Ok(tasks) => tasks,
            Err(e) => {
                tracing::warn!(error = %e, "Model-assisted planning failed, falling back to keyword analysis");
                plan_by_keywords(user_request)
            }
        };

        if tasks.is_empty() {
            tasks.push(generic_task(user_request));
        }
        tasks
    }

    async fn plan_with_model(&self, user_request: &str) -> Result<Vec<Task>> {
        let prompt = build_analysis_prompt(user_request);
        let response = chat(self.llm.as_ref(), &prompt, self.timeout).await?;
        tracing::debug!(chars = response.len(), "Received task analysis");

        let analysis = parse_plan_response(&response)?;
        if let Some(reasoning) = analysis.reasoning.as_deref().filter(|r| !r.trim().is_empty()) {
            tracing::info!(reasoning = %reasoning, "Model planning rationale");
        }

        let tasks: Vec<Task> = analysis
            .tasks
            .into_iter()
            .filter_map(|spec| spec.into_task(user_request))
            .collect();
        if tasks.is_empty() {
            return Err(AgentError::NoTasksExtracted);
        }
        tracing::info!(count = tasks.len(), "Planned tasks from model analysis");
        Ok(tasks)
    }
}

/// 解析规划回复：定位 JSON → 严格解码 → 容错提取
pub fn parse_plan_response(response: &str) -> Result<PlanAnalysis> {
    let json = extract_json_object(response)
        .ok_or_else(|| AgentError::JsonParseError("no JSON object in planning response".into()))?;

    match serde_json::from_str::<PlanAnalysis>(json) {
        Ok(analysis) if !analysis.tasks.is_empty() => return Ok(analysis),
        Ok(_) => tracing::debug!("Strict decode found no tasks, trying tolerant extraction"),
        Err(e) => tracing::debug!(error = %e, "Strict decode failed, trying tolerant extraction"),
    }

    let tasks: Vec<TaskSpec> = extract_array_body(json, "tasks")
        .map(split_top_level_objects)
        .unwrap_or_default()
        .into_iter()
        .map(extract_task_spec)
        .collect();
    if tasks.is_empty() {
        return Err(AgentError::NoTasksExtracted);
    }

    Ok(PlanAnalysis {
        tasks,
        reasoning: extract_string_field(json, "reasoning"),
    })
}

fn extract_task_spec(object: &str) -> TaskSpec {
    // parameters 里可能也有 description / type 之类的键，先把它剔除再取顶层字段
    let params_body = extract_object_body(object, "parameters");
    let top_level = match params_body {
        Some(body) => object.replacen(body, "", 1),
        None => object.to_string(),
    };
    TaskSpec {
        description: extract_string_field(&top_level, "description"),
        task_type: extract_string_field(&top_level, "type"),
        priority: extract_string_field(&top_level, "priority"),
        parameters: params_body.map(extract_flat_parameters),
    }
}

fn build_analysis_prompt(user_request: &str) -> String {
    let task_types = TaskType::ALL
        .iter()
        .map(|t| format!("- {}: {}", t.as_str(), t.summary()))
        .collect::<Vec<_>>()
        .join("\n");
    let priorities = TaskPriority::ALL
        .iter()
        .map(|p| p.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"As a development assistant, analyze the user request below and propose concrete tasks to execute.

USER REQUEST: "{user_request}"

AVAILABLE TASK TYPES:
{task_types}

PARAMETERS BY TYPE:
- FILE_OPERATION: operation ("create"), filePath (relative path), content (file content)
- CODE_ANALYSIS: scope ("project" or a glob such as "src/**/*.rs")
- BUILD_OPERATION: operation ("compile", "test", "build", "clean")
- GIT_OPERATION: operation ("status", "diff", "commit", ...), parameters (string)
- CODE_MODIFICATION: filePath, description of the change
Parameter values must be flat strings, numbers or booleans.

PRIORITIES: {priorities}

Answer with ONE strict JSON object and nothing before or after it:
{{
  "tasks": [
    {{
      "description": "Clear description of the task",
      "type": "TASK_TYPE",
      "priority": "PRIORITY",
      "parameters": {{"key1": "value1"}}
    }}
  ],
  "reasoning": "Why these tasks were chosen"
}}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    fn planner(mock: MockLlmClient) -> TaskPlanner {
        TaskPlanner::new(Arc::new(mock)).with_timeout(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_strict_json_plan() {
        let response = r#"Here you go:
{"tasks": [
  {"description": "Create Calculator", "type": "FILE_OPERATION", "priority": "HIGH",
   "parameters": {"operation": "create", "filePath": "src/Calculator.java"}},
  {"description": "Compile", "type": "BUILD_OPERATION", "priority": "NORMAL", "parameters": {}}
], "reasoning": "create then compile"}"#;
        let tasks = planner(MockLlmClient::scripted([response]))
            .plan_tasks("create a calculator")
            .await;

        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].task_type(), TaskType::FileOperation);
        assert_eq!(tasks[0].priority(), TaskPriority::High);
        assert_eq!(
            tasks[0].parameter::<String>("filePath").as_deref(),
            Some("src/Calculator.java")
        );
        assert_eq!(tasks[1].task_type(), TaskType::BuildOperation);
        for task in &tasks {
            assert_eq!(task.parameter::<bool>("llm_analyzed"), Some(true));
            assert_eq!(
                task.parameter::<String>("original_request").as_deref(),
                Some("create a calculator")
            );
        }
    }

    #[tokio::test]
    async fn test_tolerant_extraction_on_malformed_json() {
        // 尾逗号与未转义换行会让严格解码失败
        let response = "```\n{\"tasks\": [{\"description\": \"Write file\", \"type\": \"FILE_OPERATION\", \"parameters\": {\"filePath\": \"A.java\", \"content\": \"class A {\n}\",},},], \"reasoning\": \"ok\"}\n```";
        let tasks = planner(MockLlmClient::scripted([response])).plan_tasks("write A").await;

        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].description(), "Write file");
        assert_eq!(tasks[0].task_type(), TaskType::FileOperation);
        assert_eq!(
            tasks[0].parameter::<String>("content").as_deref(),
            Some("class A {\n}")
        );
        assert_eq!(tasks[0].parameter::<bool>("llm_analyzed"), Some(true));
    }

    #[tokio::test]
    async fn test_unknown_type_and_priority_default() {
        let response = r#"{"tasks": [{"description": "Deploy", "type": "DEPLOYMENT", "priority": "URGENT"}]}"#;
        let tasks = planner(MockLlmClient::scripted([response])).plan_tasks("deploy").await;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].task_type(), TaskType::Composite);
        assert_eq!(tasks[0].priority(), TaskPriority::Normal);
    }

    #[tokio::test]
    async fn test_model_failure_falls_back_to_keywords() {
        let tasks = planner(MockLlmClient::failing("connection refused"))
            .plan_tasks("fix the login bug")
            .await;
        assert!(tasks.iter().any(|t| t.task_type() == TaskType::CodeModification
            && t.priority() == TaskPriority::Critical));
        assert!(tasks.iter().all(|t| t.parameter::<bool>("llm_analyzed").is_none()));
    }

    #[tokio::test]
    async fn test_unparseable_response_falls_back() {
        let tasks = planner(MockLlmClient::scripted(["I cannot help with that."]))
            .plan_tasks("say hello")
            .await;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].task_type(), TaskType::Composite);
    }

    #[tokio::test]
    async fn test_empty_task_list_falls_back() {
        let tasks = planner(MockLlmClient::scripted([r#"{"tasks": [], "reasoning": "nothing"}"#]))
            .plan_tasks("analyze the code")
            .await;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].task_type(), TaskType::CodeAnalysis);
    }

    #[tokio::test]
    async fn test_timeout_falls_back() {
        let mock = MockLlmClient::repeating("{}").with_delay(Duration::from_millis(200));
        let tasks = TaskPlanner::new(Arc::new(mock))
            .with_timeout(Duration::from_millis(20))
            .plan_tasks("refactor parser")
            .await;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].priority(), TaskPriority::High);
    }

    #[test]
    fn test_parse_plan_keeps_top_level_fields_apart_from_parameters() {
        let json = "{\"tasks\": [{\"parameters\": {\"type\": \"inner\", \"description\": \"inner\",}, \"description\": \"outer\", \"type\": \"GIT_OPERATION\"},]}";
        let analysis = parse_plan_response(json).unwrap();
        assert_eq!(analysis.tasks.len(), 1);
        assert_eq!(analysis.tasks[0].description.as_deref(), Some("outer"));
        assert_eq!(analysis.tasks[0].task_type.as_deref(), Some("GIT_OPERATION"));
        let params = analysis.tasks[0].parameters.as_ref().unwrap();
        assert_eq!(params.get("type"), Some(&Value::from("inner")));
    }

    #[test]
    fn test_prompt_lists_taxonomy_and_schema() {
        let prompt = build_analysis_prompt("do things");
        for t in TaskType::ALL {
            assert!(prompt.contains(t.as_str()));
        }
        assert!(prompt.contains("\"reasoning\""));
        assert!(prompt.contains("do things"));
    }
}
