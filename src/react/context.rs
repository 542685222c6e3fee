//! ReAct 运行上下文
//!
//! 一次运行独占一个 ReActContext：三条只追加的步骤序列（思考 / 动作 / 观察）、迭代计数、
//! 校验完成标记与待修复标记。所有查询都是当前状态的纯函数。

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::tools::ExecutionEnv;

const FIX_REASON: &str = "Compilation errors detected";
const FIX_OBSERVATION: &str = "Errors detected that need fixing";

/// 一次思考的结论
#[derive(Debug, Clone, PartialEq)]
pub enum ThinkingOutcome {
    /// 继续：下一步调用的工具
    Action(String),
    /// 终止：最终回答
    FinalAnswer(String),
    /// 既无动作也无最终回答
    Undecided,
}

#[derive(Debug, Clone)]
pub struct ThinkingStep {
    reasoning: String,
    outcome: ThinkingOutcome,
    timestamp: DateTime<Utc>,
}

impl ThinkingStep {
    pub fn new(reasoning: impl Into<String>, outcome: ThinkingOutcome) -> Self {
        Self {
            reasoning: reasoning.into(),
            outcome,
            timestamp: Utc::now(),
        }
    }

    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    pub fn outcome(&self) -> &ThinkingOutcome {
        &self.outcome
    }

    pub fn next_action(&self) -> Option<&str> {
        match &self.outcome {
            ThinkingOutcome::Action(tool) => Some(tool),
            _ => None,
        }
    }

    pub fn final_answer(&self) -> Option<&str> {
        match &self.outcome {
            ThinkingOutcome::FinalAnswer(answer) => Some(answer),
            _ => None,
        }
    }

    pub fn has_final_answer(&self) -> bool {
        matches!(self.outcome, ThinkingOutcome::FinalAnswer(_))
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

#[derive(Debug, Clone)]
pub struct ActionStep {
    tool_name: String,
    description: String,
    parameters: HashMap<String, Value>,
    timestamp: DateTime<Utc>,
}

impl ActionStep {
    pub fn new(
        tool_name: impl Into<String>,
        description: impl Into<String>,
        parameters: HashMap<String, Value>,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            description: description.into(),
            parameters,
            timestamp: Utc::now(),
        }
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn parameters(&self) -> &HashMap<String, Value> {
        &self.parameters
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

#[derive(Debug, Clone)]
pub struct ObservationStep {
    success: bool,
    result: String,
    errors: Vec<String>,
    warnings: Vec<String>,
    timestamp: DateTime<Utc>,
}

impl ObservationStep {
    pub fn new(
        success: bool,
        result: impl Into<String>,
        errors: Vec<String>,
        warnings: Vec<String>,
    ) -> Self {
        Self {
            success,
            result: result.into(),
            errors,
            warnings,
            timestamp: Utc::now(),
        }
    }

    pub fn succeeded(result: impl Into<String>) -> Self {
        Self::new(true, result, Vec::new(), Vec::new())
    }

    pub fn failed(result: impl Into<String>, errors: Vec<String>) -> Self {
        Self::new(false, result, errors, Vec::new())
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn result(&self) -> &str {
        &self.result
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

#[derive(Debug, Clone)]
pub struct ReActContext {
    original_request: String,
    env: ExecutionEnv,
    start_time: DateTime<Utc>,

    thinking_steps: Vec<ThinkingStep>,
    action_steps: Vec<ActionStep>,
    observation_steps: Vec<ObservationStep>,

    iteration_count: usize,
    required_validation: bool,
    completed_validation: bool,
    requires_fix: bool,
    fix_reason: Option<String>,
}

impl ReActContext {
    pub fn new(original_request: impl Into<String>, env: ExecutionEnv) -> Self {
        Self {
            original_request: original_request.into(),
            env,
            start_time: Utc::now(),
            thinking_steps: Vec::new(),
            action_steps: Vec::new(),
            observation_steps: Vec::new(),
            iteration_count: 0,
            required_validation: false,
            completed_validation: false,
            requires_fix: false,
            fix_reason: None,
        }
    }

    pub fn original_request(&self) -> &str {
        &self.original_request
    }

    pub fn env(&self) -> &ExecutionEnv {
        &self.env
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn thinking_steps(&self) -> &[ThinkingStep] {
        &self.thinking_steps
    }

    pub fn action_steps(&self) -> &[ActionStep] {
        &self.action_steps
    }

    pub fn observation_steps(&self) -> &[ObservationStep] {
        &self.observation_steps
    }

    pub fn iteration_count(&self) -> usize {
        self.iteration_count
    }

    /// 本次运行中是否有动作被校验器判定为需要编译检查
    pub fn is_validation_required(&self) -> bool {
        self.required_validation
    }

    pub fn is_validation_completed(&self) -> bool {
        self.completed_validation
    }

    pub fn requires_fix(&self) -> bool {
        self.requires_fix
    }

    pub fn fix_reason(&self) -> Option<&str> {
        self.fix_reason.as_deref()
    }

    pub fn add_thinking(&mut self, step: ThinkingStep) {
        tracing::debug!(reasoning = %step.reasoning(), "Added thinking step");
        self.thinking_steps.push(step);
    }

    pub fn add_action(&mut self, step: ActionStep) {
        tracing::debug!(tool = %step.tool_name(), description = %step.description(), "Added action step");
        self.action_steps.push(step);
    }

    pub fn add_observation(&mut self, step: ObservationStep) {
        tracing::debug!(success = step.is_success(), "Added observation step");
        self.observation_steps.push(step);
    }

    pub fn increment_iteration(&mut self) {
        self.iteration_count += 1;
        tracing::debug!(iteration = self.iteration_count, "Iteration count");
    }

    pub fn mark_validation_required(&mut self) {
        self.required_validation = true;
    }

    pub fn mark_validation_completed(&mut self) {
        self.completed_validation = true;
        tracing::info!("Validation marked as completed");
    }

    pub fn mark_requiring_fix(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::info!(reason = %reason, "Context marked as requiring fix");
        self.requires_fix = true;
        self.fix_reason = Some(reason);
    }

    pub fn clear_fix_requirement(&mut self) {
        self.requires_fix = false;
        self.fix_reason = None;
    }

    pub fn last_thinking(&self) -> Option<&ThinkingStep> {
        self.thinking_steps.last()
    }

    pub fn last_action(&self) -> Option<&ActionStep> {
        self.action_steps.last()
    }

    pub fn last_observation(&self) -> Option<&ObservationStep> {
        self.observation_steps.last()
    }

    /// 是否存在失败且带错误的观察
    pub fn has_errors(&self) -> bool {
        self.observation_steps
            .iter()
            .any(|obs| !obs.is_success() && obs.has_errors())
    }

    /// 按观察顺序拼接全部错误
    pub fn all_errors(&self) -> Vec<String> {
        self.observation_steps
            .iter()
            .filter(|obs| obs.has_errors())
            .flat_map(|obs| obs.errors().iter().cloned())
            .collect()
    }

    pub fn last_observation_successful(&self) -> bool {
        self.last_observation().is_some_and(ObservationStep::is_success)
    }

    /// 标记待修复，并追加一条携带这些错误的失败观察，供下一轮 prompt 使用
    pub fn prepare_fix_iteration(&mut self, errors: Vec<String>) {
        self.mark_requiring_fix(FIX_REASON);
        self.add_observation(ObservationStep::failed(FIX_OBSERVATION, errors));
    }

    pub fn summary(&self) -> String {
        format!(
            "ReAct Context [iterations={}, thinking={}, actions={}, observations={}, validation={}, requiresFix={}]",
            self.iteration_count,
            self.thinking_steps.len(),
            self.action_steps.len(),
            self.observation_steps.len(),
            self.completed_validation,
            self.requires_fix
        )
    }

    pub fn full_history(&self) -> String {
        let mut history = String::from("=== ReAct Cycle History ===\n");
        history.push_str(&format!("Request: {}\n", self.original_request));
        history.push_str(&format!("Iterations: {}\n\n", self.iteration_count));

        let rows = self
            .thinking_steps
            .len()
            .max(self.action_steps.len())
            .max(self.observation_steps.len());
        for i in 0..rows {
            history.push_str(&format!("--- Step {} ---\n", i + 1));
            if let Some(thinking) = self.thinking_steps.get(i) {
                history.push_str(&format!("THINK: {}\n", thinking.reasoning()));
            }
            if let Some(action) = self.action_steps.get(i) {
                history.push_str(&format!("ACT: {} - {}\n", action.tool_name(), action.description()));
            }
            if let Some(obs) = self.observation_steps.get(i) {
                let mark = if obs.is_success() { "✅" } else { "❌" };
                history.push_str(&format!("OBSERVE: {} {}\n", mark, obs.result()));
            }
            history.push('\n');
        }
        history
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> ReActContext {
        ReActContext::new("create a calculator", ExecutionEnv::new("."))
    }

    #[test]
    fn test_all_errors_in_observation_order() {
        let mut ctx = context();
        ctx.add_observation(ObservationStep::failed("first", vec!["A".into(), "B".into()]));
        ctx.add_observation(ObservationStep::succeeded("ok"));
        ctx.add_observation(ObservationStep::failed("second", vec!["C".into()]));
        assert_eq!(ctx.all_errors(), vec!["A", "B", "C"]);
        assert!(ctx.has_errors());
    }

    #[test]
    fn test_has_errors_ignores_failures_without_errors() {
        let mut ctx = context();
        assert!(!ctx.has_errors());
        assert!(!ctx.last_observation_successful());
        ctx.add_observation(ObservationStep::failed("no detail", Vec::new()));
        assert!(!ctx.has_errors());
        ctx.add_observation(ObservationStep::succeeded("done"));
        assert!(ctx.last_observation_successful());
    }

    #[test]
    fn test_iteration_counter_counts_increments() {
        let mut ctx = context();
        for expected in 1..=5 {
            ctx.increment_iteration();
            assert_eq!(ctx.iteration_count(), expected);
        }
    }

    #[test]
    fn test_prepare_fix_iteration_appends_synthetic_observation() {
        let mut ctx = context();
        ctx.prepare_fix_iteration(vec!["error: missing ;".into()]);
        assert!(ctx.requires_fix());
        assert_eq!(ctx.fix_reason(), Some("Compilation errors detected"));
        let last = ctx.last_observation().unwrap();
        assert!(!last.is_success());
        assert_eq!(last.result(), "Errors detected that need fixing");
        assert_eq!(last.errors(), ["error: missing ;"]);

        ctx.clear_fix_requirement();
        assert!(!ctx.requires_fix());
        assert_eq!(ctx.fix_reason(), None);
    }

    #[test]
    fn test_action_parameters_are_kept_verbatim() {
        let mut params = HashMap::new();
        params.insert("filePath".to_string(), Value::from("src/A.java"));
        params.insert("depth".to_string(), Value::from(3));
        params.insert("nested".to_string(), serde_json::json!({"k": [1, 2]}));
        let step = ActionStep::new("create_file", "write A", params.clone());
        assert_eq!(step.parameters(), &params);
    }

    #[test]
    fn test_summary_and_history() {
        let mut ctx = context();
        ctx.increment_iteration();
        ctx.add_thinking(ThinkingStep::new("need a file", ThinkingOutcome::Action("create_file".into())));
        ctx.add_action(ActionStep::new("create_file", "write A", HashMap::new()));
        ctx.add_observation(ObservationStep::succeeded("Created A"));
        ctx.mark_validation_completed();

        assert_eq!(
            ctx.summary(),
            "ReAct Context [iterations=1, thinking=1, actions=1, observations=1, validation=true, requiresFix=false]"
        );
        let history = ctx.full_history();
        assert!(history.contains("Request: create a calculator"));
        assert!(history.contains("THINK: need a file"));
        assert!(history.contains("ACT: create_file - write A"));
        assert!(history.contains("OBSERVE: ✅ Created A"));
        assert_eq!(ctx.last_thinking().and_then(|t| t.next_action()), Some("create_file"));
    }
}
