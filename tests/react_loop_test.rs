//! ReAct 主循环集成测试
//!
//! 用 MockLlmClient 脚本化模型回复，StubTools / ScriptedValidator 替代真实工具与编译校验。

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use anvil::llm::MockLlmClient;
use anvil::react::{ReActLoopController, ReactPhase, ReActStatus, ReactEvent};
use anvil::task::TaskResult;
use anvil::tools::{DevTools, ExecutionEnv, ToolKind};
use anvil::validation::{ValidationResult, Validator};

#[derive(Default)]
struct StubTools {
    calls: Mutex<Vec<String>>,
}

impl StubTools {
    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DevTools for StubTools {
    async fn create_source_file(&self, _: &ExecutionEnv, class_name: &str, _: &str, _: &str) -> Result<String, String> {
        self.record(format!("create_source_file:{class_name}"));
        Ok(format!("Created {class_name}"))
    }

    async fn create_file(&self, _: &ExecutionEnv, file_path: &str, _: &str) -> Result<String, String> {
        self.record(format!("create_file:{file_path}"));
        Ok(format!("Created {file_path}"))
    }

    async fn compile_and_check(&self, _: &ExecutionEnv) -> Result<String, String> {
        Ok("Compilation successful".into())
    }

    async fn get_diagnostics(&self, _: &ExecutionEnv) -> Result<String, String> {
        Ok("No diagnostics".into())
    }

    async fn vcs_command(&self, _: &ExecutionEnv, operation: &str, _: &str) -> Result<String, String> {
        self.record(format!("vcs:{operation}"));
        Ok("nothing to commit".into())
    }

    async fn build_project(&self, _: &ExecutionEnv, _: &str) -> Result<String, String> {
        self.record("build");
        tokio::time::sleep(Duration::from_millis(80)).await;
        Err("Build failed: missing dependency".into())
    }

    async fn analyze_code(&self, _: &ExecutionEnv, _: &str, _: &str) -> Result<String, String> {
        self.record("analyze");
        Ok("Analyzed 3 file(s)".into())
    }
}

/// 按脚本给出校验结果，脚本耗尽后使用 fallback
struct ScriptedValidator {
    script: Mutex<VecDeque<bool>>,
    fallback: bool,
}

impl ScriptedValidator {
    fn always(pass: bool) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: pass,
        }
    }

    fn sequence(script: &[bool], fallback: bool) -> Self {
        Self {
            script: Mutex::new(script.iter().copied().collect()),
            fallback,
        }
    }
}

#[async_trait]
impl Validator for ScriptedValidator {
    fn requires_compilation_check(&self, tool: ToolKind, previous: &TaskResult) -> bool {
        previous.is_success() && tool.modifies_code()
    }

    async fn auto_validate(&self, _: &ExecutionEnv, tool: ToolKind, _: &TaskResult) -> ValidationResult {
        let pass = self.script.lock().unwrap().pop_front().unwrap_or(self.fallback);
        if pass {
            ValidationResult::passed("Code compiles successfully")
        } else {
            ValidationResult::failed(
                format!("Compilation failed after {tool}"),
                vec!["A.java:1: error: ';' expected".to_string()],
            )
        }
    }
}

/// 从不要求编译检查的校验器
struct SkipValidator;

#[async_trait]
impl Validator for SkipValidator {
    fn requires_compilation_check(&self, _: ToolKind, _: &TaskResult) -> bool {
        false
    }

    async fn auto_validate(&self, _: &ExecutionEnv, _: ToolKind, _: &TaskResult) -> ValidationResult {
        ValidationResult::failed("unexpected validation", vec!["should not run".to_string()])
    }
}

fn action(tool: &str, parameters: Value) -> String {
    json!({
        "thinking": format!("use {tool}"),
        "action": {"tool": tool, "parameters": parameters, "reasoning": format!("call {tool}")},
        "final_answer": null,
        "continue_cycle": true
    })
    .to_string()
}

fn final_answer(answer: &str) -> String {
    json!({"thinking": "done", "final_answer": answer, "continue_cycle": false}).to_string()
}

fn create_file() -> String {
    action("create_file", json!({"filePath": "A.java", "content": "class A {}"}))
}

fn controller(
    llm: Arc<MockLlmClient>,
    tools: Arc<StubTools>,
    validator: ScriptedValidator,
) -> ReActLoopController {
    ReActLoopController::new(llm, tools, Arc::new(validator), "/tmp/anvil-workspace")
}

#[tokio::test]
async fn completes_on_iteration_of_final_answer() {
    let llm = Arc::new(MockLlmClient::scripted([
        create_file(),
        create_file(),
        final_answer("Calculator created"),
    ]));
    let tools = Arc::new(StubTools::default());
    let result = controller(llm.clone(), tools.clone(), ScriptedValidator::always(false))
        .execute_with_loop("create a calculator")
        .await;

    assert_eq!(result.status(), ReActStatus::Completed);
    assert!(result.is_success());
    assert_eq!(result.user_message(), "Calculator created");
    let ctx = result.context();
    assert_eq!(ctx.iteration_count(), 3);
    assert_eq!(ctx.thinking_steps().len(), 3);
    assert_eq!(ctx.action_steps().len(), 2);
    // 每轮一条真实观察 + 一条 fix 观察
    assert_eq!(ctx.observation_steps().len(), 4);
    assert!(ctx.requires_fix());
    assert_eq!(tools.calls(), vec!["create_file:A.java", "create_file:A.java"]);

    let prompts = llm.prompts();
    assert!(prompts[0].contains("USER REQUEST: create a calculator"));
    assert!(prompts[1].starts_with("PREVIOUS OBSERVATION:"));
    assert!(prompts[1].contains("ERRORS TO FIX:\n  - A.java:1: error: ';' expected"));
}

#[tokio::test]
async fn never_converging_fix_loop_hits_iteration_budget() {
    let llm = Arc::new(MockLlmClient::repeating(create_file()));
    let result = controller(llm.clone(), Arc::new(StubTools::default()), ScriptedValidator::always(false))
        .execute_with_loop("create a calculator")
        .await;

    assert_eq!(result.status(), ReActStatus::MaxIterations);
    assert!(!result.is_success());
    let ctx = result.context();
    assert_eq!(ctx.iteration_count(), 10);
    assert!(ctx.has_errors());
    assert_eq!(ctx.all_errors().len(), 20);
    assert_eq!(llm.calls(), 10);
    assert_eq!(
        result.final_message(),
        Some("⚠️ Max iterations (10) reached. Task partially completed.")
    );
    assert!(result.summary().contains("Remaining errors:"));
}

#[tokio::test]
async fn passing_validation_terminates_with_observation() {
    let llm = Arc::new(MockLlmClient::scripted([create_file()]));
    let result = controller(llm, Arc::new(StubTools::default()), ScriptedValidator::always(true))
        .execute_with_loop("write A")
        .await;

    assert_eq!(result.status(), ReActStatus::Completed);
    assert_eq!(result.context().iteration_count(), 1);
    assert!(result.context().is_validation_completed());
    assert_eq!(
        result.final_message(),
        Some("Created A.java\nCode validated - compilation successful")
    );
}

#[tokio::test]
async fn fix_then_validation_passes() {
    let llm = Arc::new(MockLlmClient::scripted([create_file(), create_file()]));
    let result = controller(
        llm,
        Arc::new(StubTools::default()),
        ScriptedValidator::sequence(&[false], true),
    )
    .execute_with_loop("write A")
    .await;

    assert_eq!(result.status(), ReActStatus::Completed);
    assert_eq!(result.context().iteration_count(), 2);
    // 之前的失败仍保留在历史中
    assert!(result.context().has_errors());
}

#[tokio::test]
async fn unknown_tool_is_observed_and_loop_continues() {
    let llm = Arc::new(MockLlmClient::scripted([
        action("deploy_to_prod", json!({"env": "prod"})),
        final_answer("Nothing to deploy"),
    ]));
    let result = controller(llm, Arc::new(StubTools::default()), ScriptedValidator::always(true))
        .execute_with_loop("deploy")
        .await;

    assert_eq!(result.status(), ReActStatus::Completed);
    let ctx = result.context();
    assert_eq!(ctx.iteration_count(), 2);
    let first = &ctx.observation_steps()[0];
    assert!(!first.is_success());
    assert_eq!(first.errors(), ["Unknown tool: deploy_to_prod"]);
    assert_eq!(ctx.all_errors()[0], "Unknown tool: deploy_to_prod");
}

#[tokio::test]
async fn read_only_success_terminates_immediately() {
    let llm = Arc::new(MockLlmClient::scripted([action(
        "analyzeCode",
        json!({"request": "smells", "scope": "project"}),
    )]));
    let tools = Arc::new(StubTools::default());
    let result = controller(llm, tools.clone(), ScriptedValidator::always(false))
        .execute_with_loop("analyze the project")
        .await;

    assert_eq!(result.status(), ReActStatus::Completed);
    assert_eq!(result.final_message(), Some("Analyzed 3 file(s)"));
    assert!(!result.context().is_validation_completed());
    assert_eq!(tools.calls(), vec!["analyze"]);
}

#[tokio::test]
async fn skipped_validation_lets_file_creation_terminate() {
    let llm = Arc::new(MockLlmClient::scripted([action(
        "create_file",
        json!({"filePath": "README.md", "content": "# A"}),
    )]));
    let result = ReActLoopController::new(
        llm.clone(),
        Arc::new(StubTools::default()),
        Arc::new(SkipValidator),
        "/tmp/anvil-workspace",
    )
    .execute_with_loop("write a readme")
    .await;

    assert_eq!(result.status(), ReActStatus::Completed);
    assert_eq!(result.final_message(), Some("Created README.md"));
    assert!(!result.context().is_validation_required());
    assert!(!result.context().is_validation_completed());
    assert_eq!(llm.calls(), 1);
}

#[tokio::test]
async fn action_parameters_are_recorded_verbatim() {
    let parameters = json!({
        "filePath": "src/A.java",
        "content": "class A {}",
        "overwrite": true,
        "retries": 2,
        "meta": {"tags": ["x", "y"]}
    });
    let llm = Arc::new(MockLlmClient::scripted([action("create_file", parameters.clone())]));
    let result = controller(llm, Arc::new(StubTools::default()), ScriptedValidator::always(true))
        .execute_with_loop("write A")
        .await;

    let step = &result.context().action_steps()[0];
    assert_eq!(step.tool_name(), "create_file");
    assert_eq!(step.description(), "call create_file");
    assert_eq!(serde_json::to_value(step.parameters()).unwrap(), parameters);
}

#[tokio::test]
async fn thinking_failure_aborts_with_error() {
    let llm = Arc::new(MockLlmClient::failing("connection refused"));
    let result = controller(llm, Arc::new(StubTools::default()), ScriptedValidator::always(true))
        .execute_with_loop("anything")
        .await;

    assert_eq!(result.status(), ReActStatus::Error);
    assert!(result.error_message().unwrap().contains("connection refused"));
    assert!(result.user_message().starts_with("❌ An error occurred:"));
    assert_eq!(result.context().iteration_count(), 1);
    assert!(result.context().thinking_steps().is_empty());
}

#[tokio::test]
async fn model_failure_mid_run_keeps_earlier_steps() {
    let llm = Arc::new(MockLlmClient::scripted([create_file()]).then_fail("connection reset"));
    let tools = Arc::new(StubTools::default());
    let result = controller(llm, tools.clone(), ScriptedValidator::always(false))
        .execute_with_loop("create a calculator")
        .await;

    assert_eq!(result.status(), ReActStatus::Error);
    assert!(result.error_message().unwrap().contains("connection reset"));
    let ctx = result.context();
    assert_eq!(ctx.iteration_count(), 2);
    assert_eq!(ctx.action_steps().len(), 1);
    assert_eq!(ctx.all_errors(), ["A.java:1: error: ';' expected"; 2]);
    assert_eq!(tools.calls(), vec!["create_file:A.java"]);
}

#[tokio::test]
async fn unparseable_thinking_aborts_with_error() {
    let llm = Arc::new(MockLlmClient::scripted(["Sure, I will create the file now."]));
    let result = controller(llm, Arc::new(StubTools::default()), ScriptedValidator::always(true))
        .execute_with_loop("anything")
        .await;
    assert_eq!(result.status(), ReActStatus::Error);
    assert!(result.error_message().unwrap().contains("JSON parse error"));
}

#[tokio::test]
async fn missing_action_aborts_with_error() {
    let llm = Arc::new(MockLlmClient::scripted([r#"{"thinking": "hmm", "continue_cycle": true}"#]));
    let result = controller(llm, Arc::new(StubTools::default()), ScriptedValidator::always(true))
        .execute_with_loop("anything")
        .await;
    assert_eq!(result.status(), ReActStatus::Error);
    assert_eq!(result.error_message(), Some("Model did not propose any action"));
    assert_eq!(result.context().thinking_steps().len(), 1);
}

#[tokio::test]
async fn stop_without_action_or_answer_is_an_error() {
    let llm = Arc::new(MockLlmClient::scripted([r#"{"thinking": "hmm", "continue_cycle": false}"#]));
    let tools = Arc::new(StubTools::default());
    let result = controller(llm, tools.clone(), ScriptedValidator::always(true))
        .execute_with_loop("anything")
        .await;

    assert_eq!(result.status(), ReActStatus::Error);
    assert_eq!(result.error_message(), Some("Model did not propose any action"));
    assert!(tools.calls().is_empty());
}

#[tokio::test]
async fn model_requested_stop_uses_last_observation() {
    let stop = json!({"thinking": "enough", "action": {"tool": "vcs_command", "parameters": {"operation": "status"}}, "continue_cycle": false}).to_string();
    let llm = Arc::new(MockLlmClient::scripted([
        action("deploy", json!({})),
        stop.clone(),
    ]));
    let tools = Arc::new(StubTools::default());
    let result = controller(llm, tools.clone(), ScriptedValidator::always(true))
        .execute_with_loop("check status")
        .await;

    assert_eq!(result.status(), ReActStatus::Completed);
    assert_eq!(result.final_message(), Some("Errors detected that need fixing"));
    assert!(tools.calls().is_empty());

    let llm = Arc::new(MockLlmClient::scripted([stop]));
    let result = controller(llm, Arc::new(StubTools::default()), ScriptedValidator::always(true))
        .execute_with_loop("check status")
        .await;
    assert_eq!(result.final_message(), Some("Task completed"));
}

#[tokio::test]
async fn cancel_interrupts_thinking() {
    let llm = Arc::new(MockLlmClient::repeating(create_file()).with_delay(Duration::from_secs(5)));
    let controller = Arc::new(controller(llm, Arc::new(StubTools::default()), ScriptedValidator::always(false)));

    let handle = controller.clone().spawn_loop("long task");
    tokio::time::sleep(Duration::from_millis(50)).await;
    controller.cancel();

    let result = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("loop should stop promptly")
        .unwrap();
    assert_eq!(result.status(), ReActStatus::Cancelled);
    assert!(result.user_message().starts_with("🛑 Operation cancelled"));
    assert_eq!(result.context().iteration_count(), 1);
}

#[tokio::test]
async fn cancel_before_run_does_not_affect_new_run() {
    let llm = Arc::new(MockLlmClient::scripted([final_answer("ok")]));
    let controller = controller(llm, Arc::new(StubTools::default()), ScriptedValidator::always(true));
    controller.cancel();
    let result = controller.execute_with_loop("quick").await;
    assert_eq!(result.status(), ReActStatus::Completed);
}

#[tokio::test]
async fn run_timeout_is_checked_between_iterations() {
    let llm = Arc::new(MockLlmClient::repeating(action("build_project", json!({"operation": "build"}))));
    let result = controller(llm, Arc::new(StubTools::default()), ScriptedValidator::always(true))
        .with_run_timeout(Duration::from_millis(50))
        .execute_with_loop("build it")
        .await;

    assert_eq!(result.status(), ReActStatus::Error);
    assert!(result.error_message().unwrap().starts_with("Timeout exceeded"));
    assert_eq!(result.context().iteration_count(), 1);
}

#[tokio::test]
async fn progress_events_follow_phases() {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let llm = Arc::new(MockLlmClient::scripted([create_file()]));
    let result = controller(llm, Arc::new(StubTools::default()), ScriptedValidator::always(true))
        .with_event_tx(tx)
        .execute_with_loop("write A")
        .await;
    assert!(result.is_success());

    let mut phases = Vec::new();
    while let Ok(event) = rx.try_recv() {
        let ReactEvent::Progress { iteration, max_iterations, .. } = &event;
        assert_eq!((*iteration, *max_iterations), (1, 10));
        phases.push(event.phase());
    }
    assert_eq!(
        phases,
        vec![
            ReactPhase::Think,
            ReactPhase::Thinking,
            ReactPhase::Act,
            ReactPhase::Observe,
            ReactPhase::Complete
        ]
    );
}
