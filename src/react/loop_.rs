//! ReAct 主循环
//!
//! Think -> Act (Tool) -> Observe (自动编译校验) -> 终止判断 / Fix 轮；最大迭代数与整体超时两道上限。
//! 每轮开始时检查取消令牌，思考调用与取消令牌竞速；可选 event_tx 推送每个阶段的进度。

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ReactSection;
use crate::core::Result;
use crate::llm::{chat, LlmClient};
use crate::react::thinking::{build_thinking_prompt, parse_thinking, Thought};
use crate::react::{
    ActionStep, ObservationStep, ReActContext, ReActResult, ReactEvent, ReactPhase,
};
use crate::task::TaskResult;
use crate::tools::{DevTools, ExecutionEnv, ToolDispatcher, ToolKind};
use crate::validation::Validator;

/// 最大迭代数（默认）
pub const MAX_ITERATIONS: usize = 10;
/// 单次思考超时（默认）
pub const THINK_TIMEOUT: Duration = Duration::from_secs(120);
/// 整次运行超时（默认）
pub const RUN_TIMEOUT: Duration = Duration::from_secs(120);

const CANCEL_REASON: &str = "Operation cancelled by the user";

pub struct ReActLoopController {
    llm: Arc<dyn LlmClient>,
    dispatcher: ToolDispatcher,
    validator: Arc<dyn Validator>,
    workspace_root: PathBuf,
    max_iterations: usize,
    think_timeout: Duration,
    run_timeout: Duration,
    /// 当前运行共享的取消令牌；cancel() 触发后换新
    cancel_token: Mutex<CancellationToken>,
    event_tx: Option<mpsc::UnboundedSender<ReactEvent>>,
}

impl ReActLoopController {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        tools: Arc<dyn DevTools>,
        validator: Arc<dyn Validator>,
        workspace_root: impl AsRef<Path>,
    ) -> Self {
        Self {
            llm,
            dispatcher: ToolDispatcher::new(tools),
            validator,
            workspace_root: workspace_root.as_ref().to_path_buf(),
            max_iterations: MAX_ITERATIONS,
            think_timeout: THINK_TIMEOUT,
            run_timeout: RUN_TIMEOUT,
            cancel_token: Mutex::new(CancellationToken::new()),
            event_tx: None,
        }
    }

    /// 应用 [react] 段
    pub fn with_config(mut self, config: &ReactSection) -> Self {
        self.max_iterations = config.max_iterations.max(1);
        self.think_timeout = config.think_timeout();
        self.run_timeout = config.run_timeout();
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn with_think_timeout(mut self, timeout: Duration) -> Self {
        self.think_timeout = timeout;
        self
    }

    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = timeout;
        self
    }

    /// 单个工具调用的超时；None 不限时
    pub fn with_tool_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.dispatcher = self.dispatcher.with_timeout(timeout);
        self
    }

    pub fn with_event_tx(mut self, tx: mpsc::UnboundedSender<ReactEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// 取消所有进行中的运行；之后启动的运行不受影响
    pub fn cancel(&self) {
        tracing::info!("Cancelling ReAct loop");
        let mut guard = match self.cancel_token.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.cancel();
        *guard = CancellationToken::new();
    }

    fn current_token(&self) -> CancellationToken {
        match self.cancel_token.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// 在后台任务中运行，调用方不被阻塞
    pub fn spawn_loop(self: Arc<Self>, user_request: impl Into<String>) -> JoinHandle<ReActResult> {
        let user_request = user_request.into();
        tokio::spawn(async move { self.execute_with_loop(&user_request).await })
    }

    pub async fn execute_with_loop(&self, user_request: &str) -> ReActResult {
        tracing::info!(request = %user_request, "Starting ReAct loop");
        let token = self.current_token();
        let context = ReActContext::new(user_request, ExecutionEnv::new(&self.workspace_root));
        let result = self.run_cycle(context, &token).await;
        tracing::info!(
            status = %result.status(),
            iterations = result.context().iteration_count(),
            "ReAct loop finished"
        );
        tracing::debug!(summary = %result.summary(), "ReAct result");
        result
    }

    async fn run_cycle(&self, mut context: ReActContext, token: &CancellationToken) -> ReActResult {
        let started = Instant::now();

        for iteration in 1..=self.max_iterations {
            if token.is_cancelled() {
                tracing::info!("ReAct loop cancelled by user");
                self.emit(iteration, ReactPhase::Error, format!("🛑 {}", CANCEL_REASON));
                return ReActResult::cancelled(context, CANCEL_REASON);
            }

            let elapsed = started.elapsed();
            if elapsed >= self.run_timeout {
                let secs = self.run_timeout.as_secs();
                tracing::warn!(secs, "ReAct loop timeout exceeded");
                self.emit(iteration, ReactPhase::Error, format!("Timeout exceeded ({}s)", secs));
                return ReActResult::error(context, format!("Timeout exceeded ({} seconds)", secs));
            }
            let remaining = self.run_timeout - elapsed;

            context.increment_iteration();
            tracing::info!(iteration, max = self.max_iterations, "ReAct iteration");
            self.emit(
                iteration,
                ReactPhase::Think,
                format!(
                    "💭 Iteration {}/{} - analyzing the request (timeout in {}s)",
                    iteration,
                    self.max_iterations,
                    remaining.as_secs()
                ),
            );

            // 1. THINK
            let thinking = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                thought = self.think(&context, remaining) => Some(thought),
            };
            let thought = match thinking {
                None => {
                    tracing::info!("ReAct loop cancelled while thinking");
                    self.emit(iteration, ReactPhase::Error, format!("🛑 {}", CANCEL_REASON));
                    return ReActResult::cancelled(context, CANCEL_REASON);
                }
                Some(Err(e)) => {
                    tracing::error!(error = %e, "Failed to get thinking from model");
                    self.emit(iteration, ReactPhase::Error, "❌ Model reasoning failed");
                    return ReActResult::error(context, e.to_string());
                }
                Some(Ok(thought)) => thought,
            };

            if !thought.reasoning.trim().is_empty() {
                self.emit(
                    iteration,
                    ReactPhase::Thinking,
                    format!("💡 Reasoning: {}", thought.reasoning),
                );
            }
            context.add_thinking(thought.to_step());

            // 2. 最终回答 / 缺少动作 / 模型要求停止
            if let Some(answer) = thought.final_answer {
                tracing::info!("Model provided final answer");
                self.emit(iteration, ReactPhase::Complete, format!("✅ Task completed: {}", answer));
                return ReActResult::success(context, answer);
            }
            let Some(action) = thought.action else {
                tracing::warn!("No action proposed by model");
                self.emit(iteration, ReactPhase::Error, "❌ The model did not propose any action");
                return ReActResult::error(context, "Model did not propose any action");
            };
            if !thought.continue_cycle {
                tracing::info!("Model requested to stop cycle");
                let message = context
                    .last_observation()
                    .map(|obs| obs.result().to_string())
                    .unwrap_or_else(|| "Task completed".to_string());
                self.emit(iteration, ReactPhase::Complete, format!("✅ {}", message));
                return ReActResult::success(context, message);
            }

            // 3. ACT
            let description = action.description().to_string();
            self.emit(iteration, ReactPhase::Act, format!("⚙️ Executing: {}", description));
            tracing::info!(tool = %action.tool, "Executing action");

            let action_result = self
                .dispatcher
                .dispatch(context.env(), &action.tool, &action.parameters)
                .await;
            context.add_action(ActionStep::new(action.tool.clone(), description, action.parameters));

            // 4. OBSERVE
            self.emit(
                iteration,
                ReactPhase::Observe,
                format!("🔍 Checking the result of '{}'", action.tool.to_lowercase()),
            );
            let observation = self.observe(&mut context, &action.tool, &action_result).await;
            let terminate = should_terminate(&context, &observation);
            let errors = observation.errors().to_vec();
            context.add_observation(observation);

            // 5. DECIDE
            if terminate {
                tracing::info!("ReAct cycle completed successfully");
                let message = context
                    .last_observation()
                    .map(|obs| obs.result().to_string())
                    .unwrap_or_default();
                self.emit(iteration, ReactPhase::Complete, format!("✅ {}", message));
                return ReActResult::success(context, message);
            }

            // 6. FIX
            if !errors.is_empty() {
                tracing::info!(errors = errors.len(), "Preparing fix iteration");
                context.prepare_fix_iteration(errors);
            }
        }

        tracing::warn!(max = self.max_iterations, "Max iterations reached without completion");
        self.emit(
            self.max_iterations,
            ReactPhase::Error,
            format!("⚠️ Max iterations ({}) reached", self.max_iterations),
        );
        ReActResult::max_iterations_reached(context)
    }

    async fn think(&self, context: &ReActContext, remaining: Duration) -> Result<Thought> {
        let prompt = build_thinking_prompt(context);
        tracing::debug!(chars = prompt.len(), "Asking model to think");
        let response = chat(self.llm.as_ref(), &prompt, self.think_timeout.min(remaining)).await?;
        tracing::debug!(chars = response.len(), "Model response received");
        parse_thinking(&response)
    }

    /// 动作失败：失败观察；成功且需校验：按校验结果；否则直接成功
    async fn observe(
        &self,
        context: &mut ReActContext,
        tool: &str,
        result: &TaskResult,
    ) -> ObservationStep {
        let message = result.display_message().to_string();
        if !result.is_success() {
            return ObservationStep::failed(message.clone(), vec![message]);
        }

        let Some(kind) = ToolKind::from_name(tool) else {
            return ObservationStep::succeeded(message);
        };
        if !self.validator.requires_compilation_check(kind, result) {
            return ObservationStep::succeeded(message);
        }
        context.mark_validation_required();

        tracing::info!(tool = %kind, "Auto-validating compilation");
        let validation = self.validator.auto_validate(context.env(), kind, result).await;
        if validation.success {
            context.mark_validation_completed();
            ObservationStep::succeeded(validation.feedback(&message))
        } else {
            ObservationStep::new(
                false,
                "Action succeeded but compilation failed",
                validation.errors,
                validation.warnings,
            )
        }
    }

    fn emit(&self, iteration: usize, phase: ReactPhase, message: impl Into<String>) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(ReactEvent::progress(iteration, self.max_iterations, phase, message));
        }
    }
}

/// 观察成功、无错误，且校验已完成或校验器从未要求过校验
fn should_terminate(context: &ReActContext, observation: &ObservationStep) -> bool {
    let validation_complete = context.is_validation_completed() || !context.is_validation_required();
    tracing::debug!(
        success = observation.is_success(),
        validation = validation_complete,
        no_errors = !observation.has_errors(),
        "Termination check"
    );
    observation.is_success() && validation_complete && !observation.has_errors()
}
