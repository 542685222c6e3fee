//! 思考步骤：构造 prompt、解析模型回复
//!
//! 回复约定：`{thinking, action:{tool, parameters, reasoning}, final_answer, continue_cycle}`。
//! 解析先剥离 ```json 围栏，否则取首个 `{` 到末个 `}`，再按约定严格解码；解码失败即视为本轮思考失败。

use std::collections::HashMap;

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::core::{AgentError, Result};
use crate::react::schema::agent_response_schema_json;
use crate::react::{ReActContext, ThinkingOutcome, ThinkingStep};
use crate::task::extract::locate_json;
use crate::tools::ToolKind;

/// 模型回复结构
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct AgentResponse {
    /// 对下一步的推理
    #[serde(default)]
    pub thinking: Option<String>,
    /// 下一步要调用的工具；给出最终回答时为 null
    #[serde(default)]
    pub action: Option<AgentAction>,
    /// 任务完成时的最终回答
    #[serde(default)]
    pub final_answer: Option<String>,
    /// 为 false 时结束循环；缺省视为 true
    #[serde(default)]
    pub continue_cycle: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct AgentAction {
    /// 工具名
    #[serde(default)]
    pub tool: Option<String>,
    /// 工具参数
    #[serde(default)]
    pub parameters: Option<HashMap<String, Value>>,
    /// 选用该工具的理由
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// 模型提出的动作
#[derive(Debug, Clone, PartialEq)]
pub struct ProposedAction {
    pub tool: String,
    pub parameters: HashMap<String, Value>,
    pub reasoning: Option<String>,
}

impl ProposedAction {
    /// 动作描述：优先用模型给的理由，否则用工具名
    pub fn description(&self) -> &str {
        self.reasoning
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .unwrap_or(&self.tool)
    }
}

/// 一次思考解析后的结论
#[derive(Debug, Clone, PartialEq)]
pub struct Thought {
    pub reasoning: String,
    pub final_answer: Option<String>,
    pub action: Option<ProposedAction>,
    pub continue_cycle: bool,
}

impl Thought {
    pub fn to_step(&self) -> ThinkingStep {
        let outcome = match (&self.final_answer, &self.action) {
            (Some(answer), _) => ThinkingOutcome::FinalAnswer(answer.clone()),
            (None, Some(action)) => ThinkingOutcome::Action(action.tool.clone()),
            (None, None) => ThinkingOutcome::Undecided,
        };
        ThinkingStep::new(self.reasoning.clone(), outcome)
    }
}

impl From<AgentResponse> for Thought {
    fn from(response: AgentResponse) -> Self {
        let action = response.action.and_then(|a| {
            let tool = a.tool.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())?;
            Some(ProposedAction {
                tool,
                parameters: a.parameters.unwrap_or_default(),
                reasoning: a.reasoning,
            })
        });
        let reasoning = response
            .thinking
            .filter(|t| !t.trim().is_empty())
            .or_else(|| action.as_ref().and_then(|a| a.reasoning.clone()))
            .unwrap_or_default();
        Self {
            reasoning,
            final_answer: response.final_answer.filter(|a| !a.trim().is_empty()),
            action,
            continue_cycle: response.continue_cycle.unwrap_or(true),
        }
    }
}

pub fn parse_thinking(response: &str) -> Result<Thought> {
    let json = locate_json(response);
    let parsed: AgentResponse = serde_json::from_str(json)
        .map_err(|e| AgentError::JsonParseError(format!("thinking response: {}", e)))?;
    Ok(parsed.into())
}

/// 第一轮：指令块 + 用户请求；之后：上一轮观察 + 指令块
pub fn build_thinking_prompt(context: &ReActContext) -> String {
    let mut prompt = if context.iteration_count() <= 1 {
        format!(
            "{}\n\nUSER REQUEST: {}",
            instruction_block(),
            context.original_request()
        )
    } else {
        continuation_prompt(context)
    };
    prompt.push_str("\n\nRespond with JSON only:");
    prompt
}

fn continuation_prompt(context: &ReActContext) -> String {
    let mut prompt = String::from("PREVIOUS OBSERVATION:\n");
    if let Some(obs) = context.last_observation() {
        let status = if obs.is_success() { "SUCCESS" } else { "FAILURE" };
        prompt.push_str(&format!("[{}] {}\n", status, obs.result()));
        if obs.has_errors() {
            prompt.push_str("\nERRORS TO FIX:\n");
            for error in obs.errors() {
                prompt.push_str(&format!("  - {}\n", error));
            }
        }
    }
    prompt.push_str(&format!(
        "\nCONTINUE ReAct cycle for: {}\n\n",
        context.original_request()
    ));
    prompt.push_str(&instruction_block());
    prompt
}

fn instruction_block() -> String {
    format!(
        r#"You are an expert development assistant using the ReAct pattern (Think, Act, Observe).

Respond with VALID JSON in this format:

```json
{{
  "thinking": "Your reasoning about what to do next",
  "action": {{
    "tool": "tool_name",
    "parameters": {{"param1": "value1"}},
    "reasoning": "Why you are using this tool"
  }},
  "final_answer": null,
  "continue_cycle": true
}}
```

Available tools:
{catalog}

IMPORTANT: after {source} or {file}, compilation is checked AUTOMATICALLY.
You will receive the compilation result in the next iteration. If it fails, FIX the errors immediately.

Set "continue_cycle": false and provide "final_answer" when the task is complete.

Response JSON schema:
{schema}"#,
        catalog = ToolKind::catalog(),
        source = ToolKind::CreateSourceFile.name(),
        file = ToolKind::CreateFile.name(),
        schema = agent_response_schema_json(),
    )
}
