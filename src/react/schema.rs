//! 思考回复的 JSON Schema（schemars 生成），拼入指令块以减少模型输出格式错误

use schemars::schema_for;

use crate::react::thinking::AgentResponse;

pub fn agent_response_schema_json() -> String {
    let schema = schema_for!(AgentResponse);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}
