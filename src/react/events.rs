//! ReAct 过程事件：向调用方推送每轮的阶段与说明，可序列化为 JSON 供前端展示

use serde::Serialize;

/// 循环阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactPhase {
    /// 开始一轮思考
    Think,
    /// 模型给出的推理内容
    Thinking,
    /// 执行工具
    Act,
    /// 观察 / 校验结果
    Observe,
    Complete,
    Error,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReactEvent {
    Progress {
        /// 从 1 开始
        iteration: usize,
        max_iterations: usize,
        phase: ReactPhase,
        message: String,
    },
}

impl ReactEvent {
    pub fn progress(
        iteration: usize,
        max_iterations: usize,
        phase: ReactPhase,
        message: impl Into<String>,
    ) -> Self {
        ReactEvent::Progress {
            iteration,
            max_iterations,
            phase,
            message: message.into(),
        }
    }

    pub fn phase(&self) -> ReactPhase {
        match self {
            ReactEvent::Progress { phase, .. } => *phase,
        }
    }
}
