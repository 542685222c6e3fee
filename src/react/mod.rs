//! ReAct 层：运行上下文、思考解析、主循环与结果

pub mod context;
pub mod events;
pub mod loop_;
pub mod result;
pub mod schema;
pub mod thinking;

pub use context::{ActionStep, ObservationStep, ReActContext, ThinkingOutcome, ThinkingStep};
pub use events::{ReactEvent, ReactPhase};
pub use loop_::{ReActLoopController, MAX_ITERATIONS, RUN_TIMEOUT, THINK_TIMEOUT};
pub use result::{ReActResult, ReActStatus};
pub use thinking::{parse_thinking, AgentAction, AgentResponse, ProposedAction, Thought};
