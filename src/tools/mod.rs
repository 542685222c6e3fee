//! 工具层：固定工具集、能力抽象、分发器与工作区实现

pub mod executor;
pub mod kind;
pub mod toolbox;
pub mod workspace;

pub use executor::ToolDispatcher;
pub use kind::ToolKind;
pub use toolbox::{DevTools, ExecutionEnv};
pub use workspace::WorkspaceTools;
