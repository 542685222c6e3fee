//! 任务层：任务模型、执行结果与规划器

pub mod extract;
pub mod fallback;
pub mod model;
pub mod planner;
pub mod result;

pub use model::{Task, TaskPriority, TaskStatus, TaskType};
pub use planner::{parse_plan_response, PlanAnalysis, TaskPlanner, TaskSpec};
pub use result::TaskResult;
