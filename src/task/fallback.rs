//! 关键词兜底规划
//!
//! 模型不可用或输出无法解析时使用：对请求小写化后按子串匹配各类意图，每命中一类产出一个任务；
//! 一个都没命中时产出一个通用 COMPOSITE 任务，保证至少一个任务。

use crate::task::{Task, TaskPriority, TaskType};

struct KeywordRule {
    keywords: &'static [&'static str],
    build: fn(&str) -> Task,
}

const RULES: &[KeywordRule] = &[
    KeywordRule {
        keywords: &["analyze", "analyse", "check", "inspect", "review"],
        build: analysis_task,
    },
    KeywordRule {
        keywords: &["refactor", "optimize", "optimise", "improve", "clean up"],
        build: refactoring_task,
    },
    KeywordRule {
        keywords: &["test", "junit", "unit test"],
        build: test_generation_task,
    },
    KeywordRule {
        keywords: &["doc", "comment", "javadoc", "rustdoc"],
        build: documentation_task,
    },
    KeywordRule {
        keywords: &["fix", "bug", "error", "crash", "broken"],
        build: bug_fix_task,
    },
];

/// 按关键词规划；结果非空
pub fn plan_by_keywords(request: &str) -> Vec<Task> {
    let normalized = request.trim().to_lowercase();
    let mut tasks: Vec<Task> = RULES
        .iter()
        .filter(|rule| rule.keywords.iter().any(|k| normalized.contains(k)))
        .map(|rule| (rule.build)(request))
        .collect();

    if tasks.is_empty() {
        tasks.push(generic_task(request));
    }
    tracing::info!(count = tasks.len(), "Planned tasks with keyword analysis");
    tasks
}

/// 原样包装请求的通用任务
pub fn generic_task(request: &str) -> Task {
    Task::new(format!("Handle request: {request}"), TaskType::Composite)
        .with_parameter("request", request)
}

fn analysis_task(request: &str) -> Task {
    Task::new(format!("Analyze code: {request}"), TaskType::CodeAnalysis)
        .with_parameter("request", request)
        .with_parameter("scope", "project")
}

fn refactoring_task(request: &str) -> Task {
    Task::new(format!("Refactor code: {request}"), TaskType::CodeModification)
        .with_priority(TaskPriority::High)
        .with_parameter("request", request)
        .with_parameter("backup", true)
}

fn test_generation_task(request: &str) -> Task {
    Task::new(format!("Generate tests: {request}"), TaskType::CodeModification)
        .with_parameter("request", request)
        .with_parameter("testType", "unit")
        .with_parameter("framework", "junit")
}

fn documentation_task(request: &str) -> Task {
    Task::new(format!("Write documentation: {request}"), TaskType::CodeModification)
        .with_priority(TaskPriority::Low)
        .with_parameter("request", request)
        .with_parameter("format", "javadoc")
}

fn bug_fix_task(request: &str) -> Task {
    Task::new(format!("Fix bug: {request}"), TaskType::CodeModification)
        .with_priority(TaskPriority::Critical)
        .with_parameter("request", request)
        .with_parameter("backup", true)
        .with_parameter("validate", true)
}
