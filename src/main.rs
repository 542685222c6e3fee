//! Anvil 命令行入口
//!
//! - `anvil plan <request>`：打印规划出的任务
//! - `anvil run <request>`：运行 ReAct 循环并打印结果

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use anvil::config::load_config;
use anvil::llm::{LlmClient, ModelHandle};
use anvil::tools::{DevTools, WorkspaceTools};
use anvil::validation::CompileValidator;
use anvil::{ReActLoopController, TaskPlanner};

const USAGE: &str = "usage: anvil <plan|run> <request>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    anvil::observability::init();

    let mut args = std::env::args().skip(1);
    let command = args.next().unwrap_or_default();
    let request = args.collect::<Vec<_>>().join(" ");
    if request.trim().is_empty() {
        bail!(USAGE);
    }

    let config = load_config(None).context("Failed to load config")?;
    let model: Arc<dyn LlmClient> = Arc::new(ModelHandle::from_section(&config.llm));

    match command.as_str() {
        "plan" => {
            let planner = TaskPlanner::from_config(model, &config.planner);
            for (i, task) in planner.plan_tasks(&request).await.iter().enumerate() {
                println!(
                    "{}. [{} / {}] {}",
                    i + 1,
                    task.task_type(),
                    task.priority(),
                    task.description()
                );
            }
        }
        "run" => {
            let workspace = config.app.workspace_root();
            std::fs::create_dir_all(&workspace)
                .with_context(|| format!("Failed to create workspace {}", workspace.display()))?;

            let tools: Arc<dyn DevTools> = Arc::new(WorkspaceTools::from_config(&config.tools));
            let validator = Arc::new(CompileValidator::new(tools.clone()));
            let controller = Arc::new(
                ReActLoopController::new(model, tools, validator, &workspace)
                    .with_config(&config.react)
                    .with_tool_timeout(config.tools.tool_timeout_secs.map(Duration::from_secs)),
            );

            let run = controller.clone().spawn_loop(request);
            tokio::pin!(run);
            let result = tokio::select! {
                joined = &mut run => joined.context("ReAct loop task failed")?,
                _ = tokio::signal::ctrl_c() => {
                    controller.cancel();
                    run.await.context("ReAct loop task failed")?
                }
            };

            println!("{}", result.user_message());
            tracing::debug!("{}", result.context().full_history());
            tracing::debug!("{}", result.summary());
        }
        _ => bail!(USAGE),
    }

    Ok(())
}
