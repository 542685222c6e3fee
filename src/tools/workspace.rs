//! 基于本地工作区的工具实现
//!
//! - 写文件：只允许工作区内的相对路径（拒绝绝对路径与 `..`），自动创建父目录
//! - 编译 / 构建：tokio::process 调用配置的构建程序（默认 cargo）
//! - 版本控制：git，只放行白名单内的操作
//! - 代码分析：walkdir 遍历 + glob 过滤，按扩展名统计文件数与行数，并列出标记行

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::ToolsSection;
use crate::core::AgentError;
use crate::tools::{DevTools, ExecutionEnv};

const MARKERS: [&str; 3] = ["TODO", "FIXME", ".unwrap()"];
const MAX_MARKER_LINES: usize = 20;
const MAX_FILE_SIZE: u64 = 1024 * 1024;

pub struct WorkspaceTools {
    build_program: String,
    check_args: Vec<String>,
    allowed_vcs_operations: Vec<String>,
    max_analyzed_files: usize,
}

impl WorkspaceTools {
    pub fn from_config(config: &ToolsSection) -> Self {
        Self {
            build_program: config.build_program.clone(),
            check_args: config.check_args.clone(),
            allowed_vcs_operations: config
                .allowed_vcs_operations
                .iter()
                .map(|op| op.to_lowercase())
                .collect(),
            max_analyzed_files: config.max_analyzed_files,
        }
    }

    async fn write_file(&self, env: &ExecutionEnv, file_path: &str, content: &str) -> Result<PathBuf, String> {
        let target = resolve_relative(env.workspace_root(), file_path).map_err(|e| e.to_string())?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| format!("Failed to create directory {}: {}", parent.display(), e))?;
        }
        tokio::fs::write(&target, content)
            .await
            .map_err(|e| format!("Write failed for {}: {}", file_path, e))?;
        tracing::info!(path = %target.display(), bytes = content.len(), "File written");
        Ok(target)
    }

    async fn run_build(&self, env: &ExecutionEnv, args: &[String]) -> Result<CommandOutput, String> {
        run_command(&self.build_program, args, env.workspace_root()).await
    }
}

/// 命令输出（stdout + stderr 合并）
struct CommandOutput {
    success: bool,
    text: String,
}

async fn run_command(program: &str, args: &[String], cwd: &Path) -> Result<CommandOutput, String> {
    tracing::debug!(program = %program, ?args, cwd = %cwd.display(), "Running command");
    let output = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .output()
        .await
        .map_err(|e| format!("Failed to run {}: {}", program, e))?;

    let mut text = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&stderr);
    }
    Ok(CommandOutput {
        success: output.status.success(),
        text,
    })
}

/// 解析工作区内的相对路径；绝对路径、`..`、空路径一律拒绝
pub fn resolve_relative(root: &Path, file_path: &str) -> Result<PathBuf, AgentError> {
    let trimmed = file_path.trim();
    let path = Path::new(trimmed);
    if trimmed.is_empty() {
        return Err(AgentError::ToolExecutionFailed("Empty file path".into()));
    }
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(AgentError::PathEscape(trimmed.to_string()));
    }
    Ok(root.join(path))
}

/// git 参数不得把输出写到别处，也不得指向工作区外
fn check_vcs_argument(arg: &str) -> Result<(), String> {
    let lowered = arg.to_lowercase();
    let redirects = lowered.starts_with("--output") || (lowered.starts_with("-o") && !lowered.starts_with("--"));
    let outside = lowered == "--no-index"
        || Path::new(arg).is_absolute()
        || arg.split(['=', '/', '\\']).any(|part| part == "..");
    if redirects || outside {
        return Err(format!("Git argument '{}' is not allowed", arg));
    }
    Ok(())
}

#[async_trait]
impl DevTools for WorkspaceTools {
    async fn create_source_file(
        &self,
        env: &ExecutionEnv,
        class_name: &str,
        file_path: &str,
        content: &str,
    ) -> Result<String, String> {
        if content.trim().is_empty() {
            return Err(format!("Refusing to create {} with empty content", class_name));
        }
        self.write_file(env, file_path, content).await?;
        Ok(format!(
            "Created source file for {} at {} ({} lines)",
            class_name,
            file_path,
            content.lines().count()
        ))
    }

    async fn create_file(&self, env: &ExecutionEnv, file_path: &str, content: &str) -> Result<String, String> {
        self.write_file(env, file_path, content).await?;
        Ok(format!("Created file {} ({} bytes)", file_path, content.len()))
    }

    async fn compile_and_check(&self, env: &ExecutionEnv) -> Result<String, String> {
        let output = self.run_build(env, &self.check_args).await?;
        if output.success {
            Ok("Compilation successful".to_string())
        } else {
            Err(format!("Compilation failed\n{}", output.text))
        }
    }

    async fn get_diagnostics(&self, env: &ExecutionEnv) -> Result<String, String> {
        let output = self.run_build(env, &self.check_args).await?;
        if output.text.trim().is_empty() {
            Ok("No diagnostics".to_string())
        } else {
            Ok(output.text)
        }
    }

    async fn vcs_command(&self, env: &ExecutionEnv, operation: &str, parameters: &str) -> Result<String, String> {
        let operation = operation.trim().to_lowercase();
        if !self.allowed_vcs_operations.contains(&operation) {
            return Err(format!(
                "Git operation '{}' is not allowed (allowed: {})",
                operation,
                self.allowed_vcs_operations.join(", ")
            ));
        }

        let mut args = vec![operation.clone()];
        match operation.as_str() {
            "commit" => {
                if parameters.trim().is_empty() {
                    return Err("git commit requires a message in 'parameters'".to_string());
                }
                args.push("-m".to_string());
                args.push(parameters.trim().to_string());
            }
            "add" if parameters.trim().is_empty() => args.push(".".to_string()),
            _ => {
                for arg in parameters.split_whitespace() {
                    check_vcs_argument(arg)?;
                    args.push(arg.to_string());
                }
            }
        }

        let output = run_command("git", &args, env.workspace_root()).await?;
        if output.success {
            let text = output.text.trim();
            Ok(if text.is_empty() {
                format!("git {} completed", operation)
            } else {
                format!("git {}:\n{}", operation, text)
            })
        } else {
            Err(format!("git {} failed: {}", operation, output.text.trim()))
        }
    }

    async fn build_project(&self, env: &ExecutionEnv, operation: &str) -> Result<String, String> {
        let args: Vec<String> = match operation.trim().to_lowercase().as_str() {
            "compile" | "build" => vec!["build".to_string()],
            "test" => vec!["test".to_string()],
            "check" => self.check_args.clone(),
            "clean" => vec!["clean".to_string()],
            other => return Err(format!("Unsupported build operation: {}", other)),
        };
        let output = self.run_build(env, &args).await?;
        let head = if output.success { "✓ PASSED" } else { "✗ FAILED" };
        let report = format!("Build {}: {}\n\n{}", operation, head, output.text);
        if output.success {
            Ok(report)
        } else {
            Err(report)
        }
    }

    async fn analyze_code(&self, env: &ExecutionEnv, request: &str, scope: &str) -> Result<String, String> {
        let root = env.workspace_root().to_path_buf();
        let scope = scope.trim().to_string();
        let limit = self.max_analyzed_files;
        let report = tokio::task::spawn_blocking(move || analyze_tree(&root, &scope, limit))
            .await
            .map_err(|e| format!("Analysis task failed: {}", e))??;
        Ok(if request.trim().is_empty() {
            report
        } else {
            format!("Analysis for: {}\n{}", request.trim(), report)
        })
    }
}

#[derive(Default)]
struct ExtensionStats {
    files: usize,
    lines: usize,
}

fn analyze_tree(root: &Path, scope: &str, limit: usize) -> Result<String, String> {
    if !root.is_dir() {
        return Err(format!("Workspace {} does not exist", root.display()));
    }
    let pattern = match scope {
        "" | "project" | "." => None,
        text => Some(glob::Pattern::new(text).map_err(|e| format!("Invalid scope pattern '{}': {}", text, e))?),
    };

    let mut stats: BTreeMap<String, ExtensionStats> = BTreeMap::new();
    let mut markers = Vec::new();
    let mut analyzed = 0usize;
    let mut truncated = false;

    for entry in walkdir::WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            e.depth() == 0 || (!name.starts_with('.') && name != "target" && name != "node_modules")
        })
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        if let Some(pattern) = &pattern {
            if !pattern.matches_path(relative) {
                continue;
            }
        }
        if entry.metadata().map(|m| m.len() > MAX_FILE_SIZE).unwrap_or(true) {
            continue;
        }
        if analyzed >= limit {
            truncated = true;
            break;
        }
        let Ok(content) = std::fs::read_to_string(entry.path()) else {
            continue;
        };
        analyzed += 1;

        let ext = relative
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_else(|| "(none)".to_string());
        let slot = stats.entry(ext).or_default();
        slot.files += 1;
        slot.lines += content.lines().count();

        for (n, line) in content.lines().enumerate() {
            if markers.len() < MAX_MARKER_LINES && MARKERS.iter().any(|m| line.contains(m)) {
                markers.push(format!("{}:{}: {}", relative.display(), n + 1, line.trim()));
            }
        }
    }

    let mut report = format!("Analyzed {} file(s) in scope '{}'", analyzed, if scope.is_empty() { "project" } else { scope });
    if truncated {
        report.push_str(&format!(" (stopped at limit {})", limit));
    }
    report.push('\n');
    for (ext, s) in &stats {
        report.push_str(&format!("- .{}: {} file(s), {} line(s)\n", ext, s.files, s.lines));
    }
    if markers.is_empty() {
        report.push_str("No TODO/FIXME/unwrap markers found");
    } else {
        report.push_str("Markers:\n");
        report.push_str(&markers.join("\n"));
    }
    Ok(report)
}
