//! 固定工具集
//!
//! 模型只能调用这七个工具；名称解析大小写不敏感，忽略 `_` / `-`，并兼容旧版 camelCase 名称。
//! 解析不出的名称由调用方转为失败结果，不会中断循环。

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    CreateSourceFile,
    CreateFile,
    CompileAndCheck,
    GetDiagnostics,
    VcsCommand,
    BuildProject,
    AnalyzeCode,
}

impl ToolKind {
    pub const ALL: [ToolKind; 7] = [
        ToolKind::CreateSourceFile,
        ToolKind::CreateFile,
        ToolKind::CompileAndCheck,
        ToolKind::GetDiagnostics,
        ToolKind::VcsCommand,
        ToolKind::BuildProject,
        ToolKind::AnalyzeCode,
    ];

    /// 规范名（写入 prompt 与审计日志）
    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::CreateSourceFile => "create_source_file",
            ToolKind::CreateFile => "create_file",
            ToolKind::CompileAndCheck => "compile_and_check",
            ToolKind::GetDiagnostics => "get_diagnostics",
            ToolKind::VcsCommand => "vcs_command",
            ToolKind::BuildProject => "build_project",
            ToolKind::AnalyzeCode => "analyze_code",
        }
    }

    /// 旧版名称（归一化后）
    fn aliases(&self) -> &'static [&'static str] {
        match self {
            ToolKind::CreateSourceFile => &["createjavaclass", "createclass", "createsource"],
            ToolKind::CreateFile => &["writefile"],
            ToolKind::CompileAndCheck => &["compileandcheckerrors", "compile", "checkcompilation"],
            ToolKind::GetDiagnostics => &["getcompilationdiagnostics", "diagnostics"],
            ToolKind::VcsCommand => &["executegitcommand", "gitcommand", "runversioncontrolcommand", "git"],
            ToolKind::BuildProject => &["build"],
            ToolKind::AnalyzeCode => &["analyze", "analysecode"],
        }
    }

    pub fn from_name(name: &str) -> Option<ToolKind> {
        let normalized: String = name
            .trim()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .map(|c| c.to_ascii_lowercase())
            .collect();
        if normalized.is_empty() {
            return None;
        }
        ToolKind::ALL.iter().copied().find(|kind| {
            kind.name().replace('_', "") == normalized || kind.aliases().contains(&normalized.as_str())
        })
    }

    /// 必填参数
    pub fn required_params(&self) -> &'static [&'static str] {
        match self {
            ToolKind::CreateSourceFile => &["className", "filePath", "content"],
            ToolKind::CreateFile => &["filePath", "content"],
            ToolKind::CompileAndCheck | ToolKind::GetDiagnostics => &[],
            ToolKind::VcsCommand => &["operation"],
            ToolKind::BuildProject => &["operation"],
            ToolKind::AnalyzeCode => &[],
        }
    }

    /// 会改动源码的工具，成功后需要编译校验
    pub fn modifies_code(&self) -> bool {
        matches!(self, ToolKind::CreateSourceFile | ToolKind::CreateFile)
    }

    fn usage(&self) -> &'static str {
        match self {
            ToolKind::CreateSourceFile => {
                r#"Create a source file for a type. Parameters: {"className": "Calculator", "filePath": "src/Calculator.java", "content": "..."}"#
            }
            ToolKind::CreateFile => {
                r#"Create any text file. Parameters: {"filePath": "README.md", "content": "..."}"#
            }
            ToolKind::CompileAndCheck => "Compile the project and report whether it builds. Parameters: {}",
            ToolKind::GetDiagnostics => "Return the current compiler diagnostics. Parameters: {}",
            ToolKind::VcsCommand => {
                r#"Run a version control command. Parameters: {"operation": "status|diff|log|add|commit|branch|show", "parameters": "extra arguments or commit message"}"#
            }
            ToolKind::BuildProject => {
                r#"Run a build step. Parameters: {"operation": "compile|build|test|check|clean"}"#
            }
            ToolKind::AnalyzeCode => {
                r#"Analyze source files (read-only). Parameters: {"request": "what to look for", "scope": "project or a glob like src/**/*.rs"}"#
            }
        }
    }

    /// 工具目录，拼入 ReAct 指令块
    pub fn catalog() -> String {
        ToolKind::ALL
            .iter()
            .map(|kind| format!("- {}: {}", kind.name(), kind.usage()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_names_round_trip() {
        for kind in ToolKind::ALL {
            assert_eq!(ToolKind::from_name(kind.name()), Some(kind));
        }
    }

    #[test]
    fn test_name_matching_is_tolerant() {
        assert_eq!(ToolKind::from_name("CREATE-FILE"), Some(ToolKind::CreateFile));
        assert_eq!(ToolKind::from_name("createFile"), Some(ToolKind::CreateFile));
        assert_eq!(ToolKind::from_name("createJavaClass"), Some(ToolKind::CreateSourceFile));
        assert_eq!(ToolKind::from_name("executeGitCommand"), Some(ToolKind::VcsCommand));
        assert_eq!(
            ToolKind::from_name("getCompilationDiagnostics"),
            Some(ToolKind::GetDiagnostics)
        );
        assert_eq!(ToolKind::from_name(" analyzeCode "), Some(ToolKind::AnalyzeCode));
        assert_eq!(ToolKind::from_name("deploy_to_prod"), None);
        assert_eq!(ToolKind::from_name(""), None);
    }

    #[test]
    fn test_only_file_creation_modifies_code() {
        let modifying: Vec<_> = ToolKind::ALL.iter().filter(|k| k.modifies_code()).collect();
        assert_eq!(modifying, vec![&ToolKind::CreateSourceFile, &ToolKind::CreateFile]);
    }

    #[test]
    fn test_catalog_lists_every_tool() {
        let catalog = ToolKind::catalog();
        for kind in ToolKind::ALL {
            assert!(catalog.contains(kind.name()));
        }
    }
}
