//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `ANVIL__*` 覆盖（双下划线表示嵌套，如 `ANVIL__REACT__MAX_ITERATIONS=5`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub react: ReactSection,
    pub planner: PlannerSection,
    pub tools: ToolsSection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    /// 工具读写的根目录，未设置时用 ./workspace
    pub workspace_root: Option<PathBuf>,
}

impl AppSection {
    pub fn workspace_root(&self) -> PathBuf {
        self.workspace_root
            .clone()
            .unwrap_or_else(|| PathBuf::from("workspace"))
    }
}

/// [llm] 段：OpenAI 兼容端点
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    /// 存放 API Key 的环境变量名
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: None,
            api_key_env: default_api_key_env(),
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

/// [react] 段：迭代预算与超时
#[derive(Debug, Clone, Deserialize)]
pub struct ReactSection {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// 单次 Think（模型调用）超时（秒）
    #[serde(default = "default_think_timeout_secs")]
    pub think_timeout_secs: u64,
    /// 整个循环的墙钟上限（秒）
    #[serde(default = "default_run_timeout_secs")]
    pub run_timeout_secs: u64,
}

impl Default for ReactSection {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            think_timeout_secs: default_think_timeout_secs(),
            run_timeout_secs: default_run_timeout_secs(),
        }
    }
}

impl ReactSection {
    pub fn think_timeout(&self) -> Duration {
        Duration::from_secs(self.think_timeout_secs)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }
}

fn default_max_iterations() -> usize {
    10
}

fn default_think_timeout_secs() -> u64 {
    120
}

fn default_run_timeout_secs() -> u64 {
    120
}

/// [planner] 段
#[derive(Debug, Clone, Deserialize)]
pub struct PlannerSection {
    #[serde(default = "default_planner_timeout_secs")]
    pub timeout_secs: u64,
    /// false 时直接走关键词分类，不调用模型
    #[serde(default = "default_true")]
    pub use_model: bool,
}

impl Default for PlannerSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_planner_timeout_secs(),
            use_model: true,
        }
    }
}

fn default_planner_timeout_secs() -> u64 {
    120
}

fn default_true() -> bool {
    true
}

/// [tools] 段：构建命令、Git 白名单、分析上限
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）；未设置时不限制
    pub tool_timeout_secs: Option<u64>,
    #[serde(default = "default_build_program")]
    pub build_program: String,
    /// 编译检查参数（compile_and_check / get_diagnostics / 自动校验）
    #[serde(default = "default_check_args")]
    pub check_args: Vec<String>,
    #[serde(default = "default_allowed_vcs_operations")]
    pub allowed_vcs_operations: Vec<String>,
    #[serde(default = "default_max_analyzed_files")]
    pub max_analyzed_files: usize,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: None,
            build_program: default_build_program(),
            check_args: default_check_args(),
            allowed_vcs_operations: default_allowed_vcs_operations(),
            max_analyzed_files: default_max_analyzed_files(),
        }
    }
}

fn default_build_program() -> String {
    "cargo".to_string()
}

fn default_check_args() -> Vec<String> {
    vec!["check".into(), "--message-format".into(), "short".into()]
}

fn default_allowed_vcs_operations() -> Vec<String> {
    vec![
        "status".into(),
        "diff".into(),
        "log".into(),
        "add".into(),
        "commit".into(),
        "branch".into(),
        "show".into(),
    ]
}

fn default_max_analyzed_files() -> usize {
    200
}

/// 从 config 目录加载配置，环境变量 ANVIL__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 ANVIL__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("ANVIL")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("tools.check_args")
            .with_list_parse_key("tools.allowed_vcs_operations")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

/// 重新从磁盘与环境变量加载配置（设置变更后调用，再把新的 [llm] 段交给 ModelHandle::reload）
pub fn reload_config() -> Result<AppConfig, config::ConfigError> {
    load_config(None)
}
