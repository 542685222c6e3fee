//! 工具能力抽象
//!
//! DevTools 为每个固定工具提供一个类型化方法；参数已由 ToolDispatcher 从模型给出的参数表中取出。
//! 返回值约定与旧工具一致：成功文本或失败文本。

use std::path::{Path, PathBuf};

use async_trait::async_trait;

/// 执行环境：工具操作的工作区与所属会话，循环本身不解读其内容
#[derive(Debug, Clone)]
pub struct ExecutionEnv {
    workspace_root: PathBuf,
    session_id: String,
}

impl ExecutionEnv {
    pub fn new(workspace_root: impl AsRef<Path>) -> Self {
        Self {
            workspace_root: workspace_root.as_ref().to_path_buf(),
            session_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

#[async_trait]
pub trait DevTools: Send + Sync {
    async fn create_source_file(
        &self,
        env: &ExecutionEnv,
        class_name: &str,
        file_path: &str,
        content: &str,
    ) -> Result<String, String>;

    async fn create_file(
        &self,
        env: &ExecutionEnv,
        file_path: &str,
        content: &str,
    ) -> Result<String, String>;

    /// 编译检查；失败时返回编译输出
    async fn compile_and_check(&self, env: &ExecutionEnv) -> Result<String, String>;

    /// 当前诊断信息全文
    async fn get_diagnostics(&self, env: &ExecutionEnv) -> Result<String, String>;

    async fn vcs_command(
        &self,
        env: &ExecutionEnv,
        operation: &str,
        parameters: &str,
    ) -> Result<String, String>;

    async fn build_project(&self, env: &ExecutionEnv, operation: &str) -> Result<String, String>;

    async fn analyze_code(
        &self,
        env: &ExecutionEnv,
        request: &str,
        scope: &str,
    ) -> Result<String, String>;
}
