//! 管线调度配置模块
//!
//! 提供改写管线的调度参数配置，支持从YAML文件加载。

use crate::epub::error::{EpubError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

/// 默认配置文件路径
const DEFAULT_CONFIG_PATH: &str = "pipeline.yaml";

fn default_worker_threads() -> usize {
    3
}

fn default_wait_timeout_secs() -> u64 {
    60
}

/// 改写管线的调度配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// 工作线程池大小
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
    /// 提交后等待在途任务完成的最长秒数
    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
            wait_timeout_secs: default_wait_timeout_secs(),
        }
    }
}

impl PipelineConfig {
    /// 从默认配置文件中加载调度配置
    ///
    /// 配置文件默认为当前目录下的 `pipeline.yaml`
    ///
    /// # 返回值
    /// * `Result<Self>` - 加载成功返回配置实例，失败返回错误
    pub fn from_file() -> Result<Self> {
        let content = fs::read_to_string(DEFAULT_CONFIG_PATH)
            .map_err(|e| EpubError::ConfigError(format!("无法读取配置文件: {}", e)))?;

        serde_yml::from_str(&content)
            .map_err(|e| EpubError::ConfigError(format!("配置文件格式错误: {}", e)))
    }

    /// 生成默认配置文件到当前目录
    ///
    /// # 返回值
    /// * `Result<()>` - 生成成功返回Ok，失败返回错误
    pub fn generate_default_config() -> Result<()> {
        let yaml_content = serde_yml::to_string(&Self::default())
            .map_err(|e| EpubError::ConfigError(format!("序列化配置失败: {}", e)))?;

        let content_with_header = format!(
            "# 改写管线调度配置文件\n# worker_threads: 工作线程池大小\n# wait_timeout_secs: 等待在途任务完成的最长秒数\n\n{}",
            yaml_content
        );

        fs::write(DEFAULT_CONFIG_PATH, content_with_header)
            .map_err(|e| EpubError::ConfigError(format!("写入配置文件失败: {}", e)))?;

        Ok(())
    }

    /// 尝试从默认配置文件加载，文件不存在时使用默认配置
    pub fn new() -> Self {
        Self::from_file().unwrap_or_default()
    }

    /// 等待超时时长
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.worker_threads, 3);
        assert_eq!(config.wait_timeout_secs, 60);
        assert_eq!(config.wait_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_partial_yaml_uses_field_defaults() {
        let config: PipelineConfig = serde_yml::from_str("worker_threads: 5\n").unwrap();
        assert_eq!(config.worker_threads, 5);
        assert_eq!(config.wait_timeout_secs, 60);
    }
}
