use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// AssetManager 的配置，可以从 TOML 文件读取，缺省的字段使用默认值
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetManagerConfig {
    /// worker 线程数量
    pub worker_count: usize,
    /// 加载任务队列的容量
    pub work_queue_capacity: usize,
    /// worker 交还录制结果的队列容量
    pub submission_queue_capacity: usize,
    /// 同时在 GPU 上执行的帧数，决定了 release 之后多少帧才真正销毁
    pub frames_in_flight: u64,
    /// AssetTable 的 bucket 数量
    pub table_buckets: usize,
    /// bindless texture 数组的大小
    pub max_bindless_textures: u32,
    /// worker 线程名前缀，线程名为 `{prefix}-{id}`
    pub thread_name_prefix: String,
}

impl Default for AssetManagerConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            work_queue_capacity: 64,
            submission_queue_capacity: 10,
            frames_in_flight: 3,
            table_buckets: 1024,
            max_bindless_textures: 5000,
            thread_name_prefix: "Asset-Loader".to_string(),
        }
    }
}

impl AssetManagerConfig {
    /// 从 TOML 文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("读取配置文件失败: {:?}", path.as_ref()))?;
        Self::from_toml_str(&content).with_context(|| format!("解析 TOML 配置失败: {:?}", path.as_ref()))
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: AssetManagerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.worker_count > 0, "worker_count must be positive");
        anyhow::ensure!(self.work_queue_capacity > 0, "work_queue_capacity must be positive");
        anyhow::ensure!(self.submission_queue_capacity > 0, "submission_queue_capacity must be positive");
        anyhow::ensure!(self.frames_in_flight > 0, "frames_in_flight must be positive");
        anyhow::ensure!(self.table_buckets > 0, "table_buckets must be positive");
        anyhow::ensure!(self.max_bindless_textures > 0, "max_bindless_textures must be positive");
        Ok(())
    }
}
