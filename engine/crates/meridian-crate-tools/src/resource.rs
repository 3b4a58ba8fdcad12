use std::path::{Path, PathBuf};

/// 统一路径管理
///
/// 所有路径基于工作区根目录（通过 `CARGO_MANIFEST_DIR` 推导），避免硬编码相对路径。
///
/// # 使用示例
/// ```ignore
/// let config = MeridianPath::config_path("stream.toml"); // config/stream.toml
/// ```
pub struct MeridianPath {}
impl MeridianPath {
    /// 获取 `config/` 目录下的文件路径
    pub fn config_path(filename: &str) -> PathBuf {
        Self::workspace_path().join("config").join(filename)
    }

    /// 获取工作区根目录
    pub fn workspace_path() -> PathBuf {
        // 从 engine/crates/meridian-crate-tools 向上三级
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .ancestors()
            .nth(3)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn target_path() -> PathBuf {
        Self::workspace_path().join("target")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_path_contains_engine_dir() {
        let root = MeridianPath::workspace_path();
        assert!(root.join("engine").join("crates").join("meridian-crate-tools").exists());
    }

    #[test]
    fn test_config_path_is_under_workspace() {
        let path = MeridianPath::config_path("stream.toml");
        assert!(path.starts_with(MeridianPath::workspace_path()));
        assert!(path.ends_with("config/stream.toml"));
    }

    #[test]
    fn test_target_path_is_workspace_target() {
        assert_eq!(MeridianPath::target_path(), MeridianPath::workspace_path().join("target"));
    }
}
