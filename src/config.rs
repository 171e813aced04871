//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `SKYAGENT__*` 覆盖（双下划线表示嵌套，如
//! `SKYAGENT__DISPATCH__TRANSPORT=local`；命令列表以空格分隔），最后 `ORCHESTRATOR_API_URL`
//! 非空时覆盖 remote.api_url。

use std::path::PathBuf;

use serde::Deserialize;

use crate::transport::local::{
    default_fallback_command, default_primary_command, DEFAULT_WORKSPACE_DIR,
};
use crate::transport::remote::DEFAULT_ENDPOINT;
use crate::transport::TransportKind;

/// 编排器端点环境变量
pub const ORCHESTRATOR_API_URL_ENV: &str = "ORCHESTRATOR_API_URL";

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub dispatch: DispatchSection,
    pub remote: RemoteSection,
    pub local: LocalSection,
}

/// [dispatch] 段：选择通道
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DispatchSection {
    pub transport: TransportKind,
}

/// [remote] 段：编排器 API 地址
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteSection {
    pub api_url: String,
}

impl Default for RemoteSection {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_ENDPOINT.to_string(),
        }
    }
}

/// [local] 段：工作目录、主命令与备用命令（argv 形式，不经 shell）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocalSection {
    pub workspace_dir: PathBuf,
    pub primary_command: Vec<String>,
    pub fallback_command: Vec<String>,
}

impl Default for LocalSection {
    fn default() -> Self {
        Self {
            workspace_dir: PathBuf::from(DEFAULT_WORKSPACE_DIR),
            primary_command: default_primary_command(),
            fallback_command: default_fallback_command(),
        }
    }
}

impl AppConfig {
    /// 用外部变量覆盖（lookup 一般是 std::env::var）；空值忽略
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ORCHESTRATOR_API_URL_ENV).filter(|v| !v.is_empty()) {
            self.remote.api_url = url;
        }
    }
}

/// 从 config 目录加载配置，环境变量可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 叠加环境变量 SKYAGENT__*
/// 4. ORCHESTRATOR_API_URL 覆盖端点
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
        config::Environment::with_prefix("SKYAGENT")
            .separator("__")
            .list_separator(" ")
            .with_list_parse_key("local.primary_command")
            .with_list_parse_key("local.fallback_command")
            .try_parsing(true),
    );

    let mut cfg: AppConfig = builder.build()?.try_deserialize()?;
    cfg.apply_overrides(|key| std::env::var(key).ok());
    Ok(cfg)
}
