// progress_stream_utils/src/config.rs

//! 进度流客户端的配置。
//!
//! 配置保存在 JSON 文件 `archon_stream.json` 中，查找顺序：
//! 1. 当前工作目录下已存在的 `archon_stream.json`；
//! 2. `$HOME/.config/archon_stream/archon_stream.json`；
//! 3. 都不可用时退回当前工作目录。
//!
//! 文件不存在时以默认配置创建。加载后再应用环境变量覆盖
//! (`ARCHON_WS_BASE_URL`、`ARCHON_LOG_LEVEL`)。

use crate::client::reconnect::{DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_MAX_RECONNECT_DELAY, DEFAULT_RECONNECT_DELAY};
use crate::client::liveness::DEFAULT_LIVENESS_TIMEOUT;
use crate::error::ConfigError;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use url::Url;

/// 配置文件名。
pub const CONFIG_FILE_NAME: &str = "archon_stream.json";
/// 后端 WebSocket 服务的默认基础地址。
pub const DEFAULT_BASE_URL: &str = "ws://localhost:8181";
/// 默认日志级别。
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// 覆盖 `base_url` 的环境变量。
pub const BASE_URL_ENV: &str = "ARCHON_WS_BASE_URL";
/// 覆盖 `log_level` 的环境变量。
pub const LOG_LEVEL_ENV: &str = "ARCHON_LOG_LEVEL";

/// 进度流客户端配置。缺失的字段取默认值。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct StreamConfig {
    /// 后端基础地址，可以是 `ws`/`wss`，也可以是 `http`/`https` (会被映射为 `ws`/`wss`)。
    pub base_url: String,
    /// 日志级别 (`error`/`warn`/`info`/`debug`/`trace`)，由使用方在初始化日志时读取。
    pub log_level: String,
    /// 异常断开后是否自动重连。
    pub auto_reconnect: bool,
    /// 重连基础延迟 (毫秒)。
    pub reconnect_delay_ms: u64,
    /// 重连延迟上限 (毫秒)。
    pub max_reconnect_delay_ms: u64,
    /// 两次成功打开之间最多重连次数。
    pub max_reconnect_attempts: u32,
    /// 活跃度超时 (毫秒)，超时只记录警告。
    pub liveness_timeout_ms: u64,
    /// 客户端主动发送 `ping` 的间隔 (毫秒)，缺省为不发送。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keepalive_interval_ms: Option<u64>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            auto_reconnect: true,
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY.as_millis() as u64,
            max_reconnect_delay_ms: DEFAULT_MAX_RECONNECT_DELAY.as_millis() as u64,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            liveness_timeout_ms: DEFAULT_LIVENESS_TIMEOUT.as_millis() as u64,
            keepalive_interval_ms: None,
        }
    }
}

impl StreamConfig {
    /// 从指定路径加载配置；文件不存在时写入并返回默认配置。
    ///
    /// 文件存在但内容无法解析时返回 `ConfigError::Parse`，不会覆盖用户的文件。
    ///
    /// # Arguments
    /// * `path` - 配置文件路径。
    ///
    /// # Returns
    /// * `Ok(StreamConfig)` - 文件中的配置 (缺失字段取默认值) 或新写入的默认配置。
    /// * `Err(ConfigError)` - 读取、解析或写入失败。
    pub fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!("[配置模块] 未在 {:?} 找到配置文件，将使用默认配置并创建新文件。", path);
            let config = Self::default();
            config.save(path)?;
            return Ok(config);
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        info!("[配置模块] 已成功从配置文件 {:?} 加载配置。", path);
        Ok(config)
    }

    /// 以美化后的 JSON 保存配置，必要时创建父目录。
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_error = |reason: String| ConfigError::Write { path: path.display().to_string(), reason };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| write_error(e.to_string()))?;
            }
        }
        let content = serde_json::to_string_pretty(self).map_err(|e| write_error(e.to_string()))?;
        fs::write(path, content).map_err(|e| write_error(e.to_string()))?;
        info!("[配置模块] 已将配置保存到 {:?}。", path);
        Ok(())
    }

    /// 应用进程环境变量中的覆盖项。
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| env::var(key).ok());
    }

    /// 用给定的查找函数应用覆盖项，空值被忽略。
    ///
    /// # Arguments
    /// * `lookup` - 按变量名返回取值，测试中可以用内存表代替进程环境。
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        if let Some(base_url) = non_empty(BASE_URL_ENV) {
            debug!("[配置模块] 环境变量 {} 覆盖基础地址为 {}", BASE_URL_ENV, base_url);
            self.base_url = base_url;
        }
        if let Some(level) = non_empty(LOG_LEVEL_ENV) {
            debug!("[配置模块] 环境变量 {} 覆盖日志级别为 {}", LOG_LEVEL_ENV, level);
            self.log_level = level;
        }
    }

    /// 校验并返回 WebSocket 形式的基础地址。
    pub fn ws_base_url(&self) -> Result<Url, ConfigError> {
        websocket_base_url(&self.base_url)
            .map_err(|reason| ConfigError::InvalidBaseUrl { url: self.base_url.clone(), reason })
    }

    /// 校验配置；目前只有基础地址需要校验。
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ws_base_url().map(|_| ())
    }
}

/// 解析基础地址并把 `http`/`https` 映射为 `ws`/`wss`。
pub(crate) fn websocket_base_url(raw: &str) -> Result<Url, String> {
    let mut url = Url::parse(raw.trim()).map_err(|e| e.to_string())?;
    let ws_scheme = match url.scheme() {
        "ws" | "http" => "ws",
        "wss" | "https" => "wss",
        other => return Err(format!("不支持的协议 '{}'", other)),
    };
    if url.scheme() != ws_scheme && url.set_scheme(ws_scheme).is_err() {
        return Err(format!("无法将协议转换为 '{}'", ws_scheme));
    }
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err("缺少主机名".to_string());
    }
    Ok(url)
}

/// 默认配置文件路径，查找顺序见模块文档。
pub fn default_config_path() -> PathBuf {
    let current_dir = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let local = current_dir.join(CONFIG_FILE_NAME);
    if local.exists() {
        return local;
    }
    match env::var("HOME") {
        Ok(home) if !home.is_empty() => {
            PathBuf::from(home).join(".config").join("archon_stream").join(CONFIG_FILE_NAME)
        }
        _ => local,
    }
}

/// 进程级的全局配置，只初始化一次。
static STREAM_CONFIG: OnceLock<StreamConfig> = OnceLock::new();

/// 从默认路径加载并初始化全局配置。
pub fn init_config() -> Result<&'static StreamConfig, ConfigError> {
    init_config_with(&default_config_path())
}

/// 从指定路径加载、应用环境变量覆盖并校验后初始化全局配置。
///
/// 全局配置只能初始化一次；重复调用时记录警告并返回已有配置。
///
/// # Arguments
/// * `path` - 配置文件路径，不存在时以默认配置创建。
///
/// # Returns
/// * `Ok(&'static StreamConfig)` - 全局配置。
/// * `Err(ConfigError)` - 加载失败或基础地址无效，此时全局配置保持未初始化。
pub fn init_config_with(path: &Path) -> Result<&'static StreamConfig, ConfigError> {
    if let Some(existing) = STREAM_CONFIG.get() {
        warn!("[配置模块] 全局配置已被初始化，本次调用未覆盖已有配置。");
        return Ok(existing);
    }
    let mut config = StreamConfig::load_or_create(path)?;
    config.apply_env_overrides();
    config.validate()?;
    let config = STREAM_CONFIG.get_or_init(|| config);
    info!("[配置模块] 全局配置初始化完毕，基础地址: {}", config.base_url);
    Ok(config)
}

/// 获取全局配置。尚未调用 `init_config` 时使用默认配置 (含环境变量覆盖)，不读取文件。
pub fn get_config() -> &'static StreamConfig {
    STREAM_CONFIG.get_or_init(|| {
        let mut config = StreamConfig::default();
        config.apply_env_overrides();
        debug!("[配置模块] 全局配置未显式初始化，使用默认配置。");
        config
    })
}
