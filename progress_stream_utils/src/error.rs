// progress_stream_utils/src/error.rs

//! 定义进度流客户端相关的错误类型。

use thiserror::Error;

/// 进度流客户端的统一错误类型。
///
/// 只有编程错误 (空标识、无法解析的端点 URL) 会通过 `Result` 从公共 API 返回；
/// 传输层错误与重连耗尽通过连接的 `on_error` 回调报告，协议错误只记录日志。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StreamError {
    /// 订阅标识为空或只包含空白字符。
    #[error("无效的订阅标识: 标识不能为空")]
    InvalidId,

    /// 无法根据基础地址与领域模板构造出合法的 WebSocket 端点。
    #[error("无效的URL: {0}")]
    InvalidUrl(String),

    /// 底层 WebSocket 连接出错 (握手失败、读写失败等)。
    #[error("传输层错误: {0}")]
    Transport(String),

    /// 连续重连失败，已达到最大重连次数，连接进入终止状态。
    #[error("重连失败: 已连续尝试 {attempts} 次，放弃重连")]
    ReconnectExhausted { attempts: u32 },

    /// 服务端通过领域消息报告的错误 (例如聊天会话中的 `error` 消息)。
    #[error("服务端错误: {0}")]
    Remote(String),

    /// 配置加载、保存或校验失败。
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// 配置文件相关错误。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// 文件存在但无法读取 (权限、编码等)。
    #[error("读取配置文件 '{path}' 失败: {reason}")]
    Read { path: String, reason: String },

    /// 文件内容不是合法的配置 JSON，文件保持原样。
    #[error("解析配置文件 '{path}' 的内容失败: {reason}")]
    Parse { path: String, reason: String },

    /// 创建目录或写入默认配置失败。
    #[error("写入配置文件 '{path}' 失败: {reason}")]
    Write { path: String, reason: String },

    /// 基础地址不是合法的 http/https/ws/wss URL。
    #[error("无效的基础地址 '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}
