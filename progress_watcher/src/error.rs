// progress_watcher/src/error.rs

use progress_stream_utils::{ConfigError, StreamError};
use thiserror::Error;

/// 命令行工具的错误类型。
#[derive(Error, Debug)]
pub enum WatcherError {
    /// 配置文件加载失败或基础地址无效。
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// 订阅失败 (空标识或无法构造端点)。
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// 连接监督任务在没有报告关闭的情况下结束。
    #[error("流在报告关闭之前意外结束")]
    StreamEnded,

    /// 连接以非正常关闭码进入终止状态 (例如重连次数用尽)。
    #[error("连接异常关闭 (code={code}): {reason}")]
    ConnectionLost { code: u16, reason: String },
}
