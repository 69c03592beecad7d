//! `progress_stream_utils` 是 Archon 实时进度流的 WebSocket 客户端库。
//!
//! 每个领域 (爬取进度、项目创建进度、测试运行进度、MCP 服务器日志、智能体聊天)
//! 都由同一个通用客户端 `ProgressStreamClient<D>` 驱动：建立连接、校验消息信封、
//! 分发类型化回调，并在连接异常断开时按指数退避自动重连。
//!
//! 主要模块：
//! - `message`: 消息信封的解析与结构校验。
//! - `client`: 传输层、重连策略、活跃度监视与通用流客户端。
//! - `domains`: 各领域的端点模板、消息类型与解码。
//! - `services`: 进程级的各领域单例服务。
//! - `legacy`: 旧版回调注册接口的兼容层。
//! - `config` / `error`: 配置与错误类型。

pub mod client;
pub mod config;
pub mod domains;
pub mod error;
pub mod legacy;
pub mod message;
pub mod services;

pub use client::stream::{
    ConnectionHandle, ConnectionState, ProgressStreamClient, StreamHandlers, StreamOptions,
};
pub use client::transport::{CloseInfo, SocketConnector, TungsteniteConnector};
pub use config::{StreamConfig, get_config, init_config, init_config_with};
pub use domains::{ChatDomain, ChatEvent, ChatHandlers, ProgressDomain, ServerLogDomain, StreamDomain, StreamEvent};
pub use error::{ConfigError, StreamError};
pub use message::{Envelope, EnvelopeRejection, decode_envelope, parse_envelope};
pub use services::{
    agent_chat_service, crawl_progress_service, project_creation_progress_service, server_log_service,
    test_progress_service,
};
