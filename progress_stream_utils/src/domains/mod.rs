// progress_stream_utils/src/domains/mod.rs

//! 流领域定义。
//!
//! 通用的 `ProgressStreamClient` 只负责连接生命周期；某条流“连哪里、认哪些消息、
//! 如何把信封解码为类型化事件”由实现了 `StreamDomain` 的领域类型决定：
//! - `progress`: 爬取 / 项目创建 / 测试运行三类进度流 (`ProgressDomain<R>`)。
//! - `server_logs`: MCP 服务器日志流。
//! - `chat`: 智能体聊天会话流。

pub mod chat;
pub mod progress;
pub mod server_logs;

use crate::message::{Envelope, EnvelopeRejection};
use std::fmt::Debug;

pub use chat::{ChatDomain, ChatEvent, ChatHandlers};
pub use progress::{ProgressDomain, StreamEvent};
pub use server_logs::ServerLogDomain;

/// 一个流领域的配置：端点模板、可识别的消息类型与解码方式。
pub trait StreamDomain: Send + Sync + 'static {
    /// 交付给消费者回调的事件类型。
    type Event: Debug + Send + 'static;

    /// 日志中使用的领域名称。
    fn name(&self) -> &'static str;

    /// 端点路径段 (追加在基础地址之后)，例如 `["api", "crawl-progress", id]`。
    fn endpoint_segments(&self, id: &str) -> Vec<String>;

    /// 该领域是否识别此消息类型 (控制帧除外)。
    fn accepts(&self, message_type: &str) -> bool;

    /// 连接打开后需要发送的订阅/加入帧。
    fn subscribe_frames(&self, _id: &str) -> Vec<String> {
        Vec::new()
    }

    /// 把已通过结构校验的信封解码为领域事件。
    fn decode(&self, id: &str, envelope: Envelope) -> Result<Self::Event, EnvelopeRejection>;
}
