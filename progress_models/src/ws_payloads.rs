// progress_models/src/ws_payloads.rs

//! WebSocket 通信中使用的消息类型常量与各类 Payload 结构体定义。
//!
//! 线上信封格式为 `{"type": "...", "data": {...}}`。进度领域的消息类型由
//! 领域前缀加后缀组成，例如 `crawl` + `_progress` = `crawl_progress`。

use crate::enums::{ChatSender, LogLevel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 服务端发出的 Ping，客户端需回复 Pong。
pub const PING_MESSAGE_TYPE: &str = "ping";
/// Pong 回复。
pub const PONG_MESSAGE_TYPE: &str = "pong";
/// 服务端心跳。
pub const HEARTBEAT_MESSAGE_TYPE: &str = "heartbeat";

/// 进度领域连接打开后客户端发送的订阅帧类型。
pub const SUBSCRIBE_MESSAGE_TYPE: &str = "subscribe";
/// 聊天会话连接打开后客户端发送的加入帧类型。
pub const JOIN_MESSAGE_TYPE: &str = "join";

// 进度消息类型后缀
pub const PROGRESS_TYPE_SUFFIX: &str = "_progress"; // 进行中的更新
pub const COMPLETED_TYPE_SUFFIX: &str = "_completed"; // 操作成功结束
pub const ERROR_TYPE_SUFFIX: &str = "_error"; // 操作失败

// 进度领域的消息类型前缀
pub const CRAWL_TYPE_PREFIX: &str = "crawl";
pub const PROJECT_CREATION_TYPE_PREFIX: &str = "project_creation";
pub const TEST_RUN_TYPE_PREFIX: &str = "test";

/// 服务器日志流中单条日志的消息类型。
pub const LOG_ENTRY_MESSAGE_TYPE: &str = "log";

// 智能体聊天消息类型
pub const CHAT_MESSAGE_TYPE: &str = "message"; // 完整消息
pub const TYPING_MESSAGE_TYPE: &str = "typing"; // 输入状态
pub const STREAM_CHUNK_MESSAGE_TYPE: &str = "stream_chunk"; // 流式回复片段
pub const STREAM_COMPLETE_MESSAGE_TYPE: &str = "stream_complete"; // 流式回复结束
pub const CHAT_ERROR_MESSAGE_TYPE: &str = "error"; // 会话错误

/// 订阅帧的负载：告诉后端客户端关心哪个进度标识。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubscribePayload {
    /// 要订阅的进度标识。
    pub progress_id: String,
}

/// 加入聊天会话帧的负载。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JoinSessionPayload {
    /// 要加入的会话标识。
    pub session_id: String,
}

/// MCP 服务器日志流中的一条日志。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServerLogEntry {
    /// 服务端产生日志的时间 (RFC 3339)。
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    /// 日志正文。
    pub message: String,
    /// 产生日志的组件名称，例如 "mcp.tools"。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// 关联的 MCP 会话标识。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// 聊天会话中的一条完整消息。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// 消息标识 (UUID)。
    pub id: String,
    /// 消息正文 (Markdown)。
    pub content: String,
    pub sender: ChatSender,
    pub timestamp: DateTime<Utc>,
    /// 回复该消息的智能体类型，仅智能体消息带有。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<String>,
}

impl ChatMessage {
    /// 以用户身份创建一条新消息，自动生成 UUID v4 标识与当前时间戳。
    pub fn from_user(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            sender: ChatSender::User,
            timestamp: Utc::now(),
            agent_type: None,
        }
    }
}

/// 智能体正在输入的指示。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    /// `true` 表示开始输入。
    pub is_typing: bool,
}

/// 流式回复的一个片段。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StreamChunkPayload {
    /// 片段文本，按到达顺序拼接。
    pub content: String,
    /// 片段所属的消息。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

/// 流式回复结束标记。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct StreamCompletePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

/// 聊天会话中服务端报告的错误。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChatErrorPayload {
    /// 错误描述。
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_progress_type_names_compose() {
        assert_eq!(format!("{}{}", CRAWL_TYPE_PREFIX, PROGRESS_TYPE_SUFFIX), "crawl_progress");
        assert_eq!(
            format!("{}{}", PROJECT_CREATION_TYPE_PREFIX, COMPLETED_TYPE_SUFFIX),
            "project_creation_completed"
        );
        assert_eq!(format!("{}{}", TEST_RUN_TYPE_PREFIX, ERROR_TYPE_SUFFIX), "test_error");
    }

    #[test]
    /// 测试服务器日志条目的解析，`warn` 级别与可选字段均应被接受。
    fn test_server_log_entry_from_wire() {
        let entry: ServerLogEntry = serde_json::from_value(json!({
            "timestamp": "2026-03-01T08:15:30Z",
            "level": "warn",
            "message": "tool call took 4.2s",
            "source": "mcp.tools"
        }))
        .expect("日志条目应能解析");
        assert_eq!(entry.level, LogLevel::Warning);
        assert_eq!(entry.source.as_deref(), Some("mcp.tools"));
        assert!(entry.session_id.is_none());
    }

    #[test]
    fn test_chat_message_from_user() {
        let message = ChatMessage::from_user("hello agent");
        assert_eq!(message.sender, ChatSender::User);
        assert!(Uuid::parse_str(&message.id).is_ok(), "消息 ID 应为合法的 UUID");

        let wire = serde_json::to_value(&message).unwrap();
        assert_eq!(wire["sender"], json!("user"));
        assert!(wire.get("agentType").is_none());
    }

    #[test]
    fn test_subscribe_payload_uses_camel_case() {
        let payload = SubscribePayload { progress_id: "crawl-1".to_string() };
        assert_eq!(serde_json::to_value(&payload).unwrap(), json!({"progressId": "crawl-1"}));
    }
}
