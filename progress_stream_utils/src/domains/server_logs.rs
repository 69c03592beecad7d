// progress_stream_utils/src/domains/server_logs.rs

//! MCP 服务器日志流领域。每条 `log` 消息携带一条 `ServerLogEntry`。
//!
//! 日志流没有订阅帧：连接到端点即开始推送。日志条目没有进度标识，
//! 因此不做标识匹配，`id` 只用于构造端点路径。

use super::StreamDomain;
use crate::message::{Envelope, EnvelopeRejection};
use progress_models::ws_payloads::{LOG_ENTRY_MESSAGE_TYPE, ServerLogEntry};

/// 服务器日志领域：端点 `api/mcp/servers/<服务器标识>/logs/stream`。
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerLogDomain;

impl StreamDomain for ServerLogDomain {
    type Event = ServerLogEntry;

    fn name(&self) -> &'static str {
        "服务器日志"
    }

    fn endpoint_segments(&self, id: &str) -> Vec<String> {
        ["api", "mcp", "servers", id, "logs", "stream"].iter().map(|s| s.to_string()).collect()
    }

    fn accepts(&self, message_type: &str) -> bool {
        message_type == LOG_ENTRY_MESSAGE_TYPE
    }

    /// 把 `data` 解析为日志条目；`timestamp`、`level`、`message` 必须存在，其余字段可选。
    fn decode(&self, _id: &str, envelope: Envelope) -> Result<ServerLogEntry, EnvelopeRejection> {
        let Envelope { message_type, data } = envelope;
        let Some(data) = data else {
            return Err(EnvelopeRejection::MissingData { message_type });
        };
        serde_json::from_value(data)
            .map_err(|e| EnvelopeRejection::InvalidRecord { message_type, reason: e.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::decode_envelope;
    use progress_models::LogLevel;

    #[test]
    fn test_decode_log_entry() {
        let envelope = decode_envelope(
            r#"{"type":"log","data":{"timestamp":"2026-05-04T10:00:00Z","level":"error","message":"tool crashed"}}"#,
        )
        .unwrap();
        let entry = ServerLogDomain.decode("srv-1", envelope).unwrap();
        assert_eq!(entry.level, LogLevel::Error);
        assert_eq!(entry.message, "tool crashed");
    }

    #[test]
    fn test_log_without_data_is_rejected() {
        let envelope = decode_envelope(r#"{"type":"log"}"#).unwrap();
        assert_eq!(
            ServerLogDomain.decode("srv-1", envelope),
            Err(EnvelopeRejection::MissingData { message_type: "log".to_string() })
        );
    }

    #[test]
    fn test_log_domain_endpoint_and_types() {
        assert_eq!(
            ServerLogDomain.endpoint_segments("archon-mcp"),
            vec!["api", "mcp", "servers", "archon-mcp", "logs", "stream"]
        );
        assert!(ServerLogDomain.accepts("log"));
        assert!(!ServerLogDomain.accepts("crawl_progress"));
        assert!(ServerLogDomain.subscribe_frames("archon-mcp").is_empty());
    }
}
