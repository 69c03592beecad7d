// progress_stream_utils/src/message.rs

//! 消息信封的定义与解析。
//!
//! 后端推送的每一帧都是 `{"type": "...", "data": {...}}` 形式的 JSON 信封。
//! 本模块负责把原始文本解码为 `Envelope`，并在结构层面校验：
//! - `type` 必须是非空字符串；
//! - 携带进度记录的类型 (`*_progress`、`*_completed`、`*_error`) 必须有对象形式的 `data`，
//!   其中包含字符串 `progressId` 或 `sessionId`，且 `percentage` (若存在) 必须是有限数值；
//! - `ping` / `pong` / `heartbeat` 控制帧没有负载要求。
//!
//! 解析失败不会向调用方抛出：`decode_envelope` 返回带日志级别的 `EnvelopeRejection`，
//! `parse_envelope` 则直接记录日志并返回 `None`。

use log::Level;
use progress_models::ws_payloads::{
    COMPLETED_TYPE_SUFFIX, ERROR_TYPE_SUFFIX, HEARTBEAT_MESSAGE_TYPE, PING_MESSAGE_TYPE,
    PONG_MESSAGE_TYPE, PROGRESS_TYPE_SUFFIX,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// 线上消息信封。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Envelope {
    /// 消息类型，例如 `crawl_progress`、`ping`。
    #[serde(rename = "type")]
    pub message_type: String,
    /// 消息负载，控制帧通常没有。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// 协议层控制帧的种类。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    /// 对端探测，需要回复 `pong`。
    Ping,
    /// 对 `ping` 的应答，无需回复。
    Pong,
    /// 服务端心跳，回复 `ping`。
    Heartbeat,
}

impl ControlKind {
    /// 该控制帧在线上的 `type` 字符串。
    pub fn message_type(&self) -> &'static str {
        match self {
            Self::Ping => PING_MESSAGE_TYPE,
            Self::Pong => PONG_MESSAGE_TYPE,
            Self::Heartbeat => HEARTBEAT_MESSAGE_TYPE,
        }
    }

    /// 收到该控制帧后需要回复的控制帧：`ping` 回 `pong`，`heartbeat` 回 `ping`，`pong` 不回复。
    pub fn reply(&self) -> Option<ControlKind> {
        match self {
            Self::Ping => Some(Self::Pong),
            Self::Heartbeat => Some(Self::Ping),
            Self::Pong => None,
        }
    }
}

/// 携带进度记录的消息类别，由消息类型的后缀决定。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// `*_progress`
    Progress,
    /// `*_completed`
    Completed,
    /// `*_error`
    Error,
}

impl RecordKind {
    /// 根据消息类型后缀判断类别。
    pub fn from_message_type(message_type: &str) -> Option<Self> {
        if message_type.ends_with(PROGRESS_TYPE_SUFFIX) {
            Some(Self::Progress)
        } else if message_type.ends_with(COMPLETED_TYPE_SUFFIX) {
            Some(Self::Completed)
        } else if message_type.ends_with(ERROR_TYPE_SUFFIX) {
            Some(Self::Error)
        } else {
            None
        }
    }
}

impl Envelope {
    /// 以给定类型与负载构造信封。
    pub fn new(message_type: impl Into<String>, data: Option<Value>) -> Self {
        Self { message_type: message_type.into(), data }
    }

    /// 构造一个控制帧并序列化为 JSON 文本，例如 `{"type":"pong"}`。
    pub fn control_frame(kind: ControlKind) -> String {
        Self::new(kind.message_type(), None).to_json()
    }

    /// 序列化为 JSON 文本。没有负载时省略 `data` 字段。
    pub fn to_json(&self) -> String {
        let mut object = Map::new();
        object.insert("type".to_string(), Value::String(self.message_type.clone()));
        if let Some(data) = &self.data {
            object.insert("data".to_string(), data.clone());
        }
        Value::Object(object).to_string()
    }

    /// 若为 `ping`/`pong`/`heartbeat` 控制帧则返回其种类。
    pub fn control_kind(&self) -> Option<ControlKind> {
        match self.message_type.as_str() {
            PING_MESSAGE_TYPE => Some(ControlKind::Ping),
            PONG_MESSAGE_TYPE => Some(ControlKind::Pong),
            HEARTBEAT_MESSAGE_TYPE => Some(ControlKind::Heartbeat),
            _ => None,
        }
    }

    /// 若类型以 `_progress`/`_completed`/`_error` 结尾则返回记录类别。
    pub fn record_kind(&self) -> Option<RecordKind> {
        RecordKind::from_message_type(&self.message_type)
    }

    /// 取出 `data` 对象，非对象或缺失时返回 `None`。
    pub fn data_object(&self) -> Option<&Map<String, Value>> {
        self.data.as_ref().and_then(Value::as_object)
    }
}

/// 信封被拒绝的原因。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnvelopeRejection {
    /// 原始文本不是合法的 JSON，或顶层不是对象。
    #[error("消息不是合法的 JSON 对象: {0}")]
    MalformedJson(String),

    /// `type` 缺失、不是字符串或为空白。
    #[error("消息缺少非空的字符串字段 `type`")]
    MissingType,

    /// 需要负载的消息没有对象形式的 `data`。
    #[error("消息 '{message_type}' 缺少对象形式的 `data` 字段")]
    MissingData { message_type: String },

    /// 记录类消息的 `data` 中没有可用的标识。
    #[error("消息 '{message_type}' 的 `data` 中缺少字符串字段 `progressId`/`sessionId`")]
    MissingProgressId { message_type: String },

    /// `percentage` 存在但不是有限数值 (字符串、NaN 等)。
    #[error("消息 '{message_type}' 的 `data.percentage` 不是有限数值: {found}")]
    InvalidPercentage { message_type: String, found: String },

    /// 当前领域不处理该消息类型。
    #[error("未识别的消息类型 '{message_type}'")]
    UnrecognizedType { message_type: String },

    /// 结构合法但无法解码为领域记录，例如 `status` 不在领域状态集合内。
    #[error("消息 '{message_type}' 的负载无法解码为领域记录: {reason}")]
    InvalidRecord { message_type: String, reason: String },

    /// 记录中的进度标识与当前订阅的标识不一致。
    #[error("消息的进度标识 '{found}' 与订阅标识 '{expected}' 不一致")]
    ForeignProgressId { expected: String, found: String },
}

impl EnvelopeRejection {
    /// 该拒绝原因应使用的日志级别：JSON 解码失败记为 error，其余结构/语义问题记为 warn。
    pub fn level(&self) -> Level {
        match self {
            Self::MalformedJson(_) => Level::Error,
            _ => Level::Warn,
        }
    }

    /// 按照对应级别记录本次拒绝。
    ///
    /// # Arguments
    /// * `context` - 日志前缀，通常是 `领域:标识`。
    pub fn log(&self, context: &str) {
        log::log!(self.level(), "[{}] 已丢弃一条消息: {}", context, self);
    }
}

/// 解码并校验一条原始文本消息。
///
/// # Arguments
/// * `raw` - 从套接字收到的原始文本帧。
///
/// # Returns
/// * `Ok(Envelope)` - 通过结构校验的信封；`data` 为 `null` 时视同缺失。
/// * `Err(EnvelopeRejection)` - 拒绝原因，调用方据此决定日志级别。
pub fn decode_envelope(raw: &str) -> Result<Envelope, EnvelopeRejection> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| EnvelopeRejection::MalformedJson(e.to_string()))?;
    let Value::Object(mut object) = value else {
        return Err(EnvelopeRejection::MalformedJson("顶层不是 JSON 对象".to_string()));
    };

    let message_type = match object.remove("type") {
        Some(Value::String(t)) if !t.trim().is_empty() => t,
        _ => return Err(EnvelopeRejection::MissingType),
    };
    let data = object.remove("data").filter(|d| !d.is_null());
    let envelope = Envelope { message_type, data };

    // 控制帧没有负载要求
    if envelope.control_kind().is_some() {
        return Ok(envelope);
    }
    if envelope.record_kind().is_some() {
        validate_record_data(&envelope)?;
    }
    Ok(envelope)
}

/// `decode_envelope` 的便捷包装：拒绝时记录日志并返回 `None`。
pub fn parse_envelope(raw: &str) -> Option<Envelope> {
    match decode_envelope(raw) {
        Ok(envelope) => Some(envelope),
        Err(rejection) => {
            rejection.log("消息解析");
            None
        }
    }
}

/// 记录类消息的结构校验：对象形式的 `data`、非空标识、有限的 `percentage`。
fn validate_record_data(envelope: &Envelope) -> Result<(), EnvelopeRejection> {
    let message_type = &envelope.message_type;
    let data = envelope
        .data_object()
        .ok_or_else(|| EnvelopeRejection::MissingData { message_type: message_type.clone() })?;

    let has_identity = ["progressId", "sessionId"]
        .iter()
        .any(|key| matches!(data.get(*key), Some(Value::String(id)) if !id.is_empty()));
    if !has_identity {
        return Err(EnvelopeRejection::MissingProgressId { message_type: message_type.clone() });
    }

    if let Some(percentage) = data.get("percentage") {
        let finite = percentage.as_f64().is_some_and(f64::is_finite);
        if !finite {
            return Err(EnvelopeRejection::InvalidPercentage {
                message_type: message_type.clone(),
                found: percentage.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_valid_progress_envelope() {
        let raw = r#"{"type":"crawl_progress","data":{"progressId":"crawl-123","status":"crawling","percentage":25,"logs":[]}}"#;
        let envelope = decode_envelope(raw).expect("合法的进度消息应通过校验");
        assert_eq!(envelope.message_type, "crawl_progress");
        assert_eq!(envelope.record_kind(), Some(RecordKind::Progress));
        assert_eq!(
            envelope.data,
            Some(json!({"progressId": "crawl-123", "status": "crawling", "percentage": 25, "logs": []}))
        );
    }

    #[test]
    /// 非数值的 percentage 被拒绝，并以 warn 级别记录。
    fn test_non_numeric_percentage_is_rejected_with_warning() {
        let raw = r#"{"type":"crawl_progress","data":{"progressId":"crawl-123","percentage":"bad"}}"#;
        let rejection = decode_envelope(raw).unwrap_err();
        assert_eq!(
            rejection,
            EnvelopeRejection::InvalidPercentage {
                message_type: "crawl_progress".to_string(),
                found: "\"bad\"".to_string(),
            }
        );
        assert_eq!(rejection.level(), Level::Warn);

        let null_percentage = r#"{"type":"crawl_progress","data":{"progressId":"c","percentage":null}}"#;
        assert!(matches!(
            decode_envelope(null_percentage),
            Err(EnvelopeRejection::InvalidPercentage { .. })
        ));
    }

    #[test]
    /// JSON 解码失败以 error 级别记录，而不是 warn。
    fn test_malformed_json_is_error_level() {
        let rejection = decode_envelope("{\"type\": \"crawl_progress\", ").unwrap_err();
        assert!(matches!(rejection, EnvelopeRejection::MalformedJson(_)));
        assert_eq!(rejection.level(), Level::Error);

        let not_object = decode_envelope("[1,2,3]").unwrap_err();
        assert_eq!(not_object.level(), Level::Error);
        assert!(parse_envelope("not json at all").is_none());
    }

    #[test]
    fn test_missing_or_empty_type_is_rejected() {
        assert_eq!(decode_envelope(r#"{"data":{}}"#), Err(EnvelopeRejection::MissingType));
        assert_eq!(decode_envelope(r#"{"type":""}"#), Err(EnvelopeRejection::MissingType));
        assert_eq!(decode_envelope(r#"{"type":7}"#), Err(EnvelopeRejection::MissingType));
    }

    #[test]
    fn test_record_types_require_data_and_identity() {
        assert_eq!(
            decode_envelope(r#"{"type":"crawl_completed"}"#),
            Err(EnvelopeRejection::MissingData { message_type: "crawl_completed".to_string() })
        );
        assert_eq!(
            decode_envelope(r#"{"type":"crawl_error","data":null}"#),
            Err(EnvelopeRejection::MissingData { message_type: "crawl_error".to_string() })
        );
        assert_eq!(
            decode_envelope(r#"{"type":"test_progress","data":{"progressId":42}}"#),
            Err(EnvelopeRejection::MissingProgressId { message_type: "test_progress".to_string() })
        );
        // sessionId 同样满足标识要求
        assert!(decode_envelope(r#"{"type":"chat_progress","data":{"sessionId":"s-1"}}"#).is_ok());
    }

    #[test]
    fn test_domain_error_envelope_is_structurally_valid() {
        let raw = r#"{"type":"crawl_error","data":{"progressId":"crawl-9","error":"robots.txt disallows crawling"}}"#;
        let envelope = decode_envelope(raw).unwrap();
        assert_eq!(envelope.record_kind(), Some(RecordKind::Error));
    }

    #[test]
    fn test_control_frames_need_no_payload() {
        for (raw, kind) in [
            (r#"{"type":"ping"}"#, ControlKind::Ping),
            (r#"{"type":"pong","data":"ignored"}"#, ControlKind::Pong),
            (r#"{"type":"heartbeat","data":null}"#, ControlKind::Heartbeat),
        ] {
            let envelope = decode_envelope(raw).expect("控制帧总是结构合法的");
            assert_eq!(envelope.control_kind(), Some(kind));
        }
    }

    #[test]
    fn test_control_frame_replies() {
        assert_eq!(Envelope::control_frame(ControlKind::Pong), r#"{"type":"pong"}"#);
        assert_eq!(ControlKind::Ping.reply(), Some(ControlKind::Pong));
        assert_eq!(ControlKind::Heartbeat.reply(), Some(ControlKind::Ping));
        assert_eq!(ControlKind::Pong.reply(), None);
    }

    #[test]
    fn test_to_json_includes_data_when_present() {
        let envelope = Envelope::new("subscribe", Some(json!({"progressId": "p-1"})));
        let back: Value = serde_json::from_str(&envelope.to_json()).unwrap();
        assert_eq!(back, json!({"type": "subscribe", "data": {"progressId": "p-1"}}));
    }
}
