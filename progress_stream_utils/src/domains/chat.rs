// progress_stream_utils/src/domains/chat.rs

//! 智能体聊天会话流。
//!
//! 连接打开后发送 `join` 帧加入会话，之后服务端推送完整消息 (`message`)、
//! 输入状态 (`typing`)、流式回复片段 (`stream_chunk`)、流式结束 (`stream_complete`)
//! 与会话错误 (`error`)。
//!
//! 消费者可以直接用 `StreamHandlers<ChatEvent>` 接收全部事件，也可以用 `ChatHandlers`
//! 按类别注册回调；后者会把服务端的 `error` 消息转成 `StreamError::Remote` 交给 `on_error`。

use super::StreamDomain;
use crate::client::stream::{
    CloseCallback, ConnectionHandle, ErrorCallback, ProgressStreamClient, StreamHandlers, StreamOptions,
};
use crate::client::transport::CloseInfo;
use crate::error::StreamError;
use crate::message::{Envelope, EnvelopeRejection};
use progress_models::ws_payloads::{
    CHAT_ERROR_MESSAGE_TYPE, CHAT_MESSAGE_TYPE, ChatErrorPayload, ChatMessage, JOIN_MESSAGE_TYPE, JoinSessionPayload,
    STREAM_CHUNK_MESSAGE_TYPE, STREAM_COMPLETE_MESSAGE_TYPE, StreamChunkPayload, StreamCompletePayload,
    TYPING_MESSAGE_TYPE, TypingPayload,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};

/// 旧版后端使用的错误类型名，仍然接受。
const LEGACY_CHAT_ERROR_MESSAGE_TYPE: &str = "chat_error";

/// 聊天会话事件。
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// 一条完整的聊天消息 (用户或智能体)。
    Message(ChatMessage),
    /// 智能体开始 (`true`) 或停止 (`false`) 输入。
    Typing(bool),
    /// 流式回复的一个片段，按到达顺序拼接。
    StreamChunk(StreamChunkPayload),
    /// 流式回复结束。
    StreamComplete(StreamCompletePayload),
    /// 服务端报告的会话错误。
    Error(String),
}

/// 聊天领域：端点 `api/agent-chat/sessions/<会话标识>/ws`，打开后发送 `join` 帧。
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatDomain;

/// 把信封的 `data` 反序列化为指定负载类型。
///
/// # Returns
/// * `Err(EnvelopeRejection::MissingData)` - 信封没有 `data`。
/// * `Err(EnvelopeRejection::InvalidRecord)` - `data` 的结构与负载类型不符。
fn decode_payload<T: DeserializeOwned>(message_type: String, data: Option<Value>) -> Result<T, EnvelopeRejection> {
    let Some(data) = data else {
        return Err(EnvelopeRejection::MissingData { message_type });
    };
    serde_json::from_value(data).map_err(|e| EnvelopeRejection::InvalidRecord { message_type, reason: e.to_string() })
}

impl StreamDomain for ChatDomain {
    type Event = ChatEvent;

    fn name(&self) -> &'static str {
        "智能体聊天"
    }

    fn endpoint_segments(&self, id: &str) -> Vec<String> {
        ["api", "agent-chat", "sessions", id, "ws"].iter().map(|s| s.to_string()).collect()
    }

    fn accepts(&self, message_type: &str) -> bool {
        matches!(
            message_type,
            CHAT_MESSAGE_TYPE
                | TYPING_MESSAGE_TYPE
                | STREAM_CHUNK_MESSAGE_TYPE
                | STREAM_COMPLETE_MESSAGE_TYPE
                | CHAT_ERROR_MESSAGE_TYPE
                | LEGACY_CHAT_ERROR_MESSAGE_TYPE
        )
    }

    fn subscribe_frames(&self, id: &str) -> Vec<String> {
        let payload = JoinSessionPayload { session_id: id.to_string() };
        match serde_json::to_value(&payload) {
            Ok(data) => vec![Envelope::new(JOIN_MESSAGE_TYPE, Some(data)).to_json()],
            Err(e) => {
                log::error!("[智能体聊天] 序列化加入会话帧失败: {}", e);
                Vec::new()
            }
        }
    }

    fn decode(&self, _id: &str, envelope: Envelope) -> Result<ChatEvent, EnvelopeRejection> {
        let Envelope { message_type, data } = envelope;
        match message_type.as_str() {
            CHAT_MESSAGE_TYPE => decode_payload(message_type, data).map(ChatEvent::Message),
            TYPING_MESSAGE_TYPE => {
                decode_payload::<TypingPayload>(message_type, data).map(|typing| ChatEvent::Typing(typing.is_typing))
            }
            STREAM_CHUNK_MESSAGE_TYPE => decode_payload(message_type, data).map(ChatEvent::StreamChunk),
            // 结束标记可以不带负载
            STREAM_COMPLETE_MESSAGE_TYPE => match data {
                None => Ok(ChatEvent::StreamComplete(StreamCompletePayload::default())),
                Some(_) => decode_payload(message_type, data).map(ChatEvent::StreamComplete),
            },
            CHAT_ERROR_MESSAGE_TYPE | LEGACY_CHAT_ERROR_MESSAGE_TYPE => {
                decode_payload::<ChatErrorPayload>(message_type, data).map(|payload| ChatEvent::Error(payload.error))
            }
            _ => Err(EnvelopeRejection::UnrecognizedType { message_type }),
        }
    }
}

/// 传输层错误与服务端错误消息共用的 `on_error` 回调。
type SharedErrorCallback = Arc<Mutex<Option<ErrorCallback>>>;

/// 调用共享的错误回调；未注册时只记录警告。
fn report_error(slot: &SharedErrorCallback, err: StreamError) {
    let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
    match guard.as_mut() {
        Some(on_error) => on_error(err),
        None => log::warn!("[智能体聊天] 未注册 on_error 回调，错误被忽略: {}", err),
    }
}

/// 聊天会话的分类回调。未注册的类别被静默忽略。
#[derive(Default)]
pub struct ChatHandlers {
    on_message: Option<Box<dyn FnMut(ChatMessage) + Send>>,
    on_typing: Option<Box<dyn FnMut(bool) + Send>>,
    on_stream_chunk: Option<Box<dyn FnMut(StreamChunkPayload) + Send>>,
    on_stream_complete: Option<Box<dyn FnMut(StreamCompletePayload) + Send>>,
    on_error: Option<ErrorCallback>,
    on_close: Option<CloseCallback>,
}

impl ChatHandlers {
    /// 创建不含任何回调的集合。
    pub fn new() -> Self {
        Self::default()
    }

    /// 收到完整聊天消息时调用。
    pub fn on_message(mut self, f: impl FnMut(ChatMessage) + Send + 'static) -> Self {
        self.on_message = Some(Box::new(f));
        self
    }

    /// 输入状态变化时调用，参数为是否正在输入。
    pub fn on_typing(mut self, f: impl FnMut(bool) + Send + 'static) -> Self {
        self.on_typing = Some(Box::new(f));
        self
    }

    /// 收到流式回复片段时调用。
    pub fn on_stream_chunk(mut self, f: impl FnMut(StreamChunkPayload) + Send + 'static) -> Self {
        self.on_stream_chunk = Some(Box::new(f));
        self
    }

    /// 流式回复结束时调用。
    pub fn on_stream_complete(mut self, f: impl FnMut(StreamCompletePayload) + Send + 'static) -> Self {
        self.on_stream_complete = Some(Box::new(f));
        self
    }

    /// 传输层错误、重连耗尽与服务端 `error` 消息 (`StreamError::Remote`) 都会送到这里。
    pub fn on_error(mut self, f: impl FnMut(StreamError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    /// 连接进入终止状态时调用 (主动断开除外)。
    pub fn on_close(mut self, f: impl FnMut(CloseInfo) + Send + 'static) -> Self {
        self.on_close = Some(Box::new(f));
        self
    }

    /// 转换为通用客户端使用的回调集合。
    ///
    /// 分类回调被合并进一个消息回调；`on_error` 放进共享槽位，
    /// 使传输层错误与 `ChatEvent::Error` 走同一个回调。
    pub fn into_stream_handlers(self) -> StreamHandlers<ChatEvent> {
        let ChatHandlers { mut on_message, mut on_typing, mut on_stream_chunk, mut on_stream_complete, on_error, on_close } =
            self;
        let error_slot: SharedErrorCallback = Arc::new(Mutex::new(on_error));
        let remote_errors = error_slot.clone();

        let mut handlers = StreamHandlers::new(move |event| match event {
            ChatEvent::Message(message) => {
                if let Some(f) = on_message.as_mut() {
                    f(message);
                }
            }
            ChatEvent::Typing(is_typing) => {
                if let Some(f) = on_typing.as_mut() {
                    f(is_typing);
                }
            }
            ChatEvent::StreamChunk(chunk) => {
                if let Some(f) = on_stream_chunk.as_mut() {
                    f(chunk);
                }
            }
            ChatEvent::StreamComplete(done) => {
                if let Some(f) = on_stream_complete.as_mut() {
                    f(done);
                }
            }
            ChatEvent::Error(error) => report_error(&remote_errors, StreamError::Remote(error)),
        })
        .on_error(move |err| report_error(&error_slot, err));

        if let Some(mut on_close) = on_close {
            handlers = handlers.on_close(move |close| on_close(close));
        }
        handlers
    }
}

impl ProgressStreamClient<ChatDomain> {
    /// 订阅一个聊天会话。
    ///
    /// # Arguments
    /// * `session_id` - 会话标识，不能为空白。
    /// * `handlers` - 分类回调。
    /// * `options` - 连接选项，`None` 时使用客户端默认选项。
    ///
    /// # Returns
    /// 与 `stream_progress` 相同。
    pub async fn stream_session(
        &self,
        session_id: &str,
        handlers: ChatHandlers,
        options: Option<StreamOptions>,
    ) -> Result<ConnectionHandle, StreamError> {
        self.stream_progress(session_id, handlers.into_stream_handlers(), options).await
    }
}
