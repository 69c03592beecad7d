// progress_stream_utils/src/domains/progress.rs

//! 进度领域：爬取、项目创建与测试运行。
//!
//! 三个领域的差别只在消息类型前缀与端点路径，记录类型通过泛型参数区分，
//! 因此共用同一个 `ProgressDomain<R>` 实现。

use super::StreamDomain;
use crate::message::{Envelope, EnvelopeRejection, RecordKind};
use progress_models::ws_payloads::{
    CRAWL_TYPE_PREFIX, PROJECT_CREATION_TYPE_PREFIX, SUBSCRIBE_MESSAGE_TYPE, SubscribePayload,
    TEST_RUN_TYPE_PREFIX,
};
use progress_models::{
    CrawlProgressData, ProgressRecord, ProjectCreationProgressData, TestRunProgressData,
};
use serde_json::Value;
use std::marker::PhantomData;

/// 交付给进度流消费者的事件。
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent<R> {
    /// `*_progress`：进行中的进度更新。
    Progress(R),
    /// `*_completed`：操作成功完成。
    Completed(R),
    /// `*_error`：操作失败，记录中通常带有 `error` 字段。
    Failed(R),
}

impl<R> StreamEvent<R> {
    /// 事件携带的记录。
    pub fn record(&self) -> &R {
        match self {
            Self::Progress(record) | Self::Completed(record) | Self::Failed(record) => record,
        }
    }

    /// 取出事件携带的记录。
    pub fn into_record(self) -> R {
        match self {
            Self::Progress(record) | Self::Completed(record) | Self::Failed(record) => record,
        }
    }

    /// 事件对应的消息类别。
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Progress(_) => RecordKind::Progress,
            Self::Completed(_) => RecordKind::Completed,
            Self::Failed(_) => RecordKind::Error,
        }
    }
}

/// 一个进度领域。
///
/// 通过 `crawl()`、`project_creation()`、`test_run()` 构造，记录类型由构造函数确定。
#[derive(Debug)]
pub struct ProgressDomain<R> {
    /// 日志中使用的领域名称。
    name: &'static str,
    /// 消息类型前缀，例如 `crawl` 对应 `crawl_progress` 等。
    type_prefix: &'static str,
    /// 端点路径中的领域段，例如 `crawl-progress`。
    endpoint: &'static str,
    _record: PhantomData<fn() -> R>, // 只在类型层面区分记录，不持有记录
}

impl<R> ProgressDomain<R> {
    const fn new(name: &'static str, type_prefix: &'static str, endpoint: &'static str) -> Self {
        Self { name, type_prefix, endpoint, _record: PhantomData }
    }

    /// 消息类型前缀。
    pub fn type_prefix(&self) -> &'static str {
        self.type_prefix
    }

    /// 解析消息类型：必须是 `<前缀>_progress|_completed|_error` 之一。
    fn record_kind_of(&self, message_type: &str) -> Option<RecordKind> {
        let suffix = message_type.strip_prefix(self.type_prefix)?;
        match suffix {
            "_progress" => Some(RecordKind::Progress),
            "_completed" => Some(RecordKind::Completed),
            "_error" => Some(RecordKind::Error),
            _ => None,
        }
    }
}

impl ProgressDomain<CrawlProgressData> {
    /// 爬取进度：`crawl_*` 消息，端点 `api/crawl-progress/<进度标识>`。
    pub const fn crawl() -> Self {
        Self::new("爬取进度", CRAWL_TYPE_PREFIX, "crawl-progress")
    }
}

impl ProgressDomain<ProjectCreationProgressData> {
    /// 项目创建进度：`project_creation_*` 消息，端点 `api/project-creation-progress/<进度标识>`。
    pub const fn project_creation() -> Self {
        Self::new("项目创建进度", PROJECT_CREATION_TYPE_PREFIX, "project-creation-progress")
    }
}

impl ProgressDomain<TestRunProgressData> {
    /// 测试运行进度：`test_*` 消息，端点 `api/test-progress/<进度标识>`。
    pub const fn test_run() -> Self {
        Self::new("测试运行进度", TEST_RUN_TYPE_PREFIX, "test-progress")
    }
}

impl<R: ProgressRecord> StreamDomain for ProgressDomain<R> {
    type Event = StreamEvent<R>;

    fn name(&self) -> &'static str {
        self.name
    }

    fn endpoint_segments(&self, id: &str) -> Vec<String> {
        vec!["api".to_string(), self.endpoint.to_string(), id.to_string()]
    }

    fn accepts(&self, message_type: &str) -> bool {
        self.record_kind_of(message_type).is_some()
    }

    fn subscribe_frames(&self, id: &str) -> Vec<String> {
        let payload = SubscribePayload { progress_id: id.to_string() };
        match serde_json::to_value(&payload) {
            Ok(data) => vec![Envelope::new(SUBSCRIBE_MESSAGE_TYPE, Some(data)).to_json()],
            Err(e) => {
                log::error!("[{}] 序列化订阅帧失败: {}", self.name, e);
                Vec::new()
            }
        }
    }

    /// 把信封解码为进度事件。
    ///
    /// 依次检查消息类别、`data` 形态，补齐缺失的终止状态，按记录类型反序列化，
    /// 最后核对 `progressId` 与订阅标识是否一致。
    fn decode(&self, id: &str, envelope: Envelope) -> Result<StreamEvent<R>, EnvelopeRejection> {
        let Some(kind) = self.record_kind_of(&envelope.message_type) else {
            return Err(EnvelopeRejection::UnrecognizedType { message_type: envelope.message_type });
        };
        let message_type = envelope.message_type;
        let mut data = match envelope.data {
            Some(Value::Object(data)) => data,
            _ => return Err(EnvelopeRejection::MissingData { message_type }),
        };

        // 完成/失败消息可能省略 status，按消息类别补齐
        if !data.contains_key("status") {
            match kind {
                RecordKind::Completed => {
                    data.insert("status".to_string(), Value::String("completed".to_string()));
                }
                RecordKind::Error => {
                    data.insert("status".to_string(), Value::String("error".to_string()));
                }
                RecordKind::Progress => {}
            }
        }

        let record: R = serde_json::from_value(Value::Object(data)).map_err(|e| {
            EnvelopeRejection::InvalidRecord { message_type: message_type.clone(), reason: e.to_string() }
        })?;
        if record.progress_id() != id {
            return Err(EnvelopeRejection::ForeignProgressId {
                expected: id.to_string(),
                found: record.progress_id().to_string(),
            });
        }
        if kind_contradicts_status(kind, &record) {
            // 仍按消息类型交付，消息类型是操作结束与否的依据
            log::warn!(
                "[{}] {} 携带非终止状态 '{}'，仍按终止事件交付。",
                self.name,
                message_type,
                record.status_label()
            );
        }

        Ok(match kind {
            RecordKind::Progress => StreamEvent::Progress(record),
            RecordKind::Completed => StreamEvent::Completed(record),
            RecordKind::Error => StreamEvent::Failed(record),
        })
    }
}

/// 终止类消息 (`*_completed` / `*_error`) 携带的 status 却不是终止状态。
fn kind_contradicts_status<R: ProgressRecord>(kind: RecordKind, record: &R) -> bool {
    match kind {
        RecordKind::Progress => false,
        RecordKind::Completed | RecordKind::Error => !record.is_terminal(),
    }
}
