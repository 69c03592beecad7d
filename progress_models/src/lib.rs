//! `progress_models` 公共模型库 crate。
//!
//! 本 crate 集中定义了 Archon 进度流客户端 (`progress_stream_utils`) 与其消费者
//! (例如 `progress_watcher` 命令行工具) 之间共享的数据结构和枚举类型。
//! 这些结构与后端通过 WebSocket 推送的 JSON 信封 `{type, data}` 中的 `data` 部分一一对应。
//!
//! 主要包含以下类型的模型：
//! - **进度记录 (`progress_records`)**: 爬取、项目创建、测试运行三类长时间后台操作的进度快照。
//! - **WebSocket 消息负载 (`ws_payloads`)**: 消息类型常量、订阅/加入控制帧负载、
//!   服务器日志条目以及智能体聊天相关负载。
//! - **通用枚举 (`enums`)**: 各领域的有限状态集合、日志级别、聊天发送方等。
//!
//! 设计原则：
//! - 所有模型都派生 `Serialize`/`Deserialize`/`Debug`/`Clone`，字段名按后端约定使用 camelCase。
//! - 进度记录保留未知的扩展字段 (`extra`)，使交付给回调的记录与线上 `data` 对象保持一致。

pub mod enums;
pub mod progress_records;
pub mod ws_payloads;

pub use enums::{ChatSender, CrawlStatus, LogLevel, ProjectCreationStatus, TestRunStatus};
pub use progress_records::{
    CrawlProgressData, ProgressRecord, ProjectCreationProgressData, TestRunProgressData,
    TestRunSummary,
};
