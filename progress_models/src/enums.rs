//! 通用枚举模块。
//!
//! 本模块定义各进度领域的状态集合以及日志级别、聊天发送方等共享枚举。
//! 线上表示统一为 snake_case 字符串 (例如 `"crawling"`、`"document_storage"`)，
//! 不在集合内的状态值会在反序列化时失败，从而在解析边界上被拒绝。
//!
//! 每个进度状态枚举都包含 `Completed` 与 `Error` 两个成员，
//! 客户端在 `*_completed` / `*_error` 消息缺少 `status` 字段时会据此补齐。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 爬取任务的状态。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CrawlStatus {
    /// 已创建，尚未开始
    Starting,
    /// 分析站点结构 (sitemap、llms.txt 等)
    Analyzing,
    /// 抓取页面
    Crawling,
    /// 处理抓取到的内容
    Processing,
    /// 创建知识源
    SourceCreation,
    /// 写入文档存储
    DocumentStorage,
    /// 提取代码示例
    CodeExtraction,
    /// 收尾
    Finalization,
    /// 完成
    Completed,
    /// 失败
    Error,
    /// 已取消
    Cancelled,
}

impl CrawlStatus {
    /// 是否为终止状态 (完成、失败或已取消)。
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Cancelled)
    }
}

/// 项目创建任务的状态。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProjectCreationStatus {
    /// 已创建，尚未开始
    Starting,
    /// 初始化智能体
    InitializingAgents,
    /// 生成项目文档
    GeneratingDocs,
    /// 处理需求
    ProcessingRequirements,
    /// AI 生成中
    AiGeneration,
    /// 收尾
    Finalizing,
    /// 完成
    Completed,
    /// 失败
    Error,
}

impl ProjectCreationStatus {
    /// 是否为终止状态 (完成或失败)。
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// 测试运行的状态。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TestRunStatus {
    /// 准备中
    Starting,
    /// 执行中
    Running,
    /// 执行完毕，全部通过
    Completed,
    /// 执行完毕，存在失败用例
    Failed,
    /// 运行本身出错 (例如测试进程无法启动)
    Error,
    /// 已取消
    Cancelled,
}

impl TestRunStatus {
    /// 除准备中与执行中以外的状态都是终止状态。
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Starting | Self::Running)
    }
}

/// 服务器日志条目的级别。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// 调试
    Debug,
    /// 信息
    Info,
    /// 警告，也接受 `"warn"`
    #[serde(alias = "warn")]
    Warning,
    /// 错误
    Error,
}

/// 聊天消息的发送方。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChatSender {
    /// 用户
    User,
    /// 智能体
    Agent,
    /// 系统通知
    System,
}

// Display 统一输出线上使用的 snake_case 字符串，便于日志与命令行展示
macro_rules! impl_wire_display {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    match serde_json::to_value(self) {
                        Ok(serde_json::Value::String(label)) => f.write_str(&label),
                        _ => write!(f, "{:?}", self),
                    }
                }
            }
        )+
    };
}

impl_wire_display!(CrawlStatus, ProjectCreationStatus, TestRunStatus, LogLevel, ChatSender);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    /// 测试状态值与线上 snake_case 字符串之间的对应关系。
    fn test_crawl_status_wire_names() {
        let parsed: CrawlStatus = serde_json::from_str("\"document_storage\"").expect("合法状态应能解析");
        assert_eq!(parsed, CrawlStatus::DocumentStorage);
        assert_eq!(serde_json::to_string(&CrawlStatus::Crawling).unwrap(), "\"crawling\"");
        assert_eq!(CrawlStatus::CodeExtraction.to_string(), "code_extraction");
    }

    #[test]
    /// 不在集合内的状态值必须反序列化失败。
    fn test_unknown_status_is_rejected() {
        assert!(serde_json::from_str::<CrawlStatus>("\"sleeping\"").is_err());
        assert!(serde_json::from_str::<ProjectCreationStatus>("\"crawling\"").is_err());
        assert!(serde_json::from_str::<TestRunStatus>("42").is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(CrawlStatus::Cancelled.is_terminal());
        assert!(!CrawlStatus::Processing.is_terminal());
        assert!(ProjectCreationStatus::Error.is_terminal());
        assert!(!ProjectCreationStatus::AiGeneration.is_terminal());
        assert!(TestRunStatus::Failed.is_terminal());
        assert!(!TestRunStatus::Running.is_terminal());
    }

    #[test]
    /// `warn` 作为 `warning` 的别名被接受，且级别可排序。
    fn test_log_level_alias_and_order() {
        let level: LogLevel = serde_json::from_str("\"warn\"").unwrap();
        assert_eq!(level, LogLevel::Warning);
        assert!(LogLevel::Error > LogLevel::Info);
        assert_eq!(LogLevel::Warning.to_string(), "warning");
    }

    #[test]
    fn test_chat_sender_hash() {
        let mut senders = HashSet::new();
        senders.insert(ChatSender::User);
        senders.insert(ChatSender::User);
        senders.insert(ChatSender::Agent);
        assert_eq!(senders.len(), 2);
        assert!(!senders.contains(&ChatSender::System));
    }
}
