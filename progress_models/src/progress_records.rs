// progress_models/src/progress_records.rs

//! 进度记录模型。
//!
//! 进度记录描述一个长时间运行的后台操作 (爬取、项目创建、测试运行) 在某一时刻的状态，
//! 对应 `*_progress` / `*_completed` / `*_error` 信封中的 `data` 对象。
//! 记录必须带有 `progressId` 与领域内合法的 `status`；`percentage` 可选但必须是有限数值。
//! 未识别的额外字段收集到 `extra` 中并在序列化时原样写回。

use crate::enums::{CrawlStatus, ProjectCreationStatus, TestRunStatus};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::Debug;

/// 所有进度记录类型共有的只读视图。
///
/// 流客户端与命令行工具通过此 trait 以统一方式读取不同领域的记录。
pub trait ProgressRecord: Serialize + DeserializeOwned + Clone + Debug + Send + 'static {
    /// 记录所属的进度标识。
    fn progress_id(&self) -> &str;
    /// 完成百分比 (0-100)，后端未提供时为 `None`。
    fn percentage(&self) -> Option<f64>;
    /// 状态的线上字符串表示。
    fn status_label(&self) -> String;
    /// 领域错误信息 (仅在失败记录中出现)。
    fn error_message(&self) -> Option<&str>;
    /// 记录是否表示操作已经结束。
    fn is_terminal(&self) -> bool;
    /// 本次更新附带的日志行。
    fn logs(&self) -> &[String];
}

/// 爬取进度记录 (`crawl_progress` / `crawl_completed` / `crawl_error`)。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CrawlProgressData {
    /// 进度标识，与订阅标识一致。
    pub progress_id: String,
    pub status: CrawlStatus,
    /// 完成百分比 (0-100)。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
    /// 本次更新附带的日志行。
    #[serde(default)]
    pub logs: Vec<String>,
    /// 正在抓取的页面。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_pages: Option<u64>,
    /// 完成后生成的知识源标识。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    /// 失败原因 (仅 `crawl_error`)。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// 未建模的扩展字段。
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 项目创建进度记录 (`project_creation_progress` 等)。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectCreationProgressData {
    /// 进度标识，与订阅标识一致。
    pub progress_id: String,
    pub status: ProjectCreationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
    #[serde(default)]
    pub logs: Vec<String>,
    /// 当前步骤的描述文本。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    /// 后端估计的剩余时间 (自由文本，例如 "2 minutes")。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta: Option<String>,
    /// 新建项目的标识，通常在完成时出现。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// 完成时后端返回的项目对象，结构由后端决定。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 测试运行结束时的统计摘要。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TestRunSummary {
    /// 用例总数
    pub total: u32,
    /// 通过数
    pub passed: u32,
    /// 失败数
    pub failed: u32,
    /// 跳过数，后端可能省略
    #[serde(default)]
    pub skipped: u32,
}

/// 测试运行进度记录 (`test_progress` / `test_completed` / `test_error`)。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestRunProgressData {
    /// 进度标识，与订阅标识一致。
    pub progress_id: String,
    pub status: TestRunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
    #[serde(default)]
    pub logs: Vec<String>,
    /// 测试类型，例如 "mcp" 或 "ui"。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_type: Option<String>,
    /// 测试进程的退出码。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// 结束时的统计摘要。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<TestRunSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

macro_rules! impl_progress_record {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl ProgressRecord for $ty {
                fn progress_id(&self) -> &str {
                    &self.progress_id
                }

                fn percentage(&self) -> Option<f64> {
                    self.percentage
                }

                fn status_label(&self) -> String {
                    self.status.to_string()
                }

                fn error_message(&self) -> Option<&str> {
                    self.error.as_deref()
                }

                fn is_terminal(&self) -> bool {
                    self.status.is_terminal()
                }

                fn logs(&self) -> &[String] {
                    &self.logs
                }
            }
        )+
    };
}

impl_progress_record!(CrawlProgressData, ProjectCreationProgressData, TestRunProgressData);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    /// 测试爬取记录从线上 JSON 的解析，并确认未知字段保存在 `extra` 中。
    fn test_crawl_record_from_wire() {
        let data = json!({
            "progressId": "crawl-123",
            "status": "crawling",
            "percentage": 25,
            "logs": ["Fetching sitemap"],
            "currentUrl": "https://docs.example.com/intro",
            "totalPages": 40,
            "crawlType": "sitemap"
        });
        let record: CrawlProgressData = serde_json::from_value(data).expect("合法的爬取记录应能解析");
        assert_eq!(record.progress_id, "crawl-123");
        assert_eq!(record.status, CrawlStatus::Crawling);
        assert_eq!(record.percentage, Some(25.0));
        assert_eq!(record.logs, vec!["Fetching sitemap".to_string()]);
        assert_eq!(record.total_pages, Some(40));
        assert_eq!(record.extra.get("crawlType"), Some(&json!("sitemap")));
        assert!(!record.is_terminal());
    }

    #[test]
    /// 缺少 `status` 或 `progressId` 的记录必须解析失败。
    fn test_record_requires_identity_and_status() {
        let missing_status = json!({"progressId": "crawl-1", "percentage": 10});
        assert!(serde_json::from_value::<CrawlProgressData>(missing_status).is_err());

        let missing_id = json!({"status": "starting"});
        assert!(serde_json::from_value::<ProjectCreationProgressData>(missing_id).is_err());
    }

    #[test]
    /// 扩展字段在序列化时原样写回。
    fn test_extra_fields_survive_serialization() {
        let data = json!({
            "progressId": "proj-9",
            "status": "generating_docs",
            "logs": [],
            "agentCount": 3
        });
        let record: ProjectCreationProgressData = serde_json::from_value(data.clone()).unwrap();
        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn test_test_run_record_accessors() {
        let record: TestRunProgressData = serde_json::from_value(json!({
            "progressId": "run-7",
            "status": "failed",
            "exitCode": 1,
            "summary": {"total": 12, "passed": 10, "failed": 2},
            "error": "2 tests failed"
        }))
        .unwrap();
        assert_eq!(record.summary.map(|s| s.skipped), Some(0));
        assert_eq!(record.error_message(), Some("2 tests failed"));
        assert_eq!(record.status_label(), "failed");
        assert!(record.is_terminal());
        assert!(record.logs().is_empty());
    }
}
