// progress_stream_utils/src/services.rs

//! 进程级的各领域流服务。
//!
//! 每个服务在第一次访问时按全局配置 (`config::get_config`) 构造一次，之后在整个进程内共享。
//! 需要注入连接器或配置的场景 (例如测试) 请直接使用 `ProgressStreamClient::with_connector`。

use crate::client::stream::ProgressStreamClient;
use crate::config::get_config;
use crate::domains::{ChatDomain, ProgressDomain, ServerLogDomain};
use progress_models::{CrawlProgressData, ProjectCreationProgressData, TestRunProgressData};
use std::sync::OnceLock;

/// 爬取进度客户端。
pub type CrawlProgressClient = ProgressStreamClient<ProgressDomain<CrawlProgressData>>;
/// 项目创建进度客户端。
pub type ProjectCreationProgressClient = ProgressStreamClient<ProgressDomain<ProjectCreationProgressData>>;
/// 测试运行进度客户端。
pub type TestProgressClient = ProgressStreamClient<ProgressDomain<TestRunProgressData>>;
/// MCP 服务器日志客户端。
pub type ServerLogClient = ProgressStreamClient<ServerLogDomain>;
/// 智能体聊天客户端。
pub type AgentChatClient = ProgressStreamClient<ChatDomain>;

static CRAWL_PROGRESS_SERVICE: OnceLock<CrawlProgressClient> = OnceLock::new();
static PROJECT_CREATION_PROGRESS_SERVICE: OnceLock<ProjectCreationProgressClient> = OnceLock::new();
static TEST_PROGRESS_SERVICE: OnceLock<TestProgressClient> = OnceLock::new();
static SERVER_LOG_SERVICE: OnceLock<ServerLogClient> = OnceLock::new();
static AGENT_CHAT_SERVICE: OnceLock<AgentChatClient> = OnceLock::new();

/// 获取进程级的爬取进度服务。
///
/// 第一次调用时按全局配置构造；若此前没有调用 `init_config`，则使用默认配置叠加环境变量覆盖。
///
/// # Returns
/// 在整个进程内共享的客户端引用，同一进程内每次返回同一个实例。
pub fn crawl_progress_service() -> &'static CrawlProgressClient {
    CRAWL_PROGRESS_SERVICE.get_or_init(|| ProgressStreamClient::from_config(ProgressDomain::crawl(), get_config()))
}

/// 获取进程级的项目创建进度服务，构造规则同 `crawl_progress_service`。
pub fn project_creation_progress_service() -> &'static ProjectCreationProgressClient {
    PROJECT_CREATION_PROGRESS_SERVICE
        .get_or_init(|| ProgressStreamClient::from_config(ProgressDomain::project_creation(), get_config()))
}

/// 获取进程级的测试运行进度服务。
pub fn test_progress_service() -> &'static TestProgressClient {
    TEST_PROGRESS_SERVICE.get_or_init(|| ProgressStreamClient::from_config(ProgressDomain::test_run(), get_config()))
}

/// 获取进程级的 MCP 服务器日志服务。
pub fn server_log_service() -> &'static ServerLogClient {
    SERVER_LOG_SERVICE.get_or_init(|| ProgressStreamClient::from_config(ServerLogDomain, get_config()))
}

/// 获取进程级的智能体聊天服务。
pub fn agent_chat_service() -> &'static AgentChatClient {
    AGENT_CHAT_SERVICE.get_or_init(|| ProgressStreamClient::from_config(ChatDomain, get_config()))
}
