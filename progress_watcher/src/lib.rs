//! `progress_watcher`：订阅一条 Archon 进度流并把收到的每条事件写入日志。
//!
//! 用法：`progress_watcher <domain> <id> [--config <path>]`，`domain` 取
//! `crawl`、`project`、`test`、`logs`、`chat` 之一。收到终止记录、连接进入终止状态
//! 或用户按下 Ctrl-C 时退出。

pub mod error;
pub mod format;

use crate::error::WatcherError;
use crate::format::{EventLine, format_chat_event, format_log_entry, format_progress};
use clap::{Parser, ValueEnum};
use log::{LevelFilter, error, info, log};
use progress_models::{CrawlProgressData, ProjectCreationProgressData, TestRunProgressData};
use progress_stream_utils::{
    ChatDomain, CloseInfo, ProgressDomain, ProgressStreamClient, ServerLogDomain, StreamConfig, StreamDomain,
    StreamHandlers,
};
use std::future::Future;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// 命令行参数。
#[derive(Parser, Debug)]
#[command(name = "progress_watcher")]
#[command(version, about = "订阅 Archon 进度流并输出收到的每一条事件")]
pub struct Cli {
    /// 要订阅的流领域
    #[arg(value_enum)]
    pub domain: WatchDomain,

    /// 进度标识、MCP 服务器标识或聊天会话标识
    pub id: String,

    /// 配置文件路径，缺省时按默认位置查找 archon_stream.json
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// 可以观察的流领域。
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchDomain {
    /// 爬取进度 (`/api/crawl-progress/<id>`)
    Crawl,
    /// 项目创建进度 (`/api/project-creation-progress/<id>`)
    Project,
    /// 测试运行进度 (`/api/test-progress/<id>`)
    Test,
    /// MCP 服务器日志 (`/api/mcp/servers/<id>/logs/stream`)
    Logs,
    /// 智能体聊天会话 (`/api/agent-chat/sessions/<id>/ws`)
    Chat,
}

/// 一次观察的结局。
#[derive(Debug, Clone, PartialEq)]
pub enum WatchOutcome {
    /// 收到了终止记录 (完成或失败)。
    Finished,
    /// 连接进入终止状态。
    Closed(CloseInfo),
    /// 用户中断。
    Interrupted,
}

/// 回调向观察循环发出的信号。
enum Signal {
    /// 收到了终止记录。
    Terminal,
    /// 连接进入终止状态。
    Closed(CloseInfo),
}

/// 解析配置中的日志级别，无法识别时退回 `Info`。
pub fn log_level_filter(raw: &str) -> LevelFilter {
    raw.trim().parse().unwrap_or(LevelFilter::Info)
}

/// 按命令行选择的领域构造客户端并开始观察。
///
/// # Arguments
/// * `cli` - 命令行参数 (领域与标识)。
/// * `config` - 已加载的配置，提供基础地址与连接选项。
/// * `shutdown` - 完成时中断观察，例如 Ctrl-C。
///
/// # Returns
/// * `Ok(WatchOutcome)` - 观察的结局。
/// * `Err(WatcherError)` - 配置无效或订阅失败。
pub async fn run_watch(
    cli: &Cli,
    config: &StreamConfig,
    shutdown: impl Future<Output = ()>,
) -> Result<WatchOutcome, WatcherError> {
    config.validate()?;
    let id = cli.id.as_str();
    match cli.domain {
        WatchDomain::Crawl => {
            let client = ProgressStreamClient::from_config(ProgressDomain::crawl(), config);
            watch_stream(&client, id, format_progress::<CrawlProgressData>, shutdown).await
        }
        WatchDomain::Project => {
            let client = ProgressStreamClient::from_config(ProgressDomain::project_creation(), config);
            watch_stream(&client, id, format_progress::<ProjectCreationProgressData>, shutdown).await
        }
        WatchDomain::Test => {
            let client = ProgressStreamClient::from_config(ProgressDomain::test_run(), config);
            watch_stream(&client, id, format_progress::<TestRunProgressData>, shutdown).await
        }
        WatchDomain::Logs => {
            let client = ProgressStreamClient::from_config(ServerLogDomain, config);
            watch_stream(&client, id, format_log_entry, shutdown).await
        }
        WatchDomain::Chat => {
            let client = ProgressStreamClient::from_config(ChatDomain, config);
            watch_stream(&client, id, format_chat_event, shutdown).await
        }
    }
}

/// 订阅 `id` 并记录每条事件，直到终止记录、终止关闭或 `shutdown` 完成。
///
/// 返回之前总会断开该连接。
///
/// # Arguments
/// * `client` - 任意领域的流客户端。
/// * `id` - 订阅标识。
/// * `describe` - 把领域事件格式化为日志行，并指出是否为终止事件。
/// * `shutdown` - 完成时中断观察。
pub async fn watch_stream<D, F>(
    client: &ProgressStreamClient<D>,
    id: &str,
    describe: F,
    shutdown: impl Future<Output = ()>,
) -> Result<WatchOutcome, WatcherError>
where
    D: StreamDomain,
    F: Fn(&D::Event) -> EventLine + Send + 'static,
{
    let (signal_tx, mut signal_rx) = mpsc::unbounded_channel();
    let terminal_tx = signal_tx.clone();
    let domain_name = client.domain().name();

    let handlers = StreamHandlers::new(move |event: D::Event| {
        let line = describe(&event);
        log!(line.level, "[{}] {}", domain_name, line.text);
        if line.terminal {
            let _ = terminal_tx.send(Signal::Terminal); // 观察循环已结束时忽略
        }
    })
    .on_error(move |err| error!("[{}] {}", domain_name, err))
    .on_close(move |close| {
        let _ = signal_tx.send(Signal::Closed(close));
    });

    let handle = client.stream_progress(id, handlers, None).await?;
    info!("[观察器] 正在观察 {}", handle.url());

    tokio::pin!(shutdown);
    let outcome = tokio::select! {
        signal = signal_rx.recv() => match signal {
            Some(Signal::Terminal) => WatchOutcome::Finished,
            Some(Signal::Closed(close)) => WatchOutcome::Closed(close),
            None => return Err(WatcherError::StreamEnded),
        },
        _ = &mut shutdown => {
            info!("[观察器] 收到中断信号，正在断开连接。");
            WatchOutcome::Interrupted
        }
    };
    client.disconnect(id).await;
    Ok(outcome)
}
