// progress_watcher/src/main.rs

//! `progress_watcher` 命令行入口。
//!
//! 启动顺序：
//! 1. 解析命令行参数；
//! 2. 加载配置 (`--config` 指定的文件或默认位置的 `archon_stream.json`)；
//! 3. 按配置中的日志级别初始化 `env_logger` (`RUST_LOG` 仍可覆盖)；
//! 4. 订阅指定的流，直到操作结束、连接终止或收到 Ctrl-C。
//!
//! 连接以非 1000 的关闭码终止时以错误退出，其余情况正常退出。

use anyhow::Context; // 为配置加载错误附加说明
use clap::Parser;
use log::{error, info, warn};
use progress_stream_utils::{init_config, init_config_with};
use progress_watcher::error::WatcherError;
use progress_watcher::{Cli, WatchOutcome, log_level_filter, run_watch};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 配置需要在日志初始化之前加载，日志级别来自配置
    let config = match &cli.config {
        Some(path) => init_config_with(path).with_context(|| format!("无法加载配置文件 {}", path.display()))?,
        None => init_config().context("无法加载默认配置文件")?,
    };

    // 初始化日志记录器
    env_logger::Builder::new()
        .filter_level(log_level_filter(&config.log_level))
        .parse_default_env() // 允许 RUST_LOG 覆盖配置中的级别
        .format_timestamp_millis()
        .init();
    info!("[主程序] 日志系统已初始化，级别: {}。", config.log_level);
    info!("[主程序] 基础地址: {}，领域: {:?}，标识: {}", config.base_url, cli.domain, cli.id);

    // Ctrl-C 作为中断信号；无法监听时只记录错误，观察仍可因流结束而退出
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("[主程序] 无法监听 Ctrl-C 信号: {}", e);
            std::future::pending::<()>().await;
        }
    };

    match run_watch(&cli, config, shutdown).await? {
        WatchOutcome::Finished => info!("[主程序] 操作已结束，退出。"),
        WatchOutcome::Interrupted => info!("[主程序] 用户中断，退出。"),
        WatchOutcome::Closed(close) if close.is_normal() => {
            info!("[主程序] 服务端正常关闭连接: {}", close.reason);
        }
        WatchOutcome::Closed(close) => {
            warn!("[主程序] 连接异常关闭 (code={})。", close.code);
            return Err(WatcherError::ConnectionLost { code: close.code, reason: close.reason }.into());
        }
    }
    Ok(())
}
