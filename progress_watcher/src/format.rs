// progress_watcher/src/format.rs

//! 把各领域的事件格式化为一行日志。
//!
//! 格式化结果只描述“写什么、用什么级别、是否意味着结束”，真正的输出由调用方通过 `log` 宏完成。

use log::Level;
use progress_models::ws_payloads::ServerLogEntry;
use progress_models::{LogLevel, ProgressRecord};
use progress_stream_utils::{ChatEvent, StreamEvent};

/// 一条待输出的日志行。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLine {
    /// 输出该行使用的日志级别。
    pub level: Level,
    /// 不含领域前缀的日志正文。
    pub text: String,
    /// 该事件是否意味着被观察的操作已经结束。
    pub terminal: bool,
}

impl EventLine {
    /// 构造一条非终止的日志行。
    fn new(level: Level, text: impl Into<String>) -> Self {
        Self { level, text: text.into(), terminal: false }
    }

    /// 标记为终止行。
    fn terminal(mut self) -> Self {
        self.terminal = true;
        self
    }
}

/// 格式化一条进度事件。
///
/// # Arguments
/// * `event` - 爬取、项目创建或测试运行的进度事件。
///
/// # Returns
/// 进度更新为 `info` 级别，形如 `crawl-1 [crawling] 42.5% | 最后一行日志`；
/// 完成为 `info`、失败为 `error`，两者都标记为终止。
pub fn format_progress<R: ProgressRecord>(event: &StreamEvent<R>) -> EventLine {
    let record = event.record();
    let percentage = record.percentage().map(|p| format!("{:.1}%", p)).unwrap_or_else(|| "--".to_string());
    match event {
        StreamEvent::Progress(_) => {
            let last_log = record.logs().last().map(|l| format!(" | {}", l)).unwrap_or_default();
            let line = EventLine::new(
                Level::Info,
                format!("{} [{}] {}{}", record.progress_id(), record.status_label(), percentage, last_log),
            );
            // 部分后端用 *_progress 推送最终状态
            if record.is_terminal() { line.terminal() } else { line }
        }
        StreamEvent::Completed(_) => {
            EventLine::new(Level::Info, format!("{} 已完成 ({})", record.progress_id(), percentage)).terminal()
        }
        StreamEvent::Failed(_) => EventLine::new(
            Level::Error,
            format!("{} 失败: {}", record.progress_id(), record.error_message().unwrap_or("未知错误")),
        )
        .terminal(),
    }
}

/// 格式化一条服务器日志，服务端日志级别映射到本地日志级别。服务器日志流没有终止事件。
pub fn format_log_entry(entry: &ServerLogEntry) -> EventLine {
    let level = match entry.level {
        LogLevel::Debug => Level::Debug,
        LogLevel::Info => Level::Info,
        LogLevel::Warning => Level::Warn, // 服务端使用 warning
        LogLevel::Error => Level::Error,
    };
    let source = entry.source.as_deref().map(|s| format!(" [{}]", s)).unwrap_or_default();
    EventLine::new(level, format!("{}{} {}", entry.timestamp.format("%H:%M:%S%.3f"), source, entry.message))
}

/// 格式化一条聊天事件。输入状态为 `debug` 级别，会话错误为 `error` 级别。
pub fn format_chat_event(event: &ChatEvent) -> EventLine {
    match event {
        ChatEvent::Message(message) => EventLine::new(Level::Info, format!("{}: {}", message.sender, message.content)),
        ChatEvent::Typing(true) => EventLine::new(Level::Debug, "对方正在输入..."),
        ChatEvent::Typing(false) => EventLine::new(Level::Debug, "对方停止输入"),
        ChatEvent::StreamChunk(chunk) => EventLine::new(Level::Info, format!("… {}", chunk.content)),
        ChatEvent::StreamComplete(_) => EventLine::new(Level::Info, "流式回复结束"),
        ChatEvent::Error(error) => EventLine::new(Level::Error, format!("会话错误: {}", error)),
    }
}
