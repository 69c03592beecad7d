// progress_stream_utils/src/client/liveness.rs

//! 心跳/活跃度监视器。
//!
//! 用于发现“套接字仍显示为打开、但服务端已停止发送”的停滞连接。
//! 每收到一帧 (包括控制帧) 都会重置计时；超时后只记录一条警告并重新计时，
//! 不会主动关闭连接。

use log::warn;
use std::time::Duration;
use tokio::time::{Instant, sleep_until};

/// 默认静默超时阈值。
pub const DEFAULT_LIVENESS_TIMEOUT: Duration = Duration::from_secs(60);

/// 单条连接的活跃度监视器。
#[derive(Debug)]
pub struct LivenessMonitor {
    /// 静默超过这么久即视为停滞。
    timeout: Duration,
    /// 最近一次收到帧的时刻。
    last_seen: Instant,
    /// 下一次报告停滞的时刻；报告后向后推一个 `timeout`。
    deadline: Instant,
}

impl LivenessMonitor {
    /// 创建监视器，从现在开始计时。
    pub fn new(timeout: Duration) -> Self {
        let now = Instant::now();
        Self { timeout, last_seen: now, deadline: now + timeout }
    }

    /// 静默超时阈值。
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 收到任意一帧时调用，重置计时。
    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
        self.deadline = self.last_seen + self.timeout;
    }

    /// 距离上一次收到消息经过的时间。
    pub fn silence(&self) -> Duration {
        self.last_seen.elapsed()
    }

    /// 在超时时刻完成的 future。
    ///
    /// 每次调用都读取当前的截止时刻，因此在 `select!` 循环中每轮重新创建即可反映最新的 `touch`。
    pub async fn expired(&self) {
        sleep_until(self.deadline).await;
    }

    /// 超时后调用：记录警告并重新计时。
    ///
    /// # Arguments
    /// * `context` - 日志前缀，通常是 `领域:标识`。
    ///
    /// # Returns
    /// 距离上一次收到帧已经过去的时长。
    pub fn report_stall(&mut self, context: &str) -> Duration {
        let silence = self.silence();
        warn!(
            "[{}] 已有 {:.1} 秒未收到任何消息 (超时阈值 {:?})，连接可能已停滞。",
            context,
            silence.as_secs_f64(),
            self.timeout
        );
        self.deadline = Instant::now() + self.timeout;
        silence
    }
}
