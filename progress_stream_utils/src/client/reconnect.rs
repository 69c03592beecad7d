// progress_stream_utils/src/client/reconnect.rs

//! 重连控制器：决定异常断开后是否重连以及等待多久。
//!
//! 退避算法为指数退避 `delay = base_delay * 2^attempt`，并以 `max_delay` 封顶；
//! `attempt` 从 0 开始计数，因此第一次重连恰好等待 `base_delay`。
//! 达到 `max_attempts` 次后不再重连。

use crate::client::transport::CloseInfo;
use std::time::Duration;

/// 默认重连基础延迟。
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(1000);
/// 默认单次重连延迟上限。
pub const DEFAULT_MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);
/// 默认最多连续重连次数。
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// 重连策略。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// 第一次重连前的等待时间。
    pub base_delay: Duration,
    /// 单次等待时间的上限。
    pub max_delay: Duration,
    /// 两次成功打开之间最多安排的重连次数，0 表示从不重连。
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_RECONNECT_DELAY,
            max_delay: DEFAULT_MAX_RECONNECT_DELAY,
            max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
        }
    }
}

impl ReconnectPolicy {
    /// 关闭事件是否需要进入重连评估。只有关闭码 1000 被视为正常关闭。
    pub fn should_reconnect(close: &CloseInfo) -> bool {
        !close.is_normal()
    }

    /// 计算下一次重连前应等待的时间。
    ///
    /// # Arguments
    /// * `attempt` - 自上次成功打开以来已安排的重连次数 (从 0 开始)。
    ///
    /// # Returns
    /// * `Some(delay)` - `min(base_delay * 2^attempt, max_delay)`，乘法溢出时取 `max_delay`。
    /// * `None` - 已用尽重连次数，应停止重连。
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        let delay = self.base_delay.checked_mul(factor).unwrap_or(self.max_delay);
        Some(delay.min(self.max_delay))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::transport::NO_STATUS_CODE;

    #[test]
    fn test_first_retry_waits_exactly_base_delay() {
        let policy = ReconnectPolicy { base_delay: Duration::from_millis(1000), ..Default::default() };
        assert_eq!(policy.delay_for(0), Some(Duration::from_millis(1000)));
    }

    #[test]
    fn test_delay_doubles_and_is_capped() {
        let policy = ReconnectPolicy {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(3),
            max_attempts: 6,
        };
        let delays: Vec<_> = (0..6).map(|attempt| policy.delay_for(attempt)).collect();
        assert_eq!(
            delays,
            vec![
                Some(Duration::from_millis(500)),
                Some(Duration::from_millis(1000)),
                Some(Duration::from_millis(2000)),
                Some(Duration::from_secs(3)),
                Some(Duration::from_secs(3)),
                Some(Duration::from_secs(3)),
            ]
        );
        assert_eq!(policy.delay_for(6), None);
    }

    #[test]
    fn test_huge_attempt_numbers_do_not_overflow() {
        let policy = ReconnectPolicy { max_attempts: u32::MAX, ..Default::default() };
        assert_eq!(policy.delay_for(40), Some(DEFAULT_MAX_RECONNECT_DELAY));
    }

    #[test]
    fn test_zero_attempts_never_reconnects() {
        let policy = ReconnectPolicy { max_attempts: 0, ..Default::default() };
        assert_eq!(policy.delay_for(0), None);
    }

    #[test]
    /// 只有 1000 是正常关闭，其余任何关闭码都需要重连评估。
    fn test_only_code_1000_is_normal() {
        assert!(!ReconnectPolicy::should_reconnect(&CloseInfo::normal("done")));
        assert!(ReconnectPolicy::should_reconnect(&CloseInfo::abnormal("lost")));
        assert!(ReconnectPolicy::should_reconnect(&CloseInfo::new(1001, "going away")));
        assert!(ReconnectPolicy::should_reconnect(&CloseInfo::new(NO_STATUS_CODE, "")));
    }
}
