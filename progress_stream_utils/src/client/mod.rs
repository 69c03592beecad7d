// progress_stream_utils/src/client/mod.rs

//! WebSocket 客户端模块。
//!
//! - `transport`: 单条底层连接的封装 (`ClientSocket`、`SocketConnector`、`TungsteniteConnector`)。
//! - `reconnect`: 指数退避重连策略。
//! - `liveness`: 只告警的活跃度监视器。
//! - `stream`: 按领域参数化的通用进度流客户端及其连接监督任务。

pub mod liveness;
pub mod reconnect;
pub mod stream;
pub mod transport;

#[cfg(test)]
pub(crate) mod mock;
