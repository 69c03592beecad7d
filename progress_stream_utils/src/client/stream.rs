// progress_stream_utils/src/client/stream.rs

//! 通用进度流客户端。
//!
//! `ProgressStreamClient<D>` 为每个订阅标识维护一条逻辑连接。每条连接由一个独立的
//! Tokio 任务 (连接监督者) 驱动，它独占底层套接字、回调、活跃度监视器与重连计时器，
//! 因此同一标识的回调严格按接收顺序依次执行。
//!
//! 连接状态机：
//! - `Idle` → `Connecting`：调用 `stream_progress`；
//! - `Connecting` → `Open`：握手完成，重连计数清零并发送订阅帧；
//! - `Open` → `Closed`：收到关闭码 1000，不再重连并调用 `on_close`；
//! - `Open`/`Connecting` → `Reconnecting`：其它关闭码或传输层错误 (启用自动重连时)；
//! - `Reconnecting` → `Connecting`：退避延迟结束，构造新的套接字；
//! - `Reconnecting` → `Closed`：重连次数用尽，`on_error` 与 `on_close` 各调用一次；
//! - 任意状态 → `Closed`：调用 `disconnect`，回调被清除，不再调用。
//!
//! 客户端本身只持有一张 `标识 → 连接登记项` 的表 (受 `tokio::sync::Mutex` 保护)，
//! 登记项里是与监督任务通信所需的通道和任务句柄；连接的全部可变状态都留在监督任务内部。

use crate::client::liveness::{DEFAULT_LIVENESS_TIMEOUT, LivenessMonitor};
use crate::client::reconnect::{
    DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_MAX_RECONNECT_DELAY, DEFAULT_RECONNECT_DELAY, ReconnectPolicy,
};
use crate::client::transport::{ClientSocket, CloseInfo, SocketConnector, TransportEvent, TungsteniteConnector};
use crate::config::{StreamConfig, websocket_base_url};
use crate::domains::StreamDomain;
use crate::error::StreamError;
use crate::message::{ControlKind, Envelope, EnvelopeRejection, decode_envelope};
use chrono::{DateTime, Utc}; // 记录最近一次收到消息的时间
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU8, AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at, sleep};
use url::Url;

/// 单条连接的选项。
///
/// 未显式传入时使用客户端的默认选项 (通常由 `StreamConfig` 转换而来)。
#[derive(Debug, Clone, PartialEq)]
pub struct StreamOptions {
    /// 非正常关闭 (关闭码不是 1000) 或传输层错误后是否自动重连，默认 `true`。
    pub auto_reconnect: bool,
    /// 重连基础延迟，第一次重连恰好等待这么久，之后每次翻倍。默认 1 秒。
    pub reconnect_delay: Duration,
    /// 两次成功打开之间最多安排的重连次数，默认 5 次。
    pub max_reconnect_attempts: u32,
    /// 单次重连延迟的上限，默认 30 秒。
    pub max_reconnect_delay: Duration,
    /// 超过这么久没有收到任何帧时记录一条警告 (不会主动断开)，默认 60 秒。
    pub liveness_timeout: Duration,
    /// 客户端主动发送 `ping` 的间隔，`None` 表示不发送。
    pub keepalive_interval: Option<Duration>,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            max_reconnect_delay: DEFAULT_MAX_RECONNECT_DELAY,
            liveness_timeout: DEFAULT_LIVENESS_TIMEOUT,
            keepalive_interval: None,
        }
    }
}

impl From<&StreamConfig> for StreamOptions {
    /// 把配置文件中以毫秒表示的字段转换为连接选项。`keepalive_interval_ms` 为 0 视同关闭。
    fn from(config: &StreamConfig) -> Self {
        Self {
            auto_reconnect: config.auto_reconnect,
            reconnect_delay: Duration::from_millis(config.reconnect_delay_ms),
            max_reconnect_attempts: config.max_reconnect_attempts,
            max_reconnect_delay: Duration::from_millis(config.max_reconnect_delay_ms),
            liveness_timeout: Duration::from_millis(config.liveness_timeout_ms),
            keepalive_interval: config.keepalive_interval_ms.filter(|ms| *ms > 0).map(Duration::from_millis),
        }
    }
}

impl StreamOptions {
    /// 由本选项中的重连字段构造退避策略。
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay: self.reconnect_delay,
            max_delay: self.max_reconnect_delay,
            max_attempts: self.max_reconnect_attempts,
        }
    }
}

/// 逻辑连接的状态。
///
/// 以 `u8` 存放在原子变量中，句柄可以在任意线程无锁读取。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// 已登记，监督任务尚未开始连接。
    Idle = 0,
    /// 正在建立传输层连接 (首次或重连)。
    Connecting = 1,
    /// 传输层已打开，订阅帧已发送。
    Open = 2,
    /// 非正常关闭后正在等待退避延迟。
    Reconnecting = 3,
    /// 终止状态：正常关闭、重连耗尽、主动断开或监督任务异常结束。
    Closed = 4,
}

impl ConnectionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Idle,
            1 => Self::Connecting,
            2 => Self::Open,
            3 => Self::Reconnecting,
            _ => Self::Closed, // 未知取值一律按终止状态处理
        }
    }
}

/// 连接监督者与句柄之间共享的状态。
#[derive(Debug)]
struct ConnectionShared {
    /// 当前 `ConnectionState` 的 `u8` 表示。
    state: AtomicU8,
    /// 自上次成功打开以来已安排的重连次数。
    reconnect_attempts: AtomicU32,
    /// 最近一次收到消息的 UTC 毫秒时间戳，0 表示尚未收到。
    last_message_at_ms: AtomicI64,
    /// 已请求关闭；监督者在构造新套接字之前检查此标志。
    shutdown: AtomicBool,
}

impl ConnectionShared {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(ConnectionState::Idle as u8),
            reconnect_attempts: AtomicU32::new(0),
            last_message_at_ms: AtomicI64::new(0),
            shutdown: AtomicBool::new(false),
        }
    }

    fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn record_message(&self) {
        self.last_message_at_ms.store(Utc::now().timestamp_millis(), Ordering::Release);
    }
}

/// 对一条逻辑连接的只读视图，可以自由克隆。
///
/// 句柄与监督任务共享状态，读取的始终是最新值；连接被替换或断开后，旧句柄停留在 `Closed`。
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: String,
    url: Url,
    shared: Arc<ConnectionShared>,
}

impl ConnectionHandle {
    /// 订阅时传入的标识 (进度标识、服务器标识或会话标识)。
    pub fn id(&self) -> &str {
        &self.id
    }

    /// 该连接使用的完整端点 URL。
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// 连接的当前状态。
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// 底层传输当前是否处于打开状态。
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// 自上次成功打开以来已安排的重连次数。
    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.reconnect_attempts.load(Ordering::Acquire)
    }

    /// 最近一次收到消息 (含控制帧) 的时间，尚未收到时为 `None`。
    pub fn last_message_at(&self) -> Option<DateTime<Utc>> {
        match self.shared.last_message_at_ms.load(Ordering::Acquire) {
            0 => None,
            ms => DateTime::from_timestamp_millis(ms),
        }
    }
}

/// 收到一条领域事件时调用。
pub type MessageCallback<E> = Box<dyn FnMut(E) + Send>;
/// 传输层错误、重连耗尽或服务端错误消息时调用。
pub type ErrorCallback = Box<dyn FnMut(StreamError) + Send>;
/// 连接进入终止状态 (主动断开除外) 时调用。
pub type CloseCallback = Box<dyn FnMut(CloseInfo) + Send>;

/// 一条连接的回调集合：每个类别一个回调。
///
/// 回调在该连接的监督任务上依次执行，不应长时间阻塞。
pub struct StreamHandlers<E> {
    on_message: MessageCallback<E>,
    on_error: Option<ErrorCallback>,
    on_close: Option<CloseCallback>,
}

impl<E> StreamHandlers<E> {
    /// 以必需的消息回调创建回调集合。
    ///
    /// # Arguments
    /// * `on_message` - 每条通过校验的领域事件调用一次，按接收顺序。
    pub fn new(on_message: impl FnMut(E) + Send + 'static) -> Self {
        Self { on_message: Box::new(on_message), on_error: None, on_close: None }
    }

    /// 设置错误回调，替换之前设置的回调。
    pub fn on_error(mut self, on_error: impl FnMut(StreamError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(on_error));
        self
    }

    /// 设置关闭回调，替换之前设置的回调。
    pub fn on_close(mut self, on_close: impl FnMut(CloseInfo) + Send + 'static) -> Self {
        self.on_close = Some(Box::new(on_close));
        self
    }

    fn message(&mut self, event: E) {
        (self.on_message)(event);
    }

    fn error(&mut self, err: StreamError) {
        if let Some(on_error) = self.on_error.as_mut() {
            on_error(err);
        }
    }

    fn close(&mut self, info: CloseInfo) {
        if let Some(on_close) = self.on_close.as_mut() {
            on_close(info);
        }
    }
}

impl<E> std::fmt::Debug for StreamHandlers<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandlers")
            .field("on_error", &self.on_error.is_some())
            .field("on_close", &self.on_close.is_some())
            .finish()
    }
}

/// 客户端登记表中的一项：与某条连接的监督任务通信所需的全部句柄。
struct ConnectionEntry {
    handle: ConnectionHandle,
    /// 发送 `true` 通知监督者退出；发送端被丢弃同样视为退出请求。
    shutdown_tx: watch::Sender<bool>,
    /// 经由监督者转发到套接字的原始文本帧。
    outbound_tx: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

impl ConnectionEntry {
    /// 监督任务仍在运行且连接尚未进入终止状态。
    fn is_live(&self) -> bool {
        !self.task.is_finished() && self.handle.state() != ConnectionState::Closed
    }

    /// 通知监督者退出并等待其结束。
    ///
    /// 先设置共享的关闭标志 (挡住即将触发的重连计时器)，再通过 `watch` 通道唤醒监督者。
    async fn shutdown(self) {
        self.handle.shared.shutdown.store(true, Ordering::Release);
        let _ = self.shutdown_tx.send(true); // 监督者可能已经退出，忽略发送失败
        if let Err(e) = self.task.await {
            if e.is_panic() {
                error!("[流客户端] 连接 {} 的监督任务因回调 panic 而退出: {}", self.handle.id, e);
            }
        }
        self.handle.shared.set_state(ConnectionState::Closed);
    }
}

/// 按领域参数化的进度流客户端。
///
/// 同一客户端可以同时订阅多个标识，每个标识至多一条连接。不同领域的客户端之间不共享任何可变状态。
pub struct ProgressStreamClient<D: StreamDomain> {
    domain: Arc<D>,
    /// 配置中的原始基础地址，构造端点 URL 时再校验。
    base_url: String,
    connector: Arc<dyn SocketConnector>,
    default_options: StreamOptions,
    connections: Mutex<HashMap<String, ConnectionEntry>>,
}

impl<D: StreamDomain> ProgressStreamClient<D> {
    /// 使用默认基础地址 (`ws://localhost:8181`) 与默认选项创建客户端。
    pub fn new(domain: D) -> Self {
        Self::from_config(domain, &StreamConfig::default())
    }

    /// 按配置创建使用真实 WebSocket 连接器的客户端。
    ///
    /// # Arguments
    /// * `domain` - 流领域 (端点模板、消息类型与解码方式)。
    /// * `config` - 提供基础地址与默认连接选项。
    pub fn from_config(domain: D, config: &StreamConfig) -> Self {
        Self::with_connector(
            domain,
            config.base_url.clone(),
            Arc::new(TungsteniteConnector),
            StreamOptions::from(config),
        )
    }

    /// 注入连接器与默认选项，主要用于测试。
    ///
    /// # Arguments
    /// * `domain` - 流领域。
    /// * `base_url` - 基础地址，`http`/`https` 会被映射为 `ws`/`wss`。
    /// * `connector` - 为每次 (重) 连接构造套接字的连接器。
    /// * `default_options` - `stream_progress` 未传入选项时使用的默认值。
    pub fn with_connector(
        domain: D,
        base_url: impl Into<String>,
        connector: Arc<dyn SocketConnector>,
        default_options: StreamOptions,
    ) -> Self {
        Self {
            domain: Arc::new(domain),
            base_url: base_url.into(),
            connector,
            default_options,
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// 该客户端服务的流领域。
    pub fn domain(&self) -> &D {
        &self.domain
    }

    /// `stream_progress` 未传入选项时使用的默认选项。
    pub fn default_options(&self) -> &StreamOptions {
        &self.default_options
    }

    /// 根据基础地址与领域模板构造端点 URL，标识按路径段编码。
    ///
    /// # Returns
    /// * `Ok(Url)` - 例如 `ws://localhost:8181/api/crawl-progress/crawl-123`。
    /// * `Err(StreamError::InvalidUrl)` - 基础地址无法解析、协议不受支持或不能作为基础地址。
    pub fn endpoint_url(&self, id: &str) -> Result<Url, StreamError> {
        let mut url = websocket_base_url(&self.base_url)
            .map_err(|reason| StreamError::InvalidUrl(format!("{}: {}", self.base_url, reason)))?;
        url.path_segments_mut()
            .map_err(|_| StreamError::InvalidUrl(format!("{}: 不能作为基础地址", self.base_url)))?
            .pop_if_empty() // 去掉基础地址末尾的 '/'，避免出现空路径段
            .extend(self.domain.endpoint_segments(id));
        Ok(url)
    }

    /// 订阅一个标识的流。
    ///
    /// 同一标识同时只有一条连接：若已存在旧连接，先关闭并等待其退出，再启动新连接。
    /// 返回时监督任务已启动，但传输层可能尚未打开。
    ///
    /// # Arguments
    /// * `id` - 订阅标识，不能为空白。
    /// * `handlers` - 该连接的回调集合，替换该标识之前的全部回调。
    /// * `options` - 连接选项，`None` 时使用客户端默认选项。
    ///
    /// # Returns
    /// * `Ok(ConnectionHandle)` - 新连接的只读句柄。
    /// * `Err(StreamError::InvalidId)` / `Err(StreamError::InvalidUrl)` - 调用方错误，此时不会建立任何连接。
    pub async fn stream_progress(
        &self,
        id: &str,
        handlers: StreamHandlers<D::Event>,
        options: Option<StreamOptions>,
    ) -> Result<ConnectionHandle, StreamError> {
        if id.trim().is_empty() {
            return Err(StreamError::InvalidId);
        }
        let url = self.endpoint_url(id)?;
        let options = options.unwrap_or_else(|| self.default_options.clone());

        let mut connections = self.connections.lock().await;
        connections.retain(|_, entry| !entry.task.is_finished()); // 顺带清理已结束的连接
        if let Some(previous) = connections.remove(id) {
            info!("[{}] 标识 {} 已有连接，先关闭旧连接再重新订阅。", self.domain.name(), id);
            previous.shutdown().await;
        }

        let shared = Arc::new(ConnectionShared::new());
        let handle = ConnectionHandle { id: id.to_string(), url: url.clone(), shared: shared.clone() };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let supervisor = ConnectionSupervisor {
            context: format!("{}:{}", self.domain.name(), id),
            domain: self.domain.clone(),
            connector: self.connector.clone(),
            id: id.to_string(),
            url,
            options,
            handlers,
            shared,
            shutdown: shutdown_rx,
            outbound: outbound_rx,
        };
        let task = tokio::spawn(supervisor.run());
        connections.insert(id.to_string(), ConnectionEntry { handle: handle.clone(), shutdown_tx, outbound_tx, task });
        info!("[{}] 已开始订阅 {} ({})", self.domain.name(), id, handle.url);
        Ok(handle)
    }

    /// 断开一个标识的连接并清除其回调。对未订阅的标识调用是空操作。
    ///
    /// 返回时监督任务已经退出：套接字已关闭，待触发的重连计时器已取消，回调不会再被调用 (包括 `on_close`)。
    pub async fn disconnect(&self, id: &str) {
        let entry = self.connections.lock().await.remove(id);
        if let Some(entry) = entry {
            entry.shutdown().await;
            info!("[{}] 已断开 {} 的连接。", self.domain.name(), id);
        }
    }

    /// 断开全部连接，语义同逐个调用 `disconnect`。
    pub async fn disconnect_all(&self) {
        let entries: Vec<ConnectionEntry> = self.connections.lock().await.drain().map(|(_, e)| e).collect();
        if entries.is_empty() {
            return;
        }
        let count = entries.len();
        for entry in entries {
            entry.shutdown().await;
        }
        info!("[{}] 已断开全部 {} 条连接。", self.domain.name(), count);
    }

    /// 该标识的传输层当前是否打开。
    ///
    /// 连接状态本身是原子变量，这里只需要短暂持有登记表的锁来找到对应的连接；
    /// 若只需反复查询同一连接，可以改用 `stream_progress` 返回的 `ConnectionHandle::is_connected`，它是同步的。
    pub async fn is_connected(&self, id: &str) -> bool {
        self.connections.lock().await.get(id).is_some_and(|entry| entry.is_live() && entry.handle.is_connected())
    }

    /// 该标识当前连接的句柄，未订阅时为 `None`。
    pub async fn connection(&self, id: &str) -> Option<ConnectionHandle> {
        self.connections.lock().await.get(id).map(|entry| entry.handle.clone())
    }

    /// 尚未进入终止状态的连接标识，按字典序排列。
    pub async fn active_ids(&self) -> Vec<String> {
        let connections = self.connections.lock().await;
        let mut ids: Vec<String> = connections
            .iter()
            .filter(|(_, entry)| entry.is_live())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// 通过连接发送一条原始文本帧。
    ///
    /// # Returns
    /// * `true` - 帧已交给监督者，将在该连接上按顺序发出。
    /// * `false` - 标识未订阅或连接未打开，帧被丢弃。
    pub async fn send(&self, id: &str, raw: impl Into<String>) -> bool {
        let connections = self.connections.lock().await;
        let Some(entry) = connections.get(id) else {
            debug!("[{}] 标识 {} 没有连接，消息未发送。", self.domain.name(), id);
            return false;
        };
        if !entry.handle.is_connected() {
            debug!("[{}] 连接 {} 尚未打开，消息未发送。", self.domain.name(), id);
            return false;
        }
        entry.outbound_tx.send(raw.into()).is_ok()
    }
}

/// 一次套接字生命周期的结局。
enum DriveOutcome {
    /// 收到退出请求，监督者应立即结束。
    Shutdown,
    /// 套接字已关闭 (或因传输层错误作废)，由监督者决定是否重连。
    Closed(CloseInfo),
}

/// 驱动单条逻辑连接的任务。
///
/// 监督者独占连接的所有可变状态：当前套接字、回调、活跃度监视器与退避计时器。
/// 对外只通过 `ConnectionShared` 暴露只读状态，通过 `watch`/`mpsc` 通道接收关闭请求与待发送的帧。
struct ConnectionSupervisor<D: StreamDomain> {
    /// 日志前缀，形如 `爬取进度:crawl-123`。
    context: String,
    domain: Arc<D>,
    connector: Arc<dyn SocketConnector>,
    id: String,
    url: Url,
    options: StreamOptions,
    handlers: StreamHandlers<D::Event>,
    shared: Arc<ConnectionShared>,
    shutdown: watch::Receiver<bool>,
    outbound: mpsc::UnboundedReceiver<String>,
}

/// 监督任务退出 (包括回调 panic 导致的展开) 时把连接标记为 `Closed`。
struct ClosedOnExit {
    context: String,
    shared: Arc<ConnectionShared>,
}

impl Drop for ClosedOnExit {
    fn drop(&mut self) {
        self.shared.set_state(ConnectionState::Closed);
        if std::thread::panicking() {
            error!("[{}] 回调 panic，监督任务已终止，连接标记为关闭。", self.context);
        }
    }
}

impl<D: StreamDomain> ConnectionSupervisor<D> {
    /// 监督循环：连接 → 驱动 → 根据关闭结局决定终止或退避重连。
    ///
    /// 无论以何种方式退出 (正常关闭、重连耗尽、`disconnect` 或回调 panic)，
    /// 共享状态最终都会是 `Closed`。
    async fn run(mut self) {
        let _closed_on_exit = ClosedOnExit { context: self.context.clone(), shared: self.shared.clone() };
        let policy = self.options.reconnect_policy();
        loop {
            // 重连计时器在 disconnect 之后触发时不得再构造新的套接字
            if self.shutdown_requested() {
                break;
            }
            self.shared.set_state(ConnectionState::Connecting);
            debug!("[{}] 正在连接 {}", self.context, self.url);
            let socket = self.connector.connect(&self.url);

            let close = match self.drive(socket).await {
                DriveOutcome::Shutdown => break,
                DriveOutcome::Closed(close) => close,
            };

            if !ReconnectPolicy::should_reconnect(&close) {
                info!("[{}] 连接已正常关闭 (code={}, reason='{}')，不再重连。", self.context, close.code, close.reason);
                self.finish(close);
                break;
            }
            if !self.options.auto_reconnect {
                warn!("[{}] 连接异常关闭 (code={})，未启用自动重连。", self.context, close.code);
                self.finish(close);
                break;
            }

            let attempt = self.shared.reconnect_attempts.load(Ordering::Acquire);
            let Some(delay) = policy.delay_for(attempt) else {
                error!("[{}] 已连续重连 {} 次仍未成功，放弃重连。", self.context, attempt);
                self.handlers.error(StreamError::ReconnectExhausted { attempts: attempt });
                self.finish(close);
                break;
            };
            self.shared.reconnect_attempts.store(attempt + 1, Ordering::Release);
            self.shared.set_state(ConnectionState::Reconnecting);
            warn!(
                "[{}] 连接异常关闭 (code={}, reason='{}')，{:?} 后进行第 {} 次重连。",
                self.context,
                close.code,
                close.reason,
                delay,
                attempt + 1
            );
            tokio::select! {
                _ = sleep(delay) => {}
                _ = self.shutdown.changed() => {} // 退出请求在循环开头统一检查
            }
        }
        debug!("[{}] 监督任务退出。", self.context);
    }

    /// 是否已请求退出：共享标志、`watch` 中的值或发送端已被丢弃，任一成立即可。
    fn shutdown_requested(&self) -> bool {
        self.shared.shutdown.load(Ordering::Acquire)
            || *self.shutdown.borrow()
            || self.shutdown.has_changed().is_err()
    }

    /// 进入终止状态：通知 `on_close`。
    fn finish(&mut self, close: CloseInfo) {
        self.shared.set_state(ConnectionState::Closed);
        self.handlers.close(close);
    }

    /// 驱动一个套接字直到它关闭或收到退出请求。
    ///
    /// 活跃度监视与保活 `ping` 只在连接打开后生效；保活计时器在每次打开时重新创建，
    /// 因此第一次 `ping` 总是在打开后一个完整间隔才发送。
    ///
    /// # Returns
    /// * `DriveOutcome::Shutdown` - 收到退出请求，套接字已关闭。
    /// * `DriveOutcome::Closed(info)` - 套接字关闭或因传输层错误作废。
    async fn drive(&mut self, mut socket: ClientSocket) -> DriveOutcome {
        let mut liveness = LivenessMonitor::new(self.options.liveness_timeout);
        let mut keepalive: Option<Interval> = None;
        let mut open = false;

        loop {
            tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        socket.close();
                        return DriveOutcome::Shutdown;
                    }
                }
                event = socket.next_event() => match event {
                    Some(TransportEvent::Open) => {
                        open = true;
                        liveness.touch();
                        keepalive = self.options.keepalive_interval.map(|period| {
                            let mut ticker = interval_at(Instant::now() + period, period);
                            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                            ticker
                        });
                        self.on_open(&socket);
                    }
                    Some(TransportEvent::Message(raw)) => {
                        liveness.touch(); // 控制帧同样算作活跃
                        self.shared.record_message();
                        self.handle_frame(&socket, &raw);
                    }
                    Some(TransportEvent::Error(reason)) => {
                        warn!("[{}] 传输层错误: {}", self.context, reason);
                        self.handlers.error(StreamError::Transport(reason.clone()));
                        // 当前套接字作废，其后续的 Closed 事件不再处理
                        socket.close();
                        return DriveOutcome::Closed(CloseInfo::abnormal(reason));
                    }
                    Some(TransportEvent::Closed(close)) => return DriveOutcome::Closed(close),
                    None => return DriveOutcome::Closed(CloseInfo::abnormal("传输层已退出")),
                },
                Some(raw) = self.outbound.recv() => socket.send(raw),
                _ = liveness.expired(), if open => {
                    liveness.report_stall(&self.context);
                }
                _ = next_keepalive(&mut keepalive), if open => {
                    debug!("[{}] 发送保活 ping", self.context);
                    socket.send(Envelope::control_frame(ControlKind::Ping));
                }
            }
        }
    }

    /// 连接打开：清零重连计数、更新状态并发送领域的订阅帧。
    fn on_open(&mut self, socket: &ClientSocket) {
        self.shared.reconnect_attempts.store(0, Ordering::Release);
        self.shared.set_state(ConnectionState::Open);
        info!("[{}] 连接已打开: {}", self.context, self.url);
        for frame in self.domain.subscribe_frames(&self.id) {
            socket.send(frame);
        }
    }

    /// 处理一条入站文本帧。
    ///
    /// 依次经过信封结构校验、控制帧应答、领域类型过滤与领域解码；
    /// 任何一步被拒绝都只记录日志并丢弃该帧，连接保持不变。
    fn handle_frame(&mut self, socket: &ClientSocket, raw: &str) {
        let envelope = match decode_envelope(raw) {
            Ok(envelope) => envelope,
            Err(rejection) => {
                rejection.log(&self.context);
                return;
            }
        };

        // 控制帧只在协议层应答，不交给消费者
        if let Some(kind) = envelope.control_kind() {
            debug!("[{}] 收到控制帧 {}", self.context, kind.message_type());
            if let Some(reply) = kind.reply() {
                socket.send(Envelope::control_frame(reply));
            }
            return;
        }

        if !self.domain.accepts(&envelope.message_type) {
            EnvelopeRejection::UnrecognizedType { message_type: envelope.message_type }.log(&self.context);
            return;
        }
        match self.domain.decode(&self.id, envelope) {
            Ok(event) => self.handlers.message(event),
            Err(rejection) => rejection.log(&self.context),
        }
    }
}

/// 等待下一次保活时刻；未启用保活时永远挂起。
async fn next_keepalive(keepalive: &mut Option<Interval>) {
    match keepalive {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
