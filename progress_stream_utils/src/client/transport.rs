// progress_stream_utils/src/client/transport.rs

//! 客户端 WebSocket 传输层。
//!
//! 一个 `ClientSocket` 恰好拥有一条底层连接，把底层事件翻译为统一的
//! `TransportEvent` (`Open` / `Message` / `Error` / `Closed`)，并提供 `send` 与 `close`。
//! 这里不包含任何重试或退避逻辑，重连策略由上层的流客户端负责。
//!
//! `ClientSocket` 与 `SocketDriver` 成对创建：前者交给流客户端使用，
//! 后者由具体的连接器 (`SocketConnector` 实现) 驱动真实的网络连接。

use futures_util::{SinkExt, StreamExt}; // 为拆分后的发送端/接收端提供 send()/next()
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async,
    tungstenite::Error as TungsteniteError,
    tungstenite::protocol::Message,
    tungstenite::protocol::frame::coding::CloseCode,
    tungstenite::protocol::CloseFrame,
};
use url::Url;

/// 正常关闭 (RFC 6455)。只有这个关闭码不会触发重连。
pub const NORMAL_CLOSURE_CODE: u16 = 1000;
/// 对端未发送关闭帧 (RFC 6455)。
pub const NO_STATUS_CODE: u16 = 1005;
/// 连接异常断开，没有收到关闭帧。
pub const ABNORMAL_CLOSURE_CODE: u16 = 1006;

/// 连接关闭的信息。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    /// WebSocket 关闭码；未收到关闭帧时为 1005 或 1006。
    pub code: u16,
    /// 对端给出的关闭原因，或本地合成的说明。
    pub reason: String,
}

impl CloseInfo {
    /// 以任意关闭码构造。
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self { code, reason: reason.into() }
    }

    /// 关闭码 1000。
    pub fn normal(reason: impl Into<String>) -> Self {
        Self::new(NORMAL_CLOSURE_CODE, reason)
    }

    /// 关闭码 1006，用于没有收到关闭帧的断开与传输层错误。
    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self::new(ABNORMAL_CLOSURE_CODE, reason)
    }

    /// 是否为正常关闭 (关闭码 1000)。
    pub fn is_normal(&self) -> bool {
        self.code == NORMAL_CLOSURE_CODE
    }
}

/// 传输层向上报告的事件。
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// 握手完成，连接可用。
    Open,
    /// 收到一条文本帧 (原始内容，尚未解析)。
    Message(String),
    /// 连接出错。通常紧随其后会有一个 `Closed` 事件。
    Error(String),
    /// 连接已关闭。
    Closed(CloseInfo),
}

/// 客户端向驱动端下发的命令。
#[derive(Debug, Clone, PartialEq)]
pub enum SocketCommand {
    /// 发送一条文本帧。
    Send(String),
    /// 以关闭码 1000 关闭连接。
    Close,
}

/// 底层连接的状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SocketState {
    /// 正在握手。
    Connecting = 0,
    /// 握手完成，可以发送。
    Open = 1,
    /// 客户端已请求关闭，等待驱动端确认。
    Closing = 2,
    /// 已关闭，不会再有事件。
    Closed = 3,
}

impl SocketState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Connecting,
            1 => Self::Open,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// `ClientSocket` 与 `SocketDriver` 共享的 `SocketState`。
#[derive(Debug)]
struct SharedSocketState(AtomicU8);

impl SharedSocketState {
    fn new() -> Self {
        Self(AtomicU8::new(SocketState::Connecting as u8))
    }

    fn get(&self) -> SocketState {
        SocketState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: SocketState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// 仅当当前状态为 `from` 时切换到 `to`，返回是否切换成功。
    fn transition(&self, from: SocketState, to: SocketState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// 连接器：根据 URL 构造一条新的客户端连接。
///
/// `connect` 必须立即返回 (连接处于 `Connecting` 状态)，握手结果通过 `Open`
/// 或 `Error` + `Closed` 事件异步通知。
pub trait SocketConnector: Send + Sync + 'static {
    /// 为一次 (重) 连接构造新的套接字。
    ///
    /// # Arguments
    /// * `url` - 完整的端点 URL (`ws://` 或 `wss://`)。
    ///
    /// # Returns
    /// 处于 `Connecting` 状态的 `ClientSocket`；同一个套接字不会被重复使用。
    fn connect(&self, url: &Url) -> ClientSocket;
}

/// 流客户端持有的一端：发送命令、接收事件。
///
/// 丢弃 `ClientSocket` 等同于调用 `close()`。
#[derive(Debug)]
pub struct ClientSocket {
    url: Url,
    state: Arc<SharedSocketState>,
    commands: mpsc::UnboundedSender<SocketCommand>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
}

/// 连接器持有的一端：上报事件、读取命令。
#[derive(Debug)]
pub struct SocketDriver {
    state: Arc<SharedSocketState>,
    events: mpsc::UnboundedSender<TransportEvent>,
    commands: mpsc::UnboundedReceiver<SocketCommand>,
}

impl ClientSocket {
    /// 创建一对相互连接的 `ClientSocket` / `SocketDriver`，初始状态为 `Connecting`。
    pub fn pair(url: Url) -> (ClientSocket, SocketDriver) {
        let state = Arc::new(SharedSocketState::new());
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let socket = ClientSocket { url, state: state.clone(), commands: command_tx, events: event_rx };
        let driver = SocketDriver { state, events: event_tx, commands: command_rx };
        (socket, driver)
    }

    /// 该连接的端点 URL。
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// 底层连接的当前状态。
    pub fn state(&self) -> SocketState {
        self.state.get()
    }

    /// 是否可以发送。
    pub fn is_open(&self) -> bool {
        self.state() == SocketState::Open
    }

    /// 发送一条文本帧。连接尚未打开 (或已关闭) 时静默丢弃，不会报错。
    pub fn send(&self, raw: impl Into<String>) {
        if !self.is_open() {
            debug!("[传输层] 连接 {} 当前状态为 {:?}，丢弃待发送的消息。", self.url, self.state());
            return;
        }
        if self.commands.send(SocketCommand::Send(raw.into())).is_err() {
            debug!("[传输层] 连接 {} 的驱动端已退出，消息未发送。", self.url);
        }
    }

    /// 以正常关闭码关闭连接。对已在关闭或已关闭的连接调用是空操作。
    pub fn close(&self) {
        let closing = self.state.transition(SocketState::Open, SocketState::Closing)
            || self.state.transition(SocketState::Connecting, SocketState::Closing);
        if !closing {
            return;
        }
        debug!("[传输层] 请求关闭连接 {}", self.url);
        let _ = self.commands.send(SocketCommand::Close);
    }

    /// 等待下一个传输层事件。驱动端退出后返回 `None`。
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }
}

impl Drop for ClientSocket {
    fn drop(&mut self) {
        self.close();
    }
}

impl SocketDriver {
    /// 底层连接的当前状态 (含客户端请求的 `Closing`)。
    pub fn state(&self) -> SocketState {
        self.state.get()
    }

    /// 标记握手完成并上报 `Open`。若客户端在握手期间已请求关闭则返回 `false`。
    pub fn opened(&self) -> bool {
        if !self.state.transition(SocketState::Connecting, SocketState::Open) {
            return false;
        }
        let _ = self.events.send(TransportEvent::Open);
        true
    }

    /// 上报一条收到的文本帧。
    pub fn deliver(&self, raw: impl Into<String>) {
        let _ = self.events.send(TransportEvent::Message(raw.into()));
    }

    /// 上报连接错误。
    pub fn fail(&self, reason: impl Into<String>) {
        let _ = self.events.send(TransportEvent::Error(reason.into()));
    }

    /// 标记连接已关闭并上报 `Closed`；重复调用只上报一次。
    pub fn closed(&self, info: CloseInfo) {
        if self.state.get() == SocketState::Closed {
            return;
        }
        self.state.set(SocketState::Closed);
        let _ = self.events.send(TransportEvent::Closed(info));
    }

    /// 等待客户端的下一条命令。客户端一端被丢弃后返回 `None`。
    pub async fn next_command(&mut self) -> Option<SocketCommand> {
        self.commands.recv().await
    }

    /// 非阻塞地取出一条已排队的命令。
    pub fn try_next_command(&mut self) -> Option<SocketCommand> {
        self.commands.try_recv().ok()
    }
}

/// 基于 `tokio-tungstenite` 的连接器，每条连接在独立的 Tokio 任务中运行。
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

impl SocketConnector for TungsteniteConnector {
    fn connect(&self, url: &Url) -> ClientSocket {
        let (socket, driver) = ClientSocket::pair(url.clone());
        tokio::spawn(run_tungstenite_socket(url.clone(), driver));
        socket
    }
}

/// 驱动一条真实的 WebSocket 连接：握手、收发帧，直到任意一端关闭。
///
/// 握手失败与接收错误都先上报 `Error` 再上报 `Closed`；客户端请求关闭 (或丢弃 `ClientSocket`)
/// 时发送关闭码 1000 并上报正常关闭。
async fn run_tungstenite_socket(url: Url, mut driver: SocketDriver) {
    info!("[传输层] 开始尝试连接到 WebSocket 服务器，URL: {}", url);
    let ws_stream = match connect_async(url.as_str()).await {
        Ok((ws_stream, response)) => {
            info!("[传输层] 已成功连接到 {} (HTTP 状态码: {})", url, response.status());
            ws_stream
        }
        Err(e) => {
            error!("[传输层] 连接到 {} 失败，错误: {}", url, e);
            driver.fail(format!("连接到 {} 失败: {}", url, e));
            driver.closed(CloseInfo::abnormal("握手失败"));
            return;
        }
    };
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    if !driver.opened() {
        debug!("[传输层] 握手期间已请求关闭连接 {}，立即关闭。", url);
        let _ = ws_sender.send(Message::Close(Some(normal_close_frame()))).await;
        driver.closed(CloseInfo::normal("客户端主动关闭"));
        return;
    }

    loop {
        tokio::select! {
            frame = ws_receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => driver.deliver(text),
                Some(Ok(Message::Binary(bin))) => match String::from_utf8(bin) {
                    Ok(text) => driver.deliver(text),
                    Err(e) => warn!("[传输层] 收到无法按 UTF-8 解码的二进制帧，已忽略: {}", e),
                },
                // Ping/Pong 控制帧由 tungstenite 自动应答
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {}
                Some(Ok(Message::Close(close_frame))) => {
                    debug!("[传输层] 收到 Close 控制帧，详细信息: {:?}", close_frame);
                    let info = match close_frame {
                        Some(frame) => CloseInfo::new(u16::from(frame.code), frame.reason.to_string()),
                        None => CloseInfo::new(NO_STATUS_CODE, ""),
                    };
                    driver.closed(info);
                    break;
                }
                Some(Err(TungsteniteError::ConnectionClosed)) | Some(Err(TungsteniteError::AlreadyClosed)) | None => {
                    debug!("[传输层] 连接 {} 的接收流已结束。", url);
                    driver.closed(CloseInfo::abnormal("连接已断开"));
                    break;
                }
                Some(Err(e)) => {
                    error!("[传输层] 从 {} 接收消息时发生底层错误: {}", url, e);
                    driver.fail(e.to_string());
                    driver.closed(CloseInfo::abnormal(e.to_string()));
                    break;
                }
            },
            command = driver.next_command() => match command {
                Some(SocketCommand::Send(raw)) => {
                    if let Err(e) = ws_sender.send(Message::Text(raw)).await {
                        error!("[传输层] 向 {} 发送消息失败: {}", url, e);
                        driver.fail(e.to_string());
                        driver.closed(CloseInfo::abnormal(e.to_string()));
                        break;
                    }
                }
                // 客户端一端被丢弃时同样正常关闭
                Some(SocketCommand::Close) | None => {
                    let _ = ws_sender.send(Message::Close(Some(normal_close_frame()))).await;
                    let _ = ws_sender.close().await;
                    info!("[传输层] 已主动关闭到 {} 的连接。", url);
                    driver.closed(CloseInfo::normal("客户端主动关闭"));
                    break;
                }
            }
        }
    }
}

/// 关闭码 1000、原因为空的关闭帧。
fn normal_close_frame() -> CloseFrame<'static> {
    CloseFrame { code: CloseCode::Normal, reason: "".into() }
}
