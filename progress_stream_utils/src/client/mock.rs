// progress_stream_utils/src/client/mock.rs

//! 测试用连接器：记录每次构造的 URL，并把驱动端交给测试代码手动操控。

use crate::client::transport::{ClientSocket, CloseInfo, SocketCommand, SocketConnector, SocketDriver};
use std::sync::{Arc, Mutex};
use url::Url;

#[derive(Default)]
struct MockState {
    urls: Vec<Url>,
    drivers: Vec<SocketDriver>,
}

#[derive(Clone, Default)]
pub(crate) struct MockConnector {
    state: Arc<Mutex<MockState>>,
}

impl SocketConnector for MockConnector {
    fn connect(&self, url: &Url) -> ClientSocket {
        let (socket, driver) = ClientSocket::pair(url.clone());
        let mut state = self.state.lock().unwrap();
        state.urls.push(url.clone());
        state.drivers.push(driver);
        socket
    }
}

impl MockConnector {
    /// 已构造的连接数 (首次连接加各次重连)。
    pub(crate) fn connect_count(&self) -> usize {
        self.state.lock().unwrap().urls.len()
    }

    /// 按构造顺序记录的端点 URL。
    pub(crate) fn urls(&self) -> Vec<Url> {
        self.state.lock().unwrap().urls.clone()
    }

    /// 完成第 `index` 条连接的握手。
    pub(crate) fn open(&self, index: usize) -> bool {
        self.state.lock().unwrap().drivers[index].opened()
    }

    pub(crate) fn deliver(&self, index: usize, raw: &str) {
        self.state.lock().unwrap().drivers[index].deliver(raw);
    }

    pub(crate) fn fail(&self, index: usize, reason: &str) {
        self.state.lock().unwrap().drivers[index].fail(reason);
    }

    pub(crate) fn close(&self, index: usize, info: CloseInfo) {
        self.state.lock().unwrap().drivers[index].closed(info);
    }

    /// 取出第 `index` 条连接上客户端已下发的全部命令。
    pub(crate) fn sent(&self, index: usize) -> Vec<SocketCommand> {
        let mut state = self.state.lock().unwrap();
        let driver = &mut state.drivers[index];
        let mut commands = Vec::new();
        while let Some(command) = driver.try_next_command() {
            commands.push(command);
        }
        commands
    }
}
