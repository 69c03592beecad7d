// progress_stream_utils/src/legacy.rs

//! 旧版回调注册接口的兼容层。
//!
//! 旧接口先调用 `connect(progress_id)`，再分别用 `on_progress` / `on_completed` / `on_error`
//! 注册回调，最后用 `remove_progress_callback` 清除。这里把它们转发到
//! `ProgressStreamClient::stream_progress`，每次调用都会记录一条弃用警告。
//! 新代码请直接使用 `stream_progress` 与 `StreamHandlers`。

use crate::client::stream::{ConnectionHandle, ProgressStreamClient, StreamHandlers};
use crate::domains::{ProgressDomain, StreamEvent};
use crate::error::StreamError;
use log::warn;
use progress_models::ProgressRecord;
use std::sync::{Arc, Mutex, PoisonError};

type Callback<T> = Box<dyn FnMut(T) + Send>;

/// 一个回调槽位。`generation` 在每次注册或清除时递增。
struct SlotState<T> {
    callback: Option<Callback<T>>,
    generation: u64,
}

impl<T> Default for SlotState<T> {
    fn default() -> Self {
        Self { callback: None, generation: 0 }
    }
}

type Slot<T> = Arc<Mutex<SlotState<T>>>;

/// 取出回调并在锁外调用。
///
/// 调用结束后，只有在调用期间槽位没有被重新注册或清除 (代数未变) 时才放回原回调，
/// 因此回调内部可以安全地替换自己，也可以通过 `remove_progress_callback` 注销自己。
///
/// # Arguments
/// * `slot` - 回调槽位。
/// * `value` - 交给回调的参数；槽位为空时被丢弃。
fn invoke<T>(slot: &Slot<T>, value: T) {
    let (taken, generation) = {
        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        (guard.callback.take(), guard.generation)
    };
    if let Some(mut callback) = taken {
        callback(value);
        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.generation == generation && guard.callback.is_none() {
            guard.callback = Some(callback);
        }
    }
}

/// 注册 (`Some`) 或清除 (`None`) 槽位中的回调，并使正在执行的回调失效。
fn replace<T>(slot: &Slot<T>, callback: Option<Callback<T>>) {
    let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
    guard.callback = callback;
    guard.generation = guard.generation.wrapping_add(1);
}

fn deprecated(method: &str, replacement: &str) {
    warn!("[兼容层] `{}` 已弃用，请改用 `{}`。", method, replacement);
}

/// 旧版接口适配器，借用一个进度流客户端。
pub struct LegacyProgressAdapter<'a, R: ProgressRecord> {
    client: &'a ProgressStreamClient<ProgressDomain<R>>,
    on_progress: Slot<R>,
    on_completed: Slot<R>,
    on_error: Slot<String>,
}

impl<R: ProgressRecord> ProgressStreamClient<ProgressDomain<R>> {
    pub fn legacy(&self) -> LegacyProgressAdapter<'_, R> {
        LegacyProgressAdapter {
            client: self,
            on_progress: Arc::default(),
            on_completed: Arc::default(),
            on_error: Arc::default(),
        }
    }
}

impl<'a, R: ProgressRecord> LegacyProgressAdapter<'a, R> {
    /// 订阅 `progress_id`，之后收到的事件按类别分发到当前注册的回调。
    #[deprecated(note = "use `ProgressStreamClient::stream_progress` with `StreamHandlers`")]
    pub async fn connect(&self, progress_id: &str) -> Result<ConnectionHandle, StreamError> {
        deprecated("connect", "stream_progress");
        let on_progress = self.on_progress.clone();
        let on_completed = self.on_completed.clone();
        let on_failed = self.on_error.clone();
        let on_transport_error = self.on_error.clone();

        let handlers = StreamHandlers::new(move |event: StreamEvent<R>| match event {
            StreamEvent::Progress(record) => invoke(&on_progress, record),
            StreamEvent::Completed(record) => invoke(&on_completed, record),
            StreamEvent::Failed(record) => {
                let message = record.error_message().unwrap_or("未知错误").to_string();
                invoke(&on_failed, message);
            }
        })
        .on_error(move |err| invoke(&on_transport_error, err.to_string()));

        self.client.stream_progress(progress_id, handlers, None).await
    }

    #[deprecated(note = "pass the callback to `StreamHandlers::new` instead")]
    pub fn on_progress(&self, callback: impl FnMut(R) + Send + 'static) {
        deprecated("on_progress", "StreamHandlers::new");
        replace(&self.on_progress, Some(Box::new(callback)));
    }

    #[deprecated(note = "match `StreamEvent::Completed` in the stream handler instead")]
    pub fn on_completed(&self, callback: impl FnMut(R) + Send + 'static) {
        deprecated("on_completed", "StreamEvent::Completed");
        replace(&self.on_completed, Some(Box::new(callback)));
    }

    #[deprecated(note = "use `StreamHandlers::on_error` instead")]
    pub fn on_error(&self, callback: impl FnMut(String) + Send + 'static) {
        deprecated("on_error", "StreamHandlers::on_error");
        replace(&self.on_error, Some(Box::new(callback)));
    }

    /// 清除全部已注册的回调，连接本身保持不变。
    #[deprecated(note = "use `ProgressStreamClient::disconnect` instead")]
    pub fn remove_progress_callback(&self) {
        deprecated("remove_progress_callback", "disconnect");
        replace(&self.on_progress, None);
        replace(&self.on_completed, None);
        replace(&self.on_error, None);
    }
}

#[cfg(test)]
#[allow(deprecated)]
mod tests {
    use super::*;
    use crate::client::mock::MockConnector;
    use crate::client::stream::StreamOptions;
    use progress_models::TestRunProgressData;

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_legacy_callbacks_receive_events_by_category() {
        let mock = MockConnector::default();
        let client = ProgressStreamClient::with_connector(
            ProgressDomain::<TestRunProgressData>::test_run(),
            "ws://localhost:8181",
            Arc::new(mock.clone()),
            StreamOptions::default(),
        );
        let adapter = client.legacy();

        let progress = Arc::new(Mutex::new(Vec::new()));
        let completed = Arc::new(Mutex::new(0));
        let errors = Arc::new(Mutex::new(Vec::new()));
        {
            let progress = progress.clone();
            adapter.on_progress(move |record: TestRunProgressData| progress.lock().unwrap().push(record.percentage));
            let completed = completed.clone();
            adapter.on_completed(move |_| *completed.lock().unwrap() += 1);
            let errors = errors.clone();
            adapter.on_error(move |message| errors.lock().unwrap().push(message));
        }

        adapter.connect("run-1").await.unwrap();
        settle().await;
        mock.open(0);
        mock.deliver(0, r#"{"type":"test_progress","data":{"progressId":"run-1","status":"running","percentage":40}}"#);
        mock.deliver(0, r#"{"type":"test_error","data":{"progressId":"run-1","error":"pytest exited with 2"}}"#);
        mock.deliver(0, r#"{"type":"test_completed","data":{"progressId":"run-1","exitCode":0}}"#);
        settle().await;

        assert_eq!(*progress.lock().unwrap(), vec![Some(40.0)]);
        assert_eq!(*errors.lock().unwrap(), vec!["pytest exited with 2".to_string()]);
        assert_eq!(*completed.lock().unwrap(), 1);

        adapter.remove_progress_callback();
        mock.deliver(0, r#"{"type":"test_progress","data":{"progressId":"run-1","status":"running","percentage":80}}"#);
        settle().await;
        assert_eq!(progress.lock().unwrap().len(), 1);
        client.disconnect("run-1").await;
    }

    #[test]
    fn test_callback_may_replace_itself() {
        let slot: Slot<u32> = Arc::default();
        let inner = slot.clone();
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();
        replace(
            &slot,
            Some(Box::new(move |_| {
                *counter.lock().unwrap() += 1;
                replace(&inner, Some(Box::new(|_| {})));
            })),
        );
        invoke(&slot, 1);
        invoke(&slot, 2);
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[test]
    fn test_callback_may_clear_itself() {
        let slot: Slot<u32> = Arc::default();
        let inner = slot.clone();
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();
        replace(
            &slot,
            Some(Box::new(move |_| {
                *counter.lock().unwrap() += 1;
                replace(&inner, None);
            })),
        );
        invoke(&slot, 1);
        invoke(&slot, 2);
        assert_eq!(*calls.lock().unwrap(), 1);
        assert!(slot.lock().unwrap().callback.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_handler_can_unregister_all_callbacks() {
        let mock = MockConnector::default();
        let client = ProgressStreamClient::with_connector(
            ProgressDomain::<TestRunProgressData>::test_run(),
            "ws://localhost:8181",
            Arc::new(mock.clone()),
            StreamOptions::default(),
        );
        let adapter = client.legacy();
        let completed = Arc::new(Mutex::new(0));
        {
            let completed = completed.clone();
            let on_progress = adapter.on_progress.clone();
            let on_completed = adapter.on_completed.clone();
            let on_error = adapter.on_error.clone();
            adapter.on_completed(move |_| {
                *completed.lock().unwrap() += 1;
                // 等价于在回调内部调用 remove_progress_callback
                replace(&on_progress, None);
                replace(&on_completed, None);
                replace(&on_error, None);
            });
        }

        adapter.connect("run-2").await.unwrap();
        settle().await;
        mock.open(0);
        mock.deliver(0, r#"{"type":"test_completed","data":{"progressId":"run-2","exitCode":0}}"#);
        mock.deliver(0, r#"{"type":"test_completed","data":{"progressId":"run-2","exitCode":0}}"#);
        settle().await;

        assert_eq!(*completed.lock().unwrap(), 1);
        client.disconnect("run-2").await;
    }
}
