// progress_stream_utils/tests/progress_stream_integration_test.rs

//! 端到端测试：在 127.0.0.1 的随机端口上启动一个真实的 tokio-tungstenite 服务端，
//! 验证订阅帧、消息投递、正常关闭与异常关闭后的重连。

use futures_util::{SinkExt, StreamExt};
use log::{LevelFilter, info};
use progress_models::{CrawlProgressData, CrawlStatus};
use progress_stream_utils::{
    CloseInfo, ConnectionState, ProgressDomain, ProgressStreamClient, StreamEvent, StreamHandlers, StreamOptions,
    TungsteniteConnector,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Message};

const WAIT: Duration = Duration::from_secs(5);

fn init_test_logger() {
    let _ = env_logger::builder().filter_level(LevelFilter::Debug).is_test(true).try_init();
}

/// 服务端对每条连接的脚本：先读取订阅帧，再推送 `frames`，最后以 `close_code` 关闭。
#[derive(Clone)]
struct ServerScript {
    frames: Vec<String>,
    close_code: CloseCode,
}

/// 启动测试服务端。每接受一条连接，就把 (请求路径, 收到的第一帧) 发送到返回的通道。
async fn spawn_server(scripts: Vec<ServerScript>) -> (SocketAddr, mpsc::UnboundedReceiver<(String, String)>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("无法绑定到随机端口");
    let addr = listener.local_addr().expect("无法获取本地监听地址");
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        for script in scripts {
            let Ok((stream, peer)) = listener.accept().await else {
                return;
            };
            let mut path = String::new();
            let callback = |request: &Request, response: Response| {
                path = request.uri().path().to_string();
                Ok::<Response, ErrorResponse>(response)
            };
            let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback).await.expect("握手失败");
            info!("[测试服务端] 接受来自 {} 的连接，路径 {}", peer, path);

            let first = match ws.next().await {
                Some(Ok(Message::Text(text))) => text,
                other => format!("{:?}", other),
            };
            let _ = seen_tx.send((path, first));

            for frame in script.frames {
                ws.send(Message::Text(frame)).await.expect("发送失败");
            }
            let _ = ws.send(Message::Close(Some(CloseFrame { code: script.close_code, reason: "".into() }))).await;
            // 等待客户端的关闭应答，连接自然结束
            while let Some(Ok(_)) = ws.next().await {}
        }
    });
    (addr, seen_rx)
}

fn crawl_client(addr: SocketAddr, options: StreamOptions) -> ProgressStreamClient<ProgressDomain<CrawlProgressData>> {
    ProgressStreamClient::with_connector(
        ProgressDomain::crawl(),
        format!("http://{}", addr),
        Arc::new(TungsteniteConnector),
        options,
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_delivers_records_and_stops_on_normal_close() {
    init_test_logger();
    let script = ServerScript {
        frames: vec![
            r#"{"type":"ping"}"#.to_string(),
            r#"{"type":"crawl_progress","data":{"progressId":"crawl-123","status":"crawling","percentage":25,"logs":[]}}"#.to_string(),
            r#"{"type":"crawl_progress","data":{"progressId":"crawl-123","percentage":"bad"}}"#.to_string(),
            r#"{"type":"crawl_completed","data":{"progressId":"crawl-123","percentage":100,"sourceId":"src-1"}}"#.to_string(),
        ],
        close_code: CloseCode::Normal,
    };
    let (addr, mut seen) = spawn_server(vec![script]).await;

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let (close_tx, mut close_rx) = mpsc::unbounded_channel();
    let handlers = StreamHandlers::new(move |event| {
        let _ = event_tx.send(event);
    })
    .on_close(move |close: CloseInfo| {
        let _ = close_tx.send(close);
    });

    let client = crawl_client(addr, StreamOptions::default());
    let handle = client.stream_progress("crawl-123", handlers, None).await.unwrap();

    let (path, subscribe) = timeout(WAIT, seen.recv()).await.unwrap().unwrap();
    assert_eq!(path, "/api/crawl-progress/crawl-123");
    let subscribe: serde_json::Value = serde_json::from_str(&subscribe).unwrap();
    assert_eq!(subscribe["type"], "subscribe");
    assert_eq!(subscribe["data"]["progressId"], "crawl-123");

    let first = timeout(WAIT, event_rx.recv()).await.unwrap().unwrap();
    let StreamEvent::Progress(record) = first else {
        panic!("第一条事件应为进度更新");
    };
    assert_eq!(record.status, CrawlStatus::Crawling);
    assert_eq!(record.percentage, Some(25.0));

    let second = timeout(WAIT, event_rx.recv()).await.unwrap().unwrap();
    let StreamEvent::Completed(record) = second else {
        panic!("非法百分比的消息应被丢弃，第二条事件应为完成");
    };
    assert_eq!(record.status, CrawlStatus::Completed);
    assert_eq!(record.source_id.as_deref(), Some("src-1"));

    let close = timeout(WAIT, close_rx.recv()).await.unwrap().unwrap();
    assert!(close.is_normal());
    assert_eq!(handle.state(), ConnectionState::Closed);
    assert!(!client.is_connected("crawl-123").await);
    assert!(timeout(Duration::from_millis(300), seen.recv()).await.is_err(), "正常关闭后不应重连");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_abnormal_close_reconnects_to_same_endpoint() {
    init_test_logger();
    let dropped = ServerScript { frames: Vec::new(), close_code: CloseCode::Error };
    let finished = ServerScript {
        frames: vec![r#"{"type":"crawl_progress","data":{"progressId":"crawl-9","status":"finalization","percentage":95}}"#.to_string()],
        close_code: CloseCode::Normal,
    };
    let (addr, mut seen) = spawn_server(vec![dropped, finished]).await;

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let handlers = StreamHandlers::new(move |event: StreamEvent<CrawlProgressData>| {
        let _ = event_tx.send(event);
    });
    let options = StreamOptions { reconnect_delay: Duration::from_millis(50), ..Default::default() };
    let client = crawl_client(addr, options);
    client.stream_progress("crawl-9", handlers, None).await.unwrap();

    let (first_path, _) = timeout(WAIT, seen.recv()).await.unwrap().unwrap();
    let (second_path, _) = timeout(WAIT, seen.recv()).await.unwrap().unwrap();
    assert_eq!(first_path, second_path);

    let event = timeout(WAIT, event_rx.recv()).await.unwrap().unwrap();
    assert_eq!(event.record().status, CrawlStatus::Finalization);
    client.disconnect_all().await;
}
