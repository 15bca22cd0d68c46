use std::time::Duration;

use aether_stream::prelude::*;
use aether_stream::{CancelToken, ChatTransport, ErrorKind, HttpTransport, StreamConsumer, StreamOutcome};
use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

/// Status line and headers, then body pieces written with a pause between them.
struct Reply {
    head: String,
    pieces: Vec<Vec<u8>>,
    hold_open: bool,
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 1024];
    loop {
        let n = socket.read(&mut tmp).await.expect("read request");
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&tmp[..n]);
        let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..end]).to_string();
        let body_len = head
            .lines()
            .find_map(|line| {
                let (key, value) = line.split_once(':')?;
                key.trim()
                    .eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        if buf.len() >= end + 4 + body_len {
            break;
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Serves exactly one request and hands back its raw text.
async fn serve_once(reply: Reply) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (request_tx, request_rx) = oneshot::channel();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let request = read_request(&mut socket).await;
        let _ = request_tx.send(request);
        let Reply {
            head,
            pieces,
            hold_open,
        } = reply;
        socket.write_all(head.as_bytes()).await.expect("write head");
        for piece in pieces {
            socket.write_all(&piece).await.expect("write piece");
            socket.flush().await.expect("flush");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        if hold_open {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        let _ = socket.shutdown().await;
    });
    (format!("http://{addr}"), request_rx)
}

const OK_HEAD: &str =
    "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n";

fn client_for(base_url: &str) -> ChatClient {
    ChatClient::from_config(ClientConfig::default().base_url(base_url)).expect("client")
}

#[tokio::test]
async fn streams_reply_split_at_arbitrary_tcp_boundaries() {
    let wire = "data: {\"content\":\"Bonjour \"}\n\ndata: {\"content\":\"à vous\"}\n\n: ping\n\ndata: {\"content\":\" 漢\"}\n\ndata: [DONE]\n\n";
    let bytes = wire.as_bytes();
    // Cut inside the first frame, inside "à", and inside "漢".
    let a = 13;
    let b = bytes.iter().position(|x| *x == 0xC3).expect("à") + 1;
    let c = bytes.iter().position(|x| *x == 0xE6).expect("漢") + 2;
    let pieces = vec![
        bytes[..a].to_vec(),
        bytes[a..b].to_vec(),
        bytes[b..c].to_vec(),
        bytes[c..].to_vec(),
    ];
    let (url, request_rx) = serve_once(Reply {
        head: OK_HEAD.to_string(),
        pieces,
        hold_open: false,
    })
    .await;

    let mut stream = client_for(&url)
        .stream(ChatRequest::new().system("be nice").user("greet me"))
        .expect("start");
    let mut deltas = Vec::new();
    while let Some(event) = stream.next_event().await {
        match event {
            ChatEvent::Delta { seq, text, .. } => deltas.push((seq, text)),
            ChatEvent::Completed { .. } => break,
            ChatEvent::Failed { error, .. } => panic!("stream failed: {error}"),
            _ => {}
        }
    }
    assert_eq!(
        deltas,
        vec![
            (0, "Bonjour ".to_string()),
            (1, "à vous".to_string()),
            (2, " 漢".to_string())
        ]
    );
    let message = stream.finish().await.expect("finish");
    assert_eq!(message.content(), "Bonjour à vous 漢");

    let request = request_rx.await.expect("request");
    assert!(request.starts_with("POST /api/chat "));
    assert!(request.contains(r#"{"messages":[{"role":"system","content":"be nice"},{"role":"user","content":"greet me"}]}"#));
}

#[tokio::test]
async fn missing_sentinel_still_completes() {
    let (url, _) = serve_once(Reply {
        head: OK_HEAD.to_string(),
        pieces: vec![b"data: {\"content\":\"no \"}\n".to_vec(), b"data: {\"content\":\"sentinel\"}".to_vec()],
        hold_open: false,
    })
    .await;
    let text = client_for(&url)
        .collect(ChatRequest::new().user("hi"))
        .await
        .expect("collect");
    assert_eq!(text, "no sentinel");
}

#[tokio::test]
async fn error_status_is_transport_failure() {
    let (url, _) = serve_once(Reply {
        head: "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 21\r\nConnection: close\r\n\r\nInternal Server Error".to_string(),
        pieces: Vec::new(),
        hold_open: false,
    })
    .await;
    let stream = client_for(&url)
        .stream(ChatRequest::new().user("hi"))
        .expect("start");
    let message = stream.finish_message().await.expect("message");
    assert_eq!(message.status(), MessageStatus::Failed);
    assert!(message.content().is_empty());
    assert!(message.rendered().contains("500"));
}

#[tokio::test]
async fn refused_connection_is_transport_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let err = client_for(&format!("http://{addr}"))
        .collect(ChatRequest::new().user("hi"))
        .await
        .expect_err("refused");
    let ClientError::Stream(error) = err else {
        panic!("expected a stream error");
    };
    assert_eq!(error.kind(), ErrorKind::TransportFailure);
}

#[tokio::test]
async fn abort_mid_stream_keeps_received_text() {
    let (url, _) = serve_once(Reply {
        head: OK_HEAD.to_string(),
        pieces: vec![b"data: {\"content\":\"partial\"}\n\n".to_vec()],
        hold_open: true,
    })
    .await;
    let mut stream = client_for(&url)
        .stream(ChatRequest::new().user("hi"))
        .expect("start");
    let abort = stream.abort_handle();
    let mut cancelled = None;
    while let Some(event) = stream.next_event().await {
        match event {
            ChatEvent::Delta { .. } => abort.abort(),
            ChatEvent::Cancelled { message } => {
                cancelled = Some(message);
                break;
            }
            ChatEvent::Completed { .. } | ChatEvent::Failed { .. } => panic!("unexpected terminal"),
            ChatEvent::Started { .. } => {}
        }
    }
    let message = cancelled.expect("cancelled");
    assert_eq!(message.content(), "partial");
    assert_eq!(message.status(), MessageStatus::Cancelled);
}

#[tokio::test]
async fn consumer_reads_http_body_directly() {
    let (url, _) = serve_once(Reply {
        head: OK_HEAD.to_string(),
        pieces: vec![
            b"data: {\"content\":\"A\"}\n".to_vec(),
            b"data: {\"content\":\"B\"}\n".to_vec(),
            b"data: [DONE]\n".to_vec(),
        ],
        hold_open: true,
    })
    .await;
    let transport = HttpTransport::new(ClientConfig::default().base_url(url)).expect("transport");
    let body = transport
        .open(&ChatRequest::new().user("hi"))
        .await
        .expect("open");
    let mut message = AssistantMessage::new();
    let outcome = StreamConsumer::default()
        .consume(body, &mut message, CancelToken::never())
        .await;
    assert_eq!(outcome, StreamOutcome::Completed { deltas: 2 });
    assert_eq!(message.content(), "AB");
    assert_eq!(message.status(), MessageStatus::Completed);
}

#[tokio::test]
async fn health_endpoint_is_parsed() {
    let body = r#"{"status":"ok","timestamp":"2026-10-18T10:00:00","openai_configured":true}"#;
    let head = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let (url, request_rx) = serve_once(Reply {
        head,
        pieces: Vec::new(),
        hold_open: false,
    })
    .await;
    let health = HttpTransport::new(ClientConfig::default().base_url(url))
        .expect("transport")
        .health()
        .await
        .expect("health");
    assert!(health.is_ok());
    assert!(health.openai_configured);
    assert!(request_rx.await.expect("request").starts_with("GET /api/health "));
}

#[tokio::test]
async fn backend_that_never_answers_times_out() {
    let (url, request_rx) = serve_once(Reply {
        head: String::new(),
        pieces: Vec::new(),
        hold_open: true,
    })
    .await;
    let client = ChatClient::from_config(
        ClientConfig::default()
            .base_url(url)
            .read_timeout(Some(Duration::from_millis(200))),
    )
    .expect("client");
    let message = tokio::time::timeout(
        Duration::from_secs(3),
        client
            .stream(ChatRequest::new().user("hi"))
            .expect("start")
            .finish_message(),
    )
    .await
    .expect("stream reached a terminal state")
    .expect("message");
    assert_eq!(message.status(), MessageStatus::Failed);
    assert!(message.rendered().contains("read timed out"));
    assert!(request_rx.await.expect("request").starts_with("POST /api/chat "));
}

#[tokio::test]
async fn health_check_that_never_answers_times_out() {
    let (url, _) = serve_once(Reply {
        head: String::new(),
        pieces: Vec::new(),
        hold_open: true,
    })
    .await;
    let transport = HttpTransport::new(
        ClientConfig::default()
            .base_url(url)
            .read_timeout(Some(Duration::from_millis(200))),
    )
    .expect("transport");
    let err = tokio::time::timeout(Duration::from_secs(3), transport.health())
        .await
        .expect("health returned")
        .expect_err("timed out");
    assert_eq!(err.kind(), ErrorKind::TransportFailure);
}
