//! Transport tests: the real connector against local sockets.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use market_data::{
    ChannelSubscriber, ConnectionState, MirrorConfig, OrderBookMirror, TungsteniteConnector,
    UpstreamConnector, UpstreamEvent, UpstreamLink,
};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};

// ---------------------------------------------------------------------------
// Local upstreams
// ---------------------------------------------------------------------------

const BOOK: &str = r#"{"event_type":"book","asset_id":"7132","bids":[],"asks":[]}"#;
const PRICE: &str = r#"{"event_type":"price_change","asset_id":"7132"}"#;
const TICK: &str = r#"[{"event_type":"tick_size_change"}]"#;

/// Serve `session` on every accepted connection.
async fn serve<F, Fut>(session: F) -> SocketAddr
where
    F: Fn(TcpStream) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(session(stream));
        }
    });
    addr
}

/// Text, UTF-8 binary, non-UTF-8 binary, text, then a clean close.
async fn scripted_session(stream: TcpStream) {
    let mut ws = accept_async(stream).await.unwrap();
    ws.send(Message::Text(BOOK.into())).await.unwrap();
    ws.send(Message::Binary(PRICE.as_bytes().to_vec().into()))
        .await
        .unwrap();
    ws.send(Message::Binary(vec![0xff, 0xfe, 0xfd].into()))
        .await
        .unwrap();
    ws.send(Message::Text(TICK.into())).await.unwrap();
    ws.close(None).await.unwrap();
    while let Some(Ok(_)) = ws.next().await {}
}

fn url(addr: SocketAddr) -> String {
    format!("ws://{}", addr)
}

fn config(addr: SocketAddr) -> MirrorConfig {
    MirrorConfig {
        upstream_url: url(addr),
        reconnect_delay: Duration::from_millis(100),
        connect_timeout: Duration::from_millis(300),
        subscriber_buffer: 64,
    }
}

async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    for _ in 0..300 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {}", what);
}

/// Read up to the terminal event, then release the write half and read on
/// until both tasks have let go of the channel.
async fn drain(link: UpstreamLink) -> Vec<UpstreamEvent> {
    let UpstreamLink {
        outbound,
        mut inbound,
    } = link;
    let mut outbound = Some(outbound);
    let mut events = Vec::new();
    while let Ok(Some(event)) =
        tokio::time::timeout(Duration::from_secs(3), inbound.recv()).await
    {
        if matches!(event, UpstreamEvent::Closed | UpstreamEvent::Failed(_)) {
            outbound.take();
        }
        events.push(event);
    }
    events
}

// ---------------------------------------------------------------------------
// Connector
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_session_maps_frames_and_ends_with_single_close() {
    let addr = serve(scripted_session).await;
    let link = TungsteniteConnector::new(url(addr)).connect().await.unwrap();

    let events = drain(link).await;
    assert_eq!(
        events,
        vec![
            UpstreamEvent::Frame(BOOK.to_string()),
            UpstreamEvent::Frame(PRICE.to_string()),
            UpstreamEvent::Frame(TICK.to_string()),
            UpstreamEvent::Closed,
        ]
    );
}

#[tokio::test]
async fn test_reset_without_close_is_single_failure() {
    let addr = serve(|stream| async move {
        let ws = accept_async(stream).await.unwrap();
        drop(ws);
    })
    .await;
    let link = TungsteniteConnector::new(url(addr)).connect().await.unwrap();

    let events = drain(link).await;
    assert_eq!(events.len(), 1, "events: {:?}", events);
    assert!(matches!(events[0], UpstreamEvent::Failed(_)));
}

#[tokio::test]
async fn test_refused_connection_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    assert!(TungsteniteConnector::new(url(addr)).connect().await.is_err());
}

// ---------------------------------------------------------------------------
// Mirror over the real transport
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_mirror_relays_then_reconnects_after_close() {
    let addr = serve(scripted_session).await;
    let mirror = Arc::new(OrderBookMirror::new(
        config(addr),
        Arc::new(TungsteniteConnector::new(url(addr))),
    ));
    let (sub, mut rx) = ChannelSubscriber::channel(64);
    let _guard = mirror.add_subscriber(Arc::new(sub));

    let handle = mirror.spawn().unwrap();

    // Two sessions' worth: the second proves the reconnect happened.
    for _ in 0..2 {
        for expected in [BOOK, PRICE, TICK] {
            let got = tokio::time::timeout(Duration::from_secs(3), rx.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(got, expected);
        }
    }
    assert!(mirror.connect_attempts() >= 2);
    assert!(mirror.generation() >= 2);
    assert_eq!(mirror.metrics().frames_malformed, 0);

    handle.abort();
}

#[tokio::test]
async fn test_market_subscription_written_upstream() {
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel::<String>();
    let addr = serve(move |stream| {
        let seen_tx = seen_tx.clone();
        async move {
            let mut ws = accept_async(stream).await.unwrap();
            while let Some(Ok(msg)) = ws.next().await {
                if let Message::Text(text) = msg {
                    let _ = seen_tx.send(text.to_string());
                }
            }
        }
    })
    .await;
    let mirror = Arc::new(OrderBookMirror::new(
        config(addr),
        Arc::new(TungsteniteConnector::new(url(addr))),
    ));
    let handle = mirror.spawn().unwrap();

    eventually("connected", || mirror.state() == ConnectionState::Connected).await;
    assert!(mirror.subscribe_to_market("7132"));

    let sent = tokio::time::timeout(Duration::from_secs(3), seen_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sent, r#"{"type":"Market","assets":["7132"]}"#);

    handle.abort();
}

#[tokio::test]
async fn test_silent_handshake_times_out_and_retries() {
    // Accept TCP and never answer the upgrade request.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    let mirror = Arc::new(OrderBookMirror::new(
        config(addr),
        Arc::new(TungsteniteConnector::new(url(addr))),
    ));
    let handle = mirror.spawn().unwrap();

    eventually("a third attempt", || mirror.connect_attempts() >= 3).await;
    assert_ne!(mirror.state(), ConnectionState::Connected);

    handle.abort();
}
