//! ランドマークストリームの受信。接続して購読者に配り、切れたら再接続し続ける
//!
//! `Disconnected → Connecting → Connected → Closed → Connecting → …`
//! 終了状態はなく、future を drop したときだけループが止まる

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use anyhow::Result;
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::protocol::StreamFrame;

pub const RECONNECT_DELAY: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closed,
}

/// パース済みフレームを到着順に、受信したループの回で受け取る
pub trait FrameSubscriber {
    fn on_frame(&mut self, frame: &StreamFrame);

    fn on_connectivity(&mut self, _connected: bool) {}
}

impl<T: FrameSubscriber> FrameSubscriber for Rc<RefCell<T>> {
    fn on_frame(&mut self, frame: &StreamFrame) {
        self.borrow_mut().on_frame(frame);
    }

    fn on_connectivity(&mut self, connected: bool) {
        self.borrow_mut().on_connectivity(connected);
    }
}

/// ストリーミングチャネルを開く
#[allow(async_fn_in_trait)]
pub trait Transport {
    type Channel: Channel;

    async fn connect(&mut self) -> Result<Self::Channel>;
}

/// 開いているチャネル。`None` は相手が閉じたことを表す
#[allow(async_fn_in_trait)]
pub trait Channel {
    async fn recv(&mut self) -> Option<Result<String>>;
}

/// 再接続待ちの遅延
#[allow(async_fn_in_trait)]
pub trait Timer {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioTimer;

impl Timer for TokioTimer {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub attempts: u64,
    pub delivered: u64,
    pub dropped: u64,
}

pub struct ConnectionManager<T: Transport, C: Timer> {
    transport: T,
    timer: C,
    reconnect_delay: Duration,
    state: ConnectionState,
    subscribers: Vec<Box<dyn FrameSubscriber>>,
    stats: StreamStats,
}

impl<T: Transport, C: Timer> ConnectionManager<T, C> {
    pub fn new(transport: T, timer: C, reconnect_delay: Duration) -> Self {
        Self {
            transport,
            timer,
            reconnect_delay,
            state: ConnectionState::Disconnected,
            subscribers: Vec::new(),
            stats: StreamStats::default(),
        }
    }

    pub fn subscribe(&mut self, subscriber: impl FrameSubscriber + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    /// チャネルを開く。失敗したら `Closed` のまま
    pub async fn connect(&mut self) -> Option<T::Channel> {
        self.state = ConnectionState::Connecting;
        self.stats.attempts += 1;
        info!(attempt = self.stats.attempts, "[stream] connecting");

        match self.transport.connect().await {
            Ok(channel) => {
                self.state = ConnectionState::Connected;
                info!("[stream] connected");
                self.notify_connectivity(true);
                Some(channel)
            }
            Err(e) => {
                warn!("[stream] connection failed: {e:#}");
                self.state = ConnectionState::Closed;
                None
            }
        }
    }

    /// メッセージを1件パースして全購読者に渡す。不正なペイロードはログに出して捨てる
    pub fn dispatch(&mut self, text: &str) {
        let frame = match StreamFrame::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                self.stats.dropped += 1;
                warn!(dropped = self.stats.dropped, "[stream] malformed payload: {e}");
                return;
            }
        };
        for subscriber in &mut self.subscribers {
            subscriber.on_frame(&frame);
        }
        self.stats.delivered += 1;
    }

    /// チャネルが閉じるかエラーになるまで配信する
    pub async fn pump(&mut self, channel: &mut T::Channel) {
        while let Some(message) = channel.recv().await {
            match message {
                Ok(text) => self.dispatch(&text),
                Err(e) => {
                    warn!("[stream] transport error: {e:#}");
                    break;
                }
            }
        }
        self.state = ConnectionState::Closed;
        info!("[stream] closed");
        self.notify_connectivity(false);
    }

    /// 接続、切断まで配信、待機を1周して `Connecting` に戻る
    pub async fn cycle(&mut self) {
        if let Some(mut channel) = self.connect().await {
            self.pump(&mut channel).await;
        }
        info!("[stream] reconnecting in {}ms...", self.reconnect_delay.as_millis());
        self.timer.sleep(self.reconnect_delay).await;
        self.state = ConnectionState::Connecting;
    }

    /// 戻らない
    pub async fn run(&mut self) {
        loop {
            self.cycle().await;
        }
    }

    fn notify_connectivity(&mut self, connected: bool) {
        for subscriber in &mut self.subscribers {
            subscriber.on_connectivity(connected);
        }
    }
}

// ---------------------------------------------------------------------------
// WebSocket トランスポート
// ---------------------------------------------------------------------------

pub struct WsTransport {
    url: String,
}

impl WsTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Transport for WsTransport {
    type Channel = WsChannel;

    async fn connect(&mut self) -> Result<WsChannel> {
        let (stream, _response) = tokio_tungstenite::connect_async(self.url.as_str()).await?;
        Ok(WsChannel { stream })
    }
}

pub struct WsChannel {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Channel for WsChannel {
    async fn recv(&mut self) -> Option<Result<String>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Binary(data)) => {
                    return Some(Ok(String::from_utf8_lossy(&data).into_owned()))
                }
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "[stream] close frame");
                    return None;
                }
                Ok(_) => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}
