use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::error::{SessionError, TransportError};
use crate::types::{ClientCommand, RemoteConfig, SessionEvent};

const KNOWN_EVENTS: &[&str] = &[
    "config",
    "error",
    "scan_start",
    "item_found",
    "scan_progress",
    "scan_complete",
];

/// 双工消息通道。每次搜索打开一个新连接，不重连、不重试。
#[allow(async_fn_in_trait)]
pub trait Transport {
    type Connection: Connection;

    async fn connect(&self, endpoint: &str) -> Result<Self::Connection, TransportError>;
}

#[allow(async_fn_in_trait)]
pub trait Connection {
    async fn send(&mut self, command: &ClientCommand) -> Result<(), TransportError>;

    /// 按到达顺序返回下一条事件；`None` 表示连接已结束。
    /// 传输层故障只返回一次 `Err`，之后都是 `None`。
    /// 必须可以安全取消（会放在 `select!` 里）。
    async fn next_event(&mut self) -> Option<Result<SessionEvent, TransportError>>;

    async fn close(&mut self);
}

/// 解析一帧 JSON。未知类型返回 `Ok(None)`。
pub fn decode_event(text: &str) -> Result<Option<SessionEvent>, TransportError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| TransportError::Decode(e.to_string()))?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| TransportError::Decode("缺少 type 字段".to_string()))?;
    if !KNOWN_EVENTS.contains(&kind) {
        debug!("忽略未知消息类型: {}", kind);
        return Ok(None);
    }
    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| TransportError::Decode(e.to_string()))
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WsTransport;

impl Transport for WsTransport {
    type Connection = WsConnection;

    async fn connect(&self, endpoint: &str) -> Result<WsConnection, TransportError> {
        let (stream, _response) = tokio_tungstenite::connect_async(endpoint)
            .await
            .map_err(|e| TransportError::Connect {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;
        info!("已连接 {}", endpoint);
        Ok(WsConnection {
            stream,
            finished: false,
        })
    }
}

pub struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    finished: bool,
}

impl Connection for WsConnection {
    async fn send(&mut self, command: &ClientCommand) -> Result<(), TransportError> {
        let text =
            serde_json::to_string(command).map_err(|e| TransportError::Send(e.to_string()))?;
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn next_event(&mut self) -> Option<Result<SessionEvent, TransportError>> {
        while !self.finished {
            let frame = match self.stream.next().await {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(TransportError::Dropped(e.to_string())));
                }
                None => {
                    self.finished = true;
                    return None;
                }
            };

            let text = match frame {
                Message::Text(text) => text,
                Message::Binary(bytes) => match String::from_utf8(bytes) {
                    Ok(text) => text,
                    Err(_) => {
                        warn!("丢弃非 UTF-8 二进制帧");
                        continue;
                    }
                },
                Message::Close(_) => {
                    self.finished = true;
                    return None;
                }
                // ping/pong 由 tungstenite 自动应答
                _ => continue,
            };

            match decode_event(&text) {
                Ok(Some(event)) => return Some(Ok(event)),
                Ok(None) => continue,
                Err(e) => warn!("丢弃无法解析的消息: {}", e),
            }
        }
        None
    }

    async fn close(&mut self) {
        if !self.finished {
            self.finished = true;
            if let Err(e) = self.stream.close(None).await {
                debug!("关闭连接时出错: {}", e);
            }
        }
    }
}

/// 启动时单独打开一次连接，只为拿到 `config` 事件，拿到后立即关闭
pub async fn fetch_remote_config<T: Transport>(
    transport: &T,
    endpoint: &str,
) -> Result<RemoteConfig, SessionError> {
    let mut conn = transport.connect(endpoint).await?;
    let outcome = loop {
        match conn.next_event().await {
            Some(Ok(SessionEvent::Config {
                file_categories,
                defaults,
            })) => {
                break Ok(RemoteConfig {
                    file_categories,
                    defaults,
                })
            }
            Some(Ok(SessionEvent::Error { message })) => break Err(SessionError::Server(message)),
            Some(Ok(other)) => debug!("等待配置时忽略事件: {}", other.kind()),
            Some(Err(e)) => break Err(e.into()),
            None => break Err(TransportError::ClosedEarly.into()),
        }
    };
    conn.close().await;
    outcome
}
