//! 本地 WebSocket 替身后端：连接建立后先推送 config，
//! 收到 start_search 后按脚本回放事件并关闭连接。

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Map, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info, warn};

use crate::types::{ClientCommand, ScanProgress, SearchRequest, SessionEvent};

/// 回放的一帧：正常事件走文本帧，`Binary` 原样作为二进制帧发出
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptFrame {
    Event(SessionEvent),
    Binary(Vec<u8>),
}

impl From<SessionEvent> for ScriptFrame {
    fn from(event: SessionEvent) -> Self {
        Self::Event(event)
    }
}

#[derive(Debug, Clone)]
pub struct StubScript {
    pub file_categories: Vec<String>,
    pub defaults: Map<String, Value>,
    pub frames: Vec<ScriptFrame>,
}

impl StubScript {
    pub fn new(events: Vec<SessionEvent>) -> Self {
        Self::from_frames(events.into_iter().map(ScriptFrame::from).collect())
    }

    pub fn from_frames(frames: Vec<ScriptFrame>) -> Self {
        Self {
            file_categories: Vec::new(),
            defaults: Map::new(),
            frames,
        }
    }

    pub fn with_config(mut self, file_categories: Vec<String>, defaults: Map<String, Value>) -> Self {
        self.file_categories = file_categories;
        self.defaults = defaults;
        self
    }

    fn config_event(&self) -> SessionEvent {
        SessionEvent::Config {
            file_categories: self.file_categories.clone(),
            defaults: self.defaults.clone(),
        }
    }

    /// 演示用脚本：在搜索路径下"找到"几个文件
    pub fn demo(found: &[&str], summary: &str) -> Self {
        let mut events = vec![SessionEvent::ScanStart {
            task_id: Some("demo-1".to_string()),
        }];
        for (i, path) in found.iter().enumerate() {
            events.push(SessionEvent::ItemFound {
                path: path.to_string(),
            });
            events.push(SessionEvent::ScanProgress {
                progress: ScanProgress {
                    scanned: (i as u64 + 1) * 10,
                    found: i as u64 + 1,
                },
            });
        }
        events.push(SessionEvent::ScanComplete {
            results: found.iter().map(|p| p.to_string()).collect(),
            summary: summary.to_string(),
        });

        let defaults = match json!({ "max_results": 100, "preview_length": 200 }) {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self::new(events).with_config(
            vec!["Documents".into(), "Images".into(), "Code".into()],
            defaults,
        )
    }
}

pub struct StubServer {
    listener: TcpListener,
    script: Arc<StubScript>,
    received: Arc<Mutex<Vec<SearchRequest>>>,
}

impl StubServer {
    pub async fn bind(addr: &str, script: StubScript) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("绑定 {} 失败", addr))?;
        Ok(Self {
            listener,
            script: Arc::new(script),
            received: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn endpoint(&self) -> Result<String> {
        Ok(format!("ws://{}/ws", self.local_addr()?))
    }

    /// 已收到的搜索请求，按到达顺序
    pub fn received(&self) -> Arc<Mutex<Vec<SearchRequest>>> {
        self.received.clone()
    }

    pub async fn serve(self) -> Result<()> {
        info!("替身后端监听 {}", self.local_addr()?);
        loop {
            let (stream, peer) = self.listener.accept().await.context("接受连接失败")?;
            let script = self.script.clone();
            let received = self.received.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_client(stream, script, received).await {
                    error!("处理 {} 失败: {}", peer, e);
                }
            });
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(e) = self.serve().await {
                error!("替身后端退出: {}", e);
            }
        })
    }
}

async fn handle_client(
    stream: TcpStream,
    script: Arc<StubScript>,
    received: Arc<Mutex<Vec<SearchRequest>>>,
) -> Result<()> {
    let mut ws = tokio_tungstenite::accept_async(stream)
        .await
        .context("WebSocket 握手失败")?;

    send_event(&mut ws, &script.config_event()).await?;

    while let Some(frame) = ws.next().await {
        let text = match frame? {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        match serde_json::from_str::<ClientCommand>(&text) {
            Ok(ClientCommand::StartSearch { payload }) => {
                debug!("收到搜索请求: {}", payload.label());
                if let Ok(mut list) = received.lock() {
                    list.push(payload);
                }
                for frame in &script.frames {
                    match frame {
                        ScriptFrame::Event(event) => send_event(&mut ws, event).await?,
                        ScriptFrame::Binary(bytes) => ws.send(Message::Binary(bytes.clone())).await?,
                    }
                }
                ws.close(None).await.ok();
                break;
            }
            Err(e) => warn!("无法解析客户端消息: {}", e),
        }
    }
    Ok(())
}

async fn send_event(ws: &mut WebSocketStream<TcpStream>, event: &SessionEvent) -> Result<()> {
    let text = serde_json::to_string(event)?;
    ws.send(Message::Text(text)).await?;
    Ok(())
}
