//! WebSocket client for the messaging gateway sidecar.
//!
//! The gateway owns the network protocol and session encryption; this client
//! speaks its JSON frame protocol. After a `connect` handshake, requests are
//! correlated to responses by id while unsolicited event frames are decoded
//! into [`InboundEvent`]s and forwarded in arrival order.
//!
//! When the WebSocket drops, a `closed` lifecycle event with code 428 is
//! emitted unless the gateway already reported a close.

use crate::credentials::AuthState;
use crate::error::SocketError;
use crate::socket::{ClientVersion, MessagingSocket, Session, SessionConnector};
use crate::version;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, trace, warn};
use wabot_common::content::{OutboundContent, SendOptions};
use wabot_common::event::ConnectionUpdate;
use wabot_common::frame::{self, event_name, method, Frame};
use wabot_common::types::{status_code, BROWSER, PROTOCOL_VERSION};
use wabot_common::{ConnectionState, InboundEvent, Jid, MessageKey};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(20);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const EVENT_CHANNEL_CAPACITY: usize = 256;
const OUTBOUND_CHANNEL_CAPACITY: usize = 64;

fn rand_id() -> String {
    let bytes: [u8; 16] = rand::thread_rng().gen();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

type Reply = Result<Value, SocketError>;

#[derive(Default)]
struct Pending {
    waiting: Mutex<HashMap<String, (&'static str, oneshot::Sender<Reply>)>>,
}

impl Pending {
    fn insert(&self, id: String, method: &'static str, tx: oneshot::Sender<Reply>) {
        self.waiting
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, (method, tx));
    }

    fn take(&self, id: &str) -> Option<(&'static str, oneshot::Sender<Reply>)> {
        self.waiting
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }

    /// Drops every waiter; their receivers resolve to `Closed`.
    fn clear(&self) {
        self.waiting
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Opens sessions through a gateway at a `ws://` or `wss://` URL.
#[derive(Debug, Clone)]
pub struct GatewayConnector {
    url: String,
    version_url: String,
    request_timeout: Duration,
}

impl GatewayConnector {
    /// Connector for the gateway at `url`, fetching versions from `version_url`.
    pub fn new(url: impl Into<String>, version_url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            version_url: version_url.into(),
            request_timeout: REQUEST_TIMEOUT,
        }
    }

    /// Overrides the per-request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[async_trait]
impl SessionConnector for GatewayConnector {
    async fn fetch_version(&self) -> ClientVersion {
        version::fetch_latest_version(&self.version_url).await
    }

    async fn open(&self, auth: AuthState, version: ClientVersion) -> Result<Session, SocketError> {
        let (ws, _) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| SocketError::Connect(e.to_string()))?;
        let (mut ws_tx, mut ws_rx) = ws.split();
        debug!(gateway = %self.url, "gateway transport connected");

        let connect_id = format!("connect-{}", rand_id());
        let hello = Frame::request(
            connect_id.as_str(),
            method::CONNECT,
            json!({
                "protocol": PROTOCOL_VERSION,
                "version": version,
                "browser": BROWSER,
                "creds": auth.creds,
            }),
        );
        ws_tx
            .send(Message::Text(hello.serialize()))
            .await
            .map_err(|e| SocketError::Connect(e.to_string()))?;

        // Events may precede the handshake response; keep them in order.
        let mut early = Vec::new();
        let payload = tokio::time::timeout(HANDSHAKE_TIMEOUT, async {
            loop {
                let msg = ws_rx
                    .next()
                    .await
                    .ok_or_else(|| SocketError::Connect("closed during handshake".to_string()))?
                    .map_err(|e| SocketError::Connect(e.to_string()))?;
                let Message::Text(text) = msg else {
                    continue;
                };
                match Frame::parse(&text) {
                    Ok(Frame::Res {
                        id, ok, payload, error,
                    }) if id == connect_id => {
                        if ok {
                            return Ok(payload);
                        }
                        let error = error.unwrap_or_else(|| frame::ErrorBody {
                            message: "unknown error".to_string(),
                            status_code: None,
                        });
                        return Err(SocketError::Rejected {
                            message: error.message,
                            status_code: error.status_code,
                        });
                    }
                    Ok(Frame::Event { event, payload }) => early.push((event, payload)),
                    Ok(other) => debug!(?other, "ignoring frame during handshake"),
                    Err(e) => debug!(error = %e, "ignoring unparseable frame during handshake"),
                }
            }
        })
        .await
        .map_err(|_| SocketError::Timeout(method::CONNECT.to_string()))??;

        let user_id = payload
            .pointer("/user/id")
            .and_then(Value::as_str)
            .map(Jid::from)
            .ok_or_else(|| SocketError::Rejected {
                message: "handshake response carries no user id".to_string(),
                status_code: None,
            })?;
        info!(user = %user_id, "gateway session established");

        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (out_tx, out_rx) = mpsc::channel(OUTBOUND_CHANNEL_CAPACITY);
        let pending = Arc::new(Pending::default());

        let mut saw_close = false;
        for (name, payload) in early {
            saw_close |= forward_event(&events_tx, &name, payload).await;
        }

        tokio::spawn(run_io(
            ws_tx,
            ws_rx,
            out_rx,
            events_tx,
            pending.clone(),
            saw_close,
        ));

        Ok(Session {
            socket: Arc::new(GatewaySocket {
                user_id,
                outbound: out_tx,
                pending,
                request_timeout: self.request_timeout,
            }),
            events: events_rx,
        })
    }
}

/// Handle to an open gateway session.
pub struct GatewaySocket {
    user_id: Jid,
    outbound: mpsc::Sender<String>,
    pending: Arc<Pending>,
    request_timeout: Duration,
}

impl GatewaySocket {
    async fn request(&self, method: &'static str, params: Value) -> Result<Value, SocketError> {
        let id = rand_id();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id.clone(), method, tx);

        let frame = Frame::request(id.as_str(), method, params);
        if self.outbound.send(frame.serialize()).await.is_err() {
            self.pending.take(&id);
            return Err(SocketError::Closed);
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => Err(SocketError::Closed),
            Err(_) => {
                self.pending.take(&id);
                Err(SocketError::Timeout(method.to_string()))
            }
        }
    }
}

#[async_trait]
impl MessagingSocket for GatewaySocket {
    fn user_id(&self) -> Jid {
        self.user_id.clone()
    }

    async fn send_message(
        &self,
        to: &Jid,
        content: OutboundContent,
        options: SendOptions,
    ) -> Result<(), SocketError> {
        self.request(
            method::SEND_MESSAGE,
            json!({ "jid": to, "content": content, "options": options }),
        )
        .await
        .map(drop)
    }

    async fn read_messages(&self, keys: &[MessageKey]) -> Result<(), SocketError> {
        self.request(method::READ_MESSAGES, json!({ "keys": keys }))
            .await
            .map(drop)
    }

    async fn group_accept_invite(&self, code: &str) -> Result<Jid, SocketError> {
        let payload = self
            .request(method::GROUP_ACCEPT_INVITE, json!({ "code": code }))
            .await?;
        payload
            .get("jid")
            .and_then(Value::as_str)
            .map(Jid::from)
            .ok_or_else(|| SocketError::Request {
                method: method::GROUP_ACCEPT_INVITE.to_string(),
                message: "response carries no group id".to_string(),
            })
    }

    async fn set_public(&self, public: bool) -> Result<(), SocketError> {
        self.request(method::SET_PRESENCE_MODE, json!({ "public": public }))
            .await
            .map(drop)
    }
}

/// Decodes and forwards one event. Returns whether it was a `closed` update.
async fn forward_event(events_tx: &mpsc::Sender<InboundEvent>, name: &str, payload: Value) -> bool {
    match frame::decode_event(name, payload) {
        Ok(Some(event)) => {
            let is_close = matches!(
                &event,
                InboundEvent::Lifecycle(u) if u.connection == Some(ConnectionState::Closed)
            );
            if events_tx.send(event).await.is_err() {
                trace!(event = name, "event dropped: session no longer observed");
            }
            is_close
        }
        Ok(None) => {
            debug!(event = name, "ignoring unknown gateway event");
            false
        }
        Err(e) => {
            warn!(error = %e, "dropping malformed gateway event");
            false
        }
    }
}

fn resolve(pending: &Pending, id: &str, ok: bool, payload: Value, error: Option<frame::ErrorBody>) {
    let Some((method, tx)) = pending.take(id) else {
        debug!(id = %id, "response for unknown request");
        return;
    };
    let reply = if ok {
        Ok(payload)
    } else {
        Err(SocketError::Request {
            method: method.to_string(),
            message: error.map_or_else(|| "unknown error".to_string(), |e| e.message),
        })
    };
    let _ = tx.send(reply);
}

async fn run_io<S>(
    mut ws_tx: SplitSink<WebSocketStream<S>, Message>,
    mut ws_rx: SplitStream<WebSocketStream<S>>,
    mut out_rx: mpsc::Receiver<String>,
    events_tx: mpsc::Sender<InboundEvent>,
    pending: Arc<Pending>,
    mut saw_close: bool,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                let msg = match msg {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        debug!(error = %e, "gateway transport error");
                        break;
                    }
                    None => break,
                };
                match msg {
                    Message::Text(text) => match Frame::parse(&text) {
                        Ok(Frame::Res { id, ok, payload, error }) => {
                            resolve(&pending, &id, ok, payload, error);
                        }
                        Ok(Frame::Event { event, payload }) => {
                            saw_close |= forward_event(&events_tx, &event, payload).await;
                        }
                        Ok(Frame::Req { method, .. }) => {
                            debug!(method = %method, "ignoring request frame from gateway");
                        }
                        Err(e) => debug!(error = %e, "ignoring unparseable frame"),
                    },
                    Message::Ping(data) => {
                        if ws_tx.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }

            outbound = out_rx.recv() => {
                let Some(text) = outbound else {
                    // Every socket handle is gone.
                    let _ = ws_tx.close().await;
                    break;
                };
                if let Err(e) = ws_tx.send(Message::Text(text)).await {
                    debug!(error = %e, "gateway send failed");
                    break;
                }
            }
        }
    }

    pending.clear();
    if !saw_close {
        debug!(event = event_name::CONNECTION_UPDATE, "gateway link dropped");
        let closed = ConnectionUpdate::closed(Some(status_code::CONNECTION_CLOSED));
        let _ = events_tx.send(InboundEvent::Lifecycle(closed)).await;
    }
}
