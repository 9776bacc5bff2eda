#![allow(dead_code)]

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use wabot::collaborators::{CallHandler, Collaborators, CommandHandler, GroupUpdateHandler};
use wabot::credentials::{AuthState, CredentialStore};
use wabot::error::SocketError;
use wabot::socket::{ClientVersion, MessagingSocket, Session, SessionConnector};
use wabot_common::content::{OutboundContent, SendOptions};
use wabot_common::event::{CallEvent, ConnectionUpdate, GroupParticipantsUpdate};
use wabot_common::types::DEFAULT_CLIENT_VERSION;
use wabot_common::{ConnectionState, InboundEvent, Jid, MessageBatch, MessageEnvelope, MessageKey};

pub const OWN_ID: &str = "254700000001:12@s.whatsapp.net";
pub const OWN_DECODED: &str = "254700000001@s.whatsapp.net";

/// One observed interaction, socket call or collaborator delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Send {
        to: Jid,
        content: OutboundContent,
        options: SendOptions,
    },
    Read(Vec<MessageKey>),
    Join(String),
    SetPublic(bool),
    Handled(MessageBatch),
    GroupUpdate(GroupParticipantsUpdate),
    Calls(Vec<CallEvent>),
}

#[derive(Default)]
pub struct Recorder {
    calls: Mutex<Vec<Call>>,
}

impl Recorder {
    pub fn push(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sends(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Send { .. }))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.lock().unwrap().is_empty()
    }

    /// Polls until `pred` holds, for effects run on detached tasks.
    pub async fn wait_for(&self, pred: impl Fn(&[Call]) -> bool) {
        for _ in 0..200 {
            if pred(self.calls().as_slice()) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached, calls: {:?}", self.calls());
    }
}

pub struct MockSocket {
    pub recorder: Arc<Recorder>,
    pub fail_sends: bool,
    pub fail_reads: bool,
}

impl MockSocket {
    pub fn new(recorder: Arc<Recorder>) -> Self {
        Self {
            recorder,
            fail_sends: false,
            fail_reads: false,
        }
    }
}

#[async_trait]
impl MessagingSocket for MockSocket {
    fn user_id(&self) -> Jid {
        Jid::from(OWN_ID)
    }

    async fn send_message(
        &self,
        to: &Jid,
        content: OutboundContent,
        options: SendOptions,
    ) -> Result<(), SocketError> {
        self.recorder.push(Call::Send {
            to: to.clone(),
            content,
            options,
        });
        if self.fail_sends {
            return Err(SocketError::Timeout("sendMessage".to_string()));
        }
        Ok(())
    }

    async fn read_messages(&self, keys: &[MessageKey]) -> Result<(), SocketError> {
        self.recorder.push(Call::Read(keys.to_vec()));
        if self.fail_reads {
            return Err(SocketError::Closed);
        }
        Ok(())
    }

    async fn group_accept_invite(&self, code: &str) -> Result<Jid, SocketError> {
        self.recorder.push(Call::Join(code.to_string()));
        Err(SocketError::Request {
            method: "groupAcceptInvite".to_string(),
            message: "invite expired".to_string(),
        })
    }

    async fn set_public(&self, public: bool) -> Result<(), SocketError> {
        self.recorder.push(Call::SetPublic(public));
        Ok(())
    }
}

/// Collaborator that records every delivery.
pub struct RecordingHandler {
    pub recorder: Arc<Recorder>,
    /// Panic when a message with this text arrives.
    pub panic_on: Option<String>,
    /// Never return once a message with this text has been recorded.
    pub stall_on: Option<String>,
}

#[async_trait]
impl CommandHandler for RecordingHandler {
    async fn handle(
        &self,
        batch: MessageBatch,
        _socket: Arc<dyn MessagingSocket>,
    ) -> anyhow::Result<()> {
        let text = batch.messages.first().and_then(|m| m.text()).map(str::to_string);
        if let (Some(trigger), Some(text)) = (&self.panic_on, &text) {
            if trigger == text {
                panic!("handler exploded");
            }
        }
        self.recorder.push(Call::Handled(batch));
        if text.is_some() && text == self.stall_on {
            std::future::pending::<()>().await;
        }
        if text.as_deref() == Some("fail") {
            anyhow::bail!("command failed");
        }
        Ok(())
    }
}

#[async_trait]
impl GroupUpdateHandler for RecordingHandler {
    async fn on_group_update(
        &self,
        _socket: Arc<dyn MessagingSocket>,
        update: GroupParticipantsUpdate,
    ) -> anyhow::Result<()> {
        self.recorder.push(Call::GroupUpdate(update));
        Ok(())
    }
}

#[async_trait]
impl CallHandler for RecordingHandler {
    async fn on_call(
        &self,
        calls: Vec<CallEvent>,
        _socket: Arc<dyn MessagingSocket>,
    ) -> anyhow::Result<()> {
        self.recorder.push(Call::Calls(calls));
        Ok(())
    }
}

pub fn recording_collaborators(recorder: &Arc<Recorder>, panic_on: Option<&str>) -> Collaborators {
    collaborators_with(RecordingHandler {
        recorder: recorder.clone(),
        panic_on: panic_on.map(str::to_string),
        stall_on: None,
    })
}

/// Collaborators whose command handler hangs on `text`.
pub fn stalling_collaborators(recorder: &Arc<Recorder>, text: &str) -> Collaborators {
    collaborators_with(RecordingHandler {
        recorder: recorder.clone(),
        panic_on: None,
        stall_on: Some(text.to_string()),
    })
}

fn collaborators_with(handler: RecordingHandler) -> Collaborators {
    let handler = Arc::new(handler);
    Collaborators {
        commands: handler.clone(),
        groups: handler.clone(),
        calls: handler,
    }
}

/// Connector replaying one scripted event list per `open`.
pub struct MockConnector {
    socket: Arc<MockSocket>,
    scripts: Mutex<VecDeque<Vec<InboundEvent>>>,
    opens: Mutex<u32>,
}

impl MockConnector {
    pub fn new(socket: Arc<MockSocket>, scripts: Vec<Vec<InboundEvent>>) -> Self {
        Self {
            socket,
            scripts: Mutex::new(scripts.into()),
            opens: Mutex::new(0),
        }
    }

    pub fn opens(&self) -> u32 {
        *self.opens.lock().unwrap()
    }
}

#[async_trait]
impl SessionConnector for MockConnector {
    async fn fetch_version(&self) -> ClientVersion {
        DEFAULT_CLIENT_VERSION
    }

    async fn open(&self, _auth: AuthState, _version: ClientVersion) -> Result<Session, SocketError> {
        *self.opens.lock().unwrap() += 1;
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| SocketError::Connect("no scripted session left".to_string()))?;

        let (tx, rx) = mpsc::channel(script.len().max(1));
        for event in script {
            tx.send(event).await.unwrap();
        }
        Ok(Session {
            socket: self.socket.clone(),
            events: rx,
        })
    }
}

pub fn open() -> InboundEvent {
    InboundEvent::Lifecycle(ConnectionUpdate::state(ConnectionState::Open))
}

pub fn connecting() -> InboundEvent {
    InboundEvent::Lifecycle(ConnectionUpdate::state(ConnectionState::Connecting))
}

pub fn closed(code: Option<u16>) -> InboundEvent {
    InboundEvent::Lifecycle(ConnectionUpdate::closed(code))
}

pub fn envelope(value: Value) -> MessageEnvelope {
    serde_json::from_value(value).unwrap()
}

pub fn chat_message(text: &str) -> MessageEnvelope {
    envelope(json!({
        "key": {"remoteJid": "254711111111@s.whatsapp.net", "fromMe": false, "id": format!("ID-{text}")},
        "pushName": "Tester",
        "message": {"conversation": text}
    }))
}

pub fn status_update() -> MessageEnvelope {
    envelope(json!({
        "key": {
            "remoteJid": "status@broadcast",
            "fromMe": false,
            "id": "STATUS1",
            "participant": "254722222222@s.whatsapp.net"
        },
        "message": {"imageMessage": {"caption": "sunset"}}
    }))
}

pub fn temp_dir() -> PathBuf {
    let random_suffix: u64 = rand::random();
    std::env::temp_dir().join(format!("wabot_it_{random_suffix}"))
}

/// Credential store over a temp dir holding a valid `session.json`.
pub fn store_with_session(dir: &PathBuf) -> CredentialStore {
    std::fs::create_dir_all(dir).unwrap();
    let encoded = BASE64.encode(json!({"me": {"id": OWN_ID}}).to_string());
    std::fs::write(
        dir.join("session.json"),
        json!({ "SESSION_ID": encoded }).to_string(),
    )
    .unwrap();
    CredentialStore::new(dir.join("session"), dir.join("session.json"))
}
