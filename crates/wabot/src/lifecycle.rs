//! Session lifecycle state machine.
//!
//! Tracks the [`ConnectionState`], performs the on-open side effects and
//! classifies every close into reopen or terminate. The startup
//! announcement is sent once per process; only a logout clears the flag.

use crate::config::{BotMode, Config};
use crate::effects::{self, BestEffort};
use crate::metrics::counters;
use crate::presentation;
use crate::socket::MessagingSocket;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use wabot_common::content::{
    Button, ContextInfo, ExternalAdReply, OutboundContent, SendOptions, TextMessage,
};
use wabot_common::event::ConnectionUpdate;
use wabot_common::{ConnectionState, DisconnectReason};

/// What the runtime must do after a lifecycle update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    /// Keep processing events on the current session.
    Continue,
    /// The session just opened.
    Opened,
    /// Drop the session and run the startup sequence again.
    Reopen(DisconnectReason),
    /// Drop the session and stop.
    Terminate(DisconnectReason),
}

/// Owns the connection state and the startup announcement flag.
#[derive(Debug)]
pub struct ConnectionLifecycleManager {
    config: Arc<Config>,
    state: ConnectionState,
    announced: bool,
    state_tx: watch::Sender<ConnectionState>,
}

impl ConnectionLifecycleManager {
    /// Manager publishing its state on `state_tx`.
    #[must_use]
    pub fn new(config: Arc<Config>, state_tx: watch::Sender<ConnectionState>) -> Self {
        state_tx.send_replace(ConnectionState::Connecting);
        Self {
            config,
            state: ConnectionState::Connecting,
            announced: false,
            state_tx,
        }
    }

    /// Current connection state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether the startup announcement has been sent.
    #[must_use]
    pub const fn announced(&self) -> bool {
        self.announced
    }

    /// Marks a new session attempt.
    pub fn begin_session(&mut self) {
        self.set_state(ConnectionState::Connecting);
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            debug!(from = %self.state, to = %state, "connection state changed");
        }
        self.state = state;
        self.state_tx.send_replace(state);
    }

    /// Applies one lifecycle update from the session behind `socket`.
    pub async fn on_update(
        &mut self,
        update: &ConnectionUpdate,
        socket: &Arc<dyn MessagingSocket>,
    ) -> LifecycleAction {
        match update.connection {
            None => LifecycleAction::Continue,
            Some(ConnectionState::Connecting) => {
                self.set_state(ConnectionState::Connecting);
                LifecycleAction::Continue
            }
            Some(ConnectionState::Open) => {
                self.set_state(ConnectionState::Open);
                self.on_open(socket).await;
                LifecycleAction::Opened
            }
            Some(ConnectionState::Closed) => {
                self.set_state(ConnectionState::Closed);
                let reason = update.disconnect_reason();
                let code = update.last_disconnect.as_ref().and_then(|d| d.status_code);
                self.on_close(reason, code)
            }
        }
    }

    async fn on_open(&mut self, socket: &Arc<dyn MessagingSocket>) {
        if let Some(code) = self.config.group_invite.clone() {
            let socket = socket.clone();
            let _ = effects::detach("group_join", async move {
                socket.group_accept_invite(&code).await
            });
        }

        let public = self.config.mode == BotMode::Public;
        let _ = BestEffort::attempt("set_mode", socket.set_public(public)).await;

        if !self.announced {
            // Set before sending: a failed send is not retried.
            self.announced = true;
            self.announce(socket.as_ref()).await;
        }

        info!(user = %socket.user_id(), mode = self.config.mode.as_str(), "session open");
    }

    fn on_close(&mut self, reason: DisconnectReason, code: Option<u16>) -> LifecycleAction {
        if !reason.is_fatal() {
            info!(?code, %reason, "session closed, reopening");
            return LifecycleAction::Reopen(reason);
        }
        match reason {
            DisconnectReason::AuthInvalid => {
                error!(?code, "invalid session, delete the session folder and restart");
                LifecycleAction::Terminate(reason)
            }
            DisconnectReason::LoggedOut => {
                error!(?code, "logged out, delete the session folder and restart");
                self.announced = false;
                LifecycleAction::Terminate(reason)
            }
            _ => {
                warn!(?code, "session replaced by another client");
                LifecycleAction::Terminate(reason)
            }
        }
    }

    async fn announce(&self, socket: &dyn MessagingSocket) {
        let own = socket.user_id();
        let (card, follow_up) = announcement(&self.config);

        let first = BestEffort::attempt(
            "announce_card",
            socket.send_message(&own, card, SendOptions::default()),
        )
        .await;
        let second = BestEffort::attempt(
            "announce_menu",
            socket.send_message(&own, follow_up, SendOptions::default()),
        )
        .await;

        if first.is_completed() || second.is_completed() {
            counters::announcements_sent_total();
        }
    }
}

fn link_preview(config: &Config, title: String, body: &str) -> ContextInfo {
    ContextInfo {
        external_ad_reply: ExternalAdReply {
            title,
            body: body.to_string(),
            source_url: config.source_url.clone(),
            media_type: 1,
            render_larger_thumbnail: true,
            show_ad_attribution: false,
        },
    }
}

/// Builds the two-part startup announcement.
#[must_use]
pub fn announcement(config: &Config) -> (OutboundContent, OutboundContent) {
    let name = &config.bot_name;
    let card = [
        "┏──────────────⊷".to_string(),
        format!("┊{} *{name}*", presentation::to_fancy_font("bot name", false)),
        format!("┊{}: {}", presentation::to_fancy_font("mode", false), config.mode.as_str()),
        format!("┊{}: {}", presentation::to_fancy_font("prefix", false), config.prefix),
        format!(
            "┊{}: {}",
            presentation::to_fancy_font("time", false),
            presentation::current_time()
        ),
        format!(
            "┊{} *{}*",
            presentation::to_fancy_font("good", false),
            presentation::greeting()
        ),
        "┗──────────────⊷".to_string(),
    ]
    .join("\n");

    let first = TextMessage {
        text: card,
        footer: Some(format!("powered by {name}")),
        view_once: true,
        context_info: Some(link_preview(config, format!("{name} active"), "online")),
        ..TextMessage::default()
    };

    let second = TextMessage {
        text: format!("> powered by {name}"),
        footer: Some(name.clone()),
        view_once: true,
        buttons: vec![Button::reply(
            format!("{}menu", config.prefix),
            format!(" {}", presentation::to_fancy_font("MENU", false)),
        )],
        header_type: Some(1),
        context_info: Some(link_preview(config, format!("{name} active"), "Select to proceed.")),
    };

    (OutboundContent::Text(first), OutboundContent::Text(second))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn announcement_card_lists_identity() {
        let mut config = Config::default();
        config.prefix = ".".to_string();
        let (card, _) = announcement(&config);
        let OutboundContent::Text(card) = card else {
            panic!("expected text card");
        };
        assert!(card.text.contains("*wabot*"));
        assert!(card.text.contains("public"));
        assert!(card.text.contains(": ."));
        assert!(card.view_once);
        assert!(card.buttons.is_empty());
        assert_eq!(
            card.context_info.unwrap().external_ad_reply.source_url,
            config.source_url
        );
    }

    #[test]
    fn follow_up_has_single_menu_button() {
        let config = Config::default();
        let (_, follow_up) = announcement(&config);
        let OutboundContent::Text(follow_up) = follow_up else {
            panic!("expected text follow-up");
        };
        assert_eq!(follow_up.buttons.len(), 1);
        assert_eq!(follow_up.buttons[0].button_id, "!menu");
        assert_eq!(follow_up.buttons[0].button_text.display_text, " ᴍᴇɴᴜ");
        assert_eq!(follow_up.header_type, Some(1));
    }

    #[test]
    fn new_manager_publishes_connecting() {
        let (tx, rx) = watch::channel(ConnectionState::Closed);
        let manager = ConnectionLifecycleManager::new(Arc::new(Config::default()), tx);
        assert_eq!(manager.state(), ConnectionState::Connecting);
        assert_eq!(*rx.borrow(), ConnectionState::Connecting);
        assert!(!manager.announced());
    }

    struct AcceptingSocket;

    #[async_trait::async_trait]
    impl MessagingSocket for AcceptingSocket {
        fn user_id(&self) -> wabot_common::Jid {
            wabot_common::Jid::from("254700000001:3@s.whatsapp.net")
        }

        async fn send_message(
            &self,
            _to: &wabot_common::Jid,
            _content: OutboundContent,
            _options: SendOptions,
        ) -> Result<(), crate::error::SocketError> {
            Ok(())
        }

        async fn read_messages(
            &self,
            _keys: &[wabot_common::MessageKey],
        ) -> Result<(), crate::error::SocketError> {
            Ok(())
        }

        async fn group_accept_invite(
            &self,
            _code: &str,
        ) -> Result<wabot_common::Jid, crate::error::SocketError> {
            Err(crate::error::SocketError::Closed)
        }

        async fn set_public(&self, _public: bool) -> Result<(), crate::error::SocketError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn logout_clears_announcement_flag() {
        let (tx, rx) = watch::channel(ConnectionState::Closed);
        let mut manager = ConnectionLifecycleManager::new(Arc::new(Config::default()), tx);
        let socket: Arc<dyn MessagingSocket> = Arc::new(AcceptingSocket);

        let action = manager
            .on_update(&ConnectionUpdate::state(ConnectionState::Open), &socket)
            .await;
        assert_eq!(action, LifecycleAction::Opened);
        assert!(manager.announced());
        assert_eq!(*rx.borrow(), ConnectionState::Open);

        let action = manager
            .on_update(&ConnectionUpdate::closed(Some(401)), &socket)
            .await;
        assert_eq!(action, LifecycleAction::Terminate(DisconnectReason::LoggedOut));
        assert!(!manager.announced());
        assert_eq!(*rx.borrow(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn transient_close_keeps_announcement_flag() {
        let (tx, _rx) = watch::channel(ConnectionState::Closed);
        let mut manager = ConnectionLifecycleManager::new(Arc::new(Config::default()), tx);
        let socket: Arc<dyn MessagingSocket> = Arc::new(AcceptingSocket);

        manager
            .on_update(&ConnectionUpdate::state(ConnectionState::Open), &socket)
            .await;
        let action = manager
            .on_update(&ConnectionUpdate::closed(Some(408)), &socket)
            .await;
        assert_eq!(action, LifecycleAction::Reopen(DisconnectReason::Transient));
        assert!(manager.announced());
    }
}
