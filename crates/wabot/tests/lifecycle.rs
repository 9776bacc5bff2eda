mod common;

use common::*;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::watch;
use std::time::Duration;
use wabot::collaborators::Collaborators;
use wabot::config::{BotMode, Config};
use wabot::credentials::{CredentialStore, PLACEHOLDER};
use wabot::error::{BootstrapError, CredentialError};
use wabot::runtime::{Runtime, Shutdown};
use wabot_common::content::OutboundContent;
use wabot_common::message::BatchKind;
use wabot_common::types::status_code;
use wabot_common::{ConnectionState, DisconnectReason, InboundEvent, MessageBatch};

fn test_config() -> Config {
    let mut config = Config::default();
    config.reconnect.backoff = false;
    config
}

struct Harness {
    recorder: Arc<Recorder>,
    connector: Arc<MockConnector>,
    state_rx: watch::Receiver<ConnectionState>,
    dir: std::path::PathBuf,
}

async fn run(config: Config, scripts: Vec<Vec<InboundEvent>>) -> (Shutdown, Harness) {
    run_with_socket(config, scripts, |_| {}).await
}

async fn run_with_socket(
    config: Config,
    scripts: Vec<Vec<InboundEvent>>,
    tweak: impl FnOnce(&mut MockSocket),
) -> (Shutdown, Harness) {
    let dir = temp_dir();
    let store = store_with_session(&dir);
    run_with_store(config, scripts, tweak, store, dir).await
}

async fn run_with_store(
    config: Config,
    scripts: Vec<Vec<InboundEvent>>,
    tweak: impl FnOnce(&mut MockSocket),
    store: CredentialStore,
    dir: std::path::PathBuf,
) -> (Shutdown, Harness) {
    let recorder = Arc::new(Recorder::default());
    let collaborators = recording_collaborators(&recorder, None);
    run_with_collaborators(config, scripts, tweak, store, dir, recorder, collaborators).await
}

async fn run_with_collaborators(
    config: Config,
    scripts: Vec<Vec<InboundEvent>>,
    tweak: impl FnOnce(&mut MockSocket),
    store: CredentialStore,
    dir: std::path::PathBuf,
    recorder: Arc<Recorder>,
    collaborators: Collaborators,
) -> (Shutdown, Harness) {
    let mut socket = MockSocket::new(recorder.clone());
    tweak(&mut socket);
    let connector = Arc::new(MockConnector::new(Arc::new(socket), scripts));
    let (state_tx, state_rx) = watch::channel(ConnectionState::Closed);

    let runtime = Runtime::new(
        Arc::new(config),
        store,
        connector.clone(),
        collaborators,
        state_tx,
    )
    .with_seed(11);

    let shutdown = runtime.run().await;
    (
        shutdown,
        Harness {
            recorder,
            connector,
            state_rx,
            dir,
        },
    )
}

fn announcement_sends(calls: &[Call]) -> usize {
    calls
        .iter()
        .filter(|c| {
            matches!(c, Call::Send { to, content: OutboundContent::Text(_), .. } if to.as_str() == OWN_ID)
        })
        .count()
}

#[tokio::test]
async fn transient_closes_reopen_once_each() {
    let (shutdown, h) = run(
        test_config(),
        vec![
            vec![connecting(), open(), closed(Some(status_code::CONNECTION_CLOSED))],
            vec![open(), closed(Some(status_code::CONNECTION_LOST))],
            vec![open(), closed(Some(status_code::RESTART_REQUIRED))],
            vec![open(), closed(Some(status_code::CONNECTION_REPLACED))],
        ],
    )
    .await;

    assert!(matches!(
        shutdown,
        Shutdown::Disconnected(DisconnectReason::Replaced)
    ));
    assert_eq!(h.connector.opens(), 4);
    assert_eq!(*h.state_rx.borrow(), ConnectionState::Closed);
    let _ = std::fs::remove_dir_all(&h.dir);
}

#[tokio::test]
async fn unknown_close_codes_reopen() {
    let (shutdown, h) = run(
        test_config(),
        vec![
            vec![open(), closed(Some(499))],
            vec![open(), closed(None)],
            vec![open(), closed(Some(status_code::LOGGED_OUT))],
        ],
    )
    .await;

    assert!(matches!(
        shutdown,
        Shutdown::Disconnected(DisconnectReason::LoggedOut)
    ));
    assert_eq!(h.connector.opens(), 3);
    let _ = std::fs::remove_dir_all(&h.dir);
}

#[tokio::test]
async fn fatal_closes_terminate_without_reopen() {
    for (code, expected) in [
        (status_code::BAD_SESSION, DisconnectReason::AuthInvalid),
        (status_code::CONNECTION_REPLACED, DisconnectReason::Replaced),
        (status_code::LOGGED_OUT, DisconnectReason::LoggedOut),
    ] {
        // A second script would be consumed by a wrongful reopen.
        let (shutdown, h) = run(
            test_config(),
            vec![vec![open(), closed(Some(code))], vec![open()]],
        )
        .await;

        match shutdown {
            Shutdown::Disconnected(reason) => assert_eq!(reason, expected),
            other => panic!("unexpected shutdown for {code}: {other:?}"),
        }
        assert_eq!(h.connector.opens(), 1, "code {code} reopened");
        let _ = std::fs::remove_dir_all(&h.dir);
    }
}

#[tokio::test]
async fn announcement_is_sent_once_across_reconnects() {
    let (_, h) = run(
        test_config(),
        vec![
            vec![open(), closed(Some(status_code::CONNECTION_LOST))],
            vec![open(), closed(Some(status_code::TIMED_OUT))],
            vec![open(), closed(Some(status_code::CONNECTION_REPLACED))],
        ],
    )
    .await;

    let calls = h.recorder.calls();
    assert_eq!(announcement_sends(&calls), 2);

    let Call::Send {
        content: OutboundContent::Text(follow_up),
        ..
    } = &h.recorder.sends()[1]
    else {
        panic!("expected the menu follow-up");
    };
    assert_eq!(follow_up.buttons[0].button_id, "!menu");
    let _ = std::fs::remove_dir_all(&h.dir);
}

#[tokio::test]
async fn failed_announcement_is_not_retried() {
    let (_, h) = run_with_socket(
        test_config(),
        vec![
            vec![open(), closed(Some(status_code::CONNECTION_CLOSED))],
            vec![open(), closed(Some(status_code::CONNECTION_REPLACED))],
        ],
        |socket| socket.fail_sends = true,
    )
    .await;

    // Both parts attempted on the first open even though each failed.
    assert_eq!(announcement_sends(&h.recorder.calls()), 2);
    let _ = std::fs::remove_dir_all(&h.dir);
}

#[tokio::test]
async fn open_sets_mode_and_attempts_group_join() {
    let mut config = test_config();
    config.mode = BotMode::Private;
    config.group_invite = Some("CjBNEKIJq6VE2vrJLDSQ2Z".to_string());

    let (shutdown, h) = run(
        config,
        vec![vec![open(), closed(Some(status_code::CONNECTION_REPLACED))]],
    )
    .await;

    assert!(matches!(shutdown, Shutdown::Disconnected(_)));
    h.recorder
        .wait_for(|calls| calls.contains(&Call::Join("CjBNEKIJq6VE2vrJLDSQ2Z".to_string())))
        .await;
    assert!(h.recorder.calls().contains(&Call::SetPublic(false)));
    let _ = std::fs::remove_dir_all(&h.dir);
}

#[tokio::test]
async fn no_group_join_without_invite() {
    let (_, h) = run(
        test_config(),
        vec![vec![open(), closed(Some(status_code::CONNECTION_REPLACED))]],
    )
    .await;

    tokio::task::yield_now().await;
    assert!(!h
        .recorder
        .calls()
        .iter()
        .any(|c| matches!(c, Call::Join(_))));
    assert!(h.recorder.calls().contains(&Call::SetPublic(true)));
    let _ = std::fs::remove_dir_all(&h.dir);
}

#[tokio::test]
async fn retry_budget_escalates_to_fatal() {
    let mut config = test_config();
    config.reconnect.max_retries = 2;

    let closed_lost = || vec![closed(Some(status_code::CONNECTION_LOST))];
    let (shutdown, h) = run(config, vec![closed_lost(), closed_lost(), closed_lost()]).await;

    assert!(matches!(
        shutdown,
        Shutdown::RetriesExhausted { attempts: 2 }
    ));
    assert_eq!(shutdown.exit_code(), 1);
    assert_eq!(h.connector.opens(), 3);
    let _ = std::fs::remove_dir_all(&h.dir);
}

#[tokio::test]
async fn successful_open_restores_retry_budget() {
    let mut config = test_config();
    config.reconnect.max_retries = 1;

    let (shutdown, h) = run(
        config,
        vec![
            vec![closed(Some(status_code::CONNECTION_LOST))],
            vec![open(), closed(Some(status_code::CONNECTION_LOST))],
            vec![open(), closed(Some(status_code::CONNECTION_REPLACED))],
        ],
    )
    .await;

    assert!(matches!(
        shutdown,
        Shutdown::Disconnected(DisconnectReason::Replaced)
    ));
    assert_eq!(h.connector.opens(), 3);
    let _ = std::fs::remove_dir_all(&h.dir);
}

#[tokio::test]
async fn ended_stream_counts_as_transient_close() {
    let (shutdown, h) = run(
        test_config(),
        vec![vec![open()], vec![open(), closed(Some(status_code::CONNECTION_REPLACED))]],
    )
    .await;

    assert!(matches!(shutdown, Shutdown::Disconnected(_)));
    assert_eq!(h.connector.opens(), 2);
    let _ = std::fs::remove_dir_all(&h.dir);
}

#[tokio::test]
async fn placeholder_credential_stops_before_open() {
    let dir = temp_dir();
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("session.json"),
        json!({ "SESSION_ID": PLACEHOLDER }).to_string(),
    )
    .unwrap();
    let store = CredentialStore::new(dir.join("session"), dir.join("session.json"));

    let (shutdown, h) =
        run_with_store(test_config(), vec![vec![open()]], |_| {}, store, dir).await;

    assert!(matches!(
        shutdown,
        Shutdown::Startup(BootstrapError::Credentials(CredentialError::InvalidEncoding))
    ));
    assert_eq!(shutdown.exit_code(), 1);
    assert_eq!(h.connector.opens(), 0);
    assert!(h.recorder.is_empty());
    let _ = std::fs::remove_dir_all(&h.dir);
}

#[tokio::test]
async fn failed_reopen_is_fatal() {
    let (shutdown, h) = run(
        test_config(),
        vec![vec![open(), closed(Some(status_code::CONNECTION_CLOSED))]],
    )
    .await;

    assert!(matches!(
        shutdown,
        Shutdown::Startup(BootstrapError::Open(_))
    ));
    assert_eq!(h.connector.opens(), 2);
    let _ = std::fs::remove_dir_all(&h.dir);
}

#[tokio::test]
async fn credential_updates_are_persisted() {
    let creds = json!({"me": {"id": OWN_ID}, "registered": true});
    let (_, h) = run(
        test_config(),
        vec![vec![
            open(),
            InboundEvent::CredentialsUpdate(creds.clone()),
            InboundEvent::CredentialsUpdate(creds.clone()),
            closed(Some(status_code::CONNECTION_REPLACED)),
        ]],
    )
    .await;

    let written: serde_json::Value = serde_json::from_slice(
        &std::fs::read(h.dir.join("session").join("creds.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(written, creds);
    let _ = std::fs::remove_dir_all(&h.dir);
}

#[tokio::test]
async fn close_is_handled_while_a_command_hangs() {
    let dir = temp_dir();
    let store = store_with_session(&dir);
    let recorder = Arc::new(Recorder::default());
    let collaborators = stalling_collaborators(&recorder, "slow");
    let messages = InboundEvent::Messages(MessageBatch {
        kind: BatchKind::Notify,
        messages: vec![chat_message("slow")],
    });

    let (shutdown, h) = tokio::time::timeout(
        Duration::from_secs(5),
        run_with_collaborators(
            test_config(),
            vec![
                vec![open(), messages, closed(Some(status_code::CONNECTION_LOST))],
                vec![open(), closed(Some(status_code::CONNECTION_REPLACED))],
            ],
            |_| {},
            store,
            dir,
            recorder,
            collaborators,
        ),
    )
    .await
    .expect("runtime stalled behind the command handler");

    assert!(matches!(
        shutdown,
        Shutdown::Disconnected(DisconnectReason::Replaced)
    ));
    assert_eq!(h.connector.opens(), 2);
    assert_eq!(*h.state_rx.borrow(), ConnectionState::Closed);
    let _ = std::fs::remove_dir_all(&h.dir);
}
