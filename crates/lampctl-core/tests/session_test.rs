#![allow(clippy::unwrap_used)]
// Session-level tests for `LampClient` against a scripted lamp server.
//
// The mock server is a real tokio-tungstenite listener on 127.0.0.1, so
// these exercise the WebSocket transport, the codec and the session task
// together.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use lampctl_api::{ClientType, Command};
use lampctl_core::{ClientConfig, CoreError, DeviceState, LampClient, LampState, Owner};

// ── Mock lamp ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum Verdict {
    Ack,
    Nak,
    Ignore,
}

#[derive(Debug, Clone, Copy)]
struct Script {
    /// Owner whose declaration is refused; everyone else is accepted.
    reject_owner: Option<Owner>,
    power: Verdict,
    /// Number of initial connections whose declaration is answered with
    /// an undecodable frame.
    garbled_handshakes: usize,
    /// Delay before answering any request.
    delay: Duration,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            reject_owner: None,
            power: Verdict::Ack,
            garbled_handshakes: 0,
            delay: Duration::ZERO,
        }
    }
}

enum Action {
    Push(LampState),
    Raw(Vec<u8>),
    /// Drop the TCP connection without a close handshake.
    Sever,
}

struct MockLamp {
    address: String,
    actions: mpsc::UnboundedSender<Action>,
    received: Arc<Mutex<Vec<Command>>>,
    connections: Arc<AtomicUsize>,
}

impl MockLamp {
    fn push(&self, state: LampState) {
        self.actions.send(Action::Push(state)).unwrap();
    }

    fn raw(&self, frame: Vec<u8>) {
        self.actions.send(Action::Raw(frame)).unwrap();
    }

    fn sever(&self) {
        self.actions.send(Action::Sever).unwrap();
    }

    fn received(&self) -> Vec<Command> {
        self.received.lock().unwrap().clone()
    }

    fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    fn client(&self) -> LampClient {
        self.client_with_timeout(Duration::from_secs(5))
    }

    fn client_with_timeout(&self, command_timeout: Duration) -> LampClient {
        LampClient::new(ClientConfig {
            address: self.address.clone(),
            connect_timeout: Duration::from_secs(5),
            command_timeout,
        })
    }
}

fn reply_for(script: Script, connection: usize, command: Command) -> Option<Vec<u8>> {
    let garbled = connection < script.garbled_handshakes;
    if garbled && matches!(command, Command::DeclareClientType(..)) {
        return Some(vec![0xFF]);
    }
    let reply = match command {
        Command::DeclareClientType(_, owner) if Some(owner) == script.reject_owner => {
            Some(Command::DeclareClientTypeNak)
        }
        Command::DeclareClientType(..) => Some(Command::DeclareClientTypeAck),
        Command::PowerDeviceOn | Command::PowerDeviceOff => match script.power {
            Verdict::Ack => Some(Command::CommandAck),
            Verdict::Nak => Some(Command::CommandNak),
            Verdict::Ignore => None,
        },
        _ => None,
    };
    reply.map(|r| r.encode())
}

/// Serve connections one after another, answering per `script`.
async fn spawn_lamp(script: Script) -> MockLamp {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = format!("ws://{}", listener.local_addr().unwrap());
    let (actions, mut action_rx) = mpsc::unbounded_channel();
    let received = Arc::new(Mutex::new(Vec::new()));
    let connections = Arc::new(AtomicUsize::new(0));

    let log = Arc::clone(&received);
    let count = Arc::clone(&connections);
    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            let connection = count.fetch_add(1, Ordering::SeqCst);
            let Ok(mut ws) = tokio_tungstenite::accept_async(tcp).await else {
                continue;
            };

            loop {
                tokio::select! {
                    msg = ws.next() => {
                        let Some(Ok(Message::Binary(frame))) = msg else { break };
                        let Ok(command) = Command::decode(&frame) else { break };
                        log.lock().unwrap().push(command);

                        if !script.delay.is_zero() {
                            tokio::time::sleep(script.delay).await;
                        }
                        if let Some(reply) = reply_for(script, connection, command) {
                            if ws.send(Message::binary(reply)).await.is_err() {
                                break;
                            }
                        }
                    }
                    action = action_rx.recv() => {
                        let frame = match action {
                            Some(Action::Push(state)) => Command::DeviceStateChanged(state).encode(),
                            Some(Action::Raw(frame)) => frame,
                            Some(Action::Sever) | None => break,
                        };
                        if ws.send(Message::binary(frame)).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    });

    MockLamp {
        address,
        actions,
        received,
        connections,
    }
}

async fn wait_for_state(client: &LampClient, expected: DeviceState) {
    let mut rx = client.subscribe();
    let reached = tokio::time::timeout(Duration::from_secs(3), rx.wait_for(|s| *s == expected))
        .await
        .is_ok();
    assert!(
        reached,
        "expected {expected}, still {} after 3s",
        client.state()
    );
}

// ── Lifecycle ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_full_lifecycle_to_forced_disconnect() {
    let lamp = spawn_lamp(Script::default()).await;
    let client = lamp.client();
    let mut history = client.subscribe();
    assert_eq!(*history.borrow_and_update(), DeviceState::NotConnected);

    client.open_session(Owner::Arni).await.unwrap();
    assert_eq!(client.state(), DeviceState::Off);
    assert_eq!(client.session_owner().await, Some(Owner::Arni));

    client.power_on().await.unwrap();
    assert_eq!(client.state(), DeviceState::OnWaiting);

    lamp.push(LampState::OnPaired);
    wait_for_state(&client, DeviceState::OnPaired).await;

    lamp.sever();
    wait_for_state(&client, DeviceState::NotConnected).await;

    assert_eq!(
        lamp.received(),
        vec![
            Command::DeclareClientType(ClientType::User, Owner::Arni),
            Command::PowerDeviceOn,
        ]
    );
}

#[tokio::test]
async fn test_power_off_from_paired() {
    let lamp = spawn_lamp(Script::default()).await;
    let client = lamp.client();

    client.open_session(Owner::Ian).await.unwrap();
    client.power_on().await.unwrap();
    lamp.push(LampState::OnPaired);
    wait_for_state(&client, DeviceState::OnPaired).await;

    client.power_off().await.unwrap();
    assert_eq!(client.state(), DeviceState::Off);
}

#[tokio::test]
async fn test_device_push_turns_lamp_off() {
    let lamp = spawn_lamp(Script::default()).await;
    let client = lamp.client();

    client.open_session(Owner::Arni).await.unwrap();
    client.power_on().await.unwrap();
    lamp.push(LampState::Off);
    wait_for_state(&client, DeviceState::Off).await;
}

#[tokio::test]
async fn test_close_session_is_idempotent() {
    let lamp = spawn_lamp(Script::default()).await;
    let client = lamp.client();

    client.close_session().await;
    tokio_test::assert_ok!(client.open_session(Owner::Arni).await);
    client.close_session().await;
    client.close_session().await;

    assert_eq!(client.state(), DeviceState::NotConnected);
    assert_eq!(client.session_owner().await, None);
}

// ── Failures ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_connect_failure_leaves_not_connected() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = LampClient::new(ClientConfig {
        address: format!("ws://{addr}"),
        connect_timeout: Duration::from_secs(2),
        command_timeout: Duration::from_secs(2),
    });

    let err = client.open_session(Owner::Arni).await.unwrap_err();
    assert!(matches!(err, CoreError::ConnectFailed { .. }), "got: {err}");
    assert!(err.is_retryable());
    assert_eq!(client.state(), DeviceState::NotConnected);
    assert_eq!(client.session_owner().await, None);
}

#[tokio::test]
async fn test_handshake_rejected() {
    let lamp = spawn_lamp(Script {
        reject_owner: Some(Owner::Ian),
        ..Script::default()
    })
    .await;
    let client = lamp.client();

    let err = client.open_session(Owner::Ian).await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::HandshakeRejected { owner: Owner::Ian }
    ));
    assert_eq!(client.state(), DeviceState::NotConnected);
    assert_eq!(client.session_owner().await, None);
}

#[tokio::test]
async fn test_handshake_protocol_error_leaves_no_session() {
    let lamp = spawn_lamp(Script {
        garbled_handshakes: 1,
        ..Script::default()
    })
    .await;
    let client = lamp.client();

    let err = client.open_session(Owner::Arni).await.unwrap_err();
    assert!(matches!(err, CoreError::Protocol { .. }), "got: {err}");
    assert!(err.is_session_fatal());
    assert_eq!(client.state(), DeviceState::NotConnected);
    assert_eq!(client.session_owner().await, None);

    // The next attempt gets a clean connection and handshake.
    tokio_test::assert_ok!(client.open_session(Owner::Arni).await);
    assert_eq!(client.state(), DeviceState::Off);
    assert_eq!(client.session_owner().await, Some(Owner::Arni));
    assert_eq!(lamp.connections(), 2);
}

#[tokio::test]
async fn test_reopen_after_failure_never_resurrects_stale_session() {
    let lamp = spawn_lamp(Script {
        reject_owner: Some(Owner::Ian),
        ..Script::default()
    })
    .await;
    let client = lamp.client();

    assert!(client.open_session(Owner::Ian).await.is_err());
    client.open_session(Owner::Arni).await.unwrap();

    assert_eq!(client.session_owner().await, Some(Owner::Arni));
    assert_eq!(client.state(), DeviceState::Off);

    client.power_on().await.unwrap();
    assert_eq!(lamp.connections(), 2);
    assert_eq!(
        lamp.received(),
        vec![
            Command::DeclareClientType(ClientType::User, Owner::Ian),
            Command::DeclareClientType(ClientType::User, Owner::Arni),
            Command::PowerDeviceOn,
        ]
    );
}

#[tokio::test]
async fn test_reopen_replaces_live_session() {
    let lamp = spawn_lamp(Script::default()).await;
    let client = lamp.client();

    client.open_session(Owner::Arni).await.unwrap();
    client.power_on().await.unwrap();
    client.open_session(Owner::Ian).await.unwrap();

    // The new session starts from scratch.
    assert_eq!(client.state(), DeviceState::Off);
    assert_eq!(client.session_owner().await, Some(Owner::Ian));
    assert_eq!(lamp.connections(), 2);
}

#[tokio::test]
async fn test_power_nak_keeps_state_and_session() {
    let lamp = spawn_lamp(Script {
        power: Verdict::Nak,
        ..Script::default()
    })
    .await;
    let client = lamp.client();
    client.open_session(Owner::Arni).await.unwrap();

    let err = client.power_on().await.unwrap_err();
    assert!(matches!(err, CoreError::Rejected { command: "PowerDeviceOn" }));
    assert!(!err.is_session_fatal());
    assert_eq!(client.state(), DeviceState::Off);
    assert_eq!(client.session_owner().await, Some(Owner::Arni));
}

#[tokio::test]
async fn test_command_without_session_is_noop() {
    let lamp = spawn_lamp(Script::default()).await;
    let client = lamp.client();

    assert!(matches!(client.power_on().await, Err(CoreError::NoSession)));
    assert!(matches!(client.power_off().await, Err(CoreError::NoSession)));
    assert_eq!(client.state(), DeviceState::NotConnected);
    assert_eq!(lamp.connections(), 0);
}

#[tokio::test]
async fn test_second_command_in_flight_is_busy() {
    let lamp = spawn_lamp(Script {
        delay: Duration::from_millis(300),
        ..Script::default()
    })
    .await;
    let client = lamp.client();
    client.open_session(Owner::Arni).await.unwrap();

    let first = {
        let client = client.clone();
        tokio::spawn(async move { client.power_on().await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    let second = client.power_off().await;
    assert!(matches!(second, Err(CoreError::Busy)), "got: {second:?}");

    // The pending command completes untouched.
    first.await.unwrap().unwrap();
    assert_eq!(client.state(), DeviceState::OnWaiting);
    assert_eq!(
        lamp.received(),
        vec![
            Command::DeclareClientType(ClientType::User, Owner::Arni),
            Command::PowerDeviceOn,
        ]
    );
}

#[tokio::test]
async fn test_garbage_frame_collapses_session() {
    let lamp = spawn_lamp(Script::default()).await;
    let client = lamp.client();
    client.open_session(Owner::Arni).await.unwrap();
    client.power_on().await.unwrap();

    lamp.raw(vec![0xFF]);
    wait_for_state(&client, DeviceState::NotConnected).await;

    assert!(client.power_off().await.is_err());
    assert_eq!(client.state(), DeviceState::NotConnected);
}

#[tokio::test]
async fn test_unacknowledged_command_times_out() {
    let lamp = spawn_lamp(Script {
        power: Verdict::Ignore,
        ..Script::default()
    })
    .await;
    let client = lamp.client_with_timeout(Duration::from_millis(300));
    client.open_session(Owner::Arni).await.unwrap();

    let err = client.power_on().await.unwrap_err();
    assert!(matches!(err, CoreError::Disconnected { .. }), "got: {err}");
    assert!(err.is_session_fatal());
    assert_eq!(client.state(), DeviceState::NotConnected);
    assert_eq!(client.session_owner().await, None);
}

// ── Pairing ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_wait_for_pairing_confirmed() {
    let lamp = spawn_lamp(Script::default()).await;
    let client = lamp.client();
    client.open_session(Owner::Arni).await.unwrap();
    client.power_on().await.unwrap();

    let waiter = {
        let client = client.clone();
        tokio::spawn(async move { client.wait_for_pairing(Duration::from_secs(3)).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    lamp.push(LampState::OnPaired);

    waiter.await.unwrap().unwrap();
    assert_eq!(client.state(), DeviceState::OnPaired);
}

#[tokio::test]
async fn test_wait_for_pairing_timeout_keeps_on_waiting() {
    let lamp = spawn_lamp(Script::default()).await;
    let client = lamp.client();
    client.open_session(Owner::Arni).await.unwrap();
    client.power_on().await.unwrap();

    let err = client
        .wait_for_pairing(Duration::from_millis(200))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::PairingTimeout { .. }));
    assert_eq!(client.state(), DeviceState::OnWaiting);
}

#[tokio::test]
async fn test_wait_for_pairing_while_off() {
    let lamp = spawn_lamp(Script::default()).await;
    let client = lamp.client();
    client.open_session(Owner::Arni).await.unwrap();

    let err = client
        .wait_for_pairing(Duration::from_secs(1))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotPowered));
}
