// ── Session task ──
//
// One background task per open session. It owns the transport outright,
// multiplexing outgoing commands with incoming acknowledgments and state
// pushes, and it is the only code that moves the state machine while the
// session lives. When it exits, for any reason, the state is NotConnected.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use lampctl_api::{Command, Owner, ProtocolError, Transport};

use crate::error::CoreError;
use crate::state::{StateCell, Trigger};

/// A command handed to the session task, with its reply channel.
pub(crate) struct Request {
    pub command: Command,
    pub reply_tx: oneshot::Sender<Result<(), CoreError>>,
}

struct Pending {
    command: Command,
    reply_tx: oneshot::Sender<Result<(), CoreError>>,
    deadline: Instant,
}

/// Handle to a running session task.
pub(crate) struct Session {
    owner: Owner,
    requests: mpsc::Sender<Request>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Session {
    /// Spawn the task for a freshly opened transport. The handshake is
    /// not sent here; the caller issues it as the first request.
    pub(crate) fn spawn<T: Transport>(
        transport: T,
        owner: Owner,
        state: Arc<StateCell>,
        command_timeout: Duration,
    ) -> Self {
        let (requests, rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(session_task(
            transport,
            owner,
            state,
            rx,
            cancel.clone(),
            command_timeout,
        ));

        Self {
            owner,
            requests,
            cancel,
            task,
        }
    }

    pub(crate) fn owner(&self) -> Owner {
        self.owner
    }

    /// Send a command and wait for the device's verdict.
    pub(crate) async fn round_trip(&self, command: Command) -> Result<(), CoreError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.requests
            .send(Request { command, reply_tx })
            .await
            .map_err(|_| CoreError::NoSession)?;

        reply_rx.await.map_err(|_| CoreError::Disconnected {
            reason: "session ended before acknowledgment".into(),
        })?
    }

    /// Returns `true` once the task has exited.
    pub(crate) fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Close the transport and wait for the task to exit.
    pub(crate) async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "session task panicked");
        }
    }
}

// ── Task body ────────────────────────────────────────────────────────

async fn session_task<T: Transport>(
    mut transport: T,
    owner: Owner,
    state: Arc<StateCell>,
    mut requests: mpsc::Receiver<Request>,
    cancel: CancellationToken,
    command_timeout: Duration,
) {
    let mut pending: Option<Pending> = None;

    let outcome: Result<(), CoreError> = loop {
        let deadline = pending.as_ref().map(|p| p.deadline);

        tokio::select! {
            biased;
            () = cancel.cancelled() => break Ok(()),
            () = ack_deadline(deadline) => {
                let command = pending.as_ref().map_or("command", |p| p.command.name());
                break Err(CoreError::Disconnected {
                    reason: format!(
                        "no acknowledgment for {command} within {}s",
                        command_timeout.as_secs()
                    ),
                });
            }
            request = requests.recv(), if pending.is_none() => {
                let Some(Request { command, reply_tx }) = request else {
                    break Ok(());
                };
                debug!(%owner, command = command.name(), "sending command");
                if let Err(e) = transport.send(command.encode()).await {
                    pending = Some(Pending { command, reply_tx, deadline: Instant::now() });
                    break Err(e.into());
                }
                pending = Some(Pending {
                    command,
                    reply_tx,
                    deadline: Instant::now() + command_timeout,
                });
            }
            frame = transport.receive() => {
                let frame = match frame {
                    Ok(Some(frame)) => frame,
                    Ok(None) => break Err(CoreError::Disconnected {
                        reason: "connection closed by lamp".into(),
                    }),
                    Err(e) => break Err(e.into()),
                };
                let incoming = match Command::decode(&frame) {
                    Ok(command) => command,
                    Err(e) => break Err(e.into()),
                };
                if let Err(e) = handle_incoming(incoming, owner, &mut pending, &state) {
                    break Err(e);
                }
            }
        }
    };

    transport.close().await;

    match outcome {
        Ok(()) => info!(%owner, "session closed"),
        Err(ref e) => warn!(%owner, error = %e, "session lost"),
    }

    // Observers must see NotConnected before the waiter learns the outcome.
    state.apply(Trigger::SessionLost);

    if let Some(p) = pending {
        let reply = match outcome {
            Ok(()) => Err(CoreError::Disconnected {
                reason: "session closed".into(),
            }),
            Err(e) => Err(e),
        };
        let _ = p.reply_tx.send(reply);
    }
}

/// Route one decoded frame. Errors end the session.
fn handle_incoming(
    incoming: Command,
    owner: Owner,
    pending: &mut Option<Pending>,
    state: &StateCell,
) -> Result<(), CoreError> {
    match incoming {
        Command::DeviceStateChanged(pushed) => {
            debug!(%owner, %pushed, "state pushed by lamp");
            state.apply(Trigger::Pushed(pushed));
            Ok(())
        }
        Command::DeclareClientTypeAck
        | Command::DeclareClientTypeNak
        | Command::CommandAck
        | Command::CommandNak => {
            let Some(p) = pending.take() else {
                return Err(ProtocolError::Unexpected {
                    expected: "DeviceStateChanged",
                    got: incoming.name(),
                }
                .into());
            };
            settle(p, incoming, owner, state)
        }
        Command::DeclareClientType(..) | Command::PowerDeviceOn | Command::PowerDeviceOff => {
            Err(ProtocolError::Unexpected {
                expected: "acknowledgment or DeviceStateChanged",
                got: incoming.name(),
            }
            .into())
        }
    }
}

/// Correlate an acknowledgment with the outstanding command.
fn settle(
    pending: Pending,
    verdict: Command,
    owner: Owner,
    state: &StateCell,
) -> Result<(), CoreError> {
    let Pending {
        command, reply_tx, ..
    } = pending;

    let success = match (command, verdict) {
        (Command::DeclareClientType(..), Command::DeclareClientTypeAck) => Trigger::SessionOpened,
        (Command::PowerDeviceOn, Command::CommandAck) => Trigger::PoweredOn,
        (Command::PowerDeviceOff, Command::CommandAck) => Trigger::PoweredOff,

        (Command::DeclareClientType(..), Command::DeclareClientTypeNak) => {
            let _ = reply_tx.send(Err(CoreError::HandshakeRejected { owner }));
            return Err(CoreError::HandshakeRejected { owner });
        }
        (Command::PowerDeviceOn | Command::PowerDeviceOff, Command::CommandNak) => {
            info!(%owner, command = command.name(), "command rejected by lamp");
            let _ = reply_tx.send(Err(CoreError::Rejected {
                command: command.name(),
            }));
            return Ok(());
        }

        _ => {
            let expected = if matches!(command, Command::DeclareClientType(..)) {
                "DeclareClientTypeAck"
            } else {
                "CommandAck"
            };
            let err = ProtocolError::Unexpected {
                expected,
                got: verdict.name(),
            };
            let _ = reply_tx.send(Err(err.clone().into()));
            return Err(err.into());
        }
    };

    state.apply(success);
    let _ = reply_tx.send(Ok(()));
    Ok(())
}

async fn ack_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
