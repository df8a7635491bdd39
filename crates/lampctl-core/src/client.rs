// ── Lamp client ──
//
// Connection manager facade: opens at most one session at a time,
// performs the owner handshake, and issues power commands one at a time.
// The device state is owned by a `StateCell`; this type only hands out
// read access to it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use lampctl_api::{Command, Connector, Owner, WsConnector};

use crate::config::ClientConfig;
use crate::error::CoreError;
use crate::session::Session;
use crate::state::{DeviceState, StateCell};

/// Client for a single lamp device.
///
/// Cheaply cloneable via `Arc<ClientInner>`. Clones share the session,
/// the in-flight guard and the state channel.
pub struct LampClient<C: Connector = WsConnector> {
    inner: Arc<ClientInner<C>>,
}

impl<C: Connector> Clone for LampClient<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ClientInner<C: Connector> {
    config: ClientConfig,
    connector: C,
    state: Arc<StateCell>,
    session: Mutex<Option<Session>>,
    /// Set while a handshake or command awaits its acknowledgment.
    in_flight: AtomicBool,
}

impl LampClient<WsConnector> {
    /// Create a WebSocket client. Does NOT connect; call
    /// [`open_session()`](Self::open_session).
    pub fn new(config: ClientConfig) -> Self {
        let connector = WsConnector::new(config.connect_timeout);
        Self::with_connector(config, connector)
    }
}

impl<C: Connector> LampClient<C> {
    /// Create a client over a custom transport.
    pub fn with_connector(config: ClientConfig, connector: C) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                config,
                connector,
                state: Arc::new(StateCell::new()),
                session: Mutex::new(None),
                in_flight: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    // ── State observation ────────────────────────────────────────

    /// Current device state.
    pub fn state(&self) -> DeviceState {
        self.inner.state.get()
    }

    /// Subscribe to device state changes.
    pub fn subscribe(&self) -> watch::Receiver<DeviceState> {
        self.inner.state.subscribe()
    }

    /// Owner declared on the live session, if any.
    pub async fn session_owner(&self) -> Option<Owner> {
        let guard = self.inner.session.lock().await;
        guard
            .as_ref()
            .filter(|s| !s.is_finished())
            .map(Session::owner)
    }

    // ── Session lifecycle ────────────────────────────────────────

    /// Open a session to the configured address and declare `owner`.
    ///
    /// Any previous session is torn down first. On failure no session is
    /// left behind and the state stays `NotConnected`; retrying is the
    /// caller's decision.
    pub async fn open_session(&self, owner: Owner) -> Result<(), CoreError> {
        let _guard = InFlight::acquire(&self.inner.in_flight)?;
        let mut slot = self.inner.session.lock().await;

        if let Some(previous) = slot.take() {
            debug!(owner = %previous.owner(), "tearing down previous session");
            previous.shutdown().await;
        }

        let address = &self.inner.config.address;
        info!(%address, %owner, "opening session");

        let transport = tokio::time::timeout(
            self.inner.config.connect_timeout,
            self.inner.connector.open(address),
        )
        .await
        .map_err(|_| CoreError::ConnectFailed {
            address: address.clone(),
            reason: format!(
                "timed out after {}s",
                self.inner.config.connect_timeout.as_secs()
            ),
        })??;

        let session = Session::spawn(
            transport,
            owner,
            Arc::clone(&self.inner.state),
            self.inner.config.command_timeout,
        );

        match session.round_trip(Command::declare_owner(owner)).await {
            Ok(()) => {
                info!(%address, %owner, "session established");
                *slot = Some(session);
                Ok(())
            }
            Err(e) => {
                warn!(%address, %owner, error = %e, "handshake failed");
                session.shutdown().await;
                Err(e)
            }
        }
    }

    /// Tear down the session, if any. Always safe to call.
    pub async fn close_session(&self) {
        let previous = self.inner.session.lock().await.take();
        if let Some(session) = previous {
            session.shutdown().await;
        }
    }

    // ── Commands ─────────────────────────────────────────────────

    /// Turn the lamp on. Success moves `Off` to `OnWaiting`; pairing
    /// confirmation arrives later as a device push.
    pub async fn power_on(&self) -> Result<(), CoreError> {
        self.command(Command::PowerDeviceOn).await
    }

    /// Turn the lamp off.
    pub async fn power_off(&self) -> Result<(), CoreError> {
        self.command(Command::PowerDeviceOff).await
    }

    async fn command(&self, command: Command) -> Result<(), CoreError> {
        let _guard = InFlight::acquire(&self.inner.in_flight)?;

        let result = {
            let slot = self.inner.session.lock().await;
            let Some(session) = slot.as_ref().filter(|s| !s.is_finished()) else {
                debug!(command = command.name(), "no session, command skipped");
                return Err(CoreError::NoSession);
            };
            session.round_trip(command).await
        };

        if let Err(ref e) = result {
            if e.is_session_fatal() {
                // The task already reset the state; drop the dead handle.
                self.close_session().await;
            }
        }
        result
    }

    /// Wait until the lamp reports pairing, without touching the state.
    ///
    /// Fails with `PairingTimeout` on expiry (the lamp stays `OnWaiting`),
    /// with `NotPowered` if the lamp is or goes off, and with
    /// `Disconnected` if the session ends first.
    pub async fn wait_for_pairing(&self, timeout: Duration) -> Result<(), CoreError> {
        let mut rx = self.subscribe();
        let settled = tokio::time::timeout(
            timeout,
            rx.wait_for(|s| !matches!(s, DeviceState::OnWaiting)),
        )
        .await;

        match settled {
            Err(_) => Err(CoreError::PairingTimeout {
                timeout_secs: timeout.as_secs(),
            }),
            Ok(Err(_)) => Err(CoreError::NoSession),
            Ok(Ok(state)) => match *state {
                DeviceState::OnPaired => Ok(()),
                DeviceState::NotConnected => Err(CoreError::Disconnected {
                    reason: "session ended while waiting for pairing".into(),
                }),
                DeviceState::Off | DeviceState::OnWaiting => Err(CoreError::NotPowered),
            },
        }
    }
}

// ── In-flight guard ──────────────────────────────────────────────────

/// Marks a command as in flight; cleared on drop.
struct InFlight<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, CoreError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| CoreError::Busy)?;
        Ok(Self { flag })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
