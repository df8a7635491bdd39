// ── Device state machine ──
//
// Pure transition logic. The client owns the single live `DeviceState`
// (inside a `watch` channel) and feeds every trigger through `next()`;
// nothing else is allowed to write it.

use lampctl_api::LampState;
use strum::Display;
use tokio::sync::watch;
use tracing::debug;

/// Client-side view of the lamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Default)]
pub enum DeviceState {
    #[default]
    NotConnected,
    Off,
    /// Powered on, waiting for the peer lamp to confirm pairing.
    OnWaiting,
    /// Powered on and synchronized with the peer lamp.
    OnPaired,
}

/// Everything that can move the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Transport opened and the owner declaration was acknowledged.
    SessionOpened,
    /// `PowerDeviceOn` was acknowledged.
    PoweredOn,
    /// `PowerDeviceOff` was acknowledged.
    PoweredOff,
    /// Unsolicited state report from the device.
    Pushed(LampState),
    /// Transport or protocol failure, or an explicit close.
    SessionLost,
}

/// Compute the state following `trigger`, or `None` if the trigger does
/// not apply in `state` (the state is then left untouched).
pub fn next(state: DeviceState, trigger: Trigger) -> Option<DeviceState> {
    use DeviceState::{NotConnected, Off, OnPaired, OnWaiting};

    match (state, trigger) {
        (_, Trigger::SessionLost) => Some(NotConnected),
        (NotConnected, Trigger::SessionOpened) => Some(Off),

        // Optimistic on: pairing confirmation arrives later from the device.
        (Off, Trigger::PoweredOn) => Some(OnWaiting),
        (OnWaiting | OnPaired, Trigger::PoweredOn) => Some(state),
        (Off | OnWaiting | OnPaired, Trigger::PoweredOff) => Some(Off),

        (NotConnected, Trigger::Pushed(_)) => None,
        (current, Trigger::Pushed(pushed)) => apply_push(current, pushed),

        _ => None,
    }
}

fn apply_push(current: DeviceState, pushed: LampState) -> Option<DeviceState> {
    use DeviceState::{Off, OnPaired, OnWaiting};

    match (current, pushed) {
        (OnWaiting | OnPaired, LampState::OnPaired) => Some(OnPaired),
        (Off | OnWaiting | OnPaired, LampState::OnWaiting) => Some(OnWaiting),
        (Off | OnWaiting | OnPaired, LampState::Off) => Some(Off),
        // Pairing confirmation without a preceding power-on would skip
        // OnWaiting; peer-link states never change the client view.
        _ => None,
    }
}

// ── StateCell ────────────────────────────────────────────────────────

/// The single live `DeviceState`, published through a `watch` channel.
///
/// Every write goes through [`apply`](Self::apply), which holds the
/// channel's lock for the whole read-transition-write step, so concurrent
/// triggers are serialized rather than interleaved.
pub(crate) struct StateCell {
    tx: watch::Sender<DeviceState>,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(DeviceState::NotConnected);
        Self { tx }
    }

    pub(crate) fn get(&self) -> DeviceState {
        *self.tx.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<DeviceState> {
        self.tx.subscribe()
    }

    /// Feed a trigger through the machine and return the resulting state.
    pub(crate) fn apply(&self, trigger: Trigger) -> DeviceState {
        let mut result = DeviceState::NotConnected;
        self.tx.send_if_modified(|state| {
            let from = *state;
            match next(from, trigger) {
                Some(to) if to != from => {
                    debug!(%from, %to, ?trigger, "state transition");
                    *state = to;
                    result = to;
                    true
                }
                Some(_) => {
                    result = from;
                    false
                }
                None => {
                    debug!(state = %from, ?trigger, "trigger ignored");
                    result = from;
                    false
                }
            }
        });
        result
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run(triggers: &[Trigger]) -> Vec<DeviceState> {
        let mut state = DeviceState::default();
        let mut seen = vec![state];
        for &trigger in triggers {
            if let Some(to) = next(state, trigger) {
                state = to;
            }
            seen.push(state);
        }
        seen
    }

    #[test]
    fn state_cell_publishes_transitions() {
        let cell = StateCell::new();
        let mut rx = cell.subscribe();
        assert_eq!(cell.apply(Trigger::SessionOpened), DeviceState::Off);
        assert!(rx.has_changed().unwrap_or(false));
        assert_eq!(*rx.borrow_and_update(), DeviceState::Off);

        // Ignored triggers do not wake observers.
        assert_eq!(cell.apply(Trigger::Pushed(LampState::OnPaired)), DeviceState::Off);
        assert!(!rx.has_changed().unwrap_or(true));
        assert_eq!(cell.get(), DeviceState::Off);
    }

    #[test]
    fn full_lifecycle() {
        let seen = run(&[
            Trigger::SessionOpened,
            Trigger::PoweredOn,
            Trigger::Pushed(LampState::OnPaired),
            Trigger::SessionLost,
        ]);
        assert_eq!(
            seen,
            vec![
                DeviceState::NotConnected,
                DeviceState::Off,
                DeviceState::OnWaiting,
                DeviceState::OnPaired,
                DeviceState::NotConnected,
            ]
        );
    }

    #[test]
    fn pairing_push_cannot_skip_on_waiting() {
        assert_eq!(
            next(DeviceState::Off, Trigger::Pushed(LampState::OnPaired)),
            None
        );
    }

    #[test]
    fn power_off_collapses_either_on_state() {
        assert_eq!(
            next(DeviceState::OnWaiting, Trigger::PoweredOff),
            Some(DeviceState::Off)
        );
        assert_eq!(
            next(DeviceState::OnPaired, Trigger::PoweredOff),
            Some(DeviceState::Off)
        );
    }

    #[test]
    fn power_on_while_paired_keeps_pairing() {
        assert_eq!(
            next(DeviceState::OnPaired, Trigger::PoweredOn),
            Some(DeviceState::OnPaired)
        );
    }

    #[test]
    fn pushes_ignored_without_session() {
        for pushed in [LampState::Off, LampState::OnWaiting, LampState::OnPaired] {
            assert_eq!(next(DeviceState::NotConnected, Trigger::Pushed(pushed)), None);
        }
    }

    #[test]
    fn peer_link_pushes_do_not_change_state() {
        for current in [DeviceState::Off, DeviceState::OnWaiting, DeviceState::OnPaired] {
            assert_eq!(next(current, Trigger::Pushed(LampState::ServerOffline)), None);
            assert_eq!(next(current, Trigger::Pushed(LampState::NotConnected)), None);
        }
    }

    #[test]
    fn commands_require_a_session() {
        assert_eq!(next(DeviceState::NotConnected, Trigger::PoweredOn), None);
        assert_eq!(next(DeviceState::NotConnected, Trigger::PoweredOff), None);
    }

    #[test]
    fn session_loss_always_resets() {
        for current in [
            DeviceState::NotConnected,
            DeviceState::Off,
            DeviceState::OnWaiting,
            DeviceState::OnPaired,
        ] {
            assert_eq!(
                next(current, Trigger::SessionLost),
                Some(DeviceState::NotConnected)
            );
        }
    }

    #[test]
    fn on_paired_only_reached_through_on_waiting() {
        // Exhaustive walk over short trigger sequences.
        let triggers = [
            Trigger::SessionOpened,
            Trigger::PoweredOn,
            Trigger::PoweredOff,
            Trigger::Pushed(LampState::OnPaired),
            Trigger::Pushed(LampState::OnWaiting),
            Trigger::Pushed(LampState::Off),
            Trigger::SessionLost,
        ];
        let mut frontier = vec![DeviceState::NotConnected];
        for _ in 0..4 {
            let mut expanded = Vec::new();
            for state in frontier {
                for &trigger in &triggers {
                    if let Some(to) = next(state, trigger) {
                        if to == DeviceState::OnPaired && state != DeviceState::OnPaired {
                            assert_eq!(state, DeviceState::OnWaiting, "via {trigger:?}");
                        }
                        expanded.push(to);
                    }
                }
            }
            frontier = expanded;
        }
    }
}
