//! Binary command codec.
//!
//! Every frame is a single command: one opcode byte followed by a fixed,
//! command-specific payload. Frames travel as WebSocket binary messages;
//! this module only deals in raw bytes so any duplex transport can carry it.

use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::error::ProtocolError;

// ── Opcodes ──────────────────────────────────────────────────────────

const OP_DECLARE_CLIENT_TYPE: u8 = 0x10;
const OP_DECLARE_CLIENT_TYPE_ACK: u8 = 0x11;
const OP_DEVICE_STATE_CHANGED: u8 = 0x12;
const OP_POWER_DEVICE_ON: u8 = 0x13;
const OP_POWER_DEVICE_OFF: u8 = 0x14;
const OP_COMMAND_ACK: u8 = 0x15;
const OP_COMMAND_NAK: u8 = 0x16;
const OP_DECLARE_CLIENT_TYPE_NAK: u8 = 0x17;

// ── ClientType ───────────────────────────────────────────────────────

/// Which side of the relay a connection speaks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ClientType {
    Device,
    User,
}

impl From<ClientType> for u8 {
    fn from(client_type: ClientType) -> Self {
        match client_type {
            ClientType::Device => 0x20,
            ClientType::User => 0x21,
        }
    }
}

impl TryFrom<u8> for ClientType {
    type Error = ProtocolError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0x20 => Ok(Self::Device),
            0x21 => Ok(Self::User),
            value => Err(ProtocolError::InvalidArgument {
                field: "client type",
                value,
            }),
        }
    }
}

// ── Owner ────────────────────────────────────────────────────────────

/// The fixed set of people a lamp can belong to.
///
/// Parses case-insensitively from its name (`"arni"`, `"Ian"`, ...).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr,
)]
#[strum(ascii_case_insensitive)]
pub enum Owner {
    Arni,
    Ian,
}

impl Owner {
    /// Single-byte identifier used in the declare-owner handshake.
    pub fn wire_id(self) -> u8 {
        match self {
            Self::Arni => 0x30,
            Self::Ian => 0x31,
        }
    }
}

impl From<Owner> for u8 {
    fn from(owner: Owner) -> Self {
        owner.wire_id()
    }
}

impl TryFrom<u8> for Owner {
    type Error = ProtocolError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0x30 => Ok(Self::Arni),
            0x31 => Ok(Self::Ian),
            value => Err(ProtocolError::InvalidArgument {
                field: "owner",
                value,
            }),
        }
    }
}

// ── LampState ────────────────────────────────────────────────────────

/// Lamp state as reported by the device in `DeviceStateChanged` pushes.
///
/// `NotConnected` and `ServerOffline` describe the link between the lamp
/// and its peer, not the power state seen by a user client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum LampState {
    NotConnected,
    ServerOffline,
    Off,
    OnWaiting,
    OnPaired,
}

impl From<LampState> for u8 {
    fn from(state: LampState) -> Self {
        match state {
            LampState::NotConnected => 0x40,
            LampState::ServerOffline => 0x41,
            LampState::Off => 0x42,
            LampState::OnWaiting => 0x43,
            LampState::OnPaired => 0x44,
        }
    }
}

impl TryFrom<u8> for LampState {
    type Error = ProtocolError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0x40 => Ok(Self::NotConnected),
            0x41 => Ok(Self::ServerOffline),
            0x42 => Ok(Self::Off),
            0x43 => Ok(Self::OnWaiting),
            0x44 => Ok(Self::OnPaired),
            value => Err(ProtocolError::InvalidArgument {
                field: "state",
                value,
            }),
        }
    }
}

// ── Command ──────────────────────────────────────────────────────────

/// Every message that can appear on the wire, in either direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
pub enum Command {
    DeclareClientType(ClientType, Owner),
    DeclareClientTypeAck,
    DeclareClientTypeNak,
    DeviceStateChanged(LampState),
    PowerDeviceOn,
    PowerDeviceOff,
    CommandAck,
    CommandNak,
}

impl Command {
    /// The declare-owner handshake a user client opens every session with.
    pub fn declare_owner(owner: Owner) -> Self {
        Self::DeclareClientType(ClientType::User, owner)
    }

    fn opcode(self) -> u8 {
        match self {
            Self::DeclareClientType(..) => OP_DECLARE_CLIENT_TYPE,
            Self::DeclareClientTypeAck => OP_DECLARE_CLIENT_TYPE_ACK,
            Self::DeclareClientTypeNak => OP_DECLARE_CLIENT_TYPE_NAK,
            Self::DeviceStateChanged(_) => OP_DEVICE_STATE_CHANGED,
            Self::PowerDeviceOn => OP_POWER_DEVICE_ON,
            Self::PowerDeviceOff => OP_POWER_DEVICE_OFF,
            Self::CommandAck => OP_COMMAND_ACK,
            Self::CommandNak => OP_COMMAND_NAK,
        }
    }

    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Serialize into a single frame.
    pub fn encode(self) -> Vec<u8> {
        let opcode = self.opcode();
        match self {
            Self::DeclareClientType(client_type, owner) => {
                vec![opcode, client_type.into(), owner.into()]
            }
            Self::DeviceStateChanged(state) => vec![opcode, state.into()],
            _ => vec![opcode],
        }
    }

    /// Parse a single frame.
    pub fn decode(frame: &[u8]) -> Result<Self, ProtocolError> {
        let [opcode, rest @ ..] = frame else {
            return Err(ProtocolError::EmptyFrame);
        };

        match *opcode {
            OP_DECLARE_CLIENT_TYPE => match rest {
                [client_type, owner] => Ok(Self::DeclareClientType(
                    ClientType::try_from(*client_type)?,
                    Owner::try_from(*owner)?,
                )),
                _ => Err(length_error("DeclareClientType", 2, rest)),
            },
            OP_DEVICE_STATE_CHANGED => match rest {
                [state] => Ok(Self::DeviceStateChanged(LampState::try_from(*state)?)),
                _ => Err(length_error("DeviceStateChanged", 1, rest)),
            },
            OP_DECLARE_CLIENT_TYPE_ACK => bare(Self::DeclareClientTypeAck, rest),
            OP_DECLARE_CLIENT_TYPE_NAK => bare(Self::DeclareClientTypeNak, rest),
            OP_POWER_DEVICE_ON => bare(Self::PowerDeviceOn, rest),
            OP_POWER_DEVICE_OFF => bare(Self::PowerDeviceOff, rest),
            OP_COMMAND_ACK => bare(Self::CommandAck, rest),
            OP_COMMAND_NAK => bare(Self::CommandNak, rest),
            other => Err(ProtocolError::UnknownOpcode(other)),
        }
    }
}

fn bare(command: Command, rest: &[u8]) -> Result<Command, ProtocolError> {
    if rest.is_empty() {
        Ok(command)
    } else {
        Err(length_error(command.name(), 0, rest))
    }
}

fn length_error(command: &'static str, expected: usize, rest: &[u8]) -> ProtocolError {
    ProtocolError::Length {
        command,
        expected,
        got: rest.len(),
    }
}

/// Render a frame as space-separated hex, for trace logging.
pub fn frame_as_hex(frame: &[u8]) -> String {
    frame
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

// ── Tests ────────────────────────────────────────────────────────────
