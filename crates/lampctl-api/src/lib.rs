// lampctl-api: wire protocol and transport for networked lamp devices

pub mod error;
pub mod protocol;
pub mod transport;

pub use error::{Error, ProtocolError};
pub use protocol::{ClientType, Command, LampState, Owner};
pub use transport::{Connector, Transport, WsConnector, WsTransport};
