//! The obd2 module contains the components responsible for the core OBD-II
//! diagnostics client: the connection status model, the command catalog and
//! decoders, the adapter transport boundary with its ELM327 implementation,
//! and the session object that ties them together.

pub mod command;
pub mod commands;
pub mod decoders;
pub mod elm327;
pub mod protocol;
pub mod response;
pub mod session;
pub mod status;
pub mod transport;
pub mod transport_mock;

pub use command::{Command, CommandKey};
pub use commands::{registry, CommandRegistry};
pub use elm327::{Elm327, SerialConfig, SerialLink};
pub use protocol::{BusProtocol, Frame, Message};
pub use response::{BitArray, Response, Value};
pub use session::{ConnectOptions, Obd2};
pub use status::ConnectionStatus;
pub use transport::{scan_ports, AdapterTransport};
pub use transport_mock::{MockTransport, ScriptedLink};
