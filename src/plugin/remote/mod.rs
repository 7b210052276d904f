//! Out-of-process analyzers: wire protocol, transport, and both ends of a connection.

mod client;
mod codec;
mod duplex;
mod protocol;
mod server;
mod transport;

pub use client::RemoteAnalyzer;
pub use codec::{encode, FrameDecoder};
pub use duplex::{CloseSignal, Duplex};
pub use protocol::{Envelope, Request, Response, PROTOCOL_VERSION};
pub use server::serve;
pub use transport::{RemoteTransport, TransportConfig, TransportState};
