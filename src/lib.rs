pub mod config;
pub mod error;
pub mod protocol;
pub mod render;
pub mod session;
pub mod state;
pub mod transport;
pub mod tui;
pub mod typing;

#[cfg(test)]
mod testing;

pub use error::ChatError;
pub use protocol::{InboundEvent, OutboundIntent};
pub use render::{ChatLine, ConnectionStatus, Renderer};
pub use session::Session;
pub use state::{Recipient, SessionState};
pub use transport::{Transport, TransportEvent, WsTransport};
