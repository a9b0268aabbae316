//! Real-time messaging core
//!
//! Presence tracking, the durable message store, the gateway serving the
//! messaging channel, and the wire protocol shared by both WS channels.

pub mod gateway;
pub mod presence;
pub mod protocol;
pub mod store;

pub use gateway::ChatGateway;
pub use presence::{ClientHandle, PresenceRegistry};
pub use store::{Message, MessageStore};
