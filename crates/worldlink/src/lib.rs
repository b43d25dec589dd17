//! # Worldlink
//!
//! Client-side network protocol layer for networked virtual worlds.
//!
//! A session talks to three code-spaces:
//!
//! - **master** (reliable datagrams): resolve a world name to a server,
//! - **world-TCP** (length-framed TCP): character listing and selection,
//! - **world** (reliable datagrams): the live session.
//!
//! Each has its own [`Dispatcher`]. Transport tasks decode and queue; the
//! host calls [`WorldClient::tick`] once per frame to run handlers.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use worldlink::prelude::*;
//!
//! # async fn run() -> Result<(), WorldlinkError> {
//! worldlink::logging::init_logging("info");
//! let client = WorldClient::new(ClientConfig::default());
//! client.world_tcp().on(WorldTcpMessageType::CharacterResponse.code(), |msg| {
//!     tracing::info!(?msg, "characters");
//!     Ok(HandlerFlow::Continue)
//! });
//! let tcp = client.connect_world_tcp("127.0.0.1:5040").await?;
//! client
//!     .send_world_tcp(&tcp, &WorldTcpMessage::CharacterRequest(CharacterRequest::default()))
//!     .await?;
//! loop {
//!     client.tick();
//!     while let Some(event) = client.poll_event() {
//!         tracing::warn!(?event, "connection event");
//!     }
//! #   break;
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;
mod inbound;
pub mod logging;

use std::sync::OnceLock;

pub use client::{TickReport, WorldClient};
pub use config::ClientConfig;
pub use error::WorldlinkError;
pub use inbound::ConnectionEvent;

pub use worldlink_dispatch as dispatch;
pub use worldlink_protocol as protocol;
pub use worldlink_transport as transport;

pub mod prelude {
    pub use crate::{ClientConfig, ConnectionEvent, TickReport, WorldClient, WorldlinkError};
    pub use worldlink_dispatch::{
        ClockSync, Dispatcher, DrainLimits, DrainOutcome, DrainReport, HandlerFlow, HandlerResult,
    };
    pub use worldlink_protocol::world::*;
    pub use worldlink_protocol::{
        CharacterProperties, CharacterRequest, CharacterResponse, MasterMessage,
        MasterMessageType, PropertyMap, PropertyValue, ResolveRequest, ResolveResponse,
        WireMessage, WorldBody, WorldMessage, WorldMessageType, WorldTcpMessage,
        WorldTcpMessageType,
    };
    pub use worldlink_transport::{
        CloseReason, DatagramConnection, DatagramState, MessageTransport, RdpTransport,
        TcpTransport,
    };
}

static DEFAULT_CLIENT: OnceLock<WorldClient> = OnceLock::new();

/// Process-wide client with the default configuration, created on first
/// use. Libraries should take a `&WorldClient` instead.
pub fn default_client() -> &'static WorldClient {
    DEFAULT_CLIENT.get_or_init(WorldClient::default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_client_is_shared() {
        let a = default_client() as *const WorldClient;
        let b = default_client() as *const WorldClient;
        assert_eq!(a, b);
        assert_eq!(default_client().config(), &ClientConfig::default());
    }
}
