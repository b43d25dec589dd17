//! Wire protocol for Worldlink.
//!
//! This crate defines the bytes a virtual-world client exchanges with its
//! master and world servers:
//!
//! - **Primitives** ([`WireReader`], [`WireWriter`], [`Color`]): big-endian
//!   numbers, length-prefixed strings and blobs, vectors, quaternions.
//! - **Property maps** ([`PropertyMap`], [`PropertyValue`]): the tagged,
//!   recursive key/value format many messages embed.
//! - **Code-spaces** ([`MasterMessage`], [`WorldTcpMessage`],
//!   [`WorldMessage`]): three independent type-code tables, each with its
//!   own registry behind [`WireMessage::decode`].
//! - **Fragments** ([`Fragment`], [`FragmentTable`], [`Aggregated`]):
//!   splitting oversized messages and batching small ones.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw payloads) and dispatch
//! (typed messages handed to handlers). It never touches a socket.
//!
//! ```text
//! Transport (payload bytes) → Protocol (typed message) → Dispatch (handlers)
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod codec;
mod error;
pub mod fragment;
mod master;
mod property;
mod wire;
pub mod world;
mod world_tcp;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

// Message bodies stay under `world::` (there are many); everything else is
// flat at the crate root.

pub use codec::{CodeSpace, WireBody, WireMessage};
pub use error::ProtocolError;
pub use fragment::{Aggregated, Fragment, FragmentProgress, FragmentTable};
pub use master::{MasterMessage, MasterMessageType, ResolveRequest, ResolveResponse};
pub use property::{PropertyMap, PropertySet, PropertyValue, MAX_PROPERTY_DEPTH};
pub use wire::{Color, WireReader, WireWriter};
pub use world::{WorldBody, WorldMessage, WorldMessageType};
pub use world_tcp::{
    CharacterProperties, CharacterRequest, CharacterResponse, WorldTcpMessage,
    WorldTcpMessageType,
};
