//! A Redis client wrapper that serializes every stored value.
//!
//! [`SerializedClient`] issues ordinary Redis commands through a [`Client`], encoding values
//! with a [`Codec`] on the way in and decoding replies on the way out. Keys, hash fields,
//! channel names and counts are left as they are. [`Pipeline`] batches commands, optionally
//! inside `MULTI`/`EXEC`, and [`PubSub`] decodes published payloads.
//!
//! [`Connection`] is the [`Client`] that speaks RESP over TCP. With the `test-util` feature,
//! `MemoryClient` runs the same commands against an in-process `Store` instead.

pub mod callbacks;
pub mod client;
pub mod cmd;
pub mod codec;
pub mod commands;
pub mod config;
pub mod connection;
pub mod decoders;
pub mod error;
pub mod frame;
#[cfg(feature = "test-util")]
pub mod memory;
pub mod options;
pub mod pipeline;
pub mod pubsub;
pub mod reply;
pub mod serialized;
#[cfg(feature = "test-util")]
pub mod store;
pub mod value;

pub use callbacks::ResponseCallbacks;
pub use client::Client;
pub use cmd::{Cmd, ReplyOptions, Request};
pub use codec::{BincodeCodec, Codec, CodecKind, JsonCodec, MsgpackCodec};
pub use config::{Config, ConfigBuilder};
pub use connection::{Connection, FrameCodec};
pub use error::{Error, Result};
pub use frame::Frame;
#[cfg(feature = "test-util")]
pub use memory::MemoryClient;
pub use options::{Aggregate, GeoRadiusOptions, GeoUnit, InsertPosition, Order, SetOptions, SortOptions};
pub use pipeline::Pipeline;
pub use pubsub::{Message, MessageKind, PubSub};
pub use reply::{FromReply, GeoMember, KeyType, Reply};
pub use serialized::SerializedClient;
#[cfg(feature = "test-util")]
pub use store::{Entry, Store};
pub use value::Value;
