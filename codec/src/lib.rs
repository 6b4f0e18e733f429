//! Per-connection delta encoding and decoding for the netdelta codec.
//!
//! This crate ties together dataio, wire and schema. For every packet type in
//! a [`schema::Registry`] it keeps the last value sent and received per
//! identity key, and transmits only the fields that changed.
//!
//! # Features
//!
//! - Changed-field bitmaps with folded booleans
//! - Sparse array diffs with index/value pairs
//! - Capability-selected packet variants, chosen once per connection
//! - Cache cancellation between related packet types
//! - Length-prefixed framing with narrow or wide packet types
//!
//! # Design Principles
//!
//! - **Both ends mirror each other** - A frame is only decodable against the
//!   same cache state the sender encoded it with; any decode error should end
//!   the connection.
//! - **Validate before writing** - A message that fails to encode leaves the
//!   output and the caches untouched.
//! - **Deterministic** - Same inputs produce same outputs.

mod bitmap;
mod cache;
mod connection;
mod engine;
mod error;
mod limits;
mod resolver;
mod value;

pub use bitmap::FieldBitmap;
pub use cache::{CacheSet, DeltaCache};
pub use connection::{
    CacheDirection, Connection, ConnectionConfig, PacketHooks, ReceivedPacket, Role, SendOutcome,
};
pub use engine::{decode_message, encode_message, fields_differ, read_key, EncodeOutcome, KeyFields};
pub use error::{CodecError, CodecResult, LimitKind, ValueReason};
pub use limits::CodecLimits;
pub use resolver::VariantResolver;
pub use value::{FieldValue, KeyPart, Message, MessageKey};
pub use wire::Limits as WireLimits;
