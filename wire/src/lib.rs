//! Frame layout and inbound frame buffering for the netdelta packet codec.
//!
//! Every encoded packet body travels in a frame:
//!
//! ```text
//! [length: u16 BE, whole frame][packet type: u8 or u16 BE][body]
//! ```
//!
//! This crate does not know about packet bodies, only the structure of
//! frames.
//!
//! # Design Principles
//!
//! - **Bounded decoding** - Length prefixes are validated against limits
//!   before any body is copied.
//! - **No domain knowledge** - This crate handles framing, not packet contents.

mod error;
mod frame;
mod limits;

pub use error::{WireError, WireResult};
pub use frame::{
    encode_frame, Frame, FrameBuffer, HeaderLayout, TypeWidth, LENGTH_BYTES, MAX_FRAME_BYTES,
};
pub use limits::Limits;
