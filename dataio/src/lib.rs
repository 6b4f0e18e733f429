//! Byte-stream primitives for the netdelta packet codec.
//!
//! This crate provides [`DataWriter`] and [`DataReader`] for the fixed-width
//! integers, NUL-terminated strings, bit vectors and raw blocks that packet
//! bodies are built from. Integers are big-endian.
//!
//! # Design Principles
//!
//! - **No unsafe code**
//! - **Bounded operations** - All reads are bounds-checked.
//! - **No domain knowledge** - This crate knows nothing about packets or caches.
//! - **Explicit errors** - All failures return [`StreamError`], never panic.
//!
//! # Example
//!
//! ```
//! use dataio::{DataReader, DataWriter};
//!
//! let mut writer = DataWriter::new();
//! writer.write_u16(500);
//! writer.write_string("hello", 32).unwrap();
//!
//! let bytes = writer.finish();
//!
//! let mut reader = DataReader::new(&bytes);
//! assert_eq!(reader.read_u16().unwrap(), 500);
//! assert_eq!(reader.read_string(32).unwrap(), "hello");
//! ```

mod error;
mod reader;
mod writer;

pub use error::{StreamError, StreamResult};
pub use reader::DataReader;
pub use writer::DataWriter;
