//! Incremental, page-at-a-time decoder for SAS7BDAT files.
//!
//! The caller owns all I/O: a [`DecodeSink`] hands the decoder byte windows on
//! request and receives the file metadata and each decoded row. Decoding can
//! be paused after any number of pages and resumed with another
//! [`Parser::parse`] call.

pub mod config;
pub mod encoding;
pub mod error;
pub mod logger;
pub mod metadata;
pub mod parser;
pub mod sink;
pub mod source;
pub mod value;

pub use crate::config::{FormatOverride, ParserConfig};
pub use crate::error::{Error, ErrorKind, Result, Section};
pub use crate::metadata::{ColumnFormat, ColumnInfo, Compression, EncodingId, Endianness, FileInfo};
pub use crate::parser::{Bitmap, Parser, Window};
pub use crate::sink::{DecodeSink, RowRef};
pub use crate::source::{MemorySource, PageSource, ReaderSource};
pub use crate::value::{MissingValue, Value, decode_number};
