#![forbid(unsafe_code)]
//! Capture-log ingestion for RAFT.
//!
//! This crate provides:
//! - A static [`FormatRegistry`] mapping each supported capture format to a
//!   streaming parser ([`ParserFn`]).
//! - Bounded-memory readers: a line reader for text logs and a record-at-a-time
//!   XML reader for report exports.
//! - The format-native [`RawRecord`] shapes and the canonical [`Capture`].
//! - [`adapt`], the pure normalization from one to the other.
//!
//! ```no_run
//! use raft_capture::{adapt, FormatId, FormatRegistry, IngestLimits};
//!
//! let registry = FormatRegistry::builtin();
//! let parser = registry.resolve_format(FormatId::BurpLog).unwrap();
//! for record in parser("proxy.log".as_ref(), &IngestLimits::default()).unwrap() {
//!     let capture = adapt(&record.unwrap()).unwrap();
//!     println!("{} {}", capture.method, capture.url);
//! }
//! ```

mod adapter;
mod capture;
mod config;
mod error;
mod format;
mod raw;
mod reader;
mod serde_helpers;

pub mod parsers;

pub use adapter::adapt;
pub use capture::{Capture, HttpHeader, HttpMessage};
pub use config::IngestLimits;
pub use error::{AdaptationError, ParserStreamError, UnknownFormat};
pub use format::{FormatId, FormatRegistry};
pub use parsers::{ParserFn, RawRecordStream};
pub use raw::{
    AppScanTraffic, BurpIssue, BurpItem, BurpLogEntry, NativeRecord, ParosMessage,
    RaftCaptureRecord, RawRecord, WebScarabConversation,
};
