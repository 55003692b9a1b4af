//! Local persistence helpers.
//!
//! # Structure
//! - `json` - whole-file JSON documents and JSONL appends, with detached writes
//! - `cache` - `TtlCache` for read-mostly data loaded from disk
//! - `error` - `StoreError`

mod cache;
mod error;
mod json;

pub use cache::TtlCache;
pub use error::StoreError;
pub use json::{JsonFile, append_line_detached};
pub(crate) use json::append_line;
