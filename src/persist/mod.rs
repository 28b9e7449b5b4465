//! Save-game persistence
//!
//! Stores are written as a sequence of tagged records. The array section is
//! `ARVS`, one `ARVR` per array, then `ARVE`; string variables follow as
//! `STVS`, `STVR`..., `STVE`. Each record carries a format version; version 1
//! array records predate reference lists.
//!
//! Loading resolves every module index through a [`ModuleMap`] supplied by
//! the host. Variables owned by modules that are no longer loaded are
//! dropped, content references into them are nulled, and array references
//! to dropped arrays become 0.

mod codec;
mod modules;
mod stream;

pub use codec::{
    load_arrays, load_strings, save_arrays, save_strings, LoadReport, SaveReport, ARRAY_VERSION,
    LEGACY_ARRAY_VERSION, STRING_VERSION,
};
pub use modules::{ModuleMap, DYNAMIC_MODULE};
pub use stream::{MemoryStream, RecordHeader, RecordReader, RecordTag, RecordWriter};
