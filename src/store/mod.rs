//! Handle-indexed storage shared by array and string variables
//!
//! Both variable kinds live in a [`HandleStore`]: an opaque 32-bit handle
//! maps to an owned entity. Handles are recycled smallest-first, handle 0
//! never addresses anything, and the whole table can be set aside while a
//! save is loaded so a failed load leaves the previous state intact.

mod handle_store;

pub use handle_store::HandleStore;
